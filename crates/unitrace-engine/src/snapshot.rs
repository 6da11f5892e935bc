//! Point-in-time state snapshots with BLAKE3 hashing.
//!
//! A [`StateSnapshot`] records the state of every variable known at one
//! position, plus a BLAKE3 hex digest of that state. Two snapshots of the
//! same log at the same position always carry the same hash, whichever path
//! produced them (full replay or a cursor), which makes the hash a cheap
//! determinism check.
//!
//! ```
//! use unitrace_engine::prelude::*;
//!
//! let mut builder = EventLogBuilder::new();
//! builder.push_root(Event::unified(Variable::new(1), Variable::new(2)));
//! builder.declare(Variable::new(1)).declare(Variable::new(2));
//! let engine = Engine::build(builder.finish()).unwrap();
//!
//! let snapshot = engine.snapshot_at(EventIndex::ZERO).unwrap();
//! assert_eq!(snapshot.hash.len(), 64);
//! snapshot.verify().unwrap();
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use unitrace_index::index::EventIndex;
use unitrace_log::variable::Variable;

use crate::state::{VariableChange, VariableState};

static UNRESOLVED: VariableState = VariableState::Unresolved;

/// Every known variable's state at one position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Position the snapshot was taken at.
    pub index: EventIndex,
    /// Known variables only; anything absent is unresolved.
    pub variables: BTreeMap<Variable, VariableState>,
    /// BLAKE3 hex digest (64 lowercase hex chars) of `index` and `variables`.
    pub hash: String,
}

/// BLAKE3 hex digest of the hashable part of a snapshot. The hash field
/// itself is not included.
fn compute_hash(
    index: EventIndex,
    variables: &BTreeMap<Variable, VariableState>,
) -> Result<String, serde_json::Error> {
    #[derive(Serialize)]
    struct HashableState<'a> {
        index: EventIndex,
        variables: &'a BTreeMap<Variable, VariableState>,
    }

    let bytes = serde_json::to_vec(&HashableState { index, variables })?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

impl StateSnapshot {
    pub(crate) fn capture(
        index: EventIndex,
        variables: BTreeMap<Variable, VariableState>,
    ) -> Result<StateSnapshot, serde_json::Error> {
        let hash = compute_hash(index, &variables)?;
        Ok(StateSnapshot {
            index,
            variables,
            hash,
        })
    }

    /// The state of `variable`; unknown variables are unresolved.
    pub fn state(&self, variable: Variable) -> &VariableState {
        self.variables.get(&variable).unwrap_or(&UNRESOLVED)
    }

    /// Recompute the hash and compare it with the recorded one.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot was altered after capture (for
    /// example by editing its JSON form).
    pub fn verify(&self) -> anyhow::Result<()> {
        let expected = compute_hash(self.index, &self.variables)?;
        if expected != self.hash {
            anyhow::bail!(
                "snapshot hash mismatch at {}: recorded {} but recomputed {}",
                self.index,
                self.hash,
                expected
            );
        }
        Ok(())
    }

    /// Variables whose state differs between `earlier` and `self`, ascending.
    pub fn changes_since(&self, earlier: &StateSnapshot) -> Vec<VariableChange> {
        let mut variables: Vec<Variable> = self
            .variables
            .keys()
            .chain(earlier.variables.keys())
            .copied()
            .collect();
        variables.sort();
        variables.dedup();

        variables
            .into_iter()
            .filter_map(|variable| {
                let before = earlier.state(variable);
                let after = self.state(variable);
                (before != after).then(|| VariableChange {
                    variable,
                    before: before.clone(),
                    after: after.clone(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unitrace_log::descriptor::{Content, Descriptor};

    fn resolved(root: u32) -> VariableState {
        VariableState::Resolved {
            root: Variable::new(root),
            descriptor: None,
        }
    }

    fn snapshot(index: u32, states: &[(u32, VariableState)]) -> StateSnapshot {
        let variables = states
            .iter()
            .map(|(n, state)| (Variable::new(*n), state.clone()))
            .collect();
        StateSnapshot::capture(EventIndex::from_raw(index), variables).unwrap()
    }

    #[test]
    fn hash_is_stable_and_hex() {
        let a = snapshot(3, &[(1, resolved(2)), (2, resolved(2))]);
        let b = snapshot(3, &[(2, resolved(2)), (1, resolved(2))]);
        assert_eq!(a.hash, b.hash);
        assert_eq!(a.hash.len(), 64);
        assert!(a.hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn hash_covers_index_and_states() {
        let base = snapshot(3, &[(1, resolved(1))]);
        assert_ne!(base.hash, snapshot(4, &[(1, resolved(1))]).hash);
        assert_ne!(base.hash, snapshot(3, &[(1, resolved(2))]).hash);
    }

    #[test]
    fn verify_detects_tampering() {
        let mut snap = snapshot(0, &[(1, resolved(1))]);
        snap.verify().unwrap();

        snap.variables.insert(
            Variable::new(1),
            VariableState::Resolved {
                root: Variable::new(1),
                descriptor: Some(Descriptor::with_content(Content::Error)),
            },
        );
        let err = snap.verify().unwrap_err();
        assert!(err.to_string().contains("hash mismatch"));
    }

    #[test]
    fn json_round_trip_still_verifies() {
        let snap = snapshot(7, &[(1, resolved(4)), (4, resolved(4))]);
        let json = serde_json::to_string(&snap).unwrap();
        let back: StateSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snap);
        back.verify().unwrap();
    }

    #[test]
    fn absent_variables_are_unresolved() {
        let snap = snapshot(0, &[(1, resolved(1))]);
        assert_eq!(snap.state(Variable::new(9)), &VariableState::Unresolved);
    }

    #[test]
    fn changes_since_includes_new_variables() {
        let earlier = snapshot(0, &[(1, resolved(1))]);
        let later = snapshot(2, &[(1, resolved(2)), (2, resolved(2))]);
        let changes = later.changes_since(&earlier);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].variable, Variable::new(1));
        assert_eq!(changes[1].before, VariableState::Unresolved);
        assert!(earlier.changes_since(&earlier).is_empty());
    }
}
