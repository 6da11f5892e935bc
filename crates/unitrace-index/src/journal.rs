//! Per-variable journal of every event that names a variable.
//!
//! The [`VariableJournal`] records, for each [`Variable`], the ordered list of
//! [`Mention`]s: which event named it, at which [`EventIndex`], and in what
//! [`MentionRole`]. The engine uses it to decide whether a variable is known
//! at a position (its first mention is at or before it) and to answer
//! history queries.
//!
//! Building the journal also enforces the variable half of the input
//! contract: every variable a `VariableUnified` event or a descriptor's
//! content refers to must be *introduced* somewhere in the log, i.e. be
//! declared up front, appear as a side of some unification, or be the
//! target of some `VariableSetDescriptor`.
//!
//! # Query API
//!
//! - **First mention**: [`VariableJournal::first_mention`]
//! - **All mentions**: [`VariableJournal::mentions`]
//! - **Mentions up to a position**: [`VariableJournal::mentions_through`]
//! - **Known at a position**: [`VariableJournal::is_known_at`]

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use unitrace_log::event::{Event, EventId, EventLog};
use unitrace_log::variable::Variable;

use crate::index::{EventIndex, IndexTable};
use crate::IndexError;

// ---------------------------------------------------------------------------
// Mention
// ---------------------------------------------------------------------------

/// The part a variable played in an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MentionRole {
    UnificationLeft,
    UnificationRight,
    UnifiedFrom,
    UnifiedInto,
    DescriptorTarget,
    /// Referenced from inside a descriptor's content.
    DescriptorContent,
}

impl fmt::Display for MentionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MentionRole::UnificationLeft => "unification left side",
            MentionRole::UnificationRight => "unification right side",
            MentionRole::UnifiedFrom => "union source",
            MentionRole::UnifiedInto => "union target",
            MentionRole::DescriptorTarget => "descriptor target",
            MentionRole::DescriptorContent => "descriptor content",
        };
        f.write_str(name)
    }
}

/// One event naming one variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    pub index: EventIndex,
    pub event: EventId,
    pub role: MentionRole,
}

// ---------------------------------------------------------------------------
// VariableJournal
// ---------------------------------------------------------------------------

/// Ordered mentions of every variable in one indexed log.
///
/// Content references are validated but not journaled: a variable that only
/// appears inside some other variable's content has not yet been touched by
/// the unifier and stays unresolved until an event names it directly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableJournal {
    mentions: BTreeMap<Variable, Vec<Mention>>,
    declared: BTreeSet<Variable>,
}

impl VariableJournal {
    /// Build the journal for `log`, indexed by `table`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::UnknownVariable`] for the first reference (in
    /// position order) to a variable that the log never introduces.
    pub fn build(log: &EventLog, table: &IndexTable) -> Result<VariableJournal, IndexError> {
        let introduced = introduced_variables(log);
        let mut mentions: BTreeMap<Variable, Vec<Mention>> = BTreeMap::new();

        for (index, id) in table.iter() {
            let Some(event) = log.event(id) else {
                return Err(IndexError::MissingEvent {
                    event: id,
                    referenced_by: None,
                });
            };

            let mut record = |variable: Variable, role: MentionRole| {
                mentions.entry(variable).or_default().push(Mention {
                    index,
                    event: id,
                    role,
                });
            };

            match event {
                Event::Unification(u) => {
                    record(u.left, MentionRole::UnificationLeft);
                    record(u.right, MentionRole::UnificationRight);
                }
                Event::VariableUnified { from, into } => {
                    for (variable, role) in [
                        (*from, MentionRole::UnifiedFrom),
                        (*into, MentionRole::UnifiedInto),
                    ] {
                        if !introduced.contains(&variable) {
                            return Err(IndexError::UnknownVariable {
                                event: id,
                                variable,
                                role,
                            });
                        }
                        record(variable, role);
                    }
                }
                Event::VariableSetDescriptor {
                    variable,
                    descriptor,
                } => {
                    if let Some(unknown) = descriptor
                        .variables()
                        .into_iter()
                        .find(|referenced| !introduced.contains(referenced))
                    {
                        return Err(IndexError::UnknownVariable {
                            event: id,
                            variable: unknown,
                            role: MentionRole::DescriptorContent,
                        });
                    }
                    record(*variable, MentionRole::DescriptorTarget);
                }
            }
        }

        tracing::debug!(
            variables = mentions.len(),
            declared = log.declared_variables().len(),
            "built variable journal"
        );

        Ok(VariableJournal {
            mentions,
            declared: log.declared_variables().clone(),
        })
    }

    /// Every mention of `variable`, in position order.
    pub fn mentions(&self, variable: Variable) -> &[Mention] {
        self.mentions.get(&variable).map_or(&[], Vec::as_slice)
    }

    /// Mentions of `variable` at or before `index`.
    pub fn mentions_through(&self, variable: Variable, index: EventIndex) -> &[Mention] {
        let all = self.mentions(variable);
        let end = all.partition_point(|m| m.index <= index);
        &all[..end]
    }

    /// The first mention of `variable`, if any event names it.
    pub fn first_mention(&self, variable: Variable) -> Option<&Mention> {
        self.mentions(variable).first()
    }

    /// Returns `true` if `variable` was declared up front.
    pub fn is_declared(&self, variable: Variable) -> bool {
        self.declared.contains(&variable)
    }

    /// Returns `true` if `variable` exists as of `index`: it was declared, or
    /// some event at or before `index` names it.
    pub fn is_known_at(&self, variable: Variable, index: EventIndex) -> bool {
        self.is_declared(variable)
            || self
                .first_mention(variable)
                .is_some_and(|first| first.index <= index)
    }

    /// Returns `true` if `variable` exists strictly before `index`.
    pub fn is_known_before(&self, variable: Variable, index: EventIndex) -> bool {
        self.is_declared(variable)
            || self
                .first_mention(variable)
                .is_some_and(|first| first.index < index)
    }

    /// Every variable that is declared or directly named by some event, in
    /// ascending order.
    pub fn variables(&self) -> impl Iterator<Item = Variable> + '_ {
        let mut all: BTreeSet<Variable> = self.declared.clone();
        all.extend(self.mentions.keys().copied());
        all.into_iter()
    }

    /// Number of distinct variables directly named by some event.
    pub fn len(&self) -> usize {
        self.mentions.len()
    }

    /// Returns `true` if no event names any variable.
    pub fn is_empty(&self) -> bool {
        self.mentions.is_empty()
    }
}

/// Declared variables, both sides of every unification, and every descriptor
/// target, across the whole log.
fn introduced_variables(log: &EventLog) -> BTreeSet<Variable> {
    let mut introduced = log.declared_variables().clone();
    for (_, node) in log.iter() {
        match &node.event {
            Event::Unification(u) => {
                introduced.insert(u.left);
                introduced.insert(u.right);
            }
            Event::VariableSetDescriptor { variable, .. } => {
                introduced.insert(*variable);
            }
            Event::VariableUnified { .. } => {}
        }
    }
    introduced
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
