//! Point-in-time variable states returned by the resolver.

use std::fmt;

use serde::{Deserialize, Serialize};
use unitrace_log::descriptor::Descriptor;
use unitrace_log::variable::Variable;

// ---------------------------------------------------------------------------
// VariableState
// ---------------------------------------------------------------------------

/// The resolved view of a variable at one position.
///
/// `Unresolved` is an ordinary answer, not an error: the variable simply has
/// not been named by any event yet (and was not declared up front). A
/// presentation layer renders it as an "unknown" marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum VariableState {
    Unresolved,
    Resolved {
        /// Representative of the variable's equivalence class.
        root: Variable,
        /// Descriptor stored at the root; `None` if never set.
        descriptor: Option<Descriptor>,
    },
}

impl VariableState {
    /// Returns `true` unless the state is [`VariableState::Unresolved`].
    pub fn is_resolved(&self) -> bool {
        matches!(self, VariableState::Resolved { .. })
    }

    /// The root, if resolved.
    pub fn root(&self) -> Option<Variable> {
        match self {
            VariableState::Resolved { root, .. } => Some(*root),
            VariableState::Unresolved => None,
        }
    }

    /// The root's descriptor, if resolved and known.
    pub fn descriptor(&self) -> Option<&Descriptor> {
        match self {
            VariableState::Resolved { descriptor, .. } => descriptor.as_ref(),
            VariableState::Unresolved => None,
        }
    }
}

impl fmt::Display for VariableState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableState::Unresolved => write!(f, "unresolved"),
            VariableState::Resolved {
                root,
                descriptor: Some(descriptor),
            } => write!(f, "{root} = {descriptor}"),
            VariableState::Resolved {
                root,
                descriptor: None,
            } => write!(f, "{root} = ?"),
        }
    }
}

// ---------------------------------------------------------------------------
// VariableChange
// ---------------------------------------------------------------------------

/// A variable whose state differs across a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableChange {
    pub variable: Variable,
    pub before: VariableState,
    pub after: VariableState,
}
