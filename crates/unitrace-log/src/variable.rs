//! Type variable handles and descriptor ranks.
//!
//! A [`Variable`] is a stable 32-bit handle into the unifier's universe of type
//! variables. Variables are never deleted by the unifier; over the course of a
//! trace they are only unioned with other variables or re-described.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Variable
// ---------------------------------------------------------------------------

/// A stable type variable reference.
///
/// Serialized transparently as its raw number so traces stay compact.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Variable(u32);

impl Variable {
    /// Construct a `Variable` from its raw index.
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// The raw index of this variable.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Variable({})", self.0)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl From<u32> for Variable {
    fn from(index: u32) -> Self {
        Self(index)
    }
}

// ---------------------------------------------------------------------------
// Rank
// ---------------------------------------------------------------------------

/// The generalization rank the unifier attached to a variable's descriptor.
///
/// Rank 0 is the toplevel (generalized) rank; deeper `let` nesting yields
/// higher ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rank(pub u32);

impl Rank {
    /// The generalized toplevel rank.
    pub const TOPLEVEL: Rank = Rank(0);
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
