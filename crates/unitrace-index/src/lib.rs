//! Unitrace Index -- positions and variable journals for an event log.
//!
//! The indexer turns the nested [`EventLog`](unitrace_log::event::EventLog)
//! into a totally ordered position space. Every event gets a *before* and an
//! *after* [`EventIndex`](index::EventIndex) such that ancestor ranges strictly
//! contain descendant ranges and sibling ranges never overlap.
//!
//! # Modules
//!
//! - [`index`]: the pre-order [`IndexTable`](index::IndexTable) and the
//!   structural validation of the arena.
//! - [`journal`]: the per-variable [`VariableJournal`](journal::VariableJournal)
//!   and validation of every variable reference.
//!
//! Both are built together by [`TraceIndex::build`], which is the indexer's
//! single fail-fast entry point: a log that violates the input contract never
//! yields a partially built index.

#![deny(unsafe_code)]

pub mod index;
pub mod journal;

use unitrace_log::event::{EventId, EventLog};
use unitrace_log::variable::Variable;

use crate::index::IndexTable;
use crate::journal::{MentionRole, VariableJournal};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Malformed input detected while indexing a log.
///
/// Every variant is a contract violation by whoever produced the log.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    /// A root or child link points at an event that does not exist.
    #[error("event {event} does not exist (referenced by {referenced_by:?})")]
    MissingEvent {
        event: EventId,
        referenced_by: Option<EventId>,
    },

    /// The same event is reachable through more than one link.
    #[error("event {event} is reachable more than once in the event forest")]
    ReachedTwice { event: EventId },

    /// An event's recorded parent disagrees with where it is linked from.
    #[error("event {event} records parent {recorded:?} but is linked from {actual:?}")]
    ParentMismatch {
        event: EventId,
        recorded: Option<EventId>,
        actual: Option<EventId>,
    },

    /// An event appears before an event that was logged after it.
    #[error(
        "event {event} is out of chronological log order: it is visited after event {previous}"
    )]
    OutOfOrder { event: EventId, previous: EventId },

    /// A leaf event (union or descriptor update) has children.
    #[error("event {event} has children but is not a unification")]
    ChildrenOnLeaf { event: EventId },

    /// An event cannot be reached from any root.
    #[error("event {event} is not reachable from any root event")]
    Unreachable { event: EventId },

    /// An event refers to a variable the log never introduces.
    #[error("event {event} refers to variable {variable} as {role}, but the log never introduces it")]
    UnknownVariable {
        event: EventId,
        variable: Variable,
        role: MentionRole,
    },
}

// ---------------------------------------------------------------------------
// TraceIndex
// ---------------------------------------------------------------------------

/// The complete index of one log: positions plus the variable journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceIndex {
    pub table: IndexTable,
    pub journal: VariableJournal,
}

impl TraceIndex {
    /// Index and validate `log`.
    pub fn build(log: &EventLog) -> Result<TraceIndex, IndexError> {
        let table = IndexTable::build(log).inspect_err(|err| {
            tracing::warn!(error = %err, "rejected malformed event log structure");
        })?;
        let journal = VariableJournal::build(log, &table).inspect_err(|err| {
            tracing::warn!(error = %err, "rejected event log with unknown variable");
        })?;
        tracing::info!(
            events = table.len(),
            variables = journal.variables().count(),
            "built trace index"
        );
        Ok(TraceIndex { table, journal })
    }
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::index::{EventIndex, IndexRange, IndexTable};
    pub use crate::journal::{Mention, MentionRole, VariableJournal};
    pub use crate::{IndexError, TraceIndex};
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::prelude::*;
    use unitrace_log::prelude::*;

    #[test]
    fn build_rejects_unknown_union_target() {
        let mut b = EventLogBuilder::new();
        let u = b.push_root(Event::unification(
            UnifyMode::Eq,
            Variable::new(1),
            Variable::new(2),
            true,
        ));
        b.push_child(u, Event::unified(Variable::new(1), Variable::new(9)))
            .unwrap();

        let err = TraceIndex::build(&b.finish()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "event #1 refers to variable v9 as union target, but the log never introduces it"
        );
    }

    #[test]
    fn build_indexes_well_formed_log() {
        let log = EventLog::from_json(
            r#"{ "events": [
                { "kind": "unification", "mode": "eq", "left": 1, "right": 2, "success": true,
                  "children": [ { "kind": "variable_unified", "from": 1, "into": 2 } ] }
            ] }"#,
        )
        .unwrap();

        let index = TraceIndex::build(&log).unwrap();
        assert_eq!(index.table.len(), 2);
        assert_eq!(index.journal.mentions(Variable::new(2)).len(), 2);
    }
}
