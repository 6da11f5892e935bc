//! Unitrace Log -- the immutable unification event log.
//!
//! This crate holds the data model consumed by the trace debugger: type
//! [`Variable`](variable::Variable)s, their [`Descriptor`](descriptor::Descriptor)s,
//! and the forest of unifier [`Event`](event::Event)s stored as a flat arena.
//! The log is built exactly once, from code via
//! [`EventLogBuilder`](event::EventLogBuilder) or from the nested
//! [`TraceDocument`](schema::TraceDocument) schema, and is never mutated
//! afterwards.
//!
//! # Quick Start
//!
//! ```
//! use unitrace_log::prelude::*;
//!
//! let (v1, v2) = (Variable::new(1), Variable::new(2));
//!
//! let mut builder = EventLogBuilder::new();
//! let step = builder.push_root(Event::unification(UnifyMode::Eq, v1, v2, true));
//! builder.push_child(step, Event::unified(v1, v2)).unwrap();
//! builder
//!     .push_child(step, Event::set_descriptor(v2, Descriptor::with_content(Content::apply("Str", vec![]))))
//!     .unwrap();
//!
//! let log = builder.finish();
//! assert_eq!(log.roots().len(), 1);
//! assert_eq!(log.len(), 3);
//! ```

#![deny(unsafe_code)]

pub mod descriptor;
pub mod event;
pub mod schema;
pub mod variable;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced while constructing an event log.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// A child was attached to an event id that does not exist.
    #[error("cannot attach child: parent event {parent} does not exist")]
    UnknownParent { parent: event::EventId },

    /// A child was attached to a leaf event; only unifications have substeps.
    #[error("cannot attach child: parent event {parent} is not a unification")]
    ParentNotUnification { parent: event::EventId },

    /// A child was attached to a unification whose substeps already ended.
    #[error(
        "cannot attach child: parent event {parent} is closed (a later event was already \
         logged outside it, so the child would be out of log order)"
    )]
    ParentClosed { parent: event::EventId },

    /// A trace document listed substeps under an event that is not a
    /// unification.
    #[error("event {event} is not a unification but carries children")]
    ChildrenOnLeaf { event: event::EventId },

    /// The trace document could not be parsed.
    #[error("failed to parse trace document: {0}")]
    Json(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::descriptor::{
        AliasKind, Content, Descriptor, FlatType, Lambda, RecordField, RecordFieldKind, Tag, Uls,
    };
    pub use crate::event::{Event, EventId, EventLog, EventLogBuilder, EventNode, Unification, UnifyMode};
    pub use crate::schema::{EventTree, TraceDocument};
    pub use crate::variable::{Rank, Variable};
    pub use crate::LogError;
}
