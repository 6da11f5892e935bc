//! Unitrace Engine -- point-in-time variable resolution over a unification trace.
//!
//! This crate builds on [`unitrace_log`] and [`unitrace_index`]. An
//! [`Engine`](engine::Engine) takes a complete event log, indexes and
//! validates it once, and then answers "what did variable `v` look like at
//! position `i`?" for any variable and any position, in any order.
//!
//! # Quick Start
//!
//! ```
//! use unitrace_engine::prelude::*;
//!
//! let (v1, v2) = (Variable::new(1), Variable::new(2));
//! let mut builder = EventLogBuilder::new();
//! let step = builder.push_root(Event::unification(UnifyMode::Eq, v1, v2, true));
//! builder
//!     .push_child(step, Event::set_descriptor(v2, Descriptor::with_content(Content::apply("Str", vec![]))))
//!     .unwrap();
//! builder.push_child(step, Event::unified(v1, v2)).unwrap();
//!
//! let engine = Engine::build(builder.finish()).unwrap();
//!
//! // Before the step v1 is its own, undescribed root.
//! let before = engine.before_index(step).unwrap();
//! assert_eq!(engine.resolve(v1, before).unwrap().to_string(), "v1 = ?");
//!
//! // After it, v1 has been unified into v2, which is a Str.
//! let after = engine.after_index(step).unwrap();
//! assert_eq!(engine.resolve(v1, after).unwrap().to_string(), "v2 = Str");
//!
//! // A cursor walks the same positions incrementally.
//! let mut cursor = engine.cursor(before).unwrap();
//! while cursor.step_forward() {}
//! assert_eq!(cursor.resolve(v1), engine.resolve(v1, after).unwrap());
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod cursor;
pub mod engine;
pub mod snapshot;
pub mod state;

mod union_find;

use unitrace_index::index::EventIndex;
use unitrace_index::IndexError;
use unitrace_log::event::EventId;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

/// Re-export the log crate for convenience.
pub use unitrace_log;

/// Re-export the index crate for convenience.
pub use unitrace_index;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The log violates the input contract; no engine was built.
    #[error("malformed event log: {0}")]
    Malformed(#[from] IndexError),

    /// A query named a position the trace does not have.
    #[error("index {index} is out of range for a trace of {len} positions")]
    IndexOutOfRange { index: EventIndex, len: usize },

    /// A query named an event the log does not contain.
    #[error("event {event} does not exist in this trace")]
    UnknownEvent { event: EventId },

    /// A snapshot could not be serialized for hashing.
    #[error("snapshot serialization failed: {0}")]
    Snapshot(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    pub use unitrace_index::prelude::*;
    pub use unitrace_log::prelude::*;

    pub use crate::config::EngineConfig;
    pub use crate::cursor::Cursor;
    pub use crate::engine::Engine;
    pub use crate::snapshot::StateSnapshot;
    pub use crate::state::{VariableChange, VariableState};
    pub use crate::EngineError;
}
