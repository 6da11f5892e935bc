//! Incremental navigation over an [`Engine`].
//!
//! A [`Cursor`] owns one union-find and moves it between positions instead
//! of replaying from scratch for every query:
//!
//! - moving forward applies the effects in between and records one undo
//!   entry per effect;
//! - moving backward pops undo entries, or, when the jump is longer than the
//!   configured `checkpoint_interval`, restores the nearest checkpoint at or
//!   below the target and re-applies forward from there.
//!
//! Checkpoints are full copies of the union-find taken every
//! `checkpoint_interval` applied effects (and at zero). The cursor never
//! compresses paths, so every undo entry stays valid.
//!
//! Answers are identical to [`Engine::resolve`] at the same position.

use std::collections::BTreeMap;

use unitrace_index::index::EventIndex;
use unitrace_log::event::EventId;
use unitrace_log::variable::Variable;

use crate::engine::Engine;
use crate::snapshot::StateSnapshot;
use crate::state::VariableState;
use crate::union_find::{UnionFind, Undo};
use crate::EngineError;

/// A movable view of one engine's state at one position.
#[derive(Debug, Clone)]
pub struct Cursor<'e> {
    engine: &'e Engine,
    state: UnionFind,
    /// Number of effects applied to `state`.
    applied: usize,
    /// One entry per applied effect; `undo.len() == applied`.
    undo: Vec<Undo>,
    /// Copies of `state` keyed by how many effects they include.
    checkpoints: BTreeMap<usize, UnionFind>,
    position: EventIndex,
}

impl<'e> Cursor<'e> {
    /// Create a cursor positioned at `index`.
    pub fn new(engine: &'e Engine, index: EventIndex) -> Result<Cursor<'e>, EngineError> {
        engine.check_index(index)?;
        let state = UnionFind::new(engine.slot_count());
        let mut checkpoints = BTreeMap::new();
        if engine.config().checkpoint_interval > 0 {
            checkpoints.insert(0, state.clone());
        }
        let mut cursor = Cursor {
            engine,
            state,
            applied: 0,
            undo: Vec::new(),
            checkpoints,
            position: index,
        };
        cursor.move_to(engine.effects_through(index));
        Ok(cursor)
    }

    /// The engine this cursor reads.
    pub fn engine(&self) -> &'e Engine {
        self.engine
    }

    /// Current position.
    pub fn position(&self) -> EventIndex {
        self.position
    }

    /// The event at the current position.
    pub fn event(&self) -> Option<EventId> {
        self.engine.table().event_at(self.position)
    }

    /// Number of effects reflected in the current state.
    pub fn applied_effects(&self) -> usize {
        self.applied
    }

    /// Number of stored checkpoints.
    pub fn checkpoint_count(&self) -> usize {
        self.checkpoints.len()
    }

    /// Move to `index`.
    ///
    /// # Errors
    ///
    /// [`EngineError::IndexOutOfRange`] if `index` is not a valid position;
    /// the cursor is left where it was.
    pub fn seek(&mut self, index: EventIndex) -> Result<(), EngineError> {
        self.engine.check_index(index)?;
        self.move_to(self.engine.effects_through(index));
        tracing::debug!(
            from = %self.position,
            to = %index,
            applied = self.applied,
            "cursor seek"
        );
        self.position = index;
        Ok(())
    }

    /// Move to `event`'s before-index.
    pub fn seek_before(&mut self, event: EventId) -> Result<(), EngineError> {
        self.seek(self.engine.before_index(event)?)
    }

    /// Move to `event`'s after-index.
    pub fn seek_after(&mut self, event: EventId) -> Result<(), EngineError> {
        self.seek(self.engine.after_index(event)?)
    }

    /// Move one position forward. Returns `false` at the last position.
    pub fn step_forward(&mut self) -> bool {
        match self.position.next() {
            Some(next) => self.seek(next).is_ok(),
            None => false,
        }
    }

    /// Move one position backward. Returns `false` at position zero.
    pub fn step_backward(&mut self) -> bool {
        match self.position.prev() {
            Some(prev) => self.seek(prev).is_ok(),
            None => false,
        }
    }

    /// The state of `variable` at the current position.
    pub fn resolve(&self, variable: Variable) -> VariableState {
        let known = self.engine.journal().is_known_at(variable, self.position);
        self.engine.state_of(&self.state, variable, known)
    }

    /// The chain from `variable` to its root at the current position.
    pub fn root_path(&self, variable: Variable) -> Vec<Variable> {
        if !self.engine.journal().is_known_at(variable, self.position) {
            return Vec::new();
        }
        self.engine.path_of(&self.state, variable)
    }

    /// Snapshot of every known variable at the current position.
    pub fn snapshot(&self) -> Result<StateSnapshot, EngineError> {
        self.engine.capture(&self.state, self.position)
    }

    /// Bring `state` to exactly `goal` applied effects.
    fn move_to(&mut self, goal: usize) {
        let interval = self.engine.config().checkpoint_interval;

        if goal < self.applied {
            let distance = self.applied - goal;
            let restored = if interval > 0 && distance > interval {
                self.checkpoints
                    .range(..=goal)
                    .next_back()
                    .map(|(&count, state)| (count, state.clone()))
            } else {
                None
            };

            match restored {
                Some((count, state)) => {
                    tracing::debug!(
                        from = self.applied,
                        to = goal,
                        checkpoint = count,
                        "restored cursor checkpoint"
                    );
                    self.state = state;
                    self.applied = count;
                    self.undo.truncate(count);
                }
                None => {
                    while self.applied > goal {
                        let Some(undo) = self.undo.pop() else { break };
                        self.state.revert(undo);
                        self.applied -= 1;
                    }
                }
            }
        }

        let engine = self.engine;
        let effects = engine.effects();
        while self.applied < goal {
            let (_, effect) = &effects[self.applied];
            self.undo.push(self.state.apply(effect, false));
            self.applied += 1;
            if interval > 0 && self.applied % interval == 0 {
                self.checkpoints
                    .entry(self.applied)
                    .or_insert_with(|| self.state.clone());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
