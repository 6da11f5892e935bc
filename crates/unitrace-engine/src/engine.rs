//! The trace engine: indexed log plus point-in-time variable resolution.
//!
//! [`Engine::build`] takes ownership of a complete [`EventLog`], indexes and
//! validates it, and precomputes the ordered list of effects (unions and
//! descriptor updates). After that the engine is immutable: every query takes
//! `&self`, so one engine can be shared by any number of readers.
//!
//! # Resolution
//!
//! [`Engine::resolve`] answers "what is variable `v` as of position `i`?" by
//! replaying every effect at or before `i` into a fresh union-find and
//! reading `v`'s root and the root's descriptor. This full replay is the
//! reference semantics; the [`Cursor`] gives the same answers while moving
//! incrementally between positions.
//!
//! # Example
//!
//! ```
//! use unitrace_engine::prelude::*;
//!
//! let (v1, v2) = (Variable::new(1), Variable::new(2));
//! let mut builder = EventLogBuilder::new();
//! let step = builder.push_root(Event::unification(UnifyMode::Eq, v1, v2, true));
//! builder.push_child(step, Event::unified(v1, v2)).unwrap();
//!
//! let engine = Engine::build(builder.finish()).unwrap();
//! let before = engine.before_index(step).unwrap();
//! let after = engine.after_index(step).unwrap();
//!
//! assert_eq!(engine.resolve(v1, before).unwrap().root(), Some(v1));
//! assert_eq!(engine.resolve(v1, after).unwrap().root(), Some(v2));
//! ```

use std::collections::BTreeMap;

use unitrace_index::index::{EventIndex, IndexRange, IndexTable};
use unitrace_index::journal::{Mention, MentionRole, VariableJournal};
use unitrace_index::{IndexError, TraceIndex};
use unitrace_log::event::{Event, EventId, EventLog};
use unitrace_log::variable::Variable;

use crate::config::EngineConfig;
use crate::cursor::Cursor;
use crate::snapshot::StateSnapshot;
use crate::state::{VariableChange, VariableState};
use crate::union_find::{Effect, UnionFind, VariableSlots};
use crate::EngineError;

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// An indexed, validated, immutable unification trace.
#[derive(Debug)]
pub struct Engine {
    log: EventLog,
    index: TraceIndex,
    slots: VariableSlots,
    /// Effects in position order.
    effects: Vec<(EventIndex, Effect)>,
    config: EngineConfig,
}

impl Engine {
    /// Build an engine with the default [`EngineConfig`].
    pub fn build(log: EventLog) -> Result<Engine, EngineError> {
        Self::build_with_config(log, EngineConfig::default())
    }

    /// Index and validate `log`, then precompute its effects.
    ///
    /// # Errors
    ///
    /// [`EngineError::Malformed`] if the log violates the input contract.
    /// No engine is produced in that case.
    pub fn build_with_config(log: EventLog, config: EngineConfig) -> Result<Engine, EngineError> {
        let index = TraceIndex::build(&log)?;
        let slots = VariableSlots::new(index.journal.variables());

        let mut effects = Vec::new();
        for (position, id) in index.table.iter() {
            let event = log.event(id).ok_or(IndexError::MissingEvent {
                event: id,
                referenced_by: None,
            })?;
            let slot_of = |variable: Variable, role: MentionRole| {
                slots.slot(variable).ok_or(IndexError::UnknownVariable {
                    event: id,
                    variable,
                    role,
                })
            };
            let effect = match event {
                Event::Unification(_) => continue,
                Event::VariableUnified { from, into } => Effect::Union {
                    from: slot_of(*from, MentionRole::UnifiedFrom)?,
                    into: slot_of(*into, MentionRole::UnifiedInto)?,
                },
                Event::VariableSetDescriptor {
                    variable,
                    descriptor,
                } => Effect::Describe {
                    slot: slot_of(*variable, MentionRole::DescriptorTarget)?,
                    descriptor: descriptor.clone(),
                },
            };
            effects.push((position, effect));
        }

        tracing::info!(
            events = log.len(),
            variables = slots.len(),
            effects = effects.len(),
            "built trace engine"
        );

        Ok(Engine {
            log,
            index,
            slots,
            effects,
            config,
        })
    }

    // -- accessors ----------------------------------------------------------

    /// The underlying event log.
    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// The position table.
    pub fn table(&self) -> &IndexTable {
        &self.index.table
    }

    /// The variable journal.
    pub fn journal(&self) -> &VariableJournal {
        &self.index.journal
    }

    /// The configuration this engine was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of positions (one per event).
    pub fn len(&self) -> usize {
        self.index.table.len()
    }

    /// Returns `true` for an engine over an empty log.
    pub fn is_empty(&self) -> bool {
        self.index.table.is_empty()
    }

    /// The greatest valid position, if any.
    pub fn last_index(&self) -> Option<EventIndex> {
        self.index.table.last_index()
    }

    /// Number of effect events (unions and descriptor updates).
    pub fn effect_count(&self) -> usize {
        self.effects.len()
    }

    /// Every declared or directly mentioned variable, ascending.
    pub fn variables(&self) -> impl Iterator<Item = Variable> + '_ {
        self.slots.iter().map(|(_, variable)| variable)
    }

    // -- positions ----------------------------------------------------------

    /// Fail with [`EngineError::IndexOutOfRange`] unless `index` is valid.
    pub fn check_index(&self, index: EventIndex) -> Result<(), EngineError> {
        if self.index.table.contains(index) {
            Ok(())
        } else {
            Err(EngineError::IndexOutOfRange {
                index,
                len: self.len(),
            })
        }
    }

    /// Position of `event` itself: the state there is the state before any
    /// of its substeps.
    pub fn before_index(&self, event: EventId) -> Result<EventIndex, EngineError> {
        self.index
            .table
            .before(event)
            .ok_or(EngineError::UnknownEvent { event })
    }

    /// Position after `event`'s last substep (its before-index if it has
    /// none).
    pub fn after_index(&self, event: EventId) -> Result<EventIndex, EngineError> {
        self.index
            .table
            .after(event)
            .ok_or(EngineError::UnknownEvent { event })
    }

    /// `[before, after]` range of `event`.
    pub fn range(&self, event: EventId) -> Result<IndexRange, EngineError> {
        self.index
            .table
            .range(event)
            .ok_or(EngineError::UnknownEvent { event })
    }

    /// The event at `index`.
    pub fn event_at(&self, index: EventIndex) -> Result<EventId, EngineError> {
        self.check_index(index)?;
        self.index
            .table
            .event_at(index)
            .ok_or(EngineError::IndexOutOfRange {
                index,
                len: self.len(),
            })
    }

    // -- resolution ---------------------------------------------------------

    /// The state of `variable` as of `index`.
    ///
    /// Replays every effect at or before `index`. A variable that no event at
    /// or before `index` names (and that was not declared) is
    /// [`VariableState::Unresolved`].
    pub fn resolve(&self, variable: Variable, index: EventIndex) -> Result<VariableState, EngineError> {
        self.check_index(index)?;
        tracing::trace!(%variable, %index, "resolving variable");

        if !self.journal().is_known_at(variable, index) {
            return Ok(VariableState::Unresolved);
        }
        let uf = self.replay(self.effects_through(index), self.config.compress_paths);
        Ok(self.state_of(&uf, variable, true))
    }

    /// The chain of "unified into" links from `variable` to its root as of
    /// `index`, both ends included. Empty if the variable is unresolved.
    pub fn root_path(&self, variable: Variable, index: EventIndex) -> Result<Vec<Variable>, EngineError> {
        self.check_index(index)?;
        if !self.journal().is_known_at(variable, index) {
            return Ok(Vec::new());
        }
        // Compression would shorten the very chain being reported.
        let uf = self.replay(self.effects_through(index), false);
        Ok(self.path_of(&uf, variable))
    }

    /// Every known variable sharing `variable`'s root as of `index`,
    /// ascending. Empty if the variable is unresolved.
    pub fn equivalence_class(
        &self,
        variable: Variable,
        index: EventIndex,
    ) -> Result<Vec<Variable>, EngineError> {
        self.check_index(index)?;
        let journal = self.journal();
        let Some(slot) = self
            .slots
            .slot(variable)
            .filter(|_| journal.is_known_at(variable, index))
        else {
            return Ok(Vec::new());
        };

        let uf = self.replay(self.effects_through(index), self.config.compress_paths);
        let root = uf.find(slot);
        let mut class: Vec<Variable> = self
            .slots
            .iter()
            .filter(|&(other, member)| journal.is_known_at(member, index) && uf.find(other) == root)
            .map(|(_, member)| member)
            .collect();
        class.sort();
        Ok(class)
    }

    /// Every event naming `variable`, in position order.
    pub fn history(&self, variable: Variable) -> &[Mention] {
        self.journal().mentions(variable)
    }

    /// Variables whose state changes across `event`.
    ///
    /// The "before" side is the state at `event`'s own position without its
    /// own effect (for a unification, exactly its before-index state); the
    /// "after" side is the state at its after-index.
    pub fn changes_within(&self, event: EventId) -> Result<Vec<VariableChange>, EngineError> {
        let range = self.range(event)?;
        let compress = self.config.compress_paths;
        let before_uf = self.replay(self.effects_before(range.before), compress);
        let after_uf = self.replay(self.effects_through(range.after), compress);
        let journal = self.journal();

        let changes = self
            .slots
            .iter()
            .filter_map(|(_, variable)| {
                let before =
                    self.state_of(&before_uf, variable, journal.is_known_at(variable, range.before));
                let after =
                    self.state_of(&after_uf, variable, journal.is_known_at(variable, range.after));
                (before != after).then_some(VariableChange {
                    variable,
                    before,
                    after,
                })
            })
            .collect();
        Ok(changes)
    }

    /// Unification events whose success flag is false, in position order.
    pub fn failed_unifications(&self) -> Vec<EventId> {
        self.index
            .table
            .iter()
            .filter_map(|(_, id)| {
                let unification = self.log.event(id)?.as_unification()?;
                (!unification.success).then_some(id)
            })
            .collect()
    }

    /// Every known variable's state as of `index`, with a content hash.
    pub fn snapshot_at(&self, index: EventIndex) -> Result<StateSnapshot, EngineError> {
        self.check_index(index)?;
        let uf = self.replay(self.effects_through(index), self.config.compress_paths);
        self.capture(&uf, index)
    }

    /// A [`Cursor`] positioned at `index`.
    pub fn cursor(&self, index: EventIndex) -> Result<Cursor<'_>, EngineError> {
        Cursor::new(self, index)
    }

    // -- shared with the cursor ---------------------------------------------

    pub(crate) fn effects(&self) -> &[(EventIndex, Effect)] {
        &self.effects
    }

    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of effects at or before `index`.
    pub(crate) fn effects_through(&self, index: EventIndex) -> usize {
        self.effects.partition_point(|(position, _)| *position <= index)
    }

    /// Number of effects strictly before `index`.
    pub(crate) fn effects_before(&self, index: EventIndex) -> usize {
        self.effects.partition_point(|(position, _)| *position < index)
    }

    /// A fresh union-find with the first `count` effects applied.
    fn replay(&self, count: usize, compress: bool) -> UnionFind {
        let mut uf = UnionFind::new(self.slots.len());
        for (_, effect) in self.effects.iter().take(count) {
            uf.apply(effect, compress);
        }
        uf
    }

    pub(crate) fn state_of(&self, uf: &UnionFind, variable: Variable, known: bool) -> VariableState {
        let Some(slot) = self.slots.slot(variable).filter(|_| known) else {
            return VariableState::Unresolved;
        };
        let root = uf.find(slot);
        VariableState::Resolved {
            root: self.slots.variable(root),
            descriptor: uf.descriptor(root).cloned(),
        }
    }

    pub(crate) fn path_of(&self, uf: &UnionFind, variable: Variable) -> Vec<Variable> {
        self.slots.slot(variable).map_or_else(Vec::new, |slot| {
            uf.path(slot)
                .into_iter()
                .map(|step| self.slots.variable(step))
                .collect()
        })
    }

    pub(crate) fn capture(&self, uf: &UnionFind, index: EventIndex) -> Result<StateSnapshot, EngineError> {
        let journal = self.journal();
        let variables: BTreeMap<Variable, VariableState> = self
            .slots
            .iter()
            .filter(|&(_, variable)| journal.is_known_at(variable, index))
            .map(|(_, variable)| (variable, self.state_of(uf, variable, true)))
            .collect();
        Ok(StateSnapshot::capture(index, variables)?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use unitrace_log::prelude::*;

    fn v(n: u32) -> Variable {
        Variable::new(n)
    }

    fn idx(raw: u32) -> EventIndex {
        EventIndex::from_raw(raw)
    }

    fn str_desc() -> Descriptor {
        Descriptor::with_content(Content::apply("Str", vec![]))
    }

    /// u0: v1 ~ v2 [ e1: v2 := Str, e2: v1 => v2 ], u3: v3 ~ v1 (failed) [ e4: v3 => v1 ]
    fn sample() -> (Engine, Vec<EventId>) {
        let mut b = EventLogBuilder::new();
        let u0 = b.push_root(Event::unification(UnifyMode::Eq, v(1), v(2), true));
        let e1 = b.push_child(u0, Event::set_descriptor(v(2), str_desc())).unwrap();
        let e2 = b.push_child(u0, Event::unified(v(1), v(2))).unwrap();
        let u3 = b.push_root(Event::unification(UnifyMode::Present, v(3), v(1), false));
        let e4 = b.push_child(u3, Event::unified(v(3), v(1))).unwrap();
        (Engine::build(b.finish()).unwrap(), vec![u0, e1, e2, u3, e4])
    }

    #[test]
    fn effects_are_precomputed_in_order() {
        let (engine, _) = sample();
        assert_eq!(engine.len(), 5);
        assert_eq!(engine.effect_count(), 3);
        assert_eq!(engine.effects_through(idx(0)), 0);
        assert_eq!(engine.effects_through(idx(2)), 2);
        assert_eq!(engine.effects_before(idx(2)), 1);
        assert_eq!(engine.variables().collect::<Vec<_>>(), vec![v(1), v(2), v(3)]);
    }

    #[test]
    fn resolve_walks_through_the_trace() {
        let (engine, ids) = sample();
        let u0 = ids[0];

        let before = engine.resolve(v(1), engine.before_index(u0).unwrap()).unwrap();
        assert_eq!(
            before,
            VariableState::Resolved {
                root: v(1),
                descriptor: None
            }
        );

        let after = engine.resolve(v(1), engine.after_index(u0).unwrap()).unwrap();
        assert_eq!(
            after,
            VariableState::Resolved {
                root: v(2),
                descriptor: Some(str_desc())
            }
        );

        // v3 is first named by u3.
        assert_eq!(engine.resolve(v(3), idx(2)).unwrap(), VariableState::Unresolved);
        let last = engine.resolve(v(3), idx(4)).unwrap();
        assert_eq!(last.root(), Some(v(2)));
        assert_eq!(last.descriptor(), Some(&str_desc()));
    }

    #[test]
    fn out_of_range_index_is_reported() {
        let (engine, _) = sample();
        let err = engine.resolve(v(1), idx(5)).unwrap_err();
        assert!(matches!(err, EngineError::IndexOutOfRange { len: 5, .. }));
        assert!(engine.event_at(idx(99)).is_err());
        assert!(engine.snapshot_at(idx(5)).is_err());
    }

    #[test]
    fn unknown_event_is_reported() {
        let (engine, _) = sample();
        assert!(matches!(
            engine.before_index(EventId::new(40)),
            Err(EngineError::UnknownEvent { .. })
        ));
        assert!(engine.changes_within(EventId::new(40)).is_err());
    }

    #[test]
    fn root_path_and_class() {
        let (engine, _) = sample();
        assert_eq!(engine.root_path(v(3), idx(4)).unwrap(), vec![v(3), v(2)]);
        assert_eq!(engine.root_path(v(3), idx(3)).unwrap(), vec![v(3)]);
        assert!(engine.root_path(v(3), idx(0)).unwrap().is_empty());

        assert_eq!(engine.equivalence_class(v(2), idx(4)).unwrap(), vec![v(1), v(2), v(3)]);
        assert_eq!(engine.equivalence_class(v(2), idx(2)).unwrap(), vec![v(1), v(2)]);
        assert!(engine.equivalence_class(v(9), idx(2)).unwrap().is_empty());
    }

    #[test]
    fn changes_within_unification() {
        let (engine, ids) = sample();
        let changes = engine.changes_within(ids[0]).unwrap();
        let changed: Vec<Variable> = changes.iter().map(|c| c.variable).collect();
        assert_eq!(changed, vec![v(1), v(2)]);
        assert_eq!(changes[0].before.root(), Some(v(1)));
        assert_eq!(changes[0].after.root(), Some(v(2)));
        assert_eq!(changes[1].before.descriptor(), None);
        assert_eq!(changes[1].after.descriptor(), Some(&str_desc()));
    }

    #[test]
    fn changes_within_leaf_excludes_prior_state() {
        let (engine, ids) = sample();
        let changes = engine.changes_within(ids[4]).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].variable, v(3));
        assert_eq!(changes[0].before.root(), Some(v(3)));
        assert_eq!(changes[0].after.root(), Some(v(2)));
    }

    #[test]
    fn failed_unifications_are_listed() {
        let (engine, ids) = sample();
        assert_eq!(engine.failed_unifications(), vec![ids[3]]);
    }

    #[test]
    fn history_lists_mentions() {
        let (engine, ids) = sample();
        let events: Vec<EventId> = engine.history(v(3)).iter().map(|m| m.event).collect();
        assert_eq!(events, vec![ids[3], ids[4]]);
        assert!(engine.history(v(42)).is_empty());
    }

    #[test]
    fn compression_setting_does_not_change_answers() {
        let (engine, _) = sample();
        let plain = Engine::build_with_config(
            engine.log().clone(),
            EngineConfig {
                compress_paths: false,
                ..EngineConfig::default()
            },
        )
        .unwrap();
        for raw in 0..5 {
            for n in 1..=3 {
                assert_eq!(
                    engine.resolve(v(n), idx(raw)).unwrap(),
                    plain.resolve(v(n), idx(raw)).unwrap()
                );
            }
        }
    }

    #[test]
    fn empty_engine_rejects_every_index() {
        let engine = Engine::build(EventLog::default()).unwrap();
        assert!(engine.is_empty());
        assert_eq!(engine.last_index(), None);
        assert!(engine.resolve(v(1), idx(0)).is_err());
    }
}
