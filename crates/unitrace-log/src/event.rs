//! Unification events and the flat event arena.
//!
//! The unifier emits a forest of [`Event`]s: every [`Unification`] owns the
//! ordered substeps it performed, and the leaves record the individual
//! union-find mutations ([`Event::VariableUnified`] and
//! [`Event::VariableSetDescriptor`]).
//!
//! Instead of owning children recursively, the forest is stored as a flat
//! arena ([`EventLog`]) of [`EventNode`]s addressed by [`EventId`], with
//! explicit parent and child links. Ids are assigned in log order, so a
//! well-formed log always has each child's id greater than its parent's and
//! greater than every id in its previous sibling's subtree.
//!
//! # Example
//!
//! ```
//! use unitrace_log::prelude::*;
//!
//! let mut builder = EventLogBuilder::new();
//! let unify = builder.push_root(Event::unification(
//!     UnifyMode::Eq,
//!     Variable::new(1),
//!     Variable::new(2),
//!     true,
//! ));
//! builder
//!     .push_child(unify, Event::unified(Variable::new(1), Variable::new(2)))
//!     .unwrap();
//!
//! let log = builder.finish();
//! assert_eq!(log.len(), 2);
//! assert_eq!(log.children(unify).len(), 1);
//! ```

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::descriptor::Descriptor;
use crate::variable::Variable;
use crate::LogError;

// ---------------------------------------------------------------------------
// EventId
// ---------------------------------------------------------------------------

/// Address of an event inside an [`EventLog`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(u32);

impl EventId {
    /// Construct an `EventId` from its raw arena slot.
    #[inline]
    pub const fn new(slot: u32) -> Self {
        Self(slot)
    }

    /// The raw arena slot.
    #[inline]
    pub fn slot(self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", self.0)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// UnifyMode
// ---------------------------------------------------------------------------

/// How the unifier was asked to relate the two sides of a unification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnifyMode {
    /// Solve the two types for structural equality.
    Eq,
    /// Treat the right-hand side as present in the left-hand side.
    Present,
    /// Specialize a lambda set.
    LambdaSetSpecialization,
}

impl fmt::Display for UnifyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            UnifyMode::Eq => "~",
            UnifyMode::Present => "+=",
            UnifyMode::LambdaSetSpecialization => "~λ",
        };
        f.write_str(symbol)
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// The header of a unification step. Its substeps live in the arena as the
/// children of the node holding it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Unification {
    pub mode: UnifyMode,
    pub left: Variable,
    pub right: Variable,
    pub success: bool,
}

/// A single logged unifier event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    /// An attempt to unify two variables. Carries no effect of its own.
    Unification(Unification),
    /// `from`'s root now points at `into`'s root.
    VariableUnified { from: Variable, into: Variable },
    /// The descriptor at `variable`'s root was assigned or updated.
    VariableSetDescriptor {
        variable: Variable,
        #[serde(flatten)]
        descriptor: Descriptor,
    },
}

impl Event {
    /// Shorthand for an [`Event::Unification`].
    pub fn unification(mode: UnifyMode, left: Variable, right: Variable, success: bool) -> Self {
        Event::Unification(Unification {
            mode,
            left,
            right,
            success,
        })
    }

    /// Shorthand for an [`Event::VariableUnified`].
    pub fn unified(from: Variable, into: Variable) -> Self {
        Event::VariableUnified { from, into }
    }

    /// Shorthand for an [`Event::VariableSetDescriptor`].
    pub fn set_descriptor(variable: Variable, descriptor: Descriptor) -> Self {
        Event::VariableSetDescriptor {
            variable,
            descriptor,
        }
    }

    /// Returns `true` if this event mutates union-find state when replayed.
    pub fn is_effect(&self) -> bool {
        match self {
            Event::Unification(_) => false,
            Event::VariableUnified { .. } | Event::VariableSetDescriptor { .. } => true,
        }
    }

    /// The unification header, if this is a unification.
    pub fn as_unification(&self) -> Option<&Unification> {
        match self {
            Event::Unification(unification) => Some(unification),
            Event::VariableUnified { .. } | Event::VariableSetDescriptor { .. } => None,
        }
    }

    /// The variables this event directly names (not those inside content).
    pub fn direct_variables(&self) -> Vec<Variable> {
        match self {
            Event::Unification(u) => vec![u.left, u.right],
            Event::VariableUnified { from, into } => vec![*from, *into],
            Event::VariableSetDescriptor { variable, .. } => vec![*variable],
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Unification(u) => {
                let outcome = if u.success { "ok" } else { "failed" };
                write!(f, "{} {} {} ({outcome})", u.left, u.mode, u.right)
            }
            Event::VariableUnified { from, into } => write!(f, "{from} => {into}"),
            Event::VariableSetDescriptor {
                variable,
                descriptor,
            } => write!(f, "{variable} := {descriptor}"),
        }
    }
}

// ---------------------------------------------------------------------------
// EventNode
// ---------------------------------------------------------------------------

/// One arena slot: an event plus its structural links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventNode {
    pub event: Event,
    /// `None` for root events.
    #[serde(default)]
    pub parent: Option<EventId>,
    /// Substeps, in the order the unifier produced them.
    #[serde(default)]
    pub children: Vec<EventId>,
}

impl EventNode {
    /// A node with no links.
    pub fn new(event: Event) -> Self {
        Self {
            event,
            parent: None,
            children: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// EventLog
// ---------------------------------------------------------------------------

/// The immutable event forest, stored as an arena.
///
/// An `EventLog` produced by [`EventLogBuilder`] or
/// [`EventLog::from_document`](crate::schema) is structurally well formed.
/// One produced by [`EventLog::from_raw_parts`] is taken as-is; the indexer
/// validates it before anything is computed from it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    nodes: Vec<EventNode>,
    roots: Vec<EventId>,
    #[serde(default)]
    declared: BTreeSet<Variable>,
}

impl EventLog {
    /// Assemble a log from a flat arena without checking its structure.
    pub fn from_raw_parts(
        nodes: Vec<EventNode>,
        roots: Vec<EventId>,
        declared: BTreeSet<Variable>,
    ) -> Self {
        Self {
            nodes,
            roots,
            declared,
        }
    }

    /// Total number of events, at every nesting level.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the log holds no events.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Root events in log order.
    pub fn roots(&self) -> &[EventId] {
        &self.roots
    }

    /// The arena node for `id`, if it exists.
    pub fn node(&self, id: EventId) -> Option<&EventNode> {
        self.nodes.get(id.as_usize())
    }

    /// The event stored at `id`, if it exists.
    pub fn event(&self, id: EventId) -> Option<&Event> {
        self.node(id).map(|node| &node.event)
    }

    /// The children of `id`, or an empty slice for unknown ids.
    pub fn children(&self, id: EventId) -> &[EventId] {
        self.node(id).map_or(&[], |node| node.children.as_slice())
    }

    /// The parent of `id`, if it has one.
    pub fn parent(&self, id: EventId) -> Option<EventId> {
        self.node(id).and_then(|node| node.parent)
    }

    /// Variables declared up front, independently of any event.
    pub fn declared_variables(&self) -> &BTreeSet<Variable> {
        &self.declared
    }

    /// Iterate over every `(id, node)` pair in arena order.
    pub fn iter(&self) -> impl Iterator<Item = (EventId, &EventNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(slot, node)| (EventId::new(slot as u32), node))
    }
}

// ---------------------------------------------------------------------------
// EventLogBuilder
// ---------------------------------------------------------------------------

/// Appends events in log order, producing a structurally sound [`EventLog`].
///
/// Children must be pushed before the next sibling of their parent so the
/// arena stays in chronological pre-order.
#[derive(Debug, Default)]
pub struct EventLogBuilder {
    log: EventLog,
    /// Open unifications from the root down to the most recently pushed one.
    open: Vec<EventId>,
}

impl EventLogBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a variable without any event mentioning it.
    pub fn declare(&mut self, variable: Variable) -> &mut Self {
        self.log.declared.insert(variable);
        self
    }

    /// Append a new root event.
    pub fn push_root(&mut self, event: Event) -> EventId {
        let id = self.alloc(EventNode::new(event));
        self.log.roots.push(id);
        self.open.clear();
        self.open.push(id);
        id
    }

    /// Append `event` as the next substep of `parent`.
    ///
    /// `parent` must be a unification on the currently open path: the most
    /// recently pushed event or one of its ancestors. Anything else would
    /// put the child out of chronological order.
    pub fn push_child(&mut self, parent: EventId, event: Event) -> Result<EventId, LogError> {
        let parent_node = self
            .log
            .nodes
            .get(parent.as_usize())
            .ok_or(LogError::UnknownParent { parent })?;
        if parent_node.event.as_unification().is_none() {
            return Err(LogError::ParentNotUnification { parent });
        }
        let depth = self
            .open
            .iter()
            .rposition(|&open| open == parent)
            .ok_or(LogError::ParentClosed { parent })?;

        let mut node = EventNode::new(event);
        node.parent = Some(parent);
        let id = self.alloc(node);
        self.log.nodes[parent.as_usize()].children.push(id);
        self.open.truncate(depth + 1);
        self.open.push(id);
        Ok(id)
    }

    /// Number of events pushed so far.
    pub fn len(&self) -> usize {
        self.log.nodes.len()
    }

    /// Returns `true` if nothing has been pushed.
    pub fn is_empty(&self) -> bool {
        self.log.nodes.is_empty()
    }

    /// Finish building and return the immutable log.
    pub fn finish(self) -> EventLog {
        self.log
    }

    fn alloc(&mut self, node: EventNode) -> EventId {
        let id = EventId::new(self.log.nodes.len() as u32);
        self.log.nodes.push(node);
        id
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Content;

    fn v(n: u32) -> Variable {
        Variable::new(n)
    }

    fn eq(left: u32, right: u32) -> Event {
        Event::unification(UnifyMode::Eq, v(left), v(right), true)
    }

    #[test]
    fn builder_links_parents_and_children() {
        let mut b = EventLogBuilder::new();
        let root = b.push_root(eq(1, 2));
        let a = b.push_child(root, Event::unified(v(1), v(2))).unwrap();
        let c = b
            .push_child(root, Event::set_descriptor(v(2), Descriptor::with_content(Content::flex())))
            .unwrap();
        let log = b.finish();

        assert_eq!(log.roots(), &[root]);
        assert_eq!(log.children(root), &[a, c]);
        assert_eq!(log.parent(a), Some(root));
        assert_eq!(log.parent(root), None);
        assert!(log.event(a).unwrap().is_effect());
        assert!(!log.event(root).unwrap().is_effect());
    }

    #[test]
    fn nested_children_keep_preorder_ids() {
        let mut b = EventLogBuilder::new();
        let root = b.push_root(eq(1, 2));
        let inner = b.push_child(root, eq(3, 4)).unwrap();
        let leaf = b.push_child(inner, Event::unified(v(3), v(4))).unwrap();
        // Closing `inner` by pushing another child of `root`.
        let after = b.push_child(root, Event::unified(v(1), v(2))).unwrap();

        assert!(root < inner && inner < leaf && leaf < after);
        let log = b.finish();
        assert_eq!(log.children(root), &[inner, after]);
    }

    #[test]
    fn push_child_rejects_unknown_parent() {
        let mut b = EventLogBuilder::new();
        let err = b.push_child(EventId::new(5), eq(1, 2)).unwrap_err();
        assert!(matches!(err, LogError::UnknownParent { .. }));
    }

    #[test]
    fn push_child_rejects_effect_parent() {
        let mut b = EventLogBuilder::new();
        let leaf = b.push_root(Event::unified(v(1), v(2)));
        let err = b.push_child(leaf, eq(1, 2)).unwrap_err();
        assert!(matches!(err, LogError::ParentNotUnification { .. }));
    }

    #[test]
    fn push_child_rejects_closed_parent() {
        let mut b = EventLogBuilder::new();
        let first = b.push_root(eq(1, 2));
        let _second = b.push_root(eq(3, 4));
        let err = b.push_child(first, Event::unified(v(1), v(2))).unwrap_err();
        assert!(matches!(err, LogError::ParentClosed { .. }));
    }

    #[test]
    fn declared_variables_are_kept() {
        let mut b = EventLogBuilder::new();
        b.declare(v(9)).declare(v(3));
        let log = b.finish();
        assert!(log.is_empty());
        assert_eq!(log.declared_variables().iter().copied().collect::<Vec<_>>(), vec![v(3), v(9)]);
    }

    #[test]
    fn event_display() {
        assert_eq!(eq(1, 2).to_string(), "v1 ~ v2 (ok)");
        assert_eq!(Event::unified(v(1), v(2)).to_string(), "v1 => v2");
        let present = Event::unification(UnifyMode::Present, v(1), v(2), false);
        assert_eq!(present.to_string(), "v1 += v2 (failed)");
    }

    #[test]
    fn direct_variables_per_variant() {
        assert_eq!(eq(1, 2).direct_variables(), vec![v(1), v(2)]);
        assert_eq!(Event::unified(v(3), v(4)).direct_variables(), vec![v(3), v(4)]);
        assert_eq!(
            Event::set_descriptor(v(5), Descriptor::default()).direct_variables(),
            vec![v(5)]
        );
    }
}
