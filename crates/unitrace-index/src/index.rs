//! Linearization of the event forest into a totally ordered position space.
//!
//! [`IndexTable::build`] walks the arena in pre-order and gives every event a
//! *before* and an *after* [`EventIndex`]:
//!
//! - **before** is the event's own pre-order position. Querying state at it
//!   shows everything logged up to and including that event; for a
//!   unification (which has no effect of its own) that is the state right
//!   before its first substep.
//! - **after** is the after-index of the event's last child, or the
//!   before-index itself when the event has no children.
//!
//! An ancestor's `[before, after]` range therefore strictly contains each
//! child's range, and sibling ranges are disjoint and ordered by log order.
//!
//! The same pass validates the arena structure and fails fast on anything
//! that would make those guarantees false (see [`IndexError`]).

use std::fmt;

use serde::{Deserialize, Serialize};
use unitrace_log::event::{EventId, EventLog};

use crate::IndexError;

// ---------------------------------------------------------------------------
// EventIndex
// ---------------------------------------------------------------------------

/// A position in the flattened event stream.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventIndex(u32);

impl EventIndex {
    /// The first position of any non-empty trace.
    pub const ZERO: EventIndex = EventIndex(0);

    /// Reconstruct from a raw position.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw position.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// The position immediately after this one.
    #[inline]
    pub fn next(self) -> Option<EventIndex> {
        self.0.checked_add(1).map(EventIndex)
    }

    /// The position immediately before this one, if any.
    #[inline]
    pub fn prev(self) -> Option<EventIndex> {
        self.0.checked_sub(1).map(EventIndex)
    }

    #[inline]
    pub(crate) fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for EventIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventIndex({})", self.0)
    }
}

impl fmt::Display for EventIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// IndexRange
// ---------------------------------------------------------------------------

/// The inclusive `[before, after]` range covered by an event and its
/// descendants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexRange {
    pub before: EventIndex,
    pub after: EventIndex,
}

impl IndexRange {
    /// Returns `true` if `index` falls inside this range.
    pub fn contains(&self, index: EventIndex) -> bool {
        self.before <= index && index <= self.after
    }

    /// Returns `true` if `other` lies entirely inside this range.
    pub fn encloses(&self, other: &IndexRange) -> bool {
        self.before <= other.before && other.after <= self.after
    }

    /// Returns `true` if the two ranges share no position.
    pub fn is_disjoint(&self, other: &IndexRange) -> bool {
        self.after < other.before || other.after < self.before
    }
}

// ---------------------------------------------------------------------------
// IndexTable
// ---------------------------------------------------------------------------

/// Before/after positions for every event of one [`EventLog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexTable {
    /// Before-index per arena slot.
    before: Vec<EventIndex>,
    /// After-index per arena slot.
    after: Vec<EventIndex>,
    /// Nesting depth per arena slot (roots are depth 0).
    depth: Vec<u32>,
    /// The event occupying each position.
    order: Vec<EventId>,
}

/// Traversal frame: an event whose children are still being visited.
struct Frame {
    id: EventId,
    next_child: usize,
}

impl IndexTable {
    /// Index `log` in a single pre-order pass.
    ///
    /// # Errors
    ///
    /// Fails on the first structural contract violation: a missing or
    /// doubly-referenced event, a parent link that disagrees with the child
    /// list, children out of chronological order, children under a leaf
    /// event, or an event unreachable from the roots.
    pub fn build(log: &EventLog) -> Result<IndexTable, IndexError> {
        let len = log.len();
        let mut before: Vec<Option<EventIndex>> = vec![None; len];
        let mut after: Vec<Option<EventIndex>> = vec![None; len];
        let mut depth = vec![0u32; len];
        let mut order: Vec<EventId> = Vec::with_capacity(len);
        let mut last_visited: Option<EventId> = None;

        let mut stack: Vec<Frame> = Vec::new();
        for &root in log.roots() {
            enter(log, root, None, &mut last_visited, &mut before, &mut order)?;
            stack.push(Frame {
                id: root,
                next_child: 0,
            });

            while let Some(frame) = stack.last_mut() {
                let id = frame.id;
                let children = log.children(id);
                if let Some(&child) = children.get(frame.next_child) {
                    frame.next_child += 1;
                    enter(log, child, Some(id), &mut last_visited, &mut before, &mut order)?;
                    depth[child.slot() as usize] = stack.len() as u32;
                    stack.push(Frame {
                        id: child,
                        next_child: 0,
                    });
                    continue;
                }

                // Every child is closed; close this event.
                let own_before = before[id.slot() as usize];
                let closed = match children.last() {
                    Some(&last) => after[last.slot() as usize],
                    None => own_before,
                };
                after[id.slot() as usize] = closed;
                stack.pop();
            }
        }

        if order.len() != len {
            let unreachable = before
                .iter()
                .position(Option::is_none)
                .map_or(EventId::new(0), |slot| EventId::new(slot as u32));
            return Err(IndexError::Unreachable { event: unreachable });
        }

        // Every slot was entered exactly once and closed, so both tables are full.
        let before: Vec<EventIndex> = before.into_iter().flatten().collect();
        let after: Vec<EventIndex> = after.into_iter().flatten().collect();

        tracing::debug!(events = len, roots = log.roots().len(), "indexed event log");

        Ok(IndexTable {
            before,
            after,
            depth,
            order,
        })
    }

    /// Number of indexed positions (one per event).
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` for the table of an empty log.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The greatest valid position, if any.
    pub fn last_index(&self) -> Option<EventIndex> {
        self.order
            .len()
            .checked_sub(1)
            .map(|last| EventIndex::from_raw(last as u32))
    }

    /// Returns `true` if `index` is a valid position of this table.
    pub fn contains(&self, index: EventIndex) -> bool {
        index.as_usize() < self.order.len()
    }

    /// Position of the event itself.
    pub fn before(&self, event: EventId) -> Option<EventIndex> {
        self.before.get(event.slot() as usize).copied()
    }

    /// Position after the event's last descendant (its before-index when it
    /// has no children).
    pub fn after(&self, event: EventId) -> Option<EventIndex> {
        self.after.get(event.slot() as usize).copied()
    }

    /// The `[before, after]` range of `event`.
    pub fn range(&self, event: EventId) -> Option<IndexRange> {
        Some(IndexRange {
            before: self.before(event)?,
            after: self.after(event)?,
        })
    }

    /// Nesting depth of `event`; roots are at depth 0.
    pub fn depth(&self, event: EventId) -> Option<u32> {
        self.depth.get(event.slot() as usize).copied()
    }

    /// The event occupying position `index`.
    pub fn event_at(&self, index: EventIndex) -> Option<EventId> {
        self.order.get(index.as_usize()).copied()
    }

    /// Events in position order.
    pub fn iter(&self) -> impl Iterator<Item = (EventIndex, EventId)> + '_ {
        self.order
            .iter()
            .enumerate()
            .map(|(pos, &id)| (EventIndex::from_raw(pos as u32), id))
    }
}

/// Validate `id` as the next event in pre-order and assign its before-index.
fn enter(
    log: &EventLog,
    id: EventId,
    parent: Option<EventId>,
    last_visited: &mut Option<EventId>,
    before: &mut [Option<EventIndex>],
    order: &mut Vec<EventId>,
) -> Result<(), IndexError> {
    let node = log.node(id).ok_or(IndexError::MissingEvent {
        event: id,
        referenced_by: parent,
    })?;
    let slot = id.slot() as usize;

    if before[slot].is_some() {
        return Err(IndexError::ReachedTwice { event: id });
    }
    if node.parent != parent {
        return Err(IndexError::ParentMismatch {
            event: id,
            recorded: node.parent,
            actual: parent,
        });
    }
    if let Some(previous) = *last_visited {
        if id <= previous {
            return Err(IndexError::OutOfOrder {
                event: id,
                previous,
            });
        }
    }
    if !node.children.is_empty() && node.event.as_unification().is_none() {
        return Err(IndexError::ChildrenOnLeaf { event: id });
    }

    *last_visited = Some(id);
    before[slot] = Some(EventIndex::from_raw(order.len() as u32));
    order.push(id);
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
