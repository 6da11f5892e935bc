//! Nested trace schema and its lowering into the event arena.
//!
//! The unifier hands over its trace as a recursive document: a list of root
//! [`EventTree`]s, each unification carrying its substeps inline. Any
//! serialization preserving that shape is accepted; JSON is supported out of
//! the box:
//!
//! ```
//! use unitrace_log::prelude::*;
//!
//! let log = EventLog::from_json(r#"{
//!     "events": [
//!         { "kind": "unification", "mode": "eq", "left": 1, "right": 2, "success": true,
//!           "children": [ { "kind": "variable_unified", "from": 1, "into": 2 } ] }
//!     ]
//! }"#).unwrap();
//!
//! assert_eq!(log.len(), 2);
//! ```

use serde::{Deserialize, Serialize};

use crate::descriptor::Descriptor;
use crate::event::{Event, EventId, EventLog, EventLogBuilder, UnifyMode};
use crate::variable::Variable;
use crate::LogError;

// ---------------------------------------------------------------------------
// TraceDocument
// ---------------------------------------------------------------------------

/// A complete trace as delivered by the unifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceDocument {
    /// Variables that exist before the first event mentions them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<Variable>,
    /// Root events in log order.
    pub events: Vec<EventTree>,
}

/// One event with its substeps inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventTree {
    Unification {
        mode: UnifyMode,
        left: Variable,
        right: Variable,
        success: bool,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        children: Vec<EventTree>,
    },
    VariableUnified {
        from: Variable,
        into: Variable,
        /// Must be empty; lowering rejects anything else.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        children: Vec<EventTree>,
    },
    VariableSetDescriptor {
        variable: Variable,
        #[serde(flatten)]
        descriptor: Descriptor,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        children: Vec<EventTree>,
    },
}

impl EventTree {
    /// The arena event for this node, without its children.
    fn header(&self) -> Event {
        match self {
            EventTree::Unification {
                mode,
                left,
                right,
                success,
                ..
            } => Event::unification(*mode, *left, *right, *success),
            EventTree::VariableUnified { from, into, .. } => Event::unified(*from, *into),
            EventTree::VariableSetDescriptor {
                variable,
                descriptor,
                ..
            } => Event::set_descriptor(*variable, descriptor.clone()),
        }
    }

    /// Substeps listed under this node, whatever its kind.
    pub fn children(&self) -> &[EventTree] {
        match self {
            EventTree::Unification { children, .. }
            | EventTree::VariableUnified { children, .. }
            | EventTree::VariableSetDescriptor { children, .. } => children,
        }
    }

    fn children_mut(&mut self) -> &mut Vec<EventTree> {
        match self {
            EventTree::Unification { children, .. }
            | EventTree::VariableUnified { children, .. }
            | EventTree::VariableSetDescriptor { children, .. } => children,
        }
    }

    /// Push `event` into `builder` and check that only unifications carry
    /// substeps.
    fn lower(
        &self,
        builder: &mut EventLogBuilder,
        parent: Option<EventId>,
    ) -> Result<EventId, LogError> {
        let header = self.header();
        let is_leaf = header.as_unification().is_none();
        let id = match parent {
            Some(parent) => builder.push_child(parent, header)?,
            None => builder.push_root(header),
        };
        if is_leaf && !self.children().is_empty() {
            return Err(LogError::ChildrenOnLeaf { event: id });
        }
        Ok(id)
    }
}

/// Drop a forest without recursing once per nesting level.
fn dismantle(mut pending: Vec<EventTree>) {
    while let Some(mut tree) = pending.pop() {
        pending.append(tree.children_mut());
    }
}

// ---------------------------------------------------------------------------
// Lowering
// ---------------------------------------------------------------------------

impl EventLog {
    /// Lower a nested document into the arena, preserving log order.
    pub fn from_document(document: &TraceDocument) -> Result<EventLog, LogError> {
        let mut builder = EventLogBuilder::new();
        for &variable in &document.variables {
            builder.declare(variable);
        }

        // Explicit stack of (parent, pending children) keeps deep traces off
        // the call stack.
        let mut stack: Vec<(EventId, std::slice::Iter<'_, EventTree>)> = Vec::new();
        for tree in &document.events {
            let root = tree.lower(&mut builder, None)?;
            stack.push((root, tree.children().iter()));

            while let Some((parent, pending)) = stack.last_mut() {
                let parent = *parent;
                match pending.next() {
                    Some(child) => {
                        let id = child.lower(&mut builder, Some(parent))?;
                        stack.push((id, child.children().iter()));
                    }
                    None => {
                        stack.pop();
                    }
                }
            }
        }

        let log = builder.finish();
        tracing::debug!(
            events = log.len(),
            roots = log.roots().len(),
            "lowered trace document into event arena"
        );
        Ok(log)
    }

    /// Parse a JSON [`TraceDocument`] and lower it.
    ///
    /// Nesting depth is not limited; the parser grows its stack on the heap
    /// as needed.
    pub fn from_json(json: &str) -> Result<EventLog, LogError> {
        let mut deserializer = serde_json::Deserializer::from_str(json);
        deserializer.disable_recursion_limit();
        let document =
            TraceDocument::deserialize(serde_stacker::Deserializer::new(&mut deserializer))?;
        deserializer.end()?;

        let lowered = Self::from_document(&document);
        dismantle(document.events);
        lowered
    }

    /// Rebuild the nested document for this log.
    ///
    /// Returns `None` if the arena links are inconsistent (a child id that
    /// does not exist or does not follow its parent).
    pub fn to_document(&self) -> Option<TraceDocument> {
        // Children always follow their parent in the arena, so walking ids
        // backwards finishes every subtree before the node that owns it.
        let mut built: Vec<Option<EventTree>> = vec![None; self.len()];
        for (id, node) in self.iter().collect::<Vec<_>>().into_iter().rev() {
            let tree = match &node.event {
                Event::Unification(u) => EventTree::Unification {
                    mode: u.mode,
                    left: u.left,
                    right: u.right,
                    success: u.success,
                    children: node
                        .children
                        .iter()
                        .map(|&child| built.get_mut(child.as_usize())?.take())
                        .collect::<Option<Vec<_>>>()?,
                },
                Event::VariableUnified { from, into } => EventTree::VariableUnified {
                    from: *from,
                    into: *into,
                    children: Vec::new(),
                },
                Event::VariableSetDescriptor {
                    variable,
                    descriptor,
                } => EventTree::VariableSetDescriptor {
                    variable: *variable,
                    descriptor: descriptor.clone(),
                    children: Vec::new(),
                },
            };
            *built.get_mut(id.as_usize())? = Some(tree);
        }

        let events = self
            .roots()
            .iter()
            .map(|&root| built.get_mut(root.as_usize())?.take())
            .collect::<Option<Vec<_>>>()?;
        Some(TraceDocument {
            variables: self.declared_variables().iter().copied().collect(),
            events,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Content;
    use crate::variable::Rank;

    fn v(n: u32) -> Variable {
        Variable::new(n)
    }

    #[test]
    fn lowering_preserves_preorder() {
        let doc = TraceDocument {
            variables: vec![],
            events: vec![
                EventTree::Unification {
                    mode: UnifyMode::Eq,
                    left: v(1),
                    right: v(2),
                    success: true,
                    children: vec![
                        EventTree::Unification {
                            mode: UnifyMode::Eq,
                            left: v(3),
                            right: v(4),
                            success: true,
                            children: vec![EventTree::VariableUnified {
                                from: v(3),
                                into: v(4),
                                children: vec![],
                            }],
                        },
                        EventTree::VariableUnified {
                            from: v(1),
                            into: v(2),
                            children: vec![],
                        },
                    ],
                },
                EventTree::VariableUnified {
                    from: v(5),
                    into: v(1),
                    children: vec![],
                },
            ],
        };

        let log = EventLog::from_document(&doc).unwrap();
        assert_eq!(log.len(), 5);
        assert_eq!(log.roots(), &[EventId::new(0), EventId::new(4)]);
        assert_eq!(log.children(EventId::new(0)), &[EventId::new(1), EventId::new(3)]);
        assert_eq!(log.children(EventId::new(1)), &[EventId::new(2)]);
        assert_eq!(log.event(EventId::new(2)), Some(&Event::unified(v(3), v(4))));
    }

    #[test]
    fn json_descriptor_fields_are_flattened() {
        let log = EventLog::from_json(
            r#"{
                "variables": [7],
                "events": [
                    { "kind": "variable_set_descriptor", "variable": 7, "rank": 2,
                      "content": { "type": "flex", "name": "a" } }
                ]
            }"#,
        )
        .unwrap();

        assert!(log.declared_variables().contains(&v(7)));
        let expected = Event::set_descriptor(
            v(7),
            Descriptor::new(
                Content::Flex {
                    name: Some("a".to_owned()),
                },
                Rank(2),
            ),
        );
        assert_eq!(log.event(EventId::new(0)), Some(&expected));
    }

    #[test]
    fn json_rank_only_update() {
        let log = EventLog::from_json(
            r#"{ "events": [ { "kind": "variable_set_descriptor", "variable": 1, "rank": 4 } ] }"#,
        )
        .unwrap();
        match log.event(EventId::new(0)) {
            Some(Event::VariableSetDescriptor { descriptor, .. }) => {
                assert_eq!(descriptor.rank, Some(Rank(4)));
                assert_eq!(descriptor.content, None);
            }
            other => panic!("expected set descriptor, got {other:?}"),
        }
    }

    #[test]
    fn invalid_json_is_an_error() {
        let err = EventLog::from_json(r#"{ "events": [ { "kind": "bogus" } ] }"#).unwrap_err();
        assert!(matches!(err, LogError::Json(_)));
    }

    #[test]
    fn document_survives_lowering_and_rebuilding() {
        let json = r#"{
            "variables": [9],
            "events": [
                { "kind": "unification", "mode": "present", "left": 1, "right": 2, "success": false,
                  "children": [
                    { "kind": "variable_set_descriptor", "variable": 2,
                      "content": { "type": "error" } }
                  ] }
            ]
        }"#;
        let doc: TraceDocument = serde_json::from_str(json).unwrap();
        let log = EventLog::from_document(&doc).unwrap();
        assert_eq!(log.to_document(), Some(doc));
    }

    #[test]
    fn children_on_a_descriptor_update_are_rejected() {
        let err = EventLog::from_json(
            r#"{ "events": [
                { "kind": "unification", "mode": "eq", "left": 1, "right": 2, "success": true,
                  "children": [
                    { "kind": "variable_set_descriptor", "variable": 1, "rank": 1,
                      "children": [ { "kind": "variable_unified", "from": 1, "into": 2 } ] }
                  ] }
            ] }"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            LogError::ChildrenOnLeaf { event } if event == EventId::new(1)
        ));
    }

    #[test]
    fn deep_log_rebuilds_without_recursion() {
        const DEPTH: u32 = 200_000;
        let mut b = EventLogBuilder::new();
        let mut parent = b.push_root(Event::unification(UnifyMode::Eq, v(1), v(2), true));
        for _ in 1..DEPTH {
            parent = b
                .push_child(parent, Event::unification(UnifyMode::Eq, v(1), v(2), true))
                .unwrap();
        }
        b.push_child(parent, Event::unified(v(1), v(2))).unwrap();
        let log = b.finish();

        let document = log.to_document().unwrap();
        let mut depth = 0;
        let mut current = &document.events[0];
        while let Some(child) = current.children().first() {
            current = child;
            depth += 1;
        }
        assert_eq!(depth, DEPTH);
        assert!(matches!(current, EventTree::VariableUnified { .. }));

        dismantle(document.events);
    }
}
