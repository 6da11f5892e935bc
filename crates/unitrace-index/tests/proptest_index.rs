//! Property tests for the indexer.
//!
//! Random well-formed logs are generated from a sequence of builder
//! operations (open a unification, close it, log a union, log a descriptor
//! update). The tests verify the ordering and containment guarantees of the
//! resulting [`IndexTable`].

use proptest::prelude::*;
use unitrace_index::prelude::*;
use unitrace_log::prelude::*;

const VARIABLES: u32 = 8;

#[derive(Debug, Clone)]
enum LogOp {
    Open(u32, u32),
    Close,
    Unify(u32, u32),
    Describe(u32),
}

fn log_op_strategy() -> impl Strategy<Value = LogOp> {
    prop_oneof![
        (0..VARIABLES, 0..VARIABLES).prop_map(|(l, r)| LogOp::Open(l, r)),
        Just(LogOp::Close),
        (0..VARIABLES, 0..VARIABLES).prop_map(|(a, b)| LogOp::Unify(a, b)),
        (0..VARIABLES).prop_map(LogOp::Describe),
    ]
}

fn push(builder: &mut EventLogBuilder, open: &[EventId], event: Event) -> EventId {
    match open.last() {
        Some(&parent) => builder
            .push_child(parent, event)
            .expect("parent is the innermost open unification"),
        None => builder.push_root(event),
    }
}

/// Build a log from `ops`. Every variable is declared so any union is valid.
fn build_log(ops: &[LogOp]) -> EventLog {
    let mut builder = EventLogBuilder::new();
    for n in 0..VARIABLES {
        builder.declare(Variable::new(n));
    }
    let mut open: Vec<EventId> = Vec::new();

    for op in ops {
        match op {
            LogOp::Open(l, r) => {
                let event = Event::unification(UnifyMode::Eq, Variable::new(*l), Variable::new(*r), true);
                let id = push(&mut builder, &open, event);
                open.push(id);
            }
            LogOp::Close => {
                open.pop();
            }
            LogOp::Unify(a, b) => {
                push(&mut builder, &open, Event::unified(Variable::new(*a), Variable::new(*b)));
            }
            LogOp::Describe(a) => {
                push(
                    &mut builder,
                    &open,
                    Event::set_descriptor(Variable::new(*a), Descriptor::with_content(Content::flex())),
                );
            }
        }
    }
    builder.finish()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn every_event_gets_a_position(ops in prop::collection::vec(log_op_strategy(), 0..80)) {
        let log = build_log(&ops);
        let index = TraceIndex::build(&log).unwrap();

        prop_assert_eq!(index.table.len(), log.len());
        for (position, id) in index.table.iter() {
            prop_assert_eq!(index.table.before(id), Some(position));
        }
    }

    #[test]
    fn leaf_ranges_are_instants_and_parents_span(ops in prop::collection::vec(log_op_strategy(), 0..80)) {
        let log = build_log(&ops);
        let table = TraceIndex::build(&log).unwrap().table;

        for (id, node) in log.iter() {
            let range = table.range(id).unwrap();
            if node.children.is_empty() {
                prop_assert_eq!(range.before, range.after);
            } else {
                prop_assert!(range.before < range.after);
            }
        }
    }

    #[test]
    fn children_are_contained_and_siblings_disjoint(ops in prop::collection::vec(log_op_strategy(), 0..80)) {
        let log = build_log(&ops);
        let table = TraceIndex::build(&log).unwrap().table;

        for (id, node) in log.iter() {
            let parent = table.range(id).unwrap();
            let mut previous: Option<IndexRange> = None;
            for &child in &node.children {
                let child_range = table.range(child).unwrap();
                prop_assert!(parent.before < child_range.before);
                prop_assert!(parent.encloses(&child_range));
                prop_assert_eq!(table.depth(child), table.depth(id).map(|d| d + 1));
                if let Some(prev) = previous {
                    prop_assert!(prev.after < child_range.before);
                }
                previous = Some(child_range);
            }
        }
    }

    #[test]
    fn roots_are_ordered(ops in prop::collection::vec(log_op_strategy(), 0..80)) {
        let log = build_log(&ops);
        let table = TraceIndex::build(&log).unwrap().table;

        for pair in log.roots().windows(2) {
            let first = table.range(pair[0]).unwrap();
            let second = table.range(pair[1]).unwrap();
            prop_assert!(first.after < second.before);
        }
    }

    #[test]
    fn indexing_is_deterministic(ops in prop::collection::vec(log_op_strategy(), 0..80)) {
        let log = build_log(&ops);
        prop_assert_eq!(TraceIndex::build(&log).unwrap(), TraceIndex::build(&log).unwrap());
    }
}
