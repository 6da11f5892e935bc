//! Resolution benchmarks: full replay versus cursor navigation.
//!
//! The synthetic trace unifies a long chain of variables, one nested
//! unification per link, with a descriptor update inside each step. This is
//! the worst case for replay (every query re-applies the whole prefix) and
//! the common case for an interactive viewer (stepping back and forth).
//!
//! Run with: `cargo bench --bench resolve_benchmarks`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use unitrace_engine::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `steps` unifications `v{n} ~ v{n+1}`, each with a descriptor update and a
/// union as substeps. Three events per step.
fn chain_log(steps: u32) -> EventLog {
    let mut builder = EventLogBuilder::new();
    for n in 0..steps {
        let (left, right) = (Variable::new(n), Variable::new(n + 1));
        let step = builder.push_root(Event::unification(UnifyMode::Eq, left, right, true));
        builder
            .push_child(
                step,
                Event::set_descriptor(
                    right,
                    Descriptor::new(Content::apply("List", vec![left]), Rank(n % 4)),
                ),
            )
            .expect("step is open");
        builder
            .push_child(step, Event::unified(left, right))
            .expect("step is open");
    }
    builder.finish()
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_engine_build(c: &mut Criterion) {
    let log = chain_log(1_000);
    c.bench_function("engine_build_3k_events", |b| {
        b.iter(|| Engine::build(black_box(log.clone())).expect("well formed"))
    });
}

fn bench_replay_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("replay_resolve_last");
    for steps in [100u32, 1_000, 5_000] {
        let engine = Engine::build(chain_log(steps)).expect("well formed");
        let last = engine.last_index().expect("non-empty");
        group.bench_with_input(BenchmarkId::from_parameter(steps), &steps, |b, _| {
            b.iter(|| engine.resolve(black_box(Variable::new(0)), last).expect("in range"))
        });
    }
    group.finish();
}

fn bench_cursor_stepping(c: &mut Criterion) {
    let engine = Engine::build(chain_log(1_000)).expect("well formed");
    let mid = EventIndex::from_raw(engine.len() as u32 / 2);
    let mut cursor = engine.cursor(mid).expect("in range");

    c.bench_function("cursor_step_back_and_forth", |b| {
        b.iter(|| {
            cursor.step_forward();
            let state = cursor.resolve(black_box(Variable::new(0)));
            cursor.step_backward();
            state
        })
    });
}

fn bench_cursor_jumps(c: &mut Criterion) {
    let mut group = c.benchmark_group("cursor_jump_full_range");
    let engine = Engine::build(chain_log(2_000)).expect("well formed");
    let last = engine.last_index().expect("non-empty");

    for interval in [0usize, 16, 64, 256] {
        let config = EngineConfig {
            checkpoint_interval: interval,
            ..EngineConfig::default()
        };
        let engine = Engine::build_with_config(engine.log().clone(), config).expect("well formed");
        let mut cursor = engine.cursor(last).expect("in range");
        group.bench_with_input(BenchmarkId::from_parameter(interval), &interval, |b, _| {
            b.iter(|| {
                cursor.seek(EventIndex::ZERO).expect("in range");
                cursor.seek(last).expect("in range");
            })
        });
    }
    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let engine = Engine::build(chain_log(1_000)).expect("well formed");
    let last = engine.last_index().expect("non-empty");
    c.bench_function("snapshot_at_last_1k_variables", |b| {
        b.iter(|| engine.snapshot_at(black_box(last)).expect("in range"))
    });
}

// ---------------------------------------------------------------------------
// Criterion groups and main
// ---------------------------------------------------------------------------

criterion_group!(
    benches,
    bench_engine_build,
    bench_replay_resolve,
    bench_cursor_stepping,
    bench_cursor_jumps,
    bench_snapshot,
);
criterion_main!(benches);
