//! Evaluator and tick benchmarks for rts_behavior.
//!
//! Run with: `cargo bench -p rts_behavior`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rts_behavior::prelude::*;
use rts_behavior::script::{FinderNode, NumericNode};
use rts_test_utils::fixtures::{crowded_gather_simulation, item_of, name, node, num, slot};

fn nearest_mine() -> Arg {
    node(
        "GRADE_SELECT",
        vec![
            name("BOTTOM"),
            num(1.0),
            node(
                "WITHIN_RADIUS",
                vec![slot("SELF"), name("WorkRadius"), name("Building")],
            ),
            node("DISTANCE_BETWEEN", vec![slot("SELF"), slot("CANDIDATE")]),
        ],
    )
}

fn load_check() -> Arg {
    node(
        "AND",
        vec![
            node("EQUATION", vec![name("FullLoad")]),
            node(
                "GREATER_THAN",
                vec![item_of("Stock", nearest_mine()), num(0.0)],
            ),
        ],
    )
}

/// Finder and numeric evaluation against crowded worlds.
pub fn evaluator_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluators");
    for peasants in [8usize, 64] {
        let sim = crowded_gather_simulation(4, peasants);
        let gs = sim.gameset();
        let finder = FinderNode::compile(&nearest_mine(), gs.symbols()).unwrap();
        let numeric = NumericNode::compile(&load_check(), gs.symbols()).unwrap();
        let subject = sim.world().sorted_ids().into_iter().last();
        let ctx = ExecutionContext::new(gs);
        let _self = ctx.bind(Slot::SelfObject, subject);

        group.bench_with_input(BenchmarkId::new("nearest_mine", peasants), &peasants, |b, _| {
            b.iter(|| black_box(finder.eval(&ctx, sim.world()).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("load_check", peasants), &peasants, |b, _| {
            b.iter(|| black_box(numeric.eval(&ctx, sim.world()).unwrap()));
        });
    }
    group.finish();
}

/// Whole ticks of the gather economy.
pub fn tick_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");
    for peasants in [8usize, 64] {
        group.bench_with_input(BenchmarkId::new("gather", peasants), &peasants, |b, &n| {
            let mut sim = crowded_gather_simulation(4, n);
            b.iter(|| black_box(sim.tick().unwrap()));
        });
    }
    group.finish();
}

criterion_group!(benches, evaluator_benchmark, tick_benchmark);
criterion_main!(benches);
