//! Simulation benchmarks for necro_core.
//!
//! Run with: `cargo bench -p necro_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use necro_core::prelude::*;
use necro_core::staging::StagingAllocator;

/// A simulation a few seconds into wave 5, board busy on both sides.
fn busy_simulation() -> Simulation {
    let mut sim = Simulation::new(7);
    for _ in 0..4 {
        sim.start_wave();
        for _ in 0..3000 {
            if sim.tick().outcome.is_some() {
                break;
            }
        }
        if sim.phase() == WavePhase::Defeated {
            sim.reset_run();
        }
    }
    sim.start_wave();
    for _ in 0..30 {
        sim.tick();
    }
    sim
}

pub fn simulation_benchmark(c: &mut Criterion) {
    let busy = busy_simulation();

    c.bench_function("tick_busy_board", |b| {
        b.iter_batched(
            || busy.clone(),
            |mut sim| black_box(sim.tick()),
            BatchSize::SmallInput,
        );
    });

    c.bench_function("wave_one_to_completion", |b| {
        b.iter(|| {
            let mut sim = Simulation::new(black_box(42));
            sim.start_wave();
            for _ in 0..3000 {
                if sim.tick().outcome.is_some() {
                    break;
                }
            }
            sim.state_hash()
        });
    });

    c.bench_function("state_hash", |b| b.iter(|| black_box(&busy).state_hash()));

    c.bench_function("staging_allocate", |b| {
        let exclude = std::collections::HashSet::new();
        b.iter(|| {
            StagingAllocator::new(busy.registry(), busy.rules()).allocate(
                black_box(Side::Ally),
                black_box(Role::Warrior),
                &exclude,
            )
        });
    });
}

criterion_group!(benches, simulation_benchmark);
criterion_main!(benches);
