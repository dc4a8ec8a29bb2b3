//! Criterion benchmarks for simulation construction and the event loop.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use excimer_core::Parameters;
use excimer_kmc::Simulation;

/// A 20x20x20 neat film; construction cost is dominated by the Coulomb
/// table and the initial energy assignment.
fn film_params() -> Parameters {
    Parameters {
        length: 20,
        width: 20,
        height: 20,
        coulomb_cutoff: 10.0,
        n_tests: 1_000_000,
        seed: 5,
        ..Parameters::default()
    }
}

/// Benchmark: build a simulation from scratch, tables and seeding included.
fn bench_build_simulation(c: &mut Criterion) {
    let params = film_params();
    c.bench_function("build_simulation_20x20x20", |b| {
        b.iter(|| {
            let sim = Simulation::new(params.clone()).unwrap();
            black_box(sim);
        });
    });
}

/// Benchmark: 1000 scheduling-loop steps of steady exciton turnover.
fn bench_event_loop(c: &mut Criterion) {
    let params = film_params();
    c.bench_function("execute_1000_events", |b| {
        b.iter_batched(
            || Simulation::new(params.clone()).unwrap(),
            |mut sim| {
                for _ in 0..1000 {
                    sim.execute_next_event().unwrap();
                }
                sim
            },
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(benches, bench_build_simulation, bench_event_loop);
criterion_main!(benches);
