//! Dependency resolution performance benchmarks
//!
//! Benchmarks the backjumping solver against generated universes, with and
//! without conflicts and with a prior lock, plus version selection on its own.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tether_benchmarks::{criterion_config, layered_universe, root_params, UniverseShape};
use tether_core::types::{Constraint, PairedVersion, Revision, UnpairedVersion};
use tether_resolver::{Solver, VersionSelector};

/// Benchmark solving conflict-free universes of growing width
fn bench_solve(c: &mut Criterion) {
    let mut group = c.benchmark_group("solve");
    group.sample_size(20);

    for width in [5, 10, 20].iter() {
        let shape = UniverseShape {
            width: *width,
            depth: 4,
            versions: 5,
            conflicting: false,
        };
        group.throughput(Throughput::Elements((shape.width * shape.depth) as u64));

        let manager = Arc::new(layered_universe(shape));
        let params = root_params(shape);
        group.bench_with_input(BenchmarkId::new("projects", width * shape.depth), &params, |b, params| {
            b.iter(|| {
                let solver = Solver::new(manager.clone());
                black_box(solver.solve(params).unwrap())
            });
        });
    }

    group.finish();
}

/// Benchmark solving when the newest first-layer versions must be rejected
fn bench_backjumping(c: &mut Criterion) {
    let mut group = c.benchmark_group("backjumping");
    group.sample_size(20);

    for versions in [2, 5, 10].iter() {
        let shape = UniverseShape {
            width: 8,
            depth: 3,
            versions: *versions,
            conflicting: true,
        };
        let manager = Arc::new(layered_universe(shape));
        let params = root_params(shape);
        group.bench_with_input(BenchmarkId::new("versions", versions), &params, |b, params| {
            b.iter(|| {
                let solver = Solver::new(manager.clone());
                black_box(solver.solve(params).unwrap())
            });
        });
    }

    group.finish();
}

/// Benchmark re-solving with the previous lock as preference
fn bench_locked_solve(c: &mut Criterion) {
    let shape = UniverseShape {
        width: 10,
        depth: 4,
        versions: 5,
        conflicting: false,
    };
    let manager = Arc::new(layered_universe(shape));
    let first = Solver::new(manager.clone()).solve(&root_params(shape)).unwrap();
    let params = root_params(shape).with_lock(first.lock);

    c.bench_function("locked_solve", |b| {
        b.iter(|| {
            let solver = Solver::new(manager.clone());
            black_box(solver.solve(&params).unwrap())
        });
    });
}

/// Benchmark version selection algorithms
fn bench_version_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("version_selection");
    group.measurement_time(std::time::Duration::from_secs(5));

    let constraints = vec![
        Constraint::semver(">=1.0.0").unwrap(),
        Constraint::semver("<3.5.0").unwrap(),
        Constraint::semver("~2.1.0").unwrap(),
    ];

    for version_count in [10, 100, 500].iter() {
        group.throughput(Throughput::Elements(*version_count as u64));

        let selector = VersionSelector::new(create_version_list(*version_count));
        group.bench_with_input(BenchmarkId::new("versions", version_count), &selector, |b, selector| {
            b.iter(|| black_box(selector.select_best(&constraints)));
        });
    }

    group.finish();
}

/// Benchmark independent solvers sharing one source manager
fn bench_parallel_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_resolution");
    group.sample_size(10);

    let shape = UniverseShape {
        width: 10,
        depth: 3,
        versions: 5,
        conflicting: true,
    };
    let manager = Arc::new(layered_universe(shape));
    let params = root_params(shape);

    for concurrency in [1, 2, 4, 8].iter() {
        group.bench_with_input(
            BenchmarkId::new("concurrent_solvers", concurrency),
            concurrency,
            |b, &concurrency| {
                b.iter(|| {
                    use rayon::prelude::*;

                    let results: Vec<_> = (0..concurrency)
                        .into_par_iter()
                        .map(|_| Solver::new(manager.clone()).solve(&params).map(|s| s.attempts))
                        .collect();

                    black_box(results)
                });
            },
        );
    }

    group.finish();
}

fn create_version_list(count: usize) -> Vec<PairedVersion> {
    (0..count)
        .map(|i| {
            let major = i / 100;
            let minor = (i / 10) % 10;
            let patch = i % 10;
            UnpairedVersion::tag(&format!("v{}.{}.{}", major, minor, patch)).pair(Revision::new(format!("rev{}", i)))
        })
        .collect()
}

criterion_group! {
    name = benches;
    config = criterion_config();
    targets = bench_solve, bench_backjumping, bench_locked_solve, bench_version_selection, bench_parallel_resolution
}
criterion_main!(benches);
