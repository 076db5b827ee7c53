//! Common utilities for benchmarks

use criterion::Criterion;
use pprof::criterion::{Output, PProfProfiler};
use tether_core::types::Manifest;
use tether_resolver::SolveParameters;
use tether_source::{FixtureVersion, InMemorySourceManager};

/// Root project every benchmark solves for
pub const BENCH_ROOT: &str = "github.com/bench/app";

/// Configure criterion with flamegraph profiling support
pub fn criterion_config() -> Criterion {
    init_tracing();
    Criterion::default()
        .warm_up_time(std::time::Duration::from_secs(3))
        .measurement_time(std::time::Duration::from_secs(10))
        .sample_size(100)
        .with_profiler(PProfProfiler::new(100, Output::Flamegraph(None)))
}

/// Solver logs stay off unless `RUST_LOG` enables them
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .try_init();
}

pub fn project_root(layer: usize, index: usize) -> String {
    format!("github.com/layer{}/p{}", layer, index)
}

/// Shape of a generated universe
#[derive(Debug, Clone, Copy)]
pub struct UniverseShape {
    /// Projects per layer
    pub width: usize,
    /// Number of layers below the root
    pub depth: usize,
    /// Tagged versions per project
    pub versions: usize,
    /// Make the newest version of every first-layer project unusable
    pub conflicting: bool,
}

/// Build a layered universe: every version of a project imports two
/// projects of the next layer and constrains them to `^1.0.0`
pub fn layered_universe(shape: UniverseShape) -> InMemorySourceManager {
    let mut manager = InMemorySourceManager::new();
    let last = shape.depth.saturating_sub(1);

    for layer in 0..shape.depth {
        for index in 0..shape.width {
            let root = project_root(layer, index);
            let mut versions = Vec::with_capacity(shape.versions + 1);

            for minor in 0..shape.versions {
                let mut version =
                    FixtureVersion::tag(&format!("v1.{}.0", minor), &format!("{}-r{}", root, minor));
                if layer < last {
                    for dep in [index, (index + 1) % shape.width] {
                        let dep_root = project_root(layer + 1, dep);
                        version = version.import(&dep_root).constraint(&dep_root, "^1.0.0");
                    }
                }
                if shape.conflicting && layer == 0 && minor + 1 == shape.versions {
                    let pinned = project_root(last, 0);
                    version = version.import(&pinned).constraint(&pinned, "^2.0.0");
                }
                versions.push(version);
            }
            versions.push(FixtureVersion::default_branch("master", &format!("{}-head", root)));
            manager = manager.with_project(&root, versions);
        }
    }

    manager
}

/// Parameters importing every first-layer project
pub fn root_params(shape: UniverseShape) -> SolveParameters {
    SolveParameters::new(BENCH_ROOT, Manifest::new()).with_imports((0..shape.width).map(|i| project_root(0, i)))
}
