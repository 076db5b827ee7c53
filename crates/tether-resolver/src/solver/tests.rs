use super::*;

use tether_core::types::{ProjectProperties, Revision, UnpairedVersion};
use tether_source::{FixtureVersion, InMemorySourceManager};

const APP: &str = "github.com/acme/app";
const A: &str = "github.com/a/a";
const B: &str = "github.com/b/b";
const C: &str = "github.com/c/c";
const X: &str = "github.com/x/x";

fn root(s: &str) -> ProjectRoot {
    ProjectRoot::new(s)
}

/// `a@v2` wants `c ^2` (and pulls in `x`), `a@v1` wants `c ^1`; every `b`
/// wants `c ^1`. Only `a@v1` works, but the solver reaches it last.
fn universe() -> InMemorySourceManager {
    InMemorySourceManager::new()
        .with_project(
            A,
            vec![
                FixtureVersion::tag("v1.0.0", "a100")
                    .import(C)
                    .constraint(C, "^1.0.0"),
                FixtureVersion::tag("v2.0.0", "a200")
                    .import(C)
                    .import(X)
                    .constraint(C, "^2.0.0"),
            ],
        )
        .with_project(
            B,
            vec![
                FixtureVersion::tag("v1.0.0", "b100").import(C).constraint(C, "^1.0.0"),
                FixtureVersion::tag("v1.1.0", "b110").import(C).constraint(C, "^1.0.0"),
                FixtureVersion::tag("v1.2.0", "b120").import(C).constraint(C, "^1.0.0"),
            ],
        )
        .with_project(
            C,
            vec![
                FixtureVersion::tag("v1.0.0", "c100").package("util", &[]),
                FixtureVersion::tag("v2.0.0", "c200"),
            ],
        )
        .with_project(X, vec![FixtureVersion::tag("v1.0.0", "x100")])
}

fn params() -> SolveParameters {
    SolveParameters::new(APP, Manifest::new()).with_imports([A, B, "fmt"])
}

/// Log solver transitions when `RUST_LOG` asks for them
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn solve_with(manager: InMemorySourceManager, params: &SolveParameters) -> (Arc<InMemorySourceManager>, ResolverResult<Solution>) {
    init_tracing();
    let manager = Arc::new(manager);
    let solver = Solver::new(manager.clone());
    let result = solver.solve(params);
    (manager, result)
}

fn versions(lock: &Lock) -> Vec<(String, String)> {
    lock.projects
        .iter()
        .map(|p| (p.root().to_string(), p.version.to_string()))
        .collect()
}

#[test]
fn test_simple_solve() {
    let manager = InMemorySourceManager::new()
        .with_project(A, vec![FixtureVersion::tag("v1.0.0", "a100"), FixtureVersion::tag("v1.1.0", "a110")]);
    let params = SolveParameters::new(APP, Manifest::new()).with_imports([A]);
    let (_, result) = solve_with(manager, &params);
    let solution = result.unwrap();

    assert_eq!(versions(&solution.lock), vec![(A.to_string(), "v1.1.0".to_string())]);
    let locked = solution.lock.find(&root(A)).unwrap();
    assert_eq!(locked.version.bound_revision(), Some(&Revision::new("a110")));
    assert_eq!(locked.packages, ["."].iter().map(|s| s.to_string()).collect());

    let meta = solution.lock.solve_meta.as_ref().unwrap();
    assert_eq!(meta.solver_name, SOLVER_NAME);
    assert_eq!(meta.solver_version, SOLVER_VERSION);
    assert_eq!(solution.backtracks, 0);
}

#[test]
fn test_backjumps_past_unrelated_frames() {
    let (_, result) = solve_with(universe(), &params());
    let solution = result.unwrap();

    assert_eq!(
        versions(&solution.lock),
        vec![
            (A.to_string(), "v1.0.0".to_string()),
            (B.to_string(), "v1.2.0".to_string()),
            (C.to_string(), "v1.0.0".to_string()),
        ]
    );
    // x was only needed by a@v2.0.0
    assert!(solution.lock.find(&root(X)).is_none());
    assert_eq!(solution.backtracks, 2);
}

#[test]
fn test_solution_graph() {
    let (_, result) = solve_with(universe(), &params());
    let graph = result.unwrap().graph;

    assert_eq!(graph.project_count(), 3);
    assert_eq!(graph.dependencies_of(&root(APP)), vec![root(A), root(B)]);
    assert_eq!(graph.dependers_of(&root(C)), vec![root(A), root(B)]);
    assert!(graph.cycles().is_empty());
}

#[test]
fn test_solve_is_deterministic() {
    let mut options = SolverOptions::default();
    options.trace = true;

    let run = || {
        let solver = Solver::new(Arc::new(universe())).with_options(options.clone());
        solver.solve(&params()).unwrap()
    };
    let first = run();
    let second = run();
    assert_eq!(first.lock, second.lock);
    assert_eq!(first.trace, second.trace);
    assert!(!first.trace.is_empty());
}

#[test]
fn test_solving_with_own_lock_is_idempotent() {
    let (_, first) = solve_with(universe(), &params());
    let lock = first.unwrap().lock;

    let (_, second) = solve_with(universe(), &params().with_lock(lock.clone()));
    let second = second.unwrap();
    assert_eq!(second.lock, lock);
    assert_eq!(second.backtracks, 0);
}

#[test]
fn test_locked_version_is_preferred() {
    let lock = Lock::from_projects(vec![LockedProject::new(
        ProjectIdentifier::new(B),
        Version::Paired(UnpairedVersion::tag("v1.1.0").pair(Revision::new("b110"))),
    )])
    .unwrap();

    let (_, result) = solve_with(universe(), &params().with_lock(lock.clone()));
    let solution = result.unwrap();
    assert_eq!(solution.lock.find(&root(B)).unwrap().version.to_string(), "v1.1.0");

    // Asking to change b ignores its lock entry
    let mut options = SolverOptions::default();
    options.to_change.insert(root(B));
    let solver = Solver::new(Arc::new(universe())).with_options(options);
    let solution = solver.solve(&params().with_lock(lock.clone())).unwrap();
    assert_eq!(solution.lock.find(&root(B)).unwrap().version.to_string(), "v1.2.0");

    let mut options = SolverOptions::default();
    options.change_all = true;
    let solver = Solver::new(Arc::new(universe())).with_options(options);
    let solution = solver.solve(&params().with_lock(lock)).unwrap();
    assert_eq!(solution.lock.find(&root(B)).unwrap().version.to_string(), "v1.2.0");
}

#[test]
fn test_locked_revision_gone_upstream_is_dropped() {
    let lock = Lock::from_projects(vec![LockedProject::new(
        ProjectIdentifier::new(B),
        Version::Paired(UnpairedVersion::tag("v1.1.0").pair(Revision::new("deadbeef"))),
    )])
    .unwrap();

    let (_, result) = solve_with(universe(), &params().with_lock(lock));
    let solution = result.unwrap();
    assert_eq!(solution.lock.find(&root(B)).unwrap().version.to_string(), "v1.2.0");
}

#[test]
fn test_root_constraint_applies_to_direct_imports() {
    let mut manifest = Manifest::new();
    manifest.constraints.insert(
        root(B),
        ProjectProperties::new(Constraint::semver("<1.2.0").unwrap()),
    );
    let params = SolveParameters::new(APP, manifest).with_imports([A, B]);

    let (_, result) = solve_with(universe(), &params);
    let lock = result.unwrap().lock;
    assert_eq!(lock.find(&root(B)).unwrap().version.to_string(), "v1.1.0");
}

#[test]
fn test_override_wins_everywhere() {
    let mut manifest = Manifest::new();
    manifest.overrides.insert(
        root(C),
        ProjectProperties::new(Constraint::semver("^2.0.0").unwrap()),
    );
    let params = SolveParameters::new(APP, manifest).with_imports([A, B]);

    let (_, result) = solve_with(universe(), &params);
    let lock = result.unwrap().lock;
    assert_eq!(lock.find(&root(C)).unwrap().version.to_string(), "v2.0.0");
    assert_eq!(lock.find(&root(A)).unwrap().version.to_string(), "v2.0.0");
    assert!(lock.find(&root(X)).is_some());
}

#[test]
fn test_override_source_replaces_declared_source() {
    let fork = "github.com/fork/c";
    let manager = universe().with_project(fork, vec![FixtureVersion::tag("v3.0.0", "f300")]);

    let mut manifest = Manifest::new();
    manifest.overrides.insert(
        root(C),
        ProjectProperties::new(Constraint::semver("^3.0.0").unwrap()).with_source(fork),
    );
    let params = SolveParameters::new(APP, manifest).with_imports([B]);

    let (_, result) = solve_with(manager, &params);
    let lock = result.unwrap().lock;
    let locked = lock.find(&root(C)).unwrap();
    assert_eq!(locked.ident.source.as_deref(), Some(fork));
    assert_eq!(locked.version.to_string(), "v3.0.0");
}

#[test]
fn test_unsolvable_reports_conflicts() {
    let manager = InMemorySourceManager::new()
        .with_project(
            A,
            vec![FixtureVersion::tag("v1.0.0", "a100").import(C).constraint(C, "^3.0.0")],
        )
        .with_project(C, vec![FixtureVersion::tag("v1.0.0", "c100")]);
    let params = SolveParameters::new(APP, Manifest::new()).with_imports([A]);

    let (_, result) = solve_with(manager, &params);
    match result.unwrap_err() {
        TetherError::Unsolvable(err) => {
            assert_eq!(err.project, A);
            assert!(err
                .conflicts
                .iter()
                .any(|c| c.depender == "github.com/a/a@v1.0.0" && c.constraint == "^3.0.0"));
            assert!(err.to_string().starts_with("No versions of github.com/a/a met all constraints"));
        },
        other => panic!("expected unsolvable, got {other:?}"),
    }
}

#[test]
fn test_missing_package_rejects_version() {
    let manager = InMemorySourceManager::new()
        .with_project(
            C,
            vec![
                FixtureVersion::tag("v1.0.0", "c100").package("util", &[]),
                FixtureVersion::tag("v2.0.0", "c200"),
            ],
        );
    let params = SolveParameters::new(APP, Manifest::new()).with_imports(["github.com/c/c/util"]);

    let (_, result) = solve_with(manager, &params);
    let lock = result.unwrap().lock;
    let locked = lock.find(&root(C)).unwrap();
    assert_eq!(locked.version.to_string(), "v1.0.0");
    assert_eq!(locked.packages, ["util"].iter().map(|s| s.to_string()).collect());
}

#[test]
fn test_internal_imports_are_locked() {
    let manager = InMemorySourceManager::new().with_project(
        A,
        vec![FixtureVersion::tag("v1.0.0", "a100")
            .import("github.com/a/a/internal")
            .package("internal", &["strings"])
            .package("unused", &[])],
    );
    let params = SolveParameters::new(APP, Manifest::new()).with_imports([A]);

    let (_, result) = solve_with(manager, &params);
    let lock = result.unwrap().lock;
    assert_eq!(
        lock.find(&root(A)).unwrap().packages,
        [".", "internal"].iter().map(|s| s.to_string()).collect()
    );
}

#[test]
fn test_ignored_packages_are_not_solved() {
    let mut manifest = Manifest::new();
    manifest.ignored.insert(B.to_string());
    let params = SolveParameters::new(APP, manifest).with_imports([A, B]);

    let (_, result) = solve_with(universe(), &params);
    let lock = result.unwrap().lock;
    assert!(lock.find(&root(B)).is_none());

    let mut manifest = Manifest::new();
    manifest.ignored.insert("github.com/acme/app/tools/*".to_string());
    let params = SolveParameters::new(APP, manifest)
        .with_imports([A])
        .with_package("tools/gen", &[B]);
    let (_, result) = solve_with(universe(), &params);
    assert!(result.unwrap().lock.find(&root(B)).is_none());
}

#[test]
fn test_other_root_packages_contribute_imports() {
    let params = SolveParameters::new(APP, Manifest::new()).with_package("cmd/app", &[A, "github.com/acme/app/lib"]);
    let (_, result) = solve_with(universe(), &params);
    let lock = result.unwrap().lock;
    assert!(lock.find(&root(A)).is_some());
    // a@v2.0.0 brings c and x along
    assert_eq!(lock.len(), 3);
}

#[test]
fn test_bare_revision_constraint() {
    let manager = InMemorySourceManager::new().with_project(
        A,
        vec![FixtureVersion::tag("v1.0.0", "a100"), FixtureVersion::commit("a0ff")],
    );
    let mut manifest = Manifest::new();
    manifest
        .constraints
        .insert(root(A), ProjectProperties::new(Constraint::revision("a0ff")));
    let params = SolveParameters::new(APP, manifest).with_imports([A]);

    let (_, result) = solve_with(manager, &params);
    let lock = result.unwrap().lock;
    assert_eq!(lock.find(&root(A)).unwrap().version, Version::revision("a0ff"));
}

#[test]
fn test_branch_constraint() {
    let manager = InMemorySourceManager::new().with_project(
        A,
        vec![
            FixtureVersion::tag("v1.0.0", "a100"),
            FixtureVersion::default_branch("master", "a1a1"),
            FixtureVersion::branch("develop", "a2a2"),
        ],
    );
    let mut manifest = Manifest::new();
    manifest
        .constraints
        .insert(root(A), ProjectProperties::new(Constraint::branch("develop")));
    let params = SolveParameters::new(APP, manifest).with_imports([A]);

    let (_, result) = solve_with(manager, &params);
    let lock = result.unwrap().lock;
    assert_eq!(lock.find(&root(A)).unwrap().version.to_string(), "develop");
}

#[test]
fn test_cancelled_solve() {
    let solver = Solver::new(Arc::new(universe()));
    solver.cancel_token().cancel();
    assert!(matches!(solver.solve(&params()), Err(TetherError::Cancelled)));
}

#[test]
fn test_queries_are_memoized_and_manager_released() {
    let (manager, result) = solve_with(universe(), &params());
    result.unwrap();

    let counts = manager.counts();
    // a, b, c and x each listed exactly once despite the backjumps
    assert_eq!(counts.list_versions, 4);
    assert_eq!(counts.release, 1);
}

#[test]
fn test_manager_released_on_failure() {
    let manager = universe().with_unreachable("github.com/gone/gone");
    let params = SolveParameters::new(APP, Manifest::new()).with_imports(["github.com/gone/gone"]);

    let (manager, result) = solve_with(manager, &params);
    let err = result.unwrap_err();
    assert!(matches!(err, TetherError::Lookup { .. }));
    assert!(err.is_recoverable());
    assert_eq!(manager.counts().release, 1);
}

#[test]
fn test_source_conflict_between_dependers() {
    let fork = "github.com/fork/c";
    let manager = InMemorySourceManager::new()
        .with_project(
            A,
            vec![FixtureVersion::tag("v1.0.0", "a100")
                .import(C)
                .constraint_with(C, ProjectProperties::new(Constraint::Any).with_source(fork))],
        )
        .with_project(B, vec![FixtureVersion::tag("v1.0.0", "b100").import(C)])
        .with_project(C, vec![FixtureVersion::tag("v1.0.0", "c100")])
        .with_project(fork, vec![FixtureVersion::tag("v1.0.0", "f100")]);
    let params = SolveParameters::new(APP, Manifest::new()).with_imports([A, B]);

    let (_, result) = solve_with(manager, &params);
    assert!(matches!(result, Err(TetherError::Unsolvable(_))));
}

mod property_tests {
    use super::*;
    use proptest::prelude::*;

    // Property: the lock does not depend on the order a source lists versions in
    proptest! {
        #[test]
        fn lock_is_independent_of_listing_order(seed in 0usize..24) {
            let b_versions = || vec![
                FixtureVersion::tag("v1.0.0", "b100").import(C).constraint(C, "^1.0.0"),
                FixtureVersion::tag("v1.1.0", "b110").import(C).constraint(C, "^1.0.0"),
                FixtureVersion::tag("v1.2.0", "b120").import(C).constraint(C, "^1.0.0"),
                FixtureVersion::default_branch("master", "b999").import(C),
            ];
            let mut shuffled_versions = b_versions();
            let len = shuffled_versions.len();
            shuffled_versions.rotate_left(seed % len);
            if seed % 2 == 1 {
                shuffled_versions.reverse();
            }

            let (_, shuffled) = solve_with(universe().with_project(B, shuffled_versions), &params());
            let (_, reference) = solve_with(universe().with_project(B, b_versions()), &params());
            prop_assert_eq!(versions(&shuffled.unwrap().lock), versions(&reference.unwrap().lock));
        }
    }
}
