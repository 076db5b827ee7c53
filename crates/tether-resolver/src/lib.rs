//! Dependency solver for tether
//!
//! Given a root project (its manifest, its packages and an optional previous
//! lock) and a source manager, the solver finds one version of every
//! transitively imported project such that all constraints hold, preferring
//! locked versions and otherwise the newest acceptable ones.

pub mod graph;
pub mod selection;
pub mod solver;

// Re-export main types
pub use graph::{ProjectNode, SolutionGraph};
pub use selection::{downgrade_cmp, sort_for_downgrade, sort_for_upgrade, upgrade_cmp, VersionSelector};
pub use solver::{Solution, SolveParameters, Solver, SolverOptions, SOLVER_NAME, SOLVER_VERSION};

use tether_core::error::TetherError;

/// Result type for resolver operations
pub type ResolverResult<T> = Result<T, TetherError>;
