//! # tether-core
//!
//! Core types and utilities shared across all tether crates.
//!
//! This crate provides:
//! - The version model: revisions, branches, plain and semver tags, and
//!   versions paired with the revision they resolved to
//! - Constraints, manifests and locks
//! - TetherError enum for unified error handling
//! - Hashing and import-path helpers
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `types`: Core data types (Version, Constraint, Manifest, Lock, etc.)
//! - `error`: Error types and result aliases
//! - `utils`: Utility functions and helpers

pub mod error;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use error::{ConflictDetail, ConversionError, TetherError, TetherResult, UnsolvableError};
pub use types::{
    project_exists_in_lock, Constraint, Lock, LockedProject, Manifest, PairedVersion,
    ProjectIdentifier, ProjectProperties, ProjectRoot, Revision, SolveMeta, UnpairedVersion,
    Version,
};
