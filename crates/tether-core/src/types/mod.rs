//! Core data types for tether dependency resolution.
//!
//! This module provides the fundamental types used throughout tether:
//! - Version types (revisions, branches, tags, paired versions)
//! - Constraints over versions
//! - Project identity, manifests and locks

pub mod constraint;
pub mod lock;
pub mod manifest;
pub mod project;
pub mod version;

// Re-export all public types
pub use constraint::{Constraint, SemverRange};
pub use lock::{project_exists_in_lock, Lock, LockedProject, SolveMeta};
pub use manifest::{Manifest, ProjectProperties, RawProperties};
pub use project::{ProjectIdentifier, ProjectRoot};
pub use version::{
    parse_semver, Branch, PairedVersion, Revision, SemverTag, UnpairedVersion, Version,
    VersionKind,
};
