//! Configuration handling for tether
//!
//! This crate reads and writes the persisted manifest (`tether.toml`) and
//! lock (`tether.lock`), locates a project on disk, and converts other
//! tools' dependency configuration into a tether manifest and lock.

pub mod import;
pub mod loader;
pub mod lock;
pub mod manifest;

// Re-export main types
pub use import::{
    lookup_version_for_locked_project, AnalyzerInfo, ConvertExpectation, ConvertMismatch, Converter, ExternalConfig,
    ExternalPackage, Importer, JsonImporter, RootAnalyzer,
};
pub use loader::{write_lock, write_manifest, Project, ProjectLoader};
pub use lock::{parse_lock, serialize_lock, LOCK_NAME};
pub use manifest::{parse_manifest, serialize_manifest, MANIFEST_NAME};

use tether_core::error::TetherError;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, TetherError>;
