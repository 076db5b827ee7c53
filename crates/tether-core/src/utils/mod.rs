//! Utility functions and helpers.
//!
//! Common functionality used across multiple tether crates.

pub mod hash;
pub mod path;

// Re-export commonly used utilities
pub use hash::{inputs_digest, signature};
pub use path::{is_path_prefix, is_std_lib, is_valid_import_path, join_package, relative_package};
