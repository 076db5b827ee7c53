//! Error types and result aliases for tether operations.
//!
//! Provides a unified error type covering lookup, conversion and resolution
//! failures. Callers can tell a modeling problem (no compatible version
//! exists) from an environmental one (version control metadata could not be
//! reached) through [`TetherError::is_recoverable`].

use std::fmt;

use thiserror::Error;

/// Unified error type for all tether operations
#[derive(Error, Debug)]
pub enum TetherError {
    // Persisted state errors
    #[error("Failed to parse {file}: {message}")]
    TomlParse { file: String, message: String },

    #[error("Failed to parse JSON: {message}")]
    JsonParse { message: String },

    #[error("Manifest field '{field}' is invalid: {reason}")]
    ManifestValidation { field: String, reason: String },

    #[error("Lock entry for '{project}' is invalid: {reason}")]
    LockValidation { project: String, reason: String },

    // Version model errors
    #[error("Invalid version '{input}': {reason}")]
    InvalidVersion { input: String, reason: String },

    #[error("Invalid constraint '{input}': {reason}")]
    InvalidConstraint { input: String, reason: String },

    // Source manager errors
    #[error("Could not read version control metadata for {project}: {message}")]
    Lookup {
        project: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Import errors
    #[error("Conversion failed: {0}")]
    Conversion(#[from] ConversionError),

    // Resolution errors
    #[error(
        "Constraint conflict on {project}: {depender} requires {constraint}, but {selected} is selected"
    )]
    ConstraintConflict {
        project: String,
        depender: String,
        constraint: String,
        selected: String,
    },

    #[error("{0}")]
    Unsolvable(Box<UnsolvableError>),

    #[error("Resolution was cancelled")]
    Cancelled,

    // IO errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for tether operations
pub type TetherResult<T> = Result<T, TetherError>;

impl TetherError {
    /// Create a lookup error from any source manager error
    pub fn lookup<E>(project: impl Into<String>, message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Lookup {
            project: project.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an IO error from std::io::Error
    pub fn io(message: String, source: std::io::Error) -> Self {
        Self::Io { message, source }
    }

    /// Check if this error is transient (network, VCS or filesystem) rather
    /// than a problem with the declared inputs
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TetherError::Lookup { .. } | TetherError::Io { .. })
    }

    /// Get a user-friendly suggestion for fixing this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            TetherError::Lookup { .. } => {
                Some("Check network access to the project's repository and try again")
            },
            TetherError::Unsolvable(_) => {
                Some("Relax the listed constraints or add an override for the conflicting project")
            },
            TetherError::Conversion(_) => {
                Some("Fix the reported entry in the imported configuration and re-run the import")
            },
            TetherError::InvalidConstraint { .. } => {
                Some("Use a semver range such as '^1.2.0', a branch name or a full revision")
            },
            TetherError::TomlParse { .. } | TetherError::ManifestValidation { .. } => {
                Some("Check tether.toml for typos or unsupported keys")
            },
            _ => None,
        }
    }
}

/// Malformed external input detected while converting another tool's
/// configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("package entry #{index} has an empty name")]
    EmptyName { index: usize },

    #[error("ignored package '{0}' is not a valid import path")]
    InvalidIgnore(String),

    #[error("constraint '{hint}' for {project} is not a valid version: {reason}")]
    InvalidHint {
        project: String,
        hint: String,
        reason: String,
    },

    #[error("package entry for {project} has an empty revision")]
    EmptyRevision { project: String },

    #[error("{project} is declared more than once with a different {field}")]
    DuplicateProject { project: String, field: &'static str },

    #[error("could not determine the project root of '{path}': {reason}")]
    UnknownRoot { path: String, reason: String },
}

/// One requirement or candidate failure taking part in an unsolvable
/// conflict
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictDetail {
    /// Who imposed the requirement, usually `root@version`
    pub depender: String,
    /// The constraint or version involved
    pub constraint: String,
    /// Why it could not be satisfied
    pub reason: String,
}

/// Terminal solver failure after the search space was exhausted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsolvableError {
    /// Project for which no acceptable version exists
    pub project: String,
    /// The conflicting requirements and failed candidates
    pub conflicts: Vec<ConflictDetail>,
}

impl fmt::Display for UnsolvableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "No versions of {} met all constraints", self.project)?;
        for c in &self.conflicts {
            write!(f, "\n  {} requires {}: {}", c.depender, c.constraint, c.reason)?;
        }
        Ok(())
    }
}

impl std::error::Error for UnsolvableError {}

impl From<UnsolvableError> for TetherError {
    fn from(err: UnsolvableError) -> Self {
        TetherError::Unsolvable(Box::new(err))
    }
}
