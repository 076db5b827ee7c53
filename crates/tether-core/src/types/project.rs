//! Project identity.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::path::is_path_prefix;

/// Canonical import path of a project's repository root
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectRoot(String);

impl ProjectRoot {
    pub fn new(root: impl Into<String>) -> Self {
        Self(root.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if an import path belongs to this project
    pub fn contains(&self, import_path: &str) -> bool {
        is_path_prefix(&self.0, import_path)
    }
}

impl fmt::Display for ProjectRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProjectRoot {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ProjectRoot {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for ProjectRoot {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A project root plus an optional network location to fetch it from.
///
/// Equality and hashing cover both fields; membership tests that should
/// ignore the source compare [`ProjectIdentifier::root`] instead.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProjectIdentifier {
    pub root: ProjectRoot,
    pub source: Option<String>,
}

impl ProjectIdentifier {
    pub fn new(root: impl Into<ProjectRoot>) -> Self {
        Self {
            root: root.into(),
            source: None,
        }
    }

    pub fn with_source(root: impl Into<ProjectRoot>, source: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            source: Some(source.into()),
        }
    }

    /// Where the project is fetched from: the source override when set,
    /// otherwise the root itself
    pub fn normalized_source(&self) -> &str {
        self.source.as_deref().unwrap_or(self.root.as_str())
    }

    /// Same project regardless of source
    pub fn same_project(&self, other: &ProjectIdentifier) -> bool {
        self.root == other.root
    }
}

impl From<ProjectRoot> for ProjectIdentifier {
    fn from(root: ProjectRoot) -> Self {
        Self { root, source: None }
    }
}

impl From<&str> for ProjectIdentifier {
    fn from(root: &str) -> Self {
        Self::new(root)
    }
}

impl fmt::Display for ProjectIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) if source != self.root.as_str() => {
                write!(f, "{} (from {})", self.root, source)
            },
            _ => self.root.fmt(f),
        }
    }
}
