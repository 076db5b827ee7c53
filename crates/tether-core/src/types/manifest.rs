//! Project manifest: declared constraints, overrides and ignored packages.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::constraint::Constraint;
use super::project::{ProjectIdentifier, ProjectRoot};
use crate::error::{TetherError, TetherResult};
use crate::utils::path::is_path_prefix;

/// Constraint and optional source declared for one project
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectProperties {
    pub source: Option<String>,
    pub constraint: Constraint,
}

impl ProjectProperties {
    pub fn new(constraint: Constraint) -> Self {
        Self {
            source: None,
            constraint,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Serialized form of [`ProjectProperties`]: at most one of `version`,
/// `branch` or `revision`, plus an optional `source`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl RawProperties {
    /// Validate and convert; `root` names the project in error messages
    pub fn into_properties(self, root: &str) -> TetherResult<ProjectProperties> {
        let constraint = match (self.version, self.branch, self.revision) {
            (None, None, None) => Constraint::Any,
            (Some(version), None, None) => Constraint::from_version_str(&version),
            (None, Some(branch), None) => Constraint::branch(branch),
            (None, None, Some(revision)) if !revision.trim().is_empty() => {
                Constraint::revision(revision.trim())
            },
            (None, None, Some(_)) => {
                return Err(TetherError::ManifestValidation {
                    field: root.to_string(),
                    reason: "revision must not be empty".to_string(),
                })
            },
            _ => {
                return Err(TetherError::ManifestValidation {
                    field: root.to_string(),
                    reason: "only one of version, branch or revision may be set".to_string(),
                })
            },
        };
        Ok(ProjectProperties {
            source: self.source.filter(|s| !s.is_empty()),
            constraint,
        })
    }
}

impl From<&ProjectProperties> for RawProperties {
    fn from(props: &ProjectProperties) -> Self {
        let mut raw = RawProperties {
            source: props.source.clone(),
            ..Default::default()
        };
        match &props.constraint {
            Constraint::Any => {},
            Constraint::Revision(rev) => raw.revision = Some(rev.to_string()),
            Constraint::Branch(name) => raw.branch = Some(name.clone()),
            Constraint::Plain(_) | Constraint::Semver(_) => {
                raw.version = Some(props.constraint.to_string())
            },
        }
        raw
    }
}

/// Declared requirements of a project
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub constraints: BTreeMap<ProjectRoot, ProjectProperties>,
    /// Package paths excluded from resolution; a trailing `/*` ignores the
    /// whole subtree
    pub ignored: BTreeSet<String>,
    pub overrides: BTreeMap<ProjectRoot, ProjectProperties>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty() && self.ignored.is_empty() && self.overrides.is_empty()
    }

    /// Check if an import path is excluded by an ignore rule
    pub fn is_ignored(&self, import_path: &str) -> bool {
        self.ignored.iter().any(|rule| match rule.strip_suffix("/*") {
            Some(prefix) => is_path_prefix(prefix, import_path),
            None => rule == import_path,
        })
    }

    pub fn constraint_for(&self, root: &ProjectRoot) -> Option<&ProjectProperties> {
        self.constraints.get(root)
    }

    pub fn override_for(&self, root: &ProjectRoot) -> Option<&ProjectProperties> {
        self.overrides.get(root)
    }

    /// Identifier for a project as this manifest sees it: overrides win,
    /// then declared constraints
    pub fn identifier_for(&self, root: &ProjectRoot) -> ProjectIdentifier {
        let source = self
            .overrides
            .get(root)
            .and_then(|p| p.source.clone())
            .or_else(|| self.constraints.get(root).and_then(|p| p.source.clone()));
        ProjectIdentifier {
            root: root.clone(),
            source,
        }
    }
}
