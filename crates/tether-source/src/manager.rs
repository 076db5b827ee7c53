//! Source manager interface.
//!
//! A source manager answers questions about upstream projects: which
//! versions exist, whether a revision is still present, what a version
//! declares and imports, and which project an import path belongs to. The
//! concrete version control backends live outside this workspace; tests and
//! benchmarks use [`crate::memory::InMemorySourceManager`].

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use tether_core::error::TetherError;
use tether_core::types::{
    Manifest, PairedVersion, ProjectIdentifier, ProjectRoot, Revision, Version,
};
use tether_core::utils::path::is_path_prefix;

/// Failure reported by a source manager.
///
/// Cloneable so that failures can be memoized alongside successes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("project {project} could not be found")]
    ProjectNotFound { project: String },

    #[error("{project} has no version {version}")]
    VersionNotFound { project: String, version: String },

    #[error("could not deduce the project root of '{path}': {reason}")]
    RootDeduction { path: String, reason: String },

    #[error("{project}: {message}")]
    Backend { project: String, message: String },
}

impl SourceError {
    /// Project or import path the failure is about
    pub fn project(&self) -> &str {
        match self {
            SourceError::ProjectNotFound { project }
            | SourceError::VersionNotFound { project, .. }
            | SourceError::Backend { project, .. } => project,
            SourceError::RootDeduction { path, .. } => path,
        }
    }
}

impl From<SourceError> for TetherError {
    fn from(err: SourceError) -> Self {
        let project = err.project().to_string();
        let message = err.to_string();
        TetherError::lookup(project, message, err)
    }
}

/// Result type for source manager operations
pub type SourceResult<T> = Result<T, SourceError>;

/// Package import graph of one project version
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageTree {
    /// Full package import path to the import paths it uses
    pub packages: BTreeMap<String, BTreeSet<String>>,
}

impl PackageTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<I, S>(&mut self, package: impl Into<String>, imports: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.packages
            .entry(package.into())
            .or_default()
            .extend(imports.into_iter().map(Into::into));
    }

    pub fn contains(&self, package: &str) -> bool {
        self.packages.contains_key(package)
    }

    pub fn imports_of(&self, package: &str) -> Option<&BTreeSet<String>> {
        self.packages.get(package)
    }

    /// Packages that live under `root`
    pub fn packages_under<'a>(&'a self, root: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.packages
            .keys()
            .filter(move |pkg| is_path_prefix(root, pkg))
            .map(String::as_str)
    }
}

/// Access to upstream version control metadata.
///
/// Implementations are shared across runs and must be thread-safe. Every
/// query may be slow; callers go through [`crate::SourceSession`], which
/// memoizes results for the duration of one run.
pub trait SourceManager: Send + Sync {
    /// All named versions of a project, each paired with its revision, in
    /// the order the upstream reports them
    fn list_versions(&self, id: &ProjectIdentifier) -> SourceResult<Vec<PairedVersion>>;

    /// Check if a revision still exists upstream
    fn revision_present_in(&self, id: &ProjectIdentifier, revision: &Revision) -> SourceResult<bool>;

    /// Project root an import path belongs to
    fn deduce_project_root(&self, import_path: &str) -> SourceResult<ProjectRoot>;

    /// Manifest declared by a project at a version
    fn manifest_for(&self, id: &ProjectIdentifier, version: &Version) -> SourceResult<Manifest>;

    /// Package import graph of a project at a version
    fn list_packages(&self, id: &ProjectIdentifier, version: &Version) -> SourceResult<PackageTree>;

    /// Release any resources held for the current run
    fn release(&self);
}
