//! Lock state: the exact version chosen for every project of a solution.

use std::collections::{BTreeSet, HashSet};

use super::project::{ProjectIdentifier, ProjectRoot};
use super::version::Version;
use crate::error::{TetherError, TetherResult};

/// Metadata about the solve that produced a lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolveMeta {
    /// blake3 digest of the solver inputs (manifest and root imports)
    pub inputs_digest: String,
    pub solver_name: String,
    pub solver_version: u32,
}

/// One locked project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedProject {
    pub ident: ProjectIdentifier,
    pub version: Version,
    /// Package paths relative to the project root, `.` for the root package
    pub packages: BTreeSet<String>,
}

impl LockedProject {
    pub fn new(ident: ProjectIdentifier, version: Version) -> Self {
        Self {
            ident,
            version,
            packages: BTreeSet::new(),
        }
    }

    pub fn with_packages<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.packages.extend(packages.into_iter().map(Into::into));
        self
    }

    pub fn root(&self) -> &ProjectRoot {
        &self.ident.root
    }
}

/// Recorded assignment of versions to projects
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lock {
    pub projects: Vec<LockedProject>,
    pub solve_meta: Option<SolveMeta>,
}

impl Lock {
    /// Build a lock, sorting projects by root and rejecting duplicate roots
    pub fn from_projects(mut projects: Vec<LockedProject>) -> TetherResult<Self> {
        projects.sort_by(|a, b| a.ident.root.cmp(&b.ident.root));
        let lock = Self {
            projects,
            solve_meta: None,
        };
        lock.validate()?;
        Ok(lock)
    }

    pub fn with_solve_meta(mut self, meta: SolveMeta) -> Self {
        self.solve_meta = Some(meta);
        self
    }

    /// Check that every project root appears once
    pub fn validate(&self) -> TetherResult<()> {
        let mut seen = HashSet::with_capacity(self.projects.len());
        for project in &self.projects {
            if !seen.insert(&project.ident.root) {
                return Err(TetherError::LockValidation {
                    project: project.ident.root.to_string(),
                    reason: "project is locked more than once".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn find(&self, root: &ProjectRoot) -> Option<&LockedProject> {
        self.projects.iter().find(|p| p.ident.root == *root)
    }

    pub fn find_mut(&mut self, root: &ProjectRoot) -> Option<&mut LockedProject> {
        self.projects.iter_mut().find(|p| p.ident.root == *root)
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    /// Same locked projects, ignoring solve metadata
    pub fn same_projects(&self, other: &Lock) -> bool {
        self.projects == other.projects
    }
}

/// Check if a project root is locked. Only exact roots count: a sub-package
/// path of a locked project is not itself in the lock.
pub fn project_exists_in_lock(lock: &Lock, root: &ProjectRoot) -> bool {
    lock.projects.iter().any(|p| p.ident.root == *root)
}
