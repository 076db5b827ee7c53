//! tether.lock parsing and serialization
//!
//! Projects are written sorted by root and their packages sorted, so equal
//! locks always serialize to identical bytes.

use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use tracing::debug;

use tether_core::error::TetherError;
use tether_core::types::{
    Branch, Lock, LockedProject, ProjectIdentifier, ProjectRoot, Revision, SolveMeta, UnpairedVersion, Version,
};
use tether_core::utils::path::is_valid_import_path;

use crate::ConfigResult;

/// File name of the lock
pub const LOCK_NAME: &str = "tether.lock";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct LockToml {
    #[serde(default)]
    projects: Vec<RawLockedProject>,

    #[serde(default, rename = "solve-meta", skip_serializing_if = "Option::is_none")]
    solve_meta: Option<RawSolveMeta>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLockedProject {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    revision: Option<String>,
    #[serde(default)]
    packages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct RawSolveMeta {
    inputs_digest: String,
    solver_name: String,
    solver_version: u32,
}

impl RawLockedProject {
    fn into_locked(self) -> ConfigResult<LockedProject> {
        let invalid = |reason: &str| TetherError::LockValidation {
            project: self.name.clone(),
            reason: reason.to_string(),
        };

        if !is_valid_import_path(&self.name) {
            return Err(invalid("not a valid project root"));
        }
        if self.revision.as_deref().map_or(false, |r| r.trim().is_empty()) {
            return Err(invalid("revision must not be empty"));
        }

        let named = match (&self.version, &self.branch) {
            (Some(_), Some(_)) => return Err(invalid("only one of version or branch may be set")),
            (Some(tag), None) => Some(UnpairedVersion::tag(tag)),
            (None, Some(branch)) => Some(UnpairedVersion::Branch(Branch::new(branch.clone()))),
            (None, None) => None,
        };
        let version = match (named, &self.revision) {
            (Some(named), Some(rev)) => Version::Paired(named.pair(Revision::new(rev.trim()))),
            (Some(named), None) => Version::Unpaired(named),
            (None, Some(rev)) => Version::revision(rev.trim()),
            (None, None) => return Err(invalid("one of version, branch or revision is required")),
        };

        let ident = ProjectIdentifier {
            root: ProjectRoot::new(self.name.as_str()),
            source: self.source.filter(|s| !s.is_empty()),
        };
        Ok(LockedProject::new(ident, version).with_packages(self.packages))
    }
}

impl From<&LockedProject> for RawLockedProject {
    fn from(project: &LockedProject) -> Self {
        let (version, branch) = match project.version.unpaired() {
            Some(UnpairedVersion::Branch(b)) => (None, Some(b.name.clone())),
            Some(other) => (Some(other.name().to_string()), None),
            None => (None, None),
        };
        Self {
            name: project.root().to_string(),
            source: project.ident.source.clone(),
            version,
            branch,
            revision: project.version.bound_revision().map(|r| r.to_string()),
            packages: project.packages.iter().cloned().collect(),
        }
    }
}

/// Parse tether.lock content
pub fn parse_lock(content: &str) -> ConfigResult<Lock> {
    // First try with toml_edit for better error reporting
    content
        .parse::<toml_edit::DocumentMut>()
        .map_err(|e| toml_error(format!("TOML syntax error: {}", e)))?;

    let raw: LockToml = toml::from_str(content).map_err(|e| toml_error(format!("TOML parsing error: {}", e)))?;

    let projects = raw
        .projects
        .into_iter()
        .map(RawLockedProject::into_locked)
        .collect::<ConfigResult<Vec<_>>>()?;
    let mut lock = Lock::from_projects(projects)?;
    if let Some(meta) = raw.solve_meta {
        lock = lock.with_solve_meta(SolveMeta {
            inputs_digest: meta.inputs_digest,
            solver_name: meta.solver_name,
            solver_version: meta.solver_version,
        });
    }

    debug!(projects = lock.len(), "Parsed lock");
    Ok(lock)
}

/// Serialize a lock to tether.lock content
pub fn serialize_lock(lock: &Lock) -> ConfigResult<String> {
    lock.validate()?;
    let mut projects: Vec<RawLockedProject> = lock.projects.iter().map(RawLockedProject::from).collect();
    projects.sort_by(|a, b| a.name.cmp(&b.name));

    let raw = LockToml {
        projects,
        solve_meta: lock.solve_meta.as_ref().map(|meta| RawSolveMeta {
            inputs_digest: meta.inputs_digest.clone(),
            solver_name: meta.solver_name.clone(),
            solver_version: meta.solver_version,
        }),
    };
    toml::to_string_pretty(&raw).map_err(|e| toml_error(format!("TOML serialization error: {}", e)))
}

/// Load tether.lock from file path
pub async fn load_from_file(path: &Utf8Path) -> ConfigResult<Lock> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| TetherError::io(format!("Failed to read {}", path), e))?;

    parse_lock(&content).map_err(|e| match e {
        TetherError::TomlParse { message, .. } => TetherError::TomlParse {
            file: path.to_string(),
            message,
        },
        other => other,
    })
}

fn toml_error(message: String) -> TetherError {
    TetherError::TomlParse {
        file: LOCK_NAME.to_string(),
        message,
    }
}
