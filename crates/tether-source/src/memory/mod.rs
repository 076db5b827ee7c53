//! In-memory source manager.
//!
//! Serves a fixed universe of projects, either built in code or loaded from
//! JSON, and counts every query it answers so callers can observe caching.
//!
//! ```json
//! {
//!   "projects": {
//!     "github.com/sdboyer/deptest": {
//!       "versions": [
//!         { "tag": "v1.0.0", "revision": "ff2948a2ac8f538c4ecd55962e919d1e13e74baf",
//!           "constraints": { "github.com/pkg/errors": { "version": "^0.8.0" } },
//!           "packages": { ".": ["github.com/pkg/errors"] } },
//!         { "branch": "master", "default": true, "revision": "3f4c3bea144e112a69bbe5d8d01c1b09a544253f" }
//!       ]
//!     }
//!   },
//!   "unreachable": ["github.com/golang/notexist"]
//! }
//! ```
//!
//! A version entry without `tag` or `branch` is an untagged commit: it is not
//! listed by `list_versions` but its revision is present upstream.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Deserialize;
use tracing::debug;

use tether_core::error::{TetherError, TetherResult};
use tether_core::types::{
    Branch, Constraint, Manifest, PairedVersion, ProjectIdentifier, ProjectProperties, ProjectRoot,
    RawProperties, Revision, UnpairedVersion, Version,
};
use tether_core::utils::path::{is_path_prefix, join_package};

use crate::manager::{PackageTree, SourceError, SourceManager, SourceResult};

/// One version of a fixture project
#[derive(Debug, Clone)]
pub struct FixtureVersion {
    /// `None` for an untagged commit
    pub version: Option<UnpairedVersion>,
    pub revision: Revision,
    pub constraints: BTreeMap<ProjectRoot, ProjectProperties>,
    /// Package path relative to the project root to its imports
    pub packages: BTreeMap<String, BTreeSet<String>>,
}

impl FixtureVersion {
    fn with_version(version: Option<UnpairedVersion>, revision: &str) -> Self {
        let mut packages = BTreeMap::new();
        packages.insert(".".to_string(), BTreeSet::new());
        Self {
            version,
            revision: Revision::new(revision),
            constraints: BTreeMap::new(),
            packages,
        }
    }

    /// A tag, semver or plain
    pub fn tag(name: &str, revision: &str) -> Self {
        Self::with_version(Some(UnpairedVersion::tag(name)), revision)
    }

    pub fn branch(name: &str, revision: &str) -> Self {
        Self::with_version(Some(UnpairedVersion::Branch(Branch::new(name))), revision)
    }

    pub fn default_branch(name: &str, revision: &str) -> Self {
        Self::with_version(Some(UnpairedVersion::Branch(Branch::default_branch(name))), revision)
    }

    /// An untagged commit
    pub fn commit(revision: &str) -> Self {
        Self::with_version(None, revision)
    }

    /// Add an import to the root package
    pub fn import(mut self, import_path: &str) -> Self {
        self.packages
            .entry(".".to_string())
            .or_default()
            .insert(import_path.to_string());
        self
    }

    /// Add a package, relative to the project root, with its imports
    pub fn package(mut self, relative: &str, imports: &[&str]) -> Self {
        self.packages
            .entry(relative.to_string())
            .or_default()
            .extend(imports.iter().map(|s| s.to_string()));
        self
    }

    /// Declare a constraint: a semver range or a plain tag
    pub fn constraint(self, root: &str, version: &str) -> Self {
        self.constraint_with(root, ProjectProperties::new(Constraint::from_version_str(version)))
    }

    pub fn constraint_with(mut self, root: &str, props: ProjectProperties) -> Self {
        self.constraints.insert(ProjectRoot::new(root), props);
        self
    }

    fn paired(&self) -> Option<PairedVersion> {
        self.version.clone().map(|v| v.pair(self.revision.clone()))
    }

    fn answers(&self, requested: &Version) -> bool {
        match &self.version {
            Some(v) => Version::from(v.clone().pair(self.revision.clone())).matches(requested),
            None => requested.bound_revision() == Some(&self.revision),
        }
    }
}

/// Query counters, one per source manager operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryCounts {
    pub list_versions: usize,
    pub revision_present_in: usize,
    pub deduce_project_root: usize,
    pub manifest_for: usize,
    pub list_packages: usize,
    pub release: usize,
}

#[derive(Debug, Default)]
struct Counters {
    list_versions: AtomicUsize,
    revision_present_in: AtomicUsize,
    deduce_project_root: AtomicUsize,
    manifest_for: AtomicUsize,
    list_packages: AtomicUsize,
    release: AtomicUsize,
}

/// Source manager backed by in-memory fixture data
#[derive(Debug, Default)]
pub struct InMemorySourceManager {
    projects: BTreeMap<ProjectRoot, Vec<FixtureVersion>>,
    unreachable: BTreeSet<String>,
    counters: Counters,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawUniverse {
    #[serde(default)]
    projects: BTreeMap<String, RawProject>,
    #[serde(default)]
    unreachable: BTreeSet<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawProject {
    #[serde(default)]
    versions: Vec<RawVersion>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawVersion {
    tag: Option<String>,
    branch: Option<String>,
    #[serde(default)]
    default: bool,
    revision: String,
    #[serde(default)]
    constraints: BTreeMap<String, RawProperties>,
    packages: Option<BTreeMap<String, BTreeSet<String>>>,
}

impl RawVersion {
    fn into_fixture(self, root: &str) -> TetherResult<FixtureVersion> {
        let mut fixture = match (self.tag, self.branch) {
            (Some(tag), None) => FixtureVersion::tag(&tag, &self.revision),
            (None, Some(branch)) if self.default => FixtureVersion::default_branch(&branch, &self.revision),
            (None, Some(branch)) => FixtureVersion::branch(&branch, &self.revision),
            (None, None) => FixtureVersion::commit(&self.revision),
            (Some(_), Some(_)) => {
                return Err(TetherError::ManifestValidation {
                    field: root.to_string(),
                    reason: format!("version at {} has both a tag and a branch", self.revision),
                })
            },
        };
        for (dep, raw) in self.constraints {
            let props = raw.into_properties(&dep)?;
            fixture.constraints.insert(ProjectRoot::new(dep), props);
        }
        if let Some(packages) = self.packages {
            fixture.packages = packages;
        }
        Ok(fixture)
    }
}

impl InMemorySourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a fixture universe from JSON
    pub fn from_json(json: &str) -> TetherResult<Self> {
        let raw: RawUniverse = serde_json::from_str(json).map_err(|e| TetherError::JsonParse {
            message: e.to_string(),
        })?;

        let mut manager = Self::new();
        for (root, project) in raw.projects {
            let versions = project
                .versions
                .into_iter()
                .map(|v| v.into_fixture(&root))
                .collect::<TetherResult<Vec<_>>>()?;
            manager.projects.insert(ProjectRoot::new(root), versions);
        }
        manager.unreachable = raw.unreachable;
        debug!(projects = manager.projects.len(), "Loaded fixture universe");
        Ok(manager)
    }

    /// Register a project with its versions, in upstream order
    pub fn with_project(mut self, root: &str, versions: Vec<FixtureVersion>) -> Self {
        self.projects.insert(ProjectRoot::new(root), versions);
        self
    }

    /// Make every query about a project fail
    pub fn with_unreachable(mut self, root: &str) -> Self {
        self.unreachable.insert(root.to_string());
        self
    }

    /// Snapshot of the query counters
    pub fn counts(&self) -> QueryCounts {
        let c = &self.counters;
        QueryCounts {
            list_versions: c.list_versions.load(Ordering::SeqCst),
            revision_present_in: c.revision_present_in.load(Ordering::SeqCst),
            deduce_project_root: c.deduce_project_root.load(Ordering::SeqCst),
            manifest_for: c.manifest_for.load(Ordering::SeqCst),
            list_packages: c.list_packages.load(Ordering::SeqCst),
            release: c.release.load(Ordering::SeqCst),
        }
    }

    pub fn project_count(&self) -> usize {
        self.projects.len()
    }

    /// Resolve the fixture project an identifier points at. A source that
    /// names another registered project (a fork) is served from that one.
    fn project(&self, id: &ProjectIdentifier) -> SourceResult<(&str, &[FixtureVersion])> {
        let key = ProjectRoot::new(id.normalized_source());
        if self.unreachable.contains(key.as_str()) || self.unreachable.contains(id.root.as_str()) {
            return Err(SourceError::Backend {
                project: id.root.to_string(),
                message: "repository is unreachable".to_string(),
            });
        }
        self.projects
            .get_key_value(&key)
            .or_else(|| self.projects.get_key_value(&id.root))
            .map(|(root, versions)| (root.as_str(), versions.as_slice()))
            .ok_or_else(|| SourceError::ProjectNotFound {
                project: id.root.to_string(),
            })
    }

    fn version(&self, id: &ProjectIdentifier, version: &Version) -> SourceResult<(&str, &FixtureVersion)> {
        let (root, versions) = self.project(id)?;
        versions
            .iter()
            .find(|v| v.answers(version))
            .map(|v| (root, v))
            .ok_or_else(|| SourceError::VersionNotFound {
                project: id.root.to_string(),
                version: version.to_string(),
            })
    }
}

impl SourceManager for InMemorySourceManager {
    fn list_versions(&self, id: &ProjectIdentifier) -> SourceResult<Vec<PairedVersion>> {
        self.counters.list_versions.fetch_add(1, Ordering::SeqCst);
        let (_, versions) = self.project(id)?;
        Ok(versions.iter().filter_map(FixtureVersion::paired).collect())
    }

    fn revision_present_in(&self, id: &ProjectIdentifier, revision: &Revision) -> SourceResult<bool> {
        self.counters.revision_present_in.fetch_add(1, Ordering::SeqCst);
        let (_, versions) = self.project(id)?;
        Ok(versions.iter().any(|v| v.revision == *revision))
    }

    fn deduce_project_root(&self, import_path: &str) -> SourceResult<ProjectRoot> {
        self.counters.deduce_project_root.fetch_add(1, Ordering::SeqCst);
        let registered = self
            .projects
            .keys()
            .map(ProjectRoot::as_str)
            .chain(self.unreachable.iter().map(String::as_str))
            .filter(|root| is_path_prefix(root, import_path))
            .max_by_key(|root| root.len());

        match registered {
            Some(root) => Ok(ProjectRoot::new(root)),
            None => Err(SourceError::RootDeduction {
                path: import_path.to_string(),
                reason: "no known project contains this path".to_string(),
            }),
        }
    }

    fn manifest_for(&self, id: &ProjectIdentifier, version: &Version) -> SourceResult<Manifest> {
        self.counters.manifest_for.fetch_add(1, Ordering::SeqCst);
        let (_, fixture) = self.version(id, version)?;
        Ok(Manifest {
            constraints: fixture.constraints.clone(),
            ..Manifest::default()
        })
    }

    fn list_packages(&self, id: &ProjectIdentifier, version: &Version) -> SourceResult<PackageTree> {
        self.counters.list_packages.fetch_add(1, Ordering::SeqCst);
        let (_, fixture) = self.version(id, version)?;
        let mut tree = PackageTree::new();
        for (relative, imports) in &fixture.packages {
            tree.insert(join_package(id.root.as_str(), relative), imports.iter().cloned());
        }
        Ok(tree)
    }

    fn release(&self) {
        self.counters.release.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEPTEST: &str = "github.com/sdboyer/deptest";
    const REV_V1: &str = "ff2948a2ac8f538c4ecd55962e919d1e13e74baf";
    const REV_MASTER: &str = "3f4c3bea144e112a69bbe5d8d01c1b09a544253f";

    fn fixture() -> InMemorySourceManager {
        InMemorySourceManager::from_json(
            r#"{
                "projects": {
                    "github.com/sdboyer/deptest": {
                        "versions": [
                            { "tag": "v1.0.0", "revision": "ff2948a2ac8f538c4ecd55962e919d1e13e74baf",
                              "constraints": { "github.com/pkg/errors": { "version": "^0.8.0" } },
                              "packages": { ".": ["github.com/pkg/errors"], "sub": ["fmt"] } },
                            { "branch": "master", "default": true,
                              "revision": "3f4c3bea144e112a69bbe5d8d01c1b09a544253f" },
                            { "revision": "0000000000000000000000000000000000000001" }
                        ]
                    },
                    "github.com/pkg/errors": {
                        "versions": [ { "tag": "v0.8.0", "revision": "645ef00459ed84a119197bfb8d8205042c6df63d" } ]
                    }
                },
                "unreachable": ["github.com/golang/notexist"]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_list_versions_skips_untagged_commits() {
        let sm = fixture();
        let versions = sm.list_versions(&ProjectIdentifier::new(DEPTEST)).unwrap();
        let names: Vec<String> = versions.iter().map(|v| v.to_string()).collect();
        assert_eq!(names, vec!["v1.0.0", "master"]);
        assert!(versions[1].unpaired().as_branch().unwrap().is_default);
        assert_eq!(sm.counts().list_versions, 1);
    }

    #[test]
    fn test_revision_present_in() {
        let sm = fixture();
        let id = ProjectIdentifier::new(DEPTEST);
        assert!(sm.revision_present_in(&id, &Revision::new(REV_MASTER)).unwrap());
        assert!(sm
            .revision_present_in(&id, &Revision::new("0000000000000000000000000000000000000001"))
            .unwrap());
        assert!(!sm.revision_present_in(&id, &Revision::new("deadbeef")).unwrap());
    }

    #[test]
    fn test_deduce_project_root_longest_prefix() {
        let sm = fixture().with_project("github.com/sdboyer/deptest/nested", vec![]);
        assert_eq!(
            sm.deduce_project_root("github.com/sdboyer/deptest/sub").unwrap().as_str(),
            DEPTEST
        );
        assert_eq!(
            sm.deduce_project_root("github.com/sdboyer/deptest/nested/x").unwrap().as_str(),
            "github.com/sdboyer/deptest/nested"
        );
        assert!(sm.deduce_project_root("github.com/sdboyer/deptestdos").is_err());
    }

    #[test]
    fn test_manifest_and_packages_by_version() {
        let sm = fixture();
        let id = ProjectIdentifier::new(DEPTEST);
        let v1: Version = UnpairedVersion::tag("v1.0.0").pair(Revision::new(REV_V1)).into();

        let manifest = sm.manifest_for(&id, &v1).unwrap();
        let errors = manifest.constraint_for(&ProjectRoot::new("github.com/pkg/errors")).unwrap();
        assert_eq!(errors.constraint.to_string(), "^0.8.0");

        let tree = sm.list_packages(&id, &Version::revision(REV_V1)).unwrap();
        assert!(tree.contains(DEPTEST));
        assert!(tree.contains("github.com/sdboyer/deptest/sub"));

        assert!(matches!(
            sm.manifest_for(&id, &Version::tag("v9.0.0")),
            Err(SourceError::VersionNotFound { .. })
        ));
    }

    #[test]
    fn test_unreachable_and_unknown_projects() {
        let sm = fixture();
        assert!(matches!(
            sm.list_versions(&ProjectIdentifier::new("github.com/golang/notexist")),
            Err(SourceError::Backend { .. })
        ));
        assert!(matches!(
            sm.list_versions(&ProjectIdentifier::new("github.com/nobody/nothing")),
            Err(SourceError::ProjectNotFound { .. })
        ));
    }

    #[test]
    fn test_source_override_serves_fork() {
        let sm = fixture().with_project(
            "github.com/me/errors",
            vec![FixtureVersion::tag("v0.9.0", "1111111111111111111111111111111111111111")],
        );
        let fork = ProjectIdentifier::with_source("github.com/pkg/errors", "github.com/me/errors");
        let versions = sm.list_versions(&fork).unwrap();
        assert_eq!(versions[0].to_string(), "v0.9.0");
    }

    #[test]
    fn test_rejects_bad_fixture() {
        assert!(InMemorySourceManager::from_json(r#"{ "projects": 3 }"#).is_err());
        assert!(InMemorySourceManager::from_json(
            r#"{ "projects": { "a.com/x": { "versions": [ { "tag": "v1", "branch": "m", "revision": "r" } ] } } }"#
        )
        .is_err());
    }
}
