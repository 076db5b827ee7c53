//! Importing other tools' dependency configuration
//!
//! Every importer reads its tool's files into an [`ExternalConfig`], a
//! neutral list of ignored packages and pinned packages. The [`Converter`]
//! turns that into a tether manifest and, when revisions are known, a lock.

mod lookup;
mod validate;

pub use lookup::lookup_version_for_locked_project;
pub use validate::{ConvertExpectation, ConvertMismatch};

use std::collections::BTreeMap;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use tether_core::error::{ConversionError, TetherError};
use tether_core::types::{
    project_exists_in_lock, Constraint, Lock, LockedProject, Manifest, ProjectIdentifier, ProjectProperties,
    ProjectRoot, Revision, SemverRange, SemverTag, UnpairedVersion, Version,
};
use tether_core::utils::path::{is_valid_import_path, relative_package};
use tether_source::SourceSession;

use crate::ConfigResult;

/// Tool-neutral dependency configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExternalConfig {
    #[serde(default)]
    pub ignored: Vec<String>,
    #[serde(default)]
    pub packages: Vec<ExternalPackage>,
}

/// One dependency as another tool records it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExternalPackage {
    /// Import path; may name a package below the project root
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Version, range or branch the tool recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint_hint: Option<String>,
    /// Revision the tool pinned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

impl ExternalConfig {
    /// Parse the JSON interchange form
    pub fn from_json(content: &str) -> ConfigResult<Self> {
        serde_json::from_str(content).map_err(|e| TetherError::JsonParse {
            message: e.to_string(),
        })
    }
}

impl ExternalPackage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.constraint_hint = Some(hint.into());
        self
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Reads one tool's configuration from a project directory
pub trait Importer: Send + Sync {
    /// Tool name, for logs
    fn name(&self) -> &str;

    /// File, relative to the project directory, that marks this tool
    fn config_file(&self) -> &str;

    /// Parse the tool's configuration file
    fn parse(&self, content: &str) -> ConfigResult<ExternalConfig>;
}

/// Importer for the JSON interchange form itself
#[derive(Debug, Clone)]
pub struct JsonImporter {
    file_name: String,
}

impl JsonImporter {
    pub const DEFAULT_FILE: &'static str = "tether-import.json";

    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }
}

impl Default for JsonImporter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_FILE)
    }
}

impl Importer for JsonImporter {
    fn name(&self) -> &str {
        "json"
    }

    fn config_file(&self) -> &str {
        &self.file_name
    }

    fn parse(&self, content: &str) -> ConfigResult<ExternalConfig> {
        ExternalConfig::from_json(content)
    }
}

/// What the first encounter of a project recorded, to check duplicates
struct Seen {
    hint: Option<String>,
    revision: Option<String>,
    source: Option<String>,
}

/// Converts an [`ExternalConfig`] into a manifest and an optional lock
pub struct Converter<'a> {
    session: &'a SourceSession,
}

impl<'a> Converter<'a> {
    pub fn new(session: &'a SourceSession) -> Self {
        Self { session }
    }

    /// Convert; on error nothing is produced
    pub fn convert(&self, config: &ExternalConfig) -> ConfigResult<(Manifest, Option<Lock>)> {
        let mut manifest = Manifest::new();
        for rule in &config.ignored {
            let path = rule.strip_suffix("/*").unwrap_or(rule);
            if !is_valid_import_path(path) || path.contains('*') {
                return Err(ConversionError::InvalidIgnore(rule.clone()).into());
            }
            manifest.ignored.insert(rule.clone());
        }

        let mut lock = Lock::default();
        let mut seen: BTreeMap<ProjectRoot, Seen> = BTreeMap::new();

        for (index, package) in config.packages.iter().enumerate() {
            let name = package.name.trim();
            if name.is_empty() {
                return Err(ConversionError::EmptyName { index }.into());
            }
            let root = self.session.deduce_project_root(name).map_err(|e| ConversionError::UnknownRoot {
                path: name.to_string(),
                reason: e.to_string(),
            })?;
            let relative = relative_package(root.as_str(), name).unwrap_or_else(|| ".".to_string());

            let hint = package.constraint_hint.as_deref().map(str::trim).filter(|h| !h.is_empty());
            let source = package.source.as_deref().map(str::trim).filter(|s| !s.is_empty());
            let revision = match package.revision.as_deref().map(str::trim) {
                Some("") => return Err(ConversionError::EmptyRevision { project: root.to_string() }.into()),
                other => other,
            };

            if let Some(first) = seen.get(&root) {
                let field = if first.hint.as_deref() != hint {
                    Some("constraint")
                } else if first.revision.as_deref() != revision {
                    Some("revision")
                } else if first.source.as_deref() != source {
                    Some("source")
                } else {
                    None
                };
                if let Some(field) = field {
                    return Err(ConversionError::DuplicateProject {
                        project: root.to_string(),
                        field,
                    }
                    .into());
                }
                if let Some(locked) = lock.find_mut(&root) {
                    locked.packages.insert(relative);
                }
                continue;
            }
            seen.insert(
                root.clone(),
                Seen {
                    hint: hint.map(String::from),
                    revision: revision.map(String::from),
                    source: source.map(String::from),
                },
            );

            let ident = ProjectIdentifier {
                root: root.clone(),
                source: source.map(String::from),
            };
            let mut constraint = match hint {
                Some(hint) => Some(self.constraint_from_hint(&ident, hint)?),
                None => None,
            };

            if let Some(revision) = revision {
                let version = lookup_version_for_locked_project(
                    self.session,
                    &ident,
                    constraint.as_ref(),
                    &Revision::new(revision),
                )?;
                if constraint.is_none() {
                    constraint = constraint_from_locked(&version);
                }
                if !project_exists_in_lock(&lock, &root) {
                    lock.projects
                        .push(LockedProject::new(ident.clone(), version).with_packages([relative]));
                }
            }

            match constraint {
                Some(constraint) => {
                    manifest.constraints.insert(
                        root,
                        ProjectProperties {
                            source: ident.source,
                            constraint,
                        },
                    );
                },
                None if ident.source.is_some() => {
                    manifest.constraints.insert(
                        root,
                        ProjectProperties {
                            source: ident.source,
                            constraint: Constraint::Any,
                        },
                    );
                },
                None => {},
            }
        }

        let lock = if lock.is_empty() {
            None
        } else {
            Some(Lock::from_projects(lock.projects)?)
        };
        info!(
            constraints = manifest.constraints.len(),
            locked = lock.as_ref().map_or(0, Lock::len),
            "Converted external configuration"
        );
        Ok((manifest, lock))
    }

    /// Constraint for a recorded hint: exact versions widen to caret, ranges
    /// parse as ranges, known branches become branch constraints and
    /// anything else is a plain tag
    fn constraint_from_hint(&self, ident: &ProjectIdentifier, hint: &str) -> ConfigResult<Constraint> {
        let invalid = |reason: String| ConversionError::InvalidHint {
            project: ident.root.to_string(),
            hint: hint.to_string(),
            reason,
        };

        if let Ok(tag) = SemverTag::parse(hint) {
            return Ok(Constraint::Semver(SemverRange::caret(&tag)));
        }
        if looks_like_range(hint) {
            return SemverRange::parse(hint)
                .map(Constraint::Semver)
                .map_err(|e| invalid(e.to_string()).into());
        }

        let versions = self.session.list_versions(ident)?;
        let is_branch = versions
            .iter()
            .any(|v| v.unpaired().as_branch().map_or(false, |b| b.name == hint));
        debug!(project = %ident.root, hint = %hint, is_branch, "Derived constraint from hint");
        if is_branch {
            Ok(Constraint::branch(hint))
        } else {
            Ok(Constraint::Plain(hint.to_string()))
        }
    }
}

/// Constraint implied by a locked version when no hint was recorded
fn constraint_from_locked(version: &Version) -> Option<Constraint> {
    match version.unpaired() {
        Some(UnpairedVersion::Semver(tag)) => Some(Constraint::Semver(SemverRange::caret(tag))),
        Some(UnpairedVersion::Branch(b)) => Some(Constraint::branch(b.name.clone())),
        Some(UnpairedVersion::Plain(tag)) => Some(Constraint::Plain(tag.clone())),
        None => None,
    }
}

fn looks_like_range(hint: &str) -> bool {
    hint.starts_with(|c: char| matches!(c, '^' | '~' | '>' | '<' | '=' | '*'))
        || hint.contains("||")
        || hint.contains(" - ")
        || hint.split_whitespace().count() > 1
}

/// Name and version of the analyzer that produced a manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerInfo {
    pub name: String,
    pub version: u32,
}

/// Derives the initial manifest and lock of a project, importing another
/// tool's configuration unless tools are skipped
pub struct RootAnalyzer {
    skip_tools: bool,
    importers: Vec<Box<dyn Importer>>,
}

impl RootAnalyzer {
    pub fn new(skip_tools: bool) -> Self {
        Self {
            skip_tools,
            importers: vec![Box::new(JsonImporter::default())],
        }
    }

    /// Register another importer; earlier registrations win
    pub fn with_importer(mut self, importer: Box<dyn Importer>) -> Self {
        self.importers.push(importer);
        self
    }

    pub fn info(&self) -> AnalyzerInfo {
        let name = if self.skip_tools { "tether" } else { "tether+import" };
        AnalyzerInfo {
            name: name.to_string(),
            version: 1,
        }
    }

    /// Import the first recognised tool configuration found in `dir`.
    ///
    /// Returns `None` when tools are skipped or nothing is recognised.
    pub async fn import(&self, dir: &Utf8Path, session: &SourceSession) -> ConfigResult<Option<(Manifest, Option<Lock>)>> {
        if self.skip_tools {
            return Ok(None);
        }

        for importer in &self.importers {
            let path = dir.join(importer.config_file());
            let exists = tokio::fs::try_exists(&path)
                .await
                .map_err(|e| TetherError::io(format!("Failed to check {}", path), e))?;
            if !exists {
                continue;
            }

            info!(importer = importer.name(), path = %path, "Importing configuration");
            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| TetherError::io(format!("Failed to read {}", path), e))?;
            let config = importer.parse(&content)?;
            return Converter::new(session).convert(&config).map(Some);
        }

        debug!(dir = %dir, "No importable configuration found");
        Ok(None)
    }
}
