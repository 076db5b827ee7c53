//! Checks on the outcome of a conversion, for importer tests.

use thiserror::Error;

use tether_core::types::{Lock, Manifest, ProjectRoot, Version};

use crate::ConfigResult;

/// First way a conversion result differs from a [`ConvertExpectation`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConvertMismatch {
    #[error("Expected the conversion to fail, but it did not return an error")]
    UnexpectedSuccess,

    #[error("Expected the conversion to pass, but it returned an error: {0}")]
    UnexpectedError(String),

    #[error("Expected manifest to have {want} ignored project(s), got {got}")]
    IgnoreCount { want: usize, got: usize },

    #[error("Expected manifest to have ignore {want}, got {got}")]
    Ignored { want: String, got: String },

    #[error("Expected the manifest to have a dependency for '{project}' but got none")]
    MissingConstraint { project: String },

    #[error("Expected manifest constraint to be {want}, got {got}")]
    Constraint { want: String, got: String },

    #[error("Expected lock to have {want} project(s), got {got}")]
    LockCount { want: usize, got: usize },

    #[error("Expected the lock to have a project for '{want}' but got '{got}'")]
    LockedProject { want: String, got: String },

    #[error("Expected locked source to be {want}, got '{got}'")]
    Source { want: String, got: String },

    #[error("Expected locked version to be '{want}', got {got}")]
    Version { want: String, got: String },

    #[error("Expected locked version to be paired but got a {kind} ({version})")]
    NotPaired { kind: &'static str, version: String },

    #[error("Expected locked revision to be '{want}', got {got}")]
    Revision { want: String, got: String },
}

/// Expected outcome of converting an external configuration.
///
/// Empty strings and zero counts still take part in the comparison except
/// for `want_constraint`, `want_version` and `want_revision`, which are only
/// checked when set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvertExpectation {
    pub want_convert_err: bool,
    /// Project checked for a constraint and expected first in the lock
    pub project_root: ProjectRoot,
    pub want_source_repo: Option<String>,
    pub want_constraint: Option<String>,
    pub want_revision: Option<String>,
    pub want_version: Option<String>,
    pub want_lock_count: usize,
    pub want_ignore_count: usize,
    pub want_ignored_packages: Vec<String>,
}

impl ConvertExpectation {
    /// Compare a conversion result, describing the first mismatch
    pub fn validate(&self, result: &ConfigResult<(Manifest, Option<Lock>)>) -> Result<(), ConvertMismatch> {
        let (manifest, lock) = match (result, self.want_convert_err) {
            (Err(_), true) => return Ok(()),
            (Ok(_), true) => return Err(ConvertMismatch::UnexpectedSuccess),
            (Err(e), false) => return Err(ConvertMismatch::UnexpectedError(e.to_string())),
            (Ok((manifest, lock)), false) => (manifest, lock),
        };

        if manifest.ignored.len() != self.want_ignore_count {
            return Err(ConvertMismatch::IgnoreCount {
                want: self.want_ignore_count,
                got: manifest.ignored.len(),
            });
        }

        let mut wanted = self.want_ignored_packages.clone();
        wanted.sort();
        let got: Vec<String> = manifest.ignored.iter().cloned().collect();
        if got != wanted {
            return Err(ConvertMismatch::Ignored {
                want: wanted.join(", "),
                got: got.join(", "),
            });
        }

        if let Some(want) = &self.want_constraint {
            let props = manifest
                .constraint_for(&self.project_root)
                .ok_or_else(|| ConvertMismatch::MissingConstraint {
                    project: self.project_root.to_string(),
                })?;
            let got = props.constraint.to_string();
            if got != *want {
                return Err(ConvertMismatch::Constraint {
                    want: want.clone(),
                    got,
                });
            }
        }

        let Some(lock) = lock else {
            return Ok(());
        };
        if lock.len() != self.want_lock_count {
            return Err(ConvertMismatch::LockCount {
                want: self.want_lock_count,
                got: lock.len(),
            });
        }

        let Some(project) = lock.projects.first() else {
            return Ok(());
        };
        if *project.root() != self.project_root {
            return Err(ConvertMismatch::LockedProject {
                want: self.project_root.to_string(),
                got: project.root().to_string(),
            });
        }
        if project.ident.source != self.want_source_repo {
            return Err(ConvertMismatch::Source {
                want: self.want_source_repo.clone().unwrap_or_default(),
                got: project.ident.source.clone().unwrap_or_default(),
            });
        }

        if let Some(want) = &self.want_version {
            let got = project.version.to_string();
            if got != *want {
                return Err(ConvertMismatch::Version {
                    want: want.clone(),
                    got,
                });
            }
        }

        if let Some(want) = &self.want_revision {
            let Version::Paired(paired) = &project.version else {
                return Err(ConvertMismatch::NotPaired {
                    kind: project.version.type_name(),
                    version: project.version.to_string(),
                });
            };
            if paired.revision().as_str() != want {
                return Err(ConvertMismatch::Revision {
                    want: want.clone(),
                    got: paired.revision().to_string(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::error::{ConversionError, TetherError};
    use tether_core::types::{LockedProject, ProjectIdentifier, Revision, UnpairedVersion};

    fn converted() -> (Manifest, Option<Lock>) {
        let mut manifest = Manifest::new();
        manifest.ignored.insert("github.com/acme/app/gen".to_string());
        let version = Version::Paired(UnpairedVersion::tag("v1.0.0").pair(Revision::new("ff2948a")));
        let lock = Lock::from_projects(vec![LockedProject::new(
            ProjectIdentifier::new("github.com/sdboyer/deptest"),
            version,
        )])
        .unwrap();
        (manifest, Some(lock))
    }

    fn expectation() -> ConvertExpectation {
        ConvertExpectation {
            project_root: ProjectRoot::new("github.com/sdboyer/deptest"),
            want_version: Some("v1.0.0".to_string()),
            want_revision: Some("ff2948a".to_string()),
            want_lock_count: 1,
            want_ignore_count: 1,
            want_ignored_packages: vec!["github.com/acme/app/gen".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_expected_failure_only_checks_the_error() {
        let expect = ConvertExpectation {
            want_convert_err: true,
            want_lock_count: 7,
            ..Default::default()
        };
        let failed: ConfigResult<(Manifest, Option<Lock>)> =
            Err(TetherError::Conversion(ConversionError::EmptyName { index: 0 }));
        assert!(expect.validate(&failed).is_ok());
        assert_eq!(expect.validate(&Ok(converted())), Err(ConvertMismatch::UnexpectedSuccess));
    }

    #[test]
    fn test_matching_conversion() {
        assert_eq!(expectation().validate(&Ok(converted())), Ok(()));
    }

    #[test]
    fn test_reports_first_mismatch() {
        let mut expect = expectation();
        expect.want_lock_count = 2;
        let err = expect.validate(&Ok(converted())).unwrap_err();
        assert_eq!(err, ConvertMismatch::LockCount { want: 2, got: 1 });
        assert_eq!(err.to_string(), "Expected lock to have 2 project(s), got 1");

        let mut expect = expectation();
        expect.want_constraint = Some("^1.0.0".to_string());
        let err = expect.validate(&Ok(converted())).unwrap_err();
        assert!(matches!(err, ConvertMismatch::MissingConstraint { .. }));
        assert!(err.to_string().contains("to have a dependency for 'github.com/sdboyer/deptest'"));
    }

    #[test]
    fn test_revision_requires_paired_version() {
        let (manifest, _) = converted();
        let lock = Lock::from_projects(vec![LockedProject::new(
            ProjectIdentifier::new("github.com/sdboyer/deptest"),
            Version::revision("ff2948a"),
        )])
        .unwrap();
        let mut expect = expectation();
        expect.want_version = None;
        let err = expect.validate(&Ok((manifest, Some(lock)))).unwrap_err();
        assert!(matches!(err, ConvertMismatch::NotPaired { kind: "revision", .. }));
    }
}
