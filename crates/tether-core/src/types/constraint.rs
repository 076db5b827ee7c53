//! Constraints: predicates over versions.
//!
//! A constraint admits a version when the version's kind matches the
//! constraint's kind and, for semver ranges, the version falls inside the
//! range.

use std::fmt;

use super::version::{parse_semver, Revision, SemverTag, UnpairedVersion, Version};
use crate::error::{TetherError, TetherResult};

/// Version constraint declared for a project
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constraint {
    /// Admits every version
    Any,
    /// Exactly this revision, bare or paired
    Revision(Revision),
    /// The named branch, paired or not
    Branch(String),
    /// The named non-semver tag
    Plain(String),
    /// A semantic version range
    Semver(SemverRange),
}

/// Union of semver requirements (`^1.0.0 || ^2.0.0`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SemverRange {
    alternatives: Vec<semver::VersionReq>,
}

impl SemverRange {
    /// Parse a range expression.
    ///
    /// Accepts `semver` requirement syntax plus a leading `v` on versions,
    /// space-separated comparators (`>=1.0.0 <2.0.0`), hyphen ranges
    /// (`1.0.0 - 2.0.0`) and `||` unions. A bare version means caret.
    pub fn parse(input: &str) -> TetherResult<Self> {
        let invalid = |reason: String| TetherError::InvalidConstraint {
            input: input.to_string(),
            reason,
        };

        let alternatives = input
            .split("||")
            .map(|alt| parse_alternative(alt.trim()).map_err(&invalid))
            .collect::<TetherResult<Vec<_>>>()?;

        Ok(Self { alternatives })
    }

    /// `^x.y.z` for a concrete version
    pub fn caret(tag: &SemverTag) -> Self {
        let v = tag.version();
        let req = semver::VersionReq {
            comparators: vec![semver::Comparator {
                op: semver::Op::Caret,
                major: v.major,
                minor: Some(v.minor),
                patch: Some(v.patch),
                pre: v.pre.clone(),
            }],
        };
        Self {
            alternatives: vec![req],
        }
    }

    pub fn admits(&self, tag: &SemverTag) -> bool {
        self.alternatives.iter().any(|req| req.matches(tag.version()))
    }
}

impl fmt::Display for SemverRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, req) in self.alternatives.iter().enumerate() {
            if i > 0 {
                f.write_str(" || ")?;
            }
            write!(f, "{}", req)?;
        }
        Ok(())
    }
}

fn is_operator(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| matches!(c, '<' | '>' | '=' | '~' | '^'))
}

/// Split `>=v1.2.0` into (`>=`, `1.2.0`)
fn split_operator(token: &str) -> (&str, &str) {
    let idx = token
        .find(|c: char| !matches!(c, '<' | '>' | '=' | '~' | '^'))
        .unwrap_or(token.len());
    let (op, version) = token.split_at(idx);
    let version = version.strip_prefix('v').unwrap_or(version);
    (op, version)
}

fn parse_alternative(alt: &str) -> Result<semver::VersionReq, String> {
    if alt.is_empty() {
        return Err("empty range".to_string());
    }

    let tokens: Vec<&str> = alt
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect();

    // Hyphen range: `a - b` means `>=a, <=b`
    if tokens.len() == 3 && tokens[1] == "-" {
        let low = parse_semver(tokens[0])?;
        let high = parse_semver(tokens[2])?;
        return semver::VersionReq::parse(&format!(">={}, <={}", low, high))
            .map_err(|e| e.to_string());
    }

    let mut comparators = Vec::with_capacity(tokens.len());
    let mut pending = String::new();
    for token in tokens {
        if is_operator(token) {
            pending.push_str(token);
            continue;
        }
        let (op, version) = split_operator(token);
        comparators.push(format!("{}{}{}", pending, op, version));
        pending.clear();
    }
    if !pending.is_empty() {
        return Err(format!("operator '{}' has no version", pending));
    }

    semver::VersionReq::parse(&comparators.join(", ")).map_err(|e| e.to_string())
}

impl Constraint {
    pub fn revision(hash: impl Into<String>) -> Self {
        Constraint::Revision(Revision::new(hash))
    }

    pub fn branch(name: impl Into<String>) -> Self {
        Constraint::Branch(name.into())
    }

    /// Parse a semver range, failing when it is not one
    pub fn semver(range: &str) -> TetherResult<Self> {
        Ok(Constraint::Semver(SemverRange::parse(range)?))
    }

    /// Interpret a `version` value: a semver range when it parses as one,
    /// otherwise a plain tag
    pub fn from_version_str(value: &str) -> Self {
        match SemverRange::parse(value) {
            Ok(range) => Constraint::Semver(range),
            Err(_) => Constraint::Plain(value.trim().to_string()),
        }
    }

    /// The tightest constraint that admits `version`: caret for semver
    /// tags, the name for branches and plain tags, the hash for revisions
    pub fn from_version(version: &Version) -> Self {
        match version.unpaired() {
            Some(UnpairedVersion::Semver(tag)) => Constraint::Semver(SemverRange::caret(tag)),
            Some(UnpairedVersion::Branch(b)) => Constraint::Branch(b.name.clone()),
            Some(UnpairedVersion::Plain(tag)) => Constraint::Plain(tag.clone()),
            None => match version.bound_revision() {
                Some(rev) => Constraint::Revision(rev.clone()),
                None => Constraint::Any,
            },
        }
    }

    /// Check if a version satisfies this constraint
    pub fn admits(&self, version: &Version) -> bool {
        match self {
            Constraint::Any => true,
            Constraint::Revision(rev) => version.bound_revision() == Some(rev),
            Constraint::Branch(name) => {
                matches!(version.unpaired(), Some(UnpairedVersion::Branch(b)) if b.name == *name)
            },
            Constraint::Plain(tag) => {
                matches!(version.unpaired(), Some(UnpairedVersion::Plain(t)) if t == tag)
            },
            Constraint::Semver(range) => version.semver().map_or(false, |tag| range.admits(tag)),
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Constraint::Any)
    }

    pub fn as_branch(&self) -> Option<&str> {
        match self {
            Constraint::Branch(name) => Some(name),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Constraint::Any => "any",
            Constraint::Revision(_) => "revision",
            Constraint::Branch(_) => "branch",
            Constraint::Plain(_) => "version",
            Constraint::Semver(_) => "semver",
        }
    }
}

impl Default for Constraint {
    fn default() -> Self {
        Constraint::Any
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Any => f.write_str("*"),
            Constraint::Revision(rev) => rev.fmt(f),
            Constraint::Branch(name) => f.write_str(name),
            Constraint::Plain(tag) => f.write_str(tag),
            Constraint::Semver(range) => range.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REV: &str = "ff2948a2ac8f538c4ecd55962e919d1e13e74baf";

    fn paired(tag: &str, rev: &str) -> Version {
        UnpairedVersion::tag(tag).pair(Revision::new(rev)).into()
    }

    #[test]
    fn test_semver_range_admits_paired_and_unpaired() {
        let c = Constraint::semver("<1.0.0").unwrap();
        assert!(c.admits(&paired("v0.8.0", REV)));
        assert!(c.admits(&Version::tag("v0.8.0")));
        assert!(!c.admits(&paired("v1.0.0", REV)));
        assert!(!c.admits(&Version::branch("master")));
        assert!(!c.admits(&Version::revision(REV)));
    }

    #[test]
    fn test_bare_version_means_caret() {
        let c = Constraint::semver("1.0.0").unwrap();
        assert_eq!(c.to_string(), "^1.0.0");
        assert!(c.admits(&Version::tag("v1.4.2")));
        assert!(!c.admits(&Version::tag("v2.0.0")));
    }

    #[test]
    fn test_range_syntax_variants() {
        let spaced = Constraint::semver(">= v1.0.0 <2.0.0").unwrap();
        assert_eq!(spaced.to_string(), ">=1.0.0, <2.0.0");
        assert!(spaced.admits(&Version::tag("1.9.9")));
        assert!(!spaced.admits(&Version::tag("2.0.0")));

        let union = Constraint::semver("^1.0.0 || ^3.0.0").unwrap();
        assert_eq!(union.to_string(), "^1.0.0 || ^3.0.0");
        assert!(union.admits(&Version::tag("3.1.0")));
        assert!(!union.admits(&Version::tag("2.1.0")));

        let hyphen = Constraint::semver("1.0.0 - 1.5.0").unwrap();
        assert!(hyphen.admits(&Version::tag("1.5.0")));
        assert!(!hyphen.admits(&Version::tag("1.5.1")));
    }

    #[test]
    fn test_invalid_ranges() {
        assert!(Constraint::semver("").is_err());
        assert!(Constraint::semver("master").is_err());
        assert!(Constraint::semver(">=").is_err());
        assert!(Constraint::semver("^1.0.0 ||").is_err());
    }

    #[test]
    fn test_from_version_str_falls_back_to_plain() {
        assert!(matches!(Constraint::from_version_str("^1.2.0"), Constraint::Semver(_)));
        assert_eq!(
            Constraint::from_version_str("release-2017"),
            Constraint::Plain("release-2017".to_string())
        );
    }

    #[test]
    fn test_branch_constraint() {
        let c = Constraint::branch("master");
        assert!(c.admits(&Version::branch("master")));
        let paired_master: Version = UnpairedVersion::branch("master").pair(Revision::new(REV)).into();
        assert!(c.admits(&paired_master));
        assert!(!c.admits(&Version::branch("develop")));
        assert!(!c.admits(&Version::tag("master-1")));
        assert_eq!(c.as_branch(), Some("master"));
    }

    #[test]
    fn test_revision_constraint() {
        let c = Constraint::revision(REV);
        assert!(c.admits(&Version::revision(REV)));
        assert!(c.admits(&paired("v1.0.0", REV)));
        assert!(!c.admits(&Version::tag("v1.0.0")));
    }

    #[test]
    fn test_plain_constraint_is_kind_strict() {
        let c = Constraint::Plain("weekly".to_string());
        assert!(c.admits(&Version::tag("weekly")));
        assert!(!c.admits(&Version::branch("weekly")));
    }

    #[test]
    fn test_from_version() {
        let c = Constraint::from_version(&paired("v1.2.0", REV));
        assert_eq!(c.to_string(), "^1.2.0");
        assert_eq!(
            Constraint::from_version(&Version::branch("master")),
            Constraint::branch("master")
        );
        assert_eq!(
            Constraint::from_version(&Version::revision(REV)),
            Constraint::revision(REV)
        );
    }

    #[test]
    fn test_any_admits_everything() {
        assert!(Constraint::Any.admits(&Version::revision(REV)));
        assert!(Constraint::Any.admits(&Version::branch("master")));
        assert_eq!(Constraint::default().to_string(), "*");
    }
}
