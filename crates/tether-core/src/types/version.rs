//! Version model: the four ways a dependency version can be named.
//!
//! A [`Version`] is a bare [`Revision`], an [`UnpairedVersion`] (branch,
//! plain tag or semver tag) or a [`PairedVersion`] binding an unpaired
//! version to the revision it pointed at when it was looked up.
//!
//! Two relations are defined over versions:
//! - [`Version::matches`] is the semantic "same version" test used when
//!   checking locks and constraints. Paired versions match by revision.
//! - `Ord` is a total order used for deterministic sorting: kind rank first
//!   (revision < plain < branch < semver), then the value within the kind.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{TetherError, TetherResult};

/// Immutable source-control content hash
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(String);

/// Named mutable ref
#[derive(Debug, Clone)]
pub struct Branch {
    pub name: String,
    /// Whether this is the repository's default branch
    pub is_default: bool,
}

/// Semantic version tag, keeping the tag text it was parsed from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SemverTag {
    original: String,
    version: semver::Version,
}

/// A named version that is not bound to a revision
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UnpairedVersion {
    Branch(Branch),
    /// Tag that does not parse as a semantic version
    Plain(String),
    Semver(SemverTag),
}

/// An unpaired version bound to the exact revision it resolved to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairedVersion {
    version: UnpairedVersion,
    revision: Revision,
}

/// Any version of a project
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Version {
    Revision(Revision),
    Unpaired(UnpairedVersion),
    Paired(PairedVersion),
}

/// Discriminator used for ordering versions of different kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VersionKind {
    Revision,
    Plain,
    Branch,
    Semver,
}

impl Revision {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Revision {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl Branch {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_default: false,
        }
    }

    pub fn default_branch(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_default: true,
        }
    }
}

// Branches are identified by name alone; the default flag only affects
// candidate ordering.
impl PartialEq for Branch {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Branch {}

impl Hash for Branch {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// Parse a semantic version leniently: a leading `v` is allowed and missing
/// minor/patch components are filled with zero (`v1.2` → `1.2.0`)
pub fn parse_semver(input: &str) -> Result<semver::Version, String> {
    let trimmed = input.trim();
    let bare = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);

    match semver::Version::parse(bare) {
        Ok(v) => Ok(v),
        Err(first) => {
            let split = bare.find(|c: char| c == '-' || c == '+').unwrap_or(bare.len());
            let (core, rest) = bare.split_at(split);
            let padded = match core.split('.').count() {
                1 => format!("{}.0.0{}", core, rest),
                2 => format!("{}.0{}", core, rest),
                _ => return Err(first.to_string()),
            };
            semver::Version::parse(&padded).map_err(|_| first.to_string())
        },
    }
}

impl SemverTag {
    /// Parse a tag such as `v1.0.0` as a semantic version
    pub fn parse(tag: &str) -> TetherResult<Self> {
        let version = parse_semver(tag).map_err(|reason| TetherError::InvalidVersion {
            input: tag.to_string(),
            reason,
        })?;
        Ok(Self {
            original: tag.trim().to_string(),
            version,
        })
    }

    /// The tag text as it appears in the repository
    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn version(&self) -> &semver::Version {
        &self.version
    }

    pub fn is_prerelease(&self) -> bool {
        !self.version.pre.is_empty()
    }

    /// Semver precedence, ignoring build metadata and the tag spelling
    pub fn cmp_precedence(&self, other: &Self) -> Ordering {
        let a = &self.version;
        let b = &other.version;
        (a.major, a.minor, a.patch)
            .cmp(&(b.major, b.minor, b.patch))
            .then_with(|| a.pre.cmp(&b.pre))
    }
}

impl Ord for SemverTag {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_precedence(other)
            .then_with(|| self.version.build.cmp(&other.version.build))
            .then_with(|| self.original.cmp(&other.original))
    }
}

impl PartialOrd for SemverTag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl UnpairedVersion {
    /// Classify a tag: semver when it parses as one, plain otherwise
    pub fn tag(name: &str) -> Self {
        match SemverTag::parse(name) {
            Ok(tag) => UnpairedVersion::Semver(tag),
            Err(_) => UnpairedVersion::Plain(name.to_string()),
        }
    }

    pub fn branch(name: impl Into<String>) -> Self {
        UnpairedVersion::Branch(Branch::new(name))
    }

    pub fn kind(&self) -> VersionKind {
        match self {
            UnpairedVersion::Branch(_) => VersionKind::Branch,
            UnpairedVersion::Plain(_) => VersionKind::Plain,
            UnpairedVersion::Semver(_) => VersionKind::Semver,
        }
    }

    /// Bind this version to a revision
    pub fn pair(self, revision: Revision) -> PairedVersion {
        PairedVersion {
            version: self,
            revision,
        }
    }

    /// Branch or tag name as written in the repository
    pub fn name(&self) -> &str {
        match self {
            UnpairedVersion::Branch(b) => &b.name,
            UnpairedVersion::Plain(tag) => tag,
            UnpairedVersion::Semver(tag) => tag.original(),
        }
    }

    /// Same kind and value. Semver tags compare by precedence, so `v1.0.0`
    /// matches `1.0.0`.
    pub fn matches(&self, other: &UnpairedVersion) -> bool {
        match (self, other) {
            (UnpairedVersion::Branch(a), UnpairedVersion::Branch(b)) => a == b,
            (UnpairedVersion::Plain(a), UnpairedVersion::Plain(b)) => a == b,
            (UnpairedVersion::Semver(a), UnpairedVersion::Semver(b)) => {
                a.cmp_precedence(b) == Ordering::Equal
            },
            _ => false,
        }
    }

    /// The semantic version behind this version, paired or not
    pub fn semver(&self) -> Option<&SemverTag> {
        match self {
            UnpairedVersion::Semver(tag) => Some(tag),
            _ => None,
        }
    }

    pub fn as_branch(&self) -> Option<&Branch> {
        match self {
            UnpairedVersion::Branch(b) => Some(b),
            _ => None,
        }
    }
}

impl Ord for UnpairedVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (UnpairedVersion::Branch(a), UnpairedVersion::Branch(b)) => a.name.cmp(&b.name),
            (UnpairedVersion::Plain(a), UnpairedVersion::Plain(b)) => a.cmp(b),
            (UnpairedVersion::Semver(a), UnpairedVersion::Semver(b)) => a.cmp(b),
            _ => self.kind().cmp(&other.kind()),
        }
    }
}

impl PartialOrd for UnpairedVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for UnpairedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl PairedVersion {
    pub fn new(version: UnpairedVersion, revision: Revision) -> Self {
        Self { version, revision }
    }

    /// The named version this pairing was made from
    pub fn unpaired(&self) -> &UnpairedVersion {
        &self.version
    }

    pub fn revision(&self) -> &Revision {
        &self.revision
    }

    pub fn into_version(self) -> Version {
        Version::Paired(self)
    }
}

impl fmt::Display for PairedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.version.fmt(f)
    }
}

impl Version {
    pub fn revision(hash: impl Into<String>) -> Self {
        Version::Revision(Revision::new(hash))
    }

    pub fn branch(name: impl Into<String>) -> Self {
        Version::Unpaired(UnpairedVersion::branch(name))
    }

    /// A tag, classified as semver or plain
    pub fn tag(name: &str) -> Self {
        Version::Unpaired(UnpairedVersion::tag(name))
    }

    pub fn kind(&self) -> VersionKind {
        match self {
            Version::Revision(_) => VersionKind::Revision,
            Version::Unpaired(v) => v.kind(),
            Version::Paired(p) => p.version.kind(),
        }
    }

    /// The revision this version is known to point at, if any
    pub fn bound_revision(&self) -> Option<&Revision> {
        match self {
            Version::Revision(r) => Some(r),
            Version::Unpaired(_) => None,
            Version::Paired(p) => Some(&p.revision),
        }
    }

    /// The underlying named version, if any
    pub fn unpaired(&self) -> Option<&UnpairedVersion> {
        match self {
            Version::Revision(_) => None,
            Version::Unpaired(v) => Some(v),
            Version::Paired(p) => Some(&p.version),
        }
    }

    /// The semantic version behind this version, paired or not
    pub fn semver(&self) -> Option<&SemverTag> {
        self.unpaired().and_then(UnpairedVersion::semver)
    }

    pub fn is_paired(&self) -> bool {
        matches!(self, Version::Paired(_))
    }

    /// Semantic equality: the same version named in possibly different ways
    pub fn matches(&self, other: &Version) -> bool {
        match (self, other) {
            (Version::Revision(a), Version::Revision(b)) => a == b,
            (Version::Revision(r), Version::Paired(p)) | (Version::Paired(p), Version::Revision(r)) => {
                p.revision == *r
            },
            (Version::Paired(a), Version::Paired(b)) => a.revision == b.revision,
            (Version::Unpaired(u), Version::Paired(p)) | (Version::Paired(p), Version::Unpaired(u)) => {
                u.matches(&p.version)
            },
            (Version::Unpaired(a), Version::Unpaired(b)) => a.matches(b),
            (Version::Revision(_), Version::Unpaired(_))
            | (Version::Unpaired(_), Version::Revision(_)) => false,
        }
    }

    /// Short label for the version kind, used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self.kind() {
            VersionKind::Revision => "revision",
            VersionKind::Plain => "version",
            VersionKind::Branch => "branch",
            VersionKind::Semver => "semver",
        }
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.kind()
            .cmp(&other.kind())
            .then_with(|| match (self.unpaired(), other.unpaired()) {
                (Some(a), Some(b)) => a.cmp(b),
                _ => Ordering::Equal,
            })
            .then_with(|| self.is_paired().cmp(&other.is_paired()))
            .then_with(|| self.bound_revision().cmp(&other.bound_revision()))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Revision(r) => r.fmt(f),
            Version::Unpaired(v) => v.fmt(f),
            Version::Paired(p) => p.fmt(f),
        }
    }
}

impl From<PairedVersion> for Version {
    fn from(p: PairedVersion) -> Self {
        Version::Paired(p)
    }
}

impl From<UnpairedVersion> for Version {
    fn from(v: UnpairedVersion) -> Self {
        Version::Unpaired(v)
    }
}

impl From<Revision> for Version {
    fn from(r: Revision) -> Self {
        Version::Revision(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REV_A: &str = "ff2948a2ac8f538c4ecd55962e919d1e13e74baf";
    const REV_B: &str = "c575196502940c07bf89fd6d95e83b999162e051";

    #[test]
    fn test_semver_tag_parsing() {
        let tag = SemverTag::parse("v1.2.3").unwrap();
        assert_eq!(tag.original(), "v1.2.3");
        assert_eq!(tag.version(), &semver::Version::new(1, 2, 3));

        let short = SemverTag::parse("v1.4").unwrap();
        assert_eq!(short.version(), &semver::Version::new(1, 4, 0));

        let pre = SemverTag::parse("2.0.0-beta.1").unwrap();
        assert!(pre.is_prerelease());

        assert!(SemverTag::parse("master").is_err());
        assert!(SemverTag::parse("").is_err());
    }

    #[test]
    fn test_semver_accessor() {
        let paired = Version::Paired(UnpairedVersion::tag("v1.2.0").pair(Revision::new(REV_A)));
        assert_eq!(paired.semver().map(SemverTag::original), Some("v1.2.0"));
        assert_eq!(Version::tag("v2").semver().map(|t| t.version().major), Some(2));
        assert!(Version::tag("release-2017").semver().is_none());
        assert!(Version::revision(REV_B).semver().is_none());
    }

    #[test]
    fn test_tag_classification() {
        assert_eq!(UnpairedVersion::tag("v1.0.0").kind(), VersionKind::Semver);
        assert_eq!(UnpairedVersion::tag("release-2017").kind(), VersionKind::Plain);
    }

    #[test]
    fn test_display_uses_underlying_name() {
        let paired = UnpairedVersion::tag("v1.0.0").pair(Revision::new(REV_A));
        assert_eq!(paired.to_string(), "v1.0.0");
        assert_eq!(Version::from(paired).to_string(), "v1.0.0");
        assert_eq!(Version::revision(REV_A).to_string(), REV_A);
        assert_eq!(Version::branch("master").to_string(), "master");
    }

    #[test]
    fn test_paired_versions_match_by_revision() {
        let v1 = Version::from(UnpairedVersion::tag("v1.0.0").pair(Revision::new(REV_A)));
        let v08 = Version::from(UnpairedVersion::tag("v0.8.0").pair(Revision::new(REV_A)));
        let other = Version::from(UnpairedVersion::tag("v1.0.0").pair(Revision::new(REV_B)));

        assert!(v1.matches(&v08));
        assert!(!v1.matches(&other));
        assert!(v1.matches(&Version::revision(REV_A)));
        assert!(Version::revision(REV_A).matches(&v1));
    }

    #[test]
    fn test_unpaired_matches_paired_by_underlying() {
        let paired = Version::from(UnpairedVersion::tag("v1.0.0").pair(Revision::new(REV_A)));
        assert!(Version::tag("1.0.0").matches(&paired));
        assert!(!Version::tag("v1.1.0").matches(&paired));
        assert!(!Version::branch("v1.0.0").matches(&paired));
    }

    #[test]
    fn test_revision_never_matches_unpaired() {
        assert!(!Version::revision(REV_A).matches(&Version::branch("master")));
        assert!(!Version::branch("master").matches(&Version::revision(REV_A)));
    }

    #[test]
    fn test_branch_equality_ignores_default_flag() {
        assert_eq!(Branch::new("master"), Branch::default_branch("master"));
        assert_ne!(Branch::new("master"), Branch::new("develop"));
    }

    #[test]
    fn test_cross_kind_ordering() {
        let mut versions = vec![
            Version::tag("v1.0.0"),
            Version::branch("master"),
            Version::revision(REV_A),
            Version::tag("weekly"),
            Version::tag("v0.8.0"),
        ];
        versions.sort();

        let names: Vec<String> = versions.iter().map(|v| v.to_string()).collect();
        assert_eq!(names, vec![REV_A, "weekly", "master", "v0.8.0", "v1.0.0"]);
    }

    #[test]
    fn test_paired_orders_after_unpaired_twin() {
        let unpaired = Version::tag("v1.0.0");
        let paired = Version::from(UnpairedVersion::tag("v1.0.0").pair(Revision::new(REV_A)));
        assert!(unpaired < paired);
        assert_ne!(unpaired, paired);
        assert!(unpaired.matches(&paired));
    }

    #[test]
    fn test_prerelease_precedence() {
        let pre = SemverTag::parse("v2.0.0-alpha").unwrap();
        let rel = SemverTag::parse("v2.0.0").unwrap();
        assert_eq!(pre.cmp_precedence(&rel), Ordering::Less);
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_version() -> impl Strategy<Value = Version> {
        prop_oneof![
            "[0-9a-f]{8}".prop_map(Version::revision),
            "[a-z]{3,6}".prop_map(Version::branch),
            (0u64..5, 0u64..5, 0u64..5)
                .prop_map(|(a, b, c)| Version::tag(&format!("v{}.{}.{}", a, b, c))),
            ((0u64..5, 0u64..5), "[0-9a-f]{8}").prop_map(|((a, b), rev)| {
                UnpairedVersion::tag(&format!("{}.{}.0", a, b))
                    .pair(Revision::new(rev))
                    .into()
            }),
        ]
    }

    proptest! {
        #[test]
        fn version_ordering_is_total_and_consistent(a in arb_version(), b in arb_version()) {
            let ab = a.cmp(&b);
            prop_assert_eq!(ab, b.cmp(&a).reverse());
            prop_assert_eq!(ab == Ordering::Equal, a == b);
        }

        #[test]
        fn version_ordering_transitivity(a in arb_version(), b in arb_version(), c in arb_version()) {
            if a < b && b < c {
                prop_assert!(a < c, "Transitivity violated: {} < {} < {}", a, b, c);
            }
        }

        #[test]
        fn matches_is_symmetric(a in arb_version(), b in arb_version()) {
            prop_assert_eq!(a.matches(&b), b.matches(&a));
        }
    }
}
