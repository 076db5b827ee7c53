//! Candidate ordering and version selection
//!
//! Two preference orders are defined over named versions:
//! - upgrade order, used by the solver: semver descending with releases
//!   before prereleases, then the default branch, other branches and plain
//!   tags;
//! - downgrade order, used when choosing a name for a locked revision:
//!   semver ascending with releases before prereleases, then the same
//!   non-semver tail.

use std::cmp::Ordering;

use tether_core::types::{Constraint, PairedVersion, UnpairedVersion, Version};

/// Rank of the non-semver kinds, shared by both orders
fn tail_rank(version: &UnpairedVersion) -> u8 {
    match version {
        UnpairedVersion::Semver(tag) if !tag.is_prerelease() => 0,
        UnpairedVersion::Semver(_) => 1,
        UnpairedVersion::Branch(b) if b.is_default => 2,
        UnpairedVersion::Branch(_) => 3,
        UnpairedVersion::Plain(_) => 4,
    }
}

fn cmp_with(a: &UnpairedVersion, b: &UnpairedVersion, semver_descending: bool) -> Ordering {
    tail_rank(a).cmp(&tail_rank(b)).then_with(|| match (a, b) {
        (UnpairedVersion::Semver(x), UnpairedVersion::Semver(y)) => {
            let ord = x.cmp_precedence(y);
            let ord = if semver_descending { ord.reverse() } else { ord };
            ord.then_with(|| x.original().cmp(y.original()))
        },
        _ => a.name().cmp(b.name()),
    })
}

/// Upgrade preference: most preferred first
pub fn upgrade_cmp(a: &UnpairedVersion, b: &UnpairedVersion) -> Ordering {
    cmp_with(a, b, true)
}

/// Downgrade preference: most preferred first
pub fn downgrade_cmp(a: &UnpairedVersion, b: &UnpairedVersion) -> Ordering {
    cmp_with(a, b, false)
}

/// Sort paired versions for upgrade; equal names fall back to revision
pub fn sort_for_upgrade(versions: &mut [PairedVersion]) {
    versions.sort_by(|a, b| {
        upgrade_cmp(a.unpaired(), b.unpaired()).then_with(|| a.revision().cmp(b.revision()))
    });
}

/// Sort paired versions for downgrade; equal names fall back to revision
pub fn sort_for_downgrade(versions: &mut [PairedVersion]) {
    versions.sort_by(|a, b| {
        downgrade_cmp(a.unpaired(), b.unpaired()).then_with(|| a.revision().cmp(b.revision()))
    });
}

/// Version selector over the versions of one project
#[derive(Debug, Clone)]
pub struct VersionSelector {
    /// Available versions in upgrade order
    available_versions: Vec<PairedVersion>,
}

impl VersionSelector {
    /// Create new version selector with available versions
    pub fn new(mut versions: Vec<PairedVersion>) -> Self {
        sort_for_upgrade(&mut versions);
        Self {
            available_versions: versions,
        }
    }

    /// Most preferred version admitted by every constraint
    pub fn select_best(&self, constraints: &[Constraint]) -> Option<&PairedVersion> {
        self.available_versions
            .iter()
            .find(|v| admitted(v, constraints))
    }

    /// Least preferred-for-upgrade version admitted by every constraint,
    /// by downgrade order
    pub fn select_lowest(&self, constraints: &[Constraint]) -> Option<&PairedVersion> {
        self.available_versions
            .iter()
            .filter(|v| admitted(v, constraints))
            .min_by(|a, b| {
                downgrade_cmp(a.unpaired(), b.unpaired()).then_with(|| a.revision().cmp(b.revision()))
            })
    }

    /// All admitted versions, in upgrade order
    pub fn find_matching(&self, constraints: &[Constraint]) -> Vec<PairedVersion> {
        self.available_versions
            .iter()
            .filter(|v| admitted(v, constraints))
            .cloned()
            .collect()
    }

    /// Check if any version satisfies the constraints
    pub fn has_matching(&self, constraints: &[Constraint]) -> bool {
        self.available_versions.iter().any(|v| admitted(v, constraints))
    }

    pub fn versions(&self) -> &[PairedVersion] {
        &self.available_versions
    }
}

fn admitted(version: &PairedVersion, constraints: &[Constraint]) -> bool {
    let version = Version::Paired(version.clone());
    constraints.iter().all(|c| c.admits(&version))
}
