//! Choosing a version for a project pinned at a revision.
//!
//! Other tools often record only the revision a dependency is pinned at.
//! To give the lock a readable name, the revision is matched against the
//! versions the source knows about; the revision itself is the fallback.

use tracing::debug;

use tether_core::types::{Constraint, PairedVersion, ProjectIdentifier, Revision, UnpairedVersion, Version};
use tether_resolver::selection::downgrade_cmp;
use tether_source::SourceSession;

use crate::ConfigResult;

/// Find the version to lock for `ident` pinned at `revision`.
///
/// Versions at the pinned revision are preferred, the lowest one admitted by
/// `constraint` when several are. Without a match a branch constraint names
/// the branch itself, and otherwise the bare revision is locked. Failing to
/// list versions is an error.
pub fn lookup_version_for_locked_project(
    session: &SourceSession,
    ident: &ProjectIdentifier,
    constraint: Option<&Constraint>,
    revision: &Revision,
) -> ConfigResult<Version> {
    let versions = session.list_versions(ident)?;
    let candidates: Vec<&PairedVersion> = versions.iter().filter(|v| v.revision() == revision).collect();

    let chosen = match candidates.as_slice() {
        [] => None,
        [only] => Some(*only),
        many => pick_among(many, constraint),
    };

    if let Some(version) = chosen {
        debug!(project = %ident.root, revision = %revision, version = %version, "Matched revision to version");
        return Ok(Version::Paired(version.clone()));
    }

    if let Some(name) = constraint.and_then(Constraint::as_branch) {
        let branch = versions
            .iter()
            .filter_map(|v| v.unpaired().as_branch())
            .find(|b| b.name == name);
        if let Some(branch) = branch {
            debug!(project = %ident.root, branch = %name, "Falling back to branch constraint");
            return Ok(Version::Unpaired(UnpairedVersion::Branch(branch.clone())));
        }
    }

    debug!(project = %ident.root, revision = %revision, "Falling back to revision");
    Ok(Version::Revision(revision.clone()))
}

/// Several versions share the revision
fn pick_among<'a>(candidates: &[&'a PairedVersion], constraint: Option<&Constraint>) -> Option<&'a PairedVersion> {
    if let Some(constraint) = constraint {
        let lowest = candidates
            .iter()
            .copied()
            .filter(|v| constraint.admits(&Version::Paired((*v).clone())))
            .min_by(|a, b| downgrade_cmp(a.unpaired(), b.unpaired()));
        if lowest.is_some() {
            return lowest;
        }

        if let Some(name) = constraint.as_branch() {
            let branch = candidates
                .iter()
                .copied()
                .find(|v| v.unpaired().as_branch().map_or(false, |b| b.name == name));
            if branch.is_some() {
                return branch;
            }
        }
    }
    candidates.first().copied()
}
