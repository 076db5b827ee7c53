//! Failure memo for the solver.
//!
//! A nogood records that trying a version of a project, with a given set of
//! required packages, failed because of the versions chosen for some other
//! projects. Whenever that partial assignment holds again the candidate is
//! pruned without asking the source manager anything.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tether_core::types::{ProjectRoot, Version};
use tether_core::utils::hash::signature;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct NogoodKey {
    project: ProjectRoot,
    version: Version,
    packages: BTreeSet<String>,
}

#[derive(Debug, Clone)]
struct Nogood {
    assignment: BTreeMap<ProjectRoot, Version>,
    signature: String,
}

/// Recorded candidate failures for one run
#[derive(Debug, Default)]
pub struct FailureMemo {
    nogoods: HashMap<NogoodKey, Vec<Nogood>>,
    pruned: usize,
}

impl FailureMemo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `version` of `project` failed under `assignment`
    pub fn record(
        &mut self,
        project: &ProjectRoot,
        version: &Version,
        packages: &BTreeSet<String>,
        assignment: BTreeMap<ProjectRoot, Version>,
    ) {
        let signature = assignment_signature(&assignment);
        let entries = self
            .nogoods
            .entry(NogoodKey {
                project: project.clone(),
                version: version.clone(),
                packages: packages.clone(),
            })
            .or_default();
        if entries.iter().all(|n| n.signature != signature) {
            entries.push(Nogood {
                assignment,
                signature,
            });
        }
    }

    /// Find a recorded failure whose assignment is part of the current one.
    ///
    /// `selected` reports the version currently chosen for a project, if
    /// any. Returns the projects of the matching assignment.
    pub fn find<'v, F>(
        &mut self,
        project: &ProjectRoot,
        version: &Version,
        packages: &BTreeSet<String>,
        selected: F,
    ) -> Option<Vec<ProjectRoot>>
    where
        F: Fn(&ProjectRoot) -> Option<&'v Version>,
    {
        let key = NogoodKey {
            project: project.clone(),
            version: version.clone(),
            packages: packages.clone(),
        };
        let hit = self.nogoods.get(&key)?.iter().find(|nogood| {
            nogood
                .assignment
                .iter()
                .all(|(root, v)| selected(root).map_or(false, |current| current == v))
        })?;
        let roots = hit.assignment.keys().cloned().collect();
        self.pruned += 1;
        Some(roots)
    }

    /// Number of candidates pruned so far
    pub fn pruned(&self) -> usize {
        self.pruned
    }

    pub fn len(&self) -> usize {
        self.nogoods.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.nogoods.is_empty()
    }
}

/// blake3 signature of a partial assignment
fn assignment_signature(assignment: &BTreeMap<ProjectRoot, Version>) -> String {
    let mut fields = Vec::with_capacity(assignment.len() * 3);
    for (root, version) in assignment {
        fields.push(root.to_string());
        fields.push(version.to_string());
        fields.push(version.bound_revision().map(|r| r.to_string()).unwrap_or_default());
    }
    signature(&fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root(s: &str) -> ProjectRoot {
        ProjectRoot::new(s)
    }

    #[test]
    fn test_prunes_when_assignment_holds() {
        let mut memo = FailureMemo::new();
        let pkgs: BTreeSet<String> = ["github.com/a/a".to_string()].into();
        let mut assignment = BTreeMap::new();
        assignment.insert(root("github.com/b/b"), Version::tag("v1.0.0"));
        memo.record(&root("github.com/a/a"), &Version::tag("v2.0.0"), &pkgs, assignment.clone());
        memo.record(&root("github.com/a/a"), &Version::tag("v2.0.0"), &pkgs, assignment);
        assert_eq!(memo.len(), 1);

        let b_v1 = Version::tag("v1.0.0");
        let b_v2 = Version::tag("v2.0.0");

        let hit = memo.find(&root("github.com/a/a"), &Version::tag("v2.0.0"), &pkgs, |r| {
            (r.as_str() == "github.com/b/b").then_some(&b_v1)
        });
        assert_eq!(hit.unwrap(), vec![root("github.com/b/b")]);

        let miss = memo.find(&root("github.com/a/a"), &Version::tag("v2.0.0"), &pkgs, |r| {
            (r.as_str() == "github.com/b/b").then_some(&b_v2)
        });
        assert!(miss.is_none());
        assert_eq!(memo.pruned(), 1);
    }

    #[test]
    fn test_packages_are_part_of_the_key() {
        let mut memo = FailureMemo::new();
        let pkgs: BTreeSet<String> = ["github.com/a/a".to_string()].into();
        let more: BTreeSet<String> = ["github.com/a/a".to_string(), "github.com/a/a/sub".to_string()].into();
        memo.record(&root("github.com/a/a"), &Version::tag("v1.0.0"), &pkgs, BTreeMap::new());

        assert!(memo.find(&root("github.com/a/a"), &Version::tag("v1.0.0"), &more, |_| None).is_none());
        assert!(memo.find(&root("github.com/a/a"), &Version::tag("v1.0.0"), &pkgs, |_| None).is_some());
    }
}
