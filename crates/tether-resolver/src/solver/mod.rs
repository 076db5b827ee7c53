//! Backjumping dependency solver
//!
//! The solver keeps an explicit stack of decision frames, one per selected
//! project. Each frame holds the project's identifier, the version chosen
//! for it, the candidates still to try and the set of earlier frames that
//! caused its candidates to fail. Requirements (who needs which packages of
//! which project, under which constraint) are kept in a flat list and are
//! attributed to the frame whose selection introduced them, so popping a
//! frame drops exactly what it added.
//!
//! When a frame runs out of candidates the solver jumps straight back to the
//! most recent frame that took part in the conflict instead of the previous
//! one, carrying the remaining culprits along. Candidate failures are
//! memoized as nogoods so that the same failure is never evaluated twice.

mod memo;
#[cfg(test)]
mod tests;

pub use memo::FailureMemo;

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use tether_core::error::{ConflictDetail, TetherError, UnsolvableError};
use tether_core::types::{
    Constraint, Lock, LockedProject, Manifest, ProjectIdentifier, ProjectRoot, SolveMeta, Version,
};
use tether_core::utils::hash::inputs_digest;
use tether_core::utils::path::{is_std_lib, join_package, relative_package};
use tether_source::{CancelToken, PackageTree, SourceManager, SourceSession};

use crate::graph::SolutionGraph;
use crate::selection::sort_for_upgrade;
use crate::ResolverResult;

/// Name recorded in the solve metadata of produced locks
pub const SOLVER_NAME: &str = "tether-backjump";
/// Version recorded in the solve metadata of produced locks
pub const SOLVER_VERSION: u32 = 1;

/// Solver configuration
#[derive(Debug, Clone)]
pub struct SolverOptions {
    /// Projects whose locked version should not be preferred
    pub to_change: BTreeSet<ProjectRoot>,
    /// Ignore the input lock entirely
    pub change_all: bool,
    /// Fetch version lists of all open projects concurrently before each
    /// selection
    pub prefetch: bool,
    /// Record a human-readable trace in [`Solution::trace`]
    pub trace: bool,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            to_change: BTreeSet::new(),
            change_all: false,
            prefetch: true,
            trace: false,
        }
    }
}

/// Inputs of one solve
#[derive(Debug, Clone)]
pub struct SolveParameters {
    /// Root of the project being solved
    pub root: ProjectRoot,
    pub manifest: Manifest,
    /// Packages of the project being solved and their imports
    pub packages: PackageTree,
    /// Previous solution, used as a preference
    pub lock: Option<Lock>,
}

impl SolveParameters {
    pub fn new(root: impl Into<ProjectRoot>, manifest: Manifest) -> Self {
        let root = root.into();
        let mut packages = PackageTree::new();
        packages.insert(root.as_str(), Vec::<String>::new());
        Self {
            root,
            manifest,
            packages,
            lock: None,
        }
    }

    /// Add imports to the root package
    pub fn with_imports<I, S>(mut self, imports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.packages.insert(self.root.as_str(), imports);
        self
    }

    /// Add a package, relative to the root, with its imports
    pub fn with_package(mut self, relative: &str, imports: &[&str]) -> Self {
        let path = join_package(self.root.as_str(), relative);
        self.packages.insert(path, imports.iter().copied());
        self
    }

    pub fn with_lock(mut self, lock: Lock) -> Self {
        self.lock = Some(lock);
        self
    }
}

/// Result of a successful solve
#[derive(Debug)]
pub struct Solution {
    pub lock: Lock,
    pub graph: SolutionGraph,
    /// Candidate versions considered
    pub attempts: usize,
    /// Backjumps taken
    pub backtracks: usize,
    /// Solver transitions, when tracing was requested
    pub trace: Vec<String>,
}

/// Dependency solver over a source manager
pub struct Solver {
    manager: Arc<dyn SourceManager>,
    options: SolverOptions,
    cancel: CancelToken,
}

impl Solver {
    pub fn new(manager: Arc<dyn SourceManager>) -> Self {
        Self {
            manager,
            options: SolverOptions::default(),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_options(mut self, options: SolverOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    /// Token that cancels running and future solves of this solver
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Solve for a complete, consistent lock.
    ///
    /// Opens a source session for the run; the source manager is released
    /// when the run ends, however it ends.
    pub fn solve(&self, params: &SolveParameters) -> ResolverResult<Solution> {
        let session = SourceSession::with_cancel(self.manager.clone(), self.cancel.clone());
        let result = Search::new(&session, params, &self.options).run();
        session.release();
        result
    }
}

/// A need for some packages of a project
#[derive(Debug, Clone)]
struct Requirement {
    /// Frame whose selection introduced this requirement, `None` for the
    /// root. Popping that frame removes the requirement.
    owner: Option<usize>,
    /// Frame of the project that declares the dependency, `None` for the root
    depender: Option<usize>,
    ident: ProjectIdentifier,
    constraint: Constraint,
    /// Full import paths
    packages: BTreeSet<String>,
    /// Packages a project needs from itself through internal imports
    internal: bool,
}

impl Requirement {
    fn culprits(&self) -> impl Iterator<Item = usize> {
        self.owner.into_iter().chain(self.depender)
    }
}

#[derive(Debug)]
struct Frame {
    ident: ProjectIdentifier,
    /// `None` while candidates are being tried
    version: Option<Version>,
    candidates: VecDeque<Version>,
    /// Earlier frames implicated in this frame's failures
    conflicts: BTreeSet<usize>,
    failures: Vec<ConflictDetail>,
}

/// Why a candidate could not be used
#[derive(Debug)]
struct Failure {
    culprits: BTreeSet<usize>,
    detail: ConflictDetail,
}

/// The candidate currently being tried
struct Trying<'v> {
    index: usize,
    version: &'v Version,
}

enum Selection {
    /// Nothing left to select
    Complete,
    Push(Frame),
    Conflict {
        project: ProjectRoot,
        culprits: BTreeSet<usize>,
        details: Vec<ConflictDetail>,
    },
}

struct Search<'a> {
    session: &'a SourceSession,
    params: &'a SolveParameters,
    options: &'a SolverOptions,
    frames: Vec<Frame>,
    requirements: Vec<Requirement>,
    memo: FailureMemo,
    attempts: usize,
    backtracks: usize,
    trace: Vec<String>,
}

impl<'a> Search<'a> {
    fn new(session: &'a SourceSession, params: &'a SolveParameters, options: &'a SolverOptions) -> Self {
        Self {
            session,
            params,
            options,
            frames: Vec::new(),
            requirements: Vec::new(),
            memo: FailureMemo::new(),
            attempts: 0,
            backtracks: 0,
            trace: Vec::new(),
        }
    }

    fn run(mut self) -> ResolverResult<Solution> {
        info!(project = %self.params.root, "Solving dependencies");
        let root_imports = self.root_imports();
        self.requirements = self.root_requirements(&root_imports)?;

        loop {
            self.session.check_cancelled()?;

            let open = self.open_projects();
            if self.options.prefetch {
                let idents: Vec<ProjectIdentifier> = open
                    .values()
                    .filter_map(|reqs| reqs.first())
                    .map(|&i| self.requirements[i].ident.clone())
                    .collect();
                self.session.prefetch_versions(&idents);
            }

            match self.select(&open)? {
                Selection::Complete => return self.complete(&root_imports),
                Selection::Push(frame) => {
                    debug!(
                        project = %frame.ident.root,
                        candidates = frame.candidates.len(),
                        depth = self.frames.len(),
                        "Selecting project"
                    );
                    self.note(format!(
                        "select {} ({} candidates)",
                        frame.ident.root,
                        frame.candidates.len()
                    ));
                    self.frames.push(frame);
                },
                Selection::Conflict {
                    project,
                    culprits,
                    details,
                } => {
                    let from = self.frames.len();
                    self.backjump(&project, from, culprits, details)?;
                },
            }

            self.advance()?;
        }
    }

    /// Try candidates on the top frame until one is accepted, backjumping
    /// whenever a frame runs out
    fn advance(&mut self) -> ResolverResult<()> {
        loop {
            self.session.check_cancelled()?;
            let index = self.frames.len() - 1;
            if self.try_next(index)? {
                return Ok(());
            }

            let project = self.frames[index].ident.root.clone();
            let (culprits, details) = self.exhaustion_conflict(index);
            debug!(project = %project, "Candidates exhausted");
            self.backjump(&project, index, culprits, details)?;
        }
    }

    fn try_next(&mut self, index: usize) -> ResolverResult<bool> {
        while let Some(candidate) = self.frames[index].candidates.pop_front() {
            self.attempts += 1;
            let root = self.frames[index].ident.root.clone();
            let packages = self.packages_of(&root, &[]);

            let frames = &self.frames;
            let pruned = self.memo.find(&root, &candidate, &packages, |r| {
                frames
                    .iter()
                    .find(|f| f.ident.root == *r)
                    .and_then(|f| f.version.as_ref())
            });
            if let Some(roots) = pruned {
                trace!(project = %root, version = %candidate, "Pruned by recorded failure");
                let culprits: Vec<usize> = roots.iter().filter_map(|r| self.frame_index(r)).collect();
                self.frames[index]
                    .conflicts
                    .extend(culprits.into_iter().filter(|&i| i < index));
                continue;
            }

            match self.try_version(index, &candidate)? {
                Ok(added) => {
                    debug!(project = %root, version = %candidate, "Selected version");
                    self.note(format!("accept {}@{}", root, candidate));
                    self.frames[index].version = Some(candidate);
                    self.requirements.extend(added);
                    return Ok(true);
                },
                Err(failure) => {
                    trace!(
                        project = %root,
                        version = %candidate,
                        reason = %failure.detail.reason,
                        "Candidate rejected"
                    );
                    self.note(format!("reject {}@{}: {}", root, candidate, failure.detail.reason));

                    let assignment: BTreeMap<ProjectRoot, Version> = failure
                        .culprits
                        .iter()
                        .filter(|&&i| i < index)
                        .filter_map(|&i| {
                            let frame = &self.frames[i];
                            frame.version.clone().map(|v| (frame.ident.root.clone(), v))
                        })
                        .collect();
                    self.memo.record(&root, &candidate, &packages, assignment);

                    let frame = &mut self.frames[index];
                    frame
                        .conflicts
                        .extend(failure.culprits.iter().copied().filter(|&i| i < index));
                    if !frame.failures.contains(&failure.detail) {
                        frame.failures.push(failure.detail);
                    }
                },
            }
        }
        Ok(false)
    }

    /// Pop back to the most recent culprit frame
    fn backjump(
        &mut self,
        project: &ProjectRoot,
        from: usize,
        culprits: BTreeSet<usize>,
        details: Vec<ConflictDetail>,
    ) -> ResolverResult<()> {
        let Some(target) = culprits.iter().copied().filter(|&i| i < from).max() else {
            info!(project = %project, "No solution exists");
            return Err(UnsolvableError {
                project: project.to_string(),
                conflicts: details,
            }
            .into());
        };

        self.backtracks += 1;
        debug!(
            project = %project,
            to = %self.frames[target].ident.root,
            popped = from - target,
            "Backjumping"
        );
        self.note(format!("backjump from {} to {}", project, self.frames[target].ident.root));

        self.frames.truncate(target + 1);
        self.requirements.retain(|r| r.owner.map_or(true, |o| o < target));

        let frame = &mut self.frames[target];
        frame.version = None;
        frame
            .conflicts
            .extend(culprits.into_iter().filter(|&i| i < target));
        for detail in details {
            if !frame.failures.contains(&detail) {
                frame.failures.push(detail);
            }
        }
        Ok(())
    }

    fn exhaustion_conflict(&self, index: usize) -> (BTreeSet<usize>, Vec<ConflictDetail>) {
        let frame = &self.frames[index];
        let mut culprits = frame.conflicts.clone();
        let mut details = frame.failures.clone();
        for req in self.requirements_on(&frame.ident.root, &[]).filter(|r| !r.internal) {
            culprits.extend(req.culprits());
            let detail = ConflictDetail {
                depender: self.depender_label(req, None),
                constraint: req.constraint.to_string(),
                reason: format!("no remaining version of {} is acceptable", frame.ident.root),
            };
            if !details.contains(&detail) {
                details.push(detail);
            }
        }
        (culprits, details)
    }

    // --- Selection ---

    /// Projects that are required but not selected, with the indices of
    /// their requirements
    fn open_projects(&self) -> BTreeMap<ProjectRoot, Vec<usize>> {
        let mut open: BTreeMap<ProjectRoot, Vec<usize>> = BTreeMap::new();
        for (i, req) in self.requirements.iter().enumerate() {
            if self.frame_index(&req.ident.root).is_none() {
                open.entry(req.ident.root.clone()).or_default().push(i);
            }
        }
        open
    }

    /// Pick the open project with the fewest viable candidates
    fn select(&self, open: &BTreeMap<ProjectRoot, Vec<usize>>) -> ResolverResult<Selection> {
        let mut best: Option<(ProjectIdentifier, VecDeque<Version>)> = None;

        for (root, indices) in open {
            let reqs: Vec<&Requirement> = indices.iter().map(|&i| &self.requirements[i]).collect();
            let ident = reqs[0].ident.clone();
            let candidates = self.candidates_for(&ident, &reqs)?;

            if candidates.is_empty() {
                let mut culprits = BTreeSet::new();
                let mut details = Vec::new();
                for req in &reqs {
                    culprits.extend(req.culprits());
                    details.push(ConflictDetail {
                        depender: self.depender_label(req, None),
                        constraint: req.constraint.to_string(),
                        reason: format!("no version of {} satisfies it", root),
                    });
                }
                debug!(project = %root, "No viable versions");
                return Ok(Selection::Conflict {
                    project: root.clone(),
                    culprits,
                    details,
                });
            }

            let better = best
                .as_ref()
                .map_or(true, |(_, current)| candidates.len() < current.len());
            if better {
                best = Some((ident, candidates));
            }
        }

        let Some((ident, candidates)) = best else {
            return Ok(Selection::Complete);
        };
        Ok(Selection::Push(Frame {
            ident,
            version: None,
            candidates,
            conflicts: BTreeSet::new(),
            failures: Vec::new(),
        }))
    }

    /// Viable candidates of a project, most preferred first
    fn candidates_for(&self, ident: &ProjectIdentifier, reqs: &[&Requirement]) -> ResolverResult<VecDeque<Version>> {
        let listed = self.session.list_versions(ident)?;
        let mut ordered = listed.to_vec();
        sort_for_upgrade(&mut ordered);
        let mut candidates: Vec<Version> = ordered.into_iter().map(Version::Paired).collect();

        // Bare revisions named by revision constraints go last
        let mut bare = BTreeSet::new();
        for req in reqs {
            if let Constraint::Revision(rev) = &req.constraint {
                let listed_already = candidates.iter().any(|v| v.bound_revision() == Some(rev));
                if !listed_already && !bare.contains(rev) && self.session.revision_present_in(ident, rev)? {
                    bare.insert(rev.clone());
                }
            }
        }
        candidates.extend(bare.into_iter().map(Version::Revision));

        candidates.retain(|v| reqs.iter().all(|r| r.constraint.admits(v)));

        if let Some(locked) = self.locked_preference(ident, reqs, &candidates)? {
            candidates.retain(|v| *v != locked);
            candidates.insert(0, locked);
        }

        Ok(candidates.into())
    }

    /// The input lock's version for a project, if it may be preferred
    fn locked_preference(
        &self,
        ident: &ProjectIdentifier,
        reqs: &[&Requirement],
        listed: &[Version],
    ) -> ResolverResult<Option<Version>> {
        if self.options.change_all || self.options.to_change.contains(&ident.root) {
            return Ok(None);
        }
        let Some(locked) = self.params.lock.as_ref().and_then(|l| l.find(&ident.root)) else {
            return Ok(None);
        };

        if locked.ident.normalized_source() != ident.normalized_source() {
            warn!(
                project = %ident.root,
                locked = locked.ident.normalized_source(),
                required = ident.normalized_source(),
                "Locked source differs from required source"
            );
            return Ok(None);
        }
        if !reqs.iter().all(|r| r.constraint.admits(&locked.version)) {
            warn!(project = %ident.root, locked = %locked.version, "Locked version no longer satisfies constraints");
            return Ok(None);
        }

        match locked.version.bound_revision() {
            Some(rev) => {
                if self.session.revision_present_in(ident, rev)? {
                    Ok(Some(locked.version.clone()))
                } else {
                    warn!(project = %ident.root, revision = %rev, "Locked revision is gone upstream");
                    Ok(None)
                }
            },
            None => Ok(listed.iter().find(|v| v.matches(&locked.version)).cloned()),
        }
    }

    // --- Trying a candidate ---

    /// Check a candidate against the current selections. On success returns
    /// the requirements its selection introduces.
    fn try_version(&self, index: usize, version: &Version) -> ResolverResult<Result<Vec<Requirement>, Failure>> {
        let ident = self.frames[index].ident.clone();
        let required = self.packages_of(&ident.root, &[]);
        let trying = Trying { index, version };
        let mut pending = Vec::new();

        let outcome = self.expand(&trying, index, &ident, version, &required, &BTreeSet::new(), &mut pending)?;
        Ok(outcome.map(|()| pending))
    }

    /// Bring `seeds` packages of a project (at `version`, declared by frame
    /// `depender`) into the solution, together with everything they import.
    /// `known` packages were brought in before and are not revisited.
    #[allow(clippy::too_many_arguments)]
    fn expand(
        &self,
        trying: &Trying<'_>,
        depender: usize,
        ident: &ProjectIdentifier,
        version: &Version,
        seeds: &BTreeSet<String>,
        known: &BTreeSet<String>,
        pending: &mut Vec<Requirement>,
    ) -> ResolverResult<Result<(), Failure>> {
        let tree = self.session.list_packages(ident, version)?;
        let manifest = self.session.manifest_for(ident, version)?;

        let mut visited = known.clone();
        let mut queue: Vec<String> = seeds.difference(known).cloned().collect();
        let mut external = BTreeSet::new();

        while let Some(package) = queue.pop() {
            if !visited.insert(package.clone()) {
                continue;
            }
            let Some(imports) = tree.imports_of(&package) else {
                let mut culprits: BTreeSet<usize> = self
                    .requirements_on(&ident.root, pending)
                    .filter(|r| r.packages.contains(&package))
                    .flat_map(Requirement::culprits)
                    .collect();
                culprits.insert(depender);
                return Ok(Err(Failure {
                    culprits,
                    detail: ConflictDetail {
                        depender: format!("{}@{}", ident.root, version),
                        constraint: package.clone(),
                        reason: "package does not exist in this version".to_string(),
                    },
                }));
            };
            for import in imports {
                if self.skip_import(import) {
                    continue;
                }
                if ident.root.contains(import) {
                    if !visited.contains(import) {
                        queue.push(import.clone());
                    }
                } else {
                    external.insert(import.clone());
                }
            }
        }

        let added: BTreeSet<String> = visited.difference(known).cloned().collect();
        if !added.is_empty() {
            pending.push(Requirement {
                owner: Some(trying.index),
                depender: Some(depender),
                ident: ident.clone(),
                constraint: Constraint::Any,
                packages: added,
                internal: true,
            });
        }

        let mut by_project: BTreeMap<ProjectRoot, BTreeSet<String>> = BTreeMap::new();
        for import in external {
            let target = self.session.deduce_project_root(&import)?;
            if target == self.params.root || target == ident.root {
                continue;
            }
            by_project.entry(target).or_default().insert(import);
        }

        for (target, packages) in by_project {
            let (dep_ident, constraint) = self.dependency_terms(&target, &manifest);
            let req = Requirement {
                owner: Some(trying.index),
                depender: Some(depender),
                ident: dep_ident,
                constraint,
                packages,
                internal: false,
            };

            let Some((k, selected_ident, selected_version)) = self.selected(&target, trying) else {
                // Not selected yet: only the source must agree with other
                // requirements on it
                if let Some(other) = self
                    .requirements_on(&target, pending)
                    .find(|r| r.ident.normalized_source() != req.ident.normalized_source())
                {
                    let culprits = other.culprits().chain(req.culprits()).collect();
                    return Ok(Err(Failure {
                        culprits,
                        detail: ConflictDetail {
                            depender: format!("{}@{}", ident.root, version),
                            constraint: format!("{} from {}", target, req.ident.normalized_source()),
                            reason: format!(
                                "{} requires it from {}",
                                self.depender_label(other, Some(trying)),
                                other.ident.normalized_source()
                            ),
                        },
                    }));
                }
                pending.push(req);
                continue;
            };

            let mut culprits: BTreeSet<usize> = req.culprits().collect();
            culprits.insert(k);

            if selected_ident.normalized_source() != req.ident.normalized_source() {
                return Ok(Err(Failure {
                    culprits,
                    detail: ConflictDetail {
                        depender: format!("{}@{}", ident.root, version),
                        constraint: format!("{} from {}", target, req.ident.normalized_source()),
                        reason: format!("{} was selected from {}", target, selected_ident.normalized_source()),
                    },
                }));
            }
            if !req.constraint.admits(&selected_version) {
                let conflict = TetherError::ConstraintConflict {
                    project: target.to_string(),
                    depender: format!("{}@{}", ident.root, version),
                    constraint: req.constraint.to_string(),
                    selected: selected_version.to_string(),
                };
                return Ok(Err(Failure {
                    culprits,
                    detail: ConflictDetail {
                        depender: format!("{}@{}", ident.root, version),
                        constraint: format!("{} {}", target, req.constraint),
                        reason: conflict.to_string(),
                    },
                }));
            }

            let current = self.packages_of(&target, pending);
            let new_packages: BTreeSet<String> = req.packages.difference(&current).cloned().collect();
            pending.push(req);
            if !new_packages.is_empty() {
                if let Err(mut failure) =
                    self.expand(trying, k, &selected_ident, &selected_version, &new_packages, &current, pending)?
                {
                    failure.culprits.extend(culprits);
                    return Ok(Err(failure));
                }
            }
        }

        Ok(Ok(()))
    }

    /// Identifier and constraint a dependency is required under: the root
    /// override when one exists, otherwise what the depender's manifest says
    fn dependency_terms(&self, target: &ProjectRoot, manifest: &Manifest) -> (ProjectIdentifier, Constraint) {
        if let Some(props) = self.params.manifest.override_for(target) {
            return (
                ProjectIdentifier {
                    root: target.clone(),
                    source: props.source.clone(),
                },
                props.constraint.clone(),
            );
        }
        match manifest.constraint_for(target) {
            Some(props) => (
                ProjectIdentifier {
                    root: target.clone(),
                    source: props.source.clone(),
                },
                props.constraint.clone(),
            ),
            None => (ProjectIdentifier::new(target.clone()), Constraint::Any),
        }
    }

    /// Frame index, identifier and version of a project that is selected or
    /// being tried
    fn selected(&self, root: &ProjectRoot, trying: &Trying<'_>) -> Option<(usize, ProjectIdentifier, Version)> {
        let index = self.frame_index(root)?;
        let frame = &self.frames[index];
        let version = if index == trying.index {
            trying.version.clone()
        } else {
            frame.version.clone()?
        };
        Some((index, frame.ident.clone(), version))
    }

    // --- Root and bookkeeping ---

    fn skip_import(&self, import: &str) -> bool {
        is_std_lib(import) || self.params.manifest.is_ignored(import) || self.params.root.contains(import)
    }

    /// External imports of the project being solved
    fn root_imports(&self) -> BTreeSet<String> {
        let mut imports = BTreeSet::new();
        for (package, package_imports) in &self.params.packages.packages {
            if self.params.manifest.is_ignored(package) {
                continue;
            }
            imports.extend(package_imports.iter().filter(|i| !self.skip_import(i)).cloned());
        }
        imports
    }

    fn root_requirements(&self, imports: &BTreeSet<String>) -> ResolverResult<Vec<Requirement>> {
        let mut by_project: BTreeMap<ProjectRoot, BTreeSet<String>> = BTreeMap::new();
        for import in imports {
            let target = self.session.deduce_project_root(import)?;
            by_project.entry(target).or_default().insert(import.clone());
        }

        Ok(by_project
            .into_iter()
            .map(|(target, packages)| {
                let (ident, constraint) = self.dependency_terms(&target, &self.params.manifest);
                Requirement {
                    owner: None,
                    depender: None,
                    ident,
                    constraint,
                    packages,
                    internal: false,
                }
            })
            .collect())
    }

    fn frame_index(&self, root: &ProjectRoot) -> Option<usize> {
        self.frames.iter().position(|f| f.ident.root == *root)
    }

    fn requirements_on<'r>(
        &'r self,
        root: &'r ProjectRoot,
        pending: &'r [Requirement],
    ) -> impl Iterator<Item = &'r Requirement> + 'r {
        self.requirements
            .iter()
            .chain(pending.iter())
            .filter(move |r| r.ident.root == *root)
    }

    /// Packages of a project required so far
    fn packages_of(&self, root: &ProjectRoot, pending: &[Requirement]) -> BTreeSet<String> {
        self.requirements_on(root, pending)
            .flat_map(|r| r.packages.iter().cloned())
            .collect()
    }

    fn depender_label(&self, req: &Requirement, trying: Option<&Trying<'_>>) -> String {
        match req.depender {
            None => self.params.root.to_string(),
            Some(i) => {
                let frame = &self.frames[i];
                let version = match trying {
                    Some(t) if t.index == i => Some(t.version.clone()),
                    _ => frame.version.clone(),
                };
                match version {
                    Some(v) => format!("{}@{}", frame.ident.root, v),
                    None => frame.ident.root.to_string(),
                }
            },
        }
    }

    fn note(&mut self, line: String) {
        if self.options.trace {
            self.trace.push(line);
        }
    }

    fn complete(self, root_imports: &BTreeSet<String>) -> ResolverResult<Solution> {
        let mut graph = SolutionGraph::new(self.params.root.clone());
        let mut projects = Vec::with_capacity(self.frames.len());

        for frame in &self.frames {
            let version = frame.version.clone().ok_or_else(|| TetherError::LockValidation {
                project: frame.ident.root.to_string(),
                reason: "project has no selected version".to_string(),
            })?;
            let packages: BTreeSet<String> = self
                .packages_of(&frame.ident.root, &[])
                .iter()
                .filter_map(|p| relative_package(frame.ident.root.as_str(), p))
                .collect();
            graph.add_project(frame.ident.root.clone(), version.clone());
            projects.push(LockedProject {
                ident: frame.ident.clone(),
                version,
                packages,
            });
        }

        for req in self.requirements.iter().filter(|r| !r.internal) {
            let from = match req.depender {
                None => self.params.root.clone(),
                Some(i) => self.frames[i].ident.root.clone(),
            };
            if let Err(e) = graph.add_dependency(&from, &req.ident.root, req.constraint.clone()) {
                warn!(error = %e, "Dropping dependency edge");
            }
        }

        let lock = Lock::from_projects(projects)?.with_solve_meta(SolveMeta {
            inputs_digest: inputs_digest(&self.params.manifest, root_imports),
            solver_name: SOLVER_NAME.to_string(),
            solver_version: SOLVER_VERSION,
        });

        info!(
            projects = lock.len(),
            attempts = self.attempts,
            backtracks = self.backtracks,
            pruned = self.memo.pruned(),
            "Solve complete"
        );

        Ok(Solution {
            lock,
            graph,
            attempts: self.attempts,
            backtracks: self.backtracks,
            trace: self.trace,
        })
    }
}
