//! Scoped access to a source manager for one resolution run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, trace};

use tether_core::error::{TetherError, TetherResult};
use tether_core::types::{Manifest, PairedVersion, ProjectIdentifier, ProjectRoot, Revision, Version};

use crate::cache::{CacheStats, SourceCache};
use crate::manager::{PackageTree, SourceManager};

/// Cooperative cancellation flag shared between a run and its caller
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; the run stops at its next check
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Fail with [`TetherError::Cancelled`] once cancellation was requested
    pub fn check(&self) -> TetherResult<()> {
        if self.is_cancelled() {
            Err(TetherError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// A source manager handle plus the run-scoped cache and cancellation token.
///
/// [`SourceManager::release`] is called exactly once: explicitly through
/// [`SourceSession::release`] or when the session is dropped, whichever
/// comes first. Dropping covers early returns, errors and unwinding.
pub struct SourceSession {
    manager: Arc<dyn SourceManager>,
    cache: SourceCache,
    cancel: CancelToken,
    released: AtomicBool,
}

impl SourceSession {
    pub fn new(manager: Arc<dyn SourceManager>) -> Self {
        Self::with_cancel(manager, CancelToken::new())
    }

    pub fn with_cancel(manager: Arc<dyn SourceManager>, cancel: CancelToken) -> Self {
        Self {
            manager,
            cache: SourceCache::new(),
            cancel,
            released: AtomicBool::new(false),
        }
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Fail if the run was cancelled
    pub fn check_cancelled(&self) -> TetherResult<()> {
        self.cancel.check()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn list_versions(&self, id: &ProjectIdentifier) -> TetherResult<Arc<Vec<PairedVersion>>> {
        self.cancel.check()?;
        self.cache
            .versions(id, || {
                trace!(project = %id, "Listing versions");
                self.manager.list_versions(id)
            })
            .map_err(Into::into)
    }

    pub fn revision_present_in(&self, id: &ProjectIdentifier, revision: &Revision) -> TetherResult<bool> {
        self.cancel.check()?;
        self.cache
            .revision_present(id, revision, || self.manager.revision_present_in(id, revision))
            .map_err(Into::into)
    }

    pub fn deduce_project_root(&self, import_path: &str) -> TetherResult<ProjectRoot> {
        self.cancel.check()?;
        self.cache
            .project_root(import_path, || self.manager.deduce_project_root(import_path))
            .map_err(Into::into)
    }

    pub fn manifest_for(&self, id: &ProjectIdentifier, version: &Version) -> TetherResult<Arc<Manifest>> {
        self.cancel.check()?;
        self.cache
            .manifest(id, version, || self.manager.manifest_for(id, version))
            .map_err(Into::into)
    }

    pub fn list_packages(&self, id: &ProjectIdentifier, version: &Version) -> TetherResult<Arc<PackageTree>> {
        self.cancel.check()?;
        self.cache
            .package_tree(id, version, || self.manager.list_packages(id, version))
            .map_err(Into::into)
    }

    /// Fetch version lists for several projects concurrently.
    ///
    /// Results, including failures, land in the cache; later
    /// [`SourceSession::list_versions`] calls report them.
    pub fn prefetch_versions(&self, ids: &[ProjectIdentifier]) {
        let pending: Vec<&ProjectIdentifier> =
            ids.iter().filter(|id| !self.cache.has_versions(id)).collect();
        if pending.len() < 2 || self.cancel.is_cancelled() {
            return;
        }

        debug!(projects = pending.len(), "Prefetching version lists");
        pending.par_iter().for_each(|id| {
            let _ = self.list_versions(id);
        });
    }

    /// Release the source manager. Later calls, including the one made on
    /// drop, do nothing.
    pub fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            debug!("Releasing source manager");
            self.manager.release();
        }
    }
}

impl Drop for SourceSession {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for SourceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceSession")
            .field("cache", &self.cache.stats())
            .field("cancelled", &self.cancel.is_cancelled())
            .field("released", &self.released.load(Ordering::SeqCst))
            .finish()
    }
}
