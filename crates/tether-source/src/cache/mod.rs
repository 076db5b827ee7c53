//! Run-scoped memoization of source manager queries.
//!
//! Every query result, success or failure, is stored for the lifetime of one
//! resolution run, so backtracking never asks the source manager the same
//! question twice. The cache is not shared between runs.

use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use tether_core::types::{Manifest, PairedVersion, ProjectIdentifier, ProjectRoot, Revision, Version};

use crate::manager::{PackageTree, SourceResult};

/// One memoized answer, filled by the first caller that asks
type Slot<V> = Arc<OnceLock<SourceResult<V>>>;

/// Memoized query results for one run
#[derive(Debug, Default)]
pub struct SourceCache {
    versions: DashMap<ProjectIdentifier, Slot<Arc<Vec<PairedVersion>>>>,
    revisions: DashMap<(ProjectIdentifier, Revision), Slot<bool>>,
    roots: DashMap<String, Slot<ProjectRoot>>,
    manifests: DashMap<(ProjectIdentifier, Version), Slot<Arc<Manifest>>>,
    packages: DashMap<(ProjectIdentifier, Version), Slot<Arc<PackageTree>>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl SourceCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    pub fn versions<F>(&self, id: &ProjectIdentifier, fetch: F) -> SourceResult<Arc<Vec<PairedVersion>>>
    where
        F: FnOnce() -> SourceResult<Vec<PairedVersion>>,
    {
        self.memoize(&self.versions, id.clone(), || fetch().map(Arc::new))
    }

    pub fn revision_present<F>(&self, id: &ProjectIdentifier, revision: &Revision, fetch: F) -> SourceResult<bool>
    where
        F: FnOnce() -> SourceResult<bool>,
    {
        self.memoize(&self.revisions, (id.clone(), revision.clone()), fetch)
    }

    pub fn project_root<F>(&self, import_path: &str, fetch: F) -> SourceResult<ProjectRoot>
    where
        F: FnOnce() -> SourceResult<ProjectRoot>,
    {
        self.memoize(&self.roots, import_path.to_string(), fetch)
    }

    pub fn manifest<F>(&self, id: &ProjectIdentifier, version: &Version, fetch: F) -> SourceResult<Arc<Manifest>>
    where
        F: FnOnce() -> SourceResult<Manifest>,
    {
        self.memoize(&self.manifests, (id.clone(), version.clone()), || fetch().map(Arc::new))
    }

    pub fn package_tree<F>(&self, id: &ProjectIdentifier, version: &Version, fetch: F) -> SourceResult<Arc<PackageTree>>
    where
        F: FnOnce() -> SourceResult<PackageTree>,
    {
        self.memoize(&self.packages, (id.clone(), version.clone()), || fetch().map(Arc::new))
    }

    /// Check if a version list is already cached for a project
    pub fn has_versions(&self, id: &ProjectIdentifier) -> bool {
        self.versions.get(id).map_or(false, |slot| slot.get().is_some())
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            total_entries: self.versions.len()
                + self.revisions.len()
                + self.roots.len()
                + self.manifests.len()
                + self.packages.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Clear all cached entries
    pub fn clear(&self) {
        self.versions.clear();
        self.revisions.clear();
        self.roots.clear();
        self.manifests.clear();
        self.packages.clear();
    }

    // The map shard is only locked to find the slot. Callers asking for the
    // same key block on the slot until the first fetch finishes; other keys
    // proceed, and `fetch` may query the cache again.
    fn memoize<K, V, F>(&self, map: &DashMap<K, Slot<V>>, key: K, fetch: F) -> SourceResult<V>
    where
        K: Eq + Hash,
        V: Clone,
        F: FnOnce() -> SourceResult<V>,
    {
        let slot = map.entry(key).or_default().clone();

        let mut fetched = false;
        let result = slot
            .get_or_init(|| {
                fetched = true;
                fetch()
            })
            .clone();

        if fetched {
            self.misses.fetch_add(1, Ordering::Relaxed);
        } else {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        result
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Total number of memoized results
    pub total_entries: usize,
    /// Queries answered from the cache
    pub hits: usize,
    /// Queries forwarded to the source manager
    pub misses: usize,
}
