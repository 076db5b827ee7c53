//! Source manager access for tether
//!
//! This crate defines the interface to upstream version control metadata and
//! the run-scoped machinery around it: a session that releases the manager
//! exactly once, a cancellation token, a memoizing cache with concurrent
//! prefetch, and an in-memory manager for tests and benchmarks.

pub mod cache;
pub mod manager;
pub mod memory;
pub mod session;

// Re-export main types
pub use cache::{CacheStats, SourceCache};
pub use manager::{PackageTree, SourceError, SourceManager, SourceResult};
pub use memory::{FixtureVersion, InMemorySourceManager, QueryCounts};
pub use session::{CancelToken, SourceSession};
