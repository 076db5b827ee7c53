//! Locating a project on disk and persisting its state

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info};

use tether_core::error::TetherError;
use tether_core::types::{Lock, Manifest};

use crate::lock::{self, LOCK_NAME};
use crate::manifest::{self, MANIFEST_NAME};
use crate::ConfigResult;

/// A project as found on disk
#[derive(Debug, Clone)]
pub struct Project {
    /// Directory holding tether.toml
    pub root_dir: Utf8PathBuf,
    pub manifest: Manifest,
    /// Absent until the first solve
    pub lock: Option<Lock>,
}

/// Main project loading interface
pub struct ProjectLoader {
    /// Directory the search starts from
    start: Utf8PathBuf,
}

impl ProjectLoader {
    pub fn new(start: impl Into<Utf8PathBuf>) -> Self {
        Self { start: start.into() }
    }

    /// Find the nearest directory containing tether.toml (walks up directory tree)
    pub async fn find_root(&self) -> ConfigResult<Utf8PathBuf> {
        let mut current = Some(self.start.as_path());

        while let Some(dir) = current {
            if exists(&dir.join(MANIFEST_NAME)).await? {
                debug!(root = %dir, "Found project root");
                return Ok(dir.to_path_buf());
            }
            current = dir.parent();
        }

        Err(TetherError::ManifestValidation {
            field: MANIFEST_NAME.to_string(),
            reason: format!("No {} found in {} or parent directories", MANIFEST_NAME, self.start),
        })
    }

    /// Load the manifest and, when present, the lock of the enclosing project
    pub async fn load(&self) -> ConfigResult<Project> {
        let root_dir = self.find_root().await?;
        let manifest = manifest::load_from_file(&root_dir.join(MANIFEST_NAME)).await?;

        let lock_path = root_dir.join(LOCK_NAME);
        let lock = if exists(&lock_path).await? {
            Some(lock::load_from_file(&lock_path).await?)
        } else {
            None
        };

        info!(
            root = %root_dir,
            constraints = manifest.constraints.len(),
            locked = lock.as_ref().map_or(0, Lock::len),
            "Loaded project"
        );
        Ok(Project {
            root_dir,
            manifest,
            lock,
        })
    }
}

impl Project {
    /// Replace the lock on disk and in memory
    pub async fn write_lock(&mut self, new_lock: Lock) -> ConfigResult<()> {
        write_lock(&self.root_dir, &new_lock).await?;
        self.lock = Some(new_lock);
        Ok(())
    }
}

/// Write tether.lock into `dir` atomically
pub async fn write_lock(dir: &Utf8Path, lock: &Lock) -> ConfigResult<()> {
    let content = lock::serialize_lock(lock)?;
    write_atomic(&dir.join(LOCK_NAME), &content).await
}

/// Write tether.toml into `dir` atomically
pub async fn write_manifest(dir: &Utf8Path, manifest: &Manifest) -> ConfigResult<()> {
    let content = manifest::serialize_manifest(manifest)?;
    write_atomic(&dir.join(MANIFEST_NAME), &content).await
}

async fn write_atomic(path: &Utf8Path, content: &str) -> ConfigResult<()> {
    let tmp = path.with_extension(match path.extension() {
        Some(ext) => format!("{}.tmp", ext),
        None => "tmp".to_string(),
    });

    tokio::fs::write(&tmp, content)
        .await
        .map_err(|e| TetherError::io(format!("Failed to write {}", tmp), e))?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(TetherError::io(format!("Failed to replace {}", path), e));
    }

    debug!(path = %path, bytes = content.len(), "Wrote file");
    Ok(())
}

async fn exists(path: &Utf8Path) -> ConfigResult<bool> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| TetherError::io(format!("Failed to check {}", path), e))
}
