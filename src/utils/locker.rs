//! File-based locking to keep two processes off the same staging path

use anyhow::{Context, Result};
use fd_lock::{RwLock, RwLockWriteGuard};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Exclusive lock on a staging location, backed by a `<name>.lock` file
pub struct StagingLock {
    lock: RwLock<File>,
    lock_path: PathBuf,
}

impl StagingLock {
    /// Open (creating if needed) the lock file guarding `staging_path`
    pub fn open(staging_path: &Path) -> Result<Self> {
        let lock_path = Self::lock_path(staging_path);

        debug!("Opening staging lock: {:?}", lock_path);

        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create lock directory")?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .context(format!("Failed to open lock file: {:?}", lock_path))?;

        Ok(Self {
            lock: RwLock::new(file),
            lock_path,
        })
    }

    /// Take the lock without blocking; fails if another process holds it
    pub fn try_acquire(&mut self) -> Result<RwLockWriteGuard<'_, File>> {
        let guard = self.lock.try_write().context(format!(
            "Staging path is in use by another process (lock held: {:?})",
            self.lock_path
        ))?;
        info!("Acquired staging lock: {:?}", self.lock_path);
        Ok(guard)
    }

    fn lock_path(staging_path: &Path) -> PathBuf {
        let mut name = staging_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "staging".into());
        name.push(".lock");
        staging_path.with_file_name(name)
    }
}

impl Drop for StagingLock {
    fn drop(&mut self) {
        debug!("Released staging lock: {:?}", self.lock_path);

        // Try to remove the lock file (best effort)
        if let Err(e) = std::fs::remove_file(&self.lock_path) {
            debug!("Failed to remove lock file: {}", e);
        }
    }
}
