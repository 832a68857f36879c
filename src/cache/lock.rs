//! File locking for the materialization cache.
//!
//! Writers and the eviction sweep hold an exclusive lock on
//! `{cache_dir}/.locks/{name}.lock` so two builds sharing one cache directory
//! never evict each other's half-written entries. Readers do not lock: entry
//! files are replaced atomically, so a read sees either the old or the new
//! entry.
//!
//! The lock is released when the [`CacheLock`] is dropped.

use fs4::fs_std::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::core::{MaterializeError, Result};

/// Directory under the cache root holding lock files.
pub const LOCKS_DIR: &str = ".locks";

/// An exclusive, process-wide lock on one cache directory.
#[derive(Debug)]
pub struct CacheLock {
    file: File,
    path: PathBuf,
}

impl CacheLock {
    /// Acquire the lock named `name` under `cache_dir`, blocking until it is free.
    ///
    /// Creates the `.locks/` directory and the lock file on first use.
    ///
    /// # Errors
    ///
    /// [`MaterializeError::CacheIo`] if the lock file cannot be created or
    /// locked (read-only filesystem, permission denied, ...).
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use metricmat::cache::lock::CacheLock;
    /// use std::path::Path;
    ///
    /// # fn example() -> metricmat::core::Result<()> {
    /// let lock = CacheLock::acquire(Path::new(".cache/metricmat"), "store")?;
    /// // ... write entries ...
    /// drop(lock);
    /// # Ok(())
    /// # }
    /// ```
    pub fn acquire(cache_dir: &Path, name: &str) -> Result<Self> {
        let locks_dir = cache_dir.join(LOCKS_DIR);
        fs::create_dir_all(&locks_dir).map_err(|e| lock_error("create", &locks_dir, &e))?;

        let path = locks_dir.join(format!("{name}.lock"));
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| lock_error("open", &path, &e))?;

        file.lock_exclusive().map_err(|e| lock_error("lock", &path, &e))?;
        tracing::trace!(lock = %path.display(), "Acquired cache lock");

        Ok(Self { file, path })
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("Failed to unlock {}: {}", self.path.display(), e);
        }
    }
}

fn lock_error(operation: &str, path: &Path, error: &std::io::Error) -> MaterializeError {
    MaterializeError::CacheIo {
        operation: format!("{operation} lock"),
        path: path.display().to_string(),
        reason: error.to_string(),
    }
}
