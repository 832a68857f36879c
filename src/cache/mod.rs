//! Persistent materialization cache.
//!
//! Rendered artifacts are stored on disk keyed by [`CacheKey`], the pair of a
//! query [`Signature`] and the digest of its dependency state. Because the
//! digest is part of the key, a semantic change upstream produces a new key
//! and the stale entry is simply never read again; it ages out through
//! eviction.
//!
//! # Directory Structure
//!
//! ```text
//! .cache/metricmat/
//! ├── 3f2a…9c.json        # one entry per key, named by the key fingerprint
//! ├── 81d0…4e.json
//! └── .locks/
//!     └── store.lock      # held by writers and the eviction sweep
//! ```
//!
//! Each entry file holds the full key next to the artifact, and
//! [`MaterializationCache::get`] only returns an artifact whose stored key
//! equals the requested one.
//!
//! # Size Budget
//!
//! After every write the store is trimmed to its byte budget by deleting the
//! least recently used entries (file modification time, refreshed on every
//! hit). The entry just written is never evicted by its own write.
//!
//! # Concurrency
//!
//! Writes are atomic (temp file + rename) and serialized by a [`CacheLock`].
//! Two processes missing on the same key may both render and both write; the
//! second write replaces identical content.

pub mod lock;
pub mod memo;

pub use lock::CacheLock;
pub use memo::RenderMemo;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

use crate::constants::{CACHE_ENTRY_EXTENSION, CACHE_LOCK_NAME};
use crate::core::{MaterializeError, Result};
use crate::query::Signature;
use crate::utils::atomic_write;

/// Two-part cache key: what was asked for, and the state it was computed from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Canonical query signature
    pub signature: Signature,
    /// Digest of the dependency closure's snapshots (`sha256:<hex>`)
    pub digest: String,
}

impl CacheKey {
    /// Create a key.
    pub fn new(signature: Signature, digest: impl Into<String>) -> Self {
        Self {
            signature,
            digest: digest.into(),
        }
    }

    /// Fixed-width hex fingerprint of the key, used as the entry file name.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.signature.as_str().as_bytes());
        hasher.update(b"\n");
        hasher.update(self.digest.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// On-disk form of one cache entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    signature: String,
    digest: String,
    artifact: String,
    created_at: DateTime<Utc>,
}

/// Summary of one entry file, as listed by [`MaterializationCache::entries`].
#[derive(Debug, Clone)]
pub struct EntryInfo {
    /// Entry file path
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last use (write or hit)
    pub last_used: SystemTime,
}

/// Aggregate figures for `metricmat cache info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of entries
    pub entries: usize,
    /// Total bytes used by entries
    pub total_bytes: u64,
    /// Configured byte budget
    pub max_bytes: u64,
}

/// Directory-scoped, size-bounded key → artifact store.
///
/// The store creates its directory on first write; reading from a directory
/// that does not exist yet is a miss.
#[derive(Debug, Clone)]
pub struct MaterializationCache {
    dir: PathBuf,
    max_bytes: u64,
}

impl MaterializationCache {
    /// Create a cache rooted at `dir` with a byte budget of `max_bytes`.
    pub fn new(dir: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            dir: dir.into(),
            max_bytes,
        }
    }

    /// Cache root directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Configured byte budget.
    #[must_use]
    pub const fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.{CACHE_ENTRY_EXTENSION}", key.fingerprint()))
    }

    /// Look up the artifact stored for `key`.
    ///
    /// Returns `Ok(None)` on a miss. An unreadable or corrupt entry file is
    /// logged, removed and reported as a miss; an entry whose stored key
    /// differs from `key` is a miss.
    ///
    /// # Errors
    ///
    /// [`MaterializeError::CacheIo`] if the entry exists but cannot be read.
    pub fn get(&self, key: &CacheKey) -> Result<Option<String>> {
        let path = self.entry_path(key);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(cache_io("read", &path, &e)),
        };

        let entry: StoredEntry = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Discarding corrupt cache entry {}: {}", path.display(), e);
                let _ = fs::remove_file(&path);
                return Ok(None);
            }
        };

        if entry.signature != key.signature.as_str() || entry.digest != key.digest {
            debug!("Cache entry {} belongs to a different key", path.display());
            return Ok(None);
        }

        touch(&path);
        Ok(Some(entry.artifact))
    }

    /// Store `artifact` under `key`, then trim the store to its budget.
    ///
    /// # Errors
    ///
    /// [`MaterializeError::CacheIo`] if the directory, lock or entry file
    /// cannot be written.
    pub fn put(&self, key: &CacheKey, artifact: &str) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| cache_io("create", &self.dir, &e))?;
        let _lock = CacheLock::acquire(&self.dir, CACHE_LOCK_NAME)?;

        let path = self.entry_path(key);
        let entry = StoredEntry {
            signature: key.signature.as_str().to_string(),
            digest: key.digest.clone(),
            artifact: artifact.to_string(),
            created_at: Utc::now(),
        };
        let bytes = serde_json::to_vec(&entry).map_err(|e| MaterializeError::CacheIo {
            operation: "encode".to_string(),
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        atomic_write(&path, &bytes).map_err(|e| MaterializeError::CacheIo {
            operation: "write".to_string(),
            path: path.display().to_string(),
            reason: format!("{e:#}"),
        })?;
        debug!("Stored cache entry {} ({} bytes)", path.display(), bytes.len());

        self.evict_locked(Some(&path))?;
        Ok(())
    }

    /// List entry files, oldest first.
    ///
    /// # Errors
    ///
    /// [`MaterializeError::CacheIo`] if the directory cannot be listed.
    pub fn entries(&self) -> Result<Vec<EntryInfo>> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(cache_io("list", &self.dir, &e)),
        };

        let mut entries = Vec::new();
        for item in read_dir {
            let item = item.map_err(|e| cache_io("list", &self.dir, &e))?;
            let path = item.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(CACHE_ENTRY_EXTENSION) {
                continue;
            }
            // Entries may vanish under a concurrent eviction
            let Ok(metadata) = item.metadata() else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            entries.push(EntryInfo {
                path,
                size: metadata.len(),
                last_used: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }

        entries.sort_by(|a, b| a.last_used.cmp(&b.last_used).then_with(|| a.path.cmp(&b.path)));
        Ok(entries)
    }

    /// Entry count, bytes used and budget.
    pub fn stats(&self) -> Result<CacheStats> {
        let entries = self.entries()?;
        Ok(CacheStats {
            entries: entries.len(),
            total_bytes: entries.iter().map(|e| e.size).sum(),
            max_bytes: self.max_bytes,
        })
    }

    /// Delete entries until the store fits its budget.
    ///
    /// Returns the number of entries removed.
    pub fn evict(&self) -> Result<usize> {
        if !self.dir.exists() {
            return Ok(0);
        }
        let _lock = CacheLock::acquire(&self.dir, CACHE_LOCK_NAME)?;
        self.evict_locked(None)
    }

    fn evict_locked(&self, keep: Option<&Path>) -> Result<usize> {
        let entries = self.entries()?;
        let mut total: u64 = entries.iter().map(|e| e.size).sum();
        let mut removed = 0;

        for entry in entries {
            if total <= self.max_bytes {
                break;
            }
            if keep == Some(entry.path.as_path()) {
                continue;
            }
            match fs::remove_file(&entry.path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(cache_io("evict", &entry.path, &e)),
            }
            total = total.saturating_sub(entry.size);
            removed += 1;
        }

        if removed > 0 {
            debug!("Evicted {} cache entries from {}", removed, self.dir.display());
        }
        Ok(removed)
    }

    /// Remove every entry. Returns the number of entries removed.
    pub fn clear(&self) -> Result<usize> {
        if !self.dir.exists() {
            return Ok(0);
        }
        let _lock = CacheLock::acquire(&self.dir, CACHE_LOCK_NAME)?;
        let entries = self.entries()?;
        for entry in &entries {
            fs::remove_file(&entry.path).map_err(|e| cache_io("remove", &entry.path, &e))?;
        }
        Ok(entries.len())
    }
}

/// Refresh an entry's modification time so eviction treats it as recently used.
fn touch(path: &Path) {
    let result = fs::OpenOptions::new()
        .write(true)
        .open(path)
        .and_then(|file| file.set_modified(SystemTime::now()));
    if let Err(e) = result {
        debug!("Could not refresh {}: {}", path.display(), e);
    }
}

fn cache_io(operation: &str, path: &Path, error: &std::io::Error) -> MaterializeError {
    MaterializeError::CacheIo {
        operation: operation.to_string(),
        path: path.display().to_string(),
        reason: error.to_string(),
    }
}
