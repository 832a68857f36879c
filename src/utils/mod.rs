//! Filesystem and path helpers shared by the cache, the manifest loader and
//! the configuration layer.
//!
//! # Modules
//!
//! - [`fs`] - Directory creation and atomic writes
//!
//! # Example
//!
//! ```rust,no_run
//! use metricmat::utils::{atomic_write, ensure_dir, resolve_path};
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! let cache_dir = resolve_path("~/.cache/metricmat")?;
//! ensure_dir(&cache_dir)?;
//! atomic_write(&cache_dir.join("entry.json"), b"{}")?;
//! # Ok(())
//! # }
//! ```

pub mod fs;

pub use fs::{atomic_write, ensure_dir};

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Expand `~` and environment variables (`$VAR`, `${VAR}`) in a path.
///
/// # Errors
///
/// Fails when a referenced environment variable is not set.
pub fn resolve_path(path: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(path)
        .with_context(|| format!("Failed to expand path: {path}"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}
