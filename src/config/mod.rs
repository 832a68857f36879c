//! Project configuration (`metricmat.toml`).
//!
//! Every field has a default, so a missing file or an empty one is a valid
//! configuration. The file is looked up in the working directory unless a
//! path is given explicitly.
//!
//! ```toml
//! directive = "dbt_metric_utils_materialize"
//!
//! [cache]
//! enabled = true
//! dir = ".cache/metricmat"   # relative to the project directory, `~` and `$VAR` expanded
//! max-size = "3M"            # B, K, M or G suffix (powers of 1024)
//!
//! [patch]
//! mode = "lenient"           # or "strict"
//!
//! [renderer]
//! command = "mf"
//! args = ["explain-json"]
//! ```
//!
//! # Precedence
//!
//! 1. Command-line flags (`--no-cache`, `--strict`, `--renderer`)
//! 2. `METRICMAT_CACHE_DIR` for the cache location
//! 3. `metricmat.toml`
//! 4. Built-in defaults

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cache::MaterializationCache;
use crate::constants::{
    CACHE_DIR_ENV, CONFIG_FILE_NAME, DEFAULT_CACHE_DIR, DEFAULT_CACHE_MAX_BYTES, DEFAULT_DIRECTIVE,
};
use crate::core::MaterializeError;
use crate::patch::PatchMode;
use crate::render::CommandRenderer;
use crate::utils::resolve_path;

fn default_directive() -> String {
    DEFAULT_DIRECTIVE.to_string()
}

const fn default_true() -> bool {
    true
}

fn default_cache_dir() -> String {
    DEFAULT_CACHE_DIR.to_string()
}

fn default_max_size() -> String {
    format!("{}K", DEFAULT_CACHE_MAX_BYTES / 1024)
}

fn default_renderer_command() -> String {
    "mf".to_string()
}

fn default_renderer_args() -> Vec<String> {
    vec!["explain-json".to_string()]
}

/// Top-level project configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ProjectConfig {
    /// Directive name scanned for in model source
    #[serde(default = "default_directive")]
    pub directive: String,

    /// Persistent cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Graph patching settings
    #[serde(default)]
    pub patch: PatchConfig,

    /// External renderer settings
    #[serde(default)]
    pub renderer: RendererConfig,
}

/// `[cache]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct CacheConfig {
    /// Whether the persistent cache is used at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Cache directory
    #[serde(default = "default_cache_dir")]
    pub dir: String,

    /// Byte budget, e.g. `"3M"`
    #[serde(default = "default_max_size")]
    pub max_size: String,
}

/// `[patch]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PatchConfig {
    /// Policy for unknown metric names
    #[serde(default)]
    pub mode: PatchMode,
}

/// `[renderer]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RendererConfig {
    /// Executable to run
    #[serde(default = "default_renderer_command")]
    pub command: String,

    /// Leading arguments
    #[serde(default = "default_renderer_args")]
    pub args: Vec<String>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            directive: default_directive(),
            cache: CacheConfig::default(),
            patch: PatchConfig::default(),
            renderer: RendererConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_cache_dir(),
            max_size: default_max_size(),
        }
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            command: default_renderer_command(),
            args: default_renderer_args(),
        }
    }
}

impl ProjectConfig {
    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Fails on invalid TOML, unknown keys or an invalid `max-size`.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.cache.max_bytes()?;
        Ok(config)
    }

    /// Load configuration from `path`.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration the way the CLI does.
    ///
    /// An explicit path must exist. Otherwise `metricmat.toml` in
    /// `project_dir` is used when present, and defaults when not.
    pub fn load(explicit: Option<&Path>, project_dir: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }
        let candidate = project_dir.join(CONFIG_FILE_NAME);
        if candidate.exists() {
            Self::load_from(&candidate)
        } else {
            tracing::debug!("No {} in {}, using defaults", CONFIG_FILE_NAME, project_dir.display());
            Ok(Self::default())
        }
    }

    /// Build the persistent cache, or `None` when it is disabled.
    ///
    /// `env_dir` is the value of `METRICMAT_CACHE_DIR`, if set.
    pub fn cache_store(&self, project_dir: &Path, env_dir: Option<&str>) -> Result<Option<MaterializationCache>> {
        if !self.cache.enabled {
            return Ok(None);
        }
        let dir = self.cache.resolve_dir(project_dir, env_dir)?;
        Ok(Some(MaterializationCache::new(dir, self.cache.max_bytes()?)))
    }

    /// Build the configured external renderer, running in `project_dir`.
    #[must_use]
    pub fn command_renderer(&self, project_dir: &Path) -> CommandRenderer {
        CommandRenderer::new(&self.renderer.command)
            .args(self.renderer.args.iter().cloned())
            .current_dir(project_dir)
    }
}

impl CacheConfig {
    /// The budget in bytes.
    pub fn max_bytes(&self) -> Result<u64> {
        Ok(parse_size(&self.max_size)?)
    }

    /// Resolve the cache directory.
    ///
    /// `env_dir` (from `METRICMAT_CACHE_DIR`) replaces the configured value.
    /// Relative paths are resolved against `project_dir`.
    pub fn resolve_dir(&self, project_dir: &Path, env_dir: Option<&str>) -> Result<PathBuf> {
        let raw = env_dir.filter(|d| !d.is_empty()).unwrap_or(&self.dir);
        let path = resolve_path(raw)?;
        Ok(if path.is_absolute() { path } else { project_dir.join(path) })
    }
}

/// Current value of the cache directory override.
#[must_use]
pub fn cache_dir_from_env() -> Option<String> {
    std::env::var(CACHE_DIR_ENV).ok()
}

/// Parse a byte size such as `"3M"`, `"512K"`, `"1G"` or `"4096"`.
///
/// Suffixes are powers of 1024 and case-insensitive; a trailing `B` is
/// allowed (`"3MB"`).
///
/// # Errors
///
/// [`MaterializeError::Config`] for anything else.
///
/// ```rust
/// use metricmat::config::parse_size;
///
/// assert_eq!(parse_size("3M").unwrap(), 3 * 1024 * 1024);
/// assert_eq!(parse_size("100").unwrap(), 100);
/// ```
pub fn parse_size(text: &str) -> std::result::Result<u64, MaterializeError> {
    let invalid = || MaterializeError::Config {
        message: format!("invalid size '{text}' (expected a number with optional K, M or G suffix)"),
    };

    let trimmed = text.trim();
    let digits_end = trimmed.find(|c: char| !c.is_ascii_digit()).unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(digits_end);
    let number: u64 = number.parse().map_err(|_| invalid())?;

    let unit = unit.trim().to_ascii_uppercase();
    let multiplier: u64 = match unit.strip_suffix('B').unwrap_or(&unit) {
        "" => 1,
        "K" => 1024,
        "M" => 1024 * 1024,
        "G" => 1024 * 1024 * 1024,
        _ => return Err(invalid()),
    };

    number.checked_mul(multiplier).ok_or_else(invalid)
}
