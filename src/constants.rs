//! Global constants used throughout the metricmat codebase.
//!
//! Names, file locations and size limits shared by the extractor, the cache
//! and the configuration layer live here so their defaults stay in one place.

/// Directive name scanned for in model source text.
pub const DEFAULT_DIRECTIVE: &str = "dbt_metric_utils_materialize";

/// Project configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "metricmat.toml";

/// Default cache location, relative to the working directory.
pub const DEFAULT_CACHE_DIR: &str = ".cache/metricmat";

/// Environment variable that overrides the cache location.
pub const CACHE_DIR_ENV: &str = "METRICMAT_CACHE_DIR";

/// Default byte budget for the persistent cache (3 MiB).
pub const DEFAULT_CACHE_MAX_BYTES: u64 = 3 * 1024 * 1024;

/// Extension of cache entry files.
pub const CACHE_ENTRY_EXTENSION: &str = "json";

/// Name of the lock file guarding cache writes and eviction.
pub const CACHE_LOCK_NAME: &str = "store";

/// Snapshot fields that change on every manifest parse and never affect rendering.
pub const VOLATILE_SNAPSHOT_FIELDS: &[&str] = &["created_at"];

/// Id prefix of consumer nodes in the pipeline manifest.
pub const CONSUMER_ID_PREFIX: &str = "model.";
