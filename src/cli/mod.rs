//! Command-line interface for metricmat.
//!
//! Each command lives in its own module with its own argument structure and
//! an `execute` method. Global flags control logging and configuration:
//!
//! - `--verbose` - Enable debug output
//! - `--quiet` - Suppress everything except errors
//! - `--config <PATH>` - Use a specific `metricmat.toml`
//!
//! # Commands
//!
//! - `materialize` - Run a pass over a manifest and print the variable block
//! - `extract` - List the invocations found in model files
//! - `cache` - Inspect or clean the persistent cache
//!
//! # Examples
//!
//! ```bash
//! # Materialize and hand the variables to the pipeline
//! metricmat materialize --manifest target/manifest.json --write-manifest > vars.yml
//!
//! # Check what a model directory invokes
//! metricmat extract models/
//!
//! # Cache maintenance
//! metricmat cache info
//! metricmat --quiet cache clean
//! ```
//!
//! Log output goes to stderr so stdout stays machine readable. `RUST_LOG`
//! takes precedence over `--verbose`/`--quiet` when set.

mod cache;
mod extract;
mod materialize;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use crate::config::ProjectConfig;

pub use cache::CacheCommand;
pub use extract::ExtractCommand;
pub use materialize::MaterializeCommand;

/// Settings derived from the global flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliConfig {
    /// Log filter directive; `None` keeps `RUST_LOG` or the default.
    pub log_level: Option<String>,

    /// Explicit configuration file.
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    /// Install the global tracing subscriber, writing to stderr.
    ///
    /// Safe to call more than once; later calls are ignored.
    pub fn init_logging(&self) {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(self.log_level.as_deref().unwrap_or("warn"))
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }

    /// Load the project configuration for `project_dir`.
    pub fn project_config(&self, project_dir: &Path) -> Result<ProjectConfig> {
        ProjectConfig::load(self.config_path.as_deref(), project_dir)
    }
}

/// Materialize semantic-layer metric queries into pipeline variables.
#[derive(Parser)]
#[command(
    name = "metricmat",
    about = "Materialize semantic-layer metric queries into pipeline variables",
    version,
    long_about = "metricmat scans model code for metric query directives, renders each distinct query \
                  once through the semantic layer, caches the result, and patches the manifest so \
                  models run after the metrics they use."
)]
pub struct Cli {
    #[command(subcommand)]
    pub(crate) command: Commands,

    /// Enable debug output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only report errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to metricmat.toml (default: ./metricmat.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Materialize every directive in a manifest and print the variable block
    Materialize(MaterializeCommand),

    /// List the directive invocations found in model files
    Extract(ExtractCommand),

    /// Inspect or clean the persistent cache
    Cache(CacheCommand),
}

impl Cli {
    /// Execute the parsed command.
    pub fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config)
    }

    /// Translate global flags into a [`CliConfig`].
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            Some("debug".to_string())
        } else if self.quiet {
            Some("error".to_string())
        } else {
            Some("info".to_string())
        };

        CliConfig {
            log_level,
            config_path: self.config.clone(),
        }
    }

    /// Execute with an explicit configuration.
    pub fn execute_with_config(self, config: CliConfig) -> Result<()> {
        config.init_logging();

        match self.command {
            Commands::Materialize(cmd) => cmd.execute(&config),
            Commands::Extract(cmd) => cmd.execute(&config),
            Commands::Cache(cmd) => cmd.execute(&config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_config_levels() {
        let cli = Cli::parse_from(["metricmat", "--verbose", "cache", "info"]);
        assert_eq!(cli.build_config().log_level.as_deref(), Some("debug"));

        let cli = Cli::parse_from(["metricmat", "cache", "info", "--quiet"]);
        assert_eq!(cli.build_config().log_level.as_deref(), Some("error"));

        let cli = Cli::parse_from(["metricmat", "-c", "alt.toml", "cache", "info"]);
        let config = cli.build_config();
        assert_eq!(config.log_level.as_deref(), Some("info"));
        assert_eq!(config.config_path, Some(PathBuf::from("alt.toml")));
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["metricmat", "-v", "-q", "cache", "info"]).is_err());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
