//! `metricmat cache`: inspect or clean the persistent cache.

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use super::CliConfig;
use crate::cache::MaterializationCache;
use crate::config::cache_dir_from_env;

/// Arguments for `cache`.
#[derive(Args, Debug)]
pub struct CacheCommand {
    #[command(subcommand)]
    command: Option<CacheSubcommand>,

    /// Project directory the cache location resolves against
    #[arg(long, default_value = ".", global = true)]
    project_dir: PathBuf,
}

#[derive(Subcommand, Debug)]
enum CacheSubcommand {
    /// Show location, entry count and size
    Info,

    /// Remove cached artifacts
    Clean {
        /// Only evict down to the size budget instead of removing everything
        #[arg(long)]
        evict: bool,
    },
}

impl CacheCommand {
    /// Execute the command.
    pub fn execute(self, cli: &CliConfig) -> Result<()> {
        let config = cli.project_config(&self.project_dir)?;
        let dir = config.cache.resolve_dir(&self.project_dir, cache_dir_from_env().as_deref())?;
        let cache = MaterializationCache::new(dir, config.cache.max_bytes()?);

        match self.command.unwrap_or(CacheSubcommand::Info) {
            CacheSubcommand::Info => show_info(&cache, config.cache.enabled),
            CacheSubcommand::Clean { evict } => clean(&cache, evict),
        }
    }
}

fn show_info(cache: &MaterializationCache, enabled: bool) -> Result<()> {
    let stats = cache.stats()?;

    println!("{}", "Cache Information".bold());
    println!("  Location: {}", cache.dir().display());
    println!("  Enabled: {}", if enabled { "yes".green() } else { "no".yellow() });
    println!("  Entries: {}", stats.entries);
    println!("  Size: {} / {}", format_size(stats.total_bytes), format_size(stats.max_bytes));
    Ok(())
}

fn clean(cache: &MaterializationCache, evict_only: bool) -> Result<()> {
    let removed = if evict_only { cache.evict()? } else { cache.clear()? };

    if removed == 0 {
        println!("{}", "Cache already clean".green());
    } else {
        println!("{} Removed {} cache entries", "✓".green(), removed);
    }
    Ok(())
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 { format!("{bytes} B") } else { format!("{size:.1} {}", UNITS[unit]) }
}
