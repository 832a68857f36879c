//! `metricmat materialize`: run one pass over a manifest.
//!
//! The variable block is printed to stdout (or `--output`) as YAML, ready for
//! the pipeline's `--vars` argument. With `--write-manifest` the patched
//! dependency edges are written back to the manifest file.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tracing::{debug, info};

use super::CliConfig;
use crate::config::cache_dir_from_env;
use crate::graph::ManifestGraph;
use crate::materialize::Orchestrator;
use crate::patch::PatchMode;
use crate::render::CommandRenderer;
use crate::utils::atomic_write;

/// Arguments for `materialize`.
#[derive(Args, Debug)]
pub struct MaterializeCommand {
    /// Manifest produced by the pipeline's parse step
    #[arg(short, long, default_value = "target/manifest.json")]
    manifest: PathBuf,

    /// Project directory; relative paths resolve against it
    #[arg(long, default_value = ".")]
    project_dir: PathBuf,

    /// Write the patched manifest, to PATH or back over the input
    #[arg(long, value_name = "PATH", num_args = 0..=1)]
    write_manifest: Option<Option<PathBuf>>,

    /// User variables (YAML mapping) merged into the output; user values win
    #[arg(long, default_value = "")]
    vars: String,

    /// Write the variable block to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Fail when a directive names a metric that is not in the manifest
    #[arg(long)]
    strict: bool,

    /// Skip the persistent cache for this run
    #[arg(long)]
    no_cache: bool,

    /// Renderer executable, overriding `[renderer] command`
    #[arg(long)]
    renderer: Option<String>,

    /// Renderer argument (repeatable), overriding `[renderer] args`
    #[arg(long = "renderer-arg", requires = "renderer", allow_hyphen_values = true)]
    renderer_args: Vec<String>,
}

impl MaterializeCommand {
    /// Execute the command.
    pub fn execute(self, cli: &CliConfig) -> Result<()> {
        let project_dir = &self.project_dir;
        let config = cli.project_config(project_dir)?;

        let manifest_path =
            if self.manifest.is_absolute() { self.manifest.clone() } else { project_dir.join(&self.manifest) };
        let mut graph = ManifestGraph::load(&manifest_path)?;
        debug!("Loaded {} entities from {}", graph.len(), manifest_path.display());

        let cache = if self.no_cache {
            None
        } else {
            config.cache_store(project_dir, cache_dir_from_env().as_deref())?
        };
        if let Some(cache) = &cache {
            debug!("Using cache at {}", cache.dir().display());
        }

        let renderer = match &self.renderer {
            Some(program) => CommandRenderer::new(program)
                .args(self.renderer_args.iter().cloned())
                .current_dir(project_dir),
            None => config.command_renderer(project_dir),
        };
        debug!("Renderer: {}", renderer.command_line());

        let mode = if self.strict { PatchMode::Strict } else { config.patch.mode };

        let mut orchestrator = Orchestrator::new(renderer)
            .with_directive(&config.directive)
            .with_cache(cache)
            .with_patch_mode(mode);
        let outcome = orchestrator.run(&mut graph)?;

        graph.execution_order()?;

        if let Some(target) = &self.write_manifest {
            let target = match target {
                Some(path) if path.is_absolute() => path.clone(),
                Some(path) => project_dir.join(path),
                None => manifest_path.clone(),
            };
            graph.save(&target)?;
            info!("Wrote manifest with {} new edges to {}", outcome.patch.added.len(), target.display());
        }

        let yaml = outcome.variables.to_yaml(&self.vars)?;
        match &self.output {
            Some(path) => {
                atomic_write(path, yaml.as_bytes())
                    .with_context(|| format!("Failed to write variables to {}", path.display()))?;
                info!("Wrote {} variables to {}", outcome.variables.len(), path.display());
            }
            None => print!("{yaml}"),
        }

        Ok(())
    }
}
