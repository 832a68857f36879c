//! `metricmat extract`: list directive invocations in model files.
//!
//! Walks the given files and directories for `.sql` files, parses every
//! invocation, and prints each with its signature. Useful for checking what a
//! pass will render before running the pipeline.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::CliConfig;
use crate::extract::CallExtractor;
use crate::materialize::parse_invocations;
use crate::query::Invocation;

/// Arguments for `extract`.
#[derive(Args, Debug)]
pub struct ExtractCommand {
    /// Files or directories to scan
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Directive name, overriding the configured one
    #[arg(long)]
    directive: Option<String>,

    /// File extension to scan in directories
    #[arg(long, default_value = "sql")]
    extension: String,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

impl ExtractCommand {
    /// Execute the command.
    pub fn execute(self, cli: &CliConfig) -> Result<()> {
        let directive = match &self.directive {
            Some(directive) => directive.clone(),
            None => cli.project_config(Path::new("."))?.directive,
        };
        let extractor = CallExtractor::new(&directive);

        let mut found = Vec::new();
        for file in self.source_files()? {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let label = file.display().to_string();
            found.extend(parse_invocations(&label, &text, &extractor)?);
        }

        if self.json {
            println!("{}", serde_json::to_string_pretty(&to_json(&found))?);
        } else if found.is_empty() {
            println!("No invocations of {} found", directive.bold());
        } else {
            for invocation in &found {
                println!("{} {}", invocation.node_id.cyan(), invocation.raw_text);
                println!("  {} {}", "→".green(), invocation.signature());
            }
            println!("\n{} invocations", found.len());
        }
        Ok(())
    }

    fn source_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for path in &self.paths {
            if path.is_file() {
                files.push(path.clone());
                continue;
            }
            if !path.exists() {
                anyhow::bail!("Path does not exist: {}", path.display());
            }
            for entry in WalkDir::new(path).follow_links(false).sort_by_file_name() {
                let entry = entry?;
                if entry.file_type().is_file()
                    && entry.path().extension().and_then(|e| e.to_str()) == Some(self.extension.as_str())
                {
                    files.push(entry.into_path());
                }
            }
        }
        Ok(files)
    }
}

fn to_json(found: &[Invocation]) -> serde_json::Value {
    found
        .iter()
        .map(|invocation| {
            serde_json::json!({
                "file": invocation.node_id,
                "text": invocation.raw_text,
                "signature": invocation.signature().as_str(),
                "query": invocation.query,
            })
        })
        .collect()
}
