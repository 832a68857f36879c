//! Common fixtures for metricmat integration tests

// Not every helper is used by every test file
#![allow(dead_code)]

use anyhow::Result;
use assert_cmd::Command;
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Directive call used throughout the suite.
pub const REVENUE_BY_REGION: &str = "dbt_metric_utils_materialize(metrics=['revenue'], group_by=['region'])";

/// Signature of [`REVENUE_BY_REGION`].
pub const REVENUE_BY_REGION_SIGNATURE: &str =
    "metrics=['revenue'],dimensions=,group_by=['region'],limit=,time_start=,time_end=,where=,order_by=";

/// Manifest with a staging model, one semantic model, two metrics and the
/// given consumer models (`(id, raw_code)`).
pub fn shop_manifest(models: &[(&str, &str)]) -> Value {
    let mut nodes = serde_json::Map::new();
    nodes.insert(
        "model.shop.stg_orders".to_string(),
        json!({
            "unique_id": "model.shop.stg_orders",
            "name": "stg_orders",
            "raw_code": "select * from raw.orders",
            "depends_on": {"nodes": []}
        }),
    );
    for (id, code) in models {
        nodes.insert(
            (*id).to_string(),
            json!({
                "unique_id": id,
                "name": id.rsplit('.').next().unwrap_or(id),
                "raw_code": code,
                "created_at": 1_700_000_000.5,
                "depends_on": {"nodes": ["model.shop.stg_orders"], "macros": []}
            }),
        );
    }

    json!({
        "metadata": {"project_name": "shop"},
        "nodes": nodes,
        "metrics": {
            "metric.shop.revenue": {
                "unique_id": "metric.shop.revenue",
                "name": "revenue",
                "created_at": 1_700_000_000.5,
                "depends_on": {"nodes": ["semantic_model.shop.orders"]}
            },
            "metric.shop.order_count": {
                "unique_id": "metric.shop.order_count",
                "name": "order_count",
                "depends_on": {"nodes": ["semantic_model.shop.orders"]}
            }
        },
        "semantic_models": {
            "semantic_model.shop.orders": {
                "unique_id": "semantic_model.shop.orders",
                "name": "orders",
                "measures": [{"name": "amount", "agg": "sum"}],
                "depends_on": {"nodes": ["model.shop.stg_orders"]}
            }
        }
    })
}

/// A temporary project directory with a manifest under `target/`.
pub struct TestProject {
    pub dir: TempDir,
}

impl TestProject {
    /// Create a project holding `manifest`.
    pub fn new(manifest: &Value) -> Result<Self> {
        let dir = TempDir::new()?;
        fs::create_dir_all(dir.path().join("target"))?;
        fs::write(dir.path().join("target/manifest.json"), serde_json::to_string_pretty(manifest)?)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.path().join("target/manifest.json")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.path().join(".cache/metricmat")
    }

    /// Read the manifest back.
    pub fn manifest(&self) -> Result<Value> {
        Ok(serde_json::from_str(&fs::read_to_string(self.manifest_path())?)?)
    }

    /// Write `metricmat.toml`.
    pub fn write_config(&self, content: &str) -> Result<()> {
        fs::write(self.path().join("metricmat.toml"), content)?;
        Ok(())
    }

    /// `metricmat` command running in the project directory with a clean environment.
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("metricmat").expect("metricmat binary is built");
        cmd.current_dir(self.path()).env_remove("RUST_LOG").env_remove("METRICMAT_CACHE_DIR");
        cmd
    }

    /// Number of entry files in the default cache directory.
    pub fn cache_entries(&self) -> usize {
        fs::read_dir(self.cache_dir())
            .map(|dir| {
                dir.filter_map(Result::ok)
                    .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
                    .count()
            })
            .unwrap_or(0)
    }
}
