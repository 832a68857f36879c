//! Loading and saving the pipeline manifest.
//!
//! The manifest is the JSON artifact the transformation pipeline writes after
//! parsing a project. Only a small part of it matters here:
//!
//! ```json
//! {
//!   "nodes": {
//!     "model.shop.report": {
//!       "unique_id": "model.shop.report",
//!       "name": "report",
//!       "raw_code": "select * from {{ dbt_metric_utils_materialize(metrics=['revenue']) }}",
//!       "depends_on": {"nodes": ["model.shop.stg_orders"]}
//!     }
//!   },
//!   "metrics": { "metric.shop.revenue": { "unique_id": "...", "name": "revenue", "depends_on": {"nodes": [...]} } },
//!   "semantic_models": { "semantic_model.shop.orders": { ... } }
//! }
//! ```
//!
//! Each entry's snapshot is its full JSON object minus volatile fields such as
//! `created_at`. On save, the original document is written back with only
//! the consumer nodes' `depends_on.nodes` replaced, so every other field
//! survives untouched.

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;

use super::{Entity, EntityKind, ManifestGraph};
use crate::constants::VOLATILE_SNAPSHOT_FIELDS;
use crate::core::MaterializeError;
use crate::utils::atomic_write;

/// Manifest sections and the entity kind each holds.
const SECTIONS: [(&str, EntityKind); 3] = [
    ("nodes", EntityKind::Other),
    ("metrics", EntityKind::Metric),
    ("semantic_models", EntityKind::SemanticSource),
];

impl ManifestGraph {
    /// Load a graph from a manifest file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read, is not JSON, or an entry lacks
    /// `unique_id`/`name` ([`MaterializeError::ManifestParse`]).
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        let document: Value = serde_json::from_str(&content).map_err(|e| MaterializeError::ManifestParse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::from_document(document, &path.display().to_string())?)
    }

    /// Build a graph from an already parsed manifest document.
    ///
    /// `origin` names the document in error messages.
    pub fn from_document(document: Value, origin: &str) -> std::result::Result<Self, MaterializeError> {
        let parse_error = |reason: String| MaterializeError::ManifestParse {
            path: origin.to_string(),
            reason,
        };

        if !document.is_object() {
            return Err(parse_error("top level is not a JSON object".to_string()));
        }

        let mut graph = Self::new();
        for (section, kind) in SECTIONS {
            let Some(entries) = document.get(section) else {
                continue;
            };
            let entries = entries
                .as_object()
                .ok_or_else(|| parse_error(format!("`{section}` is not an object")))?;

            for (key, entry) in entries {
                let entity = entity_from_entry(key, entry, kind).map_err(parse_error)?;
                graph.insert(entity);
            }
        }

        tracing::debug!("Loaded {} entities from {}", graph.len(), origin);
        graph.set_document(document);
        Ok(graph)
    }

    /// Render the manifest document with current consumer dependencies.
    ///
    /// Graphs built in memory (not loaded from a document) produce a minimal
    /// document holding just the consumer nodes.
    #[must_use]
    pub fn to_document(&self) -> Value {
        let mut document = self.document().cloned().unwrap_or_else(|| serde_json::json!({"nodes": {}}));

        for consumer in self.consumers() {
            let deps = Value::from(consumer.depends_on.clone());
            let nodes = document
                .as_object_mut()
                .and_then(|doc| doc.entry("nodes").or_insert_with(|| serde_json::json!({})).as_object_mut());
            let Some(nodes) = nodes else {
                continue;
            };
            let entry = nodes.entry(consumer.id.clone()).or_insert_with(|| {
                serde_json::json!({"unique_id": consumer.id, "name": consumer.name})
            });
            if let Some(entry) = entry.as_object_mut() {
                let depends_on = entry.entry("depends_on").or_insert_with(|| serde_json::json!({}));
                if let Some(depends_on) = depends_on.as_object_mut() {
                    depends_on.insert("nodes".to_string(), deps);
                }
            }
        }

        document
    }

    /// Write the manifest (see [`to_document`](Self::to_document)) to `path` atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.to_document())
            .context("Failed to serialise manifest")?;
        atomic_write(path, content.as_bytes())
            .with_context(|| format!("Failed to write manifest: {}", path.display()))
    }
}

fn entity_from_entry(key: &str, entry: &Value, kind: EntityKind) -> std::result::Result<Entity, String> {
    let object = entry.as_object().ok_or_else(|| format!("entry `{key}` is not an object"))?;

    let id = object.get("unique_id").and_then(Value::as_str).unwrap_or(key);
    let name = object
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| format!("entry `{key}` has no `name`"))?;

    let depends_on = match object.get("depends_on").and_then(|d| d.get("nodes")) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| format!("entry `{key}` has a non-string dependency"))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?,
        Some(_) => return Err(format!("entry `{key}` has a malformed `depends_on.nodes`")),
    };

    let raw_code = object.get("raw_code").and_then(Value::as_str);

    let mut snapshot = object.clone();
    for field in VOLATILE_SNAPSHOT_FIELDS {
        snapshot.remove(*field);
    }

    let mut entity = Entity::new(id, name, kind)
        .with_depends_on(depends_on)
        .with_snapshot(Value::Object(snapshot));
    if let Some(code) = raw_code {
        entity = entity.with_raw_code(code);
    }
    Ok(entity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn manifest() -> Value {
        json!({
            "metadata": {"project_name": "shop"},
            "nodes": {
                "model.shop.report": {
                    "unique_id": "model.shop.report",
                    "name": "report",
                    "raw_code": "select 1",
                    "created_at": 1.5,
                    "config": {"materialized": "table"},
                    "depends_on": {"nodes": ["model.shop.stg"], "macros": ["macro.x"]}
                },
                "model.shop.stg": {"unique_id": "model.shop.stg", "name": "stg", "depends_on": {"nodes": []}}
            },
            "metrics": {
                "metric.shop.revenue": {
                    "unique_id": "metric.shop.revenue",
                    "name": "revenue",
                    "created_at": 1_700_000_000.0,
                    "depends_on": {"nodes": ["semantic_model.shop.orders"]}
                }
            },
            "semantic_models": {
                "semantic_model.shop.orders": {"unique_id": "semantic_model.shop.orders", "name": "orders"}
            }
        })
    }

    #[test]
    fn test_load_entities_and_kinds() {
        let graph = ManifestGraph::from_document(manifest(), "test").unwrap();
        assert_eq!(graph.len(), 4);
        assert_eq!(graph.metric_id("revenue"), Some("metric.shop.revenue"));
        assert_eq!(graph.get("semantic_model.shop.orders").unwrap().kind, EntityKind::SemanticSource);

        let report = graph.get("model.shop.report").unwrap();
        assert_eq!(report.raw_code.as_deref(), Some("select 1"));
        assert_eq!(report.depends_on, vec!["model.shop.stg"]);
    }

    #[test]
    fn test_snapshot_drops_volatile_fields() {
        let graph = ManifestGraph::from_document(manifest(), "test").unwrap();
        let snapshot = &graph.get("metric.shop.revenue").unwrap().snapshot;
        assert!(snapshot.get("created_at").is_none());
        assert_eq!(snapshot["name"], "revenue");
    }

    #[test]
    fn test_malformed_documents() {
        assert!(ManifestGraph::from_document(json!([]), "t").is_err());
        assert!(ManifestGraph::from_document(json!({"nodes": []}), "t").is_err());
        let err = ManifestGraph::from_document(json!({"metrics": {"m": {"unique_id": "m"}}}), "t").unwrap_err();
        assert!(matches!(err, MaterializeError::ManifestParse { ref reason, .. } if reason.contains("name")));
    }

    #[test]
    fn test_save_rewrites_only_consumer_edges() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("manifest.json");
        std::fs::write(&path, serde_json::to_string(&manifest()).unwrap()).unwrap();

        let mut graph = ManifestGraph::load(&path).unwrap();
        graph.add_dependencies("model.shop.report", &["metric.shop.revenue".to_string()]).unwrap();
        graph.save(&path).unwrap();

        let saved: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let report = &saved["nodes"]["model.shop.report"];
        assert_eq!(report["depends_on"]["nodes"], json!(["model.shop.stg", "metric.shop.revenue"]));
        assert_eq!(report["depends_on"]["macros"], json!(["macro.x"]));
        assert_eq!(report["created_at"], json!(1.5));
        assert_eq!(saved["metadata"], json!({"project_name": "shop"}));
        assert_eq!(saved["metrics"], manifest()["metrics"]);
    }

    #[test]
    fn test_load_missing_file() {
        let temp = TempDir::new().unwrap();
        assert!(ManifestGraph::load(&temp.path().join("nope.json")).is_err());
    }
}
