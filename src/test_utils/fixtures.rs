//! Fixture builders for manifests and renderers.

use serde_json::{Value, json};

use crate::graph::ManifestGraph;
use crate::query::MetricQuery;
use crate::render::Renderer;

/// Builder for pipeline manifest documents.
#[derive(Clone, Debug)]
pub struct ManifestFixture {
    document: Value,
}

impl ManifestFixture {
    /// Empty manifest with the three sections present.
    pub fn empty() -> Self {
        Self {
            document: json!({"metadata": {"project_name": "shop"}, "nodes": {}, "metrics": {}, "semantic_models": {}}),
        }
    }

    /// A small shop project: one staging model, an `orders` semantic model
    /// and `revenue`/`order_count` metrics on top of it.
    pub fn shop() -> Self {
        Self::empty()
            .with_model("model.shop.stg_orders", "select * from raw.orders")
            .with_semantic_model("semantic_model.shop.orders", "orders", &["model.shop.stg_orders"], "sum")
            .with_metric("metric.shop.revenue", "revenue", &["semantic_model.shop.orders"])
            .with_metric("metric.shop.order_count", "order_count", &["semantic_model.shop.orders"])
    }

    fn section(&mut self, name: &str) -> &mut serde_json::Map<String, Value> {
        let document = self.document.as_object_mut().expect("fixture document is an object");
        document
            .entry(name.to_string())
            .or_insert_with(|| json!({}))
            .as_object_mut()
            .expect("fixture section is an object")
    }

    /// Add a model node with `raw_code` and no dependencies.
    pub fn with_model(mut self, id: &str, raw_code: &str) -> Self {
        let name = id.rsplit('.').next().unwrap_or(id).to_string();
        self.section("nodes").insert(
            id.to_string(),
            json!({
                "unique_id": id,
                "name": name,
                "resource_type": "model",
                "raw_code": raw_code,
                "created_at": 1_700_000_000.0,
                "depends_on": {"nodes": [], "macros": []}
            }),
        );
        self
    }

    /// Add a metric.
    pub fn with_metric(mut self, id: &str, name: &str, depends_on: &[&str]) -> Self {
        self.section("metrics").insert(
            id.to_string(),
            json!({
                "unique_id": id,
                "name": name,
                "type": "simple",
                "created_at": 1_700_000_000.0,
                "depends_on": {"nodes": depends_on}
            }),
        );
        self
    }

    /// Add a semantic model whose single measure uses aggregation `agg`.
    pub fn with_semantic_model(mut self, id: &str, name: &str, depends_on: &[&str], agg: &str) -> Self {
        self.section("semantic_models").insert(
            id.to_string(),
            json!({
                "unique_id": id,
                "name": name,
                "measures": [{"name": "amount", "agg": agg}],
                "created_at": 1_700_000_000.0,
                "depends_on": {"nodes": depends_on}
            }),
        );
        self
    }

    /// Parse the document into a graph.
    pub fn graph(&self) -> ManifestGraph {
        ManifestGraph::from_document(self.document.clone(), "fixture").expect("fixture manifest is valid")
    }
}

/// Renderer that records calls and returns `select <metrics>`.
#[derive(Debug, Default)]
pub struct CountingRenderer {
    rendered: Vec<MetricQuery>,
}

impl CountingRenderer {
    /// Number of render calls.
    pub fn calls(&self) -> usize {
        self.rendered.len()
    }

    /// Queries rendered so far.
    pub fn rendered(&self) -> &[MetricQuery] {
        &self.rendered
    }
}

impl Renderer for CountingRenderer {
    fn render(&mut self, query: &MetricQuery) -> crate::core::Result<String> {
        self.rendered.push(query.clone());
        Ok(format!("select {}", query.metric_names().join(", ")))
    }
}
