//! Full materialization passes over manifest documents.

use metricmat::core::MaterializeError;
use metricmat::graph::ManifestGraph;
use metricmat::materialize::Orchestrator;
use metricmat::patch::PatchMode;
use metricmat::query::MetricQuery;
use serde_json::json;

use crate::common::{REVENUE_BY_REGION, REVENUE_BY_REGION_SIGNATURE, shop_manifest};

fn graph(models: &[(&str, &str)]) -> ManifestGraph {
    ManifestGraph::from_document(shop_manifest(models), "test").unwrap()
}

fn echo(query: &MetricQuery) -> metricmat::core::Result<String> {
    Ok(format!("-- {}\nselect 1", query.signature()))
}

#[test]
fn test_pass_produces_variables_and_edges() {
    let sql = format!("select * from {{{{ {REVENUE_BY_REGION} }}}}");
    let mut graph = graph(&[("model.shop.report", &sql)]);

    let outcome = Orchestrator::new(echo).run(&mut graph).unwrap();

    assert_eq!(outcome.variables.len(), 1);
    let artifact = outcome.variables.get(REVENUE_BY_REGION_SIGNATURE).unwrap();
    assert!(artifact.starts_with("-- metrics=['revenue']"));

    assert_eq!(
        graph.get("model.shop.report").unwrap().depends_on,
        vec!["model.shop.stg_orders", "metric.shop.revenue"]
    );
    assert!(graph.execution_order().is_ok());
}

#[test]
fn test_patched_manifest_keeps_other_fields() {
    let sql = format!("{{{{ {REVENUE_BY_REGION} }}}}");
    let mut graph = graph(&[("model.shop.report", &sql)]);
    Orchestrator::new(echo).run(&mut graph).unwrap();

    let document = graph.to_document();
    let report = &document["nodes"]["model.shop.report"];
    assert_eq!(report["depends_on"]["nodes"], json!(["model.shop.stg_orders", "metric.shop.revenue"]));
    assert_eq!(report["depends_on"]["macros"], json!([]));
    assert_eq!(report["created_at"], json!(1_700_000_000.5));
    assert_eq!(document["metadata"]["project_name"], "shop");
}

#[test]
fn test_shared_query_across_models_renders_once() {
    let sql = format!("{{{{ {REVENUE_BY_REGION} }}}}");
    let spaced = "{{ dbt_metric_utils_materialize( metrics=['revenue'],group_by=['region'] ) }}";
    let mut graph = graph(&[("model.shop.a", &sql), ("model.shop.b", spaced)]);

    let mut calls = 0;
    let outcome = Orchestrator::new(|q: &MetricQuery| {
        calls += 1;
        echo(q)
    })
    .run(&mut graph)
    .unwrap();

    assert_eq!(outcome.invocations.len(), 2);
    assert_eq!(outcome.variables.len(), 1);
    assert_eq!(outcome.stats.renders, 1);
    assert_eq!(outcome.patch.added.len(), 2);
    assert_eq!(calls, 1);
}

#[test]
fn test_quoted_parentheses_and_templates_in_where() {
    let sql = r#"{{ dbt_metric_utils_materialize(metrics=['order_count'], where="{{ Dimension('order__status') }} = 'paid (final)'") }}"#;
    let mut graph = graph(&[("model.shop.paid", sql)]);

    let outcome = Orchestrator::new(echo).run(&mut graph).unwrap();
    let (signature, _) = outcome.variables.iter().next().unwrap();
    assert!(signature.contains("where={{ Dimension('order__status') }} = 'paid (final)'"), "{signature}");
    assert!(graph.get("model.shop.paid").unwrap().depends_on.contains(&"metric.shop.order_count".to_string()));
}

#[test]
fn test_invalid_invocation_aborts_whole_pass() {
    let good = format!("{{{{ {REVENUE_BY_REGION} }}}}");
    let bad = "{{ dbt_metric_utils_materialize(metrics=['revenue'], limit=ten) }}";
    let mut graph = graph(&[("model.shop.a", &good), ("model.shop.b", bad)]);

    let err = Orchestrator::new(echo).run(&mut graph).unwrap_err();

    assert!(matches!(err, MaterializeError::Invocation { ref node_id, .. } if node_id == "model.shop.b"));
    assert!(matches!(err.root_cause(), MaterializeError::Parse { .. }));
    assert_eq!(graph.get("model.shop.a").unwrap().depends_on, vec!["model.shop.stg_orders"]);
}

#[test]
fn test_missing_metrics_is_invalid_arguments() {
    let mut graph = graph(&[("model.shop.a", "{{ dbt_metric_utils_materialize(group_by=['region']) }}")]);
    let err = Orchestrator::new(echo).run(&mut graph).unwrap_err();
    assert!(matches!(err.root_cause(), MaterializeError::InvalidArguments { .. }));
}

#[test]
fn test_strict_mode_rejects_unknown_metric_before_rendering() {
    let mut graph = graph(&[("model.shop.a", "{{ dbt_metric_utils_materialize(metrics=['churn']) }}")]);

    let mut calls = 0;
    let err = Orchestrator::new(|q: &MetricQuery| {
        calls += 1;
        echo(q)
    })
    .with_patch_mode(PatchMode::Strict)
    .run(&mut graph)
    .unwrap_err();

    assert!(matches!(err.root_cause(), MaterializeError::UnknownDependency { name, .. } if name == "churn"));
    assert_eq!(calls, 0);
}

#[test]
fn test_models_without_directives_are_untouched() {
    let mut graph = graph(&[("model.shop.plain", "select 1")]);
    let outcome = Orchestrator::new(echo).run(&mut graph).unwrap();

    assert!(outcome.variables.is_empty());
    assert!(outcome.patch.is_noop());
    assert_eq!(outcome.variables.to_yaml("").unwrap().trim(), "{}");
}
