//! Persistent cache behaviour across passes.

use metricmat::cache::{CacheKey, MaterializationCache};
use metricmat::graph::ManifestGraph;
use metricmat::materialize::Orchestrator;
use metricmat::query::{MetricQuery, Signature};
use serde_json::json;
use std::cell::Cell;
use tempfile::TempDir;

use crate::common::{REVENUE_BY_REGION, REVENUE_BY_REGION_SIGNATURE, shop_manifest};

fn run(
    manifest: &serde_json::Value,
    cache: &MaterializationCache,
    calls: &Cell<usize>,
) -> metricmat::materialize::MaterializeOutcome {
    let mut graph = ManifestGraph::from_document(manifest.clone(), "test").unwrap();
    Orchestrator::new(|q: &MetricQuery| {
        calls.set(calls.get() + 1);
        Ok(format!("select {} -- render #{}", q.metric_names().join(", "), calls.get()))
    })
    .with_cache(Some(cache.clone()))
    .run(&mut graph)
    .unwrap()
}

#[test]
fn test_second_run_is_served_from_disk() {
    let temp = TempDir::new().unwrap();
    let cache = MaterializationCache::new(temp.path().join("cache"), 1024 * 1024);
    let manifest = shop_manifest(&[("model.shop.report", &format!("{{{{ {REVENUE_BY_REGION} }}}}"))]);
    let calls = Cell::new(0);

    let first = run(&manifest, &cache, &calls);
    let second = run(&manifest, &cache, &calls);

    assert_eq!(calls.get(), 1);
    assert_eq!(second.stats.cache_hits, 1);
    assert_eq!(
        first.variables.get(REVENUE_BY_REGION_SIGNATURE),
        second.variables.get(REVENUE_BY_REGION_SIGNATURE)
    );
}

#[test]
fn test_volatile_fields_do_not_invalidate() {
    let temp = TempDir::new().unwrap();
    let cache = MaterializationCache::new(temp.path(), 1024 * 1024);
    let manifest = shop_manifest(&[("model.shop.report", &format!("{{{{ {REVENUE_BY_REGION} }}}}"))]);
    let calls = Cell::new(0);
    run(&manifest, &cache, &calls);

    let mut reparsed = manifest.clone();
    reparsed["metrics"]["metric.shop.revenue"]["created_at"] = json!(1_800_000_000.0);
    run(&reparsed, &cache, &calls);

    assert_eq!(calls.get(), 1);
}

#[test]
fn test_semantic_change_invalidates() {
    let temp = TempDir::new().unwrap();
    let cache = MaterializationCache::new(temp.path(), 1024 * 1024);
    let manifest = shop_manifest(&[("model.shop.report", &format!("{{{{ {REVENUE_BY_REGION} }}}}"))]);
    let calls = Cell::new(0);
    run(&manifest, &cache, &calls);

    let mut changed = manifest.clone();
    changed["semantic_models"]["semantic_model.shop.orders"]["measures"][0]["agg"] = json!("average");
    let outcome = run(&changed, &cache, &calls);

    assert_eq!(calls.get(), 2);
    assert!(outcome.variables.get(REVENUE_BY_REGION_SIGNATURE).unwrap().ends_with("#2"));
}

#[test]
fn test_unrelated_model_change_keeps_cache() {
    let temp = TempDir::new().unwrap();
    let cache = MaterializationCache::new(temp.path(), 1024 * 1024);
    let manifest = shop_manifest(&[("model.shop.report", &format!("{{{{ {REVENUE_BY_REGION} }}}}"))]);
    let calls = Cell::new(0);
    run(&manifest, &cache, &calls);

    let mut changed = manifest.clone();
    changed["nodes"]["model.shop.stg_orders"]["raw_code"] = json!("select id, amount from raw.orders");
    run(&changed, &cache, &calls);

    assert_eq!(calls.get(), 1);
}

#[test]
fn test_budget_bounds_directory_size() {
    let temp = TempDir::new().unwrap();
    let cache = MaterializationCache::new(temp.path(), 2_000);
    let artifact = "x".repeat(600);

    for i in 0..10 {
        let key = CacheKey::new(Signature::from_canonical(format!("metrics=['m{i}']")), "sha256:00");
        cache.put(&key, &artifact).unwrap();
    }

    let stats = cache.stats().unwrap();
    assert!(stats.total_bytes <= 2_000, "{stats:?}");
    assert!(stats.entries >= 1);

    let newest = CacheKey::new(Signature::from_canonical("metrics=['m9']"), "sha256:00");
    assert_eq!(cache.get(&newest).unwrap().as_deref(), Some(artifact.as_str()));
}
