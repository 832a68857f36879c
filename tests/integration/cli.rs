//! The `metricmat` binary. `cat` echoes the query JSON back as the artifact.

use predicates::prelude::*;
use std::fs;

use crate::common::{REVENUE_BY_REGION, REVENUE_BY_REGION_SIGNATURE, TestProject, shop_manifest};

fn report_project() -> TestProject {
    let sql = format!("select * from {{{{ {REVENUE_BY_REGION} }}}}");
    TestProject::new(&shop_manifest(&[("model.shop.report", &sql)])).unwrap()
}

#[test]
fn test_help_lists_commands() {
    let project = report_project();
    project
        .command()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("materialize").and(predicate::str::contains("extract")));
}

#[cfg(unix)]
#[test]
fn test_materialize_prints_variables() {
    let project = report_project();
    let output = project
        .command()
        .args(["materialize", "--renderer", "cat", "--no-cache"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let vars: serde_yaml::Mapping = serde_yaml::from_slice(&output).unwrap();
    let artifact = vars.get(REVENUE_BY_REGION_SIGNATURE).and_then(serde_yaml::Value::as_str).unwrap();
    let query: serde_json::Value = serde_json::from_str(artifact).unwrap();
    assert_eq!(query["metrics"], serde_json::json!(["revenue"]));
    assert_eq!(query["group_by"], serde_json::json!(["region"]));
    assert!(query["limit"].is_null());

    let manifest = project.manifest().unwrap();
    assert_eq!(manifest["nodes"]["model.shop.report"]["depends_on"]["nodes"], serde_json::json!(["model.shop.stg_orders"]));
}

#[cfg(unix)]
#[test]
fn test_write_manifest_and_output_file() {
    let project = report_project();
    project
        .command()
        .args(["materialize", "--renderer", "cat", "--write-manifest", "--output", "vars.yml"])
        .args(["--vars", "{target: prod}"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let manifest = project.manifest().unwrap();
    assert_eq!(
        manifest["nodes"]["model.shop.report"]["depends_on"]["nodes"],
        serde_json::json!(["model.shop.stg_orders", "metric.shop.revenue"])
    );

    let vars: serde_yaml::Mapping =
        serde_yaml::from_str(&fs::read_to_string(project.path().join("vars.yml")).unwrap()).unwrap();
    assert_eq!(vars.get("target").and_then(serde_yaml::Value::as_str), Some("prod"));
    assert!(vars.contains_key(REVENUE_BY_REGION_SIGNATURE));
    assert_eq!(project.cache_entries(), 1);
}

#[cfg(unix)]
#[test]
fn test_config_file_and_cache_commands() {
    let project = report_project();
    project.write_config("[renderer]\ncommand = \"cat\"\nargs = []\n").unwrap();

    project.command().arg("materialize").assert().success();
    assert_eq!(project.cache_entries(), 1);

    project
        .command()
        .args(["cache", "info"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Entries: 1"));

    project
        .command()
        .args(["cache", "clean"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 1"));
    assert_eq!(project.cache_entries(), 0);
}

#[cfg(unix)]
#[test]
fn test_renderer_failure_reports_node() {
    let project = report_project();
    project
        .command()
        .args(["materialize", "--renderer", "false", "--no-cache"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("model.shop.report"));
}

#[test]
fn test_strict_unknown_metric_fails() {
    let sql = "{{ dbt_metric_utils_materialize(metrics=['churn']) }}";
    let project = TestProject::new(&shop_manifest(&[("model.shop.report", sql)])).unwrap();
    project
        .command()
        .args(["materialize", "--strict", "--no-cache", "--renderer", "does-not-exist"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("churn"));
}

#[test]
fn test_missing_manifest_fails() {
    let project = report_project();
    project
        .command()
        .args(["materialize", "--manifest", "nope.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope.json").and(predicate::str::contains("Configuration error").not()));
}

#[test]
fn test_extract_lists_signatures() {
    let project = report_project();
    let models = project.path().join("models");
    fs::create_dir_all(&models).unwrap();
    fs::write(models.join("report.sql"), format!("select * from {{{{ {REVENUE_BY_REGION} }}}}")).unwrap();
    fs::write(models.join("notes.md"), format!("{{{{ {REVENUE_BY_REGION} }}}}")).unwrap();

    project
        .command()
        .args(["extract", "models"])
        .assert()
        .success()
        .stdout(predicate::str::contains(REVENUE_BY_REGION_SIGNATURE).and(predicate::str::contains("1 invocations")));
}

#[test]
fn test_malformed_list_is_a_syntax_error() {
    let sql = "{{ dbt_metric_utils_materialize(metrics=['revenue',,'orders']) }}";
    let project = TestProject::new(&shop_manifest(&[("model.shop.report", sql)])).unwrap();
    project
        .command()
        .args(["materialize", "--no-cache", "--renderer", "does-not-exist"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Check quotes, brackets and commas").and(predicate::str::contains("model.shop.report")));
}

#[test]
fn test_extract_reports_parse_errors() {
    let project = report_project();
    fs::write(project.path().join("bad.sql"), "{{ dbt_metric_utils_materialize(metrics=revenue) }}").unwrap();

    project
        .command()
        .args(["extract", "bad.sql"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("bad.sql"));
}
