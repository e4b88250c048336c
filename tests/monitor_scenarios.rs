mod common;

use common::Fixture;
use specgraph::core::error::SpecGraphError;
use specgraph::core::monitor::{run_monitor, SyncStatus};

#[test]
fn happy_run_scores_every_dimension_at_100() {
    let fx = Fixture::standard();
    let report = run_monitor(&fx.ws).unwrap();

    assert_eq!(report.schema.total_files, 3, "meta-schema must not be counted");
    assert_eq!(report.schema.invalid_count, 0);
    assert_eq!(report.stats.schema_pct, 100);
    assert_eq!(report.stats.sync_pct, 100);
    assert_eq!(report.stats.assignment_pct, 100);
    assert_eq!(report.stats.overall_pct, 100);
    assert!(!report.has_errors());

    // Design-layer rows are reported even though they are not scored.
    let design_ids: Vec<&str> = report.design_rows.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(design_ids, vec!["dom_cli", "dom_core", "prod_demo"]);
    assert!(report
        .design_rows
        .iter()
        .all(|r| r.status == SyncStatus::Synced));
}

#[test]
fn intent_spec_drift_scores_half() {
    let fx = Fixture::standard();
    fx.write_spec(
        "features/feat_orphan.yaml",
        "id: feat_orphan\ndomain: dom_core\nsource_anchor: PRD.md#feat_orphan\nintent: Never made it into prose.\n",
    );
    let mut prd = common::PRD.to_string();
    prd.push_str("\n### Feature: Ghost <!-- id: feat_ghost -->\n");
    fx.write_root("PRD.md", &prd);

    let report = run_monitor(&fx.ws).unwrap();

    let orphan = report
        .feature_rows
        .iter()
        .find(|f| f.id == "feat_orphan")
        .unwrap();
    assert_eq!(orphan.status, SyncStatus::YamlOnly);
    let ghost = report
        .feature_rows
        .iter()
        .find(|f| f.id == "feat_ghost")
        .unwrap();
    assert_eq!(ghost.status, SyncStatus::PrdOnly);

    assert_eq!(report.stats.sync_synced, 2);
    assert_eq!(report.stats.sync_total, 4);
    assert_eq!(report.stats.sync_pct, 50);
}

#[test]
fn empty_realized_by_is_unassigned_not_an_error() {
    let fx = Fixture::standard();
    fx.write_spec(
        "features/feat_bare.yaml",
        "id: feat_bare\ndomain: dom_cli\nsource_anchor: PRD.md#feat_bare\nintent: No components yet.\n",
    );
    let mut prd = common::PRD.to_string();
    prd.push_str("\n### Feature: Bare <!-- id: feat_bare -->\n");
    fx.write_root("PRD.md", &prd);

    let report = run_monitor(&fx.ws).unwrap();
    assert_eq!(report.schema.invalid_count, 0, "a bare feature is still valid");
    let bare = report
        .feature_rows
        .iter()
        .find(|f| f.id == "feat_bare")
        .unwrap();
    assert_eq!(bare.assignment_count, 0);
    assert_eq!(report.stats.features_assigned, 1);
    assert_eq!(report.stats.features_total, 2);
}

#[test]
fn feature_with_unknown_domain_is_a_schema_error() {
    let fx = Fixture::standard();
    fx.write_spec(
        "features/feat_lost.yaml",
        "id: feat_lost\ndomain: dom_nowhere\nsource_anchor: PRD.md#feat_lost\nintent: Points at a missing domain.\n",
    );

    let report = run_monitor(&fx.ws).unwrap();
    assert_eq!(report.schema.invalid_count, 1);
    let result = report
        .schema
        .results
        .iter()
        .find(|r| r.node_id == "feat_lost")
        .unwrap();
    assert!(!result.is_valid());
    assert!(result
        .violations
        .iter()
        .any(|v| v.field == "domain" && v.message.contains("dom_nowhere")));
    assert!(report.has_errors());
}

#[test]
fn duplicate_prose_anchor_is_an_error() {
    let fx = Fixture::standard();
    let mut prd = common::PRD.to_string();
    prd.push_str("\n### Feature: Scan again <!-- id: feat_scan -->\n");
    fx.write_root("PRD.md", &prd);

    let report = run_monitor(&fx.ws).unwrap();
    assert_eq!(report.duplicate_anchors, vec!["feat_scan".to_string()]);
    assert!(report.has_errors());
}

#[test]
fn broken_meta_schema_aborts_with_meta_schema_unavailable() {
    let fx = Fixture::standard();
    fx.write_spec("substrate/sub_meta_schema.yaml", "kinds: [not, a, grammar");

    let err = run_monitor(&fx.ws).unwrap_err();
    assert!(matches!(err, SpecGraphError::MetaSchemaUnavailable(_)), "{err}");
}

#[test]
fn missing_meta_schema_aborts_with_meta_schema_unavailable() {
    let fx = Fixture::standard();
    fx.remove_spec("substrate/sub_meta_schema.yaml");

    let err = run_monitor(&fx.ws).unwrap_err();
    assert!(matches!(err, SpecGraphError::MetaSchemaUnavailable(_)), "{err}");
}

#[test]
fn component_parent_features_come_from_reverse_realized_by() {
    let fx = Fixture::standard();
    let report = run_monitor(&fx.ws).unwrap();
    let scanner = report
        .component_rows
        .iter()
        .find(|c| c.id == "comp_scanner")
        .unwrap();
    assert_eq!(scanner.parent_features, vec!["feat_scan".to_string()]);
    assert_eq!(scanner.status, SyncStatus::Synced);
}

#[test]
fn monitor_is_deterministic_for_a_frozen_tree() {
    let fx = Fixture::standard();
    let a = run_monitor(&fx.ws).unwrap();
    let b = run_monitor(&fx.ws).unwrap();

    let strip = |r: &specgraph::core::monitor::MonitorReport| {
        serde_json::json!({
            "schema": serde_json::to_value(&r.schema).unwrap(),
            "design": serde_json::to_value(&r.design_rows).unwrap(),
            "features": serde_json::to_value(&r.feature_rows).unwrap(),
            "components": serde_json::to_value(&r.component_rows).unwrap(),
            "stats": serde_json::to_value(&r.stats).unwrap(),
        })
    };
    assert_eq!(strip(&a), strip(&b));
}
