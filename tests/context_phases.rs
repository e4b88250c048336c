mod common;

use common::Fixture;
use specgraph::core::context::{assemble, ContextBundle, Phase};
use specgraph::core::error::SpecGraphError;
use specgraph::core::graph::GraphDb;
use specgraph::core::sync::Synchroniser;

fn feature(id: &str, domain: &str, deps: &[&str]) -> String {
    let deps = if deps.is_empty() {
        String::new()
    } else {
        format!("depends_on: [{}]\n", deps.join(", "))
    };
    format!(
        "id: {id}\ndomain: {domain}\nsource_anchor: PRD.md#{id}\nintent: Intent of {id}.\n{deps}"
    )
}

/// Standard fixture plus a three-feature dependency chain:
/// feat_a -> {feat_b, feat_c}, feat_b -> feat_c.
fn planning_fixture() -> Fixture {
    let fx = Fixture::standard();
    fx.write_spec("features/feat_a.yaml", &feature("feat_a", "dom_core", &["feat_b", "feat_c"]));
    fx.write_spec("features/feat_b.yaml", &feature("feat_b", "dom_core", &["feat_c"]));
    fx.write_spec("features/feat_c.yaml", &feature("feat_c", "dom_core", &[]));
    let mut prd = common::PRD.to_string();
    for id in ["feat_a", "feat_b", "feat_c"] {
        prd.push_str(&format!("\n### Feature: {id} <!-- id: {id} -->\n"));
    }
    fx.write_root("PRD.md", &prd);
    Synchroniser::new(&fx.ws).unwrap().sync_full().unwrap();
    fx
}

#[test]
fn understanding_returns_the_product_alone() {
    let fx = Fixture::standard();
    Synchroniser::new(&fx.ws).unwrap().sync_full().unwrap();
    let db = GraphDb::open_readonly(&fx.ws.db_path()).unwrap();

    let bundle = assemble(&db, Phase::Understanding, None, None).unwrap();
    let ContextBundle::Understanding { product } = bundle else {
        panic!("wrong bundle variant");
    };
    assert_eq!(product.id, "prod_demo");
    assert_eq!(
        product.vision.as_deref(),
        Some("Every requirement is traceable to a typed node.")
    );
    let domain_ids: Vec<&str> = product.domains.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(domain_ids, vec!["dom_core", "dom_cli"]);
}

#[test]
fn locating_reduces_features_to_briefs() {
    let fx = planning_fixture();
    let db = GraphDb::open_readonly(&fx.ws.db_path()).unwrap();

    let bundle = assemble(&db, Phase::Locating, None, Some("dom_core")).unwrap();
    let ContextBundle::Locating { features, domain, .. } = bundle else {
        panic!("wrong bundle variant");
    };
    assert_eq!(domain.as_deref(), Some("dom_core"));
    let ids: Vec<&str> = features.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, vec!["feat_a", "feat_b", "feat_c", "feat_scan"]);
    let scan = features.iter().find(|f| f.id == "feat_scan").unwrap();
    assert_eq!(scan.realized_by, vec!["comp_scanner".to_string()]);
    assert_eq!(scan.intent.as_deref(), Some("Scan the node tree for changes."));
}

#[test]
fn locating_with_unknown_domain_is_unknown_node() {
    let fx = Fixture::standard();
    Synchroniser::new(&fx.ws).unwrap().sync_full().unwrap();
    let db = GraphDb::open_readonly(&fx.ws.db_path()).unwrap();

    let err = assemble(&db, Phase::Locating, None, Some("dom_missing")).unwrap_err();
    assert!(
        matches!(err, SpecGraphError::UnknownNode { ref id, .. } if id == "dom_missing"),
        "{err}"
    );
}

#[test]
fn evaluating_brings_components_with_full_design_bodies() {
    let fx = Fixture::standard();
    // One extra component the scanner depends on, one hop out.
    fx.write_spec(
        "components/comp_hasher.yaml",
        "id: comp_hasher\ntype: module\ndesc: Canonical content hashing.\nfile_path: src/hasher.rs\ndesign:\n  api: hash(value) -> String\n  logic: Canonical JSON then SHA-256.\n",
    );
    fx.write_spec(
        "components/comp_scanner.yaml",
        &format!("{}dependencies: [comp_hasher]\n", common::COMP_SCANNER),
    );
    Synchroniser::new(&fx.ws).unwrap().sync_full().unwrap();
    let db = GraphDb::open_readonly(&fx.ws.db_path()).unwrap();

    let bundle = assemble(&db, Phase::Evaluating, Some("feat_scan"), None).unwrap();
    let ContextBundle::Evaluating { feature, components } = bundle else {
        panic!("wrong bundle variant");
    };
    assert_eq!(feature.id, "feat_scan");
    assert_eq!(feature.domain.as_deref(), Some("dom_core"));

    let ids: Vec<&str> = components.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["comp_hasher", "comp_scanner"]);
    let scanner = components.iter().find(|c| c.id == "comp_scanner").unwrap();
    assert_eq!(
        scanner.design.get("api").and_then(|v| v.as_str()),
        Some("scan(root) -> Vec<Node>")
    );
    assert_eq!(scanner.dependencies, vec!["comp_hasher".to_string()]);
}

#[test]
fn evaluating_without_focus_is_a_missing_argument() {
    let fx = Fixture::standard();
    Synchroniser::new(&fx.ws).unwrap().sync_full().unwrap();
    let db = GraphDb::open_readonly(&fx.ws.db_path()).unwrap();

    let err = assemble(&db, Phase::Evaluating, None, None).unwrap_err();
    assert!(
        matches!(err, SpecGraphError::PhaseArgumentMissing { ref arg, .. } if arg == "focus"),
        "{err}"
    );
}

#[test]
fn evaluating_unknown_focus_is_unknown_node() {
    let fx = Fixture::standard();
    Synchroniser::new(&fx.ws).unwrap().sync_full().unwrap();
    let db = GraphDb::open_readonly(&fx.ws.db_path()).unwrap();

    let err = assemble(&db, Phase::Evaluating, Some("feat_nope"), None).unwrap_err();
    assert!(matches!(err, SpecGraphError::UnknownNode { .. }), "{err}");
}

#[test]
fn planning_emits_dependencies_before_dependents() {
    let fx = planning_fixture();
    let db = GraphDb::open_readonly(&fx.ws.db_path()).unwrap();

    let bundle = assemble(&db, Phase::Planning, Some("feat_a"), None).unwrap();
    let ContextBundle::Planning { kind, order } = bundle else {
        panic!("wrong bundle variant");
    };
    assert_eq!(kind, "feature");
    assert_eq!(order, vec!["feat_c", "feat_b", "feat_a"]);
}

#[test]
fn planning_detects_cycles() {
    let fx = planning_fixture();
    // Close the loop: feat_c now depends on feat_a.
    fx.write_spec("features/feat_c.yaml", &feature("feat_c", "dom_core", &["feat_a"]));
    let report = Synchroniser::new(&fx.ws).unwrap().sync_full().unwrap();
    assert!(report.issues.is_empty(), "the cycle is structural, not a sync error");

    let db = GraphDb::open_readonly(&fx.ws.db_path()).unwrap();
    let err = assemble(&db, Phase::Planning, Some("feat_a"), None).unwrap_err();
    let SpecGraphError::CycleDetected { kind, cycle } = err else {
        panic!("expected CycleDetected");
    };
    assert_eq!(kind, "feature");
    assert!(cycle.len() >= 3, "cycle should name its members: {:?}", cycle);
}

#[test]
fn planning_closure_is_restricted_to_the_focus_kind() {
    let fx = planning_fixture();
    let db = GraphDb::open_readonly(&fx.ws.db_path()).unwrap();

    // Component planning ignores the feature dependency web entirely.
    let bundle = assemble(&db, Phase::Planning, Some("comp_scanner"), None).unwrap();
    let ContextBundle::Planning { kind, order } = bundle else {
        panic!("wrong bundle variant");
    };
    assert_eq!(kind, "component");
    assert_eq!(order, vec!["comp_scanner"]);
}
