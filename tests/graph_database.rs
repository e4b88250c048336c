mod common;

use common::Fixture;
use rusqlite::Connection;
use specgraph::core::error::SpecGraphError;
use specgraph::core::graph::GraphDb;
use specgraph::core::meta_schema::NodeKind;
use specgraph::core::sync::Synchroniser;

#[test]
fn keyword_search_covers_name_intent_and_description() {
    let fx = Fixture::standard();
    Synchroniser::new(&fx.ws).unwrap().sync_full().unwrap();
    let db = GraphDb::open_readonly(&fx.ws.db_path()).unwrap();

    // "node tree" appears only in feat_scan's intent.
    let hits = db.search("node tree", None).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "feat_scan");

    // "spec tree" appears in comp_scanner's description.
    let hits = db.search("spec tree", None).unwrap();
    assert!(hits.iter().any(|n| n.id == "comp_scanner"));

    // Kind filter narrows the result set.
    let hits = db.search("e", Some(&[NodeKind::Domain])).unwrap();
    assert!(hits.iter().all(|n| n.kind == "domain"));
}

#[test]
fn schema_version_mismatch_triggers_a_full_rebuild() {
    let fx = Fixture::standard();
    Synchroniser::new(&fx.ws).unwrap().sync_full().unwrap();

    // Simulate a database written by an older binary.
    let conn = Connection::open(fx.ws.db_path()).unwrap();
    conn.execute(
        "UPDATE meta SET value = '0' WHERE key = 'schema_version'",
        [],
    )
    .unwrap();
    drop(conn);

    // Opening for write drops and recreates the tables.
    let db = GraphDb::open(&fx.ws.db_path()).unwrap();
    assert!(db.all_nodes().unwrap().is_empty());
    assert!(db.all_edges().unwrap().is_empty());

    // A fresh sync restores the projection.
    let report = Synchroniser::new(&fx.ws).unwrap().sync_full().unwrap();
    assert_eq!(report.nodes_written, 5);
}

#[test]
fn readonly_open_requires_an_existing_database() {
    let fx = Fixture::standard();
    let err = GraphDb::open_readonly(&fx.ws.db_path()).unwrap_err();
    assert!(matches!(err, SpecGraphError::NotFound(_)), "{err}");
}

#[test]
fn readers_see_committed_state_while_writer_is_open() {
    let fx = Fixture::standard();
    Synchroniser::new(&fx.ws).unwrap().sync_full().unwrap();

    let _writer = GraphDb::open(&fx.ws.db_path()).unwrap();
    let reader = GraphDb::open_readonly(&fx.ws.db_path()).unwrap();
    assert_eq!(reader.all_nodes().unwrap().len(), 5);
}

#[test]
fn consumes_edges_point_at_the_domain_with_api_metadata() {
    let fx = Fixture::standard();
    fx.write_spec(
        "features/feat_scan.yaml",
        &format!("{}consumes: [dom_core.scan_tree]\n", common::FEAT_SCAN),
    );
    Synchroniser::new(&fx.ws).unwrap().sync_full().unwrap();
    let db = GraphDb::open_readonly(&fx.ws.db_path()).unwrap();

    let consumes = db.edges_from("feat_scan", Some("consumes")).unwrap();
    assert_eq!(consumes.len(), 1);
    assert_eq!(consumes[0].target_id, "dom_core");
    let metadata: serde_json::Value =
        serde_json::from_str(consumes[0].metadata.as_deref().unwrap()).unwrap();
    assert_eq!(
        metadata.get("api").and_then(|v| v.as_str()),
        Some("dom_core.scan_tree")
    );
}

#[test]
fn edge_endpoints_always_exist_in_nodes() {
    let fx = Fixture::standard();
    fx.write_spec(
        "features/feat_scan.yaml",
        &common::FEAT_SCAN.replace("[comp_scanner]", "[comp_scanner, comp_missing]"),
    );
    Synchroniser::new(&fx.ws).unwrap().sync_full().unwrap();
    let db = GraphDb::open_readonly(&fx.ws.db_path()).unwrap();

    let node_ids: std::collections::BTreeSet<String> =
        db.all_nodes().unwrap().into_iter().map(|n| n.id).collect();
    for edge in db.all_edges().unwrap() {
        assert!(node_ids.contains(&edge.source_id), "{:?}", edge);
        assert!(node_ids.contains(&edge.target_id), "{:?}", edge);
    }
}
