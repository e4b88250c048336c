//! Intent-spec consistency monitor.
//!
//! Cross-checks the prose index against the node store, validates every
//! node file, and computes the layered progress dimensions: schema
//! compliance, intent-spec sync, feature assignment, and the weighted
//! overall score. The monitor reads one filesystem snapshot directly
//! and never touches the graph database, so it is deterministic given a
//! frozen tree.
//!
//! Scoring exclusions: the meta-schema file is never validated or
//! counted; the Product id and inline Domain ids are reported as rows
//! but excluded from the sync score (their anchors map to the product
//! root, not to standalone files).

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use ulid::Ulid;

use crate::core::error::SpecGraphError;
use crate::core::meta_schema::{NodeKind, SchemaRegistry, META_SCHEMA_ID};
use crate::core::node_store::{NodeDoc, NodeStore};
use crate::core::prose::ProseIndex;
use crate::core::store::Workspace;
use crate::core::validate::{validate_store, SchemaReport};

/// Intent-spec agreement for one identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Anchored in prose and defined as a node.
    Synced,
    /// Anchored in prose with no node definition.
    PrdOnly,
    /// Defined as a node with no prose anchor.
    YamlOnly,
}

impl SyncStatus {
    pub fn label(&self) -> &'static str {
        match self {
            SyncStatus::Synced => "Synced",
            SyncStatus::PrdOnly => "PRD Only",
            SyncStatus::YamlOnly => "YAML Only",
        }
    }
}

/// Row for the design layer table (Product, Domain, Design, Substrate).
#[derive(Debug, Clone, Serialize)]
pub struct DesignRow {
    pub id: String,
    pub kind: String,
    pub status: SyncStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureRow {
    pub id: String,
    pub domain: Option<String>,
    pub status: SyncStatus,
    /// Number of components in `realized_by`; zero means unassigned.
    pub assignment_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentRow {
    pub id: String,
    /// Features listing this component in `realized_by`.
    pub parent_features: Vec<String>,
    pub status: SyncStatus,
}

/// The four progress dimensions plus their raw counts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MonitorStats {
    pub schema_valid: usize,
    pub schema_total: usize,
    pub schema_pct: u32,
    pub sync_synced: usize,
    pub sync_total: usize,
    pub sync_pct: u32,
    pub features_assigned: usize,
    pub features_total: usize,
    pub assignment_pct: u32,
    pub overall_pct: u32,
}

/// Full layered report for one monitor run.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorReport {
    pub run_id: String,
    pub schema: SchemaReport,
    pub design_rows: Vec<DesignRow>,
    pub feature_rows: Vec<FeatureRow>,
    pub component_rows: Vec<ComponentRow>,
    /// Ids anchored more than once in prose; each one is an error.
    pub duplicate_anchors: Vec<String>,
    pub stats: MonitorStats,
}

impl MonitorReport {
    /// True when the run found anything the exit-code convention calls
    /// an error: invalid files or duplicate anchors.
    pub fn has_errors(&self) -> bool {
        self.schema.invalid_count > 0 || !self.duplicate_anchors.is_empty()
    }
}

fn pct(numerator: usize, denominator: usize) -> u32 {
    if denominator == 0 {
        100
    } else {
        ((numerator as f64 / denominator as f64) * 100.0) as u32
    }
}

/// Run the consistency check over one filesystem snapshot.
pub fn run_monitor(ws: &Workspace) -> Result<MonitorReport, SpecGraphError> {
    let registry = SchemaRegistry::load(ws)?;
    let store = NodeStore::new(ws);
    let outcome = store.scan(None)?;
    let prose = ProseIndex::parse(&ws.prd_path())?;

    let schema = validate_store(ws, &registry, &outcome);

    let docs_by_id: BTreeMap<&str, &NodeDoc> =
        outcome.docs.iter().map(|d| (d.id.as_str(), d)).collect();

    let mut all_ids: BTreeSet<String> = docs_by_id.keys().map(|s| s.to_string()).collect();
    all_ids.extend(prose.anchors().map(|a| a.id.clone()));
    all_ids.remove(META_SCHEMA_ID);

    // Reverse index: component id -> features that realize it.
    let mut parents: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for doc in outcome.docs.iter().filter(|d| d.kind == NodeKind::Feature) {
        for comp in doc.id_list("realized_by") {
            parents.entry(comp).or_default().push(doc.id.clone());
        }
    }
    for list in parents.values_mut() {
        list.sort();
    }

    let mut report = MonitorReport {
        run_id: Ulid::new().to_string(),
        schema,
        design_rows: Vec::new(),
        feature_rows: Vec::new(),
        component_rows: Vec::new(),
        duplicate_anchors: prose.duplicates.clone(),
        stats: MonitorStats::default(),
    };

    for id in &all_ids {
        let in_prd = prose.contains(id);
        let doc = docs_by_id.get(id.as_str());
        let status = match (in_prd, doc.is_some()) {
            (true, true) => SyncStatus::Synced,
            (true, false) => SyncStatus::PrdOnly,
            (false, true) => SyncStatus::YamlOnly,
            (false, false) => continue,
        };
        let kind = doc.map(|d| d.kind).or_else(|| NodeKind::from_id(id));

        match kind {
            Some(NodeKind::Feature) => {
                let assignment_count = doc.map(|d| d.id_list("realized_by").len()).unwrap_or(0);
                report.feature_rows.push(FeatureRow {
                    id: id.clone(),
                    domain: doc
                        .and_then(|d| d.str_field("domain"))
                        .map(|s| s.to_string()),
                    status,
                    assignment_count,
                });
            }
            Some(NodeKind::Component) => {
                report.component_rows.push(ComponentRow {
                    id: id.clone(),
                    parent_features: parents.get(id).cloned().unwrap_or_default(),
                    status,
                });
            }
            _ => {
                report.design_rows.push(DesignRow {
                    id: id.clone(),
                    kind: kind
                        .map(|k| k.to_string())
                        .unwrap_or_else(|| "unknown".to_string()),
                    status,
                });
            }
        }
    }

    // Sync score: features, components, and design concepts. Product,
    // domains, and substrates are reconciled through the product file
    // and the grammar, so they are rows, not score entries.
    let mut sync_synced = 0usize;
    let mut sync_total = 0usize;
    for row in &report.feature_rows {
        sync_total += 1;
        if row.status == SyncStatus::Synced {
            sync_synced += 1;
        }
    }
    for row in &report.component_rows {
        sync_total += 1;
        if row.status == SyncStatus::Synced {
            sync_synced += 1;
        }
    }
    for row in report.design_rows.iter().filter(|r| r.kind == "design") {
        sync_total += 1;
        if row.status == SyncStatus::Synced {
            sync_synced += 1;
        }
    }

    let features_total = report.feature_rows.len();
    let features_assigned = report
        .feature_rows
        .iter()
        .filter(|f| f.assignment_count > 0)
        .count();

    let stats = MonitorStats {
        schema_valid: report.schema.valid_count,
        schema_total: report.schema.total_files,
        schema_pct: pct(report.schema.valid_count, report.schema.total_files),
        sync_synced,
        sync_total,
        sync_pct: pct(sync_synced, sync_total),
        features_assigned,
        features_total,
        assignment_pct: pct(features_assigned, features_total),
        overall_pct: 0,
    };
    let overall = f64::from(stats.schema_pct) * 0.30
        + f64::from(stats.sync_pct) * 0.30
        + f64::from(stats.assignment_pct) * 0.40;
    report.stats = MonitorStats {
        overall_pct: overall as u32,
        ..stats
    };

    Ok(report)
}
