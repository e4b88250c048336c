//! One-way projection from the node store into the graph database.
//!
//! Two modes: a full rebuild that truncates every table and replays the
//! whole store, and an incremental pass that short-circuits unchanged
//! files by content hash. All reads complete before the single write
//! transaction opens; iteration is path-sorted so identical trees
//! produce identical databases regardless of filesystem listing order.
//!
//! Per-file parse and validation errors are collected in the run report
//! and leave the offending node un-upserted; only a corrupt meta-schema
//! aborts the run.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use ulid::Ulid;

use crate::core::db::now_iso;
use crate::core::error::SpecGraphError;
use crate::core::graph::{self, DomainApiRow, EdgeRow, GraphDb, NodeRow};
use crate::core::meta_schema::{NodeKind, SchemaRegistry};
use crate::core::node_store::{canonical_json, hash_yaml_value, NodeDoc, NodeStore, ScanOutcome};
use crate::core::prose::ProseIndex;
use crate::core::store::Workspace;
use crate::core::validate::{NodeValidator, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    Full,
    Incremental,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Parse,
    Validation,
    DanglingReference,
}

/// One non-fatal problem encountered during a run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncIssue {
    pub kind: IssueKind,
    /// Offending file or node identifier.
    pub subject: String,
    pub detail: String,
}

/// Structured result of one synchroniser run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub run_id: String,
    pub mode: SyncMode,
    pub nodes_written: usize,
    pub nodes_skipped: usize,
    pub nodes_deleted: usize,
    pub edges_written: usize,
    pub apis_written: usize,
    pub issues: Vec<SyncIssue>,
}

impl SyncReport {
    fn new(mode: SyncMode) -> Self {
        Self {
            run_id: Ulid::new().to_string(),
            mode,
            nodes_written: 0,
            nodes_skipped: 0,
            nodes_deleted: 0,
            edges_written: 0,
            apis_written: 0,
            issues: Vec::new(),
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.issues.is_empty()
    }
}

#[derive(Debug)]
pub struct Synchroniser {
    ws: Workspace,
    registry: SchemaRegistry,
}

impl Synchroniser {
    /// Loading the registry up front makes a corrupt meta-schema abort
    /// the whole run before any database is touched.
    pub fn new(ws: &Workspace) -> Result<Self, SpecGraphError> {
        let registry = SchemaRegistry::load(ws)?;
        Ok(Self {
            ws: ws.clone(),
            registry,
        })
    }

    /// Truncate all tables and replay the whole node store.
    pub fn sync_full(&self) -> Result<SyncReport, SpecGraphError> {
        let mut report = SyncReport::new(SyncMode::Full);

        // Read phase: everything comes off disk before the transaction.
        let store = NodeStore::new(&self.ws);
        let outcome = store.scan(None)?;
        let prose = ProseIndex::parse(&self.ws.prd_path())?;
        let writable = self.writable_docs(&outcome, &mut report);

        let rows: Vec<NodeRow> = writable.iter().map(|d| self.node_row(d, &prose)).collect();
        let written_ids: BTreeSet<String> = rows.iter().map(|r| r.id.clone()).collect();
        let (edges, apis) = self.derive_all(&writable, &written_ids, &mut report);

        // Write phase: one transaction.
        let mut db = GraphDb::open(&self.ws.db_path())?;
        db.with_write_tx(|conn| {
            graph::clear_all(conn)?;
            for row in &rows {
                graph::upsert_node(conn, row)?;
                report.nodes_written += 1;
            }
            for edge in &edges {
                graph::insert_edge(conn, edge)?;
                report.edges_written += 1;
            }
            for api in &apis {
                graph::upsert_domain_api(conn, api)?;
                report.apis_written += 1;
            }
            Ok(())
        })?;

        Ok(report)
    }

    /// Re-project only the given files; unchanged hashes short-circuit.
    /// Paths may be absolute or relative to the project root.
    pub fn sync_incremental(&self, changed: &[PathBuf]) -> Result<SyncReport, SpecGraphError> {
        let mut report = SyncReport::new(SyncMode::Incremental);

        let store = NodeStore::new(&self.ws);
        let outcome = store.scan(None)?;
        let prose = ProseIndex::parse(&self.ws.prd_path())?;
        let validator = NodeValidator::new(&self.ws, &self.registry, &outcome.docs);
        let by_source: BTreeMap<&str, &NodeDoc> = outcome
            .docs
            .iter()
            .filter(|d| !d.is_virtual)
            .map(|d| (d.source_file.as_str(), d))
            .collect();

        let mut db = GraphDb::open(&self.ws.db_path())?;

        // Read phase: classify every changed path first.
        enum Plan {
            Delete(String),
            Upsert(Vec<NodeRow>, Vec<EdgeRow>, Vec<DomainApiRow>, Vec<(String, NodeKind)>),
            Skip,
        }

        let mut plans: Vec<Plan> = Vec::new();
        let mut changed_sorted: Vec<PathBuf> = changed.to_vec();
        changed_sorted.sort();
        changed_sorted.dedup();

        for path in &changed_sorted {
            let rel = self.relative(path);
            if !self.ws.project_root.join(&rel).exists() {
                match db.node_id_for_source_file(&rel)? {
                    Some(id) => plans.push(Plan::Delete(id)),
                    None => report.issues.push(SyncIssue {
                        kind: IssueKind::Parse,
                        subject: rel.clone(),
                        detail: "removed file was not tracked by the graph".to_string(),
                    }),
                }
                continue;
            }

            let Some(doc) = by_source.get(rel.as_str()) else {
                if let Some(issue) = outcome.issues.iter().find(|i| i.path == rel) {
                    report.issues.push(SyncIssue {
                        kind: IssueKind::Parse,
                        subject: issue.path.clone(),
                        detail: issue.detail.clone(),
                    });
                } else {
                    report.issues.push(SyncIssue {
                        kind: IssueKind::Parse,
                        subject: rel.clone(),
                        detail: "path is not a node file under the spec directory".to_string(),
                    });
                }
                continue;
            };

            let hash = hash_yaml_value(&doc.data);
            if db.stored_hash(&doc.id)?.as_deref() == Some(hash.as_str()) {
                plans.push(Plan::Skip);
                continue;
            }

            let violations = validator.validate(doc);
            if violations.iter().any(|v| v.severity == Severity::Error) {
                for v in violations.iter().filter(|v| v.severity == Severity::Error) {
                    report.issues.push(SyncIssue {
                        kind: IssueKind::Validation,
                        subject: doc.source_file.clone(),
                        detail: format!("{}: {}", v.field, v.message),
                    });
                }
                continue;
            }

            // A changed product file also refreshes its virtual domains
            // and exported APIs.
            let doc: &NodeDoc = doc;
            let mut rows = vec![self.node_row(doc, &prose)];
            let mut group: Vec<&NodeDoc> = vec![doc];
            let domain_docs: Vec<NodeDoc>;
            if doc.kind == NodeKind::Product {
                domain_docs = crate::core::node_store::extract_virtual_domains(doc);
                for dom in &domain_docs {
                    rows.push(self.node_row(dom, &prose));
                    group.push(dom);
                }
            }

            let known: BTreeSet<String> = {
                let mut ids: BTreeSet<String> =
                    db.all_nodes()?.into_iter().map(|n| n.id).collect();
                ids.extend(rows.iter().map(|r| r.id.clone()));
                ids
            };
            let (edges, apis) = self.derive_all(&group, &known, &mut report);
            let replaced: Vec<(String, NodeKind)> =
                group.iter().map(|d| (d.id.clone(), d.kind)).collect();
            plans.push(Plan::Upsert(rows, edges, apis, replaced));
        }

        // Write phase: one transaction over all plans.
        db.with_write_tx(|conn| {
            for plan in &plans {
                match plan {
                    Plan::Skip => report.nodes_skipped += 1,
                    Plan::Delete(id) => {
                        if graph::delete_node(conn, id)? {
                            report.nodes_deleted += 1;
                        }
                    }
                    Plan::Upsert(rows, edges, apis, replaced) => {
                        for row in rows {
                            graph::upsert_node(conn, row)?;
                            report.nodes_written += 1;
                        }
                        for (id, kind) in replaced {
                            // A virtual domain's outgoing `owns` edges
                            // belong to feature files; only its exported
                            // APIs are replaced with the product file.
                            match kind {
                                NodeKind::Domain => graph::delete_domain_apis(conn, id)?,
                                NodeKind::Feature => {
                                    graph::delete_outgoing_edges(conn, id)?;
                                    graph::delete_incoming_edges(conn, id, "owns")?;
                                }
                                _ => graph::delete_outgoing_edges(conn, id)?,
                            }
                        }
                        for edge in edges {
                            graph::insert_edge(conn, edge)?;
                            report.edges_written += 1;
                        }
                        for api in apis {
                            graph::upsert_domain_api(conn, api)?;
                            report.apis_written += 1;
                        }
                    }
                }
            }
            Ok(())
        })?;

        Ok(report)
    }

    /// Docs that survive validation; errors surface in the report and
    /// leave the node out of this run's writes. Virtual domains ride
    /// with their product file.
    fn writable_docs<'a>(
        &self,
        outcome: &'a ScanOutcome,
        report: &mut SyncReport,
    ) -> Vec<&'a NodeDoc> {
        for issue in &outcome.issues {
            report.issues.push(SyncIssue {
                kind: IssueKind::Parse,
                subject: issue.path.clone(),
                detail: issue.detail.clone(),
            });
        }

        let validator = NodeValidator::new(&self.ws, &self.registry, &outcome.docs);
        let mut writable = Vec::new();
        let mut product_ok = true;
        for doc in &outcome.docs {
            if doc.is_virtual {
                continue;
            }
            let violations = validator.validate(doc);
            let errors: Vec<_> = violations
                .iter()
                .filter(|v| v.severity == Severity::Error)
                .collect();
            if errors.is_empty() {
                writable.push(doc);
            } else {
                if doc.kind == NodeKind::Product {
                    product_ok = false;
                }
                for v in errors {
                    report.issues.push(SyncIssue {
                        kind: IssueKind::Validation,
                        subject: doc.source_file.clone(),
                        detail: format!("{}: {}", v.field, v.message),
                    });
                }
            }
        }
        if product_ok {
            writable.extend(outcome.docs.iter().filter(|d| d.is_virtual));
        }
        writable.sort_by(|a, b| {
            (a.source_file.as_str(), a.id.as_str()).cmp(&(b.source_file.as_str(), b.id.as_str()))
        });
        writable
    }

    fn node_row(&self, doc: &NodeDoc, prose: &ProseIndex) -> NodeRow {
        // The prose anchor wins over a declared source_anchor field: the
        // column records where the intent actually lives.
        let source_anchor = if prose.contains(&doc.id) {
            Some(format!("PRD.md#{}", doc.id))
        } else {
            doc.str_field("source_anchor").map(|s| s.to_string())
        };
        let now = now_iso();
        NodeRow {
            id: doc.id.clone(),
            kind: doc.kind.to_string(),
            name: doc.name(),
            description: doc.description(),
            source_file: Some(doc.source_file.clone()),
            source_anchor,
            intent: doc.str_field("intent").map(|s| s.to_string()),
            file_path: doc.str_field("file_path").map(|s| s.to_string()),
            content_hash: Some(hash_yaml_value(&doc.data)),
            raw_payload: if doc.raw.is_empty() {
                None
            } else {
                Some(doc.raw.clone())
            },
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Derive edges and domain APIs for a set of docs. Each relation has
    /// exactly one source file, so no run can produce conflicting
    /// duplicates. Edges whose target is not a known node are skipped
    /// and reported.
    fn derive_all(
        &self,
        docs: &[&NodeDoc],
        known_ids: &BTreeSet<String>,
        report: &mut SyncReport,
    ) -> (Vec<EdgeRow>, Vec<DomainApiRow>) {
        let mut edges = Vec::new();
        let mut apis = Vec::new();

        for doc in docs {
            match doc.kind {
                NodeKind::Product => {
                    for dom_id in self.product_domain_ids(doc) {
                        self.push_edge(&mut edges, known_ids, report, &doc.id, &dom_id, "contains", None);
                    }
                }
                NodeKind::Domain => {
                    apis.extend(self.domain_exports(doc));
                }
                NodeKind::Feature => {
                    if let Some(domain) = doc.str_field("domain") {
                        self.push_edge(&mut edges, known_ids, report, domain, &doc.id, "owns", None);
                    }
                    for dep in doc.id_list("depends_on") {
                        self.push_edge(&mut edges, known_ids, report, &doc.id, &dep, "depends_on", None);
                    }
                    for comp in doc.id_list("realized_by") {
                        self.push_edge(&mut edges, known_ids, report, &doc.id, &comp, "realized_by", None);
                    }
                    for api_ref in doc.id_list("consumes") {
                        // `dom_core.log_event` -> consumes edge to the
                        // domain, with the full API name as metadata.
                        let Some((domain, _)) = api_ref.split_once('.') else {
                            report.issues.push(SyncIssue {
                                kind: IssueKind::DanglingReference,
                                subject: doc.id.clone(),
                                detail: format!("malformed API reference '{}'", api_ref),
                            });
                            continue;
                        };
                        let metadata =
                            serde_json::json!({ "api": api_ref }).to_string();
                        self.push_edge(
                            &mut edges,
                            known_ids,
                            report,
                            &doc.id,
                            domain,
                            "consumes",
                            Some(metadata),
                        );
                    }
                }
                NodeKind::Component => {
                    for dep in doc.id_list("dependencies") {
                        self.push_edge(&mut edges, known_ids, report, &doc.id, &dep, "depends_on", None);
                    }
                    // binds_to is persisted as the indexed file_path
                    // column on the node row: edge endpoints are
                    // FK-constrained to nodes, and a file is not a node.
                }
                NodeKind::Design | NodeKind::Substrate => {}
            }
        }

        edges.sort();
        edges.dedup();
        apis.sort();
        apis.dedup();
        (edges, apis)
    }

    fn push_edge(
        &self,
        edges: &mut Vec<EdgeRow>,
        known_ids: &BTreeSet<String>,
        report: &mut SyncReport,
        source: &str,
        target: &str,
        relation: &str,
        metadata: Option<String>,
    ) {
        if !known_ids.contains(source) || !known_ids.contains(target) {
            let missing = if known_ids.contains(source) { target } else { source };
            report.issues.push(SyncIssue {
                kind: IssueKind::DanglingReference,
                subject: format!("{} -{}-> {}", source, relation, target),
                detail: format!("endpoint '{}' is not a known node; edge skipped", missing),
            });
            return;
        }
        edges.push(EdgeRow {
            source_id: source.to_string(),
            target_id: target.to_string(),
            relation: relation.to_string(),
            metadata,
        });
    }

    fn product_domain_ids(&self, product: &NodeDoc) -> Vec<String> {
        product
            .data
            .get("domains")
            .and_then(|v| v.as_sequence())
            .map(|seq| {
                seq.iter()
                    .filter_map(|d| d.get("id").and_then(|v| v.as_str()).map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn domain_exports(&self, domain: &NodeDoc) -> Vec<DomainApiRow> {
        let Some(exports) = domain.data.get("exports").and_then(|v| v.as_sequence()) else {
            return Vec::new();
        };
        exports
            .iter()
            .filter_map(|api| {
                let name = api.get("name").and_then(|v| v.as_str())?;
                Some(DomainApiRow {
                    domain_id: domain.id.clone(),
                    name: name.to_string(),
                    signature: api
                        .get("signature")
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string(),
                    description: api
                        .get("description")
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string()),
                    input_schema: api
                        .get("input_schema")
                        .map(|v| serde_json::to_string(&canonical_json(v)).unwrap_or_default()),
                    output_schema: api
                        .get("output_schema")
                        .map(|v| serde_json::to_string(&canonical_json(v)).unwrap_or_default()),
                })
            })
            .collect()
    }

    fn relative(&self, path: &Path) -> String {
        let p = if path.is_absolute() {
            path.strip_prefix(&self.ws.project_root)
                .unwrap_or(path)
                .to_path_buf()
        } else {
            path.to_path_buf()
        };
        p.to_string_lossy().replace('\\', "/")
    }
}
