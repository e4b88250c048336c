//! Schema validation of node files against the meta-schema registry.
//!
//! Validation never aborts a run: each file yields a list of violations
//! with `Error`/`Warning` severity, and the monitor and synchroniser
//! decide what to do with them. Missing required fields, prefix
//! mismatches, and self-references are errors; unknown fields, dangling
//! cross-references, and path-convention deviations are warnings.
//!
//! The meta-schema file itself is exempt and never appears in a report.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::core::error::SpecGraphError;
use crate::core::meta_schema::{NodeKind, SchemaRegistry};
use crate::core::node_store::{NodeDoc, NodeStore, ScanOutcome};
use crate::core::store::Workspace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Serialize)]
pub struct Violation {
    pub severity: Severity,
    pub field: String,
    pub message: String,
}

impl Violation {
    fn error(field: &str, message: String) -> Self {
        Self {
            severity: Severity::Error,
            field: field.to_string(),
            message,
        }
    }

    fn warning(field: &str, message: String) -> Self {
        Self {
            severity: Severity::Warning,
            field: field.to_string(),
            message,
        }
    }
}

/// Validation outcome for one node file.
#[derive(Debug, Clone, Serialize)]
pub struct FileValidation {
    pub path: String,
    pub node_id: String,
    pub kind: String,
    pub violations: Vec<Violation>,
}

impl FileValidation {
    pub fn is_valid(&self) -> bool {
        !self
            .violations
            .iter()
            .any(|v| v.severity == Severity::Error)
    }

    pub fn has_warnings(&self) -> bool {
        self.violations
            .iter()
            .any(|v| v.severity == Severity::Warning)
    }
}

/// Validation results for every node file in the store.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchemaReport {
    pub total_files: usize,
    pub valid_count: usize,
    pub invalid_count: usize,
    pub warning_count: usize,
    pub results: Vec<FileValidation>,
}

/// Cross-file context + registry, applied to one document at a time.
pub struct NodeValidator<'a> {
    registry: &'a SchemaRegistry,
    ws: Workspace,
    valid_domains: BTreeSet<String>,
    known_ids: BTreeSet<String>,
}

impl<'a> NodeValidator<'a> {
    /// Build the cross-reference context from one scan of the store.
    pub fn new(ws: &Workspace, registry: &'a SchemaRegistry, docs: &[NodeDoc]) -> Self {
        let valid_domains = docs
            .iter()
            .filter(|d| d.kind == NodeKind::Domain)
            .map(|d| d.id.clone())
            .collect();
        let known_ids = docs.iter().map(|d| d.id.clone()).collect();
        Self {
            registry,
            ws: ws.clone(),
            valid_domains,
            known_ids,
        }
    }

    /// Returns the full violation list for one document; empty means clean.
    pub fn validate(&self, doc: &NodeDoc) -> Vec<Violation> {
        let mut out = Vec::new();
        let schema = self.registry.schema_for(doc.kind);

        for field in &schema.required {
            if !doc.has_field(field) {
                out.push(Violation::error(
                    field,
                    format!("Missing required field: {}", field),
                ));
            }
        }

        if let Some(map) = doc.data.as_mapping() {
            for key in map.keys().filter_map(|k| k.as_str()) {
                if !schema.required.iter().any(|f| f.as_str() == key)
                    && !schema.optional.iter().any(|f| f.as_str() == key)
                {
                    out.push(Violation::warning(
                        key,
                        format!("Unknown field for {} nodes: {}", doc.kind, key),
                    ));
                }
            }
        }

        if !doc.id.starts_with(&schema.id_prefix) {
            out.push(Violation::error(
                "id",
                format!(
                    "{} ID must start with '{}', got: {}",
                    doc.kind, schema.id_prefix, doc.id
                ),
            ));
        }

        if let Some(pinned) = &schema.type_value {
            if let Some(ty) = doc.str_field("type") {
                if ty != pinned.as_str() {
                    out.push(Violation::error(
                        "type",
                        format!("{} type must be '{}', got: {}", doc.kind, pinned, ty),
                    ));
                }
            }
        }

        self.check_placement(doc, &mut out);
        self.check_self_reference(doc, &mut out);

        match doc.kind {
            NodeKind::Product => self.validate_product(doc, &mut out),
            NodeKind::Feature => self.validate_feature(doc, &mut out),
            NodeKind::Component => self.validate_component(doc, &mut out),
            NodeKind::Domain | NodeKind::Design | NodeKind::Substrate => {}
        }

        out
    }

    /// File name must equal the id; a file in the wrong subdirectory is a
    /// path-convention warning. The Product file is fixed at
    /// `product.yaml` and skips the name rule.
    fn check_placement(&self, doc: &NodeDoc, out: &mut Vec<Violation>) {
        if doc.is_virtual {
            return;
        }
        if doc.kind == NodeKind::Product {
            if !doc.source_file.ends_with("product.yaml") {
                out.push(Violation::warning(
                    "id",
                    format!("Product node should live at product.yaml, found {}", doc.source_file),
                ));
            }
            return;
        }

        let stem = doc
            .source_file
            .rsplit('/')
            .next()
            .and_then(|name| name.strip_suffix(".yaml"))
            .unwrap_or("");
        if stem != doc.id {
            out.push(Violation::error(
                "id",
                format!("File name '{}' does not match node id '{}'", stem, doc.id),
            ));
        }

        if let Some(subdir) = doc.kind.subdir() {
            let expected = format!("/{}/", subdir);
            if !doc.source_file.contains(&expected) {
                out.push(Violation::warning(
                    "id",
                    format!("{} files belong under {}/", doc.kind, subdir),
                ));
            }
        }
    }

    /// No node may list itself in any relation field.
    fn check_self_reference(&self, doc: &NodeDoc, out: &mut Vec<Violation>) {
        for field in ["depends_on", "realized_by", "dependencies", "consumes"] {
            if doc.id_list(field).iter().any(|t| t == &doc.id) {
                out.push(Violation::error(
                    field,
                    format!("Node '{}' lists itself in {}", doc.id, field),
                ));
            }
        }
    }

    fn validate_product(&self, doc: &NodeDoc, out: &mut Vec<Violation>) {
        let Some(domains) = doc.data.get("domains") else {
            return;
        };
        let Some(seq) = domains.as_sequence() else {
            out.push(Violation::error(
                "domains",
                "domains must be a list".to_string(),
            ));
            return;
        };
        for (i, dom) in seq.iter().enumerate() {
            if !dom.is_mapping() {
                out.push(Violation::error(
                    &format!("domains[{}]", i),
                    "Each domain must be a mapping".to_string(),
                ));
                continue;
            }
            for field in ["id", "name", "description"] {
                if dom.get(field).is_none() {
                    out.push(Violation::error(
                        &format!("domains[{}].{}", i, field),
                        format!("Domain missing required field: {}", field),
                    ));
                }
            }
            if let Some(id) = dom.get("id").and_then(|v| v.as_str()) {
                if !id.starts_with(NodeKind::Domain.prefix()) {
                    out.push(Violation::error(
                        &format!("domains[{}].id", i),
                        format!("Domain ID must start with 'dom_', got: {}", id),
                    ));
                }
            }
        }
    }

    fn validate_feature(&self, doc: &NodeDoc, out: &mut Vec<Violation>) {
        if let Some(domain) = doc.str_field("domain") {
            if !self.valid_domains.contains(domain) {
                out.push(Violation::error(
                    "domain",
                    format!(
                        "Domain '{}' not declared in product.yaml (known: {})",
                        domain,
                        self.valid_domains
                            .iter()
                            .cloned()
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                ));
            }
        }

        if let Some(anchor) = doc.str_field("source_anchor") {
            if !anchor.starts_with("PRD.md#") {
                out.push(Violation::warning(
                    "source_anchor",
                    format!("source_anchor should start with 'PRD.md#', got: {}", anchor),
                ));
            }
        }

        if doc.id_list("realized_by").is_empty() {
            out.push(Violation::warning(
                "realized_by",
                "No components assigned (realized_by is empty)".to_string(),
            ));
        }

        self.check_targets_exist(doc, "realized_by", out);
        self.check_targets_exist(doc, "depends_on", out);
    }

    fn validate_component(&self, doc: &NodeDoc, out: &mut Vec<Violation>) {
        match doc.data.get("design") {
            Some(design) if design.is_mapping() => {
                for field in ["api", "logic"] {
                    if design.get(field).is_none() {
                        out.push(Violation::error(
                            &format!("design.{}", field),
                            format!("design must contain '{}' field", field),
                        ));
                    }
                }
            }
            Some(_) => out.push(Violation::error(
                "design",
                "design must be a mapping".to_string(),
            )),
            None => {}
        }

        if let Some(file_path) = doc.str_field("file_path") {
            if file_path.is_empty() {
                out.push(Violation::error(
                    "file_path",
                    "file_path must not be empty".to_string(),
                ));
            } else if !file_path.ends_with('/')
                && !self.ws.project_root.join(file_path).exists()
            {
                out.push(Violation::warning(
                    "file_path",
                    format!("Bound file does not exist: {}", file_path),
                ));
            }
        } else if doc.has_field("file_path") {
            out.push(Violation::error(
                "file_path",
                "file_path must be a string".to_string(),
            ));
        }

        self.check_targets_exist(doc, "dependencies", out);
    }

    fn check_targets_exist(&self, doc: &NodeDoc, field: &str, out: &mut Vec<Violation>) {
        for target in doc.id_list(field) {
            if target == doc.id {
                continue; // already an error from the self-reference check
            }
            if !self.known_ids.contains(&target) {
                out.push(Violation::warning(
                    field,
                    format!("Reference to undefined node: {}", target),
                ));
            }
        }
    }
}

/// Scan the store and validate every node file.
///
/// Parse failures surface as invalid files with a single error
/// violation. Virtual domains are covered by the Product file's
/// `domains` structure check and do not count as files.
pub fn validate_store(
    ws: &Workspace,
    registry: &SchemaRegistry,
    outcome: &ScanOutcome,
) -> SchemaReport {
    let validator = NodeValidator::new(ws, registry, &outcome.docs);
    let mut report = SchemaReport::default();

    for issue in &outcome.issues {
        report.results.push(FileValidation {
            path: issue.path.clone(),
            node_id: String::new(),
            kind: "unknown".to_string(),
            violations: vec![Violation::error("", issue.detail.clone())],
        });
    }

    for doc in &outcome.docs {
        if doc.is_virtual {
            continue;
        }
        report.results.push(FileValidation {
            path: doc.source_file.clone(),
            node_id: doc.id.clone(),
            kind: doc.kind.to_string(),
            violations: validator.validate(doc),
        });
    }

    report
        .results
        .sort_by(|a, b| a.path.cmp(&b.path));
    report.total_files = report.results.len();
    for result in &report.results {
        if result.is_valid() {
            report.valid_count += 1;
        } else {
            report.invalid_count += 1;
        }
        if result.has_warnings() {
            report.warning_count += 1;
        }
    }
    report
}

/// Convenience wrapper: scan then validate in one call.
pub fn validate_all(ws: &Workspace, registry: &SchemaRegistry) -> Result<SchemaReport, SpecGraphError> {
    let store = NodeStore::new(ws);
    let outcome = store.scan(None)?;
    Ok(validate_store(ws, registry, &outcome))
}
