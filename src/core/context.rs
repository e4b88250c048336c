//! Phase-scoped context assembly for a downstream AI agent.
//!
//! Given a task phase and an optional focus, project the smallest
//! closed node set sufficient for that phase out of the graph database.
//! The assembler is a pure reader: it opens no write transaction and
//! returns a deterministic, canonically ordered structure the CLI can
//! serialise for the agent.
//!
//! Phases:
//! - `understanding`: the Product node alone
//! - `locating`: Product plus Feature briefs, optionally one Domain's
//! - `evaluating`: one Feature with its Components' full design bodies
//! - `planning`: the topologically sorted `depends_on` closure of the
//!   focus, restricted to the focus's kind

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::core::error::SpecGraphError;
use crate::core::graph::{GraphDb, NodeRow};
use crate::core::meta_schema::NodeKind;
use crate::core::node_store::canonical_json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Understanding,
    Locating,
    Evaluating,
    Planning,
}

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::Understanding,
        Phase::Locating,
        Phase::Evaluating,
        Phase::Planning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Understanding => "understanding",
            Phase::Locating => "locating",
            Phase::Evaluating => "evaluating",
            Phase::Planning => "planning",
        }
    }

    pub fn parse(name: &str) -> Option<Phase> {
        Phase::ALL.into_iter().find(|p| p.as_str() == name)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DomainSummary {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductSummary {
    pub id: String,
    pub name: String,
    pub vision: Option<String>,
    pub description: Option<String>,
    pub domains: Vec<DomainSummary>,
}

/// The reduced Feature shape used by the locating phase.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureBrief {
    pub id: String,
    pub intent: Option<String>,
    pub realized_by: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureDetail {
    pub id: String,
    pub name: String,
    pub intent: Option<String>,
    pub domain: Option<String>,
    pub user_stories: Vec<String>,
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentDetail {
    pub id: String,
    pub desc: Option<String>,
    pub file_path: Option<String>,
    /// Full `design` body from the node payload.
    pub design: serde_json::Value,
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ContextBundle {
    Understanding {
        product: ProductSummary,
    },
    Locating {
        product: ProductSummary,
        domain: Option<String>,
        features: Vec<FeatureBrief>,
    },
    Evaluating {
        feature: FeatureDetail,
        components: Vec<ComponentDetail>,
    },
    Planning {
        kind: String,
        /// Dependencies first, focus last.
        order: Vec<String>,
    },
}

/// Assemble the minimal context for one phase.
pub fn assemble(
    db: &GraphDb,
    phase: Phase,
    focus: Option<&str>,
    domain: Option<&str>,
) -> Result<ContextBundle, SpecGraphError> {
    match phase {
        Phase::Understanding => Ok(ContextBundle::Understanding {
            product: product_summary(db)?,
        }),
        Phase::Locating => assemble_locating(db, domain),
        Phase::Evaluating => {
            let focus = require_focus(phase, focus)?;
            assemble_evaluating(db, focus)
        }
        Phase::Planning => {
            let focus = require_focus(phase, focus)?;
            assemble_planning(db, focus)
        }
    }
}

fn require_focus<'a>(phase: Phase, focus: Option<&'a str>) -> Result<&'a str, SpecGraphError> {
    focus.ok_or_else(|| SpecGraphError::PhaseArgumentMissing {
        phase: phase.to_string(),
        arg: "focus".to_string(),
    })
}

fn product_summary(db: &GraphDb) -> Result<ProductSummary, SpecGraphError> {
    let products = db.nodes_by_kind(NodeKind::Product)?;
    let product = products.first().ok_or_else(|| {
        SpecGraphError::NotFound("no product node in the graph; run `specgraph sync`".to_string())
    })?;

    let payload = parse_payload(product);
    let domains = payload
        .get("domains")
        .and_then(|v| v.as_sequence())
        .map(|seq| {
            seq.iter()
                .filter_map(|d| {
                    let id = d.get("id").and_then(|v| v.as_str())?;
                    Some(DomainSummary {
                        id: id.to_string(),
                        name: d
                            .get("name")
                            .and_then(|v| v.as_str())
                            .unwrap_or(id)
                            .to_string(),
                        description: d
                            .get("description")
                            .and_then(|v| v.as_str())
                            .map(|s| s.to_string()),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(ProductSummary {
        id: product.id.clone(),
        name: product.name.clone(),
        vision: payload
            .get("vision")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        description: product.description.clone(),
        domains,
    })
}

fn assemble_locating(
    db: &GraphDb,
    domain: Option<&str>,
) -> Result<ContextBundle, SpecGraphError> {
    let product = product_summary(db)?;

    let feature_rows: Vec<NodeRow> = match domain {
        Some(dom) => {
            if db.get_node(dom)?.is_none() {
                return Err(SpecGraphError::UnknownNode {
                    id: dom.to_string(),
                    phase: Phase::Locating.to_string(),
                });
            }
            let mut rows = Vec::new();
            for edge in db.edges_from(dom, Some("owns"))? {
                if let Some(row) = db.get_node(&edge.target_id)? {
                    rows.push(row);
                }
            }
            rows
        }
        None => db.nodes_by_kind(NodeKind::Feature)?,
    };

    let mut features: Vec<FeatureBrief> = feature_rows
        .iter()
        .map(|row| {
            let payload = parse_payload(row);
            FeatureBrief {
                id: row.id.clone(),
                intent: row.intent.clone(),
                realized_by: string_list(&payload, "realized_by"),
            }
        })
        .collect();
    features.sort_by(|a, b| a.id.cmp(&b.id));

    Ok(ContextBundle::Locating {
        product,
        domain: domain.map(|s| s.to_string()),
        features,
    })
}

fn assemble_evaluating(db: &GraphDb, focus: &str) -> Result<ContextBundle, SpecGraphError> {
    let feature = db.get_node(focus)?.ok_or_else(|| SpecGraphError::UnknownNode {
        id: focus.to_string(),
        phase: Phase::Evaluating.to_string(),
    })?;
    if feature.kind != NodeKind::Feature.as_str() {
        return Err(SpecGraphError::ValidationError(format!(
            "evaluating expects a feature focus, '{}' is a {}",
            focus, feature.kind
        )));
    }

    let payload = parse_payload(&feature);
    let domain = db
        .edges_to(focus, Some("owns"))?
        .first()
        .map(|e| e.source_id.clone());

    let detail = FeatureDetail {
        id: feature.id.clone(),
        name: feature.name.clone(),
        intent: feature.intent.clone(),
        domain,
        user_stories: string_list(&payload, "user_stories"),
        depends_on: string_list(&payload, "depends_on"),
    };

    // Components in realized_by, plus their dependencies one hop out.
    let mut wanted: BTreeSet<String> = BTreeSet::new();
    let direct: Vec<String> = db
        .edges_from(focus, Some("realized_by"))?
        .into_iter()
        .map(|e| e.target_id)
        .collect();
    wanted.extend(direct.iter().cloned());
    for comp_id in &direct {
        for edge in db.edges_from(comp_id, Some("depends_on"))? {
            wanted.insert(edge.target_id);
        }
    }

    let mut components = Vec::new();
    for id in &wanted {
        let Some(row) = db.get_node(id)? else { continue };
        if row.kind != NodeKind::Component.as_str() {
            continue;
        }
        let payload = parse_payload(&row);
        components.push(ComponentDetail {
            id: row.id.clone(),
            desc: row.description.clone(),
            file_path: row.file_path.clone(),
            design: payload
                .get("design")
                .map(canonical_json)
                .unwrap_or(serde_json::Value::Null),
            dependencies: string_list(&payload, "dependencies"),
        });
    }

    Ok(ContextBundle::Evaluating {
        feature: detail,
        components,
    })
}

fn assemble_planning(db: &GraphDb, focus: &str) -> Result<ContextBundle, SpecGraphError> {
    let node = db.get_node(focus)?.ok_or_else(|| SpecGraphError::UnknownNode {
        id: focus.to_string(),
        phase: Phase::Planning.to_string(),
    })?;
    let kind = match node.kind.as_str() {
        "feature" => NodeKind::Feature,
        "component" => NodeKind::Component,
        other => {
            return Err(SpecGraphError::ValidationError(format!(
                "planning expects a feature or component focus, '{}' is a {}",
                focus, other
            )))
        }
    };

    let closure = db.depends_on_closure(focus, kind)?;
    let order = topological_order(&closure, kind)?;

    Ok(ContextBundle::Planning {
        kind: kind.to_string(),
        order,
    })
}

/// Kahn's algorithm over the dependency adjacency, emitting dependencies
/// before dependents and breaking ties by id, so the output is total and
/// deterministic. A cycle leaves unplaceable nodes behind and is an error.
fn topological_order(
    closure: &BTreeMap<String, Vec<String>>,
    kind: NodeKind,
) -> Result<Vec<String>, SpecGraphError> {
    let mut remaining: BTreeMap<&str, BTreeSet<&str>> = closure
        .iter()
        .map(|(id, deps)| (id.as_str(), deps.iter().map(|d| d.as_str()).collect()))
        .collect();
    let mut order = Vec::new();

    while !remaining.is_empty() {
        // BTreeMap iteration is sorted, so the first ready node is the
        // smallest id.
        let ready = remaining
            .iter()
            .find(|(_, deps)| deps.is_empty())
            .map(|(id, _)| *id);
        let Some(next) = ready else {
            return Err(SpecGraphError::CycleDetected {
                kind: kind.to_string(),
                cycle: extract_cycle(&remaining),
            });
        };
        remaining.remove(next);
        for deps in remaining.values_mut() {
            deps.remove(next);
        }
        order.push(next.to_string());
    }

    Ok(order)
}

/// Walk first-dependency links among the stuck nodes until one repeats.
fn extract_cycle(remaining: &BTreeMap<&str, BTreeSet<&str>>) -> Vec<String> {
    let Some(start) = remaining.keys().next() else {
        return Vec::new();
    };
    let mut path: Vec<&str> = vec![*start];
    let mut seen: BTreeSet<&str> = BTreeSet::from([*start]);
    let mut current = *start;
    loop {
        let Some(next) = remaining
            .get(current)
            .and_then(|deps| deps.iter().next())
            .copied()
        else {
            break;
        };
        if seen.contains(next) {
            let from = path.iter().position(|&p| p == next).unwrap_or(0);
            let mut cycle: Vec<String> = path[from..].iter().map(|s| s.to_string()).collect();
            cycle.push(next.to_string());
            return cycle;
        }
        seen.insert(next);
        path.push(next);
        current = next;
    }
    path.iter().map(|s| s.to_string()).collect()
}

fn parse_payload(row: &NodeRow) -> serde_yaml::Value {
    row.raw_payload
        .as_deref()
        .and_then(|raw| serde_yaml::from_str(raw).ok())
        .unwrap_or(serde_yaml::Value::Null)
}

fn string_list(payload: &serde_yaml::Value, field: &str) -> Vec<String> {
    payload
        .get(field)
        .and_then(|v| v.as_sequence())
        .map(|seq| {
            seq.iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default()
}
