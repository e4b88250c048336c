//! Filesystem-backed store of typed node files.
//!
//! One YAML file per node under `.specgraph/`, discovered by walking the
//! spec directory. Domains are the exception: they are declared inline in
//! the Product file's `domains` list and surface here as *virtual* nodes
//! with a synthetic source path. The store is read-only from the core's
//! point of view; the graph database is a projection of it.
//!
//! Content hashes are computed over a canonical JSON encoding of the
//! parsed structure (object keys sorted recursively), so whitespace-only
//! reformats of a file do not register as changes.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::error::SpecGraphError;
use crate::core::meta_schema::{NodeKind, META_SCHEMA_ID};
use crate::core::store::{Workspace, RUNTIME_DIR_NAME};

/// A parsed node document plus its provenance.
#[derive(Debug, Clone)]
pub struct NodeDoc {
    pub id: String,
    pub kind: NodeKind,
    /// Source path relative to the project root. Virtual domains carry
    /// `".specgraph/product.yaml#domains"`.
    pub source_file: String,
    pub data: serde_yaml::Value,
    /// Raw file content; empty for virtual domains.
    pub raw: String,
    pub is_virtual: bool,
}

impl NodeDoc {
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.data.get(name).and_then(|v| v.as_str())
    }

    /// A field holding a list of identifiers; missing or non-list fields
    /// read as empty.
    pub fn id_list(&self, name: &str) -> Vec<String> {
        match self.data.get(name).and_then(|v| v.as_sequence()) {
            Some(seq) => seq
                .iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.data.get(name).is_some()
    }

    /// The node's display name: explicit `name`, else the id.
    pub fn name(&self) -> String {
        self.str_field("name").unwrap_or(&self.id).to_string()
    }

    pub fn description(&self) -> Option<String> {
        self.str_field("description")
            .or_else(|| self.str_field("desc"))
            .map(|s| s.to_string())
    }
}

/// A file the scanner could not turn into a node.
#[derive(Debug, Clone, Serialize)]
pub struct ParseIssue {
    pub path: String,
    pub detail: String,
}

/// Result of one filesystem walk: parsed docs plus per-file failures.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub docs: Vec<NodeDoc>,
    pub issues: Vec<ParseIssue>,
}

pub struct NodeStore {
    ws: Workspace,
}

impl NodeStore {
    pub fn new(ws: &Workspace) -> Self {
        Self { ws: ws.clone() }
    }

    /// Walk the spec directory and parse every node file, optionally
    /// filtered by kind. Deterministic: results are sorted by source
    /// path, then id. Rereads the filesystem on each call.
    pub fn scan(&self, kind: Option<NodeKind>) -> Result<ScanOutcome, SpecGraphError> {
        let spec_dir = self.ws.spec_dir();
        if !spec_dir.is_dir() {
            return Err(SpecGraphError::NotFound(format!(
                "spec directory not found: {}",
                spec_dir.display()
            )));
        }

        let mut outcome = ScanOutcome::default();
        let mut files = Vec::new();
        collect_yaml_files(&spec_dir, &mut files)?;
        files.sort();

        let meta_file = format!("{}.yaml", META_SCHEMA_ID);
        for path in files {
            if path.file_name().and_then(|s| s.to_str()) == Some(meta_file.as_str()) {
                continue;
            }
            match self.parse_file(&path) {
                Ok(doc) => {
                    if doc.kind == NodeKind::Product {
                        // Inline domains become virtual nodes next to
                        // their product.
                        let domains = extract_virtual_domains(&doc);
                        let keep_product = kind.is_none() || kind == Some(NodeKind::Product);
                        if keep_product {
                            outcome.docs.push(doc);
                        }
                        if kind.is_none() || kind == Some(NodeKind::Domain) {
                            outcome.docs.extend(domains);
                        }
                    } else if kind.is_none() || kind == Some(doc.kind) {
                        outcome.docs.push(doc);
                    }
                }
                Err(e) => outcome.issues.push(ParseIssue {
                    path: self.relative(&path),
                    detail: e.to_string(),
                }),
            }
        }

        outcome.docs.sort_by(|a, b| {
            (a.source_file.as_str(), a.id.as_str()).cmp(&(b.source_file.as_str(), b.id.as_str()))
        });
        Ok(outcome)
    }

    /// Single-node read by identifier.
    pub fn load(&self, id: &str) -> Result<Option<NodeDoc>, SpecGraphError> {
        let outcome = self.scan(NodeKind::from_id(id))?;
        Ok(outcome.docs.into_iter().find(|d| d.id == id))
    }

    /// Canonical content hash of one node file.
    pub fn content_hash(&self, path: &Path) -> Result<String, SpecGraphError> {
        let raw = fs::read_to_string(path).map_err(SpecGraphError::IoError)?;
        let value: serde_yaml::Value =
            serde_yaml::from_str(&raw).map_err(|e| SpecGraphError::ParseFailure {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;
        Ok(hash_yaml_value(&value))
    }

    fn parse_file(&self, path: &Path) -> Result<NodeDoc, SpecGraphError> {
        let raw = fs::read_to_string(path).map_err(SpecGraphError::IoError)?;
        let data: serde_yaml::Value =
            serde_yaml::from_str(&raw).map_err(|e| SpecGraphError::ParseFailure {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;

        if !data.is_mapping() {
            return Err(SpecGraphError::ParseFailure {
                path: path.to_path_buf(),
                detail: "document is not a mapping".to_string(),
            });
        }

        let id = data
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| SpecGraphError::ParseFailure {
                path: path.to_path_buf(),
                detail: "missing 'id' field".to_string(),
            })?
            .to_string();

        // The ID prefix decides the kind; Component files carry
        // `type: module`, so the explicit type field is only a fallback.
        let kind = NodeKind::from_id(&id)
            .or_else(|| {
                data.get("type")
                    .and_then(|v| v.as_str())
                    .and_then(NodeKind::from_str_name)
            })
            .ok_or_else(|| SpecGraphError::ParseFailure {
                path: path.to_path_buf(),
                detail: format!("cannot determine node kind for id '{}'", id),
            })?;

        Ok(NodeDoc {
            id,
            kind,
            source_file: self.relative(path),
            data,
            raw,
            is_virtual: false,
        })
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.ws.project_root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

fn collect_yaml_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), SpecGraphError> {
    for entry in fs::read_dir(dir).map_err(SpecGraphError::IoError)? {
        let entry = entry.map_err(SpecGraphError::IoError)?;
        let path = entry.path();
        if path.is_dir() {
            let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("");
            if name == RUNTIME_DIR_NAME || name.starts_with('.') {
                continue;
            }
            collect_yaml_files(&path, out)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some("yaml") {
            out.push(path);
        }
    }
    Ok(())
}

/// Inline `domains` entries of a Product doc, surfaced as virtual nodes.
pub fn extract_virtual_domains(product: &NodeDoc) -> Vec<NodeDoc> {
    let mut out = Vec::new();
    let Some(domains) = product.data.get("domains").and_then(|v| v.as_sequence()) else {
        return out;
    };
    for dom in domains {
        let Some(id) = dom.get("id").and_then(|v| v.as_str()) else {
            continue;
        };
        out.push(NodeDoc {
            id: id.to_string(),
            kind: NodeKind::Domain,
            source_file: format!("{}#domains", product.source_file),
            data: dom.clone(),
            raw: String::new(),
            is_virtual: true,
        });
    }
    out
}

/// Hash the canonical JSON encoding of a parsed YAML value.
pub fn hash_yaml_value(value: &serde_yaml::Value) -> String {
    let canonical = canonical_json(value);
    let encoded = serde_json::to_string(&canonical).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(encoded.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Normalise a YAML value into JSON with recursively sorted object keys,
/// so the hash sees structure rather than formatting.
pub fn canonical_json(value: &serde_yaml::Value) -> serde_json::Value {
    use serde_json::Value as J;
    use serde_yaml::Value as Y;

    match value {
        Y::Null => J::Null,
        Y::Bool(b) => J::Bool(*b),
        Y::Number(n) => {
            if let Some(i) = n.as_i64() {
                J::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                J::Number(u.into())
            } else {
                serde_json::Number::from_f64(n.as_f64().unwrap_or(0.0))
                    .map(J::Number)
                    .unwrap_or(J::Null)
            }
        }
        Y::String(s) => J::String(s.clone()),
        Y::Sequence(seq) => J::Array(seq.iter().map(canonical_json).collect()),
        Y::Mapping(map) => {
            let mut entries: Vec<(String, J)> = map
                .iter()
                .map(|(k, v)| (yaml_key_string(k), canonical_json(v)))
                .collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut obj = serde_json::Map::new();
            for (k, v) in entries {
                obj.insert(k, v);
            }
            J::Object(obj)
        }
        Y::Tagged(tagged) => canonical_json(&tagged.value),
    }
}

fn yaml_key_string(key: &serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s.clone(),
        other => serde_json::to_string(&canonical_json(other)).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_ignores_formatting_but_not_content() {
        let a: serde_yaml::Value =
            serde_yaml::from_str("id: feat_x\nintent: scan files\n").unwrap();
        let b: serde_yaml::Value =
            serde_yaml::from_str("intent:   scan files\nid:    feat_x").unwrap();
        let c: serde_yaml::Value =
            serde_yaml::from_str("id: feat_x\nintent: scan dirs\n").unwrap();
        assert_eq!(hash_yaml_value(&a), hash_yaml_value(&b));
        assert_ne!(hash_yaml_value(&a), hash_yaml_value(&c));
    }

    #[test]
    fn hash_survives_reserialisation() {
        let a: serde_yaml::Value =
            serde_yaml::from_str("id: comp_x\ndesign:\n  api: f()\n  logic: loop\n").unwrap();
        let text = serde_yaml::to_string(&a).unwrap();
        let b: serde_yaml::Value = serde_yaml::from_str(&text).unwrap();
        assert_eq!(hash_yaml_value(&a), hash_yaml_value(&b));
    }
}
