//! Schema registry loaded from the meta-schema node file.
//!
//! `substrate/sub_meta_schema.yaml` is the grammar of the node store:
//! for each node kind it declares the required and optional fields, the
//! ID prefix, the path convention, and (where applicable) the fixed
//! `type` value. The file itself is exempt from validation - it is the
//! grammar, not a sentence in it - and it is the only such exemption.
//!
//! If the file is absent or malformed every downstream operation fails
//! with `MetaSchemaUnavailable`. There is no built-in fallback: a
//! default grammar would silently relax every validation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;

use crate::core::error::SpecGraphError;
use crate::core::store::Workspace;

/// Identifier of the meta-schema node; its file is skipped by every scan.
pub const META_SCHEMA_ID: &str = "sub_meta_schema";

/// The six node kinds of the spec graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Product,
    Domain,
    Feature,
    Component,
    Design,
    Substrate,
}

impl NodeKind {
    pub const ALL: [NodeKind; 6] = [
        NodeKind::Product,
        NodeKind::Domain,
        NodeKind::Feature,
        NodeKind::Component,
        NodeKind::Design,
        NodeKind::Substrate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Product => "product",
            NodeKind::Domain => "domain",
            NodeKind::Feature => "feature",
            NodeKind::Component => "component",
            NodeKind::Design => "design",
            NodeKind::Substrate => "substrate",
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            NodeKind::Product => "prod_",
            NodeKind::Domain => "dom_",
            NodeKind::Feature => "feat_",
            NodeKind::Component => "comp_",
            NodeKind::Design => "des_",
            NodeKind::Substrate => "sub_",
        }
    }

    /// Infer a kind from an identifier's prefix.
    pub fn from_id(id: &str) -> Option<NodeKind> {
        NodeKind::ALL.into_iter().find(|k| id.starts_with(k.prefix()))
    }

    pub fn from_str_name(name: &str) -> Option<NodeKind> {
        NodeKind::ALL.into_iter().find(|k| k.as_str() == name)
    }

    /// Subdirectory of the spec dir holding this kind's files, if the
    /// kind is file-backed (Product is the root file; Domains are inline).
    pub fn subdir(&self) -> Option<&'static str> {
        match self {
            NodeKind::Product | NodeKind::Domain => None,
            NodeKind::Feature => Some("features"),
            NodeKind::Component => Some("components"),
            NodeKind::Design => Some("design"),
            NodeKind::Substrate => Some("substrate"),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schema descriptor for one node kind, as declared by the meta-schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KindSchema {
    pub id_prefix: String,
    pub path_pattern: String,
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub optional: Vec<String>,
    /// Fixed value the `type` field must carry, when the kind pins one
    /// (e.g. Components declare `type: module`).
    #[serde(default)]
    pub type_value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MetaSchemaDoc {
    id: String,
    #[serde(default)]
    kinds: BTreeMap<String, KindSchema>,
}

/// Mapping from node kind to its schema descriptor.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    kinds: BTreeMap<NodeKind, KindSchema>,
}

impl SchemaRegistry {
    /// Load the registry from `substrate/sub_meta_schema.yaml`.
    pub fn load(ws: &Workspace) -> Result<Self, SpecGraphError> {
        let path = ws.meta_schema_path();
        let raw = fs::read_to_string(&path).map_err(|e| {
            SpecGraphError::MetaSchemaUnavailable(format!("{}: {}", path.display(), e))
        })?;
        let doc: MetaSchemaDoc = serde_yaml::from_str(&raw).map_err(|e| {
            SpecGraphError::MetaSchemaUnavailable(format!("{}: {}", path.display(), e))
        })?;
        if doc.id != META_SCHEMA_ID {
            return Err(SpecGraphError::MetaSchemaUnavailable(format!(
                "expected id '{}', found '{}'",
                META_SCHEMA_ID, doc.id
            )));
        }

        let mut kinds = BTreeMap::new();
        for (name, schema) in doc.kinds {
            let kind = NodeKind::from_str_name(&name).ok_or_else(|| {
                SpecGraphError::MetaSchemaUnavailable(format!("unknown node kind '{}'", name))
            })?;
            kinds.insert(kind, schema);
        }

        for kind in NodeKind::ALL {
            if !kinds.contains_key(&kind) {
                return Err(SpecGraphError::MetaSchemaUnavailable(format!(
                    "kind '{}' missing from meta-schema",
                    kind
                )));
            }
        }

        Ok(Self { kinds })
    }

    pub fn schema_for(&self, kind: NodeKind) -> &KindSchema {
        // Presence of all six kinds is checked at load time.
        &self.kinds[&kind]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_id_prefix() {
        assert_eq!(NodeKind::from_id("feat_scan"), Some(NodeKind::Feature));
        assert_eq!(NodeKind::from_id("comp_scanner"), Some(NodeKind::Component));
        assert_eq!(NodeKind::from_id("sub_meta_schema"), Some(NodeKind::Substrate));
        assert_eq!(NodeKind::from_id("widget_x"), None);
    }

    #[test]
    fn kind_roundtrips_through_name() {
        for kind in NodeKind::ALL {
            assert_eq!(NodeKind::from_str_name(kind.as_str()), Some(kind));
        }
    }
}
