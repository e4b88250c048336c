//! Anchor index over the prose requirements document.
//!
//! PRD.md carries the human-authored intent. Structural sections are
//! anchored to graph identifiers with a trailing HTML comment:
//!
//! ```markdown
//! ## Domain: Core Engine <!-- id: dom_core -->
//! ### Feature: Scan <!-- id: feat_scan -->
//! - Scanner module <!-- id: comp_scanner -->
//! ```
//!
//! Anchors are recognised on heading lines and on list-item lines
//! (components are anchored as bullets under their Feature's
//! subsection); anchors in running prose are ignored. Duplicate anchors
//! for the same id violate the single-definition rule and surface as
//! index errors.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use crate::core::error::SpecGraphError;
use crate::core::meta_schema::NodeKind;

static ANCHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<!--\s*id:\s*([A-Za-z0-9_]+)\s*-->").unwrap());
static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(#+)\s+(.*)").unwrap());
static BULLET_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*[-*]\s+(.*)").unwrap());

/// Where an anchor sits in the document structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AnchorPlacement {
    /// On a `#`-heading; carries the raw heading level.
    Heading(u8),
    /// On a list item under some section.
    Bullet,
}

/// One anchored occurrence of a node identifier in prose.
#[derive(Debug, Clone, Serialize)]
pub struct Anchor {
    pub id: String,
    pub placement: AnchorPlacement,
    /// Heading or bullet text with the anchor comment stripped.
    pub text: String,
    /// 1-based line number.
    pub line: usize,
    pub byte_start: usize,
    pub byte_end: usize,
}

/// Parsed anchor index for one prose document, in document order.
#[derive(Debug, Clone, Default)]
pub struct ProseIndex {
    anchors: Vec<Anchor>,
    by_id: BTreeMap<String, usize>,
    /// Ids anchored more than once; each is an error.
    pub duplicates: Vec<String>,
}

impl ProseIndex {
    /// Parse the prose document at `path`. A missing document is a hard
    /// error: the monitor cannot reconcile intent it cannot read.
    pub fn parse(path: &Path) -> Result<Self, SpecGraphError> {
        if !path.exists() {
            return Err(SpecGraphError::NotFound(format!(
                "prose document not found: {}",
                path.display()
            )));
        }
        let content = fs::read_to_string(path).map_err(SpecGraphError::IoError)?;
        Ok(Self::parse_str(&content))
    }

    pub fn parse_str(content: &str) -> Self {
        let mut index = ProseIndex::default();
        let mut offset = 0usize;

        for (line_no, line) in content.lines().enumerate() {
            let line_len = line.len();
            if let Some(cap) = ANCHOR_RE.captures(line) {
                let placement = if let Some(h) = HEADING_RE.captures(line) {
                    Some(AnchorPlacement::Heading(h[1].len() as u8))
                } else if BULLET_RE.is_match(line) {
                    Some(AnchorPlacement::Bullet)
                } else {
                    None
                };

                if let Some(placement) = placement {
                    let id = cap[1].to_string();
                    let stripped = ANCHOR_RE.replace(line, "");
                    let text = stripped
                        .trim()
                        .trim_start_matches('#')
                        .trim()
                        .trim_start_matches(['-', '*'])
                        .trim()
                        .to_string();
                    let m = cap.get(0).map(|m| m.range()).unwrap_or(0..0);

                    if index.by_id.contains_key(&id) {
                        if !index.duplicates.contains(&id) {
                            index.duplicates.push(id.clone());
                        }
                    } else {
                        index.by_id.insert(id.clone(), index.anchors.len());
                    }
                    index.anchors.push(Anchor {
                        id,
                        placement,
                        text,
                        line: line_no + 1,
                        byte_start: offset + m.start,
                        byte_end: offset + m.end,
                    });
                }
            }
            offset += line_len + 1;
        }

        index
    }

    /// Restartable iteration over anchors in document order.
    pub fn anchors(&self) -> impl Iterator<Item = &Anchor> {
        self.anchors.iter()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Anchor> {
        self.by_id.get(id).map(|&i| &self.anchors[i])
    }

    /// Kind implied by an anchored identifier's prefix.
    pub fn anchor_kind(id: &str) -> Option<NodeKind> {
        NodeKind::from_id(id)
    }

    /// Raw heading level of the first anchor for `id`; `None` for
    /// bullet anchors and unknown ids.
    pub fn heading_level_for(&self, id: &str) -> Option<u8> {
        match self.get(id)?.placement {
            AnchorPlacement::Heading(level) => Some(level),
            AnchorPlacement::Bullet => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "\
# Product Vision <!-- id: prod_demo -->

## Domain: Core <!-- id: dom_core -->

### Feature: Scan <!-- id: feat_scan -->

Body text with a stray <!-- id: feat_ignored --> anchor.

- Scanner module <!-- id: comp_scanner -->
";

    #[test]
    fn headings_and_bullets_are_indexed_prose_is_not() {
        let index = ProseIndex::parse_str(DOC);
        assert!(index.contains("prod_demo"));
        assert!(index.contains("dom_core"));
        assert!(index.contains("feat_scan"));
        assert!(index.contains("comp_scanner"));
        assert!(!index.contains("feat_ignored"));
        assert_eq!(index.heading_level_for("dom_core"), Some(2));
        assert_eq!(index.heading_level_for("feat_scan"), Some(3));
        assert_eq!(index.heading_level_for("comp_scanner"), None);
    }

    #[test]
    fn whitespace_tolerant_inside_comment() {
        let index = ProseIndex::parse_str("## X <!--id:dom_x-->\n### Y <!--   id:  feat_y   -->\n");
        assert!(index.contains("dom_x"));
        assert!(index.contains("feat_y"));
    }

    #[test]
    fn duplicate_anchor_is_reported() {
        let doc = "## A <!-- id: dom_a -->\n## A again <!-- id: dom_a -->\n";
        let index = ProseIndex::parse_str(doc);
        assert_eq!(index.duplicates, vec!["dom_a".to_string()]);
    }

    #[test]
    fn anchor_text_strips_markup() {
        let index = ProseIndex::parse_str("### Feature: Scan <!-- id: feat_scan -->\n");
        assert_eq!(index.get("feat_scan").unwrap().text, "Feature: Scan");
    }
}
