//! Structural validation of the prose requirements document.
//!
//! Checks the PRD's chapter skeleton, anchor format and naming, and
//! heading hierarchy: one H1, Domains at H2, Features at H3, Components
//! as bullets. Formatting-level problems are warnings; missing
//! mandatory sections, malformed anchors, and duplicate anchors are
//! errors.

use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use crate::core::error::SpecGraphError;
use crate::core::meta_schema::NodeKind;
use crate::core::prose::ProseIndex;

static ANCHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<!--\s*id:\s*(\w+)\s*-->").unwrap());
static SNAKE_CASE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").unwrap());

const MANDATORY_SECTIONS: [&str; 3] = ["Product Vision", "Design Principles", "Domain:"];

/// Outcome of one `validate-prd` run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PrdReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl PrdReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate the PRD at `path`. A missing document is a hard error.
pub fn validate_prd(path: &Path) -> Result<PrdReport, SpecGraphError> {
    if !path.exists() {
        return Err(SpecGraphError::NotFound(format!(
            "PRD not found: {}",
            path.display()
        )));
    }
    let content = fs::read_to_string(path).map_err(SpecGraphError::IoError)?;
    Ok(validate_prd_str(&content))
}

pub fn validate_prd_str(content: &str) -> PrdReport {
    let mut report = PrdReport::default();

    for section in MANDATORY_SECTIONS {
        if !content.contains(section) {
            report
                .errors
                .push(format!("Missing mandatory section: {}", section));
        }
    }

    check_anchor_format(content, &mut report);
    check_anchor_naming(content, &mut report);
    check_heading_hierarchy(content, &mut report);
    check_anchor_levels(content, &mut report);

    for id in &ProseIndex::parse_str(content).duplicates {
        report
            .errors
            .push(format!("Duplicate anchor for id '{}'", id));
    }

    report
}

/// A line ending in `-->` is meant to be an anchor; flag it when the
/// comment does not parse, and when it sits outside a heading or bullet.
fn check_anchor_format(content: &str, report: &mut PrdReport) {
    for (line_no, line) in content.lines().enumerate() {
        let stripped = line.trim();

        // Skip code fences and inline format documentation.
        if stripped.starts_with('`') || line.contains(": `") {
            continue;
        }
        if !stripped.ends_with("-->") {
            continue;
        }

        if !ANCHOR_RE.is_match(line) {
            report.errors.push(format!(
                "Invalid anchor format at line {}: {}",
                line_no + 1,
                stripped
            ));
            continue;
        }

        if !stripped.starts_with('#') && !stripped.starts_with('-') && !stripped.starts_with('*') {
            report.warnings.push(format!(
                "Anchor at line {} is not on a heading or list item",
                line_no + 1
            ));
        }
    }
}

fn check_anchor_naming(content: &str, report: &mut PrdReport) {
    for cap in ANCHOR_RE.captures_iter(content) {
        let anchor = &cap[1];
        if NodeKind::from_id(anchor).is_none() {
            report.warnings.push(format!(
                "Anchor '{}' does not use a valid prefix (expected one of: {})",
                anchor,
                NodeKind::ALL
                    .iter()
                    .map(|k| k.prefix())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
            continue;
        }
        if !SNAKE_CASE_RE.is_match(anchor) {
            report
                .warnings
                .push(format!("Anchor '{}' is not in snake_case format", anchor));
        }
    }
}

/// An anchored heading's level must match the kind its prefix implies:
/// Product at H1 or H2, Domain at H2, Feature at H3. Components are
/// expected as bullets, so a component anchor on a heading is flagged.
fn check_anchor_levels(content: &str, report: &mut PrdReport) {
    let index = ProseIndex::parse_str(content);
    for anchor in index.anchors() {
        let Some(kind) = NodeKind::from_id(&anchor.id) else {
            continue;
        };
        let level = match anchor.placement {
            crate::core::prose::AnchorPlacement::Heading(level) => level,
            crate::core::prose::AnchorPlacement::Bullet => {
                if kind != NodeKind::Component {
                    report.warnings.push(format!(
                        "{} anchor '{}' at line {} should be on a heading, not a bullet",
                        kind, anchor.id, anchor.line
                    ));
                }
                continue;
            }
        };
        let ok = match kind {
            NodeKind::Product => level <= 2,
            NodeKind::Domain => level == 2,
            NodeKind::Feature => level == 3,
            NodeKind::Component => false,
            NodeKind::Design | NodeKind::Substrate => true,
        };
        if !ok {
            report.warnings.push(format!(
                "{} anchor '{}' at line {} sits at H{}",
                kind, anchor.id, anchor.line, level
            ));
        }
    }
}

fn check_heading_hierarchy(content: &str, report: &mut PrdReport) {
    let mut h1_count = 0;

    for (line_no, line) in content.lines().enumerate() {
        let stripped = line.trim();

        if stripped.starts_with("# ") {
            h1_count += 1;
            if h1_count > 1 {
                report
                    .warnings
                    .push(format!("Multiple H1 headings found at line {}", line_no + 1));
            }
        }

        if stripped.starts_with('#') && stripped.contains("Domain:") && !stripped.starts_with("## ")
        {
            report
                .warnings
                .push(format!("Domain at line {} should be H2 (##)", line_no + 1));
        }

        if stripped.starts_with('#')
            && stripped.contains("Feature:")
            && !stripped.starts_with("### ")
        {
            report
                .warnings
                .push(format!("Feature at line {} should be H3 (###)", line_no + 1));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = "\
# Product Vision <!-- id: prod_demo -->

## Design Principles

## Domain: Core <!-- id: dom_core -->

### Feature: Scan <!-- id: feat_scan -->

- Scanner <!-- id: comp_scanner -->
";

    #[test]
    fn valid_prd_passes() {
        let report = validate_prd_str(GOOD);
        assert!(report.is_valid(), "errors: {:?}", report.errors);
    }

    #[test]
    fn missing_sections_are_errors() {
        let report = validate_prd_str("# Something else\n");
        assert_eq!(report.errors.len(), 3);
    }

    #[test]
    fn wrong_heading_levels_warn() {
        let doc = "\
# Product Vision
## Design Principles
### Domain: Core <!-- id: dom_core -->
## Feature: Scan <!-- id: feat_scan -->
";
        let report = validate_prd_str(doc);
        assert!(report
            .warnings
            .iter()
            .any(|w| w.contains("Domain at line 3")));
        assert!(report
            .warnings
            .iter()
            .any(|w| w.contains("Feature at line 4")));
    }

    #[test]
    fn malformed_anchor_is_error() {
        let doc = "# Product Vision\n## Design Principles\n## Domain: X <!-- feat_bad -->\n";
        let report = validate_prd_str(doc);
        assert!(report
            .errors
            .iter()
            .any(|e| e.contains("Invalid anchor format")));
    }
}
