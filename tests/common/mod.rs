//! Shared project fixtures for the integration tests.
#![allow(dead_code)]

use std::fs;
use std::path::Path;
use tempfile::TempDir;

use specgraph::core::store::Workspace;

pub const META_SCHEMA: &str = specgraph::core::assets::META_SCHEMA_TEMPLATE;

pub struct Fixture {
    pub tmp: TempDir,
    pub ws: Workspace,
}

impl Fixture {
    /// Empty project skeleton with the default grammar in place.
    pub fn empty() -> Self {
        let tmp = TempDir::new().expect("tempdir");
        let ws = Workspace::new(tmp.path());
        for sub in ["features", "components", "design", "substrate"] {
            fs::create_dir_all(ws.spec_dir().join(sub)).expect("mkdir");
        }
        fs::write(ws.meta_schema_path(), META_SCHEMA).expect("write meta schema");
        Self { tmp, ws }
    }

    /// The two-domain happy-path project: one feature realized by one
    /// component, everything anchored in the PRD.
    pub fn standard() -> Self {
        let fx = Self::empty();
        fx.write_spec("product.yaml", PRODUCT);
        fx.write_spec("features/feat_scan.yaml", FEAT_SCAN);
        fx.write_spec("components/comp_scanner.yaml", COMP_SCANNER);
        fx.write_root("PRD.md", PRD);
        fx.write_root("src/scanner.rs", "// scanner lives here\n");
        fx
    }

    /// Write a file under `.specgraph/`.
    pub fn write_spec(&self, rel: &str, content: &str) {
        let path = self.ws.spec_dir().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(path, content).expect("write spec file");
    }

    /// Write a file under the project root.
    pub fn write_root(&self, rel: &str, content: &str) {
        let path = self.ws.project_root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(path, content).expect("write project file");
    }

    pub fn remove_spec(&self, rel: &str) {
        fs::remove_file(self.ws.spec_dir().join(rel)).expect("remove spec file");
    }

    pub fn spec_path(&self, rel: &str) -> std::path::PathBuf {
        Path::new(".specgraph").join(rel)
    }
}

pub const PRODUCT: &str = "\
id: prod_demo
name: Demo
version: 0.1.0
description: Demo product for the graph core.
vision: Every requirement is traceable to a typed node.
domains:
  - id: dom_core
    name: Core
    description: Scanning and indexing engine.
    exports:
      - name: scan_tree
        signature: scan_tree(root) -> Report
        description: Walk the spec tree and report changes.
  - id: dom_cli
    name: CLI
    description: Command shell.
";

pub const FEAT_SCAN: &str = "\
id: feat_scan
domain: dom_core
source_anchor: PRD.md#feat_scan
intent: Scan the node tree for changes.
realized_by: [comp_scanner]
";

pub const COMP_SCANNER: &str = "\
id: comp_scanner
type: module
desc: Walks the spec tree.
file_path: src/scanner.rs
design:
  api: scan(root) -> Vec<Node>
  logic: Recursive directory walk with sorted output.
";

pub const PRD: &str = "\
# Product Vision <!-- id: prod_demo -->

Demo product prose.

## Design Principles

## Domain: Core <!-- id: dom_core -->

### Feature: Scan <!-- id: feat_scan -->

- Scanner module <!-- id: comp_scanner -->

## Domain: CLI <!-- id: dom_cli -->
";
