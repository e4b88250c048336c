//! Workspace layout and project-root discovery.
//!
//! A SpecGraph project is any directory containing a `.specgraph/`
//! directory. Node files live under fixed subdirectories of it; the
//! derived database sits in `.specgraph/.runtime/`, which is expected
//! to be excluded from version control.

use std::path::{Path, PathBuf};

use crate::core::error::SpecGraphError;
use crate::core::schemas::GRAPH_DB_NAME;

/// Directory holding all typed node files, relative to the project root.
pub const SPEC_DIR_NAME: &str = ".specgraph";
/// Runtime directory for derived state; never scanned as node input.
pub const RUNTIME_DIR_NAME: &str = ".runtime";
/// Prose requirements document, relative to the project root.
pub const PRD_FILE_NAME: &str = "PRD.md";

/// Resolved paths for one SpecGraph project.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub project_root: PathBuf,
}

impl Workspace {
    pub fn new(project_root: &Path) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
        }
    }

    /// Walk up from `start_dir` until a `.specgraph/` directory is found.
    pub fn discover(start_dir: &Path) -> Result<Self, SpecGraphError> {
        let mut current = start_dir.to_path_buf();
        loop {
            if current.join(SPEC_DIR_NAME).is_dir() {
                return Ok(Self::new(&current));
            }
            if !current.pop() {
                return Err(SpecGraphError::NotFound(
                    "'.specgraph' directory not found in current or parent directories. Run `specgraph init` first.".to_string(),
                ));
            }
        }
    }

    pub fn spec_dir(&self) -> PathBuf {
        self.project_root.join(SPEC_DIR_NAME)
    }

    pub fn runtime_dir(&self) -> PathBuf {
        self.spec_dir().join(RUNTIME_DIR_NAME)
    }

    pub fn db_path(&self) -> PathBuf {
        self.runtime_dir().join(GRAPH_DB_NAME)
    }

    pub fn prd_path(&self) -> PathBuf {
        self.project_root.join(PRD_FILE_NAME)
    }

    pub fn product_path(&self) -> PathBuf {
        self.spec_dir().join("product.yaml")
    }

    pub fn meta_schema_path(&self) -> PathBuf {
        self.spec_dir().join("substrate").join("sub_meta_schema.yaml")
    }

    /// Dashboard file written by the `monitor` CLI command.
    pub fn dashboard_path(&self) -> PathBuf {
        self.project_root.join("PRODUCT_DASHBOARD.md")
    }
}
