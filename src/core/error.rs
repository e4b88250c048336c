//! Error types for SpecGraph operations.
//!
//! This module defines the canonical error type used throughout the crate.
//! All subsystems return `Result<T, SpecGraphError>`.
//!
//! Per-file problems (parse failures, schema violations, dangling
//! references) accumulate inside report structs and never abort a run;
//! the variants here cover the failures that do.

use rusqlite;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Canonical error type for all SpecGraph operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait
/// implementations. Library errors auto-convert via `#[from]`.
#[derive(Error, Debug)]
pub enum SpecGraphError {
    /// The meta-schema file is missing or unreadable. Fatal: every
    /// validation downstream would be silently relaxed without it.
    #[error("Meta-schema unavailable: {0}")]
    MetaSchemaUnavailable(String),

    /// SQLite database error (auto-converts from `rusqlite::Error`)
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),

    /// I/O error (auto-converts from `std::io::Error`)
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// A single file failed to parse as structured YAML.
    #[error("Parse failure in {}: {detail}", path.display())]
    ParseFailure { path: PathBuf, detail: String },

    /// Path resolution or convention error
    #[error("Path error: {0}")]
    PathError(String),

    /// Validation gate failure (PRD structure, exit-code-1 class)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Resource not found (project root, prose document, node file)
    #[error("Not found: {0}")]
    NotFound(String),

    /// The assembler was asked about an identifier the graph does not hold.
    #[error("Unknown node '{id}' for phase '{phase}'")]
    UnknownNode { id: String, phase: String },

    /// A phase was invoked without a parameter it requires.
    #[error("Phase '{phase}' requires argument '{arg}'")]
    PhaseArgumentMissing { phase: String, arg: String },

    /// The `depends_on` graph for one kind contains a cycle; planning
    /// order is undefined until the cycle is broken.
    #[error("Dependency cycle among {kind} nodes: {}", cycle.join(" -> "))]
    CycleDetected { kind: String, cycle: Vec<String> },
}

impl SpecGraphError {
    /// Process exit code for the CLI shell: 2 for internal failures,
    /// 1 for anything that reports a spec problem.
    pub fn exit_code(&self) -> i32 {
        match self {
            SpecGraphError::MetaSchemaUnavailable(_)
            | SpecGraphError::RusqliteError(_)
            | SpecGraphError::IoError(_)
            | SpecGraphError::PathError(_)
            | SpecGraphError::NotFound(_) => 2,
            _ => 1,
        }
    }
}
