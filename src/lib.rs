//! SpecGraph: an auditable knowledge graph for spec-first development.
//!
//! SpecGraph ties a product's intent (anchored prose in `PRD.md`) to its
//! structural specification (typed YAML nodes under `.specgraph/`) to a
//! SQLite-backed graph index. The core is a passive oracle: it reads
//! prose and typed files, writes an index and reports, and never
//! executes code, edits sources, or calls a model.
//!
//! # Subsystems
//!
//! - [`core::meta_schema`]: grammar registry loaded from `sub_meta_schema`
//! - [`core::node_store`] / [`core::validate`]: typed node files
//! - [`core::prose`]: anchor index over the PRD
//! - [`core::graph`] / [`core::sync`]: derived SQLite projection
//! - [`core::monitor`]: intent-spec consistency dashboard
//! - [`core::context`]: phase-scoped context assembly for AI agents
//!
//! # CLI
//!
//! ```bash
//! specgraph init            # scaffold .specgraph/ and the grammar
//! specgraph sync            # rebuild the graph database
//! specgraph monitor         # layered consistency dashboard
//! specgraph context --phase planning --focus feat_x
//! specgraph validate-prd    # prose structure check
//! ```
//!
//! Exit codes: 0 success, 1 schema/consistency errors reported,
//! 2 internal failure (meta-schema missing, database open failure).

pub mod core;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::fs;
use std::path::PathBuf;

use crate::core::context::{self, Phase};
use crate::core::error::SpecGraphError;
use crate::core::graph::GraphDb;
use crate::core::monitor::{self, MonitorReport, SyncStatus};
use crate::core::prd;
use crate::core::store::Workspace;
use crate::core::sync::Synchroniser;
use crate::core::tui;
use crate::core::{assets, db};

#[derive(Parser, Debug)]
#[clap(
    name = "specgraph",
    version = env!("CARGO_PKG_VERSION"),
    about = "Spec-first knowledge graph: typed nodes, PRD anchors, SQLite index, AI context"
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scaffold .specgraph/ with the grammar and starter files
    #[clap(name = "init")]
    Init {
        /// Directory to initialize (defaults to current working directory).
        #[clap(short, long)]
        dir: Option<PathBuf>,
    },

    /// Project the node store into the graph database
    #[clap(name = "sync", visible_alias = "s")]
    Sync(SyncCli),

    /// Run the intent-spec consistency check and dashboard
    #[clap(name = "monitor", visible_alias = "m")]
    Monitor {
        /// Output format: 'text' or 'json'.
        #[clap(long, default_value = "text")]
        format: String,
    },

    /// Assemble phase-scoped context for an AI agent
    #[clap(name = "context", visible_alias = "c")]
    Context(ContextCli),

    /// Validate the PRD's structure and anchors
    #[clap(name = "validate-prd")]
    ValidatePrd,
}

#[derive(clap::Args, Debug)]
struct SyncCli {
    /// Changed files for an incremental run; omit for a full rebuild.
    #[clap(long)]
    paths: Vec<PathBuf>,
    /// Force a full rebuild even when --paths is given.
    #[clap(long)]
    full: bool,
    /// Output format: 'text' or 'json'.
    #[clap(long, default_value = "text")]
    format: String,
}

#[derive(clap::Args, Debug)]
struct ContextCli {
    /// Task phase: understanding | locating | evaluating | planning
    #[clap(long)]
    phase: String,
    /// Focus node id (required for evaluating and planning).
    #[clap(long)]
    focus: Option<String>,
    /// Domain filter for the locating phase.
    #[clap(long)]
    domain: Option<String>,
}

pub fn run() -> Result<(), SpecGraphError> {
    let cli = Cli::parse();
    let current_dir = std::env::current_dir()?;

    match cli.command {
        Command::Init { dir } => run_init(dir.unwrap_or(current_dir)),
        Command::Sync(sync_cli) => {
            let ws = Workspace::discover(&current_dir)?;
            run_sync(&ws, sync_cli)
        }
        Command::Monitor { format } => {
            let ws = Workspace::discover(&current_dir)?;
            run_monitor(&ws, &format)
        }
        Command::Context(context_cli) => {
            let ws = Workspace::discover(&current_dir)?;
            run_context(&ws, context_cli)
        }
        Command::ValidatePrd => {
            let ws = Workspace::discover(&current_dir)?;
            run_validate_prd(&ws)
        }
    }
}

fn run_init(dir: PathBuf) -> Result<(), SpecGraphError> {
    let target = fs::canonicalize(&dir).map_err(SpecGraphError::IoError)?;
    let ws = Workspace::new(&target);
    let spec_dir = ws.spec_dir();

    tui::render_box("SPECGRAPH INIT", "Spec-first project scaffold", tui::BoxStyle::Info);
    println!();

    for sub in assets::SPEC_SUBDIRS {
        let path = spec_dir.join(sub);
        if path.exists() {
            println!(
                "    {} {}/ {}",
                "✓".bright_green(),
                sub.bright_white(),
                "(preserved)".bright_black()
            );
        } else {
            fs::create_dir_all(&path).map_err(SpecGraphError::IoError)?;
            println!("    {} {}/", "●".bright_green(), sub.bright_white());
        }
    }

    let seeds = [
        (ws.meta_schema_path(), assets::META_SCHEMA_TEMPLATE, "substrate/sub_meta_schema.yaml"),
        (ws.product_path(), assets::PRODUCT_TEMPLATE, "product.yaml"),
        (ws.prd_path(), assets::PRD_TEMPLATE, "PRD.md"),
    ];
    for (path, template, label) in seeds {
        if path.exists() {
            println!(
                "    {} {} {}",
                "✓".bright_green(),
                label.bright_white(),
                "(preserved - existing content kept)".bright_black()
            );
        } else {
            fs::write(&path, template).map_err(SpecGraphError::IoError)?;
            println!("    {} {}", "●".bright_green(), label.bright_white());
        }
    }

    println!();
    println!(
        "  {} Run {} then {} to build the graph",
        "▸".bright_cyan(),
        "specgraph sync".bright_cyan().bold(),
        "specgraph monitor".bright_cyan().bold()
    );
    Ok(())
}

fn run_sync(ws: &Workspace, cli: SyncCli) -> Result<(), SpecGraphError> {
    let synchroniser = Synchroniser::new(ws)?;
    let report = if cli.paths.is_empty() || cli.full {
        synchroniser.sync_full()?
    } else {
        synchroniser.sync_incremental(&cli.paths)?
    };

    if cli.format == "json" {
        println!("{}", serde_json::to_string_pretty(&report).unwrap_or_default());
    } else {
        tui::info(&format!("Sync run {}", report.run_id));
        tui::pass(&format!(
            "{} node(s) written, {} skipped, {} deleted",
            report.nodes_written, report.nodes_skipped, report.nodes_deleted
        ));
        tui::pass(&format!(
            "{} edge(s) written, {} domain API(s)",
            report.edges_written, report.apis_written
        ));
        for issue in &report.issues {
            tui::fail(&format!("{}: {}", issue.subject, issue.detail));
        }
    }

    if report.has_errors() {
        return Err(SpecGraphError::ValidationError(format!(
            "sync reported {} issue(s)",
            report.issues.len()
        )));
    }
    Ok(())
}

fn run_monitor(ws: &Workspace, format: &str) -> Result<(), SpecGraphError> {
    let report = monitor::run_monitor(ws)?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&report).unwrap_or_default());
    } else {
        render_monitor_tables(&report);
    }

    let dashboard = render_dashboard_markdown(&report);
    fs::write(ws.dashboard_path(), dashboard).map_err(SpecGraphError::IoError)?;
    if format != "json" {
        println!();
        tui::pass(&format!("Dashboard updated: {}", ws.dashboard_path().display()));
    }

    if report.has_errors() {
        return Err(SpecGraphError::ValidationError(format!(
            "{} invalid file(s), {} duplicate anchor(s)",
            report.schema.invalid_count,
            report.duplicate_anchors.len()
        )));
    }
    Ok(())
}

fn status_cell(status: SyncStatus) -> colored::ColoredString {
    match status {
        SyncStatus::Synced => status.label().bright_green(),
        SyncStatus::PrdOnly => status.label().bright_yellow(),
        SyncStatus::YamlOnly => status.label().bright_red(),
    }
}

fn render_monitor_tables(report: &MonitorReport) {
    tui::render_box(
        "CONSISTENCY MONITOR",
        "Intent vs Structure (layered view)",
        tui::BoxStyle::Info,
    );
    println!();

    tui::info("Schema validation");
    for result in &report.schema.results {
        if result.is_valid() && !result.has_warnings() {
            continue;
        }
        if result.is_valid() {
            tui::warn(&format!("{} ({})", result.path, result.kind));
        } else {
            tui::fail(&format!("{} ({})", result.path, result.kind));
        }
        for v in &result.violations {
            println!("        - {}: {}", v.field, v.message);
        }
    }
    tui::pass(&format!(
        "{}/{} file(s) valid, {} with warnings",
        report.schema.valid_count, report.schema.total_files, report.schema.warning_count
    ));
    println!();

    for id in &report.duplicate_anchors {
        tui::fail(&format!("Duplicate prose anchor: {}", id));
    }

    println!("  {}", "System Design (Domain & Design)".bold());
    println!("    {:<28} {:<10} {}", "Node ID", "Type", "Spec Status");
    for row in &report.design_rows {
        println!(
            "    {:<28} {:<10} {}",
            row.id.cyan(),
            row.kind,
            status_cell(row.status)
        );
    }
    println!();

    println!("  {}", "Features".bold());
    println!(
        "    {:<28} {:<14} {:<12} {}",
        "Node ID", "Domain", "Spec Status", "Assignment"
    );
    for row in &report.feature_rows {
        let assignment = if row.assignment_count > 0 {
            format!("Assigned ({})", row.assignment_count).cyan()
        } else {
            "Unassigned".to_string().red()
        };
        println!(
            "    {:<28} {:<14} {:<12} {}",
            row.id.cyan(),
            row.domain.as_deref().unwrap_or("-"),
            status_cell(row.status),
            assignment
        );
    }
    println!();

    println!("  {}", "Components".bold());
    println!("    {:<28} {:<28} {}", "Node ID", "Parent Feature", "Spec Status");
    for row in &report.component_rows {
        let parents = if row.parent_features.is_empty() {
            "-".to_string()
        } else {
            row.parent_features.join(", ")
        };
        println!(
            "    {:<28} {:<28} {}",
            row.id.cyan(),
            parents,
            status_cell(row.status)
        );
    }
    println!();

    let stats = &report.stats;
    println!("  {}", "Progress Summary".bold());
    println!(
        "    Schema Compliance: {} ({}/{})",
        format!("{}%", stats.schema_pct).bright_green(),
        stats.schema_valid,
        stats.schema_total
    );
    println!(
        "    Spec Sync:         {} ({}/{})",
        format!("{}%", stats.sync_pct).bright_green(),
        stats.sync_synced,
        stats.sync_total
    );
    println!(
        "    Feature Assignment: {} ({}/{})",
        format!("{}%", stats.assignment_pct).bright_cyan(),
        stats.features_assigned,
        stats.features_total
    );
    println!(
        "    Overall:           {} (Schema 30% + Sync 30% + Assignment 40%)",
        format!("{}%", stats.overall_pct).bright_yellow().bold()
    );
}

fn render_dashboard_markdown(report: &MonitorReport) -> String {
    let stats = &report.stats;
    let mut out = String::new();

    out.push_str("# Product Dashboard\n\n");
    out.push_str(&format!("> **Generated At**: {}\n", db::now_iso()));
    out.push_str(&format!("> **Run**: {}\n\n", report.run_id));

    out.push_str("## Progress Overview\n\n");
    out.push_str("| Dimension | Progress | Detail |\n| :--- | :--- | :--- |\n");
    out.push_str(&format!(
        "| **Schema Compliance** | `[{}]` {}% | {}/{} files |\n",
        tui::progress_bar(stats.schema_pct),
        stats.schema_pct,
        stats.schema_valid,
        stats.schema_total
    ));
    out.push_str(&format!(
        "| **Spec Sync** | `[{}]` {}% | {}/{} nodes |\n",
        tui::progress_bar(stats.sync_pct),
        stats.sync_pct,
        stats.sync_synced,
        stats.sync_total
    ));
    out.push_str(&format!(
        "| **Feature Assignment** | `[{}]` {}% | {}/{} features |\n",
        tui::progress_bar(stats.assignment_pct),
        stats.assignment_pct,
        stats.features_assigned,
        stats.features_total
    ));
    out.push_str(&format!(
        "| **Overall** | `[{}]` {}% | Weighted: Schema(30%) + Sync(30%) + Assignment(40%) |\n\n",
        tui::progress_bar(stats.overall_pct),
        stats.overall_pct
    ));

    out.push_str("---\n\n## Schema Validation Results\n\n");
    out.push_str("| File | Type | Status | Issues |\n| :--- | :--- | :--- | :--- |\n");
    for result in &report.schema.results {
        let status = if !result.is_valid() {
            "X Invalid"
        } else if result.has_warnings() {
            "! Warnings"
        } else {
            "O Valid"
        };
        let issues: Vec<String> = result
            .violations
            .iter()
            .take(3)
            .map(|v| format!("[{:?}] {}: {}", v.severity, v.field, v.message))
            .collect();
        let issues = if issues.is_empty() {
            "-".to_string()
        } else {
            issues.join("; ")
        };
        out.push_str(&format!(
            "| `{}` | {} | {} | {} |\n",
            result.path, result.kind, status, issues
        ));
    }

    out.push_str("\n---\n\n## System Design (Domain & Design)\n\n");
    out.push_str("| Node ID | Type | Spec Status |\n| :--- | :--- | :--- |\n");
    for row in &report.design_rows {
        out.push_str(&format!(
            "| `{}` | {} | {} {} |\n",
            row.id,
            row.kind,
            status_icon(row.status),
            row.status.label()
        ));
    }

    out.push_str("\n---\n\n## Features\n\n");
    out.push_str("| Node ID | Domain | Spec Status | Assignment |\n| :--- | :--- | :--- | :--- |\n");
    for row in &report.feature_rows {
        let assignment = if row.assignment_count > 0 {
            format!("O Assigned ({})", row.assignment_count)
        } else {
            "X Unassigned".to_string()
        };
        out.push_str(&format!(
            "| `{}` | {} | {} {} | {} |\n",
            row.id,
            row.domain.as_deref().unwrap_or("-"),
            status_icon(row.status),
            row.status.label(),
            assignment
        ));
    }

    out.push_str("\n---\n\n## Components\n\n");
    out.push_str("| Node ID | Parent Feature | Spec Status |\n| :--- | :--- | :--- |\n");
    for row in &report.component_rows {
        let parents = if row.parent_features.is_empty() {
            "-".to_string()
        } else {
            row.parent_features.join(", ")
        };
        out.push_str(&format!(
            "| `{}` | {} | {} {} |\n",
            row.id,
            parents,
            status_icon(row.status),
            row.status.label()
        ));
    }

    out.push_str("\n---\n*Auto-generated by the SpecGraph consistency monitor*\n");
    out
}

fn status_icon(status: SyncStatus) -> &'static str {
    match status {
        SyncStatus::Synced => "O",
        SyncStatus::PrdOnly => "!",
        SyncStatus::YamlOnly => "X",
    }
}

fn run_context(ws: &Workspace, cli: ContextCli) -> Result<(), SpecGraphError> {
    let phase = Phase::parse(&cli.phase).ok_or_else(|| {
        SpecGraphError::ValidationError(format!(
            "Unknown phase '{}'. Valid phases: {}",
            cli.phase,
            Phase::ALL
                .iter()
                .map(|p| p.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    })?;

    let db = GraphDb::open_readonly(&ws.db_path())?;
    let bundle = context::assemble(&db, phase, cli.focus.as_deref(), cli.domain.as_deref())?;
    println!("{}", serde_json::to_string_pretty(&bundle).unwrap_or_default());
    Ok(())
}

fn run_validate_prd(ws: &Workspace) -> Result<(), SpecGraphError> {
    let report = prd::validate_prd(&ws.prd_path())?;

    for error in &report.errors {
        tui::fail(error);
    }
    for warning in &report.warnings {
        tui::warn(warning);
    }

    if report.is_valid() {
        tui::pass(&format!(
            "PRD structure valid ({} warning(s))",
            report.warnings.len()
        ));
        Ok(())
    } else {
        Err(SpecGraphError::ValidationError(format!(
            "PRD validation failed with {} error(s)",
            report.errors.len()
        )))
    }
}
