//! Terminal rendering helpers for the CLI shell.
//!
//! The core returns structured reports; these helpers are how the
//! collaborating CLI turns them into human output.

use colored::Colorize;
use std::env;

const MIN_BOX_WIDTH: usize = 40;
const MAX_BOX_WIDTH: usize = 60;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BoxStyle {
    Info,
    Success,
    Warning,
}

pub fn terminal_width() -> usize {
    env::var("TERM_WIDTH")
        .ok()
        .and_then(|w| w.parse().ok())
        .or_else(|| env::var("COLUMNS").ok().and_then(|c| c.parse().ok()))
        .unwrap_or(80)
}

fn effective_width() -> usize {
    terminal_width().clamp(MIN_BOX_WIDTH, MAX_BOX_WIDTH)
}

fn box_row(content: &str, width: usize) -> String {
    let inner = width.saturating_sub(2);
    let len = content.chars().count();
    let padding = inner.saturating_sub(len);
    let left = padding / 2;
    format!(
        "║{}{}{}║",
        " ".repeat(left),
        content,
        " ".repeat(padding - left)
    )
}

pub fn render_box(title: &str, subtitle: &str, style: BoxStyle) {
    let width = effective_width();
    let top = format!("╔{}╗", "═".repeat(width - 2));
    let bottom = format!("╚{}╝", "═".repeat(width - 2));

    let (top, title_row, subtitle_row, bottom) = match style {
        BoxStyle::Info => (
            top.bright_cyan(),
            box_row(title, width).bright_cyan().bold(),
            box_row(subtitle, width).cyan(),
            bottom.bright_cyan(),
        ),
        BoxStyle::Success => (
            top.bright_green(),
            box_row(title, width).bright_green().bold(),
            box_row(subtitle, width).green(),
            bottom.bright_green(),
        ),
        BoxStyle::Warning => (
            top.bright_yellow(),
            box_row(title, width).bright_yellow().bold(),
            box_row(subtitle, width).yellow(),
            bottom.bright_yellow(),
        ),
    };

    println!("{}", top);
    println!("{}", title_row);
    if !subtitle.is_empty() {
        println!("{}", subtitle_row);
    }
    println!("{}", bottom);
}

/// Twenty-cell `#`/`-` progress bar used in the dashboard file.
pub fn progress_bar(percentage: u32) -> String {
    let filled = (percentage / 5).min(20) as usize;
    format!("{}{}", "#".repeat(filled), "-".repeat(20 - filled))
}

pub fn pass(message: &str) {
    println!("    {} {}", "●".bright_green(), message.bright_white());
}

pub fn fail(message: &str) {
    eprintln!("    {} {}", "●".bright_red(), message.bright_white());
}

pub fn warn(message: &str) {
    println!("    {} {}", "●".bright_yellow(), message.bright_white());
}

pub fn info(message: &str) {
    println!("    {} {}", "ℹ".bright_cyan(), message.bright_black());
}
