//! CLI output formatting.
//!
//! # Information-First Display
//!
//! Every line leads with the page name; where its render went (or why it has
//! none) follows. Paths are relative to the cache root, the same form the
//! catalog uses, so output lines can be matched against `man.qhp` directly.
//!
//! # Output Format
//!
//! ```text
//! man2 (4 sources)
//!     open → html.2/open.html
//!     close: unchanged
//!     creat → html.2/open.html (alias)
//!     broken: skipped, formatter exited with status 1, output not written
//!     deleted html.2/gone.html
//! man2: 1 unchanged, 1 rendered, 1 aliases, 1 failed (4 total)
//!
//! Wrote catalog to ./man.qhp
//! To actually create the help file, use qhelpgenerator ./man.qhp
//! ```
//!
//! With `--quiet` only the per-category summary and the final summary are
//! shown. Warnings are not part of this module; they go through `tracing`.
//!
//! # Architecture
//!
//! Each kind of output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::naming;
use crate::process::{PageStatus, ProcessEvent, RunReport};
use crate::system::RequiredTool;
use std::path::Path;

/// Display a path relative to `base` when it lies inside it.
fn relative_to(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .display()
        .to_string()
}

// ============================================================================
// Progress
// ============================================================================

/// Format a single progress event as display lines.
///
/// `cache_root` shortens deleted paths; `quiet` drops page-level lines.
pub fn format_process_event(event: &ProcessEvent, cache_root: &Path, quiet: bool) -> Vec<String> {
    match event {
        ProcessEvent::CategoryStarted {
            category,
            source_count,
        } => {
            if quiet {
                return Vec::new();
            }
            vec![format!(
                "{} ({} sources)",
                naming::source_dir_name(category),
                source_count
            )]
        }
        ProcessEvent::Page {
            category,
            name,
            status,
        } => {
            if quiet {
                return Vec::new();
            }
            let line = match status {
                PageStatus::Rendered => {
                    format!("{} \u{2192} {}", name, naming::output_target(category, name))
                }
                PageStatus::Unchanged { .. } => format!("{}: unchanged", name),
                PageStatus::Alias { target } => format!("{} \u{2192} {} (alias)", name, target),
                PageStatus::Skipped(reason) => format!("{}: skipped, {}", name, reason),
            };
            vec![format!("    {}", line)]
        }
        ProcessEvent::Removed { path, .. } => {
            if quiet {
                return Vec::new();
            }
            vec![format!("    deleted {}", relative_to(path, cache_root))]
        }
        ProcessEvent::CategoryFinished {
            category,
            stats,
            has_errors,
        } => {
            let marker = if *has_errors { " [errors]" } else { "" };
            vec![format!(
                "{}: {}{}",
                naming::source_dir_name(category),
                stats,
                marker
            )]
        }
    }
}

// ============================================================================
// Summary
// ============================================================================

/// Format the end-of-run summary.
///
/// The `qhelpgenerator` hint is only given when nothing went wrong.
pub fn format_run_summary(report: &RunReport) -> Vec<String> {
    let catalog = report.catalog_path.display();
    let mut lines = vec![
        String::new(),
        format!("Wrote catalog to {}", catalog),
    ];
    if report.categories.len() > 1 {
        lines.push(format!("Total: {}", report.stats));
    }
    if report.has_errors {
        lines.push("Processing had errors and some files were skipped.".to_string());
    } else {
        lines.push(format!(
            "To actually create the help file, use qhelpgenerator {}",
            catalog
        ));
    }
    lines
}

pub fn print_run_summary(report: &RunReport) {
    for line in format_run_summary(report) {
        println!("{}", line);
    }
}

/// Format the system check failure.
pub fn format_missing_tools(missing: &[RequiredTool]) -> Vec<String> {
    let mut lines: Vec<String> = missing
        .iter()
        .map(|tool| format!("Missing {} ({})", tool.provides, tool.program))
        .collect();
    if !missing.is_empty() {
        lines.push("Install the tools above or pass --ignore-system-check.".to_string());
    }
    lines
}

pub fn print_missing_tools(missing: &[RequiredTool]) {
    for line in format_missing_tools(missing) {
        eprintln!("{}", line);
    }
}
