//! Terminal output for taxlink commands
//!
//! Colors follow NO_COLOR / CLICOLOR_FORCE via `colored`.

use std::fmt::Display;

use colored::Colorize;

use crate::domain::{LineageConflict, MergeReport};

pub fn error(msg: &(impl Display + ?Sized)) {
    eprintln!("{}: {}", "error".red().bold(), msg);
}

pub fn warning(msg: &(impl Display + ?Sized)) {
    eprintln!("{}: {}", "warning".yellow(), msg);
}

/// Lineage conflict; `strict` marks it as fatal.
pub fn conflict(conflict: &LineageConflict, strict: bool) {
    let label = if strict {
        "conflict".red().bold()
    } else {
        "conflict".yellow()
    };
    eprintln!("{}: {}", label, conflict);
}

/// One-line summary after a merge was saved.
pub fn merged(report: &MergeReport, total: usize) {
    let mut line = format!("added {} taxa ({} total)", report.added.len(), total);
    if report.has_conflicts() {
        line.push_str(&format!(", {} conflicts kept", report.conflicts.len()));
    }
    println!("{} {}", "✓".green(), line);
}

/// Completed action, e.g. `Pinned: ...`
pub fn action(label: &str, msg: &(impl Display + ?Sized)) {
    println!("{}: {}", label.green(), msg);
}

pub fn header(msg: &(impl Display + ?Sized)) {
    println!("{}", msg.to_string().cyan().bold());
}

/// Indented `key: value` row with aligned values.
pub fn field(key: &str, value: &(impl Display + ?Sized)) {
    println!("  {:<10} {}", format!("{key}:"), value);
}

/// Plain stdout line (trees, lineages, config dumps).
pub fn info(msg: &(impl Display + ?Sized)) {
    println!("{}", msg);
}
