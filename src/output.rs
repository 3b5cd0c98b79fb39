//! CLI output formatting for all pipeline stages.
//!
//! Output is **source-centric**: each line leads with the file a reader
//! recognizes from the repository, with generated paths and statuses as
//! secondary context.
//!
//! # Output Format
//!
//! ## Scan
//!
//! ```text
//! Root
//!     001 Makefile (makefile)
//!     002 run.sh (shell)
//! simulationCases
//!     001 analysis.ipynb (notebook)
//!     002 drop.c (c)
//!     003 get_eta.py (python)
//!         Source: simulationCases/utils/get_eta.py
//!
//! Found 5 sources: 1 c, 1 makefile, 1 notebook, 1 python, 1 shell
//! ```
//!
//! ## Process
//!
//! ```text
//! Processing 5 sources
//!     simulationCases/drop.c: generated
//!     run.sh: kept existing page
//!     simulationCases/utils/get_eta.py: FAILED
//!         pandoc exited with exit status: 64: ...
//! Assembling site from 4 pages
//! ```
//!
//! ## Build summary
//!
//! ```text
//! Home → index.html
//! Directory indexes
//!     simulationCases/index.html
//! Search engines → sitemap.xml, robots.txt
//!
//! Generated 3 pages, kept 1, failed 1
//! ```
//!
//! # Architecture
//!
//! Each stage has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure.

use crate::process::{BuildSummary, FileStatus, ProcessEvent};
use crate::types::{SourceFile, to_slash};
use std::collections::BTreeMap;
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

fn relative_to(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .map(to_slash)
        .unwrap_or_else(|_| path.display().to_string())
}

// ============================================================================
// Scan output
// ============================================================================

/// Format the classified sources, grouped by top-level directory.
pub fn format_scan_output(files: &[SourceFile]) -> Vec<String> {
    let mut groups: BTreeMap<Option<String>, Vec<&SourceFile>> = BTreeMap::new();
    for file in files {
        groups.entry(file.top_dir()).or_default().push(file);
    }

    let mut lines = Vec::new();
    for (group, members) in &groups {
        lines.push(group.clone().unwrap_or_else(|| "Root".to_string()));
        for (i, file) in members.iter().enumerate() {
            let name = file.file_name();
            lines.push(format!(
                "{}{} {} ({})",
                indent(1),
                format_index(i + 1),
                name,
                file.kind.label()
            ));

            let shallow = match group {
                Some(dir) => format!("{dir}/{name}"),
                None => name.clone(),
            };
            if file.relative_display() != shallow {
                lines.push(format!("{}Source: {}", indent(2), file.relative_display()));
            }
        }
    }

    let mut by_kind: BTreeMap<&str, usize> = BTreeMap::new();
    for file in files {
        *by_kind.entry(file.kind.label()).or_default() += 1;
    }
    let counts: Vec<String> = by_kind.iter().map(|(k, n)| format!("{n} {k}")).collect();

    if !lines.is_empty() {
        lines.push(String::new());
    }
    if counts.is_empty() {
        lines.push("Found no sources".to_string());
    } else {
        lines.push(format!(
            "Found {}: {}",
            plural(files.len(), "source"),
            counts.join(", ")
        ));
    }
    lines
}

/// Print scan output to stdout.
pub fn print_scan_output(files: &[SourceFile]) {
    for line in format_scan_output(files) {
        println!("{}", line);
    }
}

// ============================================================================
// Process output
// ============================================================================

/// Format a single progress event as display lines.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::Started { total } => vec![format!("Processing {}", plural(*total, "source"))],
        ProcessEvent::FileFinished {
            relative, status, ..
        } => match status {
            FileStatus::Generated => vec![format!("{}{}: generated", indent(1), relative)],
            FileStatus::Skipped => vec![format!("{}{}: kept existing page", indent(1), relative)],
            FileStatus::Failed(error) => vec![
                format!("{}{}: FAILED", indent(1), relative),
                format!("{}{}", indent(2), error),
            ],
        },
        ProcessEvent::Assembling { pages } => {
            vec![format!("Assembling site from {}", plural(*pages, "page"))]
        }
    }
}

// ============================================================================
// Build summary
// ============================================================================

/// Format what a finished build wrote and how every file fared.
pub fn format_build_summary(summary: &BuildSummary, docs_root: &Path) -> Vec<String> {
    let mut lines = Vec::new();
    let assembly = &summary.assembly;

    lines.push(format!(
        "Home \u{2192} {}",
        relative_to(&assembly.root_index, docs_root)
    ));
    if !assembly.directory_indexes.is_empty() {
        lines.push("Directory indexes".to_string());
        for index in &assembly.directory_indexes {
            lines.push(format!("{}{}", indent(1), relative_to(index, docs_root)));
        }
    }
    lines.push(format!(
        "Search engines \u{2192} {}, {}",
        relative_to(&assembly.sitemap, docs_root),
        relative_to(&assembly.robots, docs_root)
    ));

    let failures = summary.failures();
    lines.push(String::new());
    lines.push(format!(
        "Generated {}, kept {}, failed {}",
        plural(summary.generated(), "page"),
        summary.skipped(),
        failures.len()
    ));

    if !failures.is_empty() {
        lines.push("Failures".to_string());
        for (source, error) in failures {
            lines.push(format!("{}{}", indent(1), source.relative_display()));
            lines.push(format!("{}{}", indent(2), error));
        }
    }
    lines
}

/// Print the build summary to stdout.
pub fn print_build_summary(summary: &BuildSummary, docs_root: &Path) {
    for line in format_build_summary(summary, docs_root) {
        println!("{}", line);
    }
}

// ============================================================================
// Check output
// ============================================================================

/// Format prerequisite problems found by `check`.
pub fn format_check_output(problems: &[String]) -> Vec<String> {
    if problems.is_empty() {
        return vec!["All prerequisites present".to_string()];
    }
    let mut lines = vec!["Missing prerequisites".to_string()];
    lines.extend(problems.iter().map(|p| format!("{}{}", indent(1), p)));
    lines
}

pub fn print_check_output(problems: &[String]) {
    for line in format_check_output(problems) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
