//! CLI output formatting.
//!
//! Every command has a `format_*` function that returns display lines, and
//! a `print_*` wrapper that writes them to stdout. Format functions are pure
//! so tests can pin the exact text.
//!
//! ## Build
//!
//! ```text
//! 001 icons/home.svg
//!     → icons/home-32.png: rendered
//! 002 logo.svg
//!     → logo-32.png: pre-built
//! ```
//!
//! ## Check
//!
//! ```text
//! Tool:     /usr/bin/inkscape
//! Version:  1.2.2
//! Exchange: staged
//! Staging:  /tmp (prefix svg-raster)
//! ```

use crate::bridge::ToolVersion;
use crate::process::{FileStatus, ProcessEvent};
use std::path::Path;

fn format_index(pos: usize) -> String {
    format!("{:03}", pos)
}

fn status_label(status: FileStatus) -> &'static str {
    match status {
        FileStatus::Cached => "cached",
        FileStatus::Copied => "copied",
        FileStatus::Rendered => "rendered",
        FileStatus::Fallback => "pre-built",
        FileStatus::Unavailable => "skipped (tool not available)",
    }
}

/// Format a single build progress event.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::FileProcessed {
            index,
            source_path,
            output_path,
            status,
        } => vec![
            format!("{} {}", format_index(*index), source_path),
            format!("    → {}: {}", output_path, status_label(*status)),
        ],
    }
}

/// What `check` found out about the environment.
#[derive(Debug, Clone)]
pub struct CheckReport<'a> {
    pub binary: &'a str,
    /// `None` when the binary is not on `PATH`.
    pub tool: Option<&'a Path>,
    pub version: Option<ToolVersion>,
    pub exchange: Option<&'a str>,
    pub staging_dir: &'a Path,
    pub staging_prefix: &'a str,
}

pub fn format_check(report: &CheckReport<'_>) -> Vec<String> {
    let mut lines = Vec::new();
    match report.tool {
        Some(tool) => lines.push(format!("Tool:     {}", tool.display())),
        None => {
            lines.push(format!("Tool:     `{}` not found", report.binary));
            lines.push("          builds will use pre-built assets where available".into());
            return lines;
        }
    }
    lines.push(format!(
        "Version:  {}",
        report
            .version
            .map(|v| v.to_string())
            .unwrap_or_else(|| "unknown".into())
    ));
    if let Some(exchange) = report.exchange {
        lines.push(format!("Exchange: {exchange}"));
    }
    lines.push(format!(
        "Staging:  {} (prefix {})",
        report.staging_dir.display(),
        report.staging_prefix
    ));
    lines
}

pub fn print_check(report: &CheckReport<'_>) {
    for line in format_check(report) {
        println!("{}", line);
    }
}

/// Render an argument vector as a single shell-like line. Arguments with
/// whitespace or that are empty are quoted.
pub fn format_command_line(tool: &str, args: &[String]) -> String {
    std::iter::once(tool.to_string())
        .chain(args.iter().map(|a| {
            if a.is_empty() || a.contains(char::is_whitespace) {
                format!("'{}'", a)
            } else {
                a.clone()
            }
        }))
        .collect::<Vec<_>>()
        .join(" ")
}
