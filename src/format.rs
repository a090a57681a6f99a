//! Output formatting utilities for markdown and JSON.

use crate::sync::SyncReport;
use crate::types::{ImportRun, LedgerEntry};
use chrono::{TimeZone, Utc};
use std::collections::BTreeMap;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Json,
    Markdown,
}

fn format_ms(ms: i64) -> String {
    Utc.timestamp_millis_opt(ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ms.to_string())
}

/// Format import runs with their action counts as markdown.
pub fn format_imports_markdown(runs: &[(ImportRun, BTreeMap<String, usize>)]) -> String {
    let mut md = String::new();

    md.push_str(&format!("# Imports ({})\n\n", runs.len()));
    if runs.is_empty() {
        md.push_str("No imports yet.\n");
        return md;
    }

    for (run, counts) in runs {
        md.push_str(&format!("## Import {}: {}\n", run.id, run.name));
        md.push_str(&format!("- **status**: {}\n", run.status.as_str()));
        md.push_str(&format!("- **transport**: {}\n", run.transport));
        md.push_str(&format!("- **url**: {}\n", run.url));
        md.push_str(&format!("- **started**: {}\n", format_ms(run.started_at)));
        if let Some(finished) = run.finished_at {
            md.push_str(&format!("- **finished**: {}\n", format_ms(finished)));
        }
        if let Some(ref error) = run.error {
            md.push_str(&format!("- **error**: {}\n", error));
        }
        if !counts.is_empty() {
            let parts: Vec<String> = counts
                .iter()
                .map(|(action, n)| format!("{} {}", action, n))
                .collect();
            md.push_str(&format!("- **actions**: {}\n", parts.join(", ")));
        }
        md.push('\n');
    }

    md
}

/// Format ledger entries as a markdown table.
pub fn format_ledger_markdown(import_id: i64, entries: &[LedgerEntry]) -> String {
    let mut md = String::new();

    md.push_str(&format!(
        "# Ledger of import {} ({} entries)\n\n",
        import_id,
        entries.len()
    ));
    md.push_str("| item | action | key |\n|---|---|---|\n");
    for entry in entries {
        md.push_str(&format!(
            "| {} | {} | {} |\n",
            entry.item_id,
            entry.action,
            entry.diigo_key.replace('|', "\\|")
        ));
    }

    md
}

/// Format the outcome of one run.
pub fn format_report_markdown(import_id: i64, report: &SyncReport) -> String {
    let mut md = String::new();

    md.push_str(&format!("# Import {}\n", import_id));
    md.push_str(&format!("- **stop**: {:?}\n", report.stop));
    md.push_str(&format!("- **pages**: {}\n", report.pages));
    md.push_str(&format!(
        "- **bookmarks**: {} ({} created, {} updated)\n",
        report.processed, report.created, report.updated
    ));
    if report.skipped > 0 {
        md.push_str(&format!("- **skipped**: {}\n", report.skipped));
    }
    if report.failed > 0 || report.step_failures > 0 {
        md.push_str(&format!(
            "- **failures**: {} bookmarks, {} related objects\n",
            report.failed, report.step_failures
        ));
    }

    md
}
