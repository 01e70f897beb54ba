//! Output formatting utilities for CLI commands
//!
//! Findings go to stdout one per line so they can be piped; tables use
//! comfy-table with the same preset everywhere.

use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use eoaudit::{AuditReport, CheckStatus, Severity};

/// Format a byte count in human-readable form
///
/// Examples:
/// - 500 -> "500 B"
/// - 1024 -> "1.0 KB"
/// - 1536000 -> "1.5 MB"
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if bytes >= TB {
        format!("{:.1} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| Cell::new(h).fg(Color::Cyan))
        .collect();
    table.set_header(header_cells);
    table
}

/// Print a table with headers and rows
pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut table = new_table(headers);
    for row in rows {
        table.add_row(row);
    }
    println!("{}", table);
}

fn status_cell(status: &CheckStatus, discrepancies: usize) -> Cell {
    match status {
        CheckStatus::Completed if discrepancies == 0 => Cell::new("ok").fg(Color::Green),
        CheckStatus::Completed => Cell::new("discrepancies").fg(Color::Yellow),
        CheckStatus::Failed { .. } => Cell::new("failed").fg(Color::Red),
        CheckStatus::Skipped { .. } => Cell::new("skipped").fg(Color::Grey),
    }
}

/// Findings grouped by check, then a summary table.
pub fn print_report(report: &AuditReport) {
    for outcome in &report.outcomes {
        println!("== {} ==", outcome.check);
        match &outcome.status {
            CheckStatus::Failed { error } => println!("  check failed: {}", error),
            CheckStatus::Skipped { reason } => println!("  skipped: {}", reason),
            CheckStatus::Completed if outcome.findings.is_empty() => println!("  no findings"),
            CheckStatus::Completed => {
                for finding in &outcome.findings {
                    let marker = match finding.severity() {
                        Severity::Info => " ",
                        Severity::Discrepancy => "!",
                    };
                    println!("{} {}", marker, finding);
                }
            }
        }
        println!();
    }

    let mut table = new_table(&["CHECK", "STATUS", "FINDINGS", "DISCREPANCIES", "TIME"]);
    for outcome in &report.outcomes {
        let discrepancies = outcome.discrepancies();
        table.add_row(vec![
            Cell::new(outcome.check.name()),
            status_cell(&outcome.status, discrepancies),
            Cell::new(outcome.findings.len()),
            Cell::new(discrepancies),
            Cell::new(format!("{} ms", outcome.elapsed_ms)),
        ]);
    }
    println!("{}", table);
    println!(
        "{} discrepancies, {} failed checks, {} skipped checks",
        report.discrepancy_count(),
        report.failed_count(),
        report.skipped_count()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(1048576), "1.0 MB");
        assert_eq!(format_size(1073741824), "1.0 GB");
        assert_eq!(format_size(1099511627776), "1.0 TB");
    }

    #[test]
    fn test_status_cell_text() {
        let failed = CheckStatus::Failed {
            error: "x".to_string(),
        };
        assert_eq!(status_cell(&failed, 0).content(), "failed");
        assert_eq!(status_cell(&CheckStatus::Completed, 3).content(), "discrepancies");
        assert_eq!(status_cell(&CheckStatus::Completed, 0).content(), "ok");
    }
}
