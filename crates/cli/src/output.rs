//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use serde::Serialize;

use careflow_workflow::{OutcomeKind, WorkflowReport};

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

fn outcome_cell(kind: OutcomeKind) -> Cell {
    let color = match kind {
        OutcomeKind::Success => Color::Green,
        OutcomeKind::SoftFailure => Color::Yellow,
        OutcomeKind::HardFailure => Color::Red,
        OutcomeKind::Skipped => Color::DarkGrey,
    };
    Cell::new(kind.to_string()).fg(color)
}

/// Render the step table for a report
pub fn report_table(report: &WorkflowReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec!["#", "Step", "Outcome", "Attempts", "Time (ms)", "Detail"]);
    for line in &report.lines {
        table.add_row(vec![
            Cell::new(line.index),
            Cell::new(&line.step),
            outcome_cell(line.kind),
            Cell::new(line.attempts),
            Cell::new(line.duration_ms),
            Cell::new(&line.detail),
        ]);
    }
    table
}

pub fn print_report(report: &WorkflowReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            println!("{}", report_table(report));
            let t = &report.tally;
            println!(
                "Workflow {} {}: {} succeeded, {} soft-failed, {} hard-failed, {} skipped ({} ms)",
                report.workflow.bold(),
                report.status,
                t.succeeded.to_string().green(),
                t.soft_failed.to_string().yellow(),
                t.hard_failed.to_string().red(),
                t.skipped.to_string().dimmed(),
                report.total_duration_ms
            );
        }
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}

/// Print info message
pub fn print_info(message: &str) {
    println!("ℹ️  {}", message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use careflow_workflow::{ReportLine, RunStatus, Tally};

    #[test]
    fn test_table_has_row_per_step() {
        let report = WorkflowReport {
            workflow: "healthcare".into(),
            status: RunStatus::Completed,
            lines: vec![ReportLine {
                index: 1,
                step: "authenticate".into(),
                kind: OutcomeKind::Success,
                detail: "eyJhbGciOiJI...".into(),
                attempts: 1,
                duration_ms: 12,
            }],
            tally: Tally { succeeded: 1, ..Tally::default() },
            total_duration_ms: 12,
        };
        let rendered = report_table(&report).to_string();
        assert!(rendered.contains("authenticate"));
        assert!(rendered.contains("SUCCESS"));
    }
}
