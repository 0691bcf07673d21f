//! Run summaries

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::state::{OutcomeKind, RunStatus, StepOutcome, WorkflowState};

/// Longest detail kept per line before truncation
const DETAIL_LIMIT: usize = 160;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportLine {
    pub index: usize,
    pub step: String,
    pub kind: OutcomeKind,
    pub detail: String,
    pub attempts: u32,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub succeeded: usize,
    pub soft_failed: usize,
    pub hard_failed: usize,
    pub skipped: usize,
}

impl Tally {
    pub fn total(&self) -> usize {
        self.succeeded + self.soft_failed + self.hard_failed + self.skipped
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowReport {
    pub workflow: String,
    pub status: RunStatus,
    pub lines: Vec<ReportLine>,
    pub tally: Tally,
    pub total_duration_ms: u64,
}

impl WorkflowReport {
    /// Completed without any hard failure
    pub fn passed(&self) -> bool {
        self.status == RunStatus::Completed && self.tally.hard_failed == 0
    }

    /// Process exit code for CLI runs
    pub fn exit_code(&self) -> i32 {
        if self.passed() {
            0
        } else {
            1
        }
    }
}

/// Build a report from the records of a run. Reads only; calling it twice
/// yields equal reports.
pub fn summarize(state: &WorkflowState) -> WorkflowReport {
    let mut tally = Tally::default();
    let lines: Vec<ReportLine> = state
        .records()
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let kind = record.outcome.kind();
            match kind {
                OutcomeKind::Success => tally.succeeded += 1,
                OutcomeKind::SoftFailure => tally.soft_failed += 1,
                OutcomeKind::HardFailure => tally.hard_failed += 1,
                OutcomeKind::Skipped => tally.skipped += 1,
            }
            ReportLine {
                index: i + 1,
                step: record.name.clone(),
                kind,
                detail: detail(&record.outcome),
                attempts: record.attempts,
                duration_ms: record.duration_ms,
            }
        })
        .collect();

    WorkflowReport {
        workflow: state.name().to_string(),
        status: state.status(),
        total_duration_ms: lines.iter().map(|l| l.duration_ms).sum(),
        lines,
        tally,
    }
}

fn detail(outcome: &StepOutcome) -> String {
    let text = match outcome {
        StepOutcome::Success { value } => match value {
            serde_json::Value::Null => String::new(),
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        },
        StepOutcome::SoftFailure { status: Some(status), body } => format!("HTTP {}: {}", status, body),
        StepOutcome::SoftFailure { status: None, body } => body.clone(),
        StepOutcome::HardFailure { error } => error.clone(),
        StepOutcome::Skipped { missing } => format!("missing {}", missing),
    };
    truncate(&text, DETAIL_LIMIT)
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let head: String = text.chars().take(limit).collect();
    format!("{}...", head)
}

impl fmt::Display for WorkflowReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Workflow: {} ({})", self.workflow, self.status)?;
        for line in &self.lines {
            write!(f, "{:>3}. {:<24} {:<9}", line.index, line.step, line.kind.to_string())?;
            if line.attempts > 1 {
                write!(f, " [{} attempts]", line.attempts)?;
            }
            if !line.detail.is_empty() {
                write!(f, " {}", line.detail)?;
            }
            writeln!(f)?;
        }
        write!(
            f,
            "Total: {} | Success: {} | Soft-fail: {} | Hard-fail: {} | Skipped: {} | {} ms",
            self.tally.total(),
            self.tally.succeeded,
            self.tally.soft_failed,
            self.tally.hard_failed,
            self.tally.skipped,
            self.total_duration_ms
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StepRecord;
    use serde_json::json;

    fn sample_state() -> WorkflowState {
        let mut state = WorkflowState::named("sample");
        let outcomes = [
            StepOutcome::Success { value: json!("pat-1") },
            StepOutcome::SoftFailure { status: Some(409), body: "conflict".into() },
            StepOutcome::Skipped { missing: "appointmentId".into() },
            StepOutcome::HardFailure { error: "authentication failed".into() },
        ];
        for (i, outcome) in outcomes.into_iter().enumerate() {
            state.record(StepRecord {
                name: format!("step_{}", i),
                outcome,
                attempts: 1,
                duration_ms: 10,
            });
        }
        state.set_status(RunStatus::Aborted);
        state
    }

    #[test]
    fn test_tally_counts_each_kind() {
        let report = summarize(&sample_state());
        assert_eq!(
            report.tally,
            Tally { succeeded: 1, soft_failed: 1, hard_failed: 1, skipped: 1 }
        );
        assert_eq!(report.lines.len(), 4);
        assert_eq!(report.lines[1].detail, "HTTP 409: conflict");
        assert_eq!(report.total_duration_ms, 40);
        assert!(!report.passed());
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_summarize_is_idempotent() {
        let state = sample_state();
        assert_eq!(summarize(&state), summarize(&state));
        assert_eq!(state.records().len(), 4);
    }

    #[test]
    fn test_display_lists_every_step() {
        let text = summarize(&sample_state()).to_string();
        assert!(text.contains("Workflow: sample (aborted)"));
        assert!(text.contains("SOFT-FAIL"));
        assert!(text.contains("missing appointmentId"));
        assert!(text.ends_with("40 ms"));
    }

    #[test]
    fn test_long_detail_truncated() {
        let long = "x".repeat(500);
        assert_eq!(truncate(&long, 10), "xxxxxxxxxx...");
        assert_eq!(truncate("short", 10), "short");
    }

    #[test]
    fn test_report_serializes() {
        let json = serde_json::to_value(summarize(&sample_state())).unwrap();
        assert_eq!(json["status"], "aborted");
        assert_eq!(json["lines"][0]["kind"], "success");
        assert_eq!(json["tally"]["hard_failed"], 1);
    }
}
