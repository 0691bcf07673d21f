//! Run Command

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use careflow_common::{FixtureGenerator, WorkflowConfig};
use careflow_workflow::{HealthcareOptions, HealthcareWorkflow, WorkflowReport, WorkflowRunner};
use tracing::info;

use crate::output::{print_info, print_report, OutputFormat};

pub const REPORT_FILE: &str = "workflow-report.json";

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Output format
    #[arg(long, default_value = "table")]
    pub format: OutputFormat,

    /// Directory for workflow-report.json
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,

    /// Use an existing patient instead of creating one
    #[arg(long)]
    pub patient_id: Option<String>,

    /// Use an existing provider instead of creating one
    #[arg(long)]
    pub provider_id: Option<String>,

    /// Seed for reproducible fixtures
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Run the healthcare workflow and return the process exit code
pub async fn execute(args: RunArgs, config: WorkflowConfig) -> Result<i32> {
    let runner = WorkflowRunner::from_config(&config)?;

    let mut options = HealthcareOptions::from_config(&config);
    options.patient_id = args.patient_id;
    options.provider_id = args.provider_id;

    let fixtures = match args.seed {
        Some(seed) => FixtureGenerator::seeded(seed),
        None => FixtureGenerator::new(),
    };

    info!("Running healthcare workflow against {}", config.endpoint_url(""));
    let steps = HealthcareWorkflow::new(fixtures, options).steps();
    let report = runner.run_workflow(HealthcareWorkflow::NAME, &steps).await;

    print_report(&report, args.format);
    let path = write_report(&report, &args.output)?;
    if args.format == OutputFormat::Table {
        print_info(&format!("Report written to {}", path.display()));
    }

    Ok(report.exit_code())
}

pub fn write_report(report: &WorkflowReport, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(REPORT_FILE);
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use careflow_workflow::{RunStatus, Tally};

    #[test]
    fn test_report_written_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let report = WorkflowReport {
            workflow: "healthcare".into(),
            status: RunStatus::Aborted,
            lines: Vec::new(),
            tally: Tally::default(),
            total_duration_ms: 0,
        };

        let path = write_report(&report, &dir.path().join("nested")).unwrap();
        assert!(path.ends_with(REPORT_FILE));

        let parsed: WorkflowReport =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(parsed, report);
    }
}
