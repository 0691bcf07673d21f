//! Fixtures Command

use anyhow::Result;
use clap::Args;
use careflow_common::FixtureGenerator;
use serde_json::json;

use crate::output::print_json;

#[derive(Args, Debug)]
pub struct FixturesArgs {
    /// Seed for reproducible fixtures
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Print a generated patient/provider pair
pub fn execute(args: FixturesArgs) -> Result<()> {
    let mut generator = match args.seed {
        Some(seed) => FixtureGenerator::seeded(seed),
        None => FixtureGenerator::new(),
    };
    let patient = generator.patient();
    let provider = generator.provider();

    print_json(&json!({
        "patient": patient,
        "provider": provider,
    }));
    Ok(())
}
