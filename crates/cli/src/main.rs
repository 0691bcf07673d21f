//! Careflow CLI - Main Entry Point
//!
//! Runs the healthcare scheduling workflow against a configured tenant and
//! reports every step's outcome.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use careflow_cli::commands::{fixtures, login, run, ConfigSource};
use careflow_cli::output::print_error;

/// Careflow - sequential workflow runner for healthcare scheduling APIs
#[derive(Parser)]
#[command(name = "careflow")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (defaults to ~/.careflow/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Named environment from the configuration file
    #[arg(long, global = true)]
    env: Option<String>,

    /// Override the API base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Override the tenant identifier
    #[arg(long, global = true)]
    tenant: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the healthcare workflow
    Run(run::RunArgs),

    /// Acquire a token once to check credentials
    Login,

    /// Print a generated patient/provider pair
    Fixtures(fixtures::FixturesArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let source = ConfigSource {
        path: cli.config,
        env: cli.env,
        base_url: cli.base_url,
        tenant: cli.tenant,
    };

    match cli.command {
        Commands::Run(args) => {
            let code = run::execute(args, source.resolve()?).await?;
            std::process::exit(code);
        }
        Commands::Login => {
            if let Err(e) = login::execute(source.resolve()?).await {
                print_error(&e.to_string());
                std::process::exit(1);
            }
        }
        Commands::Fixtures(args) => fixtures::execute(args)?,
    }

    Ok(())
}
