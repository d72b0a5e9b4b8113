//! Scaling Policy Planner CLI
//!
//! A command-line tool for inspecting stored scaling policies, pushing
//! forecast updates and evaluating candidate batches locally.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use commands::{evaluate, forecast, policies};
use std::path::PathBuf;
use uuid::Uuid;

/// Scaling Policy Planner CLI
#[derive(Parser)]
#[command(name = "spd")]
#[command(author, version, about = "CLI for the Scaling Policy Planner", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via SPD_API_URL env var)
    #[arg(long, env = "SPD_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short = 'o', default_value = "table", global = true)]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Query stored scaling policies
    #[command(subcommand)]
    Policies(PolicyCommands),

    /// Delete a stored policy
    Delete {
        /// Policy ID to delete
        id: Uuid,

        /// Delete without asking for confirmation
        #[arg(long, short)]
        force: bool,
    },

    /// Forecast commands
    #[command(subcommand)]
    Forecast(ForecastCommands),

    /// Evaluate a batch of candidate policies locally
    Evaluate {
        /// Path to the JSON batch file
        batch: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum PolicyCommands {
    /// List policies, optionally within a time window
    List {
        /// Only policies starting at or after this time (RFC 3339)
        #[arg(long)]
        start: Option<DateTime<Utc>>,

        /// Only policies ending at or before this time (RFC 3339)
        #[arg(long)]
        end: Option<DateTime<Utc>>,
    },

    /// Show a single policy with its scaling actions
    Get {
        /// Policy ID
        id: Uuid,
    },

    /// Show the selected policy of a time window
    Selected {
        /// Window start (RFC 3339)
        #[arg(long)]
        start: DateTime<Utc>,

        /// Window end (RFC 3339)
        #[arg(long)]
        end: DateTime<Utc>,
    },
}

#[derive(Subcommand)]
pub enum ForecastCommands {
    /// Push a forecast update and trigger re-planning of its window
    Push {
        /// Path to the forecast JSON file
        file: PathBuf,
    },
}

fn api_client(cli: &Cli) -> Result<client::ApiClient> {
    let api_url = config::Config::load()?.resolve_api_url(cli.api_url.clone());
    if cli.verbose {
        output::print_info(&format!("Using planner API at {}", api_url));
    }
    client::ApiClient::new(&api_url)
}

async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Policies(cmd) => {
            let client = api_client(&cli)?;
            match cmd {
                PolicyCommands::List { start, end } => {
                    policies::list_policies(&client, *start, *end, cli.format).await?;
                }
                PolicyCommands::Get { id } => {
                    policies::get_policy(&client, *id, cli.format).await?;
                }
                PolicyCommands::Selected { start, end } => {
                    policies::selected_policy(&client, *start, *end, cli.format).await?;
                }
            }
        }
        Commands::Delete { id, force } => {
            let client = api_client(&cli)?;
            policies::delete_policy(&client, *id, *force).await?;
        }
        Commands::Forecast(ForecastCommands::Push { file }) => {
            let client = api_client(&cli)?;
            forecast::push_forecast(&client, file, cli.format).await?;
        }
        Commands::Evaluate { batch } => {
            evaluate::evaluate_batch(batch, cli.format)?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
