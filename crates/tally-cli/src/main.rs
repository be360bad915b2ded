//! Tally CLI - Credit ledger and consumption engine
//!
//! A command-line interface for provisioning account quotas, consuming and
//! replenishing credits, and inspecting usage statistics.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tally")]
#[command(author, version, about = "Credit ledger and consumption engine CLI", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format: table (default) or json
    #[arg(long, global = true, default_value = "table")]
    format: output::OutputFormat,

    /// Suppress progress messages
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Override database path (or set TALLY_DB_PATH env var)
    #[arg(long, env = "TALLY_DB_PATH", global = true)]
    db: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage account quotas
    Account {
        #[command(subcommand)]
        action: commands::account::AccountAction,
    },

    /// Reserve credits for a metered operation
    Consume {
        /// Account identifier
        #[arg(long)]
        account: String,

        /// Credits to consume
        #[arg(long)]
        amount: i64,
    },

    /// Add purchased credits to an account
    Purchase {
        /// Account identifier
        #[arg(long)]
        account: String,

        /// Credits to add
        #[arg(long)]
        amount: i64,
    },

    /// Roll the monthly pool forward to a new cycle (scheduler hook)
    Reset {
        /// Account identifier
        #[arg(long)]
        account: String,
    },

    /// Show derived usage statistics for an account
    Stats {
        /// Account identifier
        #[arg(long)]
        account: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    // Set up database path if provided
    if let Some(db_path) = &cli.db {
        std::env::set_var("TALLY_DB_PATH", db_path);
    }

    // Initialize database
    let db = tally_core::Database::new().await?;

    // Create context for commands
    let ctx = commands::Context {
        db,
        format: cli.format,
        quiet: cli.quiet,
    };

    // Execute command
    match cli.command {
        Commands::Account { action } => commands::account::execute(&ctx, action).await,
        Commands::Consume { account, amount } => {
            commands::ledger::consume(&ctx, &account, amount).await
        }
        Commands::Purchase { account, amount } => {
            commands::ledger::purchase(&ctx, &account, amount).await
        }
        Commands::Reset { account } => commands::ledger::reset(&ctx, &account).await,
        Commands::Stats { account } => commands::stats::execute(&ctx, &account).await,
    }
}
