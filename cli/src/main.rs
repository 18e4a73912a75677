//! somrate
//!
//! Currency converter for USD, EUR, KGS and RUB with a live USD/KGS rate.

use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use commands::AdminAction;
use config::CliConfig;

/// somrate CLI
#[derive(Parser, Debug)]
#[command(name = "somrate")]
#[command(about = "Convert between USD, EUR, KGS and RUB", version)]
struct Args {
    /// Log as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert an amount between two currencies
    Convert {
        #[arg(allow_negative_numbers = true)]
        amount: f64,
        from: String,
        to: String,
    },
    /// Show the rate table in effect
    Rates,
    /// Show the live USD/KGS rate, fetching it when stale
    Live {
        /// Fetch even if the cached rate is fresh
        #[arg(long)]
        force: bool,
    },
    /// Change settings
    Admin {
        #[arg(long)]
        password: String,
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Keep the live rate fresh until interrupted
    Watch {
        /// Seconds between staleness checks
        #[arg(long, default_value = "900")]
        interval_secs: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = CliConfig::from_env();

    init_logging(args.json_logs || config.json_logs);

    config.validate().map_err(anyhow::Error::msg)?;
    info!(
        store = %config.store_path.display(),
        endpoints = config.endpoints.len(),
        "Starting somrate"
    );

    let engine = commands::build_engine(&config)?;

    match args.command {
        Command::Convert { amount, from, to } => {
            println!("{}", commands::convert(&engine, amount, &from, &to).await?);
        }
        Command::Rates => println!("{}", commands::rates(&engine)?),
        Command::Live { force } => println!("{}", commands::live(&engine, force).await?),
        Command::Admin { password, action } => {
            println!("{}", commands::admin(&engine, &password, action).await?);
        }
        Command::Watch { interval_secs } => {
            commands::watch(engine, Duration::from_secs(interval_secs.max(1))).await?;
        }
    }

    Ok(())
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
    );

    // Logs go to stderr; stdout carries command output.
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
