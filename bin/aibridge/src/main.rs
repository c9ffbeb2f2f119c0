mod commands;
mod supervisor;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "aibridge")]
#[command(about = "Multi-assistant coordination bridge", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bridge: spawn and supervise all configured adapters
    Up {
        /// Config file (defaults to ~/.aibridge/config.json)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Run a single adapter on stdio (spawned by `up`, or by a host directly)
    Adapter,

    /// Write a starter configuration
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Run environment diagnostics
    Doctor,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    // Logs always go to stderr: in adapter mode stdout carries the
    // protocol, and the supervisor tags child stderr per adapter.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Up { config } => commands::up::run(config).await,
        Commands::Adapter => commands::adapter_cmd::run().await,
        Commands::Init { force } => commands::init::run(force),
        Commands::Doctor => commands::doctor::run().await,
    }
}
