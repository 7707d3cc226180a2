//! Peerwarden CLI - Main Entry Point
//!
//! Operator front end for provisioning and revoking WireGuard clients on
//! this server.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

mod commands;
mod output;

use commands::client;
use peerwarden_core::{ClientManager, ProvisionerConfig};

/// Peerwarden - WireGuard client provisioning
#[derive(Parser)]
#[command(name = "peerwarden")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "PEERWARDEN_CONFIG", default_value_os_t = peerwarden_core::default_config_path(), global = true)]
    config: PathBuf,

    /// Identity of the caller, checked against the configured operator
    #[arg(long, env = "PEERWARDEN_OPERATOR", global = true)]
    operator: Option<i64>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Client(client::ClientCommands),

    /// Liveness check
    Ping,

    /// Print the effective configuration
    Config,
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
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Ping = cli.command {
        output::print_pong(cli.format);
        return Ok(());
    }

    // Load configuration once; it is read-only from here on
    let config = ProvisionerConfig::load(&cli.config)?.with_env_overrides()?;
    config.validate()?;
    let config = Arc::new(config);
    debug!("Loaded configuration from {}", cli.config.display());

    match cli.command {
        Commands::Ping => {}
        Commands::Config => println!("{}", commands::redacted_config(&config)?),
        Commands::Client(cmd) => {
            if !commands::authorize(&config, cli.operator) {
                warn!("Rejected command from operator {:?}", cli.operator);
                output::print_refusal(output::Refusal::NotAuthorized, None, cli.format);
                return Ok(());
            }
            let manager = ClientManager::from_config(config);
            client::execute(cmd, &manager, cli.format).await?;
        }
    }

    Ok(())
}
