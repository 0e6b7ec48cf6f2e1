//! p2pcdn CLI entry point.

mod cli;
mod simulate;

use clap::Parser;
use cli::{Cli, Command};
use color_eyre::eyre::eyre;
use p2pcdn_escrow::MarketConfig;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }

    info!("p2pcdn v{}", env!("CARGO_PKG_VERSION"));

    let config = cli.market_config()?;

    match cli.command {
        Command::Simulate {
            scenario,
            chunks,
            start_index,
            acknowledge,
        } => {
            let script = simulate::Script {
                scenario,
                chunks,
                start_index,
                acknowledge: acknowledge.unwrap_or(chunks),
            };
            simulate::run(config, script).await?;
        }
        Command::InitConfig { path, force } => init_config(&config, path, force)?,
    }

    info!("Goodbye!");
    Ok(())
}

fn init_config(config: &MarketConfig, path: Option<PathBuf>, force: bool) -> color_eyre::Result<()> {
    let path = path.unwrap_or_else(|| config.data_dir.join("p2pcdn.toml"));
    if path.exists() && !force {
        return Err(eyre!(
            "{} already exists (use --force to overwrite)",
            path.display()
        ));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    config.to_file(&path)?;
    println!("Wrote configuration to {}", path.display());
    Ok(())
}
