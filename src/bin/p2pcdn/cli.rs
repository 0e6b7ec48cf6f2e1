//! Command-line interface definition.

use clap::{Parser, Subcommand, ValueEnum};
use p2pcdn_escrow::MarketConfig;
use std::path::PathBuf;

/// Escrow authority for a peer-to-peer content delivery market.
#[derive(Parser, Debug)]
#[command(name = "p2pcdn")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file.
    #[arg(long, short, env = "P2PCDN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Seconds the consumer has to contest revealed keys.
    #[arg(long, env = "P2PCDN_DISPUTE_WINDOW")]
    pub dispute_window: Option<u64>,

    /// Seconds a dispute stays open for proof of misbehavior.
    #[arg(long, env = "P2PCDN_POM_WINDOW")]
    pub pom_window: Option<u64>,

    /// Log level.
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Emit logs as JSON.
    #[arg(long, env = "P2PCDN_JSON_LOGS")]
    pub json_logs: bool,

    /// What to do.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a complete scripted session against an in-memory authority.
    Simulate {
        /// Which script to run.
        #[arg(long, value_enum, default_value = "honest")]
        scenario: Scenario,

        /// Number of content chunks.
        #[arg(long, default_value = "8")]
        chunks: u64,

        /// First chunk the consumer requests.
        #[arg(long, default_value = "1")]
        start_index: u64,

        /// Last chunk the consumer acknowledges (defaults to all).
        #[arg(long)]
        acknowledge: Option<u64>,
    },

    /// Write the default configuration file.
    InitConfig {
        /// Destination (defaults to `p2pcdn.toml` in the data directory).
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

/// Simulation script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Keys are correct and the dispute window lapses.
    Honest,
    /// The provider serves a corrupted chunk and the consumer proves it.
    Dispute,
}

impl Cli {
    /// Build the market configuration from the file and flag overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is specified but cannot be loaded.
    pub fn market_config(&self) -> color_eyre::Result<MarketConfig> {
        // Start with default config or load from file
        let mut config = if let Some(ref path) = self.config {
            MarketConfig::from_file(path)?
        } else {
            MarketConfig::default()
        };

        if let Some(secs) = self.dispute_window {
            config.dispute_window_secs = secs;
        }
        if let Some(secs) = self.pom_window {
            config.pom_window_secs = secs;
        }
        config.log_level.clone_from(&self.log_level);

        Ok(config)
    }
}
