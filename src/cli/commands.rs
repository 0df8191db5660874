// src/cli/commands.rs
use crate::config::Config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// TestORE Miner CLI - proof-of-work mining client for the TestORE program
#[derive(Parser, Debug)]
#[command(name = "testore-miner")]
#[command(version, about, long_about = None)]
pub struct Commands {
    /// Path to configuration file (defaults to ./testore.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// JSON-RPC endpoint (overrides config)
    #[arg(long, global = true)]
    pub rpc_url: Option<String>,

    /// Wallet keypair file (overrides config)
    #[arg(short, long, global = true)]
    pub keypair: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The action to perform
    #[command(subcommand)]
    pub action: Action,
}

/// Top-level commands for the miner application
#[derive(Subcommand, Debug)]
pub enum Action {
    /// Create the miner account for this wallet
    Init,

    /// Search for proofs and submit them
    Mine(MineOptions),

    /// Request test SOL for the wallet
    Airdrop(AirdropOptions),

    /// Show the wallet balance
    Balance,

    /// Show the on-chain miner account and the last local run
    Stats,

    /// Rank miners by total hashes
    Leaderboard(LeaderboardOptions),

    /// Generate configuration file template
    Config(ConfigOptions),
}

/// Options for the mining operation
#[derive(Parser, Debug)]
pub struct MineOptions {
    /// Number of worker threads to use (overrides config)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Minimum leading zero bits per proof (overrides config)
    #[arg(short, long)]
    pub difficulty: Option<u32>,

    /// Keep mining cycles until interrupted
    #[arg(short, long)]
    pub forever: bool,
}

/// Options for the airdrop request
#[derive(Parser, Debug)]
pub struct AirdropOptions {
    /// Amount in SOL
    #[arg(default_value_t = 1.0)]
    pub amount: f64,
}

/// Options for the leaderboard
#[derive(Parser, Debug)]
pub struct LeaderboardOptions {
    /// Number of miners to show
    #[arg(short, long, default_value_t = 10)]
    pub top: usize,
}

/// Options for generating configuration files
#[derive(Parser, Debug)]
pub struct ConfigOptions {
    /// Output file path
    #[arg(short, long, default_value = "testore.toml")]
    pub output: PathBuf,
}

impl Commands {
    /// Applies the global and `mine` overrides on top of `config`
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(url) = &self.rpc_url {
            config.rpc_url = url.clone();
        }
        if let Some(keypair) = &self.keypair {
            config.keypair = keypair.clone();
        }
        if let Action::Mine(opts) = &self.action {
            if let Some(threads) = opts.threads {
                config.threads = threads;
            }
            if let Some(difficulty) = opts.difficulty {
                config.difficulty = difficulty;
            }
        }
    }
}
