//! TestORE Miner - proof-of-work mining client in Rust
//!
//! This crate searches for Keccak-256 proofs against the TestORE program's
//! on-chain challenge and submits them:
//! - Multi-threaded, deterministic nonce search
//! - Proof submission with retry and backoff
//! - Forever mode that survives transient network failures
//! - Run statistics, leaderboard and airdrop estimates

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Miner core implementation including the hash, targets and the pool
pub mod miner;

/// Ledger communication and proof submission
pub mod network;

/// Statistics collection and reporting functionality
pub mod stats;

/// Mining loop
pub mod supervisor;

/// Utility functions and error handling
pub mod utils;

/// Command-line interface definitions
pub mod cli;

/// Configuration management
pub mod config;

/// Shared type definitions
pub mod types;

// Core exports
pub use cli::Commands;
pub use config::Config;
pub use miner::{Algorithm, HashTarget, Keccak, MiningPool, NonceSearcher};
pub use network::{Ledger, ProofSubmitter, RpcLedger};
pub use stats::{RunSnapshot, StatsReporter, StatsTracker};
pub use supervisor::{MiningSupervisor, SupervisorConfig};
pub use types::{CandidateProof, MinerAccountState, MiningChallenge};
pub use utils::{MinerError, init_logging};
