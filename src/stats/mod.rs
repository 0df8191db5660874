// src/stats/mod.rs
//! Statistics collection and reporting module
//!
//! This module provides functionality for tracking and reporting mining statistics,
//! including:
//! - Run counters (cycles, accepted/rejected proofs, hash totals)
//! - Periodic progress lines with host CPU and memory usage
//! - Leaderboard ranking and airdrop allocation estimates
//!
//! The supervisor owns the only writer, a [`StatsTracker`]; the reporter and
//! the CLI only read snapshots.

/// Thread-safe run counters and snapshots
pub mod tracker;

/// Periodic progress reporter
///
/// The reporter handles:
/// - Hardware monitoring
/// - Periodic logging of tracker snapshots
pub mod reporter;

/// Miner ranking by on-chain totals
pub mod leaderboard;

// Re-export main components
pub use leaderboard::{LeaderboardEntry, airdrop_allocation, rank_miners};
pub use reporter::{HardwareStats, StatsReporter};
pub use tracker::{CycleOutcome, HashCounter, RunSnapshot, StatsTracker};
