// src/miner/mod.rs
//! Core mining functionality
//!
//! This module contains all components related to the nonce search:
//! - Proof hash function (Keccak-256)
//! - Difficulty targets
//! - Search workers and the pool that coordinates them

/// Proof hash implementations
pub mod algorithm;

/// Leading-zero-bits difficulty targets
pub mod target;

/// Mining pool
///
/// Partitions the nonce space, runs one worker per range and picks the
/// lowest-offset proof.
pub mod scheduler;

/// Worker implementation
///
/// Contains the searcher that performs the actual hash computations.
pub mod worker;

// Re-export main components for cleaner imports
pub use self::algorithm::{Algorithm, Keccak};
pub use self::scheduler::{MiningPool, SearchOutcome, SearchReport, TimeoutCause, partition};
pub use self::target::HashTarget;
pub use self::worker::{NonceSearcher, POLL_INTERVAL, SearchControl, StopReason};
