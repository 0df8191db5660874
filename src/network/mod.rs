// src/network/mod.rs
//! Ledger communication components
//!
//! This module handles every interaction with the TestORE program:
//! - `program`: account layouts, PDAs and instruction builders
//! - `ledger`: the [`Ledger`] seam the miner talks through
//! - `rpc`: the JSON-RPC implementation of that seam
//! - `submitter`: the proof submission state machine

/// Program accounts, instructions and error codes
pub mod program;

/// Ledger abstraction
pub mod ledger;

/// JSON-RPC ledger client
///
/// Wraps the blocking Solana RPC client and maps its failures onto
/// [`MinerError`](crate::utils::MinerError) kinds.
pub mod rpc;

/// Proof submission with retries
pub mod submitter;

// Re-export main components for cleaner imports
pub use ledger::{Ledger, TxStatus};
pub use program::{MinerRecord, ProgramAccounts, RoundRecord};
pub use rpc::RpcLedger;
pub use submitter::{Phase, ProofSubmitter, SubmitOutcome};
