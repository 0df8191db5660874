// src/utils/mod.rs
//! Utilities module for common functionality
//!
//! This module contains shared utilities used throughout the mining application,
//! including error handling, logging, retry backoff and stop handling.

/// Error types and handling utilities
///
/// Contains the [`MinerError`] enum which defines all possible error conditions
/// for the mining application, and the [`ErrorKind`] classification used for
/// retry decisions.
pub mod error;

/// Logging configuration and utilities
pub mod logging;

/// Exponential backoff with jitter
pub mod backoff;

/// Operator interrupt handling
pub mod signal;

// Re-export for easier access
pub use backoff::BackoffPolicy;
pub use error::{ErrorKind, MinerError};
pub use logging::init_logging;
pub use signal::{StopSignal, listen_for_interrupt};
