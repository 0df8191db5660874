// src/utils/error.rs
use std::io;
use thiserror::Error;

/// Coarse failure classes the supervisor and submitter branch on
///
/// Every [`MinerError`] maps to exactly one kind. Only `Configuration`
/// is fatal; everything else is retried, counted or clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Misconfiguration that no amount of retrying fixes
    Configuration,
    /// Timeouts, resets and unreachable endpoints
    TransientNetwork,
    /// The ledger asked us to slow down
    RateLimited,
    /// The ledger definitively refused a proof
    LedgerRejection,
    /// A requested resource exceeded what the host offers
    ResourceExhaustion,
    /// Local failures that are neither fatal nor network related
    Internal,
}

/// Main error type for the mining application
///
/// This enum represents all possible error conditions that can occur
/// while mining, talking to the ledger, or loading configuration.
#[derive(Error, Debug)]
pub enum MinerError {
    /// Configuration file, parameter or wallet errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The miner PDA does not exist yet
    #[error("Miner account for {0} is not initialized (run `init` first)")]
    AccountNotInitialized(String),

    /// Errors related to network connectivity
    #[error("Network connection error: {0}")]
    ConnectionError(String),

    /// The ledger or RPC provider throttled the request
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// The transaction's recent blockhash is no longer accepted
    #[error("Blockhash expired: {0}")]
    BlockhashExpired(String),

    /// Terminal refusal of a proof by the ledger
    #[error("Proof rejected: {0}")]
    Rejected(String),

    /// On-chain data that does not match the expected program layout
    #[error("Protocol violation: {0}")]
    ProtocolError(String),

    /// A requested resource was clamped to what is available
    #[error("Resource limit: {0}")]
    ResourceError(String),

    /// Standard I/O operation errors
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    /// Signing and key handling errors
    #[error("Cryptographic error: {0}")]
    CryptoError(String),

    /// A search worker failed or panicked
    #[error("Worker error: {0}")]
    WorkerError(String),
}

impl MinerError {
    /// Classifies this error for retry decisions
    pub fn kind(&self) -> ErrorKind {
        match self {
            MinerError::ConfigError(_)
            | MinerError::AccountNotInitialized(_)
            | MinerError::ProtocolError(_)
            | MinerError::UrlError(_)
            | MinerError::CryptoError(_) => ErrorKind::Configuration,
            MinerError::ConnectionError(_) | MinerError::BlockhashExpired(_) => {
                ErrorKind::TransientNetwork
            }
            MinerError::RateLimited(_) => ErrorKind::RateLimited,
            MinerError::Rejected(_) => ErrorKind::LedgerRejection,
            MinerError::ResourceError(_) => ErrorKind::ResourceExhaustion,
            MinerError::IoError(_) | MinerError::JsonError(_) | MinerError::WorkerError(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// True when the process must stop rather than retry
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }

    /// True for failures worth retrying with backoff
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::TransientNetwork | ErrorKind::RateLimited
        )
    }
}

impl From<toml::de::Error> for MinerError {
    fn from(e: toml::de::Error) -> Self {
        MinerError::ConfigError(format!("Invalid config format: {}", e))
    }
}
