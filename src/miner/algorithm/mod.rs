// src/miner/algorithm/mod.rs
//! Proof-of-work hash functions
//!
//! The searchers only see the [`Algorithm`] trait, so tests can swap in
//! hashers that fail or panic on chosen nonces.

/// Keccak-256 proof hash used by the mining program
pub mod keccak;

pub use keccak::Keccak;

use crate::miner::target::HashTarget;
use crate::types::Digest;
use crate::utils::error::MinerError;

/// Common interface for proof hash functions
pub trait Algorithm: Send + Sync {
    /// Compute the digest for a seed and nonce
    ///
    /// # Arguments
    /// * `seed` - Challenge bytes prefixed to the nonce
    /// * `nonce` - Nonce appended little-endian
    ///
    /// # Returns
    /// 32-byte digest or error if computation fails
    fn hash(&self, seed: &[u8], nonce: u64) -> Result<Digest, MinerError>;

    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Recompute the digest and check it against `target`
    fn verify(&self, seed: &[u8], nonce: u64, target: &HashTarget) -> Result<bool, MinerError> {
        Ok(target.satisfies(&self.hash(seed, nonce)?))
    }
}
