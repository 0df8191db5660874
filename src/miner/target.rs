// src/miner/target.rs
//! Difficulty targets
//!
//! A digest meets a target of `d` bits when its first `d` bits (big-endian
//! bit order) are all zero. Raising `d` can only remove digests from the
//! accepting set.

use crate::types::Digest;
use crate::utils::error::MinerError;
use std::fmt;

/// Number of bits in a digest
pub const DIGEST_BITS: u32 = 256;

/// Leading-zero-bits difficulty rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HashTarget {
    difficulty_bits: u32,
}

impl HashTarget {
    /// Creates a target requiring `difficulty_bits` leading zero bits
    ///
    /// # Errors
    /// Returns `MinerError::ConfigError` above 256 bits, which no digest
    /// could ever satisfy.
    pub fn new(difficulty_bits: u32) -> Result<Self, MinerError> {
        if difficulty_bits > DIGEST_BITS {
            return Err(MinerError::ConfigError(format!(
                "difficulty {} exceeds the {}-bit digest",
                difficulty_bits, DIGEST_BITS
            )));
        }
        Ok(HashTarget { difficulty_bits })
    }

    /// Required leading zero bits
    pub fn difficulty_bits(&self) -> u32 {
        self.difficulty_bits
    }

    /// Whether `digest` meets this target
    #[inline]
    pub fn satisfies(&self, digest: &Digest) -> bool {
        leading_zero_bits(digest) >= self.difficulty_bits
    }

    /// Mean number of hashes needed to find one satisfying digest
    pub fn expected_hashes(&self) -> f64 {
        2f64.powi(self.difficulty_bits as i32)
    }
}

impl fmt::Display for HashTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bits", self.difficulty_bits)
    }
}

/// Counts leading zero bits of a digest
///
/// Two 128-bit word counts regardless of content.
#[inline]
pub fn leading_zero_bits(digest: &Digest) -> u32 {
    let mut word = [0u8; 16];
    word.copy_from_slice(&digest[..16]);
    let high = u128::from_be_bytes(word).leading_zeros();
    if high < 128 {
        return high;
    }
    word.copy_from_slice(&digest[16..]);
    128 + u128::from_be_bytes(word).leading_zeros()
}
