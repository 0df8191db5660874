// src/miner/algorithm/keccak.rs
//! Keccak-256 proof hash
//!
//! Matches the on-chain check: `keccak256(authority || challenge || le(nonce))`.
//! This is the original Keccak padding, not NIST SHA3-256.

use crate::miner::algorithm::Algorithm;
use crate::types::Digest;
use crate::utils::error::MinerError;
use sha3::{Digest as _, Keccak256};

/// Stateless Keccak-256 hasher
#[derive(Debug, Clone, Copy, Default)]
pub struct Keccak;

impl Keccak {
    /// Hashes without going through `Result`; Keccak cannot fail
    #[inline]
    pub fn digest(seed: &[u8], nonce: u64) -> Digest {
        let mut hasher = Keccak256::new();
        hasher.update(seed);
        hasher.update(nonce.to_le_bytes());
        hasher.finalize().into()
    }
}

impl Algorithm for Keccak {
    fn hash(&self, seed: &[u8], nonce: u64) -> Result<Digest, MinerError> {
        Ok(Keccak::digest(seed, nonce))
    }

    fn name(&self) -> &'static str {
        "keccak256"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::miner::target::HashTarget;
    use hex_literal::hex;

    fn seed() -> [u8; 64] {
        let mut seed = [0x22; 64];
        seed[..32].fill(0x11);
        seed
    }

    #[test]
    fn empty_input_vector() {
        let digest: Digest = Keccak256::digest(b"").into();
        assert_eq!(
            digest,
            hex!("c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470")
        );
    }

    #[test]
    fn known_proof() {
        let digest = Keccak.hash(&seed(), 158).unwrap();
        assert_eq!(
            digest,
            hex!("009b7640f611042e69adb337a8ef332b8ca49e8594fa6c827fd7e33b41a48a35")
        );
        assert!(Keccak.verify(&seed(), 158, &HashTarget::new(8).unwrap()).unwrap());
        assert!(!Keccak.verify(&seed(), 158, &HashTarget::new(9).unwrap()).unwrap());
    }

    #[test]
    fn nonce_changes_digest() {
        assert_ne!(Keccak::digest(&seed(), 0), Keccak::digest(&seed(), 1));
    }
}
