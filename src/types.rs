// src/types.rs
use crate::miner::target::{HashTarget, leading_zero_bits};
use sha3::{Digest as _, Keccak256};
use solana_sdk::pubkey::Pubkey;

/// 32-byte proof-of-work digest
pub type Digest = [u8; 32];

/// Length of a challenge base seed (`authority || round challenge`)
pub const SEED_LEN: usize = 64;

/// One cycle's unit of work
///
/// Built from a fresh [`MinerAccountState`] snapshot and discarded once the
/// cycle ends. Searchers hash `base_seed || le(nonce_base + offset)` for
/// offsets in `[0, nonce_space)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiningChallenge {
    /// Bytes prefixed to every nonce
    pub base_seed: [u8; SEED_LEN],
    /// Absolute nonce of offset zero
    pub nonce_base: u64,
    /// Difficulty every proof must meet
    pub target: HashTarget,
    /// On-chain round the seed was read from
    pub round: u64,
}

impl MiningChallenge {
    /// Creates a challenge from raw parts
    pub fn new(base_seed: [u8; SEED_LEN], nonce_base: u64, target: HashTarget, round: u64) -> Self {
        MiningChallenge {
            base_seed,
            nonce_base,
            target,
            round,
        }
    }

    /// Derives this cycle's challenge from the miner's account snapshot
    ///
    /// The round challenge only changes when the round rotates, so the
    /// starting nonce is derived from the miner's own advancing counters
    /// and a caller-supplied `salt`. A confirmed proof moves `total_hashes`
    /// and `last_hash_at`; the salt moves the window when nothing on chain
    /// changed, e.g. after a search that found nothing.
    pub fn from_account(
        authority: &Pubkey,
        state: &MinerAccountState,
        target: HashTarget,
        salt: u64,
    ) -> Self {
        let mut base_seed = [0u8; SEED_LEN];
        base_seed[..32].copy_from_slice(authority.as_ref());
        base_seed[32..].copy_from_slice(&state.challenge);

        let mut hasher = Keccak256::new();
        hasher.update(base_seed);
        hasher.update(state.total_hashes.to_le_bytes());
        hasher.update(state.last_hash_at.to_le_bytes());
        hasher.update(state.round_number.to_le_bytes());
        hasher.update(salt.to_le_bytes());
        let mixed: Digest = hasher.finalize().into();

        let mut head = [0u8; 8];
        head.copy_from_slice(&mixed[..8]);

        MiningChallenge::new(base_seed, u64::from_le_bytes(head), target, state.round_number)
    }

    /// Absolute nonce for a search offset
    #[inline]
    pub fn nonce_at(&self, offset: u64) -> u64 {
        self.nonce_base.wrapping_add(offset)
    }
}

/// A digest that met the challenge target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateProof {
    /// Position inside the cycle's search space
    pub offset: u64,
    /// Absolute nonce submitted on chain
    pub nonce: u64,
    /// `Keccak256(base_seed || le(nonce))`
    pub digest: Digest,
    /// Round of the challenge that produced it
    pub round: u64,
}

impl CandidateProof {
    /// Leading zero bits actually achieved
    pub fn difficulty(&self) -> u32 {
        leading_zero_bits(&self.digest)
    }
}

/// Read-only snapshot of the miner PDA joined with the global round
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MinerAccountState {
    /// Wallet that owns the miner account
    pub authority: Pubkey,
    /// Accepted proofs credited on chain
    pub total_hashes: u64,
    /// Completed ten-proof streaks
    pub rounds_completed: u32,
    /// Unix timestamp of the last accepted proof
    pub last_hash_at: i64,
    /// Proofs in the current streak
    pub current_streak: u32,
    /// Highest difficulty ever credited
    pub best_difficulty: u8,
    /// Current round challenge
    pub challenge: [u8; 32],
    /// Current round number
    pub round_number: u64,
    /// Lowest difficulty the program currently accepts
    pub min_difficulty: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> MinerAccountState {
        MinerAccountState {
            challenge: [0x22; 32],
            round_number: 3,
            total_hashes: 10,
            last_hash_at: 1_700_000_000,
            ..Default::default()
        }
    }

    #[test]
    fn seed_is_authority_then_challenge() {
        let authority = Pubkey::new_from_array([0x11; 32]);
        let challenge =
            MiningChallenge::from_account(&authority, &state(), HashTarget::new(8).unwrap(), 0);

        assert_eq!(&challenge.base_seed[..32], &[0x11; 32]);
        assert_eq!(&challenge.base_seed[32..], &[0x22; 32]);
        assert_eq!(challenge.round, 3);
    }

    #[test]
    fn window_moves_when_account_advances() {
        let authority = Pubkey::new_from_array([0x11; 32]);
        let target = HashTarget::new(8).unwrap();
        let before = MiningChallenge::from_account(&authority, &state(), target, 0);
        let again = MiningChallenge::from_account(&authority, &state(), target, 0);
        let salted = MiningChallenge::from_account(&authority, &state(), target, 1);
        let advanced = MinerAccountState {
            total_hashes: 11,
            ..state()
        };
        let after = MiningChallenge::from_account(&authority, &advanced, target, 0);

        assert_eq!(before.nonce_base, again.nonce_base);
        assert_ne!(before.nonce_base, after.nonce_base);
        assert_ne!(before.nonce_base, salted.nonce_base);
        assert_eq!(before.base_seed, salted.base_seed);
    }

    #[test]
    fn nonce_wraps() {
        let challenge = MiningChallenge::new([0; SEED_LEN], u64::MAX, HashTarget::new(0).unwrap(), 0);
        assert_eq!(challenge.nonce_at(0), u64::MAX);
        assert_eq!(challenge.nonce_at(1), 0);
    }
}
