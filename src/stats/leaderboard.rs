// src/stats/leaderboard.rs
//! Ranking of miner accounts by on-chain totals

use crate::network::program::MinerRecord;
use solana_sdk::pubkey::Pubkey;

/// Tokens credited per full million hashes
pub const TOKENS_PER_MILLION_HASHES: u64 = 100;

/// Hashes a miner needs before any allocation is computed
pub const MINIMUM_HASHES_FOR_AIRDROP: u64 = 100_000;

/// One ranked miner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    /// 1-based position
    pub rank: usize,
    /// Wallet that owns the miner account
    pub authority: Pubkey,
    /// Hashes credited on chain
    pub total_hashes: u64,
    /// Accepted proofs
    pub rounds_completed: u32,
    /// Highest difficulty submitted
    pub best_difficulty: u8,
    /// Estimated airdrop in whole tokens
    pub allocation: u64,
}

/// Estimated airdrop for a hash total
pub fn airdrop_allocation(total_hashes: u64) -> u64 {
    if total_hashes < MINIMUM_HASHES_FOR_AIRDROP {
        return 0;
    }
    (total_hashes / 1_000_000) * TOKENS_PER_MILLION_HASHES
}

/// Sorts miners by total hashes, then rounds, and keeps the first `top`
pub fn rank_miners(mut miners: Vec<MinerRecord>, top: usize) -> Vec<LeaderboardEntry> {
    miners.sort_by(|a, b| {
        b.total_hashes
            .cmp(&a.total_hashes)
            .then(b.rounds_completed.cmp(&a.rounds_completed))
    });

    miners
        .into_iter()
        .take(top)
        .enumerate()
        .map(|(i, m)| LeaderboardEntry {
            rank: i + 1,
            authority: m.authority,
            total_hashes: m.total_hashes,
            rounds_completed: m.rounds_completed,
            best_difficulty: m.best_difficulty,
            allocation: airdrop_allocation(m.total_hashes),
        })
        .collect()
}
