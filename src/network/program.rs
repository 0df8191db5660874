// src/network/program.rs
//! TestORE program bindings
//!
//! Addresses, account layouts, instruction encoding and error codes of the
//! on-chain mining program. Accounts use the Anchor layout: an 8-byte type
//! discriminator followed by the fields in declaration order, little-endian.

use crate::types::MinerAccountState;
use crate::utils::error::MinerError;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_program;

/// PDA seed prefix of per-wallet miner accounts
pub const MINER_SEED: &[u8] = b"miner";
/// PDA seed of the singleton round account
pub const GLOBAL_ROUND_SEED: &[u8] = b"global_round";

/// `sha256("global:submit_proof")[..8]`
pub const SUBMIT_PROOF_DISCRIMINATOR: [u8; 8] = [54, 241, 46, 84, 4, 212, 46, 94];
/// `sha256("global:initialize_miner")[..8]`
pub const INITIALIZE_MINER_DISCRIMINATOR: [u8; 8] = [170, 106, 254, 94, 49, 203, 51, 79];
/// `sha256("account:Miner")[..8]`
pub const MINER_ACCOUNT_DISCRIMINATOR: [u8; 8] = [223, 113, 15, 54, 123, 122, 140, 100];
/// `sha256("account:GlobalRound")[..8]`
pub const GLOBAL_ROUND_DISCRIMINATOR: [u8; 8] = [176, 99, 93, 186, 255, 239, 26, 26];

/// Serialized size of a miner account
pub const MINER_ACCOUNT_LEN: usize = 8 + 32 + 8 + 4 + 8 + 4 + 1 + 1;
/// Serialized size of the round account
pub const GLOBAL_ROUND_LEN: usize = 8 + 32 + 8 + 8 + 1 + 8 + 8 + 32 + 1;

/// Custom error codes returned by the program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramErrorCode {
    /// Digest does not meet the claimed difficulty; also what a proof
    /// computed against an old challenge produces
    InsufficientDifficulty,
    /// Less than one second since the miner's last accepted proof
    TooManySubmissions,
    /// Claimed difficulty is below the round minimum
    DifficultyTooLow,
    /// Anchor: an account the instruction needs does not exist
    AccountNotInitialized,
}

impl ProgramErrorCode {
    /// Maps a `Custom(code)` instruction error
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            6000 => Some(Self::InsufficientDifficulty),
            6001 => Some(Self::TooManySubmissions),
            6002 => Some(Self::DifficultyTooLow),
            3012 => Some(Self::AccountNotInitialized),
            _ => None,
        }
    }

    /// Numeric code as raised by the program
    pub fn code(&self) -> u32 {
        match self {
            Self::InsufficientDifficulty => 6000,
            Self::TooManySubmissions => 6001,
            Self::DifficultyTooLow => 6002,
            Self::AccountNotInitialized => 3012,
        }
    }
}

/// Addresses one wallet mines against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramAccounts {
    /// Mining program
    pub program_id: Pubkey,
    /// Wallet that signs and pays
    pub authority: Pubkey,
    /// Miner PDA of `authority`
    pub miner: Pubkey,
    /// Global round PDA
    pub global_round: Pubkey,
}

impl ProgramAccounts {
    /// Derives both PDAs for `authority`
    pub fn derive(program_id: &Pubkey, authority: &Pubkey) -> Self {
        let (miner, _) =
            Pubkey::find_program_address(&[MINER_SEED, authority.as_ref()], program_id);
        let (global_round, _) = Pubkey::find_program_address(&[GLOBAL_ROUND_SEED], program_id);

        ProgramAccounts {
            program_id: *program_id,
            authority: *authority,
            miner,
            global_round,
        }
    }
}

/// Decoded miner account
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MinerRecord {
    /// Wallet that owns the account
    pub authority: Pubkey,
    /// Hashes credited by accepted proofs
    pub total_hashes: u64,
    /// Accepted proofs
    pub rounds_completed: u32,
    /// Unix time of the last accepted proof
    pub last_hash_at: i64,
    /// Consecutive rounds with an accepted proof
    pub current_streak: u32,
    /// Highest difficulty ever submitted
    pub best_difficulty: u8,
    /// PDA bump seed
    pub bump: u8,
}

/// Decoded global round account
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundRecord {
    /// Seed shared by every miner this round
    pub challenge: [u8; 32],
    /// Current round
    pub round_number: u64,
    /// Unix time the round started
    pub started_at: i64,
    /// Lowest difficulty the program accepts
    pub min_difficulty: u8,
    /// Hashes credited across all miners
    pub total_hashes_submitted: u64,
    /// Proofs accepted across all miners
    pub total_rounds_completed: u64,
    /// Authority allowed to rotate rounds
    pub admin: Pubkey,
    /// PDA bump seed
    pub bump: u8,
}

/// Cursor over account bytes
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], MinerError> {
        let end = self.pos + N;
        let bytes = self.data.get(self.pos..end).ok_or_else(|| {
            MinerError::ProtocolError(format!(
                "account data truncated at byte {} of {}",
                self.pos,
                self.data.len()
            ))
        })?;
        self.pos = end;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, MinerError> {
        Ok(self.take::<1>()?[0])
    }

    fn u32(&mut self) -> Result<u32, MinerError> {
        Ok(u32::from_le_bytes(self.take()?))
    }

    fn u64(&mut self) -> Result<u64, MinerError> {
        Ok(u64::from_le_bytes(self.take()?))
    }

    fn i64(&mut self) -> Result<i64, MinerError> {
        Ok(i64::from_le_bytes(self.take()?))
    }

    fn pubkey(&mut self) -> Result<Pubkey, MinerError> {
        Ok(Pubkey::new_from_array(self.take()?))
    }

    fn discriminator(&mut self, expected: &[u8; 8], name: &str) -> Result<(), MinerError> {
        if &self.take::<8>()? != expected {
            return Err(MinerError::ProtocolError(format!(
                "account is not a {} account",
                name
            )));
        }
        Ok(())
    }
}

/// Decodes a miner account
pub fn decode_miner(data: &[u8]) -> Result<MinerRecord, MinerError> {
    let mut r = Reader::new(data);
    r.discriminator(&MINER_ACCOUNT_DISCRIMINATOR, "Miner")?;
    Ok(MinerRecord {
        authority: r.pubkey()?,
        total_hashes: r.u64()?,
        rounds_completed: r.u32()?,
        last_hash_at: r.i64()?,
        current_streak: r.u32()?,
        best_difficulty: r.u8()?,
        bump: r.u8()?,
    })
}

/// Decodes the global round account
pub fn decode_round(data: &[u8]) -> Result<RoundRecord, MinerError> {
    let mut r = Reader::new(data);
    r.discriminator(&GLOBAL_ROUND_DISCRIMINATOR, "GlobalRound")?;
    Ok(RoundRecord {
        challenge: r.take()?,
        round_number: r.u64()?,
        started_at: r.i64()?,
        min_difficulty: r.u8()?,
        total_hashes_submitted: r.u64()?,
        total_rounds_completed: r.u64()?,
        admin: r.pubkey()?,
        bump: r.u8()?,
    })
}

impl MinerAccountState {
    /// Joins a miner account with the round it mines in
    pub fn from_records(miner: &MinerRecord, round: &RoundRecord) -> Self {
        MinerAccountState {
            authority: miner.authority,
            total_hashes: miner.total_hashes,
            rounds_completed: miner.rounds_completed,
            last_hash_at: miner.last_hash_at,
            current_streak: miner.current_streak,
            best_difficulty: miner.best_difficulty,
            challenge: round.challenge,
            round_number: round.round_number,
            min_difficulty: round.min_difficulty,
        }
    }
}

/// `submit_proof(nonce, difficulty)`
pub fn submit_proof_ix(accounts: &ProgramAccounts, nonce: u64, difficulty: u8) -> Instruction {
    let mut data = Vec::with_capacity(8 + 8 + 1);
    data.extend_from_slice(&SUBMIT_PROOF_DISCRIMINATOR);
    data.extend_from_slice(&nonce.to_le_bytes());
    data.push(difficulty);

    Instruction::new_with_bytes(
        accounts.program_id,
        &data,
        vec![
            AccountMeta::new(accounts.miner, false),
            AccountMeta::new(accounts.global_round, false),
            AccountMeta::new_readonly(accounts.authority, true),
        ],
    )
}

/// `initialize_miner()`; the authority pays for the new account
pub fn initialize_miner_ix(accounts: &ProgramAccounts) -> Instruction {
    Instruction::new_with_bytes(
        accounts.program_id,
        &INITIALIZE_MINER_DISCRIMINATOR,
        vec![
            AccountMeta::new(accounts.miner, false),
            AccountMeta::new(accounts.authority, true),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
    )
}
