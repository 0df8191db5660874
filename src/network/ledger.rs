// src/network/ledger.rs
//! Ledger service seen by the miner
//!
//! Everything the mining core needs from the chain goes through [`Ledger`].
//! The production implementation is [`RpcLedger`](crate::network::RpcLedger);
//! tests script their own.

use crate::network::program::{MinerRecord, ProgramAccounts};
use crate::types::MinerAccountState;
use crate::utils::error::MinerError;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;

/// Definitive answer to a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    /// Executed and confirmed
    Accepted(Signature),
    /// Executed and failed; resending cannot help
    Rejected(String),
}

/// Blocking ledger client
///
/// Failures that are neither an acceptance nor a definitive rejection come
/// back as `Err`; their [`ErrorKind`](crate::utils::ErrorKind) says whether
/// retrying makes sense.
pub trait Ledger: Send + Sync {
    /// Reads the miner account joined with the current round
    ///
    /// # Errors
    /// `AccountNotInitialized` when the miner PDA does not exist yet
    fn account_state(&self, accounts: &ProgramAccounts) -> Result<MinerAccountState, MinerError>;

    /// Blockhash to sign the next transaction with
    fn latest_blockhash(&self) -> Result<Hash, MinerError>;

    /// Sends a signed transaction and waits for confirmation
    fn submit_transaction(&self, tx: &Transaction) -> Result<TxStatus, MinerError>;

    /// Balance in lamports
    fn balance(&self, pubkey: &Pubkey) -> Result<u64, MinerError>;

    /// Requests test funds and waits for them to land
    fn request_airdrop(&self, pubkey: &Pubkey, lamports: u64) -> Result<Signature, MinerError>;

    /// Every miner account owned by the program
    fn miner_accounts(&self) -> Result<Vec<MinerRecord>, MinerError>;
}
