// tests/common/mod.rs
#![allow(dead_code)]

use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::Transaction;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use testore_miner_rs::miner::{Algorithm, Keccak, MiningPool};
use testore_miner_rs::network::program::{MinerRecord, ProgramAccounts};
use testore_miner_rs::network::{Ledger, ProofSubmitter, TxStatus};
use testore_miner_rs::stats::{HashCounter, StatsTracker};
use testore_miner_rs::supervisor::{MiningSupervisor, SupervisorConfig};
use testore_miner_rs::types::MinerAccountState;
use testore_miner_rs::utils::{BackoffPolicy, MinerError, StopSignal};

/// In-memory ledger driven by scripted responses
///
/// Scripts are consumed front to back. Once a script is empty the ledger
/// serves `state` and accepts every transaction.
pub struct FakeLedger {
    pub state: MinerAccountState,
    pub refreshes: Mutex<VecDeque<Result<MinerAccountState, MinerError>>>,
    pub submits: Mutex<VecDeque<Result<TxStatus, MinerError>>>,
    pub refresh_calls: AtomicU32,
    pub submit_calls: AtomicU32,
    /// Fired once `submit_calls` reaches the given count
    pub stop_after_submits: Option<(u32, StopSignal)>,
}

impl FakeLedger {
    pub fn new() -> Self {
        FakeLedger {
            state: sample_state(),
            refreshes: Mutex::new(VecDeque::new()),
            submits: Mutex::new(VecDeque::new()),
            refresh_calls: AtomicU32::new(0),
            submit_calls: AtomicU32::new(0),
            stop_after_submits: None,
        }
    }

    pub fn with_refreshes(self, script: Vec<Result<MinerAccountState, MinerError>>) -> Self {
        *self.refreshes.lock().unwrap() = script.into();
        self
    }

    pub fn with_submits(self, script: Vec<Result<TxStatus, MinerError>>) -> Self {
        *self.submits.lock().unwrap() = script.into();
        self
    }

    pub fn stopping_after(mut self, submits: u32, stop: StopSignal) -> Self {
        self.stop_after_submits = Some((submits, stop));
        self
    }

    pub fn refresh_calls(&self) -> u32 {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn submit_calls(&self) -> u32 {
        self.submit_calls.load(Ordering::SeqCst)
    }
}

impl Ledger for FakeLedger {
    fn account_state(&self, _: &ProgramAccounts) -> Result<MinerAccountState, MinerError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refreshes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(self.state.clone()))
    }

    fn latest_blockhash(&self) -> Result<Hash, MinerError> {
        Ok(Hash::new_unique())
    }

    fn submit_transaction(&self, tx: &Transaction) -> Result<TxStatus, MinerError> {
        let calls = self.submit_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((after, stop)) = &self.stop_after_submits {
            if calls >= *after {
                stop.stop();
            }
        }
        self.submits
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(TxStatus::Accepted(tx.signatures[0])))
    }

    fn balance(&self, _: &Pubkey) -> Result<u64, MinerError> {
        Ok(0)
    }

    fn request_airdrop(&self, _: &Pubkey, _: u64) -> Result<Signature, MinerError> {
        Ok(Signature::default())
    }

    fn miner_accounts(&self) -> Result<Vec<MinerRecord>, MinerError> {
        Ok(Vec::new())
    }
}

pub fn sample_state() -> MinerAccountState {
    MinerAccountState {
        challenge: [0x22; 32],
        round_number: 7,
        ..MinerAccountState::default()
    }
}

pub fn connection_error() -> MinerError {
    MinerError::ConnectionError("connection refused".to_string())
}

pub fn accepted() -> Result<TxStatus, MinerError> {
    Ok(TxStatus::Accepted(Signature::default()))
}

pub fn rejected() -> Result<TxStatus, MinerError> {
    Ok(TxStatus::Rejected("InvalidProof (error 6000)".to_string()))
}

/// Supervisor over `ledger` with fast, retry-free settings
pub fn supervisor(
    ledger: Arc<FakeLedger>,
    stop: StopSignal,
) -> MiningSupervisor<FakeLedger> {
    let keypair = Arc::new(Keypair::new());
    let accounts = ProgramAccounts::derive(&Pubkey::new_unique(), &keypair.pubkey());
    let algorithm: Arc<dyn Algorithm> = Arc::new(Keccak);
    let hashes = HashCounter::new();

    let pool = MiningPool::new(algorithm.clone(), 2, hashes.clone(), stop.clone());
    let submitter = ProofSubmitter::new(
        ledger.clone(),
        keypair,
        accounts,
        algorithm,
        BackoffPolicy::immediate(3),
        stop.clone(),
    );
    let config = SupervisorConfig {
        difficulty: 8,
        nonce_space: 0,
        search_timeout: Duration::from_secs(30),
        cooldown: Duration::ZERO,
        refresh: BackoffPolicy::immediate(0),
    };

    MiningSupervisor::new(
        ledger,
        accounts,
        pool,
        submitter,
        StatsTracker::new(hashes),
        stop,
        config,
    )
}
