// src/supervisor/forever.rs
//! Forever mode
//!
//! Drives `refresh -> challenge -> search -> submit -> record` cycles one
//! after another. Transient trouble is retried or waited out for as long as
//! it lasts; configuration errors end the run immediately.

use crate::miner::scheduler::{MiningPool, SearchOutcome};
use crate::miner::target::HashTarget;
use crate::network::ledger::Ledger;
use crate::network::program::ProgramAccounts;
use crate::network::submitter::{ProofSubmitter, SubmitOutcome};
use crate::stats::tracker::{CycleOutcome, RunSnapshot, StatsTracker};
use crate::types::{MinerAccountState, MiningChallenge};
use crate::utils::backoff::BackoffPolicy;
use crate::utils::error::MinerError;
use crate::utils::signal::StopSignal;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

/// Extra bits of search space beyond the expected solve
const NONCE_SPACE_MARGIN_BITS: u32 = 6;
/// Multiple of the expected solve time allowed per search
const SEARCH_TIMEOUT_MARGIN: f64 = 10.0;
const MIN_SEARCH_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_SEARCH_TIMEOUT: Duration = Duration::from_secs(3_600);
/// Used until a first search has measured the hash rate
const UNMEASURED_SEARCH_TIMEOUT: Duration = Duration::from_secs(600);

/// Knobs of the mining loop
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Requested difficulty; raised to the round minimum when lower
    pub difficulty: u32,
    /// Offsets per search, 0 = `2^(difficulty + 6)`
    pub nonce_space: u64,
    /// Search budget, zero = derived from the measured hash rate
    pub search_timeout: Duration,
    /// Pause after a recoverable cycle failure
    pub cooldown: Duration,
    /// Retry schedule of the account refresh
    pub refresh: BackoffPolicy,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        SupervisorConfig {
            difficulty: 8,
            nonce_space: 0,
            search_timeout: Duration::ZERO,
            cooldown: Duration::from_secs(2),
            refresh: BackoffPolicy::refresh(),
        }
    }
}

/// Result of one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleResult {
    /// The cycle ran to a terminal outcome
    Completed(CycleOutcome),
    /// The stop signal ended the cycle early; nothing was recorded
    Interrupted,
}

enum Refresh {
    Ready(MinerAccountState),
    GaveUp(MinerError),
    Interrupted,
}

/// Sequential mining loop over one wallet
pub struct MiningSupervisor<L: Ledger + ?Sized> {
    ledger: Arc<L>,
    accounts: ProgramAccounts,
    pool: MiningPool,
    submitter: ProofSubmitter<L>,
    stats: StatsTracker,
    stop: StopSignal,
    config: SupervisorConfig,
    /// Cycles started, mixed into each challenge
    cycle: u64,
    /// Hash rate measured by the last search that ran long enough
    measured_rate: Option<f64>,
}

impl<L: Ledger + ?Sized> MiningSupervisor<L> {
    /// Creates a supervisor
    ///
    /// # Arguments
    /// * `ledger` - Source of account state
    /// * `accounts` - Program and PDAs being mined
    /// * `pool` - Worker pool for the search phase
    /// * `submitter` - Submission state machine, sharing `ledger`
    /// * `stats` - Counters updated once per finished cycle
    /// * `stop` - Operator stop, shared with pool and submitter
    /// * `config` - Loop parameters
    pub fn new(
        ledger: Arc<L>,
        accounts: ProgramAccounts,
        pool: MiningPool,
        submitter: ProofSubmitter<L>,
        stats: StatsTracker,
        stop: StopSignal,
        config: SupervisorConfig,
    ) -> Self {
        MiningSupervisor {
            ledger,
            accounts,
            pool,
            submitter,
            stats,
            stop,
            config,
            cycle: 0,
            measured_rate: None,
        }
    }

    /// Read handle on the run counters
    pub fn stats(&self) -> &StatsTracker {
        &self.stats
    }

    /// Runs cycles until the stop signal fires
    ///
    /// # Returns
    /// Final counters after a clean stop
    ///
    /// # Errors
    /// The first fatal (configuration) error; the run ends with it.
    pub fn run_forever(&mut self) -> Result<RunSnapshot, MinerError> {
        log::info!(
            "Forever mode: mining for {} with {} workers at difficulty >= {}",
            self.accounts.authority,
            self.pool.workers(),
            self.config.difficulty
        );

        while !self.stop.is_stopped() {
            match self.run_once()? {
                CycleResult::Interrupted => break,
                CycleResult::Completed(outcome) => {
                    if matches!(outcome, CycleOutcome::Aborted | CycleOutcome::Failed)
                        && self.stop.sleep(self.config.cooldown)
                    {
                        break;
                    }
                }
            }
        }

        let snapshot = self.stats.snapshot();
        log::info!(
            "Stopped after {} cycles: {} accepted, {} rejected",
            snapshot.cycles_completed,
            snapshot.proofs_accepted,
            snapshot.proofs_rejected
        );
        Ok(snapshot)
    }

    /// Runs one cycle and records its outcome
    ///
    /// A panic anywhere in the cycle is contained and counted as a failed
    /// cycle.
    pub fn run_once(&mut self) -> Result<CycleResult, MinerError> {
        let cycle = self.cycle + 1;
        let result = match panic::catch_unwind(AssertUnwindSafe(|| self.run_cycle())) {
            Ok(result) => result?,
            Err(_) => {
                log::error!("Cycle {} panicked; continuing", cycle);
                CycleResult::Completed(CycleOutcome::Failed)
            }
        };

        if let CycleResult::Completed(outcome) = result {
            self.stats.record(outcome);
        }
        Ok(result)
    }

    fn run_cycle(&mut self) -> Result<CycleResult, MinerError> {
        self.cycle += 1;

        let state = match self.refresh()? {
            Refresh::Ready(state) => state,
            Refresh::Interrupted => return Ok(CycleResult::Interrupted),
            Refresh::GaveUp(e) => {
                log::warn!("Cycle {}: account refresh gave up: {}", self.cycle, e);
                return Ok(CycleResult::Completed(CycleOutcome::Failed));
            }
        };

        let difficulty = self.config.difficulty.max(u32::from(state.min_difficulty));
        let target = HashTarget::new(difficulty)?;
        let challenge =
            MiningChallenge::from_account(&self.accounts.authority, &state, target, self.cycle);
        let nonce_space = self.nonce_space(&target);
        let timeout = self.search_timeout(&target);

        log::debug!(
            "Cycle {}: round {}, {} offsets, timeout {:?}",
            self.cycle,
            challenge.round,
            nonce_space,
            timeout
        );

        let report = match self.pool.search(&challenge, nonce_space, timeout) {
            Ok(report) => report,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                log::error!("Cycle {}: search failed: {}", self.cycle, e);
                return Ok(CycleResult::Completed(CycleOutcome::Failed));
            }
        };
        if report.elapsed >= Duration::from_millis(500) {
            self.measured_rate = Some(report.hash_rate());
        }

        let proof = match report.outcome {
            SearchOutcome::Found(proof) => proof,
            SearchOutcome::Interrupted => return Ok(CycleResult::Interrupted),
            SearchOutcome::Timeout(cause) => {
                log::info!(
                    "Cycle {}: no proof ({:?}) after {} hashes",
                    self.cycle,
                    cause,
                    report.hashes
                );
                return Ok(CycleResult::Completed(CycleOutcome::Timeout));
            }
        };

        log::info!(
            "Cycle {}: found nonce {} ({} bits) in {:.1}s",
            self.cycle,
            proof.nonce,
            proof.difficulty(),
            report.elapsed.as_secs_f64()
        );
        log::debug!("Cycle {}: digest {}", self.cycle, hex::encode(proof.digest));

        let outcome = match self.submitter.submit(&challenge, &proof)? {
            SubmitOutcome::Accepted {
                signature,
                attempts,
            } => {
                log::info!(
                    "Cycle {}: proof accepted after {} attempt(s): {}",
                    self.cycle,
                    attempts,
                    signature
                );
                CycleOutcome::Accepted
            }
            SubmitOutcome::Rejected { reason, .. } => {
                log::warn!("Cycle {}: proof rejected: {}", self.cycle, reason);
                CycleOutcome::Rejected
            }
            SubmitOutcome::Aborted {
                attempts,
                last_error,
            } => {
                log::warn!(
                    "Cycle {}: submission aborted after {} attempt(s): {}",
                    self.cycle,
                    attempts,
                    last_error
                );
                CycleOutcome::Aborted
            }
        };

        Ok(CycleResult::Completed(outcome))
    }

    /// Reads the account, waiting out transient failures
    fn refresh(&self) -> Result<Refresh, MinerError> {
        let policy = &self.config.refresh;
        let mut failures = 0u32;

        loop {
            if self.stop.is_stopped() {
                return Ok(Refresh::Interrupted);
            }

            match self.ledger.account_state(&self.accounts) {
                Ok(state) => {
                    if failures > 0 {
                        log::info!("Account refresh recovered after {} failure(s)", failures);
                    }
                    return Ok(Refresh::Ready(state));
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    failures = failures.saturating_add(1);
                    if policy.exhausted(failures) {
                        return Ok(Refresh::GaveUp(e));
                    }
                    let delay = policy.delay(failures);
                    log::warn!(
                        "Account refresh failed ({:?}): {}; retry {} in {:?}",
                        e.kind(),
                        e,
                        failures,
                        delay
                    );
                    if self.stop.sleep(delay) {
                        return Ok(Refresh::Interrupted);
                    }
                }
            }
        }
    }

    fn nonce_space(&self, target: &HashTarget) -> u64 {
        if self.config.nonce_space > 0 {
            return self.config.nonce_space;
        }
        let bits = target.difficulty_bits() + NONCE_SPACE_MARGIN_BITS;
        if bits >= 64 { u64::MAX } else { 1u64 << bits }
    }

    fn search_timeout(&self, target: &HashTarget) -> Duration {
        if !self.config.search_timeout.is_zero() {
            return self.config.search_timeout;
        }
        match self.measured_rate {
            Some(rate) if rate > 0.0 => {
                let secs = target.expected_hashes() / rate * SEARCH_TIMEOUT_MARGIN;
                Duration::try_from_secs_f64(secs)
                    .unwrap_or(MAX_SEARCH_TIMEOUT)
                    .clamp(MIN_SEARCH_TIMEOUT, MAX_SEARCH_TIMEOUT)
            }
            _ => UNMEASURED_SEARCH_TIMEOUT,
        }
    }
}
