// src/network/submitter.rs
//! Proof submission
//!
//! A submission walks `Building -> Signing -> Submitting` and ends in
//! `Accepted`, `Rejected` or `Aborted`. Transient failures go through
//! `RetryWait` and back to `Submitting`, resending the very same signed
//! transaction, or back to `Signing` when the blockhash expired. Resending
//! an identical transaction cannot credit a proof twice: the ledger either
//! executes it once or reports it as already processed.

use crate::miner::algorithm::Algorithm;
use crate::network::ledger::{Ledger, TxStatus};
use crate::network::program::{ProgramAccounts, submit_proof_ix};
use crate::types::{CandidateProof, MiningChallenge};
use crate::utils::backoff::BackoffPolicy;
use crate::utils::error::{ErrorKind, MinerError};
use crate::utils::signal::StopSignal;
use solana_sdk::instruction::Instruction;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::Transaction;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Position in the submission state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Checking the proof and building the instruction
    Building,
    /// Fetching a blockhash and signing
    Signing,
    /// Sending and awaiting confirmation
    Submitting,
    /// Backing off after a transient failure
    RetryWait,
    /// Confirmed on chain
    Accepted,
    /// Refused by the program
    Rejected,
    /// Gave up or interrupted
    Aborted,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Bookkeeping of one retry sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionAttempt {
    /// Proof being submitted, `None` for plain instructions
    pub proof: Option<CandidateProof>,
    /// Network attempts made so far
    pub attempt_number: u32,
    /// Class of the most recent failure
    pub last_error: Option<ErrorKind>,
}

/// Terminal result of a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Confirmed on chain
    Accepted {
        /// Signature of the landed transaction
        signature: Signature,
        /// Sends it took
        attempts: u32,
    },
    /// Definitively refused; retrying cannot change it
    Rejected {
        /// Why the ledger or the local check refused it
        reason: String,
        /// Sends made, 0 when refused locally
        attempts: u32,
    },
    /// Retry budget used up on transient failures, or interrupted while
    /// waiting to retry
    Aborted {
        /// Sends made
        attempts: u32,
        /// Message of the last failure
        last_error: String,
    },
}

/// Signs proofs and pushes them through a [`Ledger`]
pub struct ProofSubmitter<L: Ledger + ?Sized> {
    ledger: Arc<L>,
    keypair: Arc<Keypair>,
    accounts: ProgramAccounts,
    algorithm: Arc<dyn Algorithm>,
    policy: BackoffPolicy,
    stop: StopSignal,
    /// Minimum spacing between two sends
    min_interval: Duration,
    last_sent: Option<Instant>,
}

impl<L: Ledger + ?Sized> ProofSubmitter<L> {
    /// Creates a submitter
    ///
    /// # Arguments
    /// * `ledger` - Where transactions go
    /// * `keypair` - Fee payer and proof authority
    /// * `accounts` - Program and PDAs of `keypair`
    /// * `algorithm` - Hash used to re-verify proofs before sending
    /// * `policy` - Retry schedule for transient failures
    /// * `stop` - Interrupts retry waits
    pub fn new(
        ledger: Arc<L>,
        keypair: Arc<Keypair>,
        accounts: ProgramAccounts,
        algorithm: Arc<dyn Algorithm>,
        policy: BackoffPolicy,
        stop: StopSignal,
    ) -> Self {
        ProofSubmitter {
            ledger,
            keypair,
            accounts,
            algorithm,
            policy,
            stop,
            min_interval: Duration::ZERO,
            last_sent: None,
        }
    }

    /// Keeps at least `interval` between consecutive sends
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    /// Submits a proof found for `challenge`
    ///
    /// The proof is hashed again before anything is signed; a proof that
    /// does not verify locally, or that belongs to another round, is
    /// rejected without touching the network.
    ///
    /// # Errors
    /// Only fatal configuration failures; everything else is an outcome.
    pub fn submit(
        &mut self,
        challenge: &MiningChallenge,
        proof: &CandidateProof,
    ) -> Result<SubmitOutcome, MinerError> {
        log::debug!("Submission of nonce {}: {}", proof.nonce, Phase::Building);

        if proof.round != challenge.round {
            return Ok(self.reject(
                format!("proof for round {} but challenge is round {}", proof.round, challenge.round),
                0,
            ));
        }
        let verified =
            self.algorithm
                .verify(&challenge.base_seed, proof.nonce, &challenge.target)?;
        if !verified {
            return Ok(self.reject("proof failed local re-verification".to_string(), 0));
        }

        let difficulty = proof.difficulty().min(u8::MAX as u32) as u8;
        let ix = submit_proof_ix(&self.accounts, proof.nonce, difficulty);
        self.run(ix, Some(*proof))
    }

    /// Sends an arbitrary program instruction with the same retry policy
    pub fn submit_instruction(&mut self, ix: Instruction) -> Result<SubmitOutcome, MinerError> {
        self.run(ix, None)
    }

    fn run(
        &mut self,
        ix: Instruction,
        proof: Option<CandidateProof>,
    ) -> Result<SubmitOutcome, MinerError> {
        let mut attempt = SubmissionAttempt {
            proof,
            attempt_number: 0,
            last_error: None,
        };
        let mut last_message = String::new();
        let mut tx: Option<Transaction> = None;
        let mut resume = Phase::Submitting;
        let mut phase = self.transition(Phase::Building, Phase::Signing);

        loop {
            match phase {
                Phase::Signing => match self.sign(&ix) {
                    Ok(signed) => {
                        tx = Some(signed);
                        phase = self.transition(phase, Phase::Submitting);
                    }
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        attempt.attempt_number += 1;
                        resume = Phase::Signing;
                        phase = self.failed(phase, &mut attempt, &mut last_message, e);
                    }
                },
                Phase::Submitting => {
                    let Some(signed) = tx.as_ref() else {
                        phase = self.transition(phase, Phase::Signing);
                        continue;
                    };
                    let spacing = self.spacing_left();
                    if !spacing.is_zero() && self.stop.sleep(spacing) {
                        last_message = "interrupted before sending".to_string();
                        phase = self.transition(phase, Phase::Aborted);
                        continue;
                    }

                    attempt.attempt_number += 1;
                    self.last_sent = Some(Instant::now());
                    match self.ledger.submit_transaction(signed) {
                        Ok(TxStatus::Accepted(signature)) => {
                            self.transition(phase, Phase::Accepted);
                            return Ok(SubmitOutcome::Accepted {
                                signature,
                                attempts: attempt.attempt_number,
                            });
                        }
                        Ok(TxStatus::Rejected(reason)) | Err(MinerError::Rejected(reason)) => {
                            return Ok(self.reject(reason, attempt.attempt_number));
                        }
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => {
                            resume = if matches!(e, MinerError::BlockhashExpired(_)) {
                                tx = None;
                                Phase::Signing
                            } else {
                                Phase::Submitting
                            };
                            phase = self.failed(phase, &mut attempt, &mut last_message, e);
                        }
                    }
                }
                Phase::RetryWait => {
                    let delay = self.policy.delay(attempt.attempt_number);
                    log::warn!(
                        "Attempt {} failed ({:?}): {}; retrying in {:?}",
                        attempt.attempt_number,
                        attempt.last_error,
                        last_message,
                        delay
                    );
                    if self.stop.sleep(delay) {
                        last_message = format!("interrupted after: {}", last_message);
                        phase = self.transition(phase, Phase::Aborted);
                    } else {
                        phase = self.transition(phase, resume);
                    }
                }
                Phase::Aborted => {
                    log::warn!(
                        "Giving up after {} attempt(s): {}",
                        attempt.attempt_number,
                        last_message
                    );
                    return Ok(SubmitOutcome::Aborted {
                        attempts: attempt.attempt_number,
                        last_error: last_message,
                    });
                }
                Phase::Building | Phase::Accepted | Phase::Rejected => {
                    return Err(MinerError::WorkerError(format!(
                        "submission loop entered {}",
                        phase
                    )));
                }
            }
        }
    }

    /// Records a recoverable failure and picks `RetryWait` or `Aborted`
    fn failed(
        &self,
        from: Phase,
        attempt: &mut SubmissionAttempt,
        last_message: &mut String,
        error: MinerError,
    ) -> Phase {
        attempt.last_error = Some(error.kind());
        *last_message = error.to_string();

        if self.policy.exhausted(attempt.attempt_number) {
            self.transition(from, Phase::Aborted)
        } else {
            self.transition(from, Phase::RetryWait)
        }
    }

    fn sign(&self, ix: &Instruction) -> Result<Transaction, MinerError> {
        let blockhash = self.ledger.latest_blockhash()?;
        let payer = self.keypair.pubkey();
        let mut tx = Transaction::new_with_payer(std::slice::from_ref(ix), Some(&payer));
        tx.try_sign(&[self.keypair.as_ref()], blockhash)
            .map_err(|e| MinerError::CryptoError(e.to_string()))?;
        Ok(tx)
    }

    fn spacing_left(&self) -> Duration {
        match self.last_sent {
            Some(at) => self.min_interval.saturating_sub(at.elapsed()),
            None => Duration::ZERO,
        }
    }

    fn reject(&self, reason: String, attempts: u32) -> SubmitOutcome {
        log::debug!("Submission: -> {} ({})", Phase::Rejected, reason);
        SubmitOutcome::Rejected { reason, attempts }
    }

    fn transition(&self, from: Phase, to: Phase) -> Phase {
        log::debug!("Submission: {} -> {}", from, to);
        to
    }
}
