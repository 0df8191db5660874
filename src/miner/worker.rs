// src/miner/worker.rs
//! Nonce search worker
//!
//! A [`NonceSearcher`] walks one contiguous offset range of a
//! [`MiningChallenge`] and yields every proof that meets the target, in
//! increasing offset order. Between yields it is just an iterator, so the
//! pool can take the first hit and drop it, or keep pulling.

use crate::miner::algorithm::Algorithm;
use crate::stats::HashCounter;
use crate::types::{CandidateProof, MiningChallenge};
use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Hashes computed between two looks at the shared [`SearchControl`]
pub const POLL_INTERVAL: u64 = 4096;

/// State shared by all searchers of one pool search
///
/// Both fields are written by at most a handful of events per search, so
/// the hot loop only ever reads them once per [`POLL_INTERVAL`].
#[derive(Debug)]
pub struct SearchControl {
    cancel: AtomicBool,
    floor: AtomicU64,
}

impl Default for SearchControl {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchControl {
    /// Fresh, uncancelled control with no known hit
    pub fn new() -> Self {
        SearchControl {
            cancel: AtomicBool::new(false),
            floor: AtomicU64::new(u64::MAX),
        }
    }

    /// Tell every searcher to stop at its next poll
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    /// Whether [`cancel`](Self::cancel) was called
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    /// Lowest offset any searcher has found a proof at
    pub fn floor(&self) -> u64 {
        self.floor.load(Ordering::Acquire)
    }

    /// Publishes a hit; searchers past it have nothing left to win
    pub fn lower_floor(&self, offset: u64) {
        self.floor.fetch_min(offset, Ordering::AcqRel);
    }
}

/// Why a searcher stopped yielding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Reached the end of its range
    Exhausted,
    /// Observed cancellation or a lower hit elsewhere
    Cancelled,
    /// The hash function returned an error
    Failed(String),
}

/// Lazy proof search over one offset range
pub struct NonceSearcher<'a> {
    algorithm: &'a dyn Algorithm,
    challenge: &'a MiningChallenge,
    control: &'a SearchControl,
    counter: &'a HashCounter,
    next: u64,
    end: u64,
    since_poll: u64,
    hashes: u64,
    stopped: Option<StopReason>,
}

impl<'a> NonceSearcher<'a> {
    /// Creates a searcher for `range` of `challenge`
    ///
    /// # Arguments
    /// * `algorithm` - Hash function to evaluate
    /// * `challenge` - Seed, nonce base and target of this cycle
    /// * `range` - Offsets to scan, end exclusive
    /// * `control` - Cancellation flag and hit floor shared with siblings
    /// * `counter` - Pool-wide hash counter
    pub fn new(
        algorithm: &'a dyn Algorithm,
        challenge: &'a MiningChallenge,
        range: Range<u64>,
        control: &'a SearchControl,
        counter: &'a HashCounter,
    ) -> Self {
        NonceSearcher {
            algorithm,
            challenge,
            control,
            counter,
            next: range.start,
            end: range.end,
            since_poll: 0,
            hashes: 0,
            stopped: None,
        }
    }

    /// Points the searcher at a new range and clears its stop reason
    pub fn restart(&mut self, range: Range<u64>) {
        self.flush();
        self.next = range.start;
        self.end = range.end;
        self.stopped = None;
    }

    /// Why iteration ended, `None` while still running
    pub fn stop_reason(&self) -> Option<&StopReason> {
        self.stopped.as_ref()
    }

    /// Digests computed by this searcher since creation
    pub fn hashes(&self) -> u64 {
        self.hashes
    }

    fn should_stop(&self) -> bool {
        self.control.is_cancelled() || self.next >= self.control.floor()
    }

    fn flush(&mut self) {
        if self.since_poll > 0 {
            self.counter.add(self.since_poll);
            self.since_poll = 0;
        }
    }

    fn finish(&mut self, reason: StopReason) -> Option<CandidateProof> {
        self.flush();
        self.stopped = Some(reason);
        None
    }
}

impl Iterator for NonceSearcher<'_> {
    type Item = CandidateProof;

    fn next(&mut self) -> Option<CandidateProof> {
        if self.stopped.is_some() {
            return None;
        }
        if self.should_stop() {
            return self.finish(StopReason::Cancelled);
        }

        while self.next < self.end {
            if self.since_poll >= POLL_INTERVAL {
                self.flush();
                if self.should_stop() {
                    return self.finish(StopReason::Cancelled);
                }
            }

            let offset = self.next;
            self.next += 1;
            let nonce = self.challenge.nonce_at(offset);

            let digest = match self.algorithm.hash(&self.challenge.base_seed, nonce) {
                Ok(digest) => digest,
                Err(e) => return self.finish(StopReason::Failed(e.to_string())),
            };
            self.since_poll += 1;
            self.hashes += 1;

            if self.challenge.target.satisfies(&digest) {
                self.flush();
                return Some(CandidateProof {
                    offset,
                    nonce,
                    digest,
                    round: self.challenge.round,
                });
            }
        }

        self.finish(StopReason::Exhausted)
    }
}

/// What a worker thread hands back to the pool
#[derive(Debug, Clone)]
pub struct WorkerReport {
    /// Worker index, equal to its range's position in the partition
    pub worker: usize,
    /// Range the worker was assigned
    pub range: Range<u64>,
    /// How the worker finished
    pub outcome: WorkerOutcome,
    /// Digests the worker computed
    pub hashes: u64,
}

/// Terminal state of one worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// Lowest proof in the worker's range
    Found(CandidateProof),
    /// Whole range scanned without a hit
    Exhausted,
    /// Stopped early by the pool
    Cancelled,
    /// Hash error or panic; counts as exhausted
    Failed(String),
}

/// Runs one searcher to its first proof and reports
pub fn run_worker(
    worker: usize,
    algorithm: &dyn Algorithm,
    challenge: &MiningChallenge,
    range: Range<u64>,
    control: &SearchControl,
    counter: &HashCounter,
) -> WorkerReport {
    let mut searcher = NonceSearcher::new(algorithm, challenge, range.clone(), control, counter);

    let outcome = match searcher.next() {
        Some(proof) => {
            control.lower_floor(proof.offset);
            WorkerOutcome::Found(proof)
        }
        None => match searcher.stop_reason() {
            Some(StopReason::Failed(msg)) => WorkerOutcome::Failed(msg.clone()),
            Some(StopReason::Cancelled) => WorkerOutcome::Cancelled,
            _ => WorkerOutcome::Exhausted,
        },
    };

    WorkerReport {
        worker,
        range,
        outcome,
        hashes: searcher.hashes(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::miner::algorithm::Keccak;
    use crate::miner::target::HashTarget;
    use crate::utils::error::MinerError;

    fn seed() -> [u8; 64] {
        let mut seed = [0x22; 64];
        seed[..32].fill(0x11);
        seed
    }

    fn challenge(difficulty: u32) -> MiningChallenge {
        MiningChallenge::new(seed(), 0, HashTarget::new(difficulty).unwrap(), 1)
    }

    #[test]
    fn yields_hits_in_order_and_resumes() {
        let challenge = challenge(8);
        let control = SearchControl::new();
        let counter = HashCounter::new();
        let mut searcher = NonceSearcher::new(&Keccak, &challenge, 0..1_500, &control, &counter);

        let hits: Vec<u64> = searcher.by_ref().map(|p| p.nonce).collect();
        assert_eq!(hits, vec![158, 810, 1472]);
        assert_eq!(searcher.stop_reason(), Some(&StopReason::Exhausted));
        assert_eq!(counter.total(), 1_500);
    }

    #[test]
    fn restart_scans_a_new_range() {
        let challenge = challenge(8);
        let control = SearchControl::new();
        let counter = HashCounter::new();
        let mut searcher = NonceSearcher::new(&Keccak, &challenge, 0..100, &control, &counter);

        assert!(searcher.next().is_none());
        searcher.restart(700..900);
        assert_eq!(searcher.next().map(|p| p.nonce), Some(810));
    }

    #[test]
    fn stops_when_cancelled() {
        let challenge = challenge(64);
        let control = SearchControl::new();
        let counter = HashCounter::new();
        control.cancel();
        let mut searcher =
            NonceSearcher::new(&Keccak, &challenge, 0..u64::MAX, &control, &counter);

        assert!(searcher.next().is_none());
        assert_eq!(searcher.stop_reason(), Some(&StopReason::Cancelled));
        assert_eq!(searcher.hashes(), 0);
    }

    #[test]
    fn stops_past_the_floor() {
        let challenge = challenge(64);
        let control = SearchControl::new();
        let counter = HashCounter::new();
        control.lower_floor(5_000);
        let mut searcher = NonceSearcher::new(&Keccak, &challenge, 0..20_000, &control, &counter);

        assert!(searcher.next().is_none());
        assert_eq!(searcher.stop_reason(), Some(&StopReason::Cancelled));
        // Stops at the first poll at or beyond the floor
        assert_eq!(searcher.hashes(), 2 * POLL_INTERVAL);
    }

    struct Broken;

    impl Algorithm for Broken {
        fn hash(&self, _seed: &[u8], nonce: u64) -> Result<[u8; 32], MinerError> {
            if nonce == 10 {
                Err(MinerError::WorkerError("bad nonce".into()))
            } else {
                Ok([0xFF; 32])
            }
        }

        fn name(&self) -> &'static str {
            "broken"
        }
    }

    #[test]
    fn hash_errors_end_the_range() {
        let challenge = challenge(1);
        let control = SearchControl::new();
        let counter = HashCounter::new();

        let report = run_worker(3, &Broken, &challenge, 0..100, &control, &counter);
        assert!(matches!(report.outcome, WorkerOutcome::Failed(_)));
        assert_eq!(report.hashes, 10);
        assert_eq!(report.worker, 3);
    }

    #[test]
    fn found_lowers_the_floor() {
        let challenge = challenge(8);
        let control = SearchControl::new();
        let counter = HashCounter::new();

        let report = run_worker(0, &Keccak, &challenge, 100..1_000, &control, &counter);
        match report.outcome {
            WorkerOutcome::Found(proof) => assert_eq!(proof.offset, 158),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(control.floor(), 158);
    }
}
