// src/miner/scheduler.rs
//! Mining pool implementation
//!
//! Splits one challenge's offset space across a fixed number of worker
//! threads and returns the lowest-offset proof among them. Workers are
//! scoped threads, so none of them can outlive [`MiningPool::search`].
//!
//! The first hit does not end the search by itself. It lowers the shared
//! floor so that every worker above it stops at its next poll, and the pool
//! returns once all workers whose range starts below the best hit have
//! reported. The result is the lowest hit in the space, whatever the worker
//! count.

use crate::miner::algorithm::Algorithm;
use crate::miner::worker::{SearchControl, WorkerOutcome, WorkerReport, run_worker};
use crate::stats::HashCounter;
use crate::types::{CandidateProof, MiningChallenge};
use crate::utils::error::MinerError;
use crate::utils::signal::StopSignal;
use crossbeam_channel::{Receiver, select};
use std::any::Any;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Longest single wait on the result channel when no deadline applies
const IDLE_WAIT: Duration = Duration::from_secs(1);

/// How a search ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Lowest-offset proof in the searched space
    Found(CandidateProof),
    /// No proof to act on; re-issue with a fresh challenge
    Timeout(TimeoutCause),
    /// The stop signal fired
    Interrupted,
}

/// Why a search produced no proof
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutCause {
    /// Every worker scanned its range without a hit
    Exhausted,
    /// The wall-clock budget ran out
    Deadline,
}

/// Result of [`MiningPool::search`]
#[derive(Debug, Clone)]
pub struct SearchReport {
    /// How the search ended
    pub outcome: SearchOutcome,
    /// Digests computed during this search
    pub hashes: u64,
    /// Wall time of the search
    pub elapsed: Duration,
    /// Workers launched
    pub workers: usize,
    /// Workers that errored or panicked
    pub failed_workers: usize,
}

impl SearchReport {
    /// Hashes per second over this search
    pub fn hash_rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.hashes as f64 / secs
        } else {
            0.0
        }
    }
}

/// Coordinates nonce searches across worker threads
pub struct MiningPool {
    /// Hash function shared by every worker
    algorithm: Arc<dyn Algorithm>,
    /// Threads launched per search
    workers: usize,
    /// Pool-wide hash counter
    hashes: HashCounter,
    /// Operator stop
    stop: StopSignal,
    /// Worker threads currently alive
    active: Arc<AtomicUsize>,
}

/// Decrements the live-worker count when a worker thread ends, even by panic
struct ActiveGuard<'a>(&'a AtomicUsize);

impl<'a> ActiveGuard<'a> {
    fn new(active: &'a AtomicUsize) -> Self {
        active.fetch_add(1, Ordering::SeqCst);
        ActiveGuard(active)
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MiningPool {
    /// Creates a new pool
    ///
    /// # Arguments
    /// * `algorithm` - The hash function to use
    /// * `workers` - Worker threads per search, at least one
    /// * `hashes` - Counter the workers add to
    /// * `stop` - Signal that interrupts a running search
    pub fn new(
        algorithm: Arc<dyn Algorithm>,
        workers: usize,
        hashes: HashCounter,
        stop: StopSignal,
    ) -> Self {
        MiningPool {
            algorithm,
            workers: workers.max(1),
            hashes,
            stop,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Threads launched per search
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Worker threads alive right now; zero whenever no search is running
    pub fn active_workers(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Searches `[0, nonce_space)` of `challenge` for the lowest-offset proof
    ///
    /// # Arguments
    /// * `challenge` - Seed, nonce base and target of this cycle
    /// * `nonce_space` - Number of offsets to scan
    /// * `timeout` - Wall-clock budget for the whole search
    ///
    /// # Returns
    /// A report whose outcome is `Found`, `Timeout` or `Interrupted`. Every
    /// worker has terminated when this returns.
    ///
    /// # Errors
    /// Returns `MinerError::IoError` if a worker thread cannot be spawned.
    pub fn search(
        &self,
        challenge: &MiningChallenge,
        nonce_space: u64,
        timeout: Duration,
    ) -> Result<SearchReport, MinerError> {
        let started = Instant::now();
        if self.stop.is_stopped() {
            return Ok(self.report(SearchOutcome::Interrupted, 0, started, 0, 0));
        }

        let ranges = partition(nonce_space, self.workers);
        let deadline = started.checked_add(timeout);
        let control = SearchControl::new();
        let (tx, rx) = crossbeam_channel::unbounded::<WorkerReport>();
        let hashes_before = self.hashes.total();

        log::debug!(
            "Searching {} offsets from nonce {} at {} on {} workers",
            nonce_space,
            challenge.nonce_base,
            challenge.target,
            ranges.len()
        );

        let collected = thread::scope(|scope| -> Result<Collected, MinerError> {
            for (worker, range) in ranges.iter().cloned().enumerate() {
                let tx = tx.clone();
                let control = &control;
                let algorithm = &*self.algorithm;
                let counter = &self.hashes;
                let active = &*self.active;

                let spawned = thread::Builder::new()
                    .name(format!("searcher-{}", worker))
                    .spawn_scoped(scope, move || {
                        let _guard = ActiveGuard::new(active);
                        let report = panic::catch_unwind(AssertUnwindSafe(|| {
                            run_worker(worker, algorithm, challenge, range.clone(), control, counter)
                        }))
                        .unwrap_or_else(|payload| WorkerReport {
                            worker,
                            range,
                            outcome: WorkerOutcome::Failed(panic_message(payload)),
                            hashes: 0,
                        });
                        let _ = tx.send(report);
                    });

                if let Err(e) = spawned {
                    control.cancel();
                    return Err(e.into());
                }
            }
            drop(tx);

            let collected = self.collect(&rx, &ranges, &control, deadline);
            control.cancel();
            Ok(collected)
        })?;

        // Workers that finished after the collector stopped listening
        let mut collected = collected;
        for report in rx.try_iter() {
            collected.absorb(report);
        }

        let outcome = match (collected.best, collected.stop) {
            (_, Some(Stop::Interrupted)) => SearchOutcome::Interrupted,
            (Some(proof), _) => SearchOutcome::Found(proof),
            (None, Some(Stop::Deadline)) => SearchOutcome::Timeout(TimeoutCause::Deadline),
            (None, None) => SearchOutcome::Timeout(TimeoutCause::Exhausted),
        };

        match &outcome {
            SearchOutcome::Found(proof) => log::debug!(
                "Found nonce {} (offset {}, {} bits)",
                proof.nonce,
                proof.offset,
                proof.difficulty()
            ),
            SearchOutcome::Timeout(cause) => log::debug!("Search ended without proof: {:?}", cause),
            SearchOutcome::Interrupted => log::debug!("Search interrupted"),
        }

        let hashes = self.hashes.total().saturating_sub(hashes_before);
        Ok(self.report(
            outcome,
            hashes,
            started,
            ranges.len(),
            collected.failed,
        ))
    }

    /// Waits for reports until the best proof is settled, every worker is
    /// done, the deadline passes or the stop signal fires
    fn collect(
        &self,
        rx: &Receiver<WorkerReport>,
        ranges: &[Range<u64>],
        control: &SearchControl,
        deadline: Option<Instant>,
    ) -> Collected {
        let mut collected = Collected::new(ranges.len());

        loop {
            if collected.settled(ranges) {
                break;
            }

            let wait = match deadline {
                Some(d) => d.saturating_duration_since(Instant::now()),
                None => IDLE_WAIT,
            };

            select! {
                recv(rx) -> msg => match msg {
                    Ok(report) => {
                        if let WorkerOutcome::Found(proof) = &report.outcome {
                            control.lower_floor(proof.offset);
                        }
                        collected.absorb(report);
                    }
                    Err(_) => break,
                },
                recv(self.stop.waiter()) -> _ => {
                    collected.stop = Some(Stop::Interrupted);
                    break;
                }
                default(wait) => {
                    if deadline.is_some_and(|d| Instant::now() >= d) {
                        collected.stop = Some(Stop::Deadline);
                        break;
                    }
                }
            }
        }

        collected
    }

    fn report(
        &self,
        outcome: SearchOutcome,
        hashes: u64,
        started: Instant,
        workers: usize,
        failed_workers: usize,
    ) -> SearchReport {
        SearchReport {
            outcome,
            hashes,
            elapsed: started.elapsed(),
            workers,
            failed_workers,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    Interrupted,
    Deadline,
}

/// Reports gathered so far
struct Collected {
    reported: Vec<bool>,
    best: Option<CandidateProof>,
    failed: usize,
    stop: Option<Stop>,
}

impl Collected {
    fn new(workers: usize) -> Self {
        Collected {
            reported: vec![false; workers],
            best: None,
            failed: 0,
            stop: None,
        }
    }

    fn absorb(&mut self, report: WorkerReport) {
        if let Some(seen) = self.reported.get_mut(report.worker) {
            *seen = true;
        }
        match report.outcome {
            WorkerOutcome::Found(proof) => {
                if self.best.is_none_or(|best| proof.offset < best.offset) {
                    self.best = Some(proof);
                }
            }
            WorkerOutcome::Failed(msg) => {
                log::error!(
                    "Worker {} failed on offsets {:?}: {}",
                    report.worker,
                    report.range,
                    msg
                );
                self.failed += 1;
            }
            WorkerOutcome::Exhausted | WorkerOutcome::Cancelled => {}
        }
    }

    /// True once no outstanding worker can change the result
    fn settled(&self, ranges: &[Range<u64>]) -> bool {
        let cutoff = self.best.map_or(u64::MAX, |best| best.offset);
        ranges
            .iter()
            .zip(&self.reported)
            .all(|(range, &seen)| seen || range.start >= cutoff)
    }
}

/// Splits `[0, space)` into `workers` contiguous ranges
///
/// The last range absorbs the remainder. Never produces more ranges than
/// offsets, and always at least one.
pub fn partition(space: u64, workers: usize) -> Vec<Range<u64>> {
    let workers = (workers.max(1) as u64).min(space.max(1));
    let chunk = space / workers;

    (0..workers)
        .map(|i| {
            let start = i * chunk;
            let end = if i + 1 == workers { space } else { start + chunk };
            start..end
        })
        .collect()
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::miner::algorithm::Keccak;
    use crate::miner::target::HashTarget;

    fn seed() -> [u8; 64] {
        let mut seed = [0x22; 64];
        seed[..32].fill(0x11);
        seed
    }

    fn pool(workers: usize) -> MiningPool {
        MiningPool::new(Arc::new(Keccak), workers, HashCounter::new(), StopSignal::new())
    }

    #[test]
    fn partition_covers_space() {
        assert_eq!(partition(10, 3), vec![0..3, 3..6, 6..10]);
        assert_eq!(partition(8, 4), vec![0..2, 2..4, 4..6, 6..8]);
        assert_eq!(partition(2, 5), vec![0..1, 1..2]);
        assert_eq!(partition(0, 4), vec![0..0]);
        assert_eq!(partition(7, 0), vec![0..7]);

        let ranges = partition(10_000_000, 7);
        assert_eq!(ranges.len(), 7);
        assert_eq!(ranges[0].start, 0);
        assert_eq!(ranges[6].end, 10_000_000);
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn finds_lowest_nonce() {
        let challenge = MiningChallenge::new(seed(), 0, HashTarget::new(8).unwrap(), 0);
        let report = pool(4).search(&challenge, 10_000, Duration::from_secs(60)).unwrap();

        match report.outcome {
            SearchOutcome::Found(proof) => {
                assert_eq!(proof.nonce, 158);
                assert!(proof.difficulty() >= 8);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(report.workers, 4);
    }

    #[test]
    fn exhausts_small_space() {
        let challenge = MiningChallenge::new(seed(), 0, HashTarget::new(8).unwrap(), 0);
        let p = pool(3);
        let report = p.search(&challenge, 150, Duration::from_secs(60)).unwrap();

        assert_eq!(report.outcome, SearchOutcome::Timeout(TimeoutCause::Exhausted));
        assert_eq!(report.hashes, 150);
        assert_eq!(p.active_workers(), 0);
    }

    #[test]
    fn deadline_times_out() {
        let challenge = MiningChallenge::new(seed(), 0, HashTarget::new(128).unwrap(), 0);
        let p = pool(2);
        let started = Instant::now();
        let report = p.search(&challenge, u64::MAX, Duration::from_millis(100)).unwrap();

        assert_eq!(report.outcome, SearchOutcome::Timeout(TimeoutCause::Deadline));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(p.active_workers(), 0);
    }

    #[test]
    fn already_stopped_does_not_spawn() {
        let stop = StopSignal::new();
        stop.stop();
        let p = MiningPool::new(Arc::new(Keccak), 4, HashCounter::new(), stop);
        let challenge = MiningChallenge::new(seed(), 0, HashTarget::new(8).unwrap(), 0);

        let report = p.search(&challenge, 10_000, Duration::from_secs(60)).unwrap();
        assert_eq!(report.outcome, SearchOutcome::Interrupted);
        assert_eq!(report.hashes, 0);
    }

    struct Panicky;

    impl Algorithm for Panicky {
        fn hash(&self, seed: &[u8], nonce: u64) -> Result<[u8; 32], MinerError> {
            if nonce == 3 {
                panic!("boom");
            }
            Keccak.hash(seed, nonce)
        }

        fn name(&self) -> &'static str {
            "panicky"
        }
    }

    #[test]
    fn worker_panic_is_contained() {
        let p = MiningPool::new(Arc::new(Panicky), 2, HashCounter::new(), StopSignal::new());
        let challenge = MiningChallenge::new(seed(), 0, HashTarget::new(8).unwrap(), 0);

        // Worker 0 dies at nonce 3; worker 1 owns 500..1000 and finds 810
        let report = p.search(&challenge, 1_000, Duration::from_secs(60)).unwrap();
        assert_eq!(report.failed_workers, 1);
        match report.outcome {
            SearchOutcome::Found(proof) => assert_eq!(proof.nonce, 810),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(p.active_workers(), 0);
    }
}
