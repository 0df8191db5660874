// src/stats/tracker.rs
use crate::utils::error::MinerError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Pool-wide hash counter shared by every searcher
///
/// Searchers add in batches, so readers may lag by up to one poll
/// interval per worker.
#[derive(Debug, Clone, Default)]
pub struct HashCounter(Arc<AtomicU64>);

impl HashCounter {
    /// Counter starting at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `n` computed digests
    #[inline]
    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    /// Digests computed so far
    pub fn total(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Terminal result of one mining cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Proof confirmed by the ledger
    Accepted,
    /// Proof refused by the ledger
    Rejected,
    /// Submission gave up after its retry budget
    Aborted,
    /// Search ended without a proof
    Timeout,
    /// Any other recoverable failure
    Failed,
}

/// Statistics of the current run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    /// Cycles that reached a terminal outcome
    pub cycles_completed: u64,
    /// Proofs the ledger accepted
    pub proofs_accepted: u64,
    /// Proofs the ledger rejected
    pub proofs_rejected: u64,
    /// Submissions abandoned after retries
    pub submissions_aborted: u64,
    /// Searches that timed out or exhausted their space
    pub search_timeouts: u64,
    /// Other recoverable cycle failures
    pub cycle_failures: u64,
    /// Digests computed by all workers
    pub total_hashes: u64,
    /// Average hashes per second since start
    pub hash_rate: f64,
    /// Seconds since the tracker was created
    pub elapsed_secs: f64,
}

impl RunSnapshot {
    /// Writes the snapshot as pretty JSON
    pub fn save(&self, path: &Path) -> Result<(), MinerError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Reads a snapshot written by [`save`](Self::save)
    pub fn load(path: &Path) -> Result<Self, MinerError> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

#[derive(Debug)]
struct Counters {
    cycles: AtomicU64,
    accepted: AtomicU64,
    rejected: AtomicU64,
    aborted: AtomicU64,
    timeouts: AtomicU64,
    failures: AtomicU64,
    started: Instant,
}

/// Run statistics, written by the supervisor and read by anyone
///
/// Every field is its own atomic; readers never block the writer.
#[derive(Debug, Clone)]
pub struct StatsTracker {
    counters: Arc<Counters>,
    hashes: HashCounter,
}

impl Default for StatsTracker {
    fn default() -> Self {
        Self::new(HashCounter::new())
    }
}

impl StatsTracker {
    /// Creates a tracker reading hash totals from `hashes`
    pub fn new(hashes: HashCounter) -> Self {
        StatsTracker {
            counters: Arc::new(Counters {
                cycles: AtomicU64::new(0),
                accepted: AtomicU64::new(0),
                rejected: AtomicU64::new(0),
                aborted: AtomicU64::new(0),
                timeouts: AtomicU64::new(0),
                failures: AtomicU64::new(0),
                started: Instant::now(),
            }),
            hashes,
        }
    }

    /// Counter the mining pool should feed
    pub fn hash_counter(&self) -> &HashCounter {
        &self.hashes
    }

    /// Records the outcome of one finished cycle
    pub fn record(&self, outcome: CycleOutcome) {
        let c = &self.counters;
        let counter = match outcome {
            CycleOutcome::Accepted => &c.accepted,
            CycleOutcome::Rejected => &c.rejected,
            CycleOutcome::Aborted => &c.aborted,
            CycleOutcome::Timeout => &c.timeouts,
            CycleOutcome::Failed => &c.failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        c.cycles.fetch_add(1, Ordering::Release);
    }

    /// Cycles recorded so far
    pub fn cycles_completed(&self) -> u64 {
        self.counters.cycles.load(Ordering::Acquire)
    }

    /// Average hash rate since the tracker was created
    pub fn hash_rate(&self) -> f64 {
        let secs = self.counters.started.elapsed().as_secs_f64();
        if secs > 0.0 {
            self.hashes.total() as f64 / secs
        } else {
            0.0
        }
    }

    /// Copies out the current counters
    pub fn snapshot(&self) -> RunSnapshot {
        let c = &self.counters;
        let elapsed = c.started.elapsed().as_secs_f64();
        let total_hashes = self.hashes.total();

        RunSnapshot {
            cycles_completed: c.cycles.load(Ordering::Acquire),
            proofs_accepted: c.accepted.load(Ordering::Relaxed),
            proofs_rejected: c.rejected.load(Ordering::Relaxed),
            submissions_aborted: c.aborted.load(Ordering::Relaxed),
            search_timeouts: c.timeouts.load(Ordering::Relaxed),
            cycle_failures: c.failures.load(Ordering::Relaxed),
            total_hashes,
            hash_rate: if elapsed > 0.0 {
                total_hashes as f64 / elapsed
            } else {
                0.0
            },
            elapsed_secs: elapsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_each_outcome_once() {
        let stats = StatsTracker::default();
        stats.record(CycleOutcome::Accepted);
        stats.record(CycleOutcome::Rejected);
        stats.record(CycleOutcome::Accepted);
        stats.record(CycleOutcome::Timeout);

        let snap = stats.snapshot();
        assert_eq!(snap.cycles_completed, 4);
        assert_eq!(snap.proofs_accepted, 2);
        assert_eq!(snap.proofs_rejected, 1);
        assert_eq!(snap.search_timeouts, 1);
        assert_eq!(snap.submissions_aborted, 0);
    }

    #[test]
    fn concurrent_writers_and_readers() {
        let stats = StatsTracker::default();
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..1_000 {
                        stats.record(CycleOutcome::Accepted);
                        stats.hash_counter().add(10);
                    }
                });
            }
            s.spawn(|| {
                let mut last = 0;
                for _ in 0..1_000 {
                    let now = stats.snapshot().cycles_completed;
                    assert!(now >= last);
                    last = now;
                }
            });
        });

        let snap = stats.snapshot();
        assert_eq!(snap.cycles_completed, 4_000);
        assert_eq!(snap.proofs_accepted, 4_000);
        assert_eq!(snap.total_hashes, 40_000);
    }

    #[test]
    fn snapshot_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("last_run.json");
        let stats = StatsTracker::default();
        stats.record(CycleOutcome::Rejected);

        let snap = stats.snapshot();
        snap.save(&path).unwrap();
        assert_eq!(RunSnapshot::load(&path).unwrap(), snap);
    }
}
