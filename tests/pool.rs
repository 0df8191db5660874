// tests/pool.rs
use rand::{Rng, RngCore, SeedableRng};
use rand::rngs::StdRng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use testore_miner_rs::miner::{
    HashTarget, Keccak, MiningPool, POLL_INTERVAL, SearchOutcome, TimeoutCause,
};
use testore_miner_rs::stats::HashCounter;
use testore_miner_rs::types::MiningChallenge;
use testore_miner_rs::utils::StopSignal;

fn challenge(difficulty: u32, nonce_base: u64) -> MiningChallenge {
    let mut seed = [0x11u8; 64];
    seed[32..].fill(0x22);
    MiningChallenge::new(seed, nonce_base, HashTarget::new(difficulty).unwrap(), 1)
}

fn pool(workers: usize, stop: StopSignal) -> MiningPool {
    MiningPool::new(Arc::new(Keccak), workers, HashCounter::new(), stop)
}

#[test]
fn lowest_nonce_wins_for_any_worker_count() {
    for workers in [1, 2, 3, 4, 8] {
        let pool = pool(workers, StopSignal::new());
        let report = pool
            .search(&challenge(8, 0), 10_000_000, Duration::from_secs(60))
            .unwrap();

        match report.outcome {
            SearchOutcome::Found(proof) => {
                assert_eq!(proof.offset, 158, "{} workers", workers);
                assert_eq!(proof.nonce, 158);
                assert!(proof.difficulty() >= 8);
            }
            other => panic!("{} workers: {:?}", workers, other),
        }
        assert_eq!(pool.active_workers(), 0);
    }
}

#[test]
fn offsets_are_relative_to_nonce_base() {
    let pool = pool(3, StopSignal::new());
    let report = pool
        .search(&challenge(8, 100), 100_000, Duration::from_secs(60))
        .unwrap();

    match report.outcome {
        SearchOutcome::Found(proof) => {
            assert_eq!(proof.nonce, 158);
            assert_eq!(proof.offset, 58);
        }
        other => panic!("{:?}", other),
    }
}

#[test]
fn higher_difficulty() {
    let pool = pool(4, StopSignal::new());
    let report = pool
        .search(&challenge(12, 0), 1_000_000, Duration::from_secs(60))
        .unwrap();

    assert!(matches!(report.outcome, SearchOutcome::Found(p) if p.nonce == 3211));
}

/// First offset in `[0, space)` meeting the target, scanned on one thread
fn first_hit(challenge: &MiningChallenge, space: u64) -> Option<u64> {
    (0..space).find(|&offset| {
        let digest = Keccak::digest(&challenge.base_seed, challenge.nonce_at(offset));
        challenge.target.satisfies(&digest)
    })
}

#[test]
fn pool_matches_sequential_scan() {
    // 1/64 hit rate over 400 offsets: the first hit usually lands past the
    // first range once the space is split more than once or twice
    let mut rng = StdRng::seed_from_u64(0x7e57_0e);
    let space = 400;

    for _ in 0..40 {
        let mut seed = [0u8; 64];
        rng.fill_bytes(&mut seed);
        let challenge =
            MiningChallenge::new(seed, rng.r#gen(), HashTarget::new(6).unwrap(), 3);
        let expected = first_hit(&challenge, space);

        for workers in [1, 2, 3, 5, 8, 16] {
            let report = pool(workers, StopSignal::new())
                .search(&challenge, space, Duration::from_secs(60))
                .unwrap();

            match (report.outcome, expected) {
                (SearchOutcome::Found(proof), Some(offset)) => {
                    assert_eq!(proof.offset, offset, "{} workers", workers);
                    assert_eq!(proof.nonce, challenge.nonce_at(offset));
                }
                (SearchOutcome::Timeout(TimeoutCause::Exhausted), None) => {}
                (outcome, expected) => {
                    panic!("{} workers: {:?}, expected {:?}", workers, outcome, expected)
                }
            }
        }
    }
}

#[test]
fn early_hit_cancels_higher_ranges() {
    let workers = 4;
    let pool = pool(workers, StopSignal::new());
    let report = pool
        .search(&challenge(8, 0), u64::MAX, Duration::from_secs(60))
        .unwrap();

    assert!(matches!(report.outcome, SearchOutcome::Found(p) if p.offset == 158));
    // Each worker may finish at most the poll batch it was in when the
    // floor dropped to 158
    let bound = workers as u64 * (158 + 2 * POLL_INTERVAL);
    assert!(report.hashes <= bound, "{} hashes > {}", report.hashes, bound);
    assert_eq!(pool.active_workers(), 0);
}

#[test]
fn interrupt_stops_workers_promptly() {
    let stop = StopSignal::new();
    let pool = pool(4, stop.clone());

    let trigger = stop.clone();
    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        trigger.stop();
        Instant::now()
    });

    let report = pool
        .search(&challenge(64, 0), u64::MAX, Duration::from_secs(600))
        .unwrap();
    let returned = Instant::now();
    let stopped_at = stopper.join().unwrap();

    assert!(matches!(report.outcome, SearchOutcome::Interrupted));
    // One poll batch per worker; unoptimized builds hash far slower
    let latency = returned.saturating_duration_since(stopped_at);
    assert!(latency < Duration::from_secs(2), "returned {:?} after stop", latency);
    assert!(report.hashes > 0);
    assert_eq!(pool.active_workers(), 0);
}
