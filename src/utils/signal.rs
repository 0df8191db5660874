// src/utils/signal.rs
//! Operator stop handling
//!
//! [`StopSignal`] is a cloneable one-way latch. Triggering it flips an
//! atomic flag and disconnects a crossbeam channel so that every thread
//! parked in [`StopSignal::sleep`] (or selecting on [`StopSignal::waiter`])
//! wakes immediately.

use crate::utils::error::MinerError;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Cloneable stop latch shared by the supervisor, pool and reporter
#[derive(Clone)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
    trigger: Arc<Mutex<Option<Sender<()>>>>,
    waiter: Receiver<()>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    /// Creates an untriggered signal
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(0);
        StopSignal {
            flag: Arc::new(AtomicBool::new(false)),
            trigger: Arc::new(Mutex::new(Some(tx))),
            waiter: rx,
        }
    }

    /// Requests a stop; idempotent
    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
        if let Ok(mut trigger) = self.trigger.lock() {
            trigger.take();
        }
    }

    /// Whether a stop has been requested
    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Receiver that becomes disconnected once the signal fires
    ///
    /// Never carries a message; use it inside `crossbeam_channel::select!`.
    pub fn waiter(&self) -> &Receiver<()> {
        &self.waiter
    }

    /// Sleeps for `duration` unless stopped first
    ///
    /// # Returns
    /// `true` if the signal fired before or during the sleep
    pub fn sleep(&self, duration: Duration) -> bool {
        if self.is_stopped() {
            return true;
        }
        match self.waiter.recv_timeout(duration) {
            Err(RecvTimeoutError::Timeout) => self.is_stopped(),
            _ => true,
        }
    }
}

/// Routes Ctrl-C to `stop`
///
/// The first interrupt requests a graceful stop. A second interrupt exits
/// immediately with status 130.
pub fn listen_for_interrupt(stop: StopSignal) -> Result<(), MinerError> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    std::thread::Builder::new()
        .name("interrupt".into())
        .spawn(move || {
            rt.block_on(async {
                if tokio::signal::ctrl_c().await.is_err() {
                    log::warn!("Unable to listen for Ctrl-C; stop the miner with SIGTERM");
                    return;
                }
                log::warn!("Interrupt received, finishing current step (Ctrl-C again to force)");
                stop.stop();

                if tokio::signal::ctrl_c().await.is_ok() {
                    log::error!("Second interrupt, exiting immediately");
                    std::process::exit(130);
                }
            })
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn sleep_runs_full_duration_when_idle() {
        let stop = StopSignal::new();
        let start = Instant::now();
        assert!(!stop.sleep(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn stop_wakes_sleepers() {
        let stop = StopSignal::new();
        let sleeper = stop.clone();
        let handle = std::thread::spawn(move || {
            let start = Instant::now();
            let stopped = sleeper.sleep(Duration::from_secs(30));
            (stopped, start.elapsed())
        });

        std::thread::sleep(Duration::from_millis(20));
        stop.stop();

        let (stopped, elapsed) = handle.join().unwrap();
        assert!(stopped);
        assert!(elapsed < Duration::from_secs(5));
        assert!(stop.is_stopped());
    }

    #[test]
    fn stop_is_idempotent() {
        let stop = StopSignal::new();
        stop.stop();
        stop.stop();
        assert!(stop.sleep(Duration::from_secs(10)));
    }
}
