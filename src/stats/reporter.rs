// src/stats/reporter.rs
use crate::stats::tracker::{RunSnapshot, StatsTracker};
use crate::utils::signal::StopSignal;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use sysinfo::{Components, System};

/// Statistics related to hardware performance
#[derive(Debug, Clone, Default)]
pub struct HardwareStats {
    /// Current CPU usage percentage (0-100)
    pub cpu_usage: f32,
    /// Memory currently used on the host (in bytes)
    pub memory_used: u64,
    /// Current CPU temperature in Celsius, 0 when no sensor is exposed
    pub temperature: f32,
}

/// Logs a progress line at a fixed interval
pub struct StatsReporter {
    /// Counters being reported
    tracker: StatsTracker,
    /// System information collector
    system: System,
    /// Hardware component information collector
    components: Components,
    /// Interval at which stats are reported
    report_interval: Duration,
    /// Hash total and time at the previous report
    last: (Instant, u64),
}

impl StatsReporter {
    /// Creates a reporter over `tracker`
    ///
    /// # Arguments
    /// * `tracker` - Run counters to read
    /// * `report_interval` - How often to log statistics
    pub fn new(tracker: StatsTracker, report_interval: Duration) -> Self {
        let hashes = tracker.hash_counter().total();
        StatsReporter {
            tracker,
            system: System::new_all(),
            components: Components::new_with_refreshed_list(),
            report_interval,
            last: (Instant::now(), hashes),
        }
    }

    /// Gets the current hardware statistics
    ///
    /// This refreshes system information before returning the stats.
    pub fn get_hardware_stats(&mut self) -> HardwareStats {
        self.system.refresh_cpu_all();
        self.system.refresh_memory();
        self.components.refresh(true);

        let cpus = self.system.cpus();
        let cpu_usage = if cpus.is_empty() {
            0.0
        } else {
            cpus.iter().map(|c| c.cpu_usage()).sum::<f32>() / cpus.len() as f32
        };

        let temperature = self
            .components
            .iter()
            .find(|c| c.label().contains("CPU"))
            .and_then(|c| c.temperature())
            .unwrap_or(0.0);

        HardwareStats {
            cpu_usage,
            memory_used: self.system.used_memory(),
            temperature,
        }
    }

    /// Hash rate since the previous call
    fn recent_rate(&mut self, snapshot: &RunSnapshot) -> f64 {
        let now = Instant::now();
        let (then, hashes) = self.last;
        self.last = (now, snapshot.total_hashes);

        let secs = now.duration_since(then).as_secs_f64();
        if secs > 0.0 {
            snapshot.total_hashes.saturating_sub(hashes) as f64 / secs
        } else {
            0.0
        }
    }

    /// Emits one progress line now
    pub fn report(&mut self) {
        let snapshot = self.tracker.snapshot();
        let rate = self.recent_rate(&snapshot);
        let hw = self.get_hardware_stats();
        log::info!("{}", progress_line(&snapshot, rate, &hw));
    }

    /// Starts the periodic reporting of statistics
    ///
    /// The background thread logs every interval and exits once `stop`
    /// fires.
    pub fn start(mut self, stop: StopSignal) -> std::io::Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("reporter".into())
            .spawn(move || {
                while !stop.sleep(self.report_interval) {
                    self.report();
                }
            })
    }
}

/// Formats a progress line
///
/// The temperature is left out when no CPU sensor is exposed.
pub fn progress_line(snapshot: &RunSnapshot, recent_rate: f64, hw: &HardwareStats) -> String {
    let mut line = format!(
        "Hashrate: {} (avg {}) | Cycles: {} | Accepted/Rejected: {}/{} | Aborted: {} | Timeouts: {} | CPU: {:.1}% | Mem: {} MiB",
        format_rate(recent_rate),
        format_rate(snapshot.hash_rate),
        snapshot.cycles_completed,
        snapshot.proofs_accepted,
        snapshot.proofs_rejected,
        snapshot.submissions_aborted,
        snapshot.search_timeouts,
        hw.cpu_usage,
        hw.memory_used / (1024 * 1024),
    );
    if hw.temperature > 0.0 {
        line.push_str(&format!(" | Temp: {:.1}°C", hw.temperature));
    }
    line
}

/// Human readable hash rate
pub fn format_rate(rate: f64) -> String {
    if rate >= 1e6 {
        format!("{:.2} MH/s", rate / 1e6)
    } else if rate >= 1e3 {
        format!("{:.2} kH/s", rate / 1e3)
    } else {
        format!("{:.2} H/s", rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_units() {
        assert_eq!(format_rate(12.0), "12.00 H/s");
        assert_eq!(format_rate(2_500.0), "2.50 kH/s");
        assert_eq!(format_rate(3_000_000.0), "3.00 MH/s");
    }

    #[test]
    fn line_contains_counters() {
        let snapshot = RunSnapshot {
            cycles_completed: 3,
            proofs_accepted: 2,
            proofs_rejected: 1,
            ..Default::default()
        };
        let line = progress_line(&snapshot, 1_000.0, &HardwareStats::default());
        assert!(line.contains("Cycles: 3"));
        assert!(line.contains("Accepted/Rejected: 2/1"));
        assert!(line.contains("1.00 kH/s"));
        assert!(!line.contains("Temp"));
    }

    #[test]
    fn line_shows_temperature_when_sensed() {
        let hw = HardwareStats {
            cpu_usage: 50.0,
            memory_used: 512 * 1024 * 1024,
            temperature: 61.25,
        };
        let line = progress_line(&RunSnapshot::default(), 0.0, &hw);
        assert!(line.contains("CPU: 50.0%"));
        assert!(line.contains("Mem: 512 MiB"));
        assert!(line.ends_with("Temp: 61.2°C") || line.ends_with("Temp: 61.3°C"));
    }
}
