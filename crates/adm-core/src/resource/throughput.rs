//! Rolling throughput window for a resource pool.
//!
//! Samples are advisory: they feed status displays and logs, never admission
//! decisions.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Sliding window of (instant, amount) progress samples plus a lifetime total.
pub(super) struct ThroughputWindow {
    window: Duration,
    samples: Mutex<VecDeque<(Instant, u64)>>,
    total: AtomicU64,
}

impl ThroughputWindow {
    pub(super) fn new(window: Duration) -> Self {
        Self {
            window,
            samples: Mutex::new(VecDeque::new()),
            total: AtomicU64::new(0),
        }
    }

    /// Record `amount` units of progress at the current instant.
    pub(super) fn record(&self, amount: u64) {
        self.total.fetch_add(amount, Ordering::Relaxed);
        let now = Instant::now();
        let mut samples = self.samples.lock().unwrap();
        Self::prune(&mut samples, now, self.window);
        samples.push_back((now, amount));
    }

    /// Average rate over the window, in units per second.
    pub(super) fn rate(&self) -> f64 {
        let now = Instant::now();
        let mut samples = self.samples.lock().unwrap();
        Self::prune(&mut samples, now, self.window);
        let sum: u64 = samples.iter().map(|(_, amount)| amount).sum();
        sum as f64 / self.window.as_secs_f64()
    }

    /// Lifetime total of all recorded progress.
    pub(super) fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    fn prune(samples: &mut VecDeque<(Instant, u64)>, now: Instant, window: Duration) {
        while let Some((at, _)) = samples.front() {
            if now.duration_since(*at) <= window {
                break;
            }
            samples.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rate_decays_but_total_is_lifetime() {
        let window = ThroughputWindow::new(Duration::from_millis(50));
        window.record(1000);
        assert!(window.rate() > 0.0);
        assert_eq!(window.total(), 1000);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(window.rate(), 0.0);
        assert_eq!(window.total(), 1000);
    }

    #[test]
    fn rate_reflects_recent_samples() {
        let window = ThroughputWindow::new(Duration::from_secs(5));
        window.record(500);
        window.record(500);
        assert!((window.rate() - 200.0).abs() < 1e-6);
        assert_eq!(window.total(), 1000);
    }
}
