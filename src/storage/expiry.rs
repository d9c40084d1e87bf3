//! Adaptive Active Expiry
//!
//! This module implements the "active expiry" cycle, as opposed to "lazy
//! expiry" (which happens on access).
//!
//! ## Why Do We Need This?
//!
//! Lazy expiry (checking on access) is efficient but has a problem:
//! If a key expires and is never accessed again, it will stay in memory forever!
//!
//! ## Design
//!
//! The sweeper is not a task of its own. The server's owner loop calls
//! [`ExpirySweeper::run_cycle`] at the top of every iteration, and the
//! sweeper decides whether a cycle is due:
//!
//! 1. Nothing to do if no key carries an expiry
//! 2. Skip if the last cycle ran less than `cycle_interval` ago
//! 3. Skip if the estimated stale share is below `acceptable_stale`, unless
//!    `idle_interval` has passed since the last cycle
//! 4. Otherwise sample `sample_size` random expiring keys per round and
//!    remove the expired ones; keep going while the last round hit more than
//!    `acceptable_stale` percent, up to `cycle_budget` of wall time
//!
//! ## Adaptive Frequency
//!
//! After each cycle the stale estimate moves 20% toward the observed hit
//! rate. A single round in which every sampled key had expired lifts a cold
//! estimate of zero to 20, past the default threshold of 10, so a burst of
//! expirations is followed up on the next due cycle. A long run of clean
//! cycles decays the estimate and the sweeper falls back to `idle_interval`.

use crate::storage::Store;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// Minimum time between two cycles (default: 100ms)
    pub cycle_interval: Duration,

    /// Time slice for one sampling round (default: 25ms)
    pub round_slice: Duration,

    /// Wall-time budget for a whole cycle (default: 100ms)
    pub cycle_budget: Duration,

    /// Keys sampled per round (default: 20)
    pub sample_size: usize,

    /// Stale percentage that makes a cycle, or another round, worthwhile (default: 10)
    pub acceptable_stale: f64,

    /// Longest the sweeper stays dormant while the estimate is low (default: 1s)
    pub idle_interval: Duration,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            cycle_interval: Duration::from_millis(100),
            round_slice: Duration::from_millis(25),
            cycle_budget: Duration::from_millis(100),
            sample_size: 20,
            acceptable_stale: 10.0,
            idle_interval: Duration::from_secs(1),
        }
    }
}

/// What a single cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Keys checked
    pub sampled: usize,
    /// Keys removed because they had expired
    pub expired: usize,
    /// Sampling rounds run
    pub rounds: usize,
}

/// Active expiry state carried between cycles.
#[derive(Debug)]
pub struct ExpirySweeper {
    config: ExpiryConfig,
    last_cycle: Option<Instant>,
    stale_percent: f64,
}

impl Default for ExpirySweeper {
    fn default() -> Self {
        Self::new(ExpiryConfig::default())
    }
}

impl ExpirySweeper {
    /// Creates a sweeper with a cold (zero) stale estimate.
    pub fn new(config: ExpiryConfig) -> Self {
        Self {
            config,
            last_cycle: None,
            stale_percent: 0.0,
        }
    }

    /// Current smoothed estimate of the expired share of expiring keys, 0-100.
    pub fn stale_percent(&self) -> f64 {
        self.stale_percent
    }

    /// When the last cycle actually ran.
    pub fn last_cycle(&self) -> Option<Instant> {
        self.last_cycle
    }

    /// Whether a cycle starting at `now` should run.
    fn is_due(&self, now: Instant) -> bool {
        let Some(last) = self.last_cycle else {
            return true;
        };
        let since = now.saturating_duration_since(last);
        if since < self.config.cycle_interval {
            return false;
        }
        self.stale_percent >= self.config.acceptable_stale || since >= self.config.idle_interval
    }

    /// Runs one active expiry cycle against `store`, if one is due.
    ///
    /// Returns what the cycle did; a skipped cycle returns all zeros.
    pub fn run_cycle(&mut self, store: &mut Store) -> CycleStats {
        let mut stats = CycleStats::default();

        if store.expiring_len() == 0 {
            return stats;
        }

        let start = Instant::now();
        if !self.is_due(start) {
            trace!(stale = self.stale_percent, "Expiry cycle skipped");
            return stats;
        }

        let mut rng = rand::rng();
        loop {
            let sample = store.sample_expiring(self.config.sample_size, &mut rng);
            if sample.is_empty() {
                break;
            }

            let round_start = Instant::now();
            let mut sampled = 0;
            let mut expired = 0;
            for key in &sample {
                if round_start.elapsed() >= self.config.round_slice {
                    break;
                }
                let now = Instant::now();
                if store.expire_if_due(key, now) {
                    expired += 1;
                }
                sampled += 1;
            }

            stats.rounds += 1;
            stats.sampled += sampled;
            stats.expired += expired;

            if sampled == 0 || start.elapsed() >= self.config.cycle_budget {
                break;
            }
            if (expired * 100) as f64 / sampled as f64 <= self.config.acceptable_stale {
                break;
            }
        }

        if stats.sampled > 0 {
            self.stale_percent = stats.expired as f64 / stats.sampled as f64 * 20.0
                + self.stale_percent * 0.8;
        }
        self.last_cycle = Some(start);

        if stats.expired > 0 {
            debug!(
                expired = stats.expired,
                sampled = stats.sampled,
                rounds = stats.rounds,
                stale = %format!("{:.2}%", self.stale_percent),
                keys_remaining = store.len(),
                "Expired keys cleaned up"
            );
        } else {
            trace!(sampled = stats.sampled, "Expiry cycle found nothing");
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn expiring_store(count: usize, ttl: Duration) -> Store {
        let mut store = Store::new();
        for i in 0..count {
            store.set(format!("temp:{i}"), "gone", Some(ttl)).unwrap();
        }
        store
    }

    #[test]
    fn test_no_expiring_keys_is_noop() {
        let mut store = Store::new();
        store.set("persistent", "value", None).unwrap();

        let mut sweeper = ExpirySweeper::default();
        assert_eq!(sweeper.run_cycle(&mut store), CycleStats::default());
        assert_eq!(sweeper.last_cycle(), None);
    }

    #[test]
    fn test_sweeper_cleans_expired_keys() {
        let mut store = expiring_store(10, Duration::from_millis(5));
        for i in 0..5 {
            store.set(format!("keep:{i}"), "stay", None).unwrap();
        }

        thread::sleep(Duration::from_millis(20));

        let mut sweeper = ExpirySweeper::default();
        let stats = sweeper.run_cycle(&mut store);

        assert_eq!(stats.expired, 10);
        assert_eq!(store.len(), 5);
        assert_eq!(store.stats().expired, 10);
        store.assert_consistent();
    }

    #[test]
    fn test_leaves_unexpired_keys_alone() {
        let mut store = expiring_store(10, Duration::from_secs(3600));

        let mut sweeper = ExpirySweeper::default();
        let stats = sweeper.run_cycle(&mut store);

        assert_eq!(stats.sampled, 10);
        assert_eq!(stats.expired, 0);
        assert_eq!(stats.rounds, 1);
        assert_eq!(store.len(), 10);
        assert_eq!(sweeper.stale_percent(), 0.0);
    }

    #[test]
    fn test_rounds_repeat_while_hit_rate_is_high() {
        let mut store = expiring_store(100, Duration::from_millis(5));
        thread::sleep(Duration::from_millis(20));

        let mut sweeper = ExpirySweeper::default();
        let stats = sweeper.run_cycle(&mut store);

        // Every round is fully stale, so rounds continue until the set is drained.
        assert_eq!(stats.expired, 100);
        assert!(stats.rounds >= 5);
        assert!(store.is_empty());
        store.assert_consistent();
    }

    #[test]
    fn test_stale_estimate_update() {
        let mut store = expiring_store(20, Duration::from_millis(5));
        thread::sleep(Duration::from_millis(20));

        let mut sweeper = ExpirySweeper::default();
        sweeper.run_cycle(&mut store);

        // 100% hit rate from a cold start lands exactly on 20.
        assert!((sweeper.stale_percent() - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_skips_when_not_due() {
        let mut store = expiring_store(20, Duration::from_millis(5));
        thread::sleep(Duration::from_millis(20));

        let config = ExpiryConfig {
            sample_size: 5,
            ..Default::default()
        };
        let mut sweeper = ExpirySweeper::new(config);

        // First cycle runs: one fully stale round after another.
        sweeper.run_cycle(&mut store);
        store.set("fresh", 1, Some(Duration::from_millis(5))).unwrap();
        thread::sleep(Duration::from_millis(10));

        // Immediately again: inside cycle_interval, so nothing happens.
        let stats = sweeper.run_cycle(&mut store);
        assert_eq!(stats, CycleStats::default());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_low_estimate_waits_for_idle_interval() {
        let mut store = expiring_store(5, Duration::from_secs(3600));

        let config = ExpiryConfig {
            cycle_interval: Duration::from_millis(10),
            idle_interval: Duration::from_millis(80),
            ..Default::default()
        };
        let mut sweeper = ExpirySweeper::new(config);

        // Clean first cycle keeps the estimate at zero.
        sweeper.run_cycle(&mut store);
        store.set("soon", 1, Some(Duration::from_millis(5))).unwrap();
        thread::sleep(Duration::from_millis(30));

        // Due by interval, but the estimate is too low and idle_interval hasn't passed.
        assert_eq!(sweeper.run_cycle(&mut store).sampled, 0);
        assert_eq!(store.len(), 6);

        thread::sleep(Duration::from_millis(80));
        let stats = sweeper.run_cycle(&mut store);
        assert_eq!(stats.expired, 1);
        assert_eq!(store.len(), 5);
    }

    #[test]
    fn test_round_respects_time_slice() {
        let mut store = expiring_store(50, Duration::from_millis(5));
        thread::sleep(Duration::from_millis(20));

        let config = ExpiryConfig {
            round_slice: Duration::ZERO,
            ..Default::default()
        };
        let mut sweeper = ExpirySweeper::new(config);

        // A zero slice lets no key through; the cycle ends cleanly.
        let stats = sweeper.run_cycle(&mut store);
        assert_eq!(stats.sampled, 0);
        assert_eq!(stats.rounds, 1);
        assert_eq!(store.len(), 50);
        assert!(sweeper.last_cycle().is_some());
    }
}
