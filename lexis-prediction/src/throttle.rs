//! Pacing for outbound fetches.
//!
//! [`Throttle`] pauses a bulk run after every batch; [`RequestPacer`]
//! enforces a minimum delay between two consecutive requests.

use std::time::{Duration, Instant};

use lexis_core::config::PredictionConfig;

/// Batch throttle settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottleConfig {
    /// Pause after each full batch.
    pub batch_pause: Duration,
    /// Items per batch.
    pub batch_size: usize,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self::from(&PredictionConfig::default())
    }
}

impl From<&PredictionConfig> for ThrottleConfig {
    fn from(config: &PredictionConfig) -> Self {
        Self {
            batch_pause: config.preload_batch_pause(),
            batch_size: config.preload_batch_size.max(1),
        }
    }
}

/// Counts processed items and says when a batch is full.
#[derive(Debug)]
pub struct Throttle {
    config: ThrottleConfig,
    items_in_batch: usize,
}

impl Throttle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            items_in_batch: 0,
        }
    }

    /// Record one processed item. Returns true when the caller should pause.
    pub fn tick(&mut self) -> bool {
        self.items_in_batch += 1;
        if self.items_in_batch >= self.config.batch_size.max(1) {
            self.items_in_batch = 0;
            true
        } else {
            false
        }
    }

    pub fn batch_pause(&self) -> Duration {
        self.config.batch_pause
    }
}

/// Minimum spacing between two requests.
#[derive(Debug)]
pub struct RequestPacer {
    min_delay: Duration,
    last_request: Option<Instant>,
}

impl RequestPacer {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last_request: None,
        }
    }

    /// How long to wait at `now` before the next request may go out.
    pub fn wait_at(&self, now: Instant) -> Duration {
        match self.last_request {
            Some(last) => (last + self.min_delay).saturating_duration_since(now),
            None => Duration::ZERO,
        }
    }

    /// Note that a request went out at `now`.
    pub fn mark(&mut self, now: Instant) {
        self.last_request = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pauses_after_batch_size() {
        let mut throttle = Throttle::new(ThrottleConfig {
            batch_pause: Duration::from_millis(10),
            batch_size: 3,
        });
        assert!(!throttle.tick());
        assert!(!throttle.tick());
        assert!(throttle.tick());
        assert!(!throttle.tick());
    }

    #[test]
    fn zero_batch_size_pauses_every_item() {
        let mut throttle = Throttle::new(ThrottleConfig {
            batch_pause: Duration::ZERO,
            batch_size: 0,
        });
        assert!(throttle.tick());
        assert!(throttle.tick());
    }

    #[test]
    fn defaults_follow_prediction_config() {
        let config = ThrottleConfig::default();
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.batch_pause, Duration::from_secs(1));
    }

    #[test]
    fn pacer_enforces_min_delay() {
        let mut pacer = RequestPacer::new(Duration::from_millis(200));
        let t0 = Instant::now();
        assert_eq!(pacer.wait_at(t0), Duration::ZERO);
        pacer.mark(t0);
        assert_eq!(pacer.wait_at(t0 + Duration::from_millis(50)), Duration::from_millis(150));
        assert_eq!(pacer.wait_at(t0 + Duration::from_millis(250)), Duration::ZERO);
    }
}
