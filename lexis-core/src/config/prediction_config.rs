use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::defaults;

/// Predictive pre-loading configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    /// Whether the host should start the background scheduler.
    pub enabled: bool,
    /// Upper bound on candidates returned per prediction.
    pub max_predictions: usize,
    /// Pause between two prediction cycles (seconds).
    pub cycle_interval_secs: u64,
    /// Minimum delay between two outbound fetches (milliseconds).
    pub min_request_delay_ms: u64,
    /// Timeout handed to the embedding provider per fetch (seconds).
    pub fetch_timeout_secs: u64,
    /// How long `stop` waits for the worker to finish (seconds).
    pub join_timeout_secs: u64,
    /// How long a failed text is skipped before it is retried (seconds).
    pub failure_backoff_secs: u64,
    /// Fetches per batch during vocabulary pre-load.
    pub preload_batch_size: usize,
    /// Pause after each pre-load batch (milliseconds).
    pub preload_batch_pause_ms: u64,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::DEFAULT_PREDICTION_ENABLED,
            max_predictions: defaults::DEFAULT_MAX_PREDICTIONS,
            cycle_interval_secs: defaults::DEFAULT_CYCLE_INTERVAL_SECS,
            min_request_delay_ms: defaults::DEFAULT_MIN_REQUEST_DELAY_MS,
            fetch_timeout_secs: defaults::DEFAULT_FETCH_TIMEOUT_SECS,
            join_timeout_secs: defaults::DEFAULT_JOIN_TIMEOUT_SECS,
            failure_backoff_secs: defaults::DEFAULT_FAILURE_BACKOFF_SECS,
            preload_batch_size: defaults::DEFAULT_PRELOAD_BATCH_SIZE,
            preload_batch_pause_ms: defaults::DEFAULT_PRELOAD_BATCH_PAUSE_MS,
        }
    }
}

impl PredictionConfig {
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs)
    }

    pub fn min_request_delay(&self) -> Duration {
        Duration::from_millis(self.min_request_delay_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_secs(self.join_timeout_secs)
    }

    pub fn failure_backoff(&self) -> Duration {
        Duration::from_secs(self.failure_backoff_secs)
    }

    pub fn preload_batch_pause(&self) -> Duration {
        Duration::from_millis(self.preload_batch_pause_ms)
    }
}
