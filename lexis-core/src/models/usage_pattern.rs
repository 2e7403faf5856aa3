use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{USAGE_EMA_ALPHA, USAGE_NEUTRAL_PRIOR};

/// Usage statistics for one normalized text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsagePattern {
    pub frequency: u64,
    pub last_used: DateTime<Utc>,
    /// Context tags (test types) the text has been seen in.
    pub test_types: BTreeSet<String>,
    pub difficulty_score: f64,
    pub success_rate: f64,
}

impl UsagePattern {
    /// Fresh pattern at the neutral prior, before any use is recorded.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            frequency: 0,
            last_used: now,
            test_types: BTreeSet::new(),
            difficulty_score: USAGE_NEUTRAL_PRIOR,
            success_rate: USAGE_NEUTRAL_PRIOR,
        }
    }

    /// Fold one use into the pattern with an exponential moving average.
    pub fn record(&mut self, test_type: &str, success: bool, difficulty: f64, now: DateTime<Utc>) {
        let outcome = if success { 1.0 } else { 0.0 };
        let difficulty = if difficulty.is_finite() {
            difficulty.clamp(0.0, 1.0)
        } else {
            self.difficulty_score
        };

        self.success_rate = (1.0 - USAGE_EMA_ALPHA) * self.success_rate + USAGE_EMA_ALPHA * outcome;
        self.difficulty_score =
            (1.0 - USAGE_EMA_ALPHA) * self.difficulty_score + USAGE_EMA_ALPHA * difficulty;
        self.frequency = self.frequency.saturating_add(1);
        self.last_used = now;
        if !test_type.is_empty() && !self.test_types.contains(test_type) {
            self.test_types.insert(test_type.to_string());
        }
    }

    pub fn seen_in(&self, test_type: &str) -> bool {
        self.test_types.contains(test_type)
    }
}
