use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Provenance;
use crate::constants::PREDICTION_HIT_BOOST;

/// Opaque fingerprint of a (text, model) pair. Always derived, never chosen.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A cached embedding vector plus access and aging metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub vector: Vec<f32>,
    pub created_at: DateTime<Utc>,
    pub last_access_at: DateTime<Utc>,
    /// Starts at 1 on insertion.
    pub access_count: u64,
    pub provenance: Provenance,
    /// In [0, 1]. Zero for user and preload entries.
    pub prediction_score: f64,
    /// A real lookup has hit this predictive entry at least once.
    #[serde(default)]
    pub prediction_confirmed: bool,
}

impl CacheEntry {
    pub fn new(key: CacheKey, vector: Vec<f32>, provenance: Provenance, now: DateTime<Utc>) -> Self {
        Self {
            key,
            vector,
            created_at: now,
            last_access_at: now,
            access_count: 1,
            provenance,
            prediction_score: 0.0,
            prediction_confirmed: false,
        }
    }

    /// Set the initial prediction score, clamped to [0, 1].
    pub fn with_prediction_score(mut self, score: f64) -> Self {
        self.prediction_score = if score.is_finite() { score.clamp(0.0, 1.0) } else { 0.0 };
        self
    }

    /// Register a hit: bump the counter and refresh `last_access_at`.
    ///
    /// `last_access_at` never moves behind `created_at`, even if the clock
    /// stepped backwards. The first hit on a predictive entry confirms the
    /// prediction and boosts its score; returns true for that hit only.
    pub fn touch(&mut self, now: DateTime<Utc>) -> bool {
        self.access_count = self.access_count.saturating_add(1);
        self.last_access_at = now.max(self.created_at).max(self.last_access_at);
        if self.provenance != Provenance::Predictive || self.prediction_confirmed {
            return false;
        }
        self.prediction_confirmed = true;
        self.prediction_score = (self.prediction_score + PREDICTION_HIT_BOOST).min(1.0);
        true
    }

    /// Age in seconds since creation. Negative ages read as zero.
    pub fn age_secs(&self, now: DateTime<Utc>) -> f64 {
        let millis = (now - self.created_at).num_milliseconds().max(0);
        millis as f64 / 1000.0
    }

    /// `ttl_secs == 0` means entries never expire.
    pub fn is_expired(&self, ttl_secs: f64, now: DateTime<Utc>) -> bool {
        ttl_secs > 0.0 && self.age_secs(now) > ttl_secs
    }

    /// Approximate heap plus inline footprint in bytes.
    pub fn memory_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.key.as_str().len()
            + self.vector.len() * std::mem::size_of::<f32>()
    }

    /// Structural invariants every stored entry must satisfy.
    pub fn is_valid(&self) -> bool {
        !self.vector.is_empty()
            && self.access_count >= 1
            && self.last_access_at >= self.created_at
            && (0.0..=1.0).contains(&self.prediction_score)
    }
}
