use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::defaults;

/// Embedding cache configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding the snapshot, metadata, and usage-pattern files.
    pub cache_dir: String,
    /// Load and save snapshots. When false the cache is memory-only.
    pub persistence_enabled: bool,
    /// Maximum number of entries.
    pub max_size: usize,
    /// Maximum entry age in seconds, measured from creation. 0 disables expiry.
    pub ttl_seconds: f64,
    /// Number of puts between automatic saves.
    pub auto_save_interval: usize,
    /// Model name used when callers do not pass one explicitly.
    pub default_model: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: defaults::DEFAULT_CACHE_DIR.to_string(),
            persistence_enabled: defaults::DEFAULT_PERSISTENCE_ENABLED,
            max_size: defaults::DEFAULT_MAX_SIZE,
            ttl_seconds: defaults::DEFAULT_TTL_SECONDS,
            auto_save_interval: defaults::DEFAULT_AUTO_SAVE_INTERVAL,
            default_model: defaults::DEFAULT_MODEL.to_string(),
        }
    }
}

impl CacheConfig {
    /// Memory-only configuration with the given bounds. Handy for tests.
    pub fn in_memory(max_size: usize, ttl_seconds: f64) -> Self {
        Self {
            persistence_enabled: false,
            max_size,
            ttl_seconds,
            ..Default::default()
        }
    }

    /// Cache directory as a path.
    pub fn cache_path(&self) -> PathBuf {
        PathBuf::from(&self.cache_dir)
    }

    /// Returns a copy with out-of-range values normalized.
    ///
    /// `max_size` of 0 becomes 1, negative or non-finite TTLs become 0
    /// (no expiry), and an `auto_save_interval` of 0 becomes 1.
    pub fn sanitized(&self) -> (Self, Vec<String>) {
        let mut fixed = self.clone();
        let mut notes = Vec::new();

        if fixed.max_size == 0 {
            notes.push("max_size 0 raised to 1".to_string());
            fixed.max_size = 1;
        }
        if !fixed.ttl_seconds.is_finite() || fixed.ttl_seconds < 0.0 {
            notes.push(format!("ttl_seconds {} treated as unbounded", fixed.ttl_seconds));
            fixed.ttl_seconds = 0.0;
        }
        if fixed.auto_save_interval == 0 {
            notes.push("auto_save_interval 0 raised to 1".to_string());
            fixed.auto_save_interval = 1;
        }
        (fixed, notes)
    }
}
