use serde::{Deserialize, Serialize};

use super::Provenance;

/// Entry counts split by provenance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceCounts {
    pub user: usize,
    pub predictive: usize,
    pub preload: usize,
}

impl ProvenanceCounts {
    pub fn add(&mut self, provenance: Provenance) {
        match provenance {
            Provenance::User => self.user += 1,
            Provenance::Predictive => self.predictive += 1,
            Provenance::Preload => self.preload += 1,
        }
    }

    pub fn get(&self, provenance: Provenance) -> usize {
        match provenance {
            Provenance::User => self.user,
            Provenance::Predictive => self.predictive,
            Provenance::Preload => self.preload,
        }
    }

    pub fn total(&self) -> usize {
        self.user + self.predictive + self.preload
    }
}

/// Point-in-time statistics of the embedding cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    pub ttl_seconds: f64,
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
    pub evicted: u64,
    pub corrupt: u64,
    pub saves: u64,
    pub loads: u64,
    pub unsaved_changes: u64,
    pub get_calls: u64,
    pub put_calls: u64,
    pub avg_get_latency_ms: f64,
    pub avg_put_latency_ms: f64,
    pub entries_by_provenance: ProvenanceCounts,
    pub predictive_inserts: u64,
    pub predictive_hits: u64,
}

impl CacheStats {
    /// hits / (hits + misses), 0.0 before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Approximate memory held by cached entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub entries: usize,
    pub bytes: usize,
    pub average_entry_bytes: f64,
}

impl MemoryUsage {
    pub fn megabytes(&self) -> f64 {
        self.bytes as f64 / (1024.0 * 1024.0)
    }
}
