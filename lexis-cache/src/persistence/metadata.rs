use chrono::{DateTime, Utc};
use lexis_core::ProvenanceCounts;
use serde::{Deserialize, Serialize};

/// Contents of `metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub version: String,
    pub saved_at: DateTime<Utc>,
    pub entry_count: usize,
    pub config: MetadataConfigEcho,
    pub stats: SnapshotTotals,
    pub performance: PerformanceTotals,
    pub prediction: PredictionTotals,
}

/// Configuration in effect when the snapshot was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataConfigEcho {
    pub max_size: usize,
    pub ttl_seconds: f64,
    pub auto_save_interval: usize,
    pub default_model: String,
}

/// Cumulative counters carried across restarts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotTotals {
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
    pub evicted: u64,
    pub corrupt: u64,
    pub saves: u64,
    pub loads: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceTotals {
    pub get_calls: u64,
    pub put_calls: u64,
    pub total_get_ms: f64,
    pub total_put_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionTotals {
    pub entries_by_provenance: ProvenanceCounts,
    pub predictive_inserts: u64,
    pub predictive_hits: u64,
}
