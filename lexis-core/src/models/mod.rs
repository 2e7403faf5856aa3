mod cache_entry;
mod cache_stats;
mod provenance;
mod usage_pattern;

pub use cache_entry::{CacheEntry, CacheKey};
pub use cache_stats::{CacheStats, MemoryUsage, ProvenanceCounts};
pub use provenance::Provenance;
pub use usage_pattern::UsagePattern;
