//! EmbeddingCache: the public surface of lexis-cache.
//!
//! Composes key derivation, the LRU + TTL entry store and snapshot
//! persistence under one coarse lock. Disk I/O never happens while the
//! state lock is held; writers are serialized by a separate save lock.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::Instant;

use chrono::Utc;
use lexis_core::config::CacheConfig;
use lexis_core::constants::METADATA_FORMAT_VERSION;
use lexis_core::errors::{CacheError, PersistenceError};
use lexis_core::traits::IAccessObserver;
use lexis_core::{CacheEntry, CacheStats, MemoryUsage, Provenance};
use lexis_observability::events;
use tracing::{debug, warn};

use crate::eviction::{EntryStore, Lookup};
use crate::key;
use crate::persistence::{
    LoadedSnapshot, MetadataConfigEcho, PerformanceTotals, PredictionTotals, SnapshotMetadata,
    SnapshotStore, SnapshotTotals,
};

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct Counters {
    hits: u64,
    misses: u64,
    expired: u64,
    evicted: u64,
    corrupt: u64,
    saves: u64,
    loads: u64,
    get_calls: u64,
    put_calls: u64,
    total_get_ms: f64,
    total_put_ms: f64,
    predictive_inserts: u64,
    predictive_hits: u64,
}

#[derive(Debug)]
struct CacheState {
    entries: EntryStore,
    counters: Counters,
    /// Mutations not yet on disk.
    unsaved: u64,
    /// Puts since the last successful save; drives auto-save.
    puts_since_save: usize,
}

/// Thread-safe embedding cache with LRU eviction, TTL expiry and optional
/// disk persistence.
pub struct EmbeddingCache {
    config: CacheConfig,
    state: Mutex<CacheState>,
    save_lock: Mutex<()>,
    store: Option<SnapshotStore>,
    observer: Option<Arc<dyn IAccessObserver>>,
}

impl std::fmt::Debug for EmbeddingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingCache")
            .field("config", &self.config)
            .field("persistent", &self.store.is_some())
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl EmbeddingCache {
    /// Open the cache, loading the snapshot from `config.cache_dir` when
    /// persistence is enabled. Never fails: load problems are logged and
    /// leave an empty cache.
    pub fn open(config: CacheConfig) -> Self {
        let config = sanitize(config);
        let store = config
            .persistence_enabled
            .then(|| SnapshotStore::new(config.cache_path()));
        let cache = Self::build(config, store);
        cache.load_from_disk();
        cache
    }

    /// Memory-only cache. No disk I/O at all, regardless of configuration.
    pub fn in_memory(config: CacheConfig) -> Self {
        let config = CacheConfig {
            persistence_enabled: false,
            ..sanitize(config)
        };
        Self::build(config, None)
    }

    /// Attach an observer notified after every lookup.
    pub fn with_access_observer(mut self, observer: Arc<dyn IAccessObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    fn build(config: CacheConfig, store: Option<SnapshotStore>) -> Self {
        let state = CacheState {
            entries: EntryStore::new(config.max_size, config.ttl_seconds),
            counters: Counters::default(),
            unsaved: 0,
            puts_since_save: 0,
        };
        Self {
            config,
            state: Mutex::new(state),
            save_lock: Mutex::new(()),
            store,
            observer: None,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, CacheState> {
        lock_recover(&self.state)
    }

    fn load_from_disk(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let span = lexis_observability::snapshot_load_span!(store.snapshot_path().display());
        let _guard = span.enter();
        let start = Instant::now();

        let loaded = match store.load(self.config.ttl_seconds, Utc::now()) {
            Ok(loaded) => loaded,
            Err(e) => {
                events::persistence_degraded("load", &e.to_string());
                LoadedSnapshot::default()
            }
        };

        let mut state = self.lock_state();
        let now = Utc::now();
        let LoadedSnapshot {
            entries,
            expired,
            corrupt,
            metadata,
        } = loaded;

        if let Some(metadata) = &metadata {
            state.counters.saves = metadata.stats.saves;
            state.counters.loads = metadata.stats.loads;
            state.counters.get_calls = metadata.performance.get_calls;
            state.counters.put_calls = metadata.performance.put_calls;
            state.counters.total_get_ms = metadata.performance.total_get_ms;
            state.counters.total_put_ms = metadata.performance.total_put_ms;
        }

        let mut evicted = 0;
        for entry in entries {
            evicted += state.entries.insert(entry, now).evicted;
        }
        state.counters.expired += expired;
        state.counters.corrupt += corrupt;
        state.counters.evicted += evicted as u64;
        if metadata.is_some() || !state.entries.is_empty() || expired + corrupt > 0 {
            state.counters.loads += 1;
        }
        let size = state.entries.len();
        drop(state);

        if evicted > 0 {
            events::entries_evicted(evicted, "capacity_on_load");
        }
        events::cache_loaded(size, expired, corrupt, start.elapsed().as_secs_f64() * 1000.0);
    }

    /// Look up the embedding of `text` under `model`. Never touches the network.
    ///
    /// An expired entry is removed and counted as both expired and a miss.
    pub fn get(&self, text: &str, model: &str) -> Option<Vec<f32>> {
        let start = Instant::now();
        if text.trim().is_empty() {
            warn!("get called with empty text");
            let mut state = self.lock_state();
            state.counters.misses += 1;
            state.counters.get_calls += 1;
            return None;
        }

        let key = key::derive(text, model);
        let result = {
            let mut guard = self.lock_state();
            let state = &mut *guard;
            let lookup = state.entries.lookup(&key, Utc::now());
            let counters = &mut state.counters;
            let result = match lookup {
                Lookup::Hit {
                    vector,
                    confirmed_prediction,
                    ..
                } => {
                    counters.hits += 1;
                    if confirmed_prediction {
                        counters.predictive_hits += 1;
                    }
                    Some(vector)
                }
                Lookup::Expired => {
                    counters.expired += 1;
                    counters.misses += 1;
                    state.unsaved += 1;
                    None
                }
                Lookup::Miss => {
                    counters.misses += 1;
                    None
                }
            };
            state.counters.get_calls += 1;
            state.counters.total_get_ms += start.elapsed().as_secs_f64() * 1000.0;
            result
        };

        if let Some(observer) = &self.observer {
            observer.on_lookup(text, result.is_some());
        }
        result
    }

    /// Store a user-fetched embedding. Returns whether it was stored.
    ///
    /// Empty text or an empty vector is rejected with a warning.
    pub fn put(&self, text: &str, vector: Vec<f32>, model: &str, provenance: Provenance) -> bool {
        self.insert(text, vector, model, provenance, 0.0)
    }

    /// Store a speculatively fetched embedding with its candidate score.
    pub fn put_predicted(&self, text: &str, vector: Vec<f32>, model: &str, score: f64) -> bool {
        self.insert(text, vector, model, Provenance::Predictive, score)
    }

    fn insert(
        &self,
        text: &str,
        vector: Vec<f32>,
        model: &str,
        provenance: Provenance,
        score: f64,
    ) -> bool {
        let start = Instant::now();
        if let Err(e) = validate(text, &vector) {
            warn!(error = %e, "put rejected");
            return false;
        }

        let entry_key = key::derive(text, model);
        let (outcome, due) = {
            let mut guard = self.lock_state();
            let state = &mut *guard;
            // Stamped under the lock so recency follows lock order.
            let now = Utc::now();
            let mut entry = CacheEntry::new(entry_key, vector, provenance, now);
            if provenance == Provenance::Predictive {
                entry = entry.with_prediction_score(score);
            }
            let outcome = state.entries.insert(entry, now);
            let counters = &mut state.counters;
            counters.expired += outcome.expired as u64;
            counters.evicted += outcome.evicted as u64;
            if provenance == Provenance::Predictive {
                counters.predictive_inserts += 1;
            }
            counters.put_calls += 1;
            counters.total_put_ms += start.elapsed().as_secs_f64() * 1000.0;
            state.unsaved += 1 + outcome.expired as u64 + outcome.evicted as u64;
            state.puts_since_save += 1;
            let due = self.store.is_some() && state.puts_since_save >= self.config.auto_save_interval;
            (outcome, due)
        };

        if outcome.evicted > 0 {
            events::entries_evicted(outcome.evicted, "capacity");
        }
        if outcome.expired > 0 {
            events::entries_evicted(outcome.expired, "ttl");
        }
        if due {
            self.auto_save();
        }
        true
    }

    /// Present and not expired. No statistics, no LRU change.
    pub fn contains(&self, text: &str, model: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        let key = key::derive(text, model);
        self.lock_state().entries.contains_live(&key, Utc::now())
    }

    /// Copy of the stored entry, without touching statistics or LRU order.
    pub fn peek(&self, text: &str, model: &str) -> Option<CacheEntry> {
        let key = key::derive(text, model);
        self.lock_state().entries.peek(&key).cloned()
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock_state();
        let c = &state.counters;
        CacheStats {
            size: state.entries.len(),
            capacity: state.entries.capacity(),
            ttl_seconds: state.entries.ttl_secs(),
            hits: c.hits,
            misses: c.misses,
            expired: c.expired,
            evicted: c.evicted,
            corrupt: c.corrupt,
            saves: c.saves,
            loads: c.loads,
            unsaved_changes: state.unsaved,
            get_calls: c.get_calls,
            put_calls: c.put_calls,
            avg_get_latency_ms: average(c.total_get_ms, c.get_calls),
            avg_put_latency_ms: average(c.total_put_ms, c.put_calls),
            entries_by_provenance: state.entries.provenance_counts(),
            predictive_inserts: c.predictive_inserts,
            predictive_hits: c.predictive_hits,
        }
    }

    /// Change the capacity. A smaller bound evicts LRU entries immediately.
    /// Returns the number of evicted entries.
    pub fn resize(&self, new_max_size: usize) -> usize {
        if new_max_size == 0 {
            warn!("resize to 0 entries, using 1");
        }
        let evicted = {
            let mut state = self.lock_state();
            let evicted = state.entries.resize(new_max_size);
            state.counters.evicted += evicted as u64;
            state.unsaved += evicted as u64;
            evicted
        };
        if evicted > 0 {
            events::entries_evicted(evicted, "resize");
        }
        evicted
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn clear_expired(&self) -> usize {
        let removed = {
            let mut state = self.lock_state();
            let removed = state.entries.sweep_expired(Utc::now());
            state.counters.expired += removed as u64;
            state.unsaved += removed as u64;
            removed
        };
        if removed > 0 {
            events::entries_evicted(removed, "ttl");
        }
        removed
    }

    /// Drop every entry. Counters survive. Returns how many were removed.
    pub fn clear_all(&self) -> usize {
        let mut state = self.lock_state();
        let removed = state.entries.clear();
        state.unsaved += removed as u64;
        debug!(removed, "cache cleared");
        removed
    }

    /// Save now, waiting for any save in progress. No-op without persistence.
    pub fn force_save(&self) -> Result<(), PersistenceError> {
        if self.store.is_none() {
            return Ok(());
        }
        let _guard = lock_recover(&self.save_lock);
        self.save_locked()
    }

    /// Auto-save; skipped if another save is in progress and retried on the
    /// next put.
    fn auto_save(&self) {
        let _guard = match self.save_lock.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                debug!("save in progress, auto-save deferred");
                return;
            }
        };
        // Errors are already logged by save_locked.
        let _ = self.save_locked();
    }

    /// Caller must hold the save lock.
    fn save_locked(&self) -> Result<(), PersistenceError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let start = Instant::now();

        let (entries, metadata, unsaved_at_copy) = {
            let state = self.lock_state();
            let entries = state.entries.entries_lru_order();
            let metadata = self.metadata(&state, entries.len());
            (entries, metadata, state.unsaved)
        };

        let span = lexis_observability::snapshot_save_span!(entries.len());
        let _span = span.enter();

        match store.save(&entries, &metadata) {
            Ok(report) => {
                let mut state = self.lock_state();
                state.counters.saves += 1;
                state.unsaved = state.unsaved.saturating_sub(unsaved_at_copy);
                state.puts_since_save = 0;
                drop(state);
                events::cache_saved(report.entries, report.bytes, start.elapsed().as_secs_f64() * 1000.0);
                Ok(())
            }
            Err(e) => {
                events::persistence_degraded("save", &e.to_string());
                Err(e)
            }
        }
    }

    fn metadata(&self, state: &CacheState, entry_count: usize) -> SnapshotMetadata {
        let c = &state.counters;
        SnapshotMetadata {
            version: METADATA_FORMAT_VERSION.to_string(),
            saved_at: Utc::now(),
            entry_count,
            config: MetadataConfigEcho {
                max_size: state.entries.capacity(),
                ttl_seconds: state.entries.ttl_secs(),
                auto_save_interval: self.config.auto_save_interval,
                default_model: self.config.default_model.clone(),
            },
            stats: SnapshotTotals {
                hits: c.hits,
                misses: c.misses,
                expired: c.expired,
                evicted: c.evicted,
                corrupt: c.corrupt,
                // Counts the save being written.
                saves: c.saves + 1,
                loads: c.loads,
            },
            performance: PerformanceTotals {
                get_calls: c.get_calls,
                put_calls: c.put_calls,
                total_get_ms: c.total_get_ms,
                total_put_ms: c.total_put_ms,
            },
            prediction: PredictionTotals {
                entries_by_provenance: state.entries.provenance_counts(),
                predictive_inserts: c.predictive_inserts,
                predictive_hits: c.predictive_hits,
            },
        }
    }

    /// Approximate memory held by the entries.
    pub fn memory_usage(&self) -> MemoryUsage {
        let state = self.lock_state();
        let entries = state.entries.len();
        let bytes = state.entries.memory_bytes();
        MemoryUsage {
            entries,
            bytes,
            average_entry_bytes: if entries == 0 { 0.0 } else { bytes as f64 / entries as f64 },
        }
    }

    /// Fraction of the non-blank `texts` currently cached. 0.0 for none.
    pub fn coverage<S: AsRef<str>>(&self, texts: &[S], model: &str) -> f64 {
        let now = Utc::now();
        let state = self.lock_state();
        let mut total = 0usize;
        let mut cached = 0usize;
        for text in texts.iter().map(AsRef::as_ref).filter(|t| !t.trim().is_empty()) {
            total += 1;
            if state.entries.contains_live(&key::derive(text, model), now) {
                cached += 1;
            }
        }
        if total == 0 {
            0.0
        } else {
            cached as f64 / total as f64
        }
    }

    pub fn len(&self) -> usize {
        self.lock_state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock_state().entries.capacity()
    }

    /// Effective configuration, reflecting any `resize`.
    pub fn config(&self) -> CacheConfig {
        CacheConfig {
            max_size: self.capacity(),
            ..self.config.clone()
        }
    }

    pub fn default_model(&self) -> &str {
        &self.config.default_model
    }

    pub fn is_persistent(&self) -> bool {
        self.store.is_some()
    }
}

impl Drop for EmbeddingCache {
    fn drop(&mut self) {
        if self.store.is_none() || self.lock_state().unsaved == 0 {
            return;
        }
        if let Err(e) = self.force_save() {
            warn!(error = %e, "final cache flush failed");
        }
    }
}

fn sanitize(config: CacheConfig) -> CacheConfig {
    let (config, notes) = config.sanitized();
    for note in notes {
        warn!(note = %note, "cache configuration adjusted");
    }
    config
}

fn validate(text: &str, vector: &[f32]) -> Result<(), CacheError> {
    if text.trim().is_empty() {
        return Err(CacheError::EmptyText);
    }
    if vector.is_empty() {
        return Err(CacheError::EmptyVector {
            text: events::preview(text),
        });
    }
    Ok(())
}

fn average(total_ms: f64, calls: u64) -> f64 {
    if calls == 0 {
        0.0
    } else {
        total_ms / calls as f64
    }
}
