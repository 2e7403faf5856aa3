//! UsagePatternTracker: per-text frequency, recency and success statistics.
//!
//! Patterns are keyed by normalized text and kept in insertion order, both
//! in memory and in `usage_patterns.json`.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use chrono::Utc;
use lexis_cache::key::normalize;
use lexis_cache::persistence::write_atomic;
use lexis_core::config::CacheConfig;
use lexis_core::constants::USAGE_PATTERNS_FILENAME;
use lexis_core::errors::{LexisResult, PersistenceError};
use lexis_core::traits::{IAccessObserver, IUsageRecorder};
use lexis_core::UsagePattern;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, info, warn};

/// Insertion-ordered map from normalized text to its pattern.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatternTable {
    index: HashMap<String, usize>,
    patterns: Vec<(String, UsagePattern)>,
}

impl PatternTable {
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn get(&self, text: &str) -> Option<&UsagePattern> {
        self.index.get(text).map(|&i| &self.patterns[i].1)
    }

    pub fn get_mut(&mut self, text: &str) -> Option<&mut UsagePattern> {
        self.index.get(text).map(|&i| &mut self.patterns[i].1)
    }

    /// Existing pattern for `text`, or a new one appended at the end.
    pub fn entry(&mut self, text: &str, fresh: impl FnOnce() -> UsagePattern) -> &mut UsagePattern {
        let i = match self.index.get(text) {
            Some(&i) => i,
            None => {
                self.patterns.push((text.to_string(), fresh()));
                self.index.insert(text.to_string(), self.patterns.len() - 1);
                self.patterns.len() - 1
            }
        };
        &mut self.patterns[i].1
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &UsagePattern)> {
        self.patterns.iter().map(|(text, pattern)| (text.as_str(), pattern))
    }
}

impl Serialize for PatternTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.patterns.len()))?;
        for (text, pattern) in &self.patterns {
            map.serialize_entry(text, pattern)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PatternTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = PatternTable;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of text to usage pattern")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut table = PatternTable::default();
                while let Some((text, pattern)) = access.next_entry::<String, UsagePattern>()? {
                    match table.get_mut(&text) {
                        Some(existing) => *existing = pattern,
                        None => {
                            table.entry(&text, move || pattern);
                        }
                    }
                }
                Ok(table)
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    table: PatternTable,
    records_since_save: usize,
    dirty: bool,
}

/// Tracks how each text is used and forwards every record downstream.
///
/// Also an [`IAccessObserver`]: cache lookups refresh `last_used` of known
/// texts without counting as a use.
pub struct UsagePatternTracker {
    state: Mutex<TrackerState>,
    /// Serializes writers of the patterns file.
    save_lock: Mutex<()>,
    path: Option<PathBuf>,
    auto_save_interval: usize,
    recorder: Option<Arc<dyn IUsageRecorder>>,
    lookups: AtomicU64,
}

impl fmt::Debug for UsagePatternTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsagePatternTracker")
            .field("path", &self.path)
            .field("patterns", &self.len())
            .field("recorder", &self.recorder.is_some())
            .finish()
    }
}

impl UsagePatternTracker {
    /// Tracker without a backing file.
    pub fn in_memory() -> Self {
        Self::build(None, usize::MAX, PatternTable::default())
    }

    /// Tracker persisted to `<dir>/usage_patterns.json`, loaded now.
    /// An unreadable file is logged and yields an empty tracker.
    pub fn open(dir: impl AsRef<Path>, auto_save_interval: usize) -> Self {
        let path = dir.as_ref().join(USAGE_PATTERNS_FILENAME);
        let table = match load_table(&path) {
            Ok(table) => {
                if !table.is_empty() {
                    info!(patterns = table.len(), path = %path.display(), "usage patterns loaded");
                }
                table
            }
            Err(e) => {
                lexis_observability::events::persistence_degraded("load_usage_patterns", &e.to_string());
                PatternTable::default()
            }
        };
        Self::build(Some(path), auto_save_interval.max(1), table)
    }

    /// Persistent when the cache configuration is, in-memory otherwise.
    pub fn from_config(config: &CacheConfig) -> Self {
        if config.persistence_enabled {
            Self::open(config.cache_path(), config.auto_save_interval)
        } else {
            Self::in_memory()
        }
    }

    /// Forward every record to `recorder` as well.
    pub fn with_recorder(mut self, recorder: Arc<dyn IUsageRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    fn build(path: Option<PathBuf>, auto_save_interval: usize, table: PatternTable) -> Self {
        Self {
            state: Mutex::new(TrackerState {
                table,
                ..Default::default()
            }),
            save_lock: Mutex::new(()),
            path,
            auto_save_interval,
            recorder: None,
            lookups: AtomicU64::new(0),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record one use of `text` in a test of type `test_type`.
    ///
    /// Blank text is ignored with a warning. Never fails.
    pub fn record(&self, text: &str, test_type: &str, success: bool, difficulty: f64) {
        let normalized = normalize(text);
        if normalized.is_empty() {
            warn!("usage record with empty text ignored");
            return;
        }

        let now = Utc::now();
        let due = {
            let mut state = self.lock_state();
            state
                .table
                .entry(&normalized, || UsagePattern::new(now))
                .record(test_type, success, difficulty, now);
            state.records_since_save += 1;
            state.dirty = true;
            self.path.is_some() && state.records_since_save >= self.auto_save_interval
        };

        if let Some(recorder) = &self.recorder {
            recorder.record(text, test_type, success, difficulty);
        }
        if due {
            self.auto_save();
        }
    }

    /// Copy of the pattern for `text`, if any.
    pub fn pattern(&self, text: &str) -> Option<UsagePattern> {
        self.lock_state().table.get(&normalize(text)).cloned()
    }

    /// All patterns in insertion order.
    pub fn snapshot(&self) -> Vec<(String, UsagePattern)> {
        self.lock_state()
            .table
            .iter()
            .map(|(text, pattern)| (text.to_string(), pattern.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock_state().table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cache lookups observed so far.
    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }

    /// Write `usage_patterns.json`, waiting for any save in progress.
    /// No-op for an in-memory tracker.
    pub fn save(&self) -> LexisResult<()> {
        if self.path.is_none() {
            return Ok(());
        }
        let _guard = self.save_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.save_locked()
    }

    /// Skipped while another save is running; the next record retries.
    fn auto_save(&self) {
        let _guard = match self.save_lock.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                debug!("usage pattern save in progress, auto-save deferred");
                return;
            }
        };
        if let Err(e) = self.save_locked() {
            warn!(error = %e, "usage pattern auto-save failed");
        }
    }

    /// Caller must hold the save lock.
    fn save_locked(&self) -> LexisResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = {
            let mut state = self.lock_state();
            let json = serde_json::to_vec_pretty(&state.table)?;
            state.records_since_save = 0;
            state.dirty = false;
            json
        };
        if let Some(dir) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(dir) {
                self.lock_state().dirty = true;
                return Err(PersistenceError::io(dir, e).into());
            }
        }
        if let Err(e) = write_atomic(path, &json) {
            self.lock_state().dirty = true;
            return Err(e.into());
        }
        debug!(path = %path.display(), bytes = json.len(), "usage patterns saved");
        Ok(())
    }
}

impl IAccessObserver for UsagePatternTracker {
    fn on_lookup(&self, text: &str, _hit: bool) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        let normalized = normalize(text);
        let mut state = self.lock_state();
        if let Some(pattern) = state.table.get_mut(&normalized) {
            pattern.last_used = Utc::now();
            state.dirty = true;
        }
    }
}

impl Drop for UsagePatternTracker {
    fn drop(&mut self) {
        if self.path.is_none() || !self.lock_state().dirty {
            return;
        }
        if let Err(e) = self.save() {
            warn!(error = %e, "final usage pattern flush failed");
        }
    }
}

fn load_table(path: &Path) -> Result<PatternTable, PersistenceError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(PatternTable::default()),
        Err(e) => return Err(PersistenceError::io(path, e)),
    };
    serde_json::from_slice(&bytes).map_err(|e| PersistenceError::Serialization {
        reason: format!("{}: {e}", path.display()),
    })
}
