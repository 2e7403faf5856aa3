//! Test support for the Lexis workspace.
//!
//! Deterministic embedding provider with failure injection, recording
//! usage and lookup sinks, and typed loading of the JSON fixtures under
//! `data/`.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use lexis_core::errors::ProviderError;
use lexis_core::traits::{IAccessObserver, IEmbeddingProvider, IUsageRecorder};
use serde::de::DeserializeOwned;

/// Dimensionality of vectors produced by [`MockEmbeddingProvider`].
pub const MOCK_DIMENSIONS: usize = 8;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Root directory of the fixture data.
fn fixtures_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data")
}

/// Load and deserialize a JSON fixture file.
///
/// # Panics
/// Panics if the file doesn't exist or can't be deserialized.
pub fn load_fixture<T: DeserializeOwned>(relative_path: &str) -> T {
    let path = fixtures_root().join(relative_path);
    let content = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture {}: {}", path.display(), e));
    serde_json::from_str(&content)
        .unwrap_or_else(|e| panic!("Failed to parse fixture {}: {}", path.display(), e))
}

/// Check that a fixture file exists.
pub fn fixture_exists(relative_path: &str) -> bool {
    fixtures_root().join(relative_path).exists()
}

/// Deterministic vector for `text` under `model`: blake3 bytes mapped to [-1, 1].
pub fn deterministic_vector(text: &str, model: &str) -> Vec<f32> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(text.trim().to_lowercase().as_bytes());
    hasher.update(b":");
    hasher.update(model.as_bytes());
    hasher
        .finalize()
        .as_bytes()
        .iter()
        .take(MOCK_DIMENSIONS)
        .map(|b| (*b as f32 / 127.5) - 1.0)
        .collect()
}

/// In-process embedding provider for tests.
#[derive(Debug, Default)]
pub struct MockEmbeddingProvider {
    calls: AtomicUsize,
    per_text: Mutex<HashMap<String, usize>>,
    failing: Mutex<HashSet<String>>,
    fail_all: AtomicBool,
    latency: Option<Duration>,
}

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every fetch.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make fetches of `text` fail with HTTP 503.
    pub fn fail_on(&self, text: &str) {
        lock(&self.failing).insert(text.trim().to_lowercase());
    }

    /// Make every fetch fail (`true`) or succeed again (`false`).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.fail_all.store(unavailable, Ordering::SeqCst);
    }

    /// Total number of fetch attempts.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Fetch attempts for one text (normalized).
    pub fn calls_for(&self, text: &str) -> usize {
        lock(&self.per_text)
            .get(&text.trim().to_lowercase())
            .copied()
            .unwrap_or(0)
    }
}

impl IEmbeddingProvider for MockEmbeddingProvider {
    fn fetch_embedding(
        &self,
        text: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Vec<f32>, ProviderError> {
        let normalized = text.trim().to_lowercase();
        self.calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.per_text).entry(normalized.clone()).or_insert(0) += 1;

        if let Some(latency) = self.latency {
            if latency > timeout {
                std::thread::sleep(timeout);
                return Err(ProviderError::Timeout {
                    after_ms: timeout.as_millis() as u64,
                });
            }
            std::thread::sleep(latency);
        }
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable {
                provider: self.name().to_string(),
            });
        }
        if lock(&self.failing).contains(&normalized) {
            return Err(ProviderError::HttpError { status: 503 });
        }
        Ok(deterministic_vector(text, model))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// One call received by [`RecordingUsageSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct UsageRecord {
    pub text: String,
    pub test_type: String,
    pub success: bool,
    pub difficulty: f64,
}

/// Statistics sink that keeps every record it receives.
#[derive(Debug, Default)]
pub struct RecordingUsageSink {
    records: Mutex<Vec<UsageRecord>>,
}

impl RecordingUsageSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<UsageRecord> {
        lock(&self.records).clone()
    }
}

impl IUsageRecorder for RecordingUsageSink {
    fn record(&self, text: &str, test_type: &str, success: bool, difficulty: f64) {
        lock(&self.records).push(UsageRecord {
            text: text.to_string(),
            test_type: test_type.to_string(),
            success,
            difficulty,
        });
    }
}

/// Access observer that keeps every lookup it sees.
#[derive(Debug, Default)]
pub struct RecordingAccessObserver {
    lookups: Mutex<Vec<(String, bool)>>,
}

impl RecordingAccessObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookups(&self) -> Vec<(String, bool)> {
        lock(&self.lookups).clone()
    }
}

impl IAccessObserver for RecordingAccessObserver {
    fn on_lookup(&self, text: &str, hit: bool) {
        lock(&self.lookups).push((text.to_string(), hit));
    }
}
