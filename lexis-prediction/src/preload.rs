//! Vocabulary warm-up: fetch every word and meaning of a vocabulary list
//! that is not cached yet, pausing between batches.

use std::collections::HashSet;
use std::thread;
use std::time::Duration;

use lexis_cache::key::normalize;
use lexis_cache::EmbeddingCache;
use lexis_core::config::PredictionConfig;
use lexis_core::traits::IEmbeddingProvider;
use lexis_core::Provenance;
use lexis_observability::events;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::throttle::{Throttle, ThrottleConfig};

/// One word of a vocabulary list with its meanings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyEntry {
    pub word: String,
    #[serde(default)]
    pub meanings: Vec<String>,
}

impl VocabularyEntry {
    pub fn new(word: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            meanings: Vec::new(),
        }
    }

    pub fn with_meanings<I, S>(mut self, meanings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.meanings = meanings.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone)]
pub struct PreloadOptions {
    /// Only the first `max_words` words are considered. `None` = all.
    pub max_words: Option<usize>,
    /// Also warm up each word's meanings.
    pub include_meanings: bool,
    pub throttle: ThrottleConfig,
    pub fetch_timeout: Duration,
    pub model: String,
}

impl PreloadOptions {
    pub fn from_config(config: &PredictionConfig, model: impl Into<String>) -> Self {
        Self {
            max_words: None,
            include_meanings: true,
            throttle: ThrottleConfig::from(config),
            fetch_timeout: config.fetch_timeout(),
            model: model.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreloadReport {
    /// Distinct non-blank texts considered.
    pub requested: usize,
    pub fetched: usize,
    pub already_cached: usize,
    pub failed: usize,
    pub coverage_before: f64,
    pub coverage_after: f64,
}

/// Distinct normalized texts of `vocabulary`, in first-seen order.
fn collect_texts(vocabulary: &[VocabularyEntry], options: &PreloadOptions) -> Vec<String> {
    let limit = options.max_words.unwrap_or(usize::MAX);
    let mut seen = HashSet::new();
    let mut texts = Vec::new();
    for entry in vocabulary.iter().take(limit) {
        let meanings: &[String] = if options.include_meanings {
            &entry.meanings
        } else {
            &[]
        };
        for text in std::iter::once(&entry.word).chain(meanings) {
            let normalized = normalize(text);
            if !normalized.is_empty() && seen.insert(normalized.clone()) {
                texts.push(normalized);
            }
        }
    }
    texts
}

/// Fetch and insert every text of `vocabulary` not already cached.
///
/// Provider errors are counted and logged; the run continues. Ends with a
/// `force_save`, whose failure is logged only.
pub fn preload_vocabulary(
    cache: &EmbeddingCache,
    provider: &dyn IEmbeddingProvider,
    vocabulary: &[VocabularyEntry],
    options: &PreloadOptions,
) -> PreloadReport {
    let texts = collect_texts(vocabulary, options);
    let span = lexis_observability::preload_span!(texts.len());
    let _guard = span.enter();

    let mut report = PreloadReport {
        requested: texts.len(),
        coverage_before: cache.coverage(&texts, &options.model),
        ..Default::default()
    };

    let pending: Vec<&String> = texts
        .iter()
        .filter(|text| !cache.contains(text, &options.model))
        .collect();
    report.already_cached = texts.len() - pending.len();

    let mut throttle = Throttle::new(options.throttle.clone());
    for (i, text) in pending.iter().enumerate() {
        match provider.fetch_embedding(text, &options.model, options.fetch_timeout) {
            Ok(vector) => {
                if cache.put(text, vector, &options.model, Provenance::Preload) {
                    report.fetched += 1;
                } else {
                    report.failed += 1;
                }
            }
            Err(e) => {
                warn!(
                    text = %events::preview(text),
                    provider = provider.name(),
                    error = %e,
                    "preload fetch failed"
                );
                report.failed += 1;
            }
        }

        let last = i + 1 == pending.len();
        if throttle.tick() && !last && !throttle.batch_pause().is_zero() {
            debug!(pause_ms = throttle.batch_pause().as_millis() as u64, "preload batch pause");
            thread::sleep(throttle.batch_pause());
        }
    }

    if let Err(e) = cache.force_save() {
        warn!(error = %e, "preload snapshot save failed");
    }

    report.coverage_after = cache.coverage(&texts, &options.model);
    events::preload_completed(
        report.requested,
        report.fetched,
        report.failed,
        report.coverage_after,
    );
    report
}
