//! Structured log events for key cache and prediction operations.
//!
//! Each function emits a `tracing` event with structured fields.

use lexis_core::constants::LOG_TEXT_PREVIEW_CHARS;

/// Shorten a text for log output.
pub fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(LOG_TEXT_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Log a completed snapshot load.
pub fn cache_loaded(entries: usize, expired: u64, corrupt: u64, elapsed_ms: f64) {
    tracing::info!(
        event = "cache_loaded",
        entries = entries,
        expired = expired,
        corrupt = corrupt,
        elapsed_ms = elapsed_ms,
        "cache snapshot loaded"
    );
}

/// Log a completed snapshot save.
pub fn cache_saved(entries: usize, bytes: u64, elapsed_ms: f64) {
    tracing::info!(
        event = "cache_saved",
        entries = entries,
        bytes = bytes,
        elapsed_ms = elapsed_ms,
        "cache snapshot saved"
    );
}

/// Log a persistence failure that left the cache running in memory.
pub fn persistence_degraded(operation: &str, reason: &str) {
    tracing::warn!(
        event = "persistence_degraded",
        operation = %operation,
        reason = %reason,
        "persistence failed, continuing in memory"
    );
}

/// Log entries removed by capacity or age.
pub fn entries_evicted(count: usize, cause: &str) {
    tracing::debug!(
        event = "entries_evicted",
        count = count,
        cause = %cause,
        "entries evicted"
    );
}

/// Log the end of one prediction cycle.
pub fn prediction_cycle_completed(predicted: usize, fetched: usize, failed: usize, skipped: usize) {
    tracing::info!(
        event = "prediction_cycle_completed",
        predicted = predicted,
        fetched = fetched,
        failed = failed,
        skipped = skipped,
        "prediction cycle completed"
    );
}

/// Log a worker that did not stop within the join timeout.
pub fn scheduler_leaked(leaked_workers: u64, join_timeout_ms: u128) {
    tracing::error!(
        event = "scheduler_leaked",
        leaked_workers = leaked_workers,
        join_timeout_ms = join_timeout_ms as u64,
        "predictive worker did not stop in time and was detached"
    );
}

/// Log the end of a vocabulary preload.
pub fn preload_completed(requested: usize, fetched: usize, failed: usize, coverage_after: f64) {
    tracing::info!(
        event = "preload_completed",
        requested = requested,
        fetched = fetched,
        failed = failed,
        coverage_after = coverage_after,
        "vocabulary preload completed"
    );
}
