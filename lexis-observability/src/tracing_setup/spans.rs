//! Span definitions per operation: snapshot load/save, prediction cycle, preload.

/// Span around a snapshot load.
#[macro_export]
macro_rules! snapshot_load_span {
    ($path:expr) => {
        tracing::info_span!("lexis.snapshot.load", path = %$path)
    };
}

/// Span around a snapshot save.
#[macro_export]
macro_rules! snapshot_save_span {
    ($entries:expr) => {
        tracing::info_span!("lexis.snapshot.save", entries = $entries)
    };
}

/// Span around one prediction cycle.
#[macro_export]
macro_rules! prediction_cycle_span {
    ($cycle:expr) => {
        tracing::debug_span!("lexis.prediction.cycle", cycle = $cycle)
    };
}

/// Span around a vocabulary preload run.
#[macro_export]
macro_rules! preload_span {
    ($words:expr) => {
        tracing::info_span!("lexis.preload", words = $words)
    };
}

/// Span names as constants for programmatic use.
pub mod names {
    pub const SNAPSHOT_LOAD: &str = "lexis.snapshot.load";
    pub const SNAPSHOT_SAVE: &str = "lexis.snapshot.save";
    pub const PREDICTION_CYCLE: &str = "lexis.prediction.cycle";
    pub const PRELOAD: &str = "lexis.preload";
}
