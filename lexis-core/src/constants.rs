/// Lexis engine version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version tag written into the snapshot metadata file.
pub const METADATA_FORMAT_VERSION: &str = "3.0";

/// Binary snapshot file name inside the cache directory.
pub const SNAPSHOT_FILENAME: &str = "embeddings.snap";

/// Metadata file name inside the cache directory.
pub const METADATA_FILENAME: &str = "metadata.json";

/// Usage-pattern file name inside the cache directory.
pub const USAGE_PATTERNS_FILENAME: &str = "usage_patterns.json";

/// Smoothing rate for the usage-pattern moving averages.
pub const USAGE_EMA_ALPHA: f64 = 0.1;

/// Neutral starting value for `success_rate` and `difficulty_score`.
pub const USAGE_NEUTRAL_PRIOR: f64 = 0.5;

/// Score boost applied the first time a user query hits a predictive entry.
pub const PREDICTION_HIT_BOOST: f64 = 0.1;

/// Seconds in a day; the recency window of the prediction score.
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Frequency at which the prediction frequency factor saturates.
pub const FREQUENCY_SATURATION: f64 = 10.0;

/// Characters of a text kept in log lines.
pub const LOG_TEXT_PREVIEW_CHARS: usize = 30;
