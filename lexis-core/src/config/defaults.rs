// Single source of truth for all default values.

// --- Cache ---
pub const DEFAULT_CACHE_DIR: &str = "data/embedding_cache";
pub const DEFAULT_PERSISTENCE_ENABLED: bool = true;
pub const DEFAULT_MAX_SIZE: usize = 10_000;
pub const DEFAULT_TTL_SECONDS: f64 = 604_800.0; // 7 days
pub const DEFAULT_AUTO_SAVE_INTERVAL: usize = 50;
pub const DEFAULT_MODEL: &str = "netease-youdao/bce-embedding-base_v1";

// --- Prediction ---
pub const DEFAULT_PREDICTION_ENABLED: bool = true;
pub const DEFAULT_MAX_PREDICTIONS: usize = 20;
pub const DEFAULT_CYCLE_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_MIN_REQUEST_DELAY_MS: u64 = 200;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_JOIN_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_FAILURE_BACKOFF_SECS: u64 = 300; // 5 minutes
pub const DEFAULT_PRELOAD_BATCH_SIZE: usize = 10;
pub const DEFAULT_PRELOAD_BATCH_PAUSE_MS: u64 = 1_000;

// --- Observability ---
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_JSON_LOGS: bool = false;
