//! # lexis-prediction
//!
//! Usage tracking and speculative pre-fetch for the Lexis embedding cache.
//!
//! ## Architecture
//!
//! ```text
//! UsagePatternTracker ──(patterns)──► scoring::rank ──► PredictiveQueue
//!         ▲                                                   │
//!   IAccessObserver                                   PredictiveScheduler
//!         │                                      (worker `lexis-predictive`)
//!   EmbeddingCache ◄──────────── put_predicted ───────────────┘
//! ```
//!
//! `preload` warms the cache from a vocabulary list with batch throttling.

pub mod preload;
pub mod queue;
pub mod scheduler;
pub mod scoring;
pub mod throttle;
pub mod tracker;

pub use preload::{preload_vocabulary, PreloadOptions, PreloadReport, VocabularyEntry};
pub use queue::PredictiveQueue;
pub use scheduler::{CycleReport, PredictiveScheduler, SchedulerStats, StopOutcome};
pub use scoring::{PredictionCandidate, ScoreBreakdown};
pub use throttle::{RequestPacer, Throttle, ThrottleConfig};
pub use tracker::UsagePatternTracker;
