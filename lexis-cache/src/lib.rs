//! # lexis-cache
//!
//! In-process embedding cache with LRU eviction, absolute TTL expiry and
//! crash-safe disk snapshots.
//!
//! ## Architecture
//!
//! ```text
//! EmbeddingCache (one coarse lock + save lock)
//! ├── key          blake3(normalize(text) + ":" + model)
//! ├── eviction     EntryStore: HashMap + recency/creation BTreeMap indices
//! └── persistence  SnapshotStore: embeddings.snap + metadata.json
//! ```

pub mod engine;
pub mod eviction;
pub mod key;
pub mod persistence;

pub use engine::EmbeddingCache;
pub use eviction::{EntryStore, InsertOutcome, Lookup};
pub use persistence::{LoadedSnapshot, SnapshotMetadata, SnapshotStore};
