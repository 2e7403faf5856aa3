//! Disk persistence for the embedding cache.
//!
//! Two artifacts live in the cache directory:
//! - `embeddings.snap`: binary snapshot of the entries, one checksummed
//!   frame per entry so a damaged record costs only itself.
//! - `metadata.json`: cumulative statistics and a configuration echo.
//!
//! Both are written to `<file>.tmp`, fsynced, then renamed over the target.

mod metadata;
mod snapshot;

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use lexis_core::constants::{METADATA_FILENAME, SNAPSHOT_FILENAME};
use lexis_core::errors::PersistenceError;
use lexis_core::CacheEntry;
use tracing::{debug, warn};

pub use metadata::{
    MetadataConfigEcho, PerformanceTotals, PredictionTotals, SnapshotMetadata, SnapshotTotals,
};
pub use snapshot::{decode_snapshot, encode_snapshot, DecodedSnapshot, SnapshotRecord};
pub use snapshot::{SNAPSHOT_MAGIC, SNAPSHOT_VERSION};

/// Entries and metadata read back from disk.
#[derive(Debug, Default)]
pub struct LoadedSnapshot {
    pub entries: Vec<CacheEntry>,
    /// Frames skipped because their TTL had run out.
    pub expired: u64,
    /// Frames skipped because they failed checksum, decoding, or validation.
    pub corrupt: u64,
    pub metadata: Option<SnapshotMetadata>,
}

/// Outcome of a successful save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveReport {
    pub entries: usize,
    pub bytes: u64,
}

/// Reads and writes the snapshot and metadata files of one cache directory.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILENAME)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILENAME)
    }

    /// Write the snapshot, then the metadata. A failure leaves the previous
    /// files untouched.
    pub fn save(
        &self,
        entries: &[CacheEntry],
        metadata: &SnapshotMetadata,
    ) -> Result<SaveReport, PersistenceError> {
        fs::create_dir_all(&self.dir).map_err(|e| PersistenceError::io(&self.dir, e))?;

        let bytes = encode_snapshot(entries)?;
        write_atomic(&self.snapshot_path(), &bytes)?;

        let json = serde_json::to_vec_pretty(metadata).map_err(|e| {
            PersistenceError::Serialization {
                reason: e.to_string(),
            }
        })?;
        write_atomic(&self.metadata_path(), &json)?;

        Ok(SaveReport {
            entries: entries.len(),
            bytes: bytes.len() as u64,
        })
    }

    /// Load the snapshot, dropping entries that are expired at `now`.
    ///
    /// A missing snapshot is a cold start and yields an empty result. A bad
    /// header fails the whole load. Metadata problems are logged and ignored.
    pub fn load(&self, ttl_secs: f64, now: DateTime<Utc>) -> Result<LoadedSnapshot, PersistenceError> {
        let metadata = self.load_metadata();

        let path = self.snapshot_path();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no snapshot on disk, cold start");
                return Ok(LoadedSnapshot {
                    metadata,
                    ..Default::default()
                });
            }
            Err(e) => return Err(PersistenceError::io(&path, e)),
        };

        let decoded = decode_snapshot(&bytes)?;
        let mut loaded = LoadedSnapshot {
            corrupt: decoded.corrupt,
            metadata,
            ..Default::default()
        };
        for entry in decoded.entries {
            if entry.is_expired(ttl_secs, now) {
                loaded.expired += 1;
            } else {
                loaded.entries.push(entry);
            }
        }
        Ok(loaded)
    }

    /// Read `metadata.json`. `None` when absent or unreadable.
    pub fn load_metadata(&self) -> Option<SnapshotMetadata> {
        let path = self.metadata_path();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read cache metadata");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring malformed cache metadata");
                None
            }
        }
    }
}

/// `<file>.tmp` next to the target.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write to `<file>.tmp`, fsync, rename over `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PersistenceError> {
    let tmp = temp_path(path);
    let result = (|| {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();
    result.map_err(|e| {
        let _ = fs::remove_file(&tmp);
        PersistenceError::io(path, e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_path_appends_suffix() {
        let tmp = temp_path(Path::new("/data/cache/embeddings.snap"));
        assert_eq!(tmp, PathBuf::from("/data/cache/embeddings.snap.tmp"));
    }

    #[test]
    fn write_atomic_replaces_target_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.bin");
        write_atomic(&path, b"one").unwrap();
        write_atomic(&path, b"two").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"two");
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn write_atomic_into_missing_dir_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("file.bin");
        let err = write_atomic(&path, b"x").unwrap_err();
        assert!(matches!(err, PersistenceError::Io { .. }));
    }
}
