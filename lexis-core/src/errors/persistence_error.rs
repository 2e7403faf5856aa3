/// Snapshot and metadata persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("I/O error at {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("snapshot corrupt: {details}")]
    SnapshotCorrupt { details: String },

    #[error("unsupported snapshot version: found {found}, expected {expected}")]
    UnsupportedVersion { found: u8, expected: u8 },

    #[error("serialization error: {reason}")]
    Serialization { reason: String },
}

impl PersistenceError {
    /// Wrap an `std::io::Error` together with the path it concerns.
    pub fn io(path: &std::path::Path, err: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }
}
