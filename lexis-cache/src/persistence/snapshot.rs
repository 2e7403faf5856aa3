//! Binary snapshot codec.
//!
//! ```text
//! header: b"LXEC" | version u8 | entry count u64 LE
//! frame:  payload len u32 LE | blake3(payload) 32 bytes | bincode(SnapshotRecord)
//! ```

use chrono::{DateTime, Utc};
use lexis_core::errors::PersistenceError;
use lexis_core::{CacheEntry, CacheKey, Provenance};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const SNAPSHOT_MAGIC: [u8; 4] = *b"LXEC";
pub const SNAPSHOT_VERSION: u8 = 1;

const HEADER_LEN: usize = 4 + 1 + 8;
const FRAME_PREFIX_LEN: usize = 4 + 32;

/// On-disk form of one cache entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub key: String,
    pub vector: Vec<f32>,
    pub created_at: DateTime<Utc>,
    pub last_access_at: DateTime<Utc>,
    pub access_count: u64,
    pub provenance: Provenance,
    pub prediction_score: f64,
    pub prediction_confirmed: bool,
}

impl From<&CacheEntry> for SnapshotRecord {
    fn from(entry: &CacheEntry) -> Self {
        Self {
            key: entry.key.as_str().to_string(),
            vector: entry.vector.clone(),
            created_at: entry.created_at,
            last_access_at: entry.last_access_at,
            access_count: entry.access_count,
            provenance: entry.provenance,
            prediction_score: entry.prediction_score,
            prediction_confirmed: entry.prediction_confirmed,
        }
    }
}

impl SnapshotRecord {
    /// Convert back, rejecting records that break entry invariants.
    pub fn into_entry(self) -> Option<CacheEntry> {
        if self.key.is_empty() {
            return None;
        }
        let entry = CacheEntry {
            key: CacheKey::new(self.key),
            vector: self.vector,
            created_at: self.created_at,
            last_access_at: self.last_access_at,
            access_count: self.access_count,
            provenance: self.provenance,
            prediction_score: self.prediction_score,
            prediction_confirmed: self.prediction_confirmed,
        };
        entry.is_valid().then_some(entry)
    }
}

/// Entries decoded from a snapshot plus the number of skipped frames.
#[derive(Debug, Default)]
pub struct DecodedSnapshot {
    pub entries: Vec<CacheEntry>,
    pub corrupt: u64,
}

pub fn encode_snapshot(entries: &[CacheEntry]) -> Result<Vec<u8>, PersistenceError> {
    let mut data = Vec::with_capacity(HEADER_LEN + entries.len() * 64);
    data.extend_from_slice(&SNAPSHOT_MAGIC);
    data.push(SNAPSHOT_VERSION);
    data.extend_from_slice(&(entries.len() as u64).to_le_bytes());

    for entry in entries {
        let payload = bincode::serialize(&SnapshotRecord::from(entry)).map_err(|e| {
            PersistenceError::Serialization {
                reason: format!("bincode serialization failed: {e}"),
            }
        })?;
        let len = u32::try_from(payload.len()).map_err(|_| PersistenceError::Serialization {
            reason: format!("record of {} bytes exceeds frame limit", payload.len()),
        })?;
        data.extend_from_slice(&len.to_le_bytes());
        data.extend_from_slice(blake3::hash(&payload).as_bytes());
        data.extend_from_slice(&payload);
    }
    Ok(data)
}

/// Decode a snapshot. Only a bad header is an error; damaged frames are
/// skipped and counted, and a truncated tail counts as one corrupt frame.
pub fn decode_snapshot(data: &[u8]) -> Result<DecodedSnapshot, PersistenceError> {
    if data.len() < HEADER_LEN {
        return Err(PersistenceError::SnapshotCorrupt {
            details: format!("file too small for header ({} bytes)", data.len()),
        });
    }
    if data[0..4] != SNAPSHOT_MAGIC {
        return Err(PersistenceError::SnapshotCorrupt {
            details: "invalid magic bytes".to_string(),
        });
    }
    if data[4] != SNAPSHOT_VERSION {
        return Err(PersistenceError::UnsupportedVersion {
            found: data[4],
            expected: SNAPSHOT_VERSION,
        });
    }
    let mut count_bytes = [0u8; 8];
    count_bytes.copy_from_slice(&data[5..HEADER_LEN]);
    let count = u64::from_le_bytes(count_bytes);

    let mut decoded = DecodedSnapshot::default();
    let mut offset = HEADER_LEN;
    let mut truncated = false;

    for index in 0..count {
        let rest = &data[offset..];
        if rest.len() < FRAME_PREFIX_LEN {
            warn!(index, "snapshot truncated inside frame header");
            decoded.corrupt += 1;
            truncated = true;
            break;
        }
        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&rest[0..4]);
        let len = u32::from_le_bytes(len_bytes) as usize;
        if rest.len() - FRAME_PREFIX_LEN < len {
            warn!(index, len, "snapshot truncated inside frame payload");
            decoded.corrupt += 1;
            truncated = true;
            break;
        }
        let checksum = &rest[4..FRAME_PREFIX_LEN];
        let payload = &rest[FRAME_PREFIX_LEN..FRAME_PREFIX_LEN + len];
        offset += FRAME_PREFIX_LEN + len;

        if blake3::hash(payload).as_bytes()[..] != checksum[..] {
            warn!(index, "snapshot frame checksum mismatch, skipping");
            decoded.corrupt += 1;
            continue;
        }
        let record: SnapshotRecord = match bincode::deserialize(payload) {
            Ok(record) => record,
            Err(e) => {
                warn!(index, error = %e, "snapshot frame undecodable, skipping");
                decoded.corrupt += 1;
                continue;
            }
        };
        match record.into_entry() {
            Some(entry) => decoded.entries.push(entry),
            None => {
                warn!(index, "snapshot frame fails validation, skipping");
                decoded.corrupt += 1;
            }
        }
    }

    if !truncated && offset < data.len() {
        warn!(trailing = data.len() - offset, "ignoring trailing bytes after last frame");
    }
    Ok(decoded)
}
