//! Key derivation: deterministic fingerprints of (text, model) pairs.

use lexis_core::CacheKey;

/// Canonical form of a text: surrounding whitespace trimmed, lowercased.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// blake3 over `normalize(text) + ":" + model`, hex-encoded.
///
/// Never fails. Empty text yields a valid key; callers reject it upstream.
pub fn derive(text: &str, model: &str) -> CacheKey {
    let mut hasher = blake3::Hasher::new();
    hasher.update(normalize(text).as_bytes());
    hasher.update(b":");
    hasher.update(model.as_bytes());
    CacheKey::new(hasher.finalize().to_hex().to_string())
}
