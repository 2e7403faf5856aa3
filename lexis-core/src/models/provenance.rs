use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a cache entry came from. Informational only; eviction ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Fetched because a caller asked for it.
    User,
    /// Speculatively fetched by the prediction scheduler.
    Predictive,
    /// Bulk-loaded during vocabulary warm-up.
    Preload,
}

impl Provenance {
    pub const ALL: [Provenance; 3] = [Provenance::User, Provenance::Predictive, Provenance::Preload];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::User => "user",
            Provenance::Predictive => "predictive",
            Provenance::Preload => "preload",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
