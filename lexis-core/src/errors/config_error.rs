/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("invalid TOML: {reason}")]
    InvalidToml { reason: String },
}
