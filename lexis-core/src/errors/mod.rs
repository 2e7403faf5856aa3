mod cache_error;
mod config_error;
mod persistence_error;
mod provider_error;

pub use cache_error::CacheError;
pub use config_error::ConfigError;
pub use persistence_error::PersistenceError;
pub use provider_error::ProviderError;

/// Umbrella error for the Lexis workspace.
#[derive(Debug, thiserror::Error)]
pub enum LexisError {
    #[error("cache error: {0}")]
    CacheError(#[from] CacheError),

    #[error("persistence error: {0}")]
    PersistenceError(#[from] PersistenceError),

    #[error("provider error: {0}")]
    ProviderError(#[from] ProviderError),

    #[error("configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type LexisResult<T> = Result<T, LexisError>;
