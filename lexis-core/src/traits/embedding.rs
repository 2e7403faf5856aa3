use std::time::Duration;

use crate::errors::ProviderError;

/// Remote embedding API. Implemented by the host; mocked in tests.
pub trait IEmbeddingProvider: Send + Sync {
    /// Fetch the embedding of `text` under `model`, giving up after `timeout`.
    fn fetch_embedding(
        &self,
        text: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Vec<f32>, ProviderError>;

    /// Human-readable provider name.
    fn name(&self) -> &str;
}
