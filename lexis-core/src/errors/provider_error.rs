/// Errors reported by an embedding provider. The cache never retries them.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("request timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },

    #[error("HTTP error: status {status}")]
    HttpError { status: u16 },

    #[error("malformed response: {reason}")]
    MalformedResponse { reason: String },

    #[error("provider unavailable: {provider}")]
    Unavailable { provider: String },
}
