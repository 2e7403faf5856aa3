/// Input rejected by the cache facade.
///
/// The facade logs these and turns them into no-ops; they surface as values
/// only through the validation helpers.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CacheError {
    #[error("empty text rejected")]
    EmptyText,

    #[error("empty vector rejected for text: {text}")]
    EmptyVector { text: String },
}
