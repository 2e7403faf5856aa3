mod embedding;
mod usage;

pub use embedding::IEmbeddingProvider;
pub use usage::{IAccessObserver, IUsageRecorder};
