//! Error types for the `nlq-rag` crate.

use thiserror::Error;

/// Errors that can occur while building or querying the retrieval engine.
#[derive(Debug, Error)]
pub enum NlqError {
    /// An embedding did not have the dimension of the index it was used with.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The dimension of the index (or of the first vector of a build).
        expected: usize,
        /// The offending vector's length.
        actual: usize,
    },

    /// An index build was attempted with no vectors.
    #[error("Cannot build an index from an empty corpus")]
    EmptyCorpus,

    /// An embedding had a NaN or infinite component.
    #[error("Non-finite embedding component in {0}")]
    NonFiniteVector(String),

    /// A search was attempted before any index was built.
    #[error("Index not built. Call build_index first.")]
    IndexNotBuilt,

    /// The data source returned no records for the configured collection.
    #[error("No data found in collection '{collection}'")]
    NoDataFound {
        /// The collection that was fetched.
        collection: String,
    },

    /// A data-source adapter failed to connect or fetch.
    #[error("Adapter error ({adapter}): {message}")]
    AdapterError {
        /// The adapter that produced the error.
        adapter: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The answer synthesizer failed to produce an answer.
    #[error("Synthesizer error ({synthesizer}): {message}")]
    SynthesizerError {
        /// The synthesizer that produced the error.
        synthesizer: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl NlqError {
    /// Shorthand for an [`NlqError::AdapterError`].
    pub fn adapter(adapter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AdapterError { adapter: adapter.into(), message: message.into() }
    }
}

/// A convenience result type for retrieval operations.
pub type Result<T> = std::result::Result<T, NlqError>;
