//! Error types for the `tupa-rag` crate.

use thiserror::Error;

/// Errors that can occur in RAG operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// The caller supplied input the operation cannot work with.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A vector's length does not match the index dimension.
    #[error("Dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch {
        /// The configured index dimension.
        expected: usize,
        /// The length of the offending vector.
        actual: usize,
    },

    /// An error occurred in the vector index backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The vector index backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A batched upsert stopped part-way through.
    ///
    /// Batches written before the failure stay in the index; `upserted`
    /// counts those vectors.
    #[error("Upsert aborted after {upserted} of {total} vectors: {message}")]
    UpsertAborted {
        /// Number of vectors written before the failing batch.
        upserted: usize,
        /// Number of vectors the caller asked to write.
        total: usize,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred while calling the generative model.
    #[error("Generation error ({provider}): {message}")]
    GenerationError {
        /// The model provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl RagError {
    /// Returns `true` for failures raised while producing an embedding.
    pub fn is_embedding(&self) -> bool {
        matches!(self, RagError::EmbeddingError { .. } | RagError::InvalidInput(_))
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
