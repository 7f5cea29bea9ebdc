//! Configuration for the RAG pipeline.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Largest batch the index backends accept in one upsert request.
pub const MAX_UPSERT_BATCH: usize = 100;

/// Weights blending retrieval quality and sufficiency into a confidence score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ConfidenceWeights {
    /// Weight of the mean similarity score of retrieved documents.
    pub quality: f32,
    /// Weight of `min(retrieved / top_k, 1)`.
    pub sufficiency: f32,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self { quality: 0.7, sufficiency: 0.3 }
    }
}

/// Configuration parameters for the RAG pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of trailing words of a closed chunk carried into the next one.
    pub chunk_overlap: usize,
    /// Lines shorter than this many characters are dropped during cleaning.
    pub min_line_chars: usize,
    /// `document_type` recorded on every chunk.
    pub document_type: String,
    /// Embedding dimensionality the index is created with.
    pub embedding_dimension: usize,
    /// Longest text, in characters, accepted for embedding.
    pub max_embedding_chars: usize,
    /// Number of top results to request from vector search.
    pub top_k: usize,
    /// Minimum similarity score for results (results below this are dropped).
    pub similarity_threshold: f32,
    /// Vectors written per backend upsert call.
    pub upsert_batch_size: usize,
    /// Number of sources surfaced in a response.
    pub max_sources: usize,
    /// Characters of each source's text kept in a response.
    pub source_preview_chars: usize,
    /// Confidence blending weights.
    pub confidence_weights: ConfidenceWeights,
    /// Token budget for a generated answer.
    pub max_tokens: u32,
    /// Sampling temperature for generation.
    pub temperature: f32,
    /// Optional deadline for the generation call, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_timeout_ms: Option<u64>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            min_line_chars: 10,
            document_type: "tupa".to_string(),
            embedding_dimension: 384,
            max_embedding_chars: 8000,
            top_k: 5,
            similarity_threshold: 0.7,
            upsert_batch_size: MAX_UPSERT_BATCH,
            max_sources: 3,
            source_preview_chars: 200,
            confidence_weights: ConfidenceWeights::default(),
            max_tokens: 1000,
            temperature: 0.7,
            generation_timeout_ms: None,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Start a builder from an existing configuration.
    pub fn to_builder(&self) -> RagConfigBuilder {
        RagConfigBuilder { config: self.clone() }
    }

    /// The generation deadline, if one is configured.
    pub fn generation_timeout(&self) -> Option<Duration> {
        self.generation_timeout_ms.map(Duration::from_millis)
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in words.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the minimum line length kept by text cleaning.
    pub fn min_line_chars(mut self, chars: usize) -> Self {
        self.config.min_line_chars = chars;
        self
    }

    /// Set the `document_type` recorded on chunks.
    pub fn document_type(mut self, document_type: impl Into<String>) -> Self {
        self.config.document_type = document_type.into();
        self
    }

    /// Set the embedding dimensionality.
    pub fn embedding_dimension(mut self, dimension: usize) -> Self {
        self.config.embedding_dimension = dimension;
        self
    }

    /// Set the longest text accepted for embedding.
    pub fn max_embedding_chars(mut self, chars: usize) -> Self {
        self.config.max_embedding_chars = chars;
        self
    }

    /// Set the number of top results to request from vector search.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the minimum similarity threshold for filtering results.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = threshold;
        self
    }

    /// Set the number of vectors per upsert call.
    pub fn upsert_batch_size(mut self, size: usize) -> Self {
        self.config.upsert_batch_size = size;
        self
    }

    /// Set the number of sources surfaced in responses.
    pub fn max_sources(mut self, count: usize) -> Self {
        self.config.max_sources = count;
        self
    }

    /// Set the source preview length in characters.
    pub fn source_preview_chars(mut self, chars: usize) -> Self {
        self.config.source_preview_chars = chars;
        self
    }

    /// Set the confidence blending weights.
    pub fn confidence_weights(mut self, weights: ConfidenceWeights) -> Self {
        self.config.confidence_weights = weights;
        self
    }

    /// Set the answer token budget.
    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.config.max_tokens = tokens;
        self
    }

    /// Set the sampling temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Bound the generation call with a deadline.
    pub fn generation_timeout(mut self, timeout: Duration) -> Self {
        self.config.generation_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_size == 0`
    /// - `top_k == 0`
    /// - `embedding_dimension == 0`
    /// - `similarity_threshold` is outside `[-1, 1]`
    /// - `upsert_batch_size` is outside `1..=100`
    /// - a confidence weight is negative
    pub fn build(self) -> Result<RagConfig> {
        let config = self.config;
        if config.chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
        }
        if config.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if config.embedding_dimension == 0 {
            return Err(RagError::ConfigError(
                "embedding_dimension must be greater than zero".to_string(),
            ));
        }
        if !(-1.0..=1.0).contains(&config.similarity_threshold) {
            return Err(RagError::ConfigError(format!(
                "similarity_threshold ({}) must be within [-1, 1]",
                config.similarity_threshold
            )));
        }
        if !(1..=MAX_UPSERT_BATCH).contains(&config.upsert_batch_size) {
            return Err(RagError::ConfigError(format!(
                "upsert_batch_size ({}) must be between 1 and {MAX_UPSERT_BATCH}",
                config.upsert_batch_size
            )));
        }
        let weights = config.confidence_weights;
        if weights.quality < 0.0 || weights.sufficiency < 0.0 {
            return Err(RagError::ConfigError(
                "confidence weights must not be negative".to_string(),
            ));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_catalog_deployment() {
        let config = RagConfig::default();
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.chunk_overlap, 50);
        assert_eq!(config.top_k, 5);
        assert_eq!(config.embedding_dimension, 384);
        assert!((config.similarity_threshold - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.upsert_batch_size, 100);
        assert_eq!(config.generation_timeout(), None);
    }

    #[test]
    fn builder_rejects_zero_top_k() {
        let err = RagConfig::builder().top_k(0).build().unwrap_err();
        assert!(matches!(err, RagError::ConfigError(_)));
    }

    #[test]
    fn builder_rejects_oversized_batches() {
        assert!(RagConfig::builder().upsert_batch_size(101).build().is_err());
        assert!(RagConfig::builder().upsert_batch_size(0).build().is_err());
        assert!(RagConfig::builder().upsert_batch_size(100).build().is_ok());
    }

    #[test]
    fn builder_rejects_threshold_out_of_range() {
        assert!(RagConfig::builder().similarity_threshold(1.5).build().is_err());
        assert!(RagConfig::builder().similarity_threshold(-1.0).build().is_ok());
    }

    #[test]
    fn builder_rejects_negative_weights() {
        let weights = ConfidenceWeights { quality: -0.1, sufficiency: 0.3 };
        assert!(RagConfig::builder().confidence_weights(weights).build().is_err());
    }

    #[test]
    fn generation_timeout_round_trips_through_millis() {
        let config =
            RagConfig::builder().generation_timeout(Duration::from_secs(2)).build().unwrap();
        assert_eq!(config.generation_timeout(), Some(Duration::from_secs(2)));
    }
}
