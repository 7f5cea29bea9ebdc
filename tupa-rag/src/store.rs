//! Embedding/index store: text → vectors → backend, and back.
//!
//! [`IndexStore`] pairs an [`EmbeddingProvider`] with a [`VectorIndex`]
//! backend bound to one named index. It owns dimension checks, batching,
//! and threshold filtering; ranking itself is left to the backend.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::{MAX_UPSERT_BATCH, RagConfig};
use crate::document::{DocumentChunk, IndexedVector, RetrievedDocument, TEXT_KEY};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::vectorstore::{IndexMatch, IndexSpec, IndexStats, MetadataFilter, VectorIndex};

/// Outcome of a fully successful upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertSummary {
    /// Vectors written.
    pub upserted: usize,
    /// Backend upsert calls made.
    pub batches: usize,
}

/// Embeds text and reads/writes one named index.
///
/// Construct with [`IndexStore::connect`], which creates the index on first
/// use. The store is shared process-wide behind an `Arc`; searches may run
/// concurrently and writes rely on the backend's own ordering guarantees.
pub struct IndexStore {
    index_name: String,
    dimension: usize,
    batch_size: usize,
    max_embedding_chars: usize,
    embedder: Arc<dyn EmbeddingProvider>,
    backend: Arc<dyn VectorIndex>,
}

impl IndexStore {
    /// Connect to `index_name`, creating it with `config.embedding_dimension`
    /// and cosine similarity if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if the embedder's dimension
    /// differs from the configured one, and [`RagError::VectorStoreError`]
    /// if the backend cannot create or reach the index.
    pub async fn connect(
        index_name: impl Into<String>,
        config: &RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        backend: Arc<dyn VectorIndex>,
    ) -> Result<Self> {
        let index_name = index_name.into();
        let dimension = config.embedding_dimension;
        if embedder.dimensions() != dimension {
            return Err(RagError::DimensionMismatch {
                expected: dimension,
                actual: embedder.dimensions(),
            });
        }

        backend.create_index(&IndexSpec::cosine(&index_name, dimension)).await.map_err(|e| {
            error!(
                index = %index_name,
                backend = backend.backend_name(),
                error = %e,
                "failed to open index"
            );
            e
        })?;
        info!(
            index = %index_name,
            backend = backend.backend_name(),
            dimension,
            "connected to index"
        );

        Ok(Self {
            index_name,
            dimension,
            batch_size: config.upsert_batch_size.clamp(1, MAX_UPSERT_BATCH),
            max_embedding_chars: config.max_embedding_chars,
            embedder,
            backend,
        })
    }

    /// Name of the bound index.
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// Configured vector dimensionality.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// The embedding provider.
    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    fn check_embeddable(&self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(RagError::EmbeddingError {
                provider: self.embedder.model_name().to_string(),
                message: "cannot embed empty text".to_string(),
            });
        }
        let chars = text.chars().count();
        if chars > self.max_embedding_chars {
            return Err(RagError::EmbeddingError {
                provider: self.embedder.model_name().to_string(),
                message: format!(
                    "text of {chars} characters exceeds the {} character limit",
                    self.max_embedding_chars
                ),
            });
        }
        Ok(())
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        Ok(())
    }

    /// Embed a single text.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingError`] for empty or oversized input or a
    /// provider failure, and [`RagError::DimensionMismatch`] if the provider
    /// returns a vector of the wrong length.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.check_embeddable(text)?;
        let embedding = self.embedder.embed(text).await?;
        self.check_dimension(&embedding)?;
        Ok(embedding)
    }

    /// Embed and write `chunks` in batches of at most `upsert_batch_size`.
    ///
    /// Upsert is not atomic across batches: if a batch fails, earlier batches
    /// remain written and the remaining ones are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::UpsertAborted`] carrying the number of vectors
    /// written before the failure.
    pub async fn upsert(&self, chunks: &[DocumentChunk]) -> Result<UpsertSummary> {
        let total = chunks.len();
        let mut summary = UpsertSummary { upserted: 0, batches: 0 };

        for (batch_number, batch) in chunks.chunks(self.batch_size).enumerate() {
            let vectors = match self.embed_batch(batch).await {
                Ok(vectors) => vectors,
                Err(e) => return Err(self.abort(summary.upserted, total, batch_number, e)),
            };
            if let Err(e) = self.backend.upsert(&self.index_name, &vectors).await {
                return Err(self.abort(summary.upserted, total, batch_number, e));
            }
            summary.upserted += vectors.len();
            summary.batches += 1;
            debug!(
                index = %self.index_name,
                batch = batch_number + 1,
                size = vectors.len(),
                "upserted batch"
            );
        }

        info!(
            index = %self.index_name,
            upserted = summary.upserted,
            batches = summary.batches,
            "upsert complete"
        );
        Ok(summary)
    }

    async fn embed_batch(&self, batch: &[DocumentChunk]) -> Result<Vec<IndexedVector>> {
        for chunk in batch {
            self.check_embeddable(&chunk.text)?;
        }
        let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != batch.len() {
            return Err(RagError::EmbeddingError {
                provider: self.embedder.model_name().to_string(),
                message: format!("expected {} embeddings, got {}", batch.len(), embeddings.len()),
            });
        }
        batch
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| {
                self.check_dimension(&embedding)?;
                Ok(IndexedVector::from_chunk(chunk, embedding))
            })
            .collect()
    }

    fn abort(
        &self,
        upserted: usize,
        total: usize,
        batch_number: usize,
        cause: RagError,
    ) -> RagError {
        error!(
            index = %self.index_name,
            batch = batch_number + 1,
            upserted,
            total,
            error = %cause,
            "upsert aborted"
        );
        RagError::UpsertAborted { upserted, total, message: cause.to_string() }
    }

    /// Search for documents similar to `query_vector`.
    ///
    /// Results are ordered by descending score, filtered to
    /// `score >= similarity_threshold`, and truncated to `top_k`. An empty
    /// result is not an error.
    pub async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        similarity_threshold: f32,
    ) -> Result<Vec<RetrievedDocument>> {
        self.search_filtered(query_vector, top_k, similarity_threshold, None).await
    }

    /// [`search`](Self::search) restricted to vectors whose metadata satisfies `filter`.
    pub async fn search_filtered(
        &self,
        query_vector: &[f32],
        top_k: usize,
        similarity_threshold: f32,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<RetrievedDocument>> {
        self.check_dimension(query_vector)?;
        let filter = filter.filter(|f| !f.is_empty());
        let matches = self.backend.query(&self.index_name, query_vector, top_k, filter).await?;
        let candidates = matches.len();

        let mut documents: Vec<RetrievedDocument> = matches
            .into_iter()
            .filter(|m| m.score >= similarity_threshold)
            .filter_map(|m| self.to_document(m))
            .collect();
        documents
            .sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        documents.truncate(top_k);

        debug!(
            index = %self.index_name,
            candidates,
            kept = documents.len(),
            threshold = similarity_threshold,
            "search complete"
        );
        Ok(documents)
    }

    fn to_document(&self, mut m: IndexMatch) -> Option<RetrievedDocument> {
        let text = match m.metadata.remove(TEXT_KEY) {
            Some(Value::String(text)) => text,
            _ => {
                warn!(index = %self.index_name, id = %m.id, "match has no stored text, skipping");
                return None;
            }
        };
        Some(RetrievedDocument { id: m.id, text, score: m.score, metadata: m.metadata })
    }

    /// Read-only index statistics.
    pub async fn stats(&self) -> Result<IndexStats> {
        self.backend.describe_stats(&self.index_name).await
    }

    /// Remove every vector from the index. Irreversible.
    ///
    /// Callers are expected to gate this behind an explicit confirmation.
    pub async fn delete_all(&self) -> Result<()> {
        self.backend.delete_all(&self.index_name).await.map_err(|e| {
            error!(index = %self.index_name, error = %e, "failed to delete vectors");
            e
        })?;
        warn!(index = %self.index_name, "deleted all vectors from index");
        Ok(())
    }
}
