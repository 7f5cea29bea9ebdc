//! Composition root wiring chunking, indexing, retrieval and answering.
//!
//! # Example
//!
//! ```rust,ignore
//! use tupa_rag::{RagConfig, RagSystem, InMemoryVectorIndex};
//!
//! let system = RagSystem::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(embedder))
//!     .vector_index(Arc::new(InMemoryVectorIndex::new()))
//!     .generative_model(Arc::new(model))
//!     .index_name("tupa-index")
//!     .build()
//!     .await?;
//!
//! system.ingest_text(&raw_text, "tupa_2024").await?;
//! let response = system.query("¿Cuál es el horario de atención?").await.into_response();
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::chunking::{Chunker, ParagraphChunker};
use crate::composer::{AnswerComposer, DegradedReason, QueryOutcome};
use crate::config::RagConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::{ChatMessage, GenerationParams, GenerativeModel};
use crate::normalize::TextNormalizer;
use crate::retriever::Retriever;
use crate::settings::DEFAULT_INDEX_NAME;
use crate::store::IndexStore;
use crate::vectorstore::{IndexStats, MetadataFilter, VectorIndex};

/// Result of ingesting one source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Source name the chunks were recorded under.
    pub source: String,
    /// Chunks produced.
    pub chunks: usize,
    /// Vectors written.
    pub upserted: usize,
}

/// Overall health verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Index and model both responded.
    Healthy,
    /// One of the collaborators failed.
    Unhealthy,
}

/// Result of [`RagSystem::health_check`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Overall verdict.
    pub status: HealthStatus,
    /// Vectors in the index, when reachable.
    pub total_vectors: Option<u64>,
    /// Generative model name.
    pub chat_model: String,
    /// Embedding model name.
    pub embedding_model: String,
    /// Failure description for unhealthy reports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the check ran.
    pub timestamp: DateTime<Utc>,
}

/// The assembled question-answering service.
///
/// Built once by [`RagSystemBuilder`] and shared by reference; it holds no
/// per-query mutable state besides the processed-query counter.
pub struct RagSystem {
    config: RagConfig,
    normalizer: TextNormalizer,
    chunker: Arc<dyn Chunker>,
    store: Arc<IndexStore>,
    retriever: Retriever,
    composer: AnswerComposer,
    processed: AtomicU64,
}

impl RagSystem {
    /// Create a new [`RagSystemBuilder`].
    pub fn builder() -> RagSystemBuilder {
        RagSystemBuilder::default()
    }

    /// The pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// The embedding/index store.
    pub fn store(&self) -> &Arc<IndexStore> {
        &self.store
    }

    /// The retriever.
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// The answer composer.
    pub fn composer(&self) -> &AnswerComposer {
        &self.composer
    }

    /// Number of queries that produced a response, including fallbacks.
    pub fn processed_queries(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Normalize, chunk, and index one extracted document.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidInput`] for an unusable source name and
    /// [`RagError::UpsertAborted`] if indexing stops part-way.
    pub async fn ingest_text(&self, text: &str, source: &str) -> Result<IngestReport> {
        let cleaned = self.normalizer.clean(text);
        let chunks = self.chunker.chunk(&cleaned, source)?;
        if chunks.is_empty() {
            warn!(source, "no indexable text after cleaning");
            return Ok(IngestReport { source: source.to_string(), chunks: 0, upserted: 0 });
        }

        let summary = self.store.upsert(&chunks).await?;
        info!(source, chunk_count = chunks.len(), upserted = summary.upserted, "ingested document");
        Ok(IngestReport {
            source: source.to_string(),
            chunks: chunks.len(),
            upserted: summary.upserted,
        })
    }

    /// Answer `query`. Never fails: every path yields a response.
    pub async fn query(&self, query: &str) -> QueryOutcome {
        self.query_filtered(query, None).await
    }

    /// Answer `query` using only fragments whose metadata satisfies `filter`.
    pub async fn query_filtered(
        &self,
        query: &str,
        filter: Option<&MetadataFilter>,
    ) -> QueryOutcome {
        let received = Instant::now();
        let query_id = Uuid::new_v4();
        let span =
            info_span!("rag.query", query.id = %query_id, query.chars = query.chars().count());

        let outcome = async {
            info!(query = %truncate_for_log(query), "processing query");
            match self.retriever.retrieve_filtered(query, filter).await {
                Ok(retrieved) => self.composer.compose(query, retrieved, received).await,
                Err(e) if e.is_embedding() || matches!(e, RagError::DimensionMismatch { .. }) => {
                    error!(error = %e, "query embedding failed");
                    self.composer.degraded(DegradedReason::Embedding(e.to_string()), received)
                }
                Err(e) => {
                    error!(error = %e, "index search failed");
                    self.composer.degraded(DegradedReason::Search(e.to_string()), received)
                }
            }
        }
        .instrument(span)
        .await;

        self.processed.fetch_add(1, Ordering::Relaxed);
        outcome
    }

    /// Read-only index statistics.
    pub async fn stats(&self) -> Result<IndexStats> {
        self.store.stats().await
    }

    /// Check that the index and the generative model respond.
    pub async fn health_check(&self) -> HealthReport {
        let chat_model = self.composer.model().name().to_string();
        let embedding_model = self.store.embedder().model_name().to_string();

        let probe = async {
            let stats = self.store.stats().await?;
            self.composer
                .model()
                .complete(
                    &[ChatMessage::user("Test")],
                    GenerationParams { max_tokens: 5, temperature: 0.0 },
                )
                .await?;
            Ok::<_, RagError>(stats)
        };

        match probe.await {
            Ok(stats) => HealthReport {
                status: HealthStatus::Healthy,
                total_vectors: Some(stats.total_vectors),
                chat_model,
                embedding_model,
                error: None,
                timestamp: Utc::now(),
            },
            Err(e) => {
                error!(error = %e, "health check failed");
                HealthReport {
                    status: HealthStatus::Unhealthy,
                    total_vectors: None,
                    chat_model,
                    embedding_model,
                    error: Some(e.to_string()),
                    timestamp: Utc::now(),
                }
            }
        }
    }
}

fn truncate_for_log(query: &str) -> String {
    crate::composer::preview(query, 100)
}

/// Builder for constructing a [`RagSystem`].
///
/// The embedding provider, vector index and generative model are required.
/// The chunker defaults to a [`ParagraphChunker`] configured from the
/// [`RagConfig`].
#[derive(Default)]
pub struct RagSystemBuilder {
    config: Option<RagConfig>,
    index_name: Option<String>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_index: Option<Arc<dyn VectorIndex>>,
    generative_model: Option<Arc<dyn GenerativeModel>>,
    chunker: Option<Arc<dyn Chunker>>,
}

impl RagSystemBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the index name (defaults to [`DEFAULT_INDEX_NAME`]).
    pub fn index_name(mut self, name: impl Into<String>) -> Self {
        self.index_name = Some(name.into());
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector index backend.
    pub fn vector_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.vector_index = Some(index);
        self
    }

    /// Set the generative model.
    pub fn generative_model(mut self, model: Arc<dyn GenerativeModel>) -> Self {
        self.generative_model = Some(model);
        self
    }

    /// Replace the default chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Connect to the index and assemble the [`RagSystem`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required component is missing,
    /// or the store's error if the index cannot be opened.
    pub async fn build(self) -> Result<RagSystem> {
        let config = self.config.unwrap_or_default();
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let vector_index = self
            .vector_index
            .ok_or_else(|| RagError::ConfigError("vector_index is required".to_string()))?;
        let generative_model = self
            .generative_model
            .ok_or_else(|| RagError::ConfigError("generative_model is required".to_string()))?;
        let chunker = self.chunker.unwrap_or_else(|| {
            Arc::new(
                ParagraphChunker::new(config.chunk_size, config.chunk_overlap)
                    .with_document_type(config.document_type.clone()),
            )
        });
        let index_name = self.index_name.unwrap_or_else(|| DEFAULT_INDEX_NAME.to_string());

        let store =
            IndexStore::connect(index_name, &config, embedding_provider, vector_index).await?;
        let store = Arc::new(store);
        let retriever = Retriever::new(Arc::clone(&store), &config);
        let composer = AnswerComposer::new(generative_model, &config);

        info!(index = store.index_name(), top_k = config.top_k, "rag system ready");
        Ok(RagSystem {
            normalizer: TextNormalizer::new(config.min_line_chars),
            chunker,
            store,
            retriever,
            composer,
            processed: AtomicU64::new(0),
            config,
        })
    }
}
