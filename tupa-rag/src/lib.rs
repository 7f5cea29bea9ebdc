//! Retrieval-augmented question answering over the TUPA procedures catalog.
//!
//! This crate provides:
//! - Text cleanup and paragraph-aware chunking with word overlap
//! - An embedding/index store over pluggable vector index backends
//! - Threshold-filtered retrieval
//! - Grounded answer composition with confidence scoring and fallbacks
//! - Settings resolution from a secrets file and the environment
//!
//! Backends are feature-gated: `openai` (embeddings and chat completions),
//! `pinecone` (vector index). [`InMemoryVectorIndex`] is always available.

pub mod chunking;
pub mod composer;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod inmemory;
pub mod normalize;
pub mod prompt;
pub mod retriever;
pub mod settings;
pub mod store;
pub mod system;
pub mod vectorstore;

#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "pinecone")]
pub mod pinecone;

pub use chunking::{Chunker, ParagraphChunker};
pub use composer::{AnswerComposer, DegradedReason, QueryOutcome, confidence_score};
pub use config::{ConfidenceWeights, RagConfig, RagConfigBuilder};
pub use document::{
    ChunkMetadata, DocumentChunk, IndexedVector, Metadata, RagResponse, RetrievedDocument,
};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use generation::{ChatMessage, GenerationParams, GenerativeModel, Role};
pub use inmemory::InMemoryVectorIndex;
pub use normalize::TextNormalizer;
pub use retriever::Retriever;
pub use settings::{EnvSource, SecretSource, SecretsFile, Settings, SettingsStatus, StaticSource};
pub use store::{IndexStore, UpsertSummary};
pub use system::{HealthReport, HealthStatus, IngestReport, RagSystem, RagSystemBuilder};
pub use vectorstore::{
    DistanceMetric, IndexMatch, IndexSpec, IndexStats, MetadataFilter, VectorIndex,
};
