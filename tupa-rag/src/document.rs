//! Data types for chunks, indexed vectors, retrieved documents, and responses.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Free-form metadata attached to indexed vectors and retrieved documents.
pub type Metadata = HashMap<String, Value>;

/// Metadata key under which the original chunk text is denormalized.
pub const TEXT_KEY: &str = "text";

/// Provenance of a [`DocumentChunk`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkMetadata {
    /// Name of the source document (file stem).
    pub source: String,
    /// Sequential index of the chunk within its source, starting at 0.
    pub chunk_id: usize,
    /// Catalog the source belongs to (e.g. `tupa`).
    pub document_type: String,
}

impl ChunkMetadata {
    /// Convert into the generic metadata map stored alongside vectors.
    pub fn to_metadata(&self) -> Metadata {
        HashMap::from([
            ("source".to_string(), Value::String(self.source.clone())),
            ("chunk_id".to_string(), Value::from(self.chunk_id)),
            ("document_type".to_string(), Value::String(self.document_type.clone())),
        ])
    }
}

/// A bounded fragment of source text, the unit of indexing.
///
/// Chunks are created by a [`Chunker`](crate::Chunker) and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentChunk {
    /// Deterministic identifier: `<source>_chunk_<index>`.
    pub id: String,
    /// The text content of the chunk.
    pub text: String,
    /// Where the chunk came from.
    pub metadata: ChunkMetadata,
}

impl DocumentChunk {
    /// Build a chunk, deriving its ID from the source and index.
    pub fn new(
        source: &str,
        chunk_id: usize,
        text: impl Into<String>,
        document_type: &str,
    ) -> Self {
        Self {
            id: chunk_id_for(source, chunk_id),
            text: text.into(),
            metadata: ChunkMetadata {
                source: source.to_string(),
                chunk_id,
                document_type: document_type.to_string(),
            },
        }
    }
}

/// Format the deterministic ID of the `index`-th chunk of `source`.
pub fn chunk_id_for(source: &str, index: usize) -> String {
    format!("{source}_chunk_{index}")
}

/// A vector as written to the index backend.
///
/// The metadata carries the chunk's original text under [`TEXT_KEY`] so that
/// search results can be turned back into readable documents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexedVector {
    /// The chunk ID this vector was derived from.
    pub id: String,
    /// The embedding.
    pub embedding: Vec<f32>,
    /// Chunk metadata plus the denormalized text.
    pub metadata: Metadata,
}

impl IndexedVector {
    /// Pair a chunk with its embedding.
    pub fn from_chunk(chunk: &DocumentChunk, embedding: Vec<f32>) -> Self {
        let mut metadata = chunk.metadata.to_metadata();
        metadata.insert(TEXT_KEY.to_string(), Value::String(chunk.text.clone()));
        Self { id: chunk.id.clone(), embedding, metadata }
    }
}

/// A fragment returned for a query, ranked by similarity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedDocument {
    /// The chunk ID.
    pub id: String,
    /// The chunk text.
    pub text: String,
    /// Cosine similarity to the query (higher is more relevant).
    pub score: f32,
    /// Chunk metadata without the denormalized text.
    pub metadata: Metadata,
}

impl RetrievedDocument {
    /// The `source` metadata value, when present.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(Value::as_str)
    }
}

/// The structured answer to one query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagResponse {
    /// The generated answer or a fixed fallback message.
    pub answer: String,
    /// Top retrieved documents backing the answer, previews only.
    pub sources: Vec<RetrievedDocument>,
    /// Heuristic confidence in `[0, 1]`.
    pub confidence: f32,
    /// Wall-clock seconds from query receipt to response assembly.
    pub processing_time: f64,
}
