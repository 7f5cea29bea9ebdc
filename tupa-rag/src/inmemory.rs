//! In-memory vector index using cosine similarity.
//!
//! This module provides [`InMemoryVectorIndex`], a zero-dependency backend
//! backed by a `HashMap` protected by a `tokio::sync::RwLock`. It is suitable
//! for development, testing, and small catalogs.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::IndexedVector;
use crate::error::{RagError, Result};
use crate::vectorstore::{IndexMatch, IndexSpec, IndexStats, MetadataFilter, VectorIndex};

const BACKEND: &str = "InMemory";

#[derive(Debug, Default)]
struct Index {
    dimension: usize,
    vectors: HashMap<String, IndexedVector>,
}

/// An in-memory vector index using cosine similarity for search.
///
/// Indexes are stored as nested `HashMap`s: index name → vector ID → vector.
/// All operations are async-safe via `tokio::sync::RwLock`.
///
/// # Example
///
/// ```rust,ignore
/// use tupa_rag::{IndexSpec, InMemoryVectorIndex, VectorIndex};
///
/// let index = InMemoryVectorIndex::new();
/// index.create_index(&IndexSpec::cosine("tupa-index", 384)).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorIndex {
    indexes: RwLock<HashMap<String, Index>>,
}

impl InMemoryVectorIndex {
    /// Create a new empty in-memory index backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn missing(index: &str) -> RagError {
        RagError::VectorStoreError {
            backend: BACKEND.to_string(),
            message: format!("index '{index}' does not exist"),
        }
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    fn backend_name(&self) -> &str {
        BACKEND
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<()> {
        let mut indexes = self.indexes.write().await;
        indexes
            .entry(spec.name.clone())
            .or_insert_with(|| Index { dimension: spec.dimension, vectors: HashMap::new() });
        Ok(())
    }

    async fn upsert(&self, index: &str, vectors: &[IndexedVector]) -> Result<()> {
        let mut indexes = self.indexes.write().await;
        let store = indexes.get_mut(index).ok_or_else(|| Self::missing(index))?;
        if let Some(bad) = vectors.iter().find(|v| v.embedding.len() != store.dimension) {
            return Err(RagError::DimensionMismatch {
                expected: store.dimension,
                actual: bad.embedding.len(),
            });
        }
        for vector in vectors {
            store.vectors.insert(vector.id.clone(), vector.clone());
        }
        Ok(())
    }

    async fn query(
        &self,
        index: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<IndexMatch>> {
        let indexes = self.indexes.read().await;
        let store = indexes.get(index).ok_or_else(|| Self::missing(index))?;
        if vector.len() != store.dimension {
            return Err(RagError::DimensionMismatch {
                expected: store.dimension,
                actual: vector.len(),
            });
        }

        let mut scored: Vec<IndexMatch> = store
            .vectors
            .values()
            .filter(|v| filter.is_none_or(|f| f.matches(&v.metadata)))
            .map(|v| IndexMatch {
                id: v.id.clone(),
                score: cosine_similarity(&v.embedding, vector),
                metadata: v.metadata.clone(),
            })
            .collect();

        // Ties break on ID so repeated queries return identical orderings.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn describe_stats(&self, index: &str) -> Result<IndexStats> {
        let indexes = self.indexes.read().await;
        let store = indexes.get(index).ok_or_else(|| Self::missing(index))?;
        Ok(IndexStats {
            total_vectors: store.vectors.len() as u64,
            dimension: store.dimension,
            fullness: 0.0,
        })
    }

    async fn delete_all(&self, index: &str) -> Result<()> {
        let mut indexes = self.indexes.write().await;
        let store = indexes.get_mut(index).ok_or_else(|| Self::missing(index))?;
        store.vectors.clear();
        Ok(())
    }
}
