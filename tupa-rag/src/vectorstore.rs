//! Vector index backend trait and the types it exchanges.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::{IndexedVector, Metadata};
use crate::error::Result;

/// Similarity metric an index is created with.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Cosine similarity in `[-1, 1]`.
    #[default]
    Cosine,
}

impl DistanceMetric {
    /// The metric's wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters for creating an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    /// Index name.
    pub name: String,
    /// Vector dimensionality.
    pub dimension: usize,
    /// Similarity metric.
    pub metric: DistanceMetric,
    /// Metadata fields the backend should index for filtering.
    pub indexed_fields: Vec<String>,
}

impl IndexSpec {
    /// A cosine index indexing the chunk provenance fields.
    pub fn cosine(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            dimension,
            metric: DistanceMetric::Cosine,
            indexed_fields: vec!["document_type".into(), "section".into(), "source".into()],
        }
    }
}

/// A conjunction of metadata equality constraints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataFilter {
    equals: BTreeMap<String, Value>,
}

impl MetadataFilter {
    /// An empty filter matching everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `key` to equal `value`.
    pub fn where_eq(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.equals.insert(key.into(), value.into());
        self
    }

    /// Whether the filter has no constraints.
    pub fn is_empty(&self) -> bool {
        self.equals.is_empty()
    }

    /// Iterate over `(key, value)` constraints in key order.
    pub fn constraints(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.equals.iter()
    }

    /// Whether `metadata` satisfies every constraint.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.equals.iter().all(|(key, value)| metadata.get(key) == Some(value))
    }
}

/// A raw match returned by a backend query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMatch {
    /// Vector ID.
    pub id: String,
    /// Similarity score as reported by the backend.
    pub score: f32,
    /// Stored metadata, including the denormalized text.
    pub metadata: Metadata,
}

/// Read-only index statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of vectors stored.
    pub total_vectors: u64,
    /// Index dimensionality.
    pub dimension: usize,
    /// Backend-reported fullness in `[0, 1]`.
    pub fullness: f32,
}

/// A vector index backend.
///
/// Implementations own the network or memory representation of named
/// indexes. Ranking authority belongs to the backend: `query` returns matches
/// in the backend's similarity order.
///
/// # Example
///
/// ```rust,ignore
/// use tupa_rag::{IndexSpec, InMemoryVectorIndex, VectorIndex};
///
/// let index = InMemoryVectorIndex::new();
/// index.create_index(&IndexSpec::cosine("tupa-index", 384)).await?;
/// index.upsert("tupa-index", &vectors).await?;
/// let matches = index.query("tupa-index", &query_embedding, 5, None).await?;
/// ```
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Short backend name used in errors and logs.
    fn backend_name(&self) -> &str;

    /// Create the index if it does not exist. An existing index is left untouched.
    async fn create_index(&self, spec: &IndexSpec) -> Result<()>;

    /// Insert or overwrite vectors keyed by ID.
    async fn upsert(&self, index: &str, vectors: &[IndexedVector]) -> Result<()>;

    /// Return up to `top_k` matches ordered by descending similarity.
    async fn query(
        &self,
        index: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<IndexMatch>>;

    /// Describe the index.
    async fn describe_stats(&self, index: &str) -> Result<IndexStats>;

    /// Remove every vector from the index.
    async fn delete_all(&self, index: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_requires_every_constraint() {
        let filter = MetadataFilter::new().where_eq("source", "tupa").where_eq("chunk_id", 2);
        let mut metadata = Metadata::new();
        metadata.insert("source".into(), Value::from("tupa"));
        assert!(!filter.matches(&metadata));
        metadata.insert("chunk_id".into(), Value::from(2));
        assert!(filter.matches(&metadata));
    }

    #[test]
    fn empty_filter_matches_anything() {
        assert!(MetadataFilter::new().matches(&Metadata::new()));
    }

    #[test]
    fn metric_wire_names() {
        assert_eq!(DistanceMetric::Cosine.to_string(), "cosine");
        assert_eq!(serde_json::to_value(DistanceMetric::Cosine).unwrap(), "cosine");
    }
}
