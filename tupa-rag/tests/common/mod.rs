//! Shared test doubles: deterministic embedders, a scripted chat model and
//! an instrumented index wrapper.

#![allow(dead_code)]

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tupa_rag::{
    ChatMessage, DocumentChunk, EmbeddingProvider, GenerationParams, GenerativeModel,
    InMemoryVectorIndex, IndexMatch, IndexSpec, IndexStats, IndexedVector, MetadataFilter,
    RagConfig, RagError, RagSystem, Result, VectorIndex,
};

pub const DIM: usize = 64;
pub const INDEX: &str = "tupa-test";

fn normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    v
}

// ---------------------------------------------------------------------------
// Embedders
// ---------------------------------------------------------------------------

/// Deterministic hash-based embeddings: equal texts get equal vectors.
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

/// Each component hashes `(text, i)` independently and maps it into
/// `[-1, 1]`, so distinct texts point in unrelated directions.
pub fn hash_embedding(text: &str, dimensions: usize) -> Vec<f32> {
    let emb = (0..dimensions)
        .map(|i| {
            let mut hasher = DefaultHasher::new();
            (text, i).hash(&mut hasher);
            let unit = (hasher.finish() >> 11) as f64 / (1u64 << 53) as f64;
            (unit * 2.0 - 1.0) as f32
        })
        .collect();
    normalize(emb)
}

pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(hash_embedding(text, self.dimensions))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "hash-embedder"
    }
}

/// Returns pinned vectors for known texts and hash embeddings otherwise.
pub struct KeyedEmbedder {
    pinned: HashMap<String, Vec<f32>>,
    dimensions: usize,
}

impl KeyedEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { pinned: HashMap::new(), dimensions }
    }

    pub fn pin(mut self, text: &str, vector: Vec<f32>) -> Self {
        assert_eq!(vector.len(), self.dimensions);
        self.pinned.insert(text.to_string(), vector);
        self
    }
}

#[async_trait]
impl EmbeddingProvider for KeyedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.pinned.get(text).cloned().unwrap_or_else(|| hash_embedding(text, self.dimensions)))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Unit vector along `axis`.
pub fn axis(axis: usize, dimensions: usize) -> Vec<f32> {
    let mut v = vec![0.0; dimensions];
    v[axis] = 1.0;
    v
}

/// Unit vector whose cosine similarity with `axis(0, ..)` is `similarity`.
pub fn at_similarity(similarity: f32, dimensions: usize) -> Vec<f32> {
    let mut v = vec![0.0; dimensions];
    v[0] = similarity;
    v[1] = (1.0 - similarity * similarity).sqrt();
    v
}

/// Always fails.
pub struct FailingEmbedder {
    dimensions: usize,
}

impl FailingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RagError::EmbeddingError { provider: "mock".into(), message: "model offline".into() })
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Claims `claimed` dimensions but produces `actual`-length vectors.
pub struct MisreportingEmbedder {
    claimed: usize,
    actual: usize,
}

impl MisreportingEmbedder {
    pub fn new(claimed: usize, actual: usize) -> Self {
        Self { claimed, actual }
    }
}

#[async_trait]
impl EmbeddingProvider for MisreportingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(hash_embedding(text, self.actual))
    }

    fn dimensions(&self) -> usize {
        self.claimed
    }
}

// ---------------------------------------------------------------------------
// Generative model
// ---------------------------------------------------------------------------

/// Replies with a fixed answer or error, optionally after a delay.
pub struct ScriptedModel {
    reply: std::result::Result<String, String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    last_messages: Mutex<Vec<ChatMessage>>,
}

impl ScriptedModel {
    pub fn answering(answer: &str) -> Self {
        Self {
            reply: Ok(answer.to_string()),
            delay: None,
            calls: AtomicUsize::new(0),
            last_messages: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self { reply: Err(message.to_string()), ..Self::answering("") }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_messages(&self) -> Vec<ChatMessage> {
        self.last_messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted-model"
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        _params: GenerationParams,
    ) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_messages.lock().unwrap() = messages.to_vec();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply.clone().map_err(|message| RagError::GenerationError {
            provider: "scripted".into(),
            message,
        })
    }
}

// ---------------------------------------------------------------------------
// Index wrapper
// ---------------------------------------------------------------------------

/// Wraps [`InMemoryVectorIndex`], recording upsert batch sizes and
/// injecting failures on demand.
#[derive(Default)]
pub struct CountingIndex {
    inner: InMemoryVectorIndex,
    batches: Mutex<Vec<usize>>,
    create_calls: AtomicUsize,
    fail_on_upsert_call: Option<usize>,
    fail_queries: bool,
}

impl CountingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `n`-th upsert call (1-based).
    pub fn failing_upsert_call(mut self, n: usize) -> Self {
        self.fail_on_upsert_call = Some(n);
        self
    }

    pub fn failing_queries(mut self) -> Self {
        self.fail_queries = true;
        self
    }

    pub fn batches(&self) -> Vec<usize> {
        self.batches.lock().unwrap().clone()
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    fn injected(message: &str) -> RagError {
        RagError::VectorStoreError { backend: "counting".into(), message: message.into() }
    }
}

#[async_trait]
impl VectorIndex for CountingIndex {
    fn backend_name(&self) -> &str {
        "counting"
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<()> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.create_index(spec).await
    }

    async fn upsert(&self, index: &str, vectors: &[IndexedVector]) -> Result<()> {
        let call = {
            let mut batches = self.batches.lock().unwrap();
            batches.push(vectors.len());
            batches.len()
        };
        if self.fail_on_upsert_call == Some(call) {
            return Err(Self::injected("upsert rejected"));
        }
        self.inner.upsert(index, vectors).await
    }

    async fn query(
        &self,
        index: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<IndexMatch>> {
        if self.fail_queries {
            return Err(Self::injected("index unreachable"));
        }
        self.inner.query(index, vector, top_k, filter).await
    }

    async fn describe_stats(&self, index: &str) -> Result<IndexStats> {
        self.inner.describe_stats(index).await
    }

    async fn delete_all(&self, index: &str) -> Result<()> {
        self.inner.delete_all(index).await
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn test_config() -> RagConfig {
    RagConfig::builder().embedding_dimension(DIM).build().unwrap()
}

/// `n` distinct chunks from source `tupa`.
pub fn numbered_chunks(n: usize) -> Vec<DocumentChunk> {
    (0..n)
        .map(|i| {
            DocumentChunk::new("tupa", i, format!("Procedimiento número {i} del catálogo"), "tupa")
        })
        .collect()
}

pub async fn system_with(
    config: RagConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    model: Arc<dyn GenerativeModel>,
) -> RagSystem {
    RagSystem::builder()
        .config(config)
        .index_name(INDEX)
        .embedding_provider(embedder)
        .vector_index(index)
        .generative_model(model)
        .build()
        .await
        .unwrap()
}
