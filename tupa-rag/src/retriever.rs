//! Query-time retrieval: embed the question, search the index.

use std::sync::Arc;

use tracing::{Instrument, debug, info_span};

use crate::config::RagConfig;
use crate::document::RetrievedDocument;
use crate::error::Result;
use crate::store::IndexStore;
use crate::vectorstore::MetadataFilter;

/// Embeds queries and fetches the best-matching fragments.
///
/// No rewriting, expansion or re-ranking happens here: the order returned by
/// the [`IndexStore`] is final. An empty result means nothing cleared the
/// similarity threshold.
#[derive(Clone)]
pub struct Retriever {
    store: Arc<IndexStore>,
    top_k: usize,
    similarity_threshold: f32,
}

impl Retriever {
    /// Create a retriever using `config.top_k` and `config.similarity_threshold`.
    pub fn new(store: Arc<IndexStore>, config: &RagConfig) -> Self {
        Self { store, top_k: config.top_k, similarity_threshold: config.similarity_threshold }
    }

    /// Number of results requested per query.
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Minimum score a result needs to be returned.
    pub fn similarity_threshold(&self) -> f32 {
        self.similarity_threshold
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<IndexStore> {
        &self.store
    }

    /// Retrieve ranked fragments for `query`.
    ///
    /// # Errors
    ///
    /// Returns the embedding error if the query cannot be embedded, or the
    /// backend error if the search fails.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedDocument>> {
        self.retrieve_filtered(query, None).await
    }

    /// [`retrieve`](Self::retrieve) restricted by a metadata filter.
    pub async fn retrieve_filtered(
        &self,
        query: &str,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<RetrievedDocument>> {
        let embedding = self.store.embed(query).instrument(info_span!("rag.embed")).await?;

        let documents = self
            .store
            .search_filtered(&embedding, self.top_k, self.similarity_threshold, filter)
            .instrument(info_span!("rag.search", top_k = self.top_k))
            .await?;

        debug!(result_count = documents.len(), "retrieval complete");
        Ok(documents)
    }
}
