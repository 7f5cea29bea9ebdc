//! Integration tests for the embedding/index store.

mod common;

use std::sync::Arc;

use common::{
    CountingIndex, DIM, HashEmbedder, INDEX, MisreportingEmbedder, cosine, numbered_chunks,
};
use tupa_rag::{
    DocumentChunk, InMemoryVectorIndex, IndexStore, MetadataFilter, RagConfig, RagError,
};

async fn store_over(index: Arc<CountingIndex>) -> IndexStore {
    IndexStore::connect(INDEX, &common::test_config(), Arc::new(HashEmbedder::new(DIM)), index)
        .await
        .unwrap()
}

#[tokio::test]
async fn upsert_of_250_chunks_uses_three_batches() {
    let index = Arc::new(CountingIndex::new());
    let store = store_over(index.clone()).await;

    let summary = store.upsert(&numbered_chunks(250)).await.unwrap();

    assert_eq!(summary.upserted, 250);
    assert_eq!(summary.batches, 3);
    assert_eq!(index.batches(), vec![100, 100, 50]);
    assert_eq!(store.stats().await.unwrap().total_vectors, 250);
}

#[tokio::test]
async fn failed_batch_reports_partial_progress() {
    let index = Arc::new(CountingIndex::new().failing_upsert_call(2));
    let store = store_over(index.clone()).await;

    let err = store.upsert(&numbered_chunks(250)).await.unwrap_err();

    match err {
        RagError::UpsertAborted { upserted, total, .. } => {
            assert_eq!(upserted, 100);
            assert_eq!(total, 250);
        }
        other => panic!("expected UpsertAborted, got {other:?}"),
    }
    // The third batch is never attempted; the first stays written.
    assert_eq!(index.batches(), vec![100, 100]);
    assert_eq!(store.stats().await.unwrap().total_vectors, 100);
}

#[tokio::test]
async fn reupserting_same_ids_overwrites() {
    let index = Arc::new(CountingIndex::new());
    let store = store_over(index).await;

    store.upsert(&numbered_chunks(10)).await.unwrap();
    store.upsert(&numbered_chunks(10)).await.unwrap();

    assert_eq!(store.stats().await.unwrap().total_vectors, 10);
}

#[tokio::test]
async fn connect_creates_index_idempotently() {
    let index = Arc::new(CountingIndex::new());
    let first = store_over(index.clone()).await;
    first.upsert(&numbered_chunks(3)).await.unwrap();

    let second = store_over(index.clone()).await;

    assert_eq!(index.create_calls(), 2);
    assert_eq!(second.stats().await.unwrap().total_vectors, 3);
}

#[tokio::test]
async fn connect_rejects_embedder_dimension_mismatch() {
    let result = IndexStore::connect(
        INDEX,
        &RagConfig::default(),
        Arc::new(HashEmbedder::new(DIM)),
        Arc::new(InMemoryVectorIndex::new()),
    )
    .await;

    assert!(matches!(result, Err(RagError::DimensionMismatch { expected: 384, actual: DIM })));
}

#[tokio::test]
async fn wrong_length_embeddings_are_rejected() {
    let store = IndexStore::connect(
        INDEX,
        &common::test_config(),
        Arc::new(MisreportingEmbedder::new(DIM, 8)),
        Arc::new(InMemoryVectorIndex::new()),
    )
    .await
    .unwrap();

    assert!(matches!(
        store.embed("horario").await,
        Err(RagError::DimensionMismatch { expected: DIM, actual: 8 })
    ));
    assert!(matches!(
        store.upsert(&numbered_chunks(2)).await,
        Err(RagError::UpsertAborted { upserted: 0, .. })
    ));
}

#[tokio::test]
async fn empty_and_oversized_text_cannot_be_embedded() {
    let config = common::test_config().to_builder().max_embedding_chars(20).build().unwrap();
    let store = IndexStore::connect(
        INDEX,
        &config,
        Arc::new(HashEmbedder::new(DIM)),
        Arc::new(InMemoryVectorIndex::new()),
    )
    .await
    .unwrap();

    assert!(matches!(store.embed("   ").await, Err(RagError::EmbeddingError { .. })));
    assert!(matches!(
        store.embed(&"x".repeat(21)).await,
        Err(RagError::EmbeddingError { .. })
    ));
}

#[tokio::test]
async fn search_applies_threshold_and_top_k() {
    let store = store_over(Arc::new(CountingIndex::new())).await;
    let chunks = numbered_chunks(20);
    store.upsert(&chunks).await.unwrap();

    let query = store.embed(&chunks[7].text).await.unwrap();

    let everything = store.search(&query, 5, -1.0).await.unwrap();
    assert_eq!(everything.len(), 5);
    assert_eq!(everything[0].id, chunks[7].id);
    assert!((everything[0].score - 1.0).abs() < 1e-5);
    assert!(everything[1].score < 0.9);
    assert!(everything.windows(2).all(|w| w[0].score >= w[1].score));

    let strict = store.search(&query, 5, 0.999).await.unwrap();
    assert_eq!(strict.len(), 1);
    assert_eq!(strict[0].text, chunks[7].text);
    assert_eq!(strict[0].source(), Some("tupa"));
    assert!(!strict[0].metadata.contains_key("text"));
}

#[tokio::test]
async fn distinct_texts_embed_in_distinct_directions() {
    let store = store_over(Arc::new(CountingIndex::new())).await;
    let chunks = numbered_chunks(20);
    let mut embeddings = Vec::new();
    for chunk in &chunks {
        embeddings.push(store.embed(&chunk.text).await.unwrap());
    }

    assert_eq!(store.embed(&chunks[3].text).await.unwrap(), embeddings[3]);
    for (i, a) in embeddings.iter().enumerate() {
        for b in &embeddings[i + 1..] {
            assert!(cosine(a, b).abs() < 0.9, "texts too similar: {}", cosine(a, b));
        }
    }
}

#[tokio::test]
async fn search_on_empty_index_is_empty_not_error() {
    let store = store_over(Arc::new(CountingIndex::new())).await;
    let query = store.embed("licencia").await.unwrap();
    assert!(store.search(&query, 5, 0.7).await.unwrap().is_empty());
}

#[tokio::test]
async fn filtered_search_only_returns_matching_sources() {
    let store = store_over(Arc::new(CountingIndex::new())).await;
    let mut chunks = numbered_chunks(3);
    chunks.push(DocumentChunk::new("anexo", 0, "Procedimiento número 1 del catálogo", "tupa"));
    store.upsert(&chunks).await.unwrap();

    let query = store.embed("Procedimiento número 1 del catálogo").await.unwrap();
    let filter = MetadataFilter::new().where_eq("source", "anexo");
    let results = store.search_filtered(&query, 5, 0.5, Some(&filter)).await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "anexo_chunk_0");
}

#[tokio::test]
async fn delete_all_empties_the_index() {
    let store = store_over(Arc::new(CountingIndex::new())).await;
    store.upsert(&numbered_chunks(5)).await.unwrap();

    store.delete_all().await.unwrap();

    assert_eq!(store.stats().await.unwrap().total_vectors, 0);
}
