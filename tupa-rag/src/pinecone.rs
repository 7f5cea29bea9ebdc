//! Pinecone vector index backend over the REST API.
//!
//! Provides [`PineconeIndex`] which implements [`VectorIndex`] against the
//! Pinecone control plane (index management) and each index's data plane
//! host (vectors). Requires the `pinecone` feature.
//!
//! # Example
//!
//! ```rust,ignore
//! use tupa_rag::pinecone::PineconeIndex;
//!
//! let index = PineconeIndex::new("pc-...", "us-west1-gcp")?;
//! index.create_index(&IndexSpec::cosine("tupa-index", 384)).await?;
//! let matches = index.query("tupa-index", &query_embedding, 5, None).await?;
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::document::{IndexedVector, Metadata};
use crate::error::{RagError, Result};
use crate::vectorstore::{IndexMatch, IndexSpec, IndexStats, MetadataFilter, VectorIndex};

const CONTROL_PLANE_URL: &str = "https://api.pinecone.io";
const API_VERSION: &str = "2024-07";
const DEFAULT_POD_TYPE: &str = "p1.x1";
const BACKEND: &str = "pinecone";

/// A [`VectorIndex`] backed by a Pinecone pod-based project.
///
/// Index data-plane hosts are resolved through the control plane once and
/// cached per index name.
pub struct PineconeIndex {
    client: reqwest::Client,
    api_key: String,
    environment: String,
    control_plane_url: String,
    pod_type: String,
    hosts: RwLock<HashMap<String, String>>,
}

impl PineconeIndex {
    /// Create a client for the project owning `api_key`, creating indexes
    /// in `environment`.
    pub fn new(api_key: impl Into<String>, environment: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        let environment = environment.into();
        if api_key.trim().is_empty() {
            return Err(Self::err("API key must not be empty"));
        }
        if environment.trim().is_empty() {
            return Err(Self::err("environment must not be empty"));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            environment,
            control_plane_url: CONTROL_PLANE_URL.to_string(),
            pod_type: DEFAULT_POD_TYPE.to_string(),
            hosts: RwLock::new(HashMap::new()),
        })
    }

    /// Override the control plane URL.
    pub fn with_control_plane_url(mut self, url: impl Into<String>) -> Self {
        self.control_plane_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Pod type used when creating indexes.
    pub fn with_pod_type(mut self, pod_type: impl Into<String>) -> Self {
        self.pod_type = pod_type.into();
        self
    }

    fn err(message: impl Into<String>) -> RagError {
        RagError::VectorStoreError { backend: BACKEND.to_string(), message: message.into() }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<T> {
        let mut request = self
            .client
            .request(method, url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            error!(backend = BACKEND, error = %e, "request failed");
            Self::err(format!("request failed: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(backend = BACKEND, %status, "API error");
            return Err(Self::err(format!("API returned {status}: {}", error_detail(&body))));
        }

        response.json().await.map_err(|e| Self::err(format!("failed to parse response: {e}")))
    }

    async fn list_index_names(&self) -> Result<Vec<String>> {
        let url = format!("{}/indexes", self.control_plane_url);
        let list: IndexList = self.send(Method::GET, &url, None).await?;
        Ok(list.indexes.into_iter().map(|i| i.name).collect())
    }

    /// Resolve (and cache) the data-plane host for `index`.
    async fn host(&self, index: &str) -> Result<String> {
        if let Some(host) = self.hosts.read().await.get(index) {
            return Ok(host.clone());
        }

        let url = format!("{}/indexes/{index}", self.control_plane_url);
        let description: IndexDescription = self.send(Method::GET, &url, None).await?;
        let host = data_plane_url(&description.host);
        debug!(backend = BACKEND, index, host = %host, "resolved index host");
        self.hosts.write().await.insert(index.to_string(), host.clone());
        Ok(host)
    }

    async fn data_plane<T: DeserializeOwned>(
        &self,
        index: &str,
        path: &str,
        body: &Value,
    ) -> Result<T> {
        let host = self.host(index).await?;
        self.send(Method::POST, &format!("{host}{path}"), Some(body)).await
    }
}

// ── Pinecone API request/response types ────────────────────────────

#[derive(Deserialize)]
struct IndexList {
    #[serde(default)]
    indexes: Vec<IndexDescription>,
}

#[derive(Deserialize)]
struct IndexDescription {
    name: String,
    #[serde(default)]
    host: String,
}

#[derive(Serialize)]
struct PineconeVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: &'a Metadata,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<PineconeMatch>,
}

#[derive(Deserialize)]
struct PineconeMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<Metadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    #[serde(default)]
    dimension: usize,
    #[serde(default)]
    index_fullness: f32,
    #[serde(default)]
    total_vector_count: u64,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

fn error_detail(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string())
}

fn data_plane_url(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.trim_end_matches('/').to_string()
    } else {
        format!("https://{host}")
    }
}

fn create_index_body(spec: &IndexSpec, environment: &str, pod_type: &str) -> Value {
    json!({
        "name": spec.name,
        "dimension": spec.dimension,
        "metric": spec.metric.as_str(),
        "spec": {
            "pod": {
                "environment": environment,
                "pod_type": pod_type,
                "pods": 1,
                "metadata_config": { "indexed": spec.indexed_fields },
            }
        }
    })
}

fn upsert_body(vectors: &[IndexedVector]) -> Value {
    let vectors: Vec<PineconeVector<'_>> = vectors
        .iter()
        .map(|v| PineconeVector { id: &v.id, values: &v.embedding, metadata: &v.metadata })
        .collect();
    json!({ "vectors": vectors })
}

/// Translate a filter into Pinecone's `{"field": {"$eq": value}}` form.
fn filter_body(filter: &MetadataFilter) -> Value {
    let clauses: Map<String, Value> =
        filter.constraints().map(|(key, value)| (key.clone(), json!({ "$eq": value }))).collect();
    Value::Object(clauses)
}

fn query_body(vector: &[f32], top_k: usize, filter: Option<&MetadataFilter>) -> Value {
    let mut body = json!({
        "vector": vector,
        "topK": top_k,
        "includeMetadata": true,
        "includeValues": false,
    });
    if let Some(filter) = filter.filter(|f| !f.is_empty()) {
        body["filter"] = filter_body(filter);
    }
    body
}

fn into_matches(response: QueryResponse) -> Vec<IndexMatch> {
    response
        .matches
        .into_iter()
        .map(|m| IndexMatch { id: m.id, score: m.score, metadata: m.metadata.unwrap_or_default() })
        .collect()
}

// ── VectorIndex implementation ─────────────────────────────────────

#[async_trait]
impl VectorIndex for PineconeIndex {
    fn backend_name(&self) -> &str {
        BACKEND
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<()> {
        if self.list_index_names().await?.iter().any(|name| name == &spec.name) {
            debug!(index = %spec.name, "pinecone index already exists, skipping creation");
            return Ok(());
        }

        let url = format!("{}/indexes", self.control_plane_url);
        let body = create_index_body(spec, &self.environment, &self.pod_type);
        let conflict = format!("API returned {}", StatusCode::CONFLICT.as_u16());
        match self.send::<Value>(Method::POST, &url, Some(&body)).await {
            Ok(_) => {
                info!(
                    index = %spec.name,
                    dimension = spec.dimension,
                    metric = %spec.metric,
                    "created pinecone index"
                );
                Ok(())
            }
            // Lost a creation race with another process.
            Err(RagError::VectorStoreError { message, .. }) if message.starts_with(&conflict) => {
                debug!(index = %spec.name, "pinecone index created concurrently");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn upsert(&self, index: &str, vectors: &[IndexedVector]) -> Result<()> {
        if vectors.is_empty() {
            return Ok(());
        }
        let response: UpsertResponse =
            self.data_plane(index, "/vectors/upsert", &upsert_body(vectors)).await?;
        debug!(index, count = response.upserted_count, "upserted vectors to pinecone");
        Ok(())
    }

    async fn query(
        &self,
        index: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<IndexMatch>> {
        let response: QueryResponse =
            self.data_plane(index, "/query", &query_body(vector, top_k, filter)).await?;
        Ok(into_matches(response))
    }

    async fn describe_stats(&self, index: &str) -> Result<IndexStats> {
        let stats: StatsResponse =
            self.data_plane(index, "/describe_index_stats", &json!({})).await?;
        Ok(IndexStats {
            total_vectors: stats.total_vector_count,
            dimension: stats.dimension,
            fullness: stats.index_fullness,
        })
    }

    async fn delete_all(&self, index: &str) -> Result<()> {
        let _: Value =
            self.data_plane(index, "/vectors/delete", &json!({ "deleteAll": true })).await?;
        Ok(())
    }
}
