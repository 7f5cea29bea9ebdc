//! Deployment settings: credentials, model names and tuning overrides.
//!
//! Values are looked up by lowercase key (`openai_api_key`) in a secrets
//! store first, then in the process environment under the uppercase name
//! (`OPENAI_API_KEY`), then fall back to a documented default.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::{ConfidenceWeights, RagConfig};
use crate::error::{RagError, Result};

/// Default index name.
pub const DEFAULT_INDEX_NAME: &str = "tupa-index";
/// Default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
/// Default chat model.
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";

/// A key/value store settings are read from.
pub trait SecretSource: Send + Sync {
    /// Look up `key` (lowercase, snake_case).
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads `KEY` from the process environment for key `key`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSource;

impl SecretSource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key.to_ascii_uppercase()).ok()
    }
}

/// A fixed in-memory map.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    values: HashMap<String, String>,
}

impl StaticSource {
    /// An empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `key = value`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StaticSource {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self { values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}

impl SecretSource for StaticSource {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// A flat TOML secrets file (`secrets.toml`).
///
/// ```toml
/// openai_api_key = "sk-..."
/// pinecone_api_key = "pc-..."
/// pinecone_environment = "us-west1-gcp"
/// top_k = 5
/// ```
#[derive(Debug, Clone, Default)]
pub struct SecretsFile {
    values: HashMap<String, String>,
}

impl SecretsFile {
    /// Parse secrets from TOML text. Nested tables are ignored.
    pub fn parse(content: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(content)
            .map_err(|e| RagError::ConfigError(format!("invalid secrets file: {e}")))?;

        let values = table
            .into_iter()
            .filter_map(|(key, value)| {
                let value = match value {
                    toml::Value::String(s) => s,
                    toml::Value::Integer(i) => i.to_string(),
                    toml::Value::Float(f) => f.to_string(),
                    toml::Value::Boolean(b) => b.to_string(),
                    _ => return None,
                };
                Some((key, value))
            })
            .collect();
        Ok(Self { values })
    }

    /// Load secrets from `path`. A missing file yields an empty source.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => {
                debug!(path = %path.display(), "loaded secrets file");
                Self::parse(&content)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(RagError::ConfigError(format!(
                "failed to read secrets file {}: {e}",
                path.display()
            ))),
        }
    }
}

impl SecretSource for SecretsFile {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Lookup chain over several sources; first non-empty value wins.
struct Resolver<'a> {
    sources: [&'a dyn SecretSource; 2],
}

impl Resolver<'_> {
    fn get(&self, key: &str) -> Option<String> {
        self.sources
            .iter()
            .filter_map(|source| source.get(key))
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
    }

    fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parse<T: FromStr>(&self, key: &str) -> Result<Option<T>>
    where
        T::Err: fmt::Display,
    {
        self.get(key)
            .map(|raw| {
                raw.parse::<T>().map_err(|e| {
                    RagError::ConfigError(format!("{key} has invalid value {raw:?}: {e}"))
                })
            })
            .transpose()
    }
}

/// Resolved deployment settings.
///
/// Credentials are never printed: the [`Debug`] impl redacts them.
#[derive(Clone)]
pub struct Settings {
    /// OpenAI API key.
    pub openai_api_key: String,
    /// Pinecone API key.
    pub pinecone_api_key: String,
    /// Pinecone environment indexes are created in.
    pub pinecone_environment: String,
    /// Index name.
    pub pinecone_index_name: String,
    /// Embedding model name.
    pub embedding_model: String,
    /// Chat model name.
    pub chat_model: String,
    /// Pipeline tuning, including any overrides found in the sources.
    pub rag: RagConfig,
}

/// Which settings are present, safe to display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingsStatus {
    /// OpenAI key present.
    pub openai_configured: bool,
    /// Pinecone key and environment present.
    pub pinecone_configured: bool,
    /// Chat model name.
    pub chat_model: String,
    /// Embedding model name.
    pub embedding_model: String,
    /// Index name.
    pub index_name: String,
}

impl Settings {
    /// Resolve settings from a secrets store and the environment.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] naming every missing credential, or
    /// describing the first unparsable or invalid tuning value.
    pub fn resolve(secrets: &dyn SecretSource, env: &dyn SecretSource) -> Result<Self> {
        let resolver = Resolver { sources: [secrets, env] };

        let required = [
            ("openai_api_key", "OpenAI API Key"),
            ("pinecone_api_key", "Pinecone API Key"),
            ("pinecone_environment", "Pinecone Environment"),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(key, _)| resolver.get(key).is_none())
            .map(|(_, label)| *label)
            .collect();
        if !missing.is_empty() {
            return Err(RagError::ConfigError(format!(
                "missing configuration: {}",
                missing.join(", ")
            )));
        }

        let settings = Self {
            openai_api_key: resolver.get_or("openai_api_key", ""),
            pinecone_api_key: resolver.get_or("pinecone_api_key", ""),
            pinecone_environment: resolver.get_or("pinecone_environment", ""),
            pinecone_index_name: resolver.get_or("pinecone_index_name", DEFAULT_INDEX_NAME),
            embedding_model: resolver.get_or("embedding_model", DEFAULT_EMBEDDING_MODEL),
            chat_model: resolver.get_or("chat_model", DEFAULT_CHAT_MODEL),
            rag: rag_config(&resolver)?,
        };
        info!(
            index = %settings.pinecone_index_name,
            chat_model = %settings.chat_model,
            embedding_model = %settings.embedding_model,
            "settings resolved"
        );
        Ok(settings)
    }

    /// Resolve from `secrets` and the process environment.
    pub fn from_env_with(secrets: &dyn SecretSource) -> Result<Self> {
        Self::resolve(secrets, &EnvSource)
    }

    /// What is configured, without credential values.
    pub fn status(&self) -> SettingsStatus {
        SettingsStatus {
            openai_configured: !self.openai_api_key.is_empty(),
            pinecone_configured: !self.pinecone_api_key.is_empty()
                && !self.pinecone_environment.is_empty(),
            chat_model: self.chat_model.clone(),
            embedding_model: self.embedding_model.clone(),
            index_name: self.pinecone_index_name.clone(),
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("openai_api_key", &"<redacted>")
            .field("pinecone_api_key", &"<redacted>")
            .field("pinecone_environment", &self.pinecone_environment)
            .field("pinecone_index_name", &self.pinecone_index_name)
            .field("embedding_model", &self.embedding_model)
            .field("chat_model", &self.chat_model)
            .field("rag", &self.rag)
            .finish()
    }
}

fn rag_config(resolver: &Resolver<'_>) -> Result<RagConfig> {
    let mut builder = RagConfig::builder();
    if let Some(v) = resolver.parse("max_tokens")? {
        builder = builder.max_tokens(v);
    }
    if let Some(v) = resolver.parse("temperature")? {
        builder = builder.temperature(v);
    }
    if let Some(v) = resolver.parse("top_k")? {
        builder = builder.top_k(v);
    }
    if let Some(v) = resolver.parse("similarity_threshold")? {
        builder = builder.similarity_threshold(v);
    }
    if let Some(v) = resolver.parse("chunk_size")? {
        builder = builder.chunk_size(v);
    }
    if let Some(v) = resolver.parse("chunk_overlap")? {
        builder = builder.chunk_overlap(v);
    }
    if let Some(v) = resolver.parse("embedding_dimension")? {
        builder = builder.embedding_dimension(v);
    }
    if let Some(ms) = resolver.parse::<u64>("generation_timeout_ms")? {
        builder = builder.generation_timeout(std::time::Duration::from_millis(ms));
    }
    if let Some(v) = resolver.parse("min_line_chars")? {
        builder = builder.min_line_chars(v);
    }
    if let Some(v) = resolver.get("document_type") {
        builder = builder.document_type(v);
    }
    if let Some(v) = resolver.parse("max_embedding_chars")? {
        builder = builder.max_embedding_chars(v);
    }
    if let Some(v) = resolver.parse("upsert_batch_size")? {
        builder = builder.upsert_batch_size(v);
    }
    if let Some(v) = resolver.parse("max_sources")? {
        builder = builder.max_sources(v);
    }
    if let Some(v) = resolver.parse("source_preview_chars")? {
        builder = builder.source_preview_chars(v);
    }

    let defaults = ConfidenceWeights::default();
    let quality = resolver.parse("confidence_quality")?;
    let sufficiency = resolver.parse("confidence_sufficiency")?;
    if quality.is_some() || sufficiency.is_some() {
        builder = builder.confidence_weights(ConfidenceWeights {
            quality: quality.unwrap_or(defaults.quality),
            sufficiency: sufficiency.unwrap_or(defaults.sufficiency),
        });
    }
    builder.build()
}
