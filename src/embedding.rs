//! Embedding backends for the session index.
//!
//! | `embedding.provider` | Backend | Endpoint |
//! |----------------------|---------|----------|
//! | `"disabled"` | [`DisabledEmbedder`] | none, every call fails |
//! | `"openai"` | [`OpenAIEmbedder`] | `POST {url}/embeddings` |
//! | `"ollama"` | [`OllamaEmbedder`] | `POST {url}/api/embed` |
//!
//! Both HTTP backends retry 429 and 5xx replies up to
//! `embedding.max_retries` times with exponential backoff.
//!
//! ```rust
//! # use learning_harness::config::EmbeddingConfig;
//! # use learning_harness::embedding::create_provider;
//! # use learning_harness_core::embedding::EmbeddingProvider;
//! let provider = create_provider(&EmbeddingConfig::default()).unwrap();
//! assert_eq!(provider.model_name(), "disabled");
//! ```

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use learning_harness_core::embedding::EmbeddingProvider;

use crate::config::EmbeddingConfig;
use crate::http::{openai_api_key, required, JsonEndpoint};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434";

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingData>,
}

#[derive(Deserialize)]
struct OpenAIEmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Used when `embedding.provider = "disabled"`. Research still runs, but
/// indexing a non-empty corpus fails.
pub struct DisabledEmbedder;

#[async_trait]
impl EmbeddingProvider for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed_texts(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("embedding provider is disabled; set [embedding].provider to index research")
    }
}

/// OpenAI-compatible `/embeddings` client.
pub struct OpenAIEmbedder {
    endpoint: JsonEndpoint,
    model: String,
    dims: usize,
}

impl OpenAIEmbedder {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        dims: usize,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            endpoint: JsonEndpoint::new("OpenAI", base_url, api_key, timeout)?.with_max_retries(5),
            model: model.into(),
            dims,
        })
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.endpoint = self.endpoint.with_max_retries(max_retries);
        self
    }

    /// Requires `model`, `dims` and the `OPENAI_API_KEY` environment variable.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let model = required(&config.model, "embedding.model", "openai")?;
        let dims = required(&config.dims, "embedding.dims", "openai")?;
        let url = config.url.as_deref().unwrap_or(OPENAI_BASE_URL);
        Ok(Self::new(
            url,
            Some(openai_api_key()?),
            model,
            dims,
            Duration::from_secs(config.timeout_secs),
        )?
        .with_max_retries(config.max_retries))
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let reply: OpenAIEmbeddingResponse = self
            .endpoint
            .post("/embeddings", &EmbedRequest { model: &self.model, input: texts })
            .await?;
        let vectors = order_by_index(reply.data);
        debug!(count = vectors.len(), model = %self.model, "embedded batch");
        Ok(vectors)
    }
}

/// Items may arrive out of order; `index` wins over position when present.
fn order_by_index(data: Vec<OpenAIEmbeddingData>) -> Vec<Vec<f32>> {
    let mut items: Vec<(usize, Vec<f32>)> = data
        .into_iter()
        .enumerate()
        .map(|(pos, item)| (item.index.unwrap_or(pos), item.embedding))
        .collect();
    items.sort_by_key(|(i, _)| *i);
    items.into_iter().map(|(_, v)| v).collect()
}

/// Ollama `/api/embed` client.
pub struct OllamaEmbedder {
    endpoint: JsonEndpoint,
    model: String,
    dims: usize,
}

impl OllamaEmbedder {
    pub fn new(
        url: impl Into<String>,
        model: impl Into<String>,
        dims: usize,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            endpoint: JsonEndpoint::new("Ollama", url, None, timeout)?.with_max_retries(5),
            model: model.into(),
            dims,
        })
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.endpoint = self.endpoint.with_max_retries(max_retries);
        self
    }

    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let model = required(&config.model, "embedding.model", "ollama")?;
        let dims = required(&config.dims, "embedding.dims", "ollama")?;
        let url = config.url.as_deref().unwrap_or(OLLAMA_BASE_URL);
        Ok(Self::new(url, model, dims, Duration::from_secs(config.timeout_secs))?
            .with_max_retries(config.max_retries))
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let reply: OllamaEmbedResponse = self
            .endpoint
            .post("/api/embed", &EmbedRequest { model: &self.model, input: texts })
            .await
            .map_err(|e| e.context(format!("is Ollama running at {}?", self.endpoint.base_url())))?;
        Ok(reply.embeddings)
    }
}

/// Build the backend named by `embedding.provider`.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.provider.as_str() {
        "disabled" => Arc::new(DisabledEmbedder),
        "openai" => Arc::new(OpenAIEmbedder::from_config(config)?),
        "ollama" => Arc::new(OllamaEmbedder::from_config(config)?),
        other => bail!("unknown embedding provider '{}'", other),
    };
    Ok(provider)
}
