//! Text generation backends.
//!
//! | `generation.provider` | Backend | Endpoint |
//! |-----------------------|---------|----------|
//! | `"disabled"` | [`DisabledGenerator`] | none, every call fails |
//! | `"openai"` | [`OpenAIGenerator`] | `POST {url}/chat/completions` |
//! | `"ollama"` | [`OllamaGenerator`] | `POST {url}/api/chat`, non-streaming |
//!
//! Each prompt is sent as one user message. Generation is never retried: a
//! failed call aborts the report operation that issued it.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

use learning_harness_core::generation::GenerationProvider;

use crate::config::GenerationConfig;
use crate::http::{openai_api_key, required, JsonEndpoint};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434";

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

fn user_turn(prompt: &str) -> Vec<ChatMessage> {
    vec![ChatMessage {
        role: "user".to_string(),
        content: prompt.to_string(),
    }]
}

fn non_empty(label: &str, content: String) -> Result<String> {
    if content.trim().is_empty() {
        bail!("{} returned an empty completion", label);
    }
    Ok(content)
}

pub struct DisabledGenerator;

#[async_trait]
impl GenerationProvider for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn generate(&self, _prompt: &str) -> Result<String> {
        bail!("generation provider is disabled; set [generation].provider to write reports")
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ReplyMessage,
}

/// OpenAI-compatible chat completions client.
pub struct OpenAIGenerator {
    endpoint: JsonEndpoint,
    model: String,
    temperature: Option<f32>,
}

impl OpenAIGenerator {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            endpoint: JsonEndpoint::new("OpenAI", base_url, api_key, timeout)?,
            model: model.into(),
            temperature: None,
        })
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Requires `generation.model` and the `OPENAI_API_KEY` environment variable.
    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        let model = required(&config.model, "generation.model", "openai")?;
        let url = config.url.as_deref().unwrap_or(OPENAI_BASE_URL);
        Ok(Self::new(
            url,
            Some(openai_api_key()?),
            model,
            Duration::from_secs(config.timeout_secs),
        )?
        .with_temperature(config.temperature))
    }
}

#[async_trait]
impl GenerationProvider for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<String> {
        let start = Instant::now();
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: user_turn(prompt),
            temperature: self.temperature,
            stream: false,
        };
        let reply: ChatCompletionResponse = self.endpoint.post("/chat/completions", &request).await?;

        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        let content = non_empty("OpenAI", content)?;

        debug!(
            response_len = content.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "generation complete"
        );
        Ok(content)
    }
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: ReplyMessage,
}

/// Ollama `/api/chat` client.
pub struct OllamaGenerator {
    endpoint: JsonEndpoint,
    model: String,
    temperature: Option<f32>,
}

impl OllamaGenerator {
    pub fn new(url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            endpoint: JsonEndpoint::new("Ollama", url, None, timeout)?,
            model: model.into(),
            temperature: None,
        })
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        let model = required(&config.model, "generation.model", "ollama")?;
        let url = config.url.as_deref().unwrap_or(OLLAMA_BASE_URL);
        Ok(Self::new(url, model, Duration::from_secs(config.timeout_secs))?
            .with_temperature(config.temperature))
    }
}

#[async_trait]
impl GenerationProvider for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = OllamaChatRequest {
            model: &self.model,
            messages: user_turn(prompt),
            stream: false,
            options: self.temperature.map(|temperature| OllamaOptions { temperature }),
        };
        let reply: OllamaChatResponse = self
            .endpoint
            .post("/api/chat", &request)
            .await
            .map_err(|e| e.context(format!("is Ollama running at {}?", self.endpoint.base_url())))?;
        non_empty("Ollama", reply.message.content.unwrap_or_default())
    }
}

/// Build the backend named by `generation.provider`.
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn GenerationProvider>> {
    let generator: Arc<dyn GenerationProvider> = match config.provider.as_str() {
        "disabled" => Arc::new(DisabledGenerator),
        "openai" => Arc::new(OpenAIGenerator::from_config(config)?),
        "ollama" => Arc::new(OllamaGenerator::from_config(config)?),
        other => bail!("unknown generation provider '{}'", other),
    };
    Ok(generator)
}
