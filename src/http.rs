//! JSON-over-HTTP plumbing shared by the model provider clients.
//!
//! [`JsonEndpoint`] wraps one provider base URL with its client, optional
//! bearer key and a retry budget. Retries apply to HTTP 429, 5xx and
//! transport errors, with backoff of `2^(attempt-1)` seconds capped at 32s.
//! Any other non-success status fails at once.

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::warn;

/// Longest single backoff, as a power of two seconds.
const MAX_BACKOFF_EXP: u32 = 5;

pub(crate) fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1 << attempt.saturating_sub(1).min(MAX_BACKOFF_EXP))
}

fn is_transient(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Read a required `Option` config field for a provider.
pub(crate) fn required<T: Clone>(value: &Option<T>, field: &str, provider: &str) -> Result<T> {
    value
        .clone()
        .ok_or_else(|| anyhow!("{} is required for the {} provider", field, provider))
}

pub(crate) fn openai_api_key() -> Result<String> {
    std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY environment variable not set")
}

pub(crate) struct JsonEndpoint {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    label: &'static str,
    max_retries: u32,
}

impl JsonEndpoint {
    pub(crate) fn new(
        label: &'static str,
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .with_context(|| format!("failed to build {} HTTP client", label))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            label,
            max_retries: 0,
        })
    }

    pub(crate) fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST `body` to `{base_url}{path}` and decode the JSON reply.
    pub(crate) async fn post<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0;
        loop {
            if attempt > 0 {
                tokio::time::sleep(backoff(attempt)).await;
            }
            let outcome = self.send_once(&url, body).await;
            match outcome {
                Ok(reply) => return Ok(reply),
                Err(Failure::Fatal(e)) => return Err(e),
                Err(Failure::Transient(e)) if attempt >= self.max_retries => return Err(e),
                Err(Failure::Transient(e)) => {
                    warn!(provider = self.label, attempt, error = %e, "retrying request");
                }
            }
            attempt += 1;
        }
    }

    async fn send_once<B, R>(&self, url: &str, body: &B) -> std::result::Result<R, Failure>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let mut request = self.client.post(url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            Failure::Transient(anyhow!("{} connection error at {}: {}", self.label, self.base_url, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let err = anyhow!("{} returned {}: {}", self.label, status, text);
            return Err(if is_transient(status) {
                Failure::Transient(err)
            } else {
                Failure::Fatal(err)
            });
        }

        response
            .json()
            .await
            .with_context(|| format!("failed to decode {} response", self.label))
            .map_err(Failure::Fatal)
    }
}

enum Failure {
    Transient(anyhow::Error),
    Fatal(anyhow::Error),
}
