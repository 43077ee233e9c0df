//! Web search snippets via SerpAPI's Google engine.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

use learning_harness_core::models::{Category, SourceDocument};

use super::ResearchSource;

pub struct SerpApiWebSource {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    max_results: usize,
}

impl SerpApiWebSource {
    pub fn new(
        client: reqwest::Client,
        url: &str,
        api_key: Option<String>,
        max_results: usize,
    ) -> Self {
        Self {
            client,
            url: url.to_string(),
            api_key,
            max_results,
        }
    }
}

#[async_trait]
impl ResearchSource for SerpApiWebSource {
    fn name(&self) -> &str {
        "serpapi-google"
    }

    fn category(&self) -> Category {
        Category::Web
    }

    async fn fetch(&self, topic: &str) -> Result<Vec<SourceDocument>> {
        let Some(api_key) = &self.api_key else {
            bail!("SERPAPI_API_KEY not set");
        };

        let response = self
            .client
            .get(&self.url)
            .query(&[("q", topic), ("engine", "google"), ("api_key", api_key.as_str())])
            .send()
            .await
            .context("SerpAPI request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("SerpAPI returned {}: {}", status, body);
        }

        let json: serde_json::Value = response.json().await.context("Invalid SerpAPI JSON")?;
        Ok(parse_organic_results(&json, self.max_results))
    }
}

/// Map `organic_results[].link` / `.snippet` to web documents.
///
/// Entries missing either field are kept with an empty value and left for
/// the aggregator to drop.
pub fn parse_organic_results(json: &serde_json::Value, max_results: usize) -> Vec<SourceDocument> {
    json.get("organic_results")
        .and_then(|r| r.as_array())
        .map(|results| {
            results
                .iter()
                .take(max_results)
                .map(|r| {
                    let field = |k: &str| r.get(k).and_then(|v| v.as_str()).unwrap_or_default();
                    SourceDocument::new(field("link"), field("snippet"), Category::Web)
                })
                .collect()
        })
        .unwrap_or_default()
}
