//! Research source aggregation.
//!
//! The [`Aggregator`] fans out over three [`ResearchSource`]s (web search,
//! academic abstracts, video transcripts) concurrently and merges their
//! results into one ordered list of [`SourceDocument`]s.
//!
//! # Architecture
//!
//! ```text
//!              aggregate(topic)
//!                    │
//!      ┌─────────────┼──────────────┐
//!      ▼             ▼              ▼
//!  ┌────────┐  ┌──────────┐  ┌─────────────┐
//!  │  Web   │  │ Academic │  │    Video    │
//!  │SerpAPI │  │  arXiv   │  │search + cc  │
//!  └───┬────┘  └────┬─────┘  └──────┬──────┘
//!      │  Err → warn, contributes nothing │
//!      └─────────────┼──────────────┘
//!                    ▼
//!        normalize → web, academic, video
//! ```
//!
//! A failing source never fails the aggregation; it is logged and
//! contributes no documents.

pub mod arxiv;
pub mod video;
pub mod web;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use learning_harness_core::models::{Category, SourceDocument};

use crate::config::ResearchConfig;
use crate::error::LearningError;

pub use arxiv::ArxivSource;
pub use video::{SerpApiVideoSearch, VideoTranscriptSource, YoutubeTranscripts};
pub use web::SerpApiWebSource;

/// A provider of research material for a topic.
#[async_trait]
pub trait ResearchSource: Send + Sync {
    /// Short provider name used in logs (e.g. `"serpapi"`, `"arxiv"`).
    fn name(&self) -> &str;

    /// Category assigned to every document this source returns.
    fn category(&self) -> Category;

    /// Fetch documents for `topic`.
    async fn fetch(&self, topic: &str) -> Result<Vec<SourceDocument>>;
}

/// Concurrent fan-out over the web, academic and video sources.
pub struct Aggregator {
    web: Arc<dyn ResearchSource>,
    academic: Arc<dyn ResearchSource>,
    video: Arc<dyn ResearchSource>,
}

impl Aggregator {
    pub fn new(
        web: Arc<dyn ResearchSource>,
        academic: Arc<dyn ResearchSource>,
        video: Arc<dyn ResearchSource>,
    ) -> Self {
        Self {
            web,
            academic,
            video,
        }
    }

    /// Build the SerpAPI / arXiv / YouTube sources from configuration.
    ///
    /// `SERPAPI_API_KEY` is read from the environment. When it is absent
    /// the SerpAPI-backed sources fail at fetch time and are skipped.
    pub fn from_config(config: &ResearchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let serpapi_key = std::env::var("SERPAPI_API_KEY").ok();
        if serpapi_key.is_none() {
            warn!("SERPAPI_API_KEY not set; web and video research will be skipped");
        }

        let web = SerpApiWebSource::new(
            client.clone(),
            &config.serpapi_url,
            serpapi_key.clone(),
            config.web_results,
        );
        let academic = ArxivSource::new(client.clone(), &config.arxiv_url, config.academic_results);
        let video = VideoTranscriptSource::new(
            Arc::new(SerpApiVideoSearch::new(
                client.clone(),
                &config.serpapi_url,
                serpapi_key,
            )),
            Arc::new(YoutubeTranscripts::new(
                client,
                &config.transcript_url,
                &config.transcript_lang,
            )),
            config.video_candidates,
        );

        Ok(Self::new(Arc::new(web), Arc::new(academic), Arc::new(video)))
    }

    /// Query every source for `topic` and merge the results.
    ///
    /// Output is grouped web, then academic, then video. Documents with an
    /// empty source id or blank text are dropped. `objectives` are recorded
    /// for tracing only; the providers search on the topic alone.
    #[instrument(skip(self, objectives), fields(objectives = objectives.len()))]
    pub async fn aggregate(&self, topic: &str, objectives: &[String]) -> Vec<SourceDocument> {
        debug!(?objectives, "starting research fan-out");

        let (web, academic, video) = tokio::join!(
            run_source(self.web.as_ref(), topic),
            run_source(self.academic.as_ref(), topic),
            run_source(self.video.as_ref(), topic),
        );

        let documents: Vec<SourceDocument> = web.into_iter().chain(academic).chain(video).collect();
        info!(documents = documents.len(), "research complete");
        documents
    }
}

async fn run_source(source: &dyn ResearchSource, topic: &str) -> Vec<SourceDocument> {
    match source.fetch(topic).await {
        Ok(docs) => {
            let docs = normalize(docs, source.category());
            debug!(source = source.name(), count = docs.len(), "source returned documents");
            docs
        }
        Err(e) => {
            let err = LearningError::ProviderFailure {
                provider: source.name().to_string(),
                message: format!("{:#}", e),
            };
            warn!(error = %err, "research source failed, continuing without it");
            Vec::new()
        }
    }
}

/// Drop unusable documents and stamp the source's category on the rest.
fn normalize(docs: Vec<SourceDocument>, category: Category) -> Vec<SourceDocument> {
    docs.into_iter()
        .filter(|d| !d.source_id.trim().is_empty() && !d.text.trim().is_empty())
        .map(|d| SourceDocument { category, ..d })
        .collect()
}
