//! Session-oriented orchestration of the research → report pipeline.
//!
//! [`LearningService`] owns the session store and wires the aggregator,
//! indexer, preference resolver, synthesizer and reviser behind the
//! operations exposed by the HTTP server and the CLI:
//!
//! | Operation | Method |
//! |-----------|--------|
//! | start session | [`LearningService::start_session`] |
//! | research | [`LearningService::research`] |
//! | clarify | [`LearningService::clarify`] |
//! | analyze preferences | [`LearningService::analyze_preferences`] |
//! | generate report | [`LearningService::generate_report`] |
//! | modify report | [`LearningService::modify_report`] |
//! | get session | [`LearningService::get_session`] |
//! | end session | [`LearningService::end_session`] |
//!
//! [`LearningService::purge_expired_sessions`] drops idle sessions together
//! with their index files; the server runs it on a timer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use learning_harness_core::models::{
    Answers, ClarificationQuestion, PreferenceOverrides, Preferences, SourceDocument,
};
use learning_harness_core::preferences::{clarification_questions, resolve};
use learning_harness_core::report::NO_RESEARCH_DATA;

use crate::config::Config;
use crate::embedding::create_provider;
use crate::error::{LearningError, LearningResult};
use crate::generation::create_generator;
use crate::index::{Indexer, SessionIndex};
use crate::research::Aggregator;
use crate::revision::Reviser;
use crate::session::{new_session_id, InMemorySessionStore, ResearchSession, SessionStore};
use crate::synthesis::Synthesizer;

/// Topic used for reports on sessions that never recorded one.
pub const DEFAULT_TOPIC: &str = "the requested topic";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResearchRequest {
    pub topic: String,
    #[serde(default)]
    pub objectives: Vec<String>,
    /// Reuse a session created by `start_session` instead of opening a new one.
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResearchResponse {
    pub session_id: String,
    pub documents: Vec<SourceDocument>,
    pub summary: String,
}

/// Read-only view of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub topic: Option<String>,
    pub objectives: Vec<String>,
    pub has_documents: bool,
    pub document_count: usize,
    pub has_index: bool,
    pub has_report: bool,
    pub preferences: Option<Preferences>,
    pub feedback_count: usize,
    pub created_at: DateTime<Utc>,
}

impl From<&ResearchSession> for SessionSummary {
    fn from(s: &ResearchSession) -> Self {
        Self {
            session_id: s.session_id.clone(),
            topic: s.topic.clone(),
            objectives: s.objectives.clone(),
            has_documents: !s.documents.is_empty(),
            document_count: s.documents.len(),
            has_index: s.index_handle.is_some(),
            has_report: s.report.is_some(),
            preferences: s.preferences.clone(),
            feedback_count: s.feedback_history.len(),
            created_at: s.created_at,
        }
    }
}

pub struct LearningService {
    store: Arc<dyn SessionStore>,
    aggregator: Aggregator,
    indexer: Indexer,
    synthesizer: Synthesizer,
    reviser: Reviser,
}

impl LearningService {
    pub fn new(
        store: Arc<dyn SessionStore>,
        aggregator: Aggregator,
        indexer: Indexer,
        synthesizer: Synthesizer,
        reviser: Reviser,
    ) -> Self {
        Self {
            store,
            aggregator,
            indexer,
            synthesizer,
            reviser,
        }
    }

    /// Build the service with the configured providers and an in-memory store.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let embedder = create_provider(&config.embedding)?;
        let generator = create_generator(&config.generation)?;
        let aggregator = Aggregator::from_config(&config.research)?;
        let indexer = Indexer::new(config.index.clone(), config.embedding.batch_size, embedder);
        let store = Arc::new(InMemorySessionStore::with_ttl(config.sessions.ttl_secs));

        Ok(Self::new(
            store,
            aggregator,
            indexer,
            Synthesizer::new(generator.clone(), config.report.clone()),
            Reviser::new(generator, config.report.clone()),
        ))
    }

    async fn load(&self, session_id: &str) -> LearningResult<ResearchSession> {
        self.store
            .get(session_id)
            .await
            .map_err(LearningError::Store)?
            .ok_or_else(|| LearningError::SessionNotFound(session_id.to_string()))
    }

    async fn save(&self, session: ResearchSession) -> LearningResult<()> {
        self.store.put(session).await.map_err(LearningError::Store)
    }

    pub async fn start_session(&self, topic: Option<String>) -> LearningResult<String> {
        let topic = topic.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
        let session = ResearchSession::new(new_session_id(), topic);
        let id = session.session_id.clone();
        self.save(session).await?;
        info!(session_id = %id, "session started");
        Ok(id)
    }

    /// Research `topic`, index the results, and record them on a session.
    ///
    /// Provider failures only shrink the document list. An empty corpus
    /// leaves the session without an index.
    #[instrument(skip(self, request), fields(topic = %request.topic))]
    pub async fn research(&self, request: ResearchRequest) -> LearningResult<ResearchResponse> {
        let topic = request.topic.trim().to_string();
        if topic.is_empty() {
            return Err(LearningError::invalid("topic is required"));
        }

        let mut session = match &request.session_id {
            Some(id) => self.load(id).await?,
            None => ResearchSession::new(new_session_id(), None),
        };

        let documents = self.aggregator.aggregate(&topic, &request.objectives).await;

        session.index_handle = match self
            .indexer
            .build_index(&session.session_id, &documents)
            .await
        {
            Ok(handle) => Some(handle),
            Err(LearningError::EmptyCorpus) => {
                warn!(session_id = %session.session_id, "no research material to index");
                None
            }
            Err(e) => return Err(e),
        };

        session.topic = Some(topic.clone());
        session.objectives = request.objectives;
        session.documents = documents.clone();
        let session_id = session.session_id.clone();
        self.save(session).await?;

        Ok(ResearchResponse {
            session_id,
            summary: format!("Found {} relevant sources on {}", documents.len(), topic),
            documents,
        })
    }

    /// Return the clarification questionnaire.
    ///
    /// A `session_id` entry in `answers` attaches the answers to that
    /// session; unknown ids are ignored.
    pub async fn clarify(
        &self,
        answers: &HashMap<String, String>,
    ) -> LearningResult<Vec<ClarificationQuestion>> {
        if answers.is_empty() {
            return Err(LearningError::invalid("answers are required"));
        }
        let parsed = Answers::from_map(answers);
        let mut topic = parsed.topic.clone();

        if let Some(session_id) = answers.get("session_id") {
            if let Some(mut session) = self.store.get(session_id).await.map_err(LearningError::Store)? {
                if topic.is_none() {
                    topic = session.topic.clone();
                }
                session.answers = Some(parsed);
                self.save(session).await?;
            } else {
                debug!(%session_id, "clarify for unknown session");
            }
        }

        Ok(clarification_questions(topic.as_deref()))
    }

    /// Resolve answers to preferences and, when a known session is named,
    /// store them on it.
    pub async fn analyze_preferences(
        &self,
        answers: &HashMap<String, String>,
        session_id: Option<&str>,
    ) -> LearningResult<Preferences> {
        if answers.is_empty() {
            return Err(LearningError::invalid("answers are required"));
        }
        let parsed = Answers::from_map(answers);
        let preferences = resolve(&parsed);

        let session_id = session_id.or_else(|| answers.get("session_id").map(String::as_str));
        if let Some(session_id) = session_id {
            if let Some(mut session) = self.store.get(session_id).await.map_err(LearningError::Store)? {
                if session.topic.is_none() {
                    session.topic = parsed.topic.clone();
                }
                session.answers = Some(parsed);
                session.preferences = Some(preferences.clone());
                self.save(session).await?;
            } else {
                debug!(%session_id, "preferences for unknown session");
            }
        }

        Ok(preferences)
    }

    /// Synthesize the learning report for a session.
    ///
    /// Returns the no-research-data message, without storing it, when the
    /// session has no index.
    #[instrument(skip(self, overrides))]
    pub async fn generate_report(
        &self,
        session_id: &str,
        overrides: &PreferenceOverrides,
    ) -> LearningResult<String> {
        let mut session = self.load(session_id).await?;
        let preferences = session
            .preferences
            .clone()
            .unwrap_or_default()
            .with_overrides(overrides);

        let index = match self.require_index(&session).await {
            Ok(index) => index,
            Err(LearningError::NoResearchData) => return Ok(NO_RESEARCH_DATA.to_string()),
            Err(e) => return Err(e),
        };

        let topic = session
            .topic
            .clone()
            .or_else(|| session.answers.as_ref().and_then(|a| a.topic.clone()))
            .unwrap_or_else(|| DEFAULT_TOPIC.to_string());

        let report = self.synthesizer.synthesize(&index, &topic, &preferences).await?;

        session.preferences = Some(preferences);
        session.report = Some(report.clone());
        self.save(session).await?;
        Ok(report)
    }

    /// Revise the session's report from free-text feedback.
    #[instrument(skip(self, feedback))]
    pub async fn modify_report(&self, session_id: &str, feedback: &str) -> LearningResult<String> {
        let mut session = self.load(session_id).await?;
        if feedback.trim().is_empty() {
            return Err(LearningError::invalid("feedback text is required"));
        }

        let index = match self.require_index(&session).await {
            Ok(index) => index,
            Err(LearningError::NoResearchData) => return Ok(NO_RESEARCH_DATA.to_string()),
            Err(e) => return Err(e),
        };

        let report = self
            .reviser
            .revise(&index, feedback, session.report.as_deref())
            .await?;

        session.feedback_history.push(feedback.trim().to_string());
        session.report = Some(report.clone());
        self.save(session).await?;
        Ok(report)
    }

    pub async fn get_session(&self, session_id: &str) -> LearningResult<SessionSummary> {
        let session = self.load(session_id).await?;
        Ok(SessionSummary::from(&session))
    }

    /// Forget a session and delete its index.
    pub async fn end_session(&self, session_id: &str) -> LearningResult<()> {
        let removed = self
            .store
            .remove(session_id)
            .await
            .map_err(LearningError::Store)?;
        if !removed {
            return Err(LearningError::SessionNotFound(session_id.to_string()));
        }
        self.indexer.remove(session_id)?;
        info!(%session_id, "session ended");
        Ok(())
    }

    /// Drop expired sessions and their index files. Returns how many
    /// sessions were dropped.
    pub async fn purge_expired_sessions(&self) -> LearningResult<usize> {
        let expired = self.store.purge_expired().await.map_err(LearningError::Store)?;
        for session in &expired {
            if let Some(handle) = &session.index_handle {
                if let Err(e) = self.indexer.remove(&handle.session_id) {
                    warn!(session_id = %session.session_id, error = %e, "failed to remove index");
                }
            }
        }
        if !expired.is_empty() {
            info!(count = expired.len(), "expired sessions purged");
        }
        Ok(expired.len())
    }

    /// Open the session's index, or fail with [`LearningError::NoResearchData`]
    /// when research produced none or its file is gone.
    async fn require_index(&self, session: &ResearchSession) -> LearningResult<SessionIndex> {
        let handle = session
            .index_handle
            .as_ref()
            .ok_or(LearningError::NoResearchData)?;
        self.indexer
            .open(&handle.session_id)
            .await?
            .ok_or(LearningError::NoResearchData)
    }
}
