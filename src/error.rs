//! Public error taxonomy for learning-harness operations.
//!
//! Provider, store and config plumbing returns `anyhow::Result`; the
//! service layer maps failures into [`LearningError`], which the HTTP
//! server turns into status codes.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LearningError {
    /// Malformed or missing request input.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Indexing was asked to build an index from no usable text.
    #[error("no documents to index")]
    EmptyCorpus,

    /// A report operation ran against a session without an index.
    #[error("no research data found for this session")]
    NoResearchData,

    /// A research provider failed. The aggregator logs and swallows these.
    #[error("provider {provider} failed: {message}")]
    ProviderFailure { provider: String, message: String },

    #[error("generation failed: {0:#}")]
    GenerationFailure(#[source] anyhow::Error),

    /// Embedding or SQLite failure while indexing or retrieving.
    #[error("index error: {0:#}")]
    Index(#[source] anyhow::Error),

    #[error("session store error: {0:#}")]
    Store(#[source] anyhow::Error),
}

impl LearningError {
    pub fn invalid(message: impl Into<String>) -> Self {
        LearningError::InvalidRequest(message.into())
    }
}

pub type LearningResult<T> = std::result::Result<T, LearningError>;
