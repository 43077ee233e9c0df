//! Research session state and its store.
//!
//! Sessions are process-lifetime state keyed by `session_{8 hex}` ids. The
//! [`SessionStore`] trait lets the service run against any backend; the
//! bundled [`InMemorySessionStore`] keeps everything in a map behind a
//! `tokio::sync::RwLock` and can expire sessions idle longer than a TTL.
//! Every `put` counts as activity.
//!
//! Callers load a session, mutate the copy, and save it back, so
//! concurrent writers to one session are last-writer-wins.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use learning_harness_core::models::{Answers, Preferences, SourceDocument};

use crate::index::IndexHandle;

/// State spanning one learner's research-through-report journey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchSession {
    pub session_id: String,
    pub topic: Option<String>,
    pub objectives: Vec<String>,
    pub documents: Vec<SourceDocument>,
    /// Set only after a non-empty corpus was indexed.
    pub index_handle: Option<IndexHandle>,
    pub answers: Option<Answers>,
    pub preferences: Option<Preferences>,
    /// Set only after a successful synthesis or revision.
    pub report: Option<String>,
    pub feedback_history: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// Stamped by the store on every save.
    #[serde(default = "Utc::now")]
    pub last_active: DateTime<Utc>,
}

impl ResearchSession {
    pub fn new(session_id: impl Into<String>, topic: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            topic,
            objectives: Vec::new(),
            documents: Vec::new(),
            index_handle: None,
            answers: None,
            preferences: None,
            report: None,
            feedback_history: Vec::new(),
            created_at: now,
            last_active: now,
        }
    }
}

/// Generate a fresh `session_{8 hex chars}` id.
pub fn new_session_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("session_{}", &hex[..8])
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Expired sessions read as absent.
    async fn get(&self, session_id: &str) -> Result<Option<ResearchSession>>;

    /// Insert or replace a session, marking it active now.
    async fn put(&self, session: ResearchSession) -> Result<()>;

    /// Returns `true` if a session was removed.
    async fn remove(&self, session_id: &str) -> Result<bool>;

    /// Drop every expired session and hand the dropped ones back so their
    /// indexes can be cleaned up.
    async fn purge_expired(&self) -> Result<Vec<ResearchSession>>;
}

/// In-memory session store with optional expiry.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, ResearchSession>>,
    ttl: Option<chrono::Duration>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl: None,
        }
    }

    pub fn with_ttl(ttl_secs: Option<u64>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl: ttl_secs.map(|s| chrono::Duration::seconds(s.min(u32::MAX as u64) as i64)),
        }
    }

    fn is_expired(&self, session: &ResearchSession, now: DateTime<Utc>) -> bool {
        match self.ttl {
            Some(ttl) => now - session.last_active > ttl,
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<ResearchSession>> {
        let now = Utc::now();
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(session_id)
            .filter(|s| !self.is_expired(s, now))
            .cloned())
    }

    async fn put(&self, mut session: ResearchSession) -> Result<()> {
        session.last_active = Utc::now();
        self.sessions
            .write()
            .await
            .insert(session.session_id.clone(), session);
        Ok(())
    }

    async fn remove(&self, session_id: &str) -> Result<bool> {
        Ok(self.sessions.write().await.remove(session_id).is_some())
    }

    async fn purge_expired(&self) -> Result<Vec<ResearchSession>> {
        if self.ttl.is_none() {
            return Ok(Vec::new());
        }
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let expired: Vec<String> = sessions
            .values()
            .filter(|s| self.is_expired(s, now))
            .map(|s| s.session_id.clone())
            .collect();
        let removed: Vec<ResearchSession> = expired
            .iter()
            .filter_map(|id| sessions.remove(id))
            .collect();
        if !removed.is_empty() {
            debug!(removed = removed.len(), "purged expired sessions");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_format() {
        let id = new_session_id();
        assert!(id.starts_with("session_"));
        let suffix = &id["session_".len()..];
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, new_session_id());
    }

    #[tokio::test]
    async fn test_put_get_remove() {
        let store = InMemorySessionStore::new();
        let mut session = ResearchSession::new("session_00000001", Some("Rust".to_string()));
        store.put(session.clone()).await.unwrap();

        session.report = Some("# report".to_string());
        store.put(session).await.unwrap();
        let stored = store.get("session_00000001").await.unwrap().unwrap();
        assert_eq!(stored.report.as_deref(), Some("# report"));
        assert_eq!(store.len().await, 1);

        assert!(store.remove("session_00000001").await.unwrap());
        assert!(!store.remove("session_00000001").await.unwrap());
        assert!(store.get("session_00000001").await.unwrap().is_none());
    }

    /// Insert without going through `put`, so `last_active` is kept as given.
    async fn insert_idle(store: &InMemorySessionStore, id: &str, idle_secs: i64) {
        let mut session = ResearchSession::new(id, None);
        session.last_active = Utc::now() - chrono::Duration::seconds(idle_secs);
        store.sessions.write().await.insert(id.to_string(), session);
    }

    #[tokio::test]
    async fn test_idle_sessions_expire() {
        let store = InMemorySessionStore::with_ttl(Some(60));
        insert_idle(&store, "session_idle", 120).await;
        store.put(ResearchSession::new("session_busy", None)).await.unwrap();

        assert!(store.get("session_idle").await.unwrap().is_none());
        assert!(store.get("session_busy").await.unwrap().is_some());

        insert_idle(&store, "session_stale", 300).await;
        let mut purged: Vec<String> = store
            .purge_expired()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.session_id)
            .collect();
        purged.sort();
        assert_eq!(purged, vec!["session_idle", "session_stale"]);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_old_but_active_session_survives() {
        let store = InMemorySessionStore::with_ttl(Some(60));
        let mut session = ResearchSession::new("session_long", Some("Rust".to_string()));
        session.created_at = Utc::now() - chrono::Duration::hours(3);
        store.put(session).await.unwrap();

        let found = store.get("session_long").await.unwrap().unwrap();
        assert!(Utc::now() - found.created_at > chrono::Duration::hours(2));
        assert!(store.purge_expired().await.unwrap().is_empty());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_put_refreshes_activity() {
        let store = InMemorySessionStore::with_ttl(Some(60));
        insert_idle(&store, "session_revived", 120).await;
        assert!(store.get("session_revived").await.unwrap().is_none());

        let session = store.sessions.read().await["session_revived"].clone();
        store.put(session).await.unwrap();
        assert!(store.get("session_revived").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_no_ttl_never_expires() {
        let store = InMemorySessionStore::with_ttl(None);
        insert_idle(&store, "session_ancient", 365 * 24 * 3600).await;
        assert!(store.get("session_ancient").await.unwrap().is_some());
        assert!(store.purge_expired().await.unwrap().is_empty());
    }

    #[test]
    fn test_activity_defaults_when_missing() {
        let mut value = serde_json::to_value(ResearchSession::new("session_x", None)).unwrap();
        value.as_object_mut().unwrap().remove("last_active");
        let session: ResearchSession = serde_json::from_value(value).unwrap();
        assert!(Utc::now() - session.last_active < chrono::Duration::minutes(1));
    }
}
