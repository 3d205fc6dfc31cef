//! Session bookkeeping for invocations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::AgentResult;

/// A stored session record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    /// Session / context identifier
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// When the session was first seen
    pub created_at: DateTime<Utc>,
    /// When the session was last used
    pub updated_at: DateTime<Utc>,
}

/// Storage for conversation sessions.
#[async_trait]
pub trait SessionService: Send + Sync {
    /// Create the session if it does not exist, and touch it if it does.
    async fn ensure_session(&self, user_id: &str, context_id: &str) -> AgentResult<SessionRecord>;

    /// Look up a session.
    async fn get_session(&self, user_id: &str, context_id: &str) -> Option<SessionRecord>;
}

/// In-memory session service; sessions live for the process lifetime.
#[derive(Debug, Default)]
pub struct InMemorySessionService {
    sessions: RwLock<HashMap<(String, String), SessionRecord>>,
}

impl InMemorySessionService {
    /// Create an empty service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionService for InMemorySessionService {
    async fn ensure_session(&self, user_id: &str, context_id: &str) -> AgentResult<SessionRecord> {
        let key = (user_id.to_string(), context_id.to_string());
        let mut sessions = self.sessions.write().await;

        let record = sessions
            .entry(key)
            .and_modify(|r| r.updated_at = Utc::now())
            .or_insert_with(|| {
                debug!(user_id = %user_id, context_id = %context_id, "Creating session");
                let now = Utc::now();
                SessionRecord {
                    id: context_id.to_string(),
                    user_id: user_id.to_string(),
                    created_at: now,
                    updated_at: now,
                }
            });

        Ok(record.clone())
    }

    async fn get_session(&self, user_id: &str, context_id: &str) -> Option<SessionRecord> {
        let key = (user_id.to_string(), context_id.to_string());
        self.sessions.read().await.get(&key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ensure_creates_then_touches() {
        let service = InMemorySessionService::new();

        let first = service.ensure_session("u-1", "ctx-1").await.unwrap();
        assert_eq!(first.user_id, "u-1");
        assert_eq!(service.session_count().await, 1);

        let second = service.ensure_session("u-1", "ctx-1").await.unwrap();
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);
        assert_eq!(service.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_sessions_scoped_per_user() {
        let service = InMemorySessionService::new();
        service.ensure_session("u-1", "ctx-1").await.unwrap();
        service.ensure_session("u-2", "ctx-1").await.unwrap();

        assert_eq!(service.session_count().await, 2);
        assert!(service.get_session("u-1", "ctx-1").await.is_some());
        assert!(service.get_session("u-3", "ctx-1").await.is_none());
    }
}
