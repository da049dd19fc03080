//! In-memory session store

use super::{validate_session_id, SessionStore, SessionSummary};
use crate::error::Result;
use crate::llm::{LlmMessage, MessageLog};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

struct StoredSession {
    log: MessageLog,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Session store that lives for the lifetime of the process
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, StoredSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<MessageLog> {
        validate_session_id(session_id)?;
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(session_id)
            .map(|s| s.log.clone())
            .unwrap_or_default())
    }

    async fn append(&self, session_id: &str, messages: &[LlmMessage]) -> Result<()> {
        validate_session_id(session_id)?;
        if messages.is_empty() {
            return Ok(());
        }

        let mut sessions = self.sessions.write().await;
        let now = Utc::now();
        match sessions.get_mut(session_id) {
            Some(session) => {
                session.log.extend(messages.iter().cloned())?;
                session.updated_at = now;
            }
            None => {
                let log = MessageLog::from_messages(messages.to_vec())?;
                sessions.insert(
                    session_id.to_string(),
                    StoredSession {
                        log,
                        created_at: now,
                        updated_at: now,
                    },
                );
            }
        }
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<bool> {
        validate_session_id(session_id)?;
        Ok(self.sessions.write().await.remove(session_id).is_some())
    }

    async fn list(&self) -> Result<Vec<SessionSummary>> {
        let sessions = self.sessions.read().await;
        let mut summaries: Vec<SessionSummary> = sessions
            .iter()
            .map(|(id, s)| SessionSummary {
                session_id: id.clone(),
                message_count: s.log.len(),
                created_at: s.created_at,
                updated_at: s.updated_at,
            })
            .collect();
        summaries.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        Ok(summaries)
    }
}
