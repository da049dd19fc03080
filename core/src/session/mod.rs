//! Session persistence
//!
//! A session is a named, append-only conversation log. Stores hand out a copy
//! of the log on [`SessionStore::load`] and accept new messages through
//! [`SessionStore::append`], which either commits all of them or none.

pub mod file;
pub mod memory;
pub mod sqlite;

pub use file::FileSessionStore;
pub use memory::InMemorySessionStore;
pub use sqlite::SqliteSessionStore;

use crate::error::{Result, SessionError};
use crate::llm::{LlmMessage, MessageLog};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest accepted session id
pub const MAX_SESSION_ID_LEN: usize = 128;

/// Persistent storage for conversation logs keyed by session id
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the log for `session_id`; unknown sessions yield an empty log
    async fn load(&self, session_id: &str) -> Result<MessageLog>;

    /// Append messages to a session, creating it if needed.
    ///
    /// Atomic per session: either every message is stored or none is.
    async fn append(&self, session_id: &str, messages: &[LlmMessage]) -> Result<()>;

    /// Delete a session. Returns whether it existed.
    async fn delete(&self, session_id: &str) -> Result<bool>;

    /// Summaries of every stored session, ordered by id
    async fn list(&self) -> Result<Vec<SessionSummary>>;
}

/// Overview of a stored session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Check that a session id is usable as a storage key and a file name
pub fn validate_session_id(session_id: &str) -> Result<()> {
    let valid = !session_id.is_empty()
        && session_id.len() <= MAX_SESSION_ID_LEN
        && session_id != "."
        && session_id != ".."
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));

    if valid {
        Ok(())
    } else {
        Err(SessionError::InvalidSessionId {
            session_id: session_id.to_string(),
        }
        .into())
    }
}
