//! SQLite-backed session store. Persistent across process restarts.
//!
//! Sessions live in two tables: `sessions` for timestamps and `messages` with
//! one row per message, ordered by `seq`. Appends run inside a transaction.

use super::{validate_session_id, SessionStore, SessionSummary};
use crate::error::{Result, SessionError};
use crate::llm::{LlmMessage, MessageLog};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    session_id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS messages (
    session_id TEXT NOT NULL REFERENCES sessions(session_id) ON DELETE CASCADE,
    seq INTEGER NOT NULL,
    role TEXT NOT NULL,
    body TEXT NOT NULL,
    PRIMARY KEY (session_id, seq)
);
"#;

/// SQLite session store. Uses spawn_blocking and a fresh connection per call.
pub struct SqliteSessionStore {
    db_path: PathBuf,
}

impl SqliteSessionStore {
    /// Open (or create) the database at `path` and ensure the schema exists
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&db_path)?;
        conn.execute_batch(SCHEMA)?;
        tracing::debug!("SQLite session store at {}", db_path.display());
        Ok(Self { db_path })
    }

    fn open(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    /// Run blocking database work off the async runtime
    async fn blocking<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = Self::open(&db_path)?;
            work(&mut conn)
        })
        .await
        .map_err(|e| SessionError::Storage {
            message: e.to_string(),
        })?
    }
}

fn read_messages(conn: &Connection, session_id: &str) -> Result<Vec<LlmMessage>> {
    let mut stmt = conn.prepare("SELECT body FROM messages WHERE session_id = ?1 ORDER BY seq")?;
    let bodies = stmt
        .query_map(params![session_id], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    bodies
        .iter()
        .map(|body| {
            serde_json::from_str(body).map_err(|e| {
                SessionError::Corrupt {
                    session_id: session_id.to_string(),
                    message: e.to_string(),
                }
                .into()
            })
        })
        .collect()
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_default()
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn load(&self, session_id: &str) -> Result<MessageLog> {
        validate_session_id(session_id)?;
        let id = session_id.to_string();
        let messages = self.blocking(move |conn| read_messages(conn, &id)).await?;
        MessageLog::from_messages(messages).map_err(|e| {
            SessionError::Corrupt {
                session_id: session_id.to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }

    async fn append(&self, session_id: &str, messages: &[LlmMessage]) -> Result<()> {
        validate_session_id(session_id)?;
        if messages.is_empty() {
            return Ok(());
        }

        let id = session_id.to_string();
        let pending = messages.to_vec();
        self.blocking(move |conn| {
            let tx = conn.transaction()?;

            // Re-check the log invariant against what is actually stored.
            let existing = read_messages(&tx, &id)?;
            let log = MessageLog::from_messages(existing)?;
            log.check_append(&pending)?;

            let now = Utc::now().to_rfc3339();
            tx.execute(
                "INSERT INTO sessions (session_id, created_at, updated_at) VALUES (?1, ?2, ?2)
                 ON CONFLICT(session_id) DO UPDATE SET updated_at = excluded.updated_at",
                params![id, now],
            )?;

            let next_seq: i64 = tx.query_row(
                "SELECT COALESCE(MAX(seq) + 1, 0) FROM messages WHERE session_id = ?1",
                params![id],
                |row| row.get(0),
            )?;
            {
                let mut insert = tx.prepare(
                    "INSERT INTO messages (session_id, seq, role, body) VALUES (?1, ?2, ?3, ?4)",
                )?;
                for (offset, message) in pending.iter().enumerate() {
                    let body = serde_json::to_string(message)?;
                    insert.execute(params![
                        id,
                        next_seq + offset as i64,
                        message.role.as_str(),
                        body
                    ])?;
                }
            }

            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, session_id: &str) -> Result<bool> {
        validate_session_id(session_id)?;
        let id = session_id.to_string();
        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM messages WHERE session_id = ?1", params![id])?;
            let removed = tx.execute("DELETE FROM sessions WHERE session_id = ?1", params![id])?;
            tx.commit()?;
            Ok(removed > 0)
        })
        .await
    }

    async fn list(&self) -> Result<Vec<SessionSummary>> {
        self.blocking(|conn| {
            let mut stmt = conn.prepare(
                "SELECT s.session_id, s.created_at, s.updated_at,
                        (SELECT COUNT(*) FROM messages m WHERE m.session_id = s.session_id)
                 FROM sessions s ORDER BY s.session_id",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?;

            let mut summaries = Vec::new();
            for row in rows {
                let (session_id, created_at, updated_at, count) = row?;
                summaries.push(SessionSummary {
                    session_id,
                    message_count: count.max(0) as usize,
                    created_at: parse_timestamp(&created_at),
                    updated_at: parse_timestamp(&updated_at),
                });
            }
            Ok(summaries)
        })
        .await
    }
}
