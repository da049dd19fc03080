//! JSON file session store
//!
//! One document per session, `<dir>/<session_id>.json`. Every append rewrites
//! the document through a temporary file and a rename so a crash never leaves
//! a half-written session behind.

use super::{validate_session_id, SessionStore, SessionSummary};
use crate::error::{Result, SessionError};
use crate::llm::{LlmMessage, MessageLog};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

const SESSION_EXTENSION: &str = "json";

/// On-disk session document
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionDocument {
    session_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    messages: Vec<LlmMessage>,
}

/// Session store keeping one JSON file per session in a directory
pub struct FileSessionStore {
    dir: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileSessionStore {
    /// Open a store rooted at `dir`, creating the directory if needed
    pub async fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;
        tracing::debug!("File session store at {}", dir.display());
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn session_path(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", session_id, SESSION_EXTENSION))
    }

    async fn read_document(&self, session_id: &str) -> Result<Option<SessionDocument>> {
        let path = self.session_path(session_id);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let document: SessionDocument =
            serde_json::from_str(&content).map_err(|e| SessionError::Corrupt {
                session_id: session_id.to_string(),
                message: e.to_string(),
            })?;
        Ok(Some(document))
    }

    async fn write_document(&self, document: &SessionDocument) -> Result<()> {
        let path = self.session_path(&document.session_id);
        let tmp_path = path.with_extension(format!("{}.tmp", SESSION_EXTENSION));

        let json = serde_json::to_string_pretty(document)?;
        fs::write(&tmp_path, json).await?;
        if let Err(e) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        Ok(())
    }
}

fn to_log(session_id: &str, messages: Vec<LlmMessage>) -> Result<MessageLog> {
    MessageLog::from_messages(messages).map_err(|e| {
        SessionError::Corrupt {
            session_id: session_id.to_string(),
            message: e.to_string(),
        }
        .into()
    })
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self, session_id: &str) -> Result<MessageLog> {
        validate_session_id(session_id)?;
        match self.read_document(session_id).await? {
            Some(document) => to_log(session_id, document.messages),
            None => Ok(MessageLog::new()),
        }
    }

    async fn append(&self, session_id: &str, messages: &[LlmMessage]) -> Result<()> {
        validate_session_id(session_id)?;
        if messages.is_empty() {
            return Ok(());
        }

        let _guard = self.write_lock.lock().await;
        let now = Utc::now();
        let mut document = match self.read_document(session_id).await? {
            Some(document) => document,
            None => SessionDocument {
                session_id: session_id.to_string(),
                created_at: now,
                updated_at: now,
                messages: Vec::new(),
            },
        };

        let mut log = to_log(session_id, std::mem::take(&mut document.messages))?;
        log.extend(messages.iter().cloned())?;

        document.messages = log.into_messages();
        document.updated_at = now;
        self.write_document(&document).await?;

        tracing::debug!(
            "Appended {} messages to session {} ({} total)",
            messages.len(),
            session_id,
            document.messages.len()
        );
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<bool> {
        validate_session_id(session_id)?;
        let _guard = self.write_lock.lock().await;
        match fs::remove_file(self.session_path(session_id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<SessionSummary>> {
        let mut summaries = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SESSION_EXTENSION) {
                continue;
            }
            let Some(session_id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if validate_session_id(session_id).is_err() {
                continue;
            }

            match self.read_document(session_id).await {
                Ok(Some(document)) => summaries.push(SessionSummary {
                    session_id: document.session_id,
                    message_count: document.messages.len(),
                    created_at: document.created_at,
                    updated_at: document.updated_at,
                }),
                Ok(None) => {}
                Err(e) => tracing::warn!("Skipping unreadable session {}: {}", session_id, e),
            }
        }

        summaries.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        Ok(summaries)
    }
}
