//! Session store selection for the CLI

use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::sync::Arc;
use toolloop_core::{FileSessionStore, InMemorySessionStore, SessionStore, SqliteSessionStore};

/// Where sessions are kept between invocations
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// Process memory; sessions end with the process
    Memory,
    /// One JSON document per session in a directory
    File,
    /// A single SQLite database
    Sqlite,
}

#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub kind: StoreKind,
    pub path: Option<PathBuf>,
}

impl StoreOptions {
    /// Path used when none is given: under the user's data directory
    fn default_path(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow!("Could not determine a data directory; pass --store-path"))?;
        let name = match self.kind {
            StoreKind::Sqlite => "sessions.db",
            _ => "sessions",
        };
        Ok(data_dir.join("toolloop").join(name))
    }

    pub async fn open(&self) -> Result<Arc<dyn SessionStore>> {
        let store: Arc<dyn SessionStore> = match self.kind {
            StoreKind::Memory => Arc::new(InMemorySessionStore::new()),
            StoreKind::File => {
                let dir = match &self.path {
                    Some(path) => path.clone(),
                    None => self.default_path()?,
                };
                tracing::debug!("Using file session store at {}", dir.display());
                Arc::new(FileSessionStore::new(&dir).await.with_context(|| {
                    format!("Failed to open session directory {}", dir.display())
                })?)
            }
            StoreKind::Sqlite => {
                let path = match &self.path {
                    Some(path) => path.clone(),
                    None => self.default_path()?,
                };
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tracing::debug!("Using SQLite session store at {}", path.display());
                Arc::new(SqliteSessionStore::new(&path).with_context(|| {
                    format!("Failed to open session database {}", path.display())
                })?)
            }
        };
        Ok(store)
    }
}
