//! Trajectory recorder implementation

use crate::error::{Result, TrajectoryError};
use crate::trajectory::{EntryType, TrajectoryEntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;

const TRAJECTORY_FORMAT_VERSION: &str = "1.0";

/// Records what happened during turns, for debugging and analysis
pub struct TrajectoryRecorder {
    id: String,
    entries: RwLock<Vec<TrajectoryEntry>>,
    file_path: Option<PathBuf>,
}

/// Complete trajectory data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trajectory {
    pub metadata: TrajectoryMetadata,
    pub entries: Vec<TrajectoryEntry>,
}

/// Metadata for a trajectory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrajectoryMetadata {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub version: String,
    /// Session the recorded turns belong to
    pub session_id: Option<String>,
    /// Number of turns that finished with a plain reply
    pub completed_turns: usize,
    /// Number of turns that were aborted
    pub failed_turns: usize,
    pub duration_ms: Option<u64>,
}

impl TrajectoryRecorder {
    /// Create an in-memory trajectory recorder
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            entries: RwLock::new(Vec::new()),
            file_path: None,
        }
    }

    /// Create a trajectory recorder that rewrites `path` after every entry
    pub fn with_file<P: AsRef<Path>>(path: P) -> Self {
        Self {
            file_path: Some(path.as_ref().to_path_buf()),
            ..Self::new()
        }
    }

    /// Record a trajectory entry
    pub async fn record(&self, entry: TrajectoryEntry) -> Result<()> {
        self.entries.write().await.push(entry);
        self.save().await
    }

    /// Save the trajectory to file, if one is configured
    pub async fn save(&self) -> Result<()> {
        let Some(path) = &self.file_path else {
            return Ok(());
        };

        let trajectory = self.build_trajectory().await;
        let json = serde_json::to_string_pretty(&trajectory).map_err(|e| {
            TrajectoryError::RecordingFailed {
                message: format!("Failed to serialize trajectory: {}", e),
            }
        })?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, json).await?;

        Ok(())
    }

    /// Build a complete trajectory from recorded entries
    async fn build_trajectory(&self) -> Trajectory {
        let entries = self.entries.read().await.clone();

        let started_at = entries
            .first()
            .map(|e| e.timestamp)
            .unwrap_or_else(Utc::now);
        let completed_at = entries.last().map(|e| e.timestamp);
        let duration_ms = completed_at.map(|end| (end - started_at).num_milliseconds().max(0) as u64);

        let mut session_id = None;
        let mut completed_turns = 0;
        let mut failed_turns = 0;
        for entry in &entries {
            match &entry.entry_type {
                EntryType::TurnStart { session_id: id, .. } => session_id = Some(id.clone()),
                EntryType::TurnComplete { .. } => completed_turns += 1,
                EntryType::Error { .. } => failed_turns += 1,
                _ => {}
            }
        }

        Trajectory {
            metadata: TrajectoryMetadata {
                id: self.id.clone(),
                started_at,
                completed_at,
                version: TRAJECTORY_FORMAT_VERSION.to_string(),
                session_id,
                completed_turns,
                failed_turns,
                duration_ms,
            },
            entries,
        }
    }

}

impl Default for TrajectoryRecorder {
    fn default() -> Self {
        Self::new()
    }
}
