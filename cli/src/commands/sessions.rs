//! Session management command

use crate::store::StoreOptions;
use anyhow::Result;
use colored::Colorize;

/// List stored sessions, or delete one
pub async fn sessions_command(store: StoreOptions, delete: Option<String>) -> Result<()> {
    let store = store.open().await?;

    if let Some(session_id) = delete {
        if store.delete(&session_id).await? {
            println!("Deleted session {}", session_id);
        } else {
            println!("No session named {}", session_id);
        }
        return Ok(());
    }

    let sessions = store.list().await?;
    if sessions.is_empty() {
        println!("No stored sessions");
        return Ok(());
    }

    for summary in sessions {
        println!(
            "{}  {} messages  updated {}",
            summary.session_id.bold(),
            summary.message_count,
            summary
                .updated_at
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}
