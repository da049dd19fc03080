//! Single message execution command

use super::{build_controller, RunOptions};
use anyhow::Result;
use tracing::debug;

/// Run one turn for `message` and print the final reply
pub async fn run_command(message: String, options: RunOptions) -> Result<()> {
    let controller = build_controller(&options).await?;

    debug!("Sending message to session {}", options.session_id);
    let outcome = controller.run_turn(&options.session_id, &message).await?;

    println!("{}", outcome.final_reply);
    Ok(())
}
