//! CLI command implementations

pub mod interactive;
pub mod run;
pub mod sessions;
pub mod tools;

pub use interactive::interactive_command;
pub use run::run_command;
pub use sessions::sessions_command;
pub use tools::tools_command;

use crate::config::CliConfigLoader;
use crate::offline::OfflineLlmClient;
use crate::output::{CliOutputConfig, CliOutputHandler};
use crate::store::StoreOptions;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use toolloop_core::{AgentBuilder, AgentConfig, ConversationController, TrajectoryRecorder};
use tracing::info;

/// Everything needed to drive conversation turns
pub struct RunOptions {
    pub config_loader: CliConfigLoader,
    pub offline: bool,
    pub session_id: String,
    pub store: StoreOptions,
    pub max_turns: Option<usize>,
    pub system_prompt: Option<String>,
    pub trajectory_file: Option<PathBuf>,
    pub verbose: bool,
}

/// Build a controller from configuration, flags and the selected store
pub async fn build_controller(options: &RunOptions) -> Result<ConversationController> {
    let (builder, mut agent_config) = if options.offline {
        info!("Running offline with the rule-based model");
        (
            AgentBuilder::with_client(Arc::new(OfflineLlmClient::new())),
            AgentConfig::default(),
        )
    } else {
        let loaded = options.config_loader.load().await?;
        info!("Using protocol: {}", loaded.llm.protocol.as_str());
        info!("Using model: {}", loaded.llm.model);
        (AgentBuilder::new(loaded.llm), loaded.agent)
    };

    if let Some(max_turns) = options.max_turns {
        agent_config.max_turns = max_turns;
    }
    if let Some(system_prompt) = &options.system_prompt {
        agent_config.system_prompt = Some(system_prompt.clone());
    }

    let output = CliOutputHandler::new(CliOutputConfig {
        show_tools: true,
        show_stats: options.verbose,
    });

    let mut builder = builder
        .with_agent_config(agent_config)
        .with_store(options.store.open().await?)
        .with_output(Arc::new(output));

    if let Some(trajectory_file) = &options.trajectory_file {
        info!("Trajectory file: {}", trajectory_file.display());
        builder = builder.with_trajectory_recorder(Arc::new(TrajectoryRecorder::with_file(
            trajectory_file,
        )));
    }

    Ok(builder.build()?)
}
