//! # toolloop CLI
//!
//! Command-line interface for toolloop - chat with a tool-calling model.
//!
//! ## Usage
//!
//! - `toolloop` - Start interactive mode
//! - `toolloop "Suma 2 y 3"` - Run a single turn and print the reply
//! - `toolloop tools` - Show available tools
//! - `toolloop sessions` - List stored sessions
//!
//! `--offline` swaps the configured model for a rule-based one so the loop
//! can be tried without credentials.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod offline;
mod output;
mod store;

use commands::{interactive_command, run_command, sessions_command, tools_command, RunOptions};
use config::CliConfigLoader;
use store::{StoreKind, StoreOptions};

/// toolloop - a minimal tool-calling conversation loop
#[derive(Parser)]
#[command(name = "toolloop")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Chat with a tool-calling model from the terminal")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file or directory path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Protocol to use (openai, anthropic, google_ai, azure_openai)
    #[arg(long)]
    protocol: Option<String>,

    /// API key override
    #[arg(long)]
    api_key: Option<String>,

    /// Base URL override
    #[arg(long)]
    base_url: Option<String>,

    /// Model name override
    #[arg(long)]
    model: Option<String>,

    /// Session to continue
    #[arg(short, long, env = "TOOLLOOP_SESSION", default_value = "default")]
    session: String,

    /// Where sessions are stored
    #[arg(long, value_enum, default_value_t = StoreKind::Memory, global = true)]
    store: StoreKind,

    /// Directory (file store) or database file (sqlite store)
    #[arg(long, global = true)]
    store_path: Option<PathBuf>,

    /// Maximum number of model invocations per turn
    #[arg(long)]
    max_turns: Option<usize>,

    /// Instructions sent ahead of every model request
    #[arg(long)]
    system_prompt: Option<String>,

    /// Output trajectory file
    #[arg(long)]
    trajectory_file: Option<PathBuf>,

    /// Use the built-in rule-based model instead of a configured provider
    #[arg(long)]
    offline: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// The message to send (if provided, runs a single turn)
    message: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show available tools
    Tools,

    /// List stored sessions
    Sessions {
        /// Delete this session instead of listing
        #[arg(long)]
        delete: Option<String>,
    },
}

/// Build a configuration loader from CLI arguments
fn build_config_loader(cli: &Cli) -> CliConfigLoader {
    let mut loader = CliConfigLoader::new();

    if let Some(config_path) = &cli.config {
        loader = loader.with_config_override(config_path.clone());
    }

    if let Some(protocol) = &cli.protocol {
        loader = loader.with_protocol_override(protocol.clone());
    }

    if let Some(api_key) = &cli.api_key {
        loader = loader.with_api_key_override(api_key.clone());
    }

    if let Some(base_url) = &cli.base_url {
        loader = loader.with_base_url_override(base_url.clone());
    }

    if let Some(model) = &cli.model {
        loader = loader.with_model_override(model.clone());
    }

    loader
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; RUST_LOG takes precedence over the verbosity flag
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let store = StoreOptions {
        kind: cli.store,
        path: cli.store_path.clone(),
    };
    let options = RunOptions {
        config_loader: build_config_loader(&cli),
        offline: cli.offline,
        session_id: cli.session,
        store: store.clone(),
        max_turns: cli.max_turns,
        system_prompt: cli.system_prompt,
        trajectory_file: cli.trajectory_file,
        verbose: cli.verbose,
    };

    match (cli.message, cli.command) {
        // If a message is provided, run a single turn
        (Some(message), None) => run_command(message, options).await,
        (Some(_), Some(_)) => {
            anyhow::bail!("Cannot specify both a message and a subcommand")
        }
        (None, Some(Commands::Tools)) => tools_command().await,
        (None, Some(Commands::Sessions { delete })) => sessions_command(store, delete).await,
        // Default to interactive mode
        (None, None) => interactive_command(options).await,
    }
}
