//! # toolloop Core
//!
//! Core library for toolloop - a minimal tool-calling conversation loop.
//!
//! A turn appends the user's message to a session, asks the model for a reply,
//! executes any tools the model requests, feeds the results back and repeats
//! until the model answers without requesting tools. Sessions are persisted
//! through a [`session::SessionStore`] so conversations can be resumed.

// Core modules
pub mod agent;
pub mod config;
pub mod error;
pub mod llm;
pub mod output;
pub mod session;
pub mod tools;
pub mod trajectory;

// Re-export commonly used types
pub use agent::{AgentBuilder, AgentConfig, ConversationController, TurnOutcome, TurnState};
pub use config::{ModelParams, Protocol, ResolvedLlmConfig};
pub use error::{Error, Result};
pub use llm::{LlmClient, LlmMessage, MessageLog, MessageRole};
pub use session::{FileSessionStore, InMemorySessionStore, SessionStore, SqliteSessionStore};
pub use tools::{Tool, ToolCall, ToolExecutor, ToolRegistry, ToolResult};
pub use trajectory::TrajectoryRecorder;

/// Current version of the toolloop-core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

