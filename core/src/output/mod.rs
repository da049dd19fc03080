//! Output abstraction layer for the conversation controller
//!
//! The controller reports what it is doing through an [`AgentOutput`] sink so
//! that the CLI, a log file or a test can observe a turn without the core
//! knowing how it is displayed.

use crate::llm::Usage;
use crate::tools::{ToolCall, ToolResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Error type returned by output sinks
pub type OutputResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Null output handler that discards all events
pub struct NullOutput;

#[async_trait]
impl AgentOutput for NullOutput {
    async fn emit_event(&self, _event: AgentEvent) -> OutputResult {
        Ok(())
    }
}

/// Events that can be emitted during a turn
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AgentEvent {
    /// A user message was accepted and a turn began
    TurnStarted { session_id: String, user_text: String },

    /// The model is about to be invoked
    ModelRequested { model_turn: usize, message_count: usize },

    /// The model replied
    ModelReplied {
        model_turn: usize,
        content: String,
        tool_calls: usize,
        usage: Option<Usage>,
    },

    /// A retryable model failure is about to be retried
    ModelRetry {
        attempt: usize,
        max_retries: usize,
        error: String,
    },

    /// A tool call is about to run
    ToolStarted { call: ToolCall },

    /// A tool call finished, successfully or not
    ToolCompleted { call: ToolCall, result: ToolResult },

    /// The turn ended with a plain assistant reply
    TurnCompleted {
        final_reply: String,
        model_turns: usize,
        tool_calls: usize,
        usage: Usage,
    },

    /// The turn was aborted
    TurnFailed { error: String },

    /// General message or log
    Message { level: MessageLevel, content: String },
}

/// Message severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageLevel {
    Debug,
    Info,
    Normal,
    Warning,
    Error,
}

/// Abstract output interface for turn execution
#[async_trait]
pub trait AgentOutput: Send + Sync {
    /// Emit an agent event
    async fn emit_event(&self, event: AgentEvent) -> OutputResult;

    /// Emit a message with specified level
    async fn emit_message(&self, level: MessageLevel, content: &str) -> OutputResult {
        self.emit_event(AgentEvent::Message {
            level,
            content: content.to_string(),
        })
        .await
    }

    /// Emit warning message
    async fn warning(&self, content: &str) -> OutputResult {
        self.emit_message(MessageLevel::Warning, content).await
    }

    /// Flush any buffered output (for implementations that buffer)
    async fn flush(&self) -> OutputResult {
        Ok(())
    }
}

/// Output sink that keeps every event in memory
#[derive(Default)]
pub struct CollectingOutput {
    events: tokio::sync::Mutex<Vec<AgentEvent>>,
}

impl CollectingOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events received so far
    pub async fn events(&self) -> Vec<AgentEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl AgentOutput for CollectingOutput {
    async fn emit_event(&self, event: AgentEvent) -> OutputResult {
        self.events.lock().await.push(event);
        Ok(())
    }
}
