//! Trajectory entry structures

use crate::llm::{LlmMessage, Usage};
use crate::tools::{ToolCall, ToolResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single entry in a recorded turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrajectoryEntry {
    /// Unique identifier for this entry
    pub id: String,

    /// Timestamp when this entry was created
    pub timestamp: DateTime<Utc>,

    /// Type of entry
    pub entry_type: EntryType,

    /// Model turn this entry belongs to (0 before the first invocation)
    pub model_turn: usize,
}

/// Type of trajectory entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryType {
    /// User message accepted
    TurnStart { session_id: String, user_text: String },

    /// Model request sent
    ModelRequest {
        messages: Vec<LlmMessage>,
        model: String,
        provider: String,
    },

    /// Model reply received
    ModelResponse {
        message: LlmMessage,
        usage: Option<Usage>,
    },

    /// Tool call initiated
    ToolCall { call: ToolCall },

    /// Tool result received
    ToolResult { result: ToolResult },

    /// Turn ended with a plain reply
    TurnComplete {
        final_reply: String,
        model_turns: usize,
        duration_ms: u64,
    },

    /// Turn aborted
    Error { error: String },
}

impl TrajectoryEntry {
    /// Create a new trajectory entry
    pub fn new(entry_type: EntryType, model_turn: usize) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            entry_type,
            model_turn,
        }
    }

    pub fn turn_start(session_id: &str, user_text: &str) -> Self {
        Self::new(
            EntryType::TurnStart {
                session_id: session_id.to_string(),
                user_text: user_text.to_string(),
            },
            0,
        )
    }

    pub fn model_request(
        messages: Vec<LlmMessage>,
        model: &str,
        provider: &str,
        model_turn: usize,
    ) -> Self {
        Self::new(
            EntryType::ModelRequest {
                messages,
                model: model.to_string(),
                provider: provider.to_string(),
            },
            model_turn,
        )
    }

    pub fn model_response(message: LlmMessage, usage: Option<Usage>, model_turn: usize) -> Self {
        Self::new(EntryType::ModelResponse { message, usage }, model_turn)
    }

    pub fn tool_call(call: ToolCall, model_turn: usize) -> Self {
        Self::new(EntryType::ToolCall { call }, model_turn)
    }

    pub fn tool_result(result: ToolResult, model_turn: usize) -> Self {
        Self::new(EntryType::ToolResult { result }, model_turn)
    }

    pub fn turn_complete(final_reply: String, model_turns: usize, duration_ms: u64) -> Self {
        Self::new(
            EntryType::TurnComplete {
                final_reply,
                model_turns,
                duration_ms,
            },
            model_turns,
        )
    }

    pub fn error(error: String, model_turn: usize) -> Self {
        Self::new(EntryType::Error { error }, model_turn)
    }
}
