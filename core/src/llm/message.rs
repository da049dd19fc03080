//! LLM message structures

use crate::tools::ToolCall;
use serde::{Deserialize, Serialize};

/// Represents a single turn entry in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmMessage {
    /// Role of the message sender
    pub role: MessageRole,

    /// Text content of the message (may be empty for pure tool-call replies)
    #[serde(default)]
    pub content: String,

    /// Tool invocations requested by the assistant, in the order returned
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// For tool results: the id of the call this message answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// For tool results: whether the content describes a failure
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_error: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Role of the message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System message (instructions); sent to the model, never persisted
    System,

    /// User message (human input)
    User,

    /// Assistant message (model reply)
    Assistant,

    /// Tool message (tool execution result)
    Tool,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }
}

impl LlmMessage {
    fn with_role<S: Into<String>>(role: MessageRole, content: S) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            is_error: false,
        }
    }

    /// Create a new system message
    pub fn system<S: Into<String>>(content: S) -> Self {
        Self::with_role(MessageRole::System, content)
    }

    /// Create a new user message
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self::with_role(MessageRole::User, content)
    }

    /// Create a new plain assistant message
    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self::with_role(MessageRole::Assistant, content)
    }

    /// Create an assistant message that requests one or more tool calls
    pub fn assistant_with_tool_calls<S: Into<String>>(content: S, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::with_role(MessageRole::Assistant, content)
        }
    }

    /// Create a successful tool result message for the given call
    pub fn tool_result<I: Into<String>, S: Into<String>>(tool_call_id: I, content: S) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::with_role(MessageRole::Tool, content)
        }
    }

    /// Create an error-tagged tool result message for the given call
    pub fn tool_error<I: Into<String>, S: Into<String>>(tool_call_id: I, error: S) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            is_error: true,
            ..Self::with_role(MessageRole::Tool, format!("Error: {}", error.into()))
        }
    }

    /// Get the text content of the message, if any
    pub fn get_text(&self) -> Option<&str> {
        if self.content.trim().is_empty() {
            None
        } else {
            Some(&self.content)
        }
    }

    /// Check if the message requests tool use
    pub fn has_tool_calls(&self) -> bool {
        self.role == MessageRole::Assistant && !self.tool_calls.is_empty()
    }
}
