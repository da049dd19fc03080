//! Base tool traits and structures

use crate::error::{Result, ToolError};
use crate::llm::LlmMessage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Trait for all tools
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the name of the tool
    fn name(&self) -> &str;

    /// Get the description of the tool
    fn description(&self) -> &str;

    /// Get the JSON schema for the tool's parameters
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given, already validated, call
    async fn execute(&self, call: ToolCall) -> Result<ToolResult>;

    /// Get examples of how to use this tool
    fn examples(&self) -> Vec<ToolExample> {
        Vec::new()
    }
}

/// A call to a tool, as requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call
    pub id: String,

    /// Name of the tool to call
    pub name: String,

    /// Arguments to pass to the tool
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// Result of a tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// ID of the tool call this is a result for
    pub tool_call_id: String,

    /// Whether the execution was successful
    pub success: bool,

    /// Result content
    pub content: String,

    /// Optional structured data
    pub data: Option<serde_json::Value>,

    /// Execution duration in milliseconds
    pub duration_ms: Option<u64>,
}

/// Example usage of a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExample {
    /// Description of what this example does
    pub description: String,

    /// Example arguments
    pub arguments: serde_json::Value,

    /// Expected result description
    pub expected_result: String,
}

impl ToolCall {
    /// Create a new tool call with a fresh identifier
    pub fn new<S: Into<String>>(name: S, arguments: serde_json::Value) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), name, arguments)
    }

    /// Create a tool call with a backend-assigned identifier
    pub fn with_id<I: Into<String>, S: Into<String>>(
        id: I,
        name: S,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Get an argument value by key
    pub fn get_argument<T>(&self, key: &str) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let value = self
            .arguments
            .get(key)
            .ok_or_else(|| ToolError::ArgumentValidation {
                name: self.name.clone(),
                message: format!("missing argument: {}", key),
            })?;

        serde_json::from_value(value.clone()).map_err(|_| {
            ToolError::ArgumentValidation {
                name: self.name.clone(),
                message: format!("invalid type for argument: {}", key),
            }
            .into()
        })
    }
}

impl ToolResult {
    /// Create a successful result
    pub fn success<I: Into<String>, S: Into<String>>(tool_call_id: I, content: S) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            success: true,
            content: content.into(),
            data: None,
            duration_ms: None,
        }
    }

    /// Create an error result
    pub fn error<I: Into<String>, S: Into<String>>(tool_call_id: I, error: S) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            success: false,
            content: error.into(),
            data: None,
            duration_ms: None,
        }
    }

    /// Set structured data
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Set execution duration
    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Convert into the tool-role message appended to the conversation
    pub fn to_message(&self) -> LlmMessage {
        if self.success {
            LlmMessage::tool_result(&self.tool_call_id, &self.content)
        } else {
            LlmMessage::tool_error(&self.tool_call_id, &self.content)
        }
    }
}
