//! Error types and handling for toolloop core

use thiserror::Error;

/// Result type alias for toolloop operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for toolloop core
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Model invocation errors
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Tool registration and execution errors
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    /// Conversation controller errors
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    /// Session store errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Trajectory recording errors
    #[error("Trajectory error: {0}")]
    Trajectory(#[from] TrajectoryError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// SQLite database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Timeout errors
    #[error("Timeout error: {0}")]
    Timeout(#[from] tokio::time::error::Elapsed),
}

impl Error {
    /// Whether the failed operation may succeed if attempted again.
    ///
    /// Only model transport failures and timeouts qualify; everything else
    /// is deterministic for the same input.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Llm(LlmError::ModelUnavailable { .. }) | Error::Timeout(_)
        )
    }
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for field '{field}': {value}")]
    InvalidValue { field: String, value: String },

    #[error("Unsupported protocol: {protocol}")]
    UnsupportedProtocol { protocol: String },

    #[error("No configuration found. Searched: {searched}")]
    NoConfigFound { searched: String },
}

/// Model invocation errors
#[derive(Error, Debug)]
pub enum LlmError {
    /// Transport-level failure; the caller may retry
    #[error("Model unavailable: {message}")]
    ModelUnavailable { message: String },

    /// The backend answered, but the answer is not a usable message
    #[error("Invalid model response: {message}")]
    ModelResponseInvalid { message: String },

    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },
}

/// Tool registration and execution errors
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Tool already registered: {name}")]
    DuplicateTool { name: String },

    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("Invalid arguments for tool '{name}': {message}")]
    ArgumentValidation { name: String, message: String },

    #[error("Tool execution failed: {name} - {message}")]
    ToolExecution { name: String, message: String },

    #[error("Tool timed out after {seconds}s: {name}")]
    Timeout { name: String, seconds: u64 },
}

/// Conversation controller errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Maximum model turns exceeded: {max_turns}")]
    MaxTurnsExceeded { max_turns: usize },
}

/// Session store errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid session id: {session_id:?}")]
    InvalidSessionId { session_id: String },

    #[error("Tool result references unknown tool call: {tool_call_id}")]
    DanglingToolResult { tool_call_id: String },

    #[error("Corrupt session data for '{session_id}': {message}")]
    Corrupt { session_id: String, message: String },

    #[error("Storage failure: {message}")]
    Storage { message: String },
}

/// Trajectory recording errors
#[derive(Error, Debug)]
pub enum TrajectoryError {
    #[error("Failed to record trajectory: {message}")]
    RecordingFailed { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let unavailable: Error = LlmError::ModelUnavailable {
            message: "connection reset".to_string(),
        }
        .into();
        assert!(unavailable.is_retryable());

        let invalid: Error = LlmError::ModelResponseInvalid {
            message: "no choices".to_string(),
        }
        .into();
        assert!(!invalid.is_retryable());

        let max_turns: Error = AgentError::MaxTurnsExceeded { max_turns: 3 }.into();
        assert!(!max_turns.is_retryable());
    }

    #[test]
    fn test_error_display_nests_source_message() {
        let err: Error = ToolError::UnknownTool {
            name: "restar".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "Tool error: Unknown tool: restar");
    }
}
