//! Tool executor: resolve, validate, run

use crate::error::{Error, Result, ToolError};
use crate::tools::validation::validate_arguments;
use crate::tools::{ToolCall, ToolRegistry, ToolResult};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinError;

/// Runs tool calls against a registry
#[derive(Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    timeout: Option<Duration>,
}

impl ToolExecutor {
    /// Create a new tool executor
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            timeout: None,
        }
    }

    /// Abort any single tool call that runs longer than `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute a tool call, surfacing every failure as an error.
    ///
    /// Unknown tools are rejected before any handler runs; arguments are
    /// checked against the tool's schema before the handler sees them.
    pub async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let tool = self.registry.resolve(&call.name)?;

        validate_arguments(&tool.parameters_schema(), &call.arguments).map_err(|message| {
            ToolError::ArgumentValidation {
                name: call.name.clone(),
                message,
            }
        })?;

        let start_time = Instant::now();
        // Separate task: a panicking handler comes back as a JoinError.
        let handle = tokio::spawn({
            let tool = tool.clone();
            let call = call.clone();
            async move { tool.execute(call).await }
        });
        let abort = handle.abort_handle();
        let joined = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    abort.abort();
                    return Err(ToolError::Timeout {
                        name: call.name.clone(),
                        seconds: limit.as_secs(),
                    }
                    .into());
                }
            },
            None => handle.await,
        };
        let outcome = joined.map_err(|e| ToolError::ToolExecution {
            name: call.name.clone(),
            message: join_failure_message(e),
        })?;
        let duration = start_time.elapsed().as_millis() as u64;

        match outcome {
            Ok(mut result) => {
                // Results always answer the call they were produced for.
                result.tool_call_id = call.id.clone();
                Ok(result.with_duration(duration))
            }
            Err(Error::Tool(e)) => Err(e.into()),
            Err(other) => Err(ToolError::ToolExecution {
                name: call.name.clone(),
                message: other.to_string(),
            }
            .into()),
        }
    }

    /// Execute a tool call, converting any failure into an error result.
    ///
    /// The conversation loop uses this so that a bad tool call is reported
    /// back to the model instead of aborting the turn.
    pub async fn execute_recovering(&self, call: &ToolCall) -> ToolResult {
        match self.execute(call).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("Tool call {} ({}) failed: {}", call.id, call.name, e);
                let message = match e {
                    Error::Tool(tool_error) => tool_error.to_string(),
                    other => other.to_string(),
                };
                ToolResult::error(call.id.clone(), message)
            }
        }
    }
}

/// Describe why a handler task ended without a result
fn join_failure_message(error: JoinError) -> String {
    if !error.is_panic() {
        return "tool task was cancelled".to_string();
    }
    let payload = error.into_panic();
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    format!("tool panicked: {}", detail)
}
