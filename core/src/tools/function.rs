//! Adapter that turns a typed closure into a [`Tool`]

use crate::error::{Result, ToolError};
use crate::tools::{Tool, ToolCall, ToolResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

type Handler<A, O> = dyn Fn(A) -> std::result::Result<O, String> + Send + Sync;

/// A tool backed by a plain function.
///
/// Arguments are decoded into `A` with serde; the handler's output is
/// serialized to JSON for the structured result, and rendered as plain text
/// (strings unquoted) for the message the model sees.
pub struct FunctionTool<A, O> {
    name: String,
    description: String,
    schema: serde_json::Value,
    handler: Box<Handler<A, O>>,
    _marker: PhantomData<fn(A) -> O>,
}

impl<A, O> FunctionTool<A, O>
where
    A: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
{
    pub fn new<N, D, F>(name: N, description: D, schema: serde_json::Value, handler: F) -> Self
    where
        N: Into<String>,
        D: Into<String>,
        F: Fn(A) -> std::result::Result<O, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            handler: Box::new(handler),
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<A, O> Tool for FunctionTool<A, O>
where
    A: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        self.schema.clone()
    }

    async fn execute(&self, call: ToolCall) -> Result<ToolResult> {
        let args: A = serde_json::from_value(call.arguments.clone()).map_err(|e| {
            ToolError::ArgumentValidation {
                name: self.name.clone(),
                message: e.to_string(),
            }
        })?;

        let output = (self.handler)(args).map_err(|message| ToolError::ToolExecution {
            name: self.name.clone(),
            message,
        })?;

        let data = serde_json::to_value(&output)?;
        let content = match &data {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };

        Ok(ToolResult::success(call.id, content).with_data(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Greeting {
        name: String,
    }

    fn greeter() -> FunctionTool<Greeting, String> {
        FunctionTool::new(
            "saludar",
            "Saluda a alguien por su nombre.",
            json!({
                "type": "object",
                "properties": {"name": {"type": "string"}},
                "required": ["name"]
            }),
            |args: Greeting| {
                if args.name.is_empty() {
                    Err("name cannot be empty".to_string())
                } else {
                    Ok(format!("Hola, {}", args.name))
                }
            },
        )
    }

    #[tokio::test]
    async fn test_string_output_is_unquoted() {
        let result = greeter()
            .execute(ToolCall::with_id("c1", "saludar", json!({"name": "Ana"})))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.content, "Hola, Ana");
        assert_eq!(result.tool_call_id, "c1");
    }

    #[tokio::test]
    async fn test_handler_error_is_execution_error() {
        let err = greeter()
            .execute(ToolCall::new("saludar", json!({"name": ""})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Tool(ToolError::ToolExecution { .. })));
    }

    #[tokio::test]
    async fn test_undecodable_arguments() {
        let err = greeter()
            .execute(ToolCall::new("saludar", json!({"nombre": "Ana"})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Tool(ToolError::ArgumentValidation { .. })));
    }
}
