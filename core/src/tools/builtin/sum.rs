//! Integer addition tool

use crate::error::{Result, ToolError};
use crate::tools::{Tool, ToolCall, ToolExample, ToolResult};
use async_trait::async_trait;
use serde_json::json;

/// Adds two integers. Exposed to the model as `sumar`.
pub struct SumTool;

impl SumTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SumTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for SumTool {
    fn name(&self) -> &str {
        "sumar"
    }

    fn description(&self) -> &str {
        "Suma dos enteros.\n\nArgs:\n    a: Primer entero\n    b: Segundo entero"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "a": {
                    "type": "integer",
                    "description": "Primer entero"
                },
                "b": {
                    "type": "integer",
                    "description": "Segundo entero"
                }
            },
            "required": ["a", "b"]
        })
    }

    async fn execute(&self, call: ToolCall) -> Result<ToolResult> {
        let a: i64 = call.get_argument("a")?;
        let b: i64 = call.get_argument("b")?;

        let sum = a.checked_add(b).ok_or_else(|| ToolError::ToolExecution {
            name: self.name().to_string(),
            message: format!("{} + {} overflows a 64-bit integer", a, b),
        })?;

        Ok(ToolResult::success(call.id, sum.to_string()).with_data(json!(sum)))
    }

    fn examples(&self) -> Vec<ToolExample> {
        vec![
            ToolExample {
                description: "Add two positive integers".to_string(),
                arguments: json!({"a": 2, "b": 3}),
                expected_result: "5".to_string(),
            },
            ToolExample {
                description: "Add a negative integer".to_string(),
                arguments: json!({"a": 10, "b": -4}),
                expected_result: "6".to_string(),
            },
        ]
    }
}
