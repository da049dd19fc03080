//! Tool registry for managing available tools

use crate::error::{Result, ToolError};
use crate::llm::{FunctionDefinition, ToolDefinition};
use crate::tools::Tool;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Registry of named tools.
///
/// Populated once at startup and read-only afterwards; the executor and the
/// model-facing tool disclosure both look tools up here by name.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty tool registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in tools
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for tool in crate::tools::builtin::builtin_tools() {
            // Built-in names are distinct, so this cannot collide.
            let _ = registry.register_arc(tool);
        }
        registry
    }

    /// Register a tool, failing if the name is already taken
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<()> {
        self.register_arc(Arc::new(tool))
    }

    /// Register a shared tool, failing if the name is already taken
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::DuplicateTool { name }.into());
        }
        tracing::debug!("Registered tool: {}", name);
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Look up a tool by name
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Tool>> {
        self.tools.get(name).cloned().ok_or_else(|| {
            ToolError::UnknownTool {
                name: name.to_string(),
            }
            .into()
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// List all registered tool names, sorted
    pub fn list_tools(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Get name and description of a tool
    pub fn get_tool_info(&self, name: &str) -> Option<(&str, &str)> {
        self.tools
            .get(name)
            .map(|tool| (tool.name(), tool.description()))
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Build a registry restricted to the given tool names
    pub fn select(&self, names: &[String]) -> Result<ToolRegistry> {
        let mut selected = ToolRegistry::new();
        for name in names {
            selected.register_arc(self.resolve(name)?)?;
        }
        Ok(selected)
    }

    /// Get tool definitions for LLM function calling
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|tool| ToolDefinition {
                tool_type: "function".to_string(),
                function: FunctionDefinition {
                    name: tool.name().to_string(),
                    description: tool.description().to_string(),
                    parameters: tool.parameters_schema(),
                },
            })
            .collect()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.list_tools())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::tools::builtin::SumTool;

    #[test]
    fn test_builtin_registry_has_sum() {
        let registry = ToolRegistry::with_builtins();
        assert_eq!(registry.list_tools(), vec!["sumar"]);

        let (name, description) = registry.get_tool_info("sumar").unwrap();
        assert_eq!(name, "sumar");
        assert!(!description.is_empty());
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = ToolRegistry::new();
        registry.register(SumTool::new()).unwrap();

        let err = registry.register(SumTool::new()).unwrap_err();
        assert!(matches!(
            err,
            Error::Tool(ToolError::DuplicateTool { ref name }) if name == "sumar"
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_resolve_unknown_tool() {
        let registry = ToolRegistry::with_builtins();
        let err = registry.resolve("restar").err().unwrap();
        assert!(matches!(
            err,
            Error::Tool(ToolError::UnknownTool { ref name }) if name == "restar"
        ));
    }

    #[test]
    fn test_select_subset() {
        let registry = ToolRegistry::with_builtins();
        let selected = registry.select(&["sumar".to_string()]).unwrap();
        assert!(selected.contains("sumar"));

        assert!(registry.select(&["bash".to_string()]).is_err());
        assert!(registry.select(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_definitions_expose_schema() {
        let registry = ToolRegistry::with_builtins();
        let definitions = registry.definitions();
        assert_eq!(definitions.len(), 1);

        let definition = &definitions[0];
        assert_eq!(definition.tool_type, "function");
        assert_eq!(definition.function.name, "sumar");
        assert_eq!(definition.function.parameters["type"], "object");
        assert_eq!(definition.function.parameters["required"][0], "a");
    }
}
