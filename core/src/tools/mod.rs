//! Tool system and built-in tools

pub mod base;
pub mod builtin;
pub mod executor;
pub mod function;
pub mod registry;
pub mod validation;

pub use base::{Tool, ToolCall, ToolExample, ToolResult};
pub use executor::ToolExecutor;
pub use function::FunctionTool;
pub use registry::ToolRegistry;
pub use validation::validate_arguments;
