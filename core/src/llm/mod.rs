//! LLM client abstractions and implementations

pub mod client;
pub mod log;
pub mod message;
pub mod providers;
pub mod scripted;

pub use client::{ChatOptions, FinishReason, FunctionDefinition, LlmClient, LlmResponse, ToolDefinition, Usage};
pub use log::MessageLog;
pub use message::{LlmMessage, MessageRole};
pub use providers::*;
pub use scripted::{ScriptedLlmClient, ScriptedReply};
