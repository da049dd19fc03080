//! Anthropic Claude client implementation

use super::{status_error, transport_error};
use crate::config::{ModelParams, ResolvedLlmConfig};
use crate::error::{LlmError, Result};
use crate::llm::{
    ChatOptions, FinishReason, LlmClient, LlmMessage, LlmResponse, MessageRole, ToolDefinition,
    Usage,
};
use crate::tools::ToolCall;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Anthropic Claude client
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    params: ModelParams,
    headers: HashMap<String, String>,
}

impl AnthropicClient {
    /// Create a new Anthropic client
    pub fn new(config: &ResolvedLlmConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(LlmError::Authentication {
                message: "No API key found for Anthropic".to_string(),
            }
            .into());
        }

        Ok(Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            params: config.params.clone(),
            headers: config.headers.clone(),
        })
    }

    fn build_request(
        &self,
        messages: Vec<LlmMessage>,
        tools: Option<Vec<ToolDefinition>>,
        options: Option<ChatOptions>,
    ) -> AnthropicRequest {
        let options = options.unwrap_or_default().or_params(&self.params);

        let mut system_parts = Vec::new();
        let mut conversation: Vec<AnthropicMessage> = Vec::new();

        for message in messages {
            let (role, blocks) = match message.role {
                MessageRole::System => {
                    if let Some(text) = message.get_text() {
                        system_parts.push(text.to_string());
                    }
                    continue;
                }
                MessageRole::User => ("user", vec![ContentBlock::Text { text: message.content }]),
                MessageRole::Assistant => {
                    let mut blocks = Vec::new();
                    if !message.content.is_empty() {
                        blocks.push(ContentBlock::Text {
                            text: message.content,
                        });
                    }
                    for call in message.tool_calls {
                        blocks.push(ContentBlock::ToolUse {
                            id: call.id,
                            name: call.name,
                            input: call.arguments,
                        });
                    }
                    ("assistant", blocks)
                }
                MessageRole::Tool => (
                    "user",
                    vec![ContentBlock::ToolResult {
                        tool_use_id: message.tool_call_id.unwrap_or_default(),
                        content: message.content,
                        is_error: message.is_error,
                    }],
                ),
            };

            // The Messages API requires alternating roles, so consecutive
            // same-role entries (e.g. several tool results) share one message.
            match conversation.last_mut() {
                Some(last) if last.role == role => last.content.extend(blocks),
                _ => conversation.push(AnthropicMessage {
                    role,
                    content: blocks,
                }),
            }
        }

        AnthropicRequest {
            model: self.model.clone(),
            max_tokens: options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: options.temperature,
            top_p: options.top_p,
            system: if system_parts.is_empty() {
                None
            } else {
                Some(system_parts.join("\n\n"))
            },
            messages: conversation,
            tools: tools.filter(|t| !t.is_empty()).map(|t| {
                t.into_iter()
                    .map(|tool| AnthropicTool {
                        name: tool.function.name,
                        description: tool.function.description,
                        input_schema: tool.function.parameters,
                    })
                    .collect()
            }),
            stop_sequences: options.stop,
        }
    }

    fn convert_response(response: AnthropicResponse) -> LlmResponse {
        let mut text_parts = Vec::new();
        let mut tool_calls = Vec::new();

        for block in response.content {
            match block {
                ResponseBlock::Text { text } => text_parts.push(text),
                ResponseBlock::ToolUse { id, name, input } => {
                    tool_calls.push(ToolCall::with_id(id, name, input))
                }
                ResponseBlock::Other => {}
            }
        }

        let message = LlmMessage::assistant_with_tool_calls(text_parts.join("\n"), tool_calls);

        let usage = response.usage.map(|u| Usage {
            prompt_tokens: u.input_tokens,
            completion_tokens: u.output_tokens,
            total_tokens: u.input_tokens + u.output_tokens,
        });

        let finish_reason = response.stop_reason.map(|reason| match reason.as_str() {
            "end_turn" | "stop_sequence" => FinishReason::Stop,
            "max_tokens" => FinishReason::Length,
            "tool_use" => FinishReason::ToolCalls,
            _ => FinishReason::Other(reason),
        });

        LlmResponse {
            message,
            usage,
            model: response.model,
            finish_reason,
        }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn chat_completion(
        &self,
        messages: Vec<LlmMessage>,
        tools: Option<Vec<ToolDefinition>>,
        options: Option<ChatOptions>,
    ) -> Result<LlmResponse> {
        let request = self.build_request(messages, tools, options);

        let mut builder = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json");
        for (key, value) in &self.headers {
            builder = builder.header(key, value);
        }

        let response = builder.json(&request).send().await.map_err(|e| {
            tracing::error!("Anthropic request failed: {}", e);
            transport_error(e)
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Anthropic API returned {}: {}", status, error_text);
            return Err(status_error(status, error_text).into());
        }

        let body = response.text().await.map_err(transport_error)?;
        let anthropic_response: AnthropicResponse =
            serde_json::from_str(&body).map_err(|e| LlmError::ModelResponseInvalid {
                message: format!("Failed to parse response: {}", e),
            })?;

        Ok(Self::convert_response(anthropic_response))
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<AnthropicTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    model: String,
    content: Vec<ResponseBlock>,
    stop_reason: Option<String>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}
