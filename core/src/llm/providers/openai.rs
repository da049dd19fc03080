//! OpenAI client implementation using async-openai library

use crate::config::ResolvedLlmConfig;
use crate::error::{LlmError, Result};
use crate::llm::{
    ChatOptions, FinishReason, LlmClient, LlmMessage, LlmResponse, MessageRole, ToolDefinition,
    Usage,
};
use crate::tools::ToolCall;
use async_openai::{
    config::{AzureConfig, Config, OpenAIConfig},
    error::OpenAIError,
    types::{
        ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessage,
        ChatCompletionRequestAssistantMessageContent, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessage, ChatCompletionRequestToolMessage,
        ChatCompletionRequestToolMessageContent, ChatCompletionRequestUserMessage,
        ChatCompletionTool, ChatCompletionToolType, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse, FunctionObject,
    },
    Client,
};
use async_trait::async_trait;
use serde_json::Value;

/// Azure OpenAI REST API version sent with every request
const AZURE_API_VERSION: &str = "2024-06-01";

/// OpenAI-compatible client using async-openai library.
///
/// Generic over the async-openai backend config so that plain OpenAI
/// endpoints and Azure deployments share one conversion path.
pub struct OpenAiClient<C: Config = OpenAIConfig> {
    client: Client<C>,
    model: String,
    provider: &'static str,
}

impl OpenAiClient<OpenAIConfig> {
    /// Create a new OpenAI client from resolved LLM config
    pub fn new(config: &ResolvedLlmConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(LlmError::Authentication {
                message: "No API key found for OpenAI".to_string(),
            }
            .into());
        }

        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.api_key)
            .with_api_base(config.base_url.trim_end_matches('/'));

        Ok(Self {
            client: Client::with_config(openai_config),
            model: config.model.clone(),
            provider: "openai",
        })
    }
}

impl OpenAiClient<AzureConfig> {
    /// Create a client for an Azure OpenAI deployment.
    ///
    /// The configured model name doubles as the deployment id.
    pub fn azure(config: &ResolvedLlmConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(LlmError::Authentication {
                message: "No API key found for Azure OpenAI".to_string(),
            }
            .into());
        }

        let azure_config = AzureConfig::new()
            .with_api_base(config.base_url.trim_end_matches('/'))
            .with_api_key(&config.api_key)
            .with_deployment_id(&config.model)
            .with_api_version(AZURE_API_VERSION);

        Ok(Self {
            client: Client::with_config(azure_config),
            model: config.model.clone(),
            provider: "azure_openai",
        })
    }
}

impl<C: Config> OpenAiClient<C> {
    /// Convert our internal message format to async-openai format
    fn convert_messages(messages: Vec<LlmMessage>) -> Result<Vec<ChatCompletionRequestMessage>> {
        let mut converted = Vec::with_capacity(messages.len());

        for message in messages {
            match message.role {
                MessageRole::System => {
                    converted.push(ChatCompletionRequestMessage::System(
                        ChatCompletionRequestSystemMessage {
                            content: message.content.into(),
                            name: None,
                        },
                    ));
                }
                MessageRole::User => {
                    converted.push(ChatCompletionRequestMessage::User(
                        ChatCompletionRequestUserMessage {
                            content: message.content.into(),
                            name: None,
                        },
                    ));
                }
                MessageRole::Assistant => {
                    let tool_calls: Vec<ChatCompletionMessageToolCall> = message
                        .tool_calls
                        .iter()
                        .map(|call| ChatCompletionMessageToolCall {
                            id: call.id.clone(),
                            r#type: ChatCompletionToolType::Function,
                            function: async_openai::types::FunctionCall {
                                name: call.name.clone(),
                                arguments: call.arguments.to_string(),
                            },
                        })
                        .collect();

                    converted.push(ChatCompletionRequestMessage::Assistant(
                        ChatCompletionRequestAssistantMessage {
                            content: if message.content.is_empty() {
                                None
                            } else {
                                Some(ChatCompletionRequestAssistantMessageContent::Text(
                                    message.content,
                                ))
                            },
                            tool_calls: if tool_calls.is_empty() {
                                None
                            } else {
                                Some(tool_calls)
                            },
                            ..Default::default()
                        },
                    ));
                }
                MessageRole::Tool => {
                    let tool_call_id =
                        message.tool_call_id.ok_or_else(|| LlmError::InvalidRequest {
                            message: "Tool message must reference a tool call".to_string(),
                        })?;
                    converted.push(ChatCompletionRequestMessage::Tool(
                        ChatCompletionRequestToolMessage {
                            content: ChatCompletionRequestToolMessageContent::Text(
                                message.content,
                            ),
                            tool_call_id,
                        },
                    ));
                }
            }
        }

        Ok(converted)
    }

    /// Convert our tool definitions to async-openai format
    fn convert_tools(tools: Vec<ToolDefinition>) -> Vec<ChatCompletionTool> {
        tools
            .into_iter()
            .map(|tool| ChatCompletionTool {
                r#type: ChatCompletionToolType::Function,
                function: FunctionObject {
                    name: tool.function.name,
                    description: Some(tool.function.description),
                    parameters: Some(tool.function.parameters),
                    strict: None,
                },
            })
            .collect()
    }

    /// Convert async-openai response to our internal format
    fn convert_response(response: CreateChatCompletionResponse) -> Result<LlmResponse> {
        let choice = response.choices.into_iter().next().ok_or_else(|| {
            LlmError::ModelResponseInvalid {
                message: "No choices in response".to_string(),
            }
        })?;

        let tool_calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tool_call| {
                ToolCall::with_id(
                    tool_call.id,
                    tool_call.function.name,
                    parse_arguments(&tool_call.function.arguments),
                )
            })
            .collect();

        let content = choice.message.content.unwrap_or_default();
        let message = if tool_calls.is_empty() {
            LlmMessage::assistant(content)
        } else {
            LlmMessage::assistant_with_tool_calls(content, tool_calls)
        };

        let usage = response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        let finish_reason = choice.finish_reason.map(|reason| match reason {
            async_openai::types::FinishReason::Stop => FinishReason::Stop,
            async_openai::types::FinishReason::Length => FinishReason::Length,
            async_openai::types::FinishReason::ToolCalls => FinishReason::ToolCalls,
            async_openai::types::FinishReason::ContentFilter => FinishReason::ContentFilter,
            async_openai::types::FinishReason::FunctionCall => FinishReason::ToolCalls,
        });

        Ok(LlmResponse {
            message,
            usage,
            model: response.model,
            finish_reason,
        })
    }
}

/// Decode a tool call's argument string.
///
/// Text that is not JSON is kept verbatim as a string value so that argument
/// validation reports it instead of the whole response being discarded.
fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Classify an async-openai failure
fn map_openai_error(error: OpenAIError) -> LlmError {
    match error {
        OpenAIError::ApiError(api) => {
            let code = api.code.as_deref().unwrap_or_default();
            if code == "invalid_api_key" || api.r#type.as_deref() == Some("authentication_error") {
                LlmError::Authentication {
                    message: api.message,
                }
            } else if api.r#type.as_deref() == Some("invalid_request_error") {
                LlmError::InvalidRequest {
                    message: api.message,
                }
            } else {
                LlmError::ModelUnavailable {
                    message: api.message,
                }
            }
        }
        invalid @ OpenAIError::JSONDeserialize(..) => LlmError::ModelResponseInvalid {
            message: invalid.to_string(),
        },
        OpenAIError::InvalidArgument(message) => LlmError::InvalidRequest { message },
        other => LlmError::ModelUnavailable {
            message: other.to_string(),
        },
    }
}

#[async_trait]
impl<C> LlmClient for OpenAiClient<C>
where
    C: Config + Send + Sync + 'static,
{
    async fn chat_completion(
        &self,
        messages: Vec<LlmMessage>,
        tools: Option<Vec<ToolDefinition>>,
        options: Option<ChatOptions>,
    ) -> Result<LlmResponse> {
        let converted_messages = Self::convert_messages(messages)?;

        let mut request_builder = CreateChatCompletionRequestArgs::default();
        request_builder.model(&self.model);
        request_builder.messages(converted_messages);

        if let Some(tools) = tools.filter(|t| !t.is_empty()) {
            tracing::debug!("OpenAI request with {} tools enabled", tools.len());
            request_builder.tools(Self::convert_tools(tools));
        }

        if let Some(opts) = options {
            if let Some(max_tokens) = opts.max_tokens {
                request_builder.max_tokens(max_tokens);
            }
            if let Some(temperature) = opts.temperature {
                request_builder.temperature(temperature);
            }
            if let Some(top_p) = opts.top_p {
                request_builder.top_p(top_p);
            }
        }

        let request = request_builder.build().map_err(|e| {
            tracing::error!("Failed to build OpenAI request: {}", e);
            LlmError::InvalidRequest {
                message: format!("Failed to build request: {}", e),
            }
        })?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            tracing::error!("OpenAI API call failed: {}", e);
            map_openai_error(e)
        })?;

        let response = Self::convert_response(response)?;
        if response.message.has_tool_calls() {
            tracing::debug!(
                "OpenAI response contains {} tool calls",
                response.message.tool_calls.len()
            );
            for call in &response.message.tool_calls {
                tracing::debug!("Tool call: {} (id: {})", call.name, call.id);
            }
        }

        Ok(response)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        self.provider
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_arguments() {
        assert_eq!(parse_arguments(r#"{"a": 2, "b": 3}"#), json!({"a": 2, "b": 3}));
        assert_eq!(parse_arguments(""), json!({}));
        assert_eq!(parse_arguments("a=2"), json!("a=2"));
    }

    #[test]
    fn test_convert_response_with_tool_calls() {
        let response: CreateChatCompletionResponse = serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1,
            "model": "gpt-4o",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {"name": "sumar", "arguments": "{\"a\":2,\"b\":3}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 20, "completion_tokens": 5, "total_tokens": 25}
        }))
        .unwrap();

        let converted = OpenAiClient::<OpenAIConfig>::convert_response(response).unwrap();
        assert_eq!(converted.finish_reason, Some(FinishReason::ToolCalls));
        assert_eq!(converted.message.tool_calls.len(), 1);

        let call = &converted.message.tool_calls[0];
        assert_eq!(call.id, "call_abc");
        assert_eq!(call.name, "sumar");
        assert_eq!(call.arguments, json!({"a": 2, "b": 3}));
        assert_eq!(converted.usage.unwrap().total_tokens, 25);
    }

    #[test]
    fn test_empty_choices_is_invalid_response() {
        let response: CreateChatCompletionResponse = serde_json::from_value(json!({
            "id": "chatcmpl-2",
            "object": "chat.completion",
            "created": 1,
            "model": "gpt-4o",
            "choices": []
        }))
        .unwrap();

        let err = OpenAiClient::<OpenAIConfig>::convert_response(response).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Llm(LlmError::ModelResponseInvalid { .. })
        ));
    }

    #[test]
    fn test_tool_message_requires_call_id() {
        let mut orphan = LlmMessage::tool_result("call_1", "5");
        orphan.tool_call_id = None;
        assert!(OpenAiClient::<OpenAIConfig>::convert_messages(vec![orphan]).is_err());

        let converted = OpenAiClient::<OpenAIConfig>::convert_messages(vec![
            LlmMessage::system("Eres un asistente."),
            LlmMessage::user("Suma 2 y 3"),
            LlmMessage::assistant_with_tool_calls(
                "",
                vec![ToolCall::with_id("call_1", "sumar", json!({"a": 2, "b": 3}))],
            ),
            LlmMessage::tool_result("call_1", "5"),
        ])
        .unwrap();
        assert_eq!(converted.len(), 4);
        assert!(matches!(
            &converted[2],
            ChatCompletionRequestMessage::Assistant(m) if m.content.is_none()
        ));
    }

    #[test]
    fn test_missing_key_is_rejected() {
        let config = ResolvedLlmConfig::new(
            crate::config::Protocol::OpenAICompat,
            "https://api.openai.com/v1".to_string(),
            String::new(),
            "gpt-4o".to_string(),
        );
        assert!(OpenAiClient::new(&config).is_err());
    }
}
