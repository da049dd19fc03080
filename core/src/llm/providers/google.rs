//! Google Gemini client (generateContent REST API)

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
use serde_json::{json, Value};
use std::collections::HashMap;

/// Gemini client
pub struct GoogleClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    params: ModelParams,
    headers: HashMap<String, String>,
}

impl GoogleClient {
    pub fn new(config: &ResolvedLlmConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(LlmError::Authentication {
                message: "No API key found for Google AI".to_string(),
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
    ) -> GeminiRequest {
        let options = options.unwrap_or_default().or_params(&self.params);

        let mut system_parts = Vec::new();
        let mut contents: Vec<Content> = Vec::new();
        // functionResponse parts are matched by name, not by call id.
        let mut call_names: HashMap<String, String> = HashMap::new();

        for message in messages {
            let (role, parts) = match message.role {
                MessageRole::System => {
                    system_parts.push(Part::text(message.content));
                    continue;
                }
                MessageRole::User => ("user", vec![Part::text(message.content)]),
                MessageRole::Assistant => {
                    let mut parts = Vec::new();
                    if !message.content.is_empty() {
                        parts.push(Part::text(message.content));
                    }
                    for call in message.tool_calls {
                        call_names.insert(call.id.clone(), call.name.clone());
                        parts.push(Part {
                            function_call: Some(FunctionCall {
                                name: call.name,
                                args: call.arguments,
                            }),
                            ..Default::default()
                        });
                    }
                    ("model", parts)
                }
                MessageRole::Tool => {
                    let id = message.tool_call_id.unwrap_or_default();
                    let name = call_names.get(&id).cloned().unwrap_or(id);
                    let response = if message.is_error {
                        json!({ "error": message.content })
                    } else {
                        json!({ "result": message.content })
                    };
                    (
                        "user",
                        vec![Part {
                            function_response: Some(FunctionResponse { name, response }),
                            ..Default::default()
                        }],
                    )
                }
            };

            match contents.last_mut() {
                Some(last) if last.role == role => last.parts.extend(parts),
                _ => contents.push(Content {
                    role: role.to_string(),
                    parts,
                }),
            }
        }

        let tools = tools.filter(|t| !t.is_empty()).map(|t| {
            vec![GeminiTool {
                function_declarations: t
                    .into_iter()
                    .map(|tool| FunctionDeclaration {
                        name: tool.function.name,
                        description: tool.function.description,
                        parameters: to_gemini_schema(tool.function.parameters),
                    })
                    .collect(),
            }]
        });

        GeminiRequest {
            contents,
            system_instruction: if system_parts.is_empty() {
                None
            } else {
                Some(SystemInstruction {
                    parts: system_parts,
                })
            },
            tools,
            generation_config: GenerationConfig {
                temperature: options.temperature,
                max_output_tokens: options.max_tokens,
                top_p: options.top_p,
                stop_sequences: options.stop,
            },
        }
    }

    fn convert_response(&self, response: GeminiResponse) -> Result<LlmResponse> {
        let candidate = response.candidates.into_iter().next().ok_or_else(|| {
            LlmError::ModelResponseInvalid {
                message: "No candidates in response".to_string(),
            }
        })?;

        let mut text_parts = Vec::new();
        let mut tool_calls = Vec::new();
        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if let Some(text) = part.text {
                text_parts.push(text);
            }
            if let Some(call) = part.function_call {
                // Gemini does not assign call ids.
                tool_calls.push(ToolCall::new(call.name, call.args));
            }
        }

        let finish_reason = candidate.finish_reason.map(|reason| match reason.as_str() {
            "STOP" if !tool_calls.is_empty() => FinishReason::ToolCalls,
            "STOP" => FinishReason::Stop,
            "MAX_TOKENS" => FinishReason::Length,
            "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" => {
                FinishReason::ContentFilter
            }
            _ => FinishReason::Other(reason),
        });

        let usage = response.usage_metadata.map(|u| Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        });

        Ok(LlmResponse {
            message: LlmMessage::assistant_with_tool_calls(text_parts.concat(), tool_calls),
            usage,
            model: response.model_version.unwrap_or_else(|| self.model.clone()),
            finish_reason,
        })
    }
}

/// Rewrite a JSON Schema into the subset Gemini accepts.
///
/// Gemini rejects `additionalProperties` and `$schema` keywords anywhere in a
/// function declaration.
fn to_gemini_schema(schema: Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(key, _)| key != "additionalProperties" && key != "$schema")
                .map(|(key, value)| (key, to_gemini_schema(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(to_gemini_schema).collect()),
        other => other,
    }
}

#[async_trait]
impl LlmClient for GoogleClient {
    async fn chat_completion(
        &self,
        messages: Vec<LlmMessage>,
        tools: Option<Vec<ToolDefinition>>,
        options: Option<ChatOptions>,
    ) -> Result<LlmResponse> {
        let request = self.build_request(messages, tools, options);

        let mut builder = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json");
        for (key, value) in &self.headers {
            builder = builder.header(key, value);
        }

        let response = builder.json(&request).send().await.map_err(|e| {
            tracing::error!("Gemini request failed: {}", e);
            transport_error(e)
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Gemini API returned {}: {}", status, error_text);
            return Err(status_error(status, error_text).into());
        }

        let body = response.text().await.map_err(transport_error)?;
        let gemini_response: GeminiResponse =
            serde_json::from_str(&body).map_err(|e| LlmError::ModelResponseInvalid {
                message: format!("Failed to parse response: {}", e),
            })?;

        self.convert_response(gemini_response)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        "google_ai"
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

impl Part {
    fn text(text: String) -> Self {
        Self {
            text: Some(text),
            ..Default::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Protocol;

    fn client() -> GoogleClient {
        let config = ResolvedLlmConfig::new(
            Protocol::GoogleAI,
            "https://generativelanguage.googleapis.com/v1beta".to_string(),
            "key".to_string(),
            "gemini-2.0-flash-001".to_string(),
        )
        .with_params(ModelParams {
            temperature: Some(0.0),
            ..Default::default()
        });
        GoogleClient::new(&config).unwrap()
    }

    #[test]
    fn test_function_response_uses_call_name() {
        let definitions = vec![ToolDefinition {
            tool_type: "function".to_string(),
            function: crate::llm::FunctionDefinition {
                name: "sumar".to_string(),
                description: "Suma dos enteros.".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {"a": {"type": "integer"}, "b": {"type": "integer"}},
                    "required": ["a", "b"],
                    "additionalProperties": false
                }),
            },
        }];

        let request = client().build_request(
            vec![
                LlmMessage::system("Eres un asistente."),
                LlmMessage::user("Suma 2 y 3"),
                LlmMessage::assistant_with_tool_calls(
                    "",
                    vec![ToolCall::with_id("c1", "sumar", json!({"a": 2, "b": 3}))],
                ),
                LlmMessage::tool_result("c1", "5"),
            ],
            Some(definitions),
            None,
        );

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Eres un asistente.");
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["contents"][1]["parts"][0]["functionCall"]["name"], "sumar");
        assert_eq!(
            body["contents"][2]["parts"][0]["functionResponse"],
            json!({"name": "sumar", "response": {"result": "5"}})
        );
        assert_eq!(body["generationConfig"]["temperature"], 0.0);

        let parameters = &body["tools"][0]["functionDeclarations"][0]["parameters"];
        assert!(parameters.get("additionalProperties").is_none());
        assert_eq!(parameters["required"], json!(["a", "b"]));
    }

    #[test]
    fn test_function_call_response_gets_generated_id() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{"functionCall": {"name": "sumar", "args": {"a": 2, "b": 3}}}]
                },
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 30, "candidatesTokenCount": 4, "totalTokenCount": 34},
            "modelVersion": "gemini-2.0-flash-001"
        }))
        .unwrap();

        let converted = client().convert_response(response).unwrap();
        assert_eq!(converted.finish_reason, Some(FinishReason::ToolCalls));
        let call = &converted.message.tool_calls[0];
        assert_eq!(call.name, "sumar");
        assert!(!call.id.is_empty());
        assert_eq!(converted.usage.unwrap().total_tokens, 34);
    }

    #[test]
    fn test_no_candidates_is_invalid() {
        let response: GeminiResponse =
            serde_json::from_value(json!({"promptFeedback": {"blockReason": "SAFETY"}})).unwrap();
        let err = client().convert_response(response).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Llm(LlmError::ModelResponseInvalid { .. })
        ));
    }

    #[test]
    fn test_schema_strips_nested_additional_properties() {
        let schema = to_gemini_schema(json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "type": "object",
            "properties": {
                "point": {"type": "object", "additionalProperties": false}
            },
            "additionalProperties": false
        }));
        assert_eq!(
            schema,
            json!({"type": "object", "properties": {"point": {"type": "object"}}})
        );
    }
}
