//! Rule-based model used by `--offline`
//!
//! Recognises requests to add two integers and answers them through the
//! `sumar` tool, so the whole loop can be exercised without network access.

use async_trait::async_trait;
use toolloop_core::error::Result;
use toolloop_core::llm::{
    ChatOptions, FinishReason, LlmClient, LlmMessage, LlmResponse, MessageRole, ToolDefinition,
};
use toolloop_core::ToolCall;

const SUM_TOOL: &str = "sumar";
const SUM_WORDS: &[&str] = &["suma", "sumar", "sum", "add", "plus", "más", "mas", "+"];
const GREETING: &str =
    "¡Hola! Puedo sumar dos enteros por ti. Prueba con algo como \"Suma 2 y 3\".";

#[derive(Debug, Default)]
pub struct OfflineLlmClient;

impl OfflineLlmClient {
    pub fn new() -> Self {
        Self
    }

    fn reply_to(messages: &[LlmMessage], tools: &[ToolDefinition]) -> LlmMessage {
        let Some(last) = messages.last() else {
            return LlmMessage::assistant(GREETING);
        };

        match last.role {
            MessageRole::Tool if last.is_error => {
                LlmMessage::assistant(format!("No pude calcularlo: {}", last.content))
            }
            MessageRole::Tool => LlmMessage::assistant(format!("El resultado es {}.", last.content)),
            MessageRole::User => {
                let can_sum = tools.iter().any(|t| t.function.name == SUM_TOOL);
                match sum_request(&last.content) {
                    Some((a, b)) if can_sum => LlmMessage::assistant_with_tool_calls(
                        "",
                        vec![ToolCall::new(SUM_TOOL, serde_json::json!({"a": a, "b": b}))],
                    ),
                    _ => LlmMessage::assistant(GREETING),
                }
            }
            _ => LlmMessage::assistant(GREETING),
        }
    }
}

/// Extract the two operands of an addition request, if the text is one
fn sum_request(text: &str) -> Option<(i64, i64)> {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | '?' | '¿' | '!' | '¡' | '.'))
        .filter(|w| !w.is_empty())
        .collect();

    if !words.iter().any(|w| SUM_WORDS.contains(w)) && !lower.contains('+') {
        return None;
    }

    let numbers: Vec<i64> = lower
        .split(|c: char| !(c.is_ascii_digit() || c == '-'))
        .filter_map(|token| token.parse().ok())
        .collect();

    match numbers.as_slice() {
        [a, b] => Some((*a, *b)),
        _ => None,
    }
}

#[async_trait]
impl LlmClient for OfflineLlmClient {
    async fn chat_completion(
        &self,
        messages: Vec<LlmMessage>,
        tools: Option<Vec<ToolDefinition>>,
        _options: Option<ChatOptions>,
    ) -> Result<LlmResponse> {
        let message = Self::reply_to(&messages, tools.as_deref().unwrap_or_default());
        let finish_reason = if message.has_tool_calls() {
            FinishReason::ToolCalls
        } else {
            FinishReason::Stop
        };

        Ok(LlmResponse {
            message,
            usage: None,
            model: self.model_name().to_string(),
            finish_reason: Some(finish_reason),
        })
    }

    fn model_name(&self) -> &str {
        "offline"
    }

    fn provider_name(&self) -> &str {
        "offline"
    }
}
