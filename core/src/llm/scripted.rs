//! Deterministic LLM client that replays canned replies

use crate::error::{LlmError, Result};
use crate::llm::{ChatOptions, LlmClient, LlmMessage, LlmResponse, ToolDefinition, FinishReason};
use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::sync::Mutex;

/// One canned outcome of a model invocation
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Return this assistant message
    Message(LlmMessage),
    /// Fail with a retryable transport error
    Unavailable(String),
    /// Fail with an unparseable-response error
    Invalid(String),
}

/// A request as seen by the scripted client
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<LlmMessage>,
    pub tools: Vec<ToolDefinition>,
}

/// Replays replies in order. Once the script runs out, the last reply is
/// repeated if `repeat_last` is set, otherwise every call fails as unavailable.
pub struct ScriptedLlmClient {
    replies: Mutex<VecDeque<ScriptedReply>>,
    last: Mutex<Option<ScriptedReply>>,
    requests: Mutex<Vec<RecordedRequest>>,
    repeat_last: bool,
}

impl ScriptedLlmClient {
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            last: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            repeat_last: false,
        }
    }

    /// Build a client that only ever returns assistant messages
    pub fn from_messages(messages: Vec<LlmMessage>) -> Self {
        Self::new(messages.into_iter().map(ScriptedReply::Message).collect())
    }

    /// Keep returning the final scripted reply once the script is exhausted
    pub fn repeating(mut self) -> Self {
        self.repeat_last = true;
        self
    }

    /// Requests received so far, oldest first
    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    async fn next_reply(&self) -> Option<ScriptedReply> {
        let next = self.replies.lock().await.pop_front();
        let mut last = self.last.lock().await;
        match next {
            Some(reply) => {
                *last = Some(reply.clone());
                Some(reply)
            }
            None if self.repeat_last => last.clone(),
            None => None,
        }
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn chat_completion(
        &self,
        messages: Vec<LlmMessage>,
        tools: Option<Vec<ToolDefinition>>,
        _options: Option<ChatOptions>,
    ) -> Result<LlmResponse> {
        self.requests.lock().await.push(RecordedRequest {
            messages,
            tools: tools.unwrap_or_default(),
        });

        match self.next_reply().await {
            Some(ScriptedReply::Message(message)) => {
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
            Some(ScriptedReply::Unavailable(message)) => {
                Err(LlmError::ModelUnavailable { message }.into())
            }
            Some(ScriptedReply::Invalid(message)) => {
                Err(LlmError::ModelResponseInvalid { message }.into())
            }
            None => Err(LlmError::ModelUnavailable {
                message: "script exhausted".to_string(),
            }
            .into()),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }
}
