//! Append-only conversation log

use crate::error::{Result, SessionError};
use crate::llm::{LlmMessage, MessageRole};
use crate::tools::ToolCall;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Ordered, append-only sequence of conversation messages.
///
/// Every tool-result message must answer a tool call issued by an earlier
/// assistant message in the same log. Appends that would break this are
/// rejected as a whole, leaving the log untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageLog {
    messages: Vec<LlmMessage>,
}

impl MessageLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a log from previously stored messages, re-checking the invariant
    pub fn from_messages(messages: Vec<LlmMessage>) -> Result<Self> {
        let mut log = Self::new();
        log.extend(messages)?;
        Ok(log)
    }

    /// Append a single message
    pub fn push(&mut self, message: LlmMessage) -> Result<()> {
        self.extend(std::iter::once(message))
    }

    /// Append several messages atomically
    pub fn extend<I>(&mut self, messages: I) -> Result<()>
    where
        I: IntoIterator<Item = LlmMessage>,
    {
        let pending: Vec<LlmMessage> = messages.into_iter().collect();
        self.check_append(&pending)?;
        self.messages.extend(pending);
        Ok(())
    }

    /// Check that `pending` could be appended without breaking the tool-result invariant
    pub fn check_append(&self, pending: &[LlmMessage]) -> Result<()> {
        let mut known_calls: HashSet<&str> = self
            .messages
            .iter()
            .flat_map(|m| m.tool_calls.iter().map(|c| c.id.as_str()))
            .collect();

        for message in pending {
            match message.role {
                MessageRole::Assistant => {
                    known_calls.extend(message.tool_calls.iter().map(|c| c.id.as_str()));
                }
                MessageRole::Tool => {
                    let id = message.tool_call_id.as_deref().unwrap_or_default();
                    if !known_calls.contains(id) {
                        return Err(SessionError::DanglingToolResult {
                            tool_call_id: id.to_string(),
                        }
                        .into());
                    }
                }
                MessageRole::System | MessageRole::User => {}
            }
        }

        Ok(())
    }

    pub fn messages(&self) -> &[LlmMessage] {
        &self.messages
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LlmMessage> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&LlmMessage> {
        self.messages.last()
    }

    /// Text of the most recent assistant message that requested no tools
    pub fn final_reply(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Assistant && !m.has_tool_calls())
            .map(|m| m.content.as_str())
    }

    /// Tool calls of the trailing assistant message that no tool result answers.
    ///
    /// Only the end of the log is inspected: the last assistant message and
    /// the tool results that follow it.
    pub fn unanswered_tool_calls(&self) -> Vec<ToolCall> {
        let mut answered = HashSet::new();
        for message in self.messages.iter().rev() {
            match message.role {
                MessageRole::Tool => {
                    answered.extend(message.tool_call_id.as_deref());
                }
                MessageRole::Assistant => {
                    return message
                        .tool_calls
                        .iter()
                        .filter(|call| !answered.contains(call.id.as_str()))
                        .cloned()
                        .collect();
                }
                MessageRole::System | MessageRole::User => break,
            }
        }
        Vec::new()
    }

    pub fn into_messages(self) -> Vec<LlmMessage> {
        self.messages
    }
}

impl<'a> IntoIterator for &'a MessageLog {
    type Item = &'a LlmMessage;
    type IntoIter = std::slice::Iter<'a, LlmMessage>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::tools::ToolCall;
    use serde_json::json;

    fn tool_request(id: &str) -> LlmMessage {
        LlmMessage::assistant_with_tool_calls(
            "",
            vec![ToolCall::with_id(id, "sumar", json!({"a": 2, "b": 3}))],
        )
    }

    #[test]
    fn test_tool_result_must_follow_its_call() {
        let mut log = MessageLog::new();
        log.push(LlmMessage::user("Suma 2 y 3")).unwrap();

        let err = log.push(LlmMessage::tool_result("call_1", "5")).unwrap_err();
        assert!(matches!(
            err,
            Error::Session(SessionError::DanglingToolResult { ref tool_call_id }) if tool_call_id == "call_1"
        ));
        assert_eq!(log.len(), 1);

        log.push(tool_request("call_1")).unwrap();
        log.push(LlmMessage::tool_result("call_1", "5")).unwrap();
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_rejected_batch_leaves_log_untouched() {
        let mut log = MessageLog::new();
        log.push(LlmMessage::user("hola")).unwrap();

        let batch = vec![
            tool_request("call_a"),
            LlmMessage::tool_result("call_a", "5"),
            LlmMessage::tool_result("call_b", "7"),
        ];
        assert!(log.extend(batch).is_err());
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_final_reply_skips_tool_requests() {
        let log = MessageLog::from_messages(vec![
            LlmMessage::user("Suma 2 y 3"),
            tool_request("call_1"),
            LlmMessage::tool_result("call_1", "5"),
            LlmMessage::assistant("El resultado es 5."),
        ])
        .unwrap();
        assert_eq!(log.final_reply(), Some("El resultado es 5."));

        let pending = MessageLog::from_messages(vec![LlmMessage::user("x"), tool_request("c")]).unwrap();
        assert_eq!(pending.final_reply(), None);
    }

    #[test]
    fn test_unanswered_tool_calls_at_the_end_of_the_log() {
        let two_calls = LlmMessage::assistant_with_tool_calls(
            "",
            vec![
                ToolCall::with_id("call_a", "sumar", json!({"a": 1, "b": 1})),
                ToolCall::with_id("call_b", "sumar", json!({"a": 2, "b": 2})),
            ],
        );
        let mut log = MessageLog::from_messages(vec![LlmMessage::user("Suma"), two_calls]).unwrap();
        let ids: Vec<String> = log.unanswered_tool_calls().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["call_a", "call_b"]);

        log.push(LlmMessage::tool_result("call_a", "2")).unwrap();
        let ids: Vec<String> = log.unanswered_tool_calls().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["call_b"]);

        log.push(LlmMessage::tool_result("call_b", "4")).unwrap();
        assert!(log.unanswered_tool_calls().is_empty());

        log.push(LlmMessage::assistant("Listo.")).unwrap();
        assert!(log.unanswered_tool_calls().is_empty());
        assert!(MessageLog::new().unanswered_tool_calls().is_empty());
    }
}
