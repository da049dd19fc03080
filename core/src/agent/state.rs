//! Turn state machine

use crate::llm::LlmMessage;
use crate::tools::ToolCall;

/// Where a turn currently is.
///
/// ```text
/// AwaitingUserInput -> ModelTurn -> Done
///                          ^   |
///                          |   v
///                        ToolTurn
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum TurnState {
    /// The user message has not been appended yet
    AwaitingUserInput,
    /// The model is to be invoked on the current log
    ModelTurn,
    /// These calls, in order, must be executed before the model runs again
    ToolTurn(Vec<ToolCall>),
    /// The latest assistant message is a plain reply
    Done,
}

impl TurnState {
    pub fn is_done(&self) -> bool {
        matches!(self, TurnState::Done)
    }
}

/// Decide what follows a model reply. Pure: depends only on the message.
pub fn route_after_model(message: &LlmMessage) -> TurnState {
    if message.has_tool_calls() {
        TurnState::ToolTurn(message.tool_calls.clone())
    } else {
        TurnState::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_reply_is_done() {
        let state = route_after_model(&LlmMessage::assistant("¡Hola!"));
        assert!(state.is_done());
    }

    #[test]
    fn test_tool_calls_keep_order() {
        let calls = vec![
            ToolCall::with_id("c1", "sumar", json!({"a": 1, "b": 2})),
            ToolCall::with_id("c2", "sumar", json!({"a": 3, "b": 4})),
        ];
        let message = LlmMessage::assistant_with_tool_calls("", calls.clone());
        assert_eq!(route_after_model(&message), TurnState::ToolTurn(calls));
    }
}
