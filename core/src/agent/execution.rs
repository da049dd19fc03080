//! Turn result structures

use crate::llm::{LlmMessage, MessageLog, Usage};
use serde::{Deserialize, Serialize};

/// Result of one completed turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnOutcome {
    /// The whole session log after the turn
    pub messages: MessageLog,

    /// Text of the terminal assistant reply
    pub final_reply: String,

    /// Number of model invocations made during the turn
    pub model_turns: usize,

    /// Number of tool calls executed during the turn
    pub tool_calls: usize,

    /// Token usage summed over the turn's model invocations
    pub usage: Usage,

    /// Index in `messages` of the first message this turn appended
    pub first_new_index: usize,

    /// Wall-clock duration of the turn in milliseconds
    pub duration_ms: u64,
}

impl TurnOutcome {
    /// Messages appended by this turn, starting with the user message
    pub fn new_messages(&self) -> &[LlmMessage] {
        let messages = self.messages.messages();
        &messages[self.first_new_index.min(messages.len())..]
    }
}
