//! Conversation controller: drives one turn through the state machine

use super::execution::TurnOutcome;
use super::state::{route_after_model, TurnState};
use super::AgentConfig;
use crate::error::{AgentError, Error, LlmError, Result};
use crate::llm::{LlmClient, LlmMessage, LlmResponse, MessageLog, MessageRole, Usage};
use crate::output::{AgentEvent, AgentOutput};
use crate::session::SessionStore;
use crate::tools::{ToolExecutor, ToolRegistry, ToolResult};
use crate::trajectory::{TrajectoryEntry, TrajectoryRecorder};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// Result recorded for a tool call whose turn ended before it was answered
const INTERRUPTED_TOOL_CALL: &str = "Tool call was interrupted before it produced a result";

/// Runs conversation turns against a session store.
///
/// The controller holds no per-session state; every turn starts by loading
/// the session log and commits each step back to the store before moving on,
/// so independent sessions can be driven concurrently through `&self`.
pub struct ConversationController {
    client: Arc<dyn LlmClient>,
    executor: ToolExecutor,
    store: Arc<dyn SessionStore>,
    config: AgentConfig,
    output: Arc<dyn AgentOutput>,
    recorder: Option<Arc<TrajectoryRecorder>>,
}

/// Counters carried through a turn
#[derive(Default)]
struct TurnProgress {
    model_turns: usize,
    tool_calls: usize,
    usage: Usage,
}

impl ConversationController {
    pub fn new(
        client: Arc<dyn LlmClient>,
        executor: ToolExecutor,
        store: Arc<dyn SessionStore>,
        config: AgentConfig,
        output: Arc<dyn AgentOutput>,
        recorder: Option<Arc<TrajectoryRecorder>>,
    ) -> Self {
        Self {
            client,
            executor,
            store,
            config,
            output,
            recorder,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn registry(&self) -> &ToolRegistry {
        self.executor.registry()
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn client(&self) -> &Arc<dyn LlmClient> {
        &self.client
    }

    /// Current log of a session
    pub async fn history(&self, session_id: &str) -> Result<MessageLog> {
        self.store.load(session_id).await
    }

    /// Forget a session entirely. Returns whether it existed.
    pub async fn clear(&self, session_id: &str) -> Result<bool> {
        self.store.delete(session_id).await
    }

    /// Run one turn: append `user_text` to the session and loop between the
    /// model and the tools until the model answers without requesting tools.
    ///
    /// Every message appended before a failure stays in the session.
    pub async fn run_turn(&self, session_id: &str, user_text: &str) -> Result<TurnOutcome> {
        let start_time = Instant::now();
        tracing::info!("Starting turn for session {}", session_id);

        self.emit(AgentEvent::TurnStarted {
            session_id: session_id.to_string(),
            user_text: user_text.to_string(),
        })
        .await;
        self.record(TrajectoryEntry::turn_start(session_id, user_text))
            .await;

        let mut progress = TurnProgress::default();
        match self
            .drive(session_id, user_text, &mut progress, start_time)
            .await
        {
            Ok(outcome) => {
                tracing::info!(
                    "Turn for session {} finished after {} model turns and {} tool calls",
                    session_id,
                    outcome.model_turns,
                    outcome.tool_calls
                );
                self.emit(AgentEvent::TurnCompleted {
                    final_reply: outcome.final_reply.clone(),
                    model_turns: outcome.model_turns,
                    tool_calls: outcome.tool_calls,
                    usage: outcome.usage,
                })
                .await;
                self.record(TrajectoryEntry::turn_complete(
                    outcome.final_reply.clone(),
                    outcome.model_turns,
                    outcome.duration_ms,
                ))
                .await;
                self.flush().await;
                Ok(outcome)
            }
            Err(e) => {
                tracing::error!("Turn for session {} failed: {}", session_id, e);
                self.emit(AgentEvent::TurnFailed {
                    error: e.to_string(),
                })
                .await;
                self.record(TrajectoryEntry::error(e.to_string(), progress.model_turns))
                    .await;
                self.flush().await;
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        session_id: &str,
        user_text: &str,
        progress: &mut TurnProgress,
        start_time: Instant,
    ) -> Result<TurnOutcome> {
        let mut log = self.store.load(session_id).await?;
        let first_new_index = log.len();
        self.answer_interrupted_calls(session_id, &mut log).await?;
        let mut state = TurnState::AwaitingUserInput;

        loop {
            state = match state {
                TurnState::AwaitingUserInput => {
                    self.commit(session_id, &mut log, vec![LlmMessage::user(user_text)])
                        .await?;
                    TurnState::ModelTurn
                }
                TurnState::ModelTurn => {
                    if progress.model_turns >= self.config.max_turns {
                        return Err(AgentError::MaxTurnsExceeded {
                            max_turns: self.config.max_turns,
                        }
                        .into());
                    }
                    progress.model_turns += 1;

                    let response = self.invoke_model(&log, progress.model_turns).await?;
                    if let Some(usage) = &response.usage {
                        progress.usage.accumulate(usage);
                    }
                    let message = normalize_reply(response.message)?;

                    self.emit(AgentEvent::ModelReplied {
                        model_turn: progress.model_turns,
                        content: message.content.clone(),
                        tool_calls: message.tool_calls.len(),
                        usage: response.usage,
                    })
                    .await;
                    self.record(TrajectoryEntry::model_response(
                        message.clone(),
                        response.usage,
                        progress.model_turns,
                    ))
                    .await;

                    let next = route_after_model(&message);
                    self.commit(session_id, &mut log, vec![message]).await?;
                    next
                }
                TurnState::ToolTurn(calls) => {
                    let mut results = Vec::with_capacity(calls.len());
                    for call in &calls {
                        tracing::debug!("Executing tool {} (id: {})", call.name, call.id);
                        self.emit(AgentEvent::ToolStarted { call: call.clone() })
                            .await;
                        self.record(TrajectoryEntry::tool_call(
                            call.clone(),
                            progress.model_turns,
                        ))
                        .await;

                        let result = self.executor.execute_recovering(call).await;
                        progress.tool_calls += 1;

                        self.emit(AgentEvent::ToolCompleted {
                            call: call.clone(),
                            result: result.clone(),
                        })
                        .await;
                        self.record(TrajectoryEntry::tool_result(
                            result.clone(),
                            progress.model_turns,
                        ))
                        .await;

                        results.push(result.to_message());
                    }

                    self.commit(session_id, &mut log, results).await?;
                    TurnState::ModelTurn
                }
                TurnState::Done => break,
            };
        }

        let final_reply = log.final_reply().unwrap_or_default().to_string();
        Ok(TurnOutcome {
            messages: log,
            final_reply,
            model_turns: progress.model_turns,
            tool_calls: progress.tool_calls,
            usage: progress.usage,
            first_new_index,
            duration_ms: start_time.elapsed().as_millis() as u64,
        })
    }

    /// Close out tool calls left unanswered by an earlier turn that ended
    /// between storing the model's reply and storing the tool results.
    async fn answer_interrupted_calls(&self, session_id: &str, log: &mut MessageLog) -> Result<()> {
        let pending = log.unanswered_tool_calls();
        if pending.is_empty() {
            return Ok(());
        }

        tracing::warn!(
            "Session {} has {} unanswered tool calls; recording them as interrupted",
            session_id,
            pending.len()
        );
        if let Err(e) = self
            .output
            .warning(&format!(
                "{} tool calls from the previous turn were interrupted",
                pending.len()
            ))
            .await
        {
            tracing::debug!("Failed to emit agent event: {}", e);
        }

        let results = pending
            .iter()
            .map(|call| ToolResult::error(call.id.clone(), INTERRUPTED_TOOL_CALL).to_message())
            .collect();
        self.commit(session_id, log, results).await
    }

    /// Persist messages, then mirror them into the in-memory log
    async fn commit(
        &self,
        session_id: &str,
        log: &mut MessageLog,
        messages: Vec<LlmMessage>,
    ) -> Result<()> {
        log.check_append(&messages)?;
        self.store.append(session_id, &messages).await?;
        log.extend(messages)
    }

    /// Invoke the model with timeout and bounded retries. Appends nothing.
    async fn invoke_model(&self, log: &MessageLog, model_turn: usize) -> Result<LlmResponse> {
        let mut messages = Vec::with_capacity(log.len() + 1);
        if let Some(prompt) = self.config.system_prompt.as_deref().filter(|p| !p.is_empty()) {
            messages.push(LlmMessage::system(prompt));
        }
        messages.extend(log.iter().cloned());

        let definitions = self.executor.registry().definitions();
        let tools = if definitions.is_empty() {
            None
        } else {
            Some(definitions)
        };

        let timeout = self.config.model_timeout();
        let mut attempt = 0;
        loop {
            self.emit(AgentEvent::ModelRequested {
                model_turn,
                message_count: messages.len(),
            })
            .await;
            self.record(TrajectoryEntry::model_request(
                messages.clone(),
                self.client.model_name(),
                self.client.provider_name(),
                model_turn,
            ))
            .await;

            let call = self
                .client
                .chat_completion(messages.clone(), tools.clone(), None);
            let result = match tokio::time::timeout(timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(LlmError::ModelUnavailable {
                    message: format!("model call timed out after {}s", timeout.as_secs()),
                }
                .into()),
            };

            match result {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        "Model call failed (attempt {}/{}): {}",
                        attempt,
                        self.config.max_retries,
                        e
                    );
                    self.emit(AgentEvent::ModelRetry {
                        attempt,
                        max_retries: self.config.max_retries,
                        error: e.to_string(),
                    })
                    .await;
                    tokio::time::sleep(self.config.retry_delay(attempt)).await;
                }
                Err(e) => {
                    tracing::error!("Model call failed for model turn {}: {}", model_turn, e);
                    return Err(e);
                }
            }
        }
    }

    async fn emit(&self, event: AgentEvent) {
        if let Err(e) = self.output.emit_event(event).await {
            tracing::debug!("Failed to emit agent event: {}", e);
        }
    }

    async fn flush(&self) {
        if let Err(e) = self.output.flush().await {
            tracing::debug!("Failed to flush agent output: {}", e);
        }
    }

    async fn record(&self, entry: TrajectoryEntry) {
        if let Some(recorder) = &self.recorder {
            if let Err(e) = recorder.record(entry).await {
                tracing::warn!("Failed to record trajectory entry: {}", e);
            }
        }
    }
}

/// Check that a reply can be appended and give every tool call a unique id
fn normalize_reply(mut message: LlmMessage) -> Result<LlmMessage> {
    if message.role != MessageRole::Assistant {
        return Err(Error::Llm(LlmError::ModelResponseInvalid {
            message: format!("expected an assistant reply, got {}", message.role.as_str()),
        }));
    }

    let mut seen = HashSet::new();
    for call in &mut message.tool_calls {
        if call.name.is_empty() {
            return Err(Error::Llm(LlmError::ModelResponseInvalid {
                message: "tool call without a name".to_string(),
            }));
        }
        if call.id.is_empty() || !seen.insert(call.id.clone()) {
            call.id = uuid::Uuid::new_v4().to_string();
            seen.insert(call.id.clone());
        }
    }

    Ok(message)
}
