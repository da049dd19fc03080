//! CLI output handler implementation

use async_trait::async_trait;
use colored::Colorize;
use toolloop_core::output::{AgentEvent, AgentOutput, MessageLevel, OutputResult};
use tracing::{debug, error, info, warn};

/// Longest tool result shown inline before it is cut
const MAX_RESULT_CHARS: usize = 200;

/// CLI output configuration
#[derive(Debug, Clone)]
pub struct CliOutputConfig {
    /// Print a line for every tool call and its result
    pub show_tools: bool,
    /// Print model/tool counts and token usage after each turn
    pub show_stats: bool,
}

impl Default for CliOutputConfig {
    fn default() -> Self {
        Self {
            show_tools: true,
            show_stats: false,
        }
    }
}

/// CLI output handler that formats events for terminal display
#[derive(Debug, Default)]
pub struct CliOutputHandler {
    config: CliOutputConfig,
}

impl CliOutputHandler {
    /// Create a new CLI output handler
    pub fn new(config: CliOutputConfig) -> Self {
        Self { config }
    }
}

fn truncate(text: &str) -> String {
    let single_line = text.replace('\n', " ");
    if single_line.chars().count() <= MAX_RESULT_CHARS {
        single_line
    } else {
        let cut: String = single_line.chars().take(MAX_RESULT_CHARS).collect();
        format!("{}…", cut)
    }
}

#[async_trait]
impl AgentOutput for CliOutputHandler {
    async fn emit_event(&self, event: AgentEvent) -> OutputResult {
        match event {
            AgentEvent::TurnStarted {
                session_id,
                user_text,
            } => {
                debug!("Turn started in session {}: {}", session_id, user_text);
            }

            AgentEvent::ModelRequested {
                model_turn,
                message_count,
            } => {
                debug!(
                    "Model turn {} with {} messages in context",
                    model_turn, message_count
                );
            }

            AgentEvent::ModelReplied {
                model_turn,
                content,
                tool_calls,
                ..
            } => {
                // Text that accompanies tool calls would otherwise be lost
                if tool_calls > 0 && !content.is_empty() {
                    println!("{}", content.bright_black());
                }
                debug!("Model turn {} requested {} tool calls", model_turn, tool_calls);
            }

            AgentEvent::ModelRetry {
                attempt,
                max_retries,
                error,
            } => {
                eprintln!(
                    "{} {}",
                    format!("Retrying model call ({}/{}):", attempt, max_retries).yellow(),
                    error
                );
            }

            AgentEvent::ToolStarted { call } => {
                if self.config.show_tools {
                    println!(
                        "{} {}({})",
                        "●".white(),
                        call.name.bold(),
                        call.arguments
                    );
                }
            }

            AgentEvent::ToolCompleted { call, result } => {
                if self.config.show_tools {
                    let marker = if result.success {
                        "⎿".green()
                    } else {
                        "⎿".red()
                    };
                    println!("  {} {}", marker, truncate(&result.content));
                }
                debug!("Tool {} finished in {:?} ms", call.name, result.duration_ms);
            }

            AgentEvent::TurnCompleted {
                model_turns,
                tool_calls,
                usage,
                ..
            } => {
                if self.config.show_stats {
                    println!(
                        "{}",
                        format!("{} model turns, {} tool calls", model_turns, tool_calls)
                            .bright_black()
                    );
                    if usage.total_tokens > 0 {
                        println!(
                            "{}",
                            format!(
                                "Tokens: {} input + {} output = {} total",
                                usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
                            )
                            .bright_black()
                        );
                    }
                }
            }

            AgentEvent::TurnFailed { error } => {
                debug!("Turn failed: {}", error);
            }

            AgentEvent::Message { level, content } => match level {
                MessageLevel::Debug => debug!("{}", content),
                MessageLevel::Info => info!("{}", content),
                MessageLevel::Normal => println!("{}", content),
                MessageLevel::Warning => warn!("{}", content),
                MessageLevel::Error => error!("{}", content),
            },
        }

        Ok(())
    }

    async fn flush(&self) -> OutputResult {
        use std::io::Write;
        std::io::stdout().flush().map_err(|e| e.into())
    }
}
