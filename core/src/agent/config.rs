//! Agent configuration structures

use super::ConversationController;
use crate::config::ResolvedLlmConfig;
use crate::error::{ConfigError, Result};
use crate::llm::LlmClient;
use crate::output::{AgentOutput, NullOutput};
use crate::session::{InMemorySessionStore, SessionStore};
use crate::tools::{ToolExecutor, ToolRegistry};
use crate::trajectory::TrajectoryRecorder;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Configuration for the conversation controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Maximum number of model invocations within one turn
    pub max_turns: usize,

    /// Per-invocation model timeout, in seconds
    pub model_timeout_secs: u64,

    /// Per-call tool timeout, in seconds
    pub tool_timeout_secs: u64,

    /// How many times a retryable model failure is retried
    pub max_retries: usize,

    /// Base delay between retries; the n-th retry waits n times this long
    pub retry_backoff_ms: u64,

    /// Instructions sent ahead of every model request, never persisted
    pub system_prompt: Option<String>,

    /// Names of the built-in tools to expose to the model
    pub tools: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: 10,
            model_timeout_secs: 60,
            tool_timeout_secs: 30,
            max_retries: 2,
            retry_backoff_ms: 500,
            system_prompt: None,
            tools: vec!["sumar".to_string()],
        }
    }
}

impl AgentConfig {
    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Wait before the `attempt`-th retry; saturates instead of overflowing
    pub fn retry_delay(&self, attempt: usize) -> Duration {
        let factor = u32::try_from(attempt).unwrap_or(u32::MAX);
        self.retry_backoff().saturating_mul(factor)
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.max_turns == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_turns".to_string(),
                value: "0".to_string(),
            });
        }
        if self.model_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "model_timeout_secs".to_string(),
                value: "0".to_string(),
            });
        }
        if self.tool_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "tool_timeout_secs".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

enum ClientSource {
    Config(ResolvedLlmConfig),
    Client(Arc<dyn LlmClient>),
}

/// Builder for a [`ConversationController`]
pub struct AgentBuilder {
    client: ClientSource,
    agent_config: AgentConfig,
    registry: Option<ToolRegistry>,
    store: Option<Arc<dyn SessionStore>>,
    output: Option<Arc<dyn AgentOutput>>,
    recorder: Option<Arc<TrajectoryRecorder>>,
}

impl AgentBuilder {
    /// Create a new agent builder with LLM configuration
    pub fn new(llm_config: ResolvedLlmConfig) -> Self {
        Self::from_source(ClientSource::Config(llm_config))
    }

    /// Create a new agent builder around an existing client
    pub fn with_client(client: Arc<dyn LlmClient>) -> Self {
        Self::from_source(ClientSource::Client(client))
    }

    fn from_source(client: ClientSource) -> Self {
        Self {
            client,
            agent_config: AgentConfig::default(),
            registry: None,
            store: None,
            output: None,
            recorder: None,
        }
    }

    /// Set agent configuration
    pub fn with_agent_config(mut self, agent_config: AgentConfig) -> Self {
        self.agent_config = agent_config;
        self
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.agent_config.max_turns = max_turns;
        self
    }

    /// Select built-in tools by name
    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.agent_config.tools = tools;
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: Option<String>) -> Self {
        self.agent_config.system_prompt = system_prompt;
        self
    }

    /// Use a caller-built registry as-is instead of the built-in selection
    pub fn with_registry(mut self, registry: ToolRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the session store (defaults to an in-memory store)
    pub fn with_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the output handler (defaults to discarding events)
    pub fn with_output(mut self, output: Arc<dyn AgentOutput>) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_trajectory_recorder(mut self, recorder: Arc<TrajectoryRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Build the controller
    pub fn build(self) -> Result<ConversationController> {
        self.agent_config.validate()?;

        let client = match self.client {
            ClientSource::Config(config) => crate::llm::create_client(&config)?,
            ClientSource::Client(client) => client,
        };

        let registry = match self.registry {
            Some(registry) => registry,
            None => ToolRegistry::with_builtins().select(&self.agent_config.tools)?,
        };
        tracing::debug!("Tools available to the model: {:?}", registry.list_tools());

        let executor = ToolExecutor::new(Arc::new(registry))
            .with_timeout(self.agent_config.tool_timeout());

        Ok(ConversationController::new(
            client,
            executor,
            self.store
                .unwrap_or_else(|| Arc::new(InMemorySessionStore::new())),
            self.agent_config,
            self.output.unwrap_or_else(|| Arc::new(NullOutput)),
            self.recorder,
        ))
    }
}
