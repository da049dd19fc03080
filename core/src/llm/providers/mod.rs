//! LLM provider implementations

pub mod anthropic;
pub mod google;
pub mod openai;

pub use anthropic::AnthropicClient;
pub use google::GoogleClient;
pub use openai::OpenAiClient;

use crate::config::{Protocol, ResolvedLlmConfig};
use crate::error::{ConfigError, LlmError, Result};
use crate::llm::LlmClient;
use std::sync::Arc;

/// Create a client for the configured protocol
pub fn create_client(config: &ResolvedLlmConfig) -> Result<Arc<dyn LlmClient>> {
    config.validate()?;

    tracing::debug!(
        "Creating {} client for model {}",
        config.protocol.as_str(),
        config.model
    );

    let client: Arc<dyn LlmClient> = match &config.protocol {
        Protocol::OpenAICompat => Arc::new(OpenAiClient::new(config)?),
        Protocol::AzureOpenAI => Arc::new(OpenAiClient::azure(config)?),
        Protocol::Anthropic => Arc::new(AnthropicClient::new(config)?),
        Protocol::GoogleAI => Arc::new(GoogleClient::new(config)?),
        Protocol::Custom(name) => {
            return Err(ConfigError::UnsupportedProtocol {
                protocol: name.clone(),
            }
            .into())
        }
    };

    Ok(client)
}

/// Map a non-success HTTP status from a model backend to an error
pub(crate) fn status_error(status: u16, body: String) -> LlmError {
    match status {
        401 | 403 => LlmError::Authentication { message: body },
        408 | 429 | 500..=599 => LlmError::ModelUnavailable {
            message: format!("HTTP {}: {}", status, body),
        },
        _ => LlmError::InvalidRequest {
            message: format!("HTTP {}: {}", status, body),
        },
    }
}

/// Map a reqwest transport failure to an error
pub(crate) fn transport_error(error: reqwest::Error) -> LlmError {
    if error.is_decode() {
        LlmError::ModelResponseInvalid {
            message: error.to_string(),
        }
    } else {
        LlmError::ModelUnavailable {
            message: error.to_string(),
        }
    }
}
