//! Minimal configuration types for toolloop core
//!
//! Core only accepts fully resolved, validated configuration.
//! All discovery, loading, and merging happens in CLI layer.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Supported LLM protocols
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    /// OpenAI-compatible API (includes OpenAI, many proxies, local models)
    #[serde(rename = "openai_compat")]
    OpenAICompat,
    /// Anthropic Claude API
    #[serde(rename = "anthropic")]
    Anthropic,
    /// Google AI API (Gemini)
    #[serde(rename = "google_ai")]
    GoogleAI,
    /// Azure OpenAI API
    #[serde(rename = "azure_openai")]
    AzureOpenAI,
    /// Custom protocol
    #[serde(rename = "custom")]
    Custom(String),
}

impl Protocol {
    /// Parse a protocol name as written in config files and flags
    pub fn parse(name: &str) -> Self {
        match name {
            "openai" | "openai_compat" => Protocol::OpenAICompat,
            "anthropic" => Protocol::Anthropic,
            "google_ai" | "gemini" => Protocol::GoogleAI,
            "azure_openai" => Protocol::AzureOpenAI,
            custom => Protocol::Custom(custom.to_string()),
        }
    }

    /// Get the protocol name as a string
    pub fn as_str(&self) -> &str {
        match self {
            Protocol::OpenAICompat => "openai_compat",
            Protocol::Anthropic => "anthropic",
            Protocol::GoogleAI => "google_ai",
            Protocol::AzureOpenAI => "azure_openai",
            Protocol::Custom(name) => name,
        }
    }

    /// Get the default base URL for this protocol
    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Protocol::OpenAICompat => Some("https://api.openai.com/v1"),
            Protocol::Anthropic => Some("https://api.anthropic.com"),
            Protocol::GoogleAI => Some("https://generativelanguage.googleapis.com/v1beta"),
            Protocol::AzureOpenAI => None, // Requires custom endpoint
            Protocol::Custom(_) => None,
        }
    }

    /// Get the default model for this protocol
    pub fn default_model(&self) -> Option<&'static str> {
        match self {
            Protocol::OpenAICompat | Protocol::AzureOpenAI => Some("gpt-4o"),
            Protocol::Anthropic => Some("claude-3-5-sonnet-20241022"),
            Protocol::GoogleAI => Some("gemini-2.0-flash-001"),
            Protocol::Custom(_) => None,
        }
    }
}

/// Model parameters for LLM requests
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Temperature for sampling (0.0 to 2.0)
    pub temperature: Option<f32>,
    /// Top-p sampling parameter
    pub top_p: Option<f32>,
    /// Stop sequences
    pub stop_sequences: Option<Vec<String>>,
}

/// A fully resolved LLM configuration ready for use by core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedLlmConfig {
    /// The protocol to use
    pub protocol: Protocol,
    /// Base URL for the API
    pub base_url: String,
    /// API key for authentication
    pub api_key: String,
    /// Model name/identifier
    pub model: String,
    /// Model parameters
    #[serde(default)]
    pub params: ModelParams,
    /// Additional headers for requests
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl ResolvedLlmConfig {
    /// Create a new resolved LLM config
    pub fn new(protocol: Protocol, base_url: String, api_key: String, model: String) -> Self {
        Self {
            protocol,
            base_url,
            api_key,
            model,
            params: ModelParams::default(),
            headers: HashMap::new(),
        }
    }

    /// Set model parameters
    pub fn with_params(mut self, params: ModelParams) -> Self {
        self.params = params;
        self
    }

    /// Add a header
    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.headers.insert(key, value);
        self
    }

    /// Add multiple headers
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.is_empty() {
            return Err(ConfigError::MissingField {
                field: "api_key".to_string(),
            });
        }

        if self.model.is_empty() {
            return Err(ConfigError::MissingField {
                field: "model".to_string(),
            });
        }

        if self.base_url.is_empty() {
            return Err(ConfigError::MissingField {
                field: "base_url".to_string(),
            });
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                field: "base_url".to_string(),
                value: self.base_url.clone(),
            });
        }

        if let Some(temp) = self.params.temperature {
            if !(0.0..=2.0).contains(&temp) {
                return Err(ConfigError::InvalidValue {
                    field: "params.temperature".to_string(),
                    value: temp.to_string(),
                });
            }
        }

        if let Some(top_p) = self.params.top_p {
            if !(0.0..=1.0).contains(&top_p) {
                return Err(ConfigError::InvalidValue {
                    field: "params.top_p".to_string(),
                    value: top_p.to_string(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gemini() -> ResolvedLlmConfig {
        ResolvedLlmConfig::new(
            Protocol::GoogleAI,
            Protocol::GoogleAI.default_base_url().unwrap().to_string(),
            "test-key".to_string(),
            "gemini-2.0-flash-001".to_string(),
        )
    }

    #[test]
    fn test_valid_config() {
        let config = gemini().with_params(ModelParams {
            temperature: Some(0.0),
            ..Default::default()
        });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_missing_key_and_bad_url() {
        let mut config = gemini();
        config.api_key.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField { ref field }) if field == "api_key"
        ));

        let mut config = gemini();
        config.base_url = "generativelanguage.googleapis.com".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_rejects_out_of_range_temperature() {
        let config = gemini().with_params(ModelParams {
            temperature: Some(3.5),
            ..Default::default()
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_protocol_parse_round_trip() {
        assert_eq!(Protocol::parse("openai"), Protocol::OpenAICompat);
        assert_eq!(Protocol::parse("gemini"), Protocol::GoogleAI);
        assert_eq!(Protocol::parse("google_ai").as_str(), "google_ai");
        assert_eq!(Protocol::parse("ollama"), Protocol::Custom("ollama".to_string()));
    }
}
