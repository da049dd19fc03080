//! CLI configuration loader for toolloop
//!
//! Implements single-source priority loading with flag overrides:
//! 1. --config file/dir (highest priority)
//! 2. Current working directory: ./toolloop.json or ./.toolloop/config.json
//! 3. Git repository root: <repo_root>/.toolloop/config.json
//! 4. XDG config: $XDG_CONFIG_HOME/toolloop/config.json or ~/.config/toolloop/config.json
//! 5. Environment variables only (no files)

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use toolloop_core::error::ConfigError;
use toolloop_core::{AgentConfig, ModelParams, Protocol, ResolvedLlmConfig};

const APP_DIR: &str = "toolloop";
const CONFIG_FILE: &str = "config.json";

/// Raw configuration file format (simple single-file schema)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawConfig {
    /// Protocol to use
    pub protocol: String,
    /// API key (can be "env:VAR_NAME" for environment variable)
    pub api_key: String,
    /// Base URL (optional, uses protocol default if not specified)
    pub base_url: Option<String>,
    /// Model name (optional, uses protocol default if not specified)
    pub model: Option<String>,
    /// Model parameters (optional)
    #[serde(default)]
    pub params: ModelParams,
    /// Additional headers (optional)
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Conversation controller settings (optional)
    #[serde(default)]
    pub agent: AgentConfig,
}

/// Fully resolved configuration
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub llm: ResolvedLlmConfig,
    pub agent: AgentConfig,
    /// Where the configuration came from, for diagnostics
    pub source: String,
}

/// API key environment variables per protocol, in lookup order
const KEY_VARS: &[(&str, &[&str])] = &[
    ("openai_compat", &["OPENAI_API_KEY"]),
    ("anthropic", &["ANTHROPIC_API_KEY"]),
    ("google_ai", &["GOOGLE_API_KEY", "GEMINI_API_KEY"]),
    ("azure_openai", &["AZURE_OPENAI_API_KEY"]),
];

/// CLI configuration loader
#[derive(Default)]
pub struct CliConfigLoader {
    /// Override config file/directory path
    config_override: Option<PathBuf>,
    /// Flag overrides
    protocol_override: Option<String>,
    api_key_override: Option<String>,
    base_url_override: Option<String>,
    model_override: Option<String>,
    /// Directory searched first, defaults to the current directory
    working_dir: Option<PathBuf>,
}

impl CliConfigLoader {
    /// Create a new loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Set config file/directory override
    pub fn with_config_override(mut self, path: PathBuf) -> Self {
        self.config_override = Some(path);
        self
    }

    /// Set protocol override
    pub fn with_protocol_override(mut self, protocol: String) -> Self {
        self.protocol_override = Some(protocol);
        self
    }

    /// Set API key override
    pub fn with_api_key_override(mut self, api_key: String) -> Self {
        self.api_key_override = Some(api_key);
        self
    }

    /// Set base URL override
    pub fn with_base_url_override(mut self, base_url: String) -> Self {
        self.base_url_override = Some(base_url);
        self
    }

    /// Set model override
    pub fn with_model_override(mut self, model: String) -> Self {
        self.model_override = Some(model);
        self
    }

    /// Search from `dir` instead of the current directory
    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }

    /// Load and resolve configuration
    pub async fn load(&self) -> Result<LoadedConfig> {
        // Step 1: Find and load base configuration
        let (mut config, source) = if let Some(override_path) = &self.config_override {
            let config = self.load_from_path(override_path).await.with_context(|| {
                format!(
                    "Failed to load config from override path: {}",
                    override_path.display()
                )
            })?;
            (config, override_path.display().to_string())
        } else {
            self.search_and_load().await?
        };
        tracing::debug!("Loaded configuration from {}", source);

        // Step 2: Apply flag overrides
        if let Some(protocol) = &self.protocol_override {
            config.protocol = protocol.clone();
        }
        if let Some(api_key) = &self.api_key_override {
            config.api_key = api_key.clone();
        }
        if let Some(base_url) = &self.base_url_override {
            config.base_url = Some(base_url.clone());
        }
        if let Some(model) = &self.model_override {
            config.model = Some(model.clone());
        }

        // Step 3: Resolve to final config
        let agent = config.agent.clone();
        let llm = self.resolve_config(config)?;
        Ok(LoadedConfig { llm, agent, source })
    }

    fn working_dir(&self) -> Result<PathBuf> {
        match &self.working_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }

    /// Search for config in priority order
    async fn search_and_load(&self) -> Result<(RawConfig, String)> {
        let mut candidates = Vec::new();

        let cwd = self.working_dir()?;
        candidates.push(cwd.join(format!("{}.json", APP_DIR)));
        candidates.push(cwd.join(format!(".{}", APP_DIR)).join(CONFIG_FILE));

        if let Some(git_root) = find_git_root(&cwd) {
            candidates.push(git_root.join(format!(".{}", APP_DIR)).join(CONFIG_FILE));
        }

        if let Some(config_dir) = xdg_config_dir() {
            candidates.push(config_dir.join(APP_DIR).join(CONFIG_FILE));
        }

        for candidate in &candidates {
            if candidate.is_file() {
                let config = self.load_file(candidate).await?;
                return Ok((config, candidate.display().to_string()));
            }
        }

        let searched = candidates
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let config = self.try_load_env_only(&searched)?;
        Ok((config, "environment".to_string()))
    }

    /// Build a configuration from environment variables only
    fn try_load_env_only(&self, searched: &str) -> Result<RawConfig> {
        let env_protocol = std::env::var("TOOLLOOP_PROTOCOL").ok();
        let preferred = self
            .protocol_override
            .as_deref()
            .or(env_protocol.as_deref())
            .map(|p| Protocol::parse(p).as_str().to_string());

        let available: Vec<(&str, String)> = KEY_VARS
            .iter()
            .filter_map(|(protocol, vars)| {
                vars.iter()
                    .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
                    .map(|key| (*protocol, key))
            })
            .collect();
        let available_names = available
            .iter()
            .map(|(p, _)| *p)
            .collect::<Vec<_>>()
            .join(", ");

        let (protocol, api_key) = match preferred {
            Some(preferred) => available
                .into_iter()
                .find(|(p, _)| *p == preferred)
                .ok_or_else(|| {
                    anyhow!(
                        "Protocol '{}' specified but no corresponding API key found. Available keys: {}",
                        preferred,
                        available_names
                    )
                })?,
            None => match available.len() {
                0 => {
                    return Err(ConfigError::NoConfigFound {
                        searched: format!(
                            "{}; and no API key environment variable such as OPENAI_API_KEY or GOOGLE_API_KEY is set",
                            searched
                        ),
                    }
                    .into())
                }
                1 => available.into_iter().next().ok_or_else(|| anyhow!("no API key"))?,
                _ => {
                    return Err(anyhow!(
                        "Multiple API keys detected: {}. Please specify which protocol to use with TOOLLOOP_PROTOCOL or --protocol",
                        available_names
                    ))
                }
            },
        };

        Ok(RawConfig {
            protocol: protocol.to_string(),
            api_key,
            base_url: std::env::var("TOOLLOOP_BASE_URL").ok(),
            model: std::env::var("TOOLLOOP_MODEL").ok(),
            params: ModelParams::default(),
            headers: HashMap::new(),
            agent: AgentConfig::default(),
        })
    }

    /// Load configuration from a specific path (file or directory)
    async fn load_from_path(&self, path: &Path) -> Result<RawConfig> {
        if path.is_file() {
            self.load_file(path).await
        } else if path.is_dir() {
            let config_file = path.join(CONFIG_FILE);
            if config_file.exists() {
                self.load_file(&config_file).await
            } else {
                Err(anyhow!(
                    "No {} found in directory: {}",
                    CONFIG_FILE,
                    path.display()
                ))
            }
        } else {
            Err(anyhow!("Config path does not exist: {}", path.display()))
        }
    }

    /// Load a single config file
    async fn load_file(&self, path: &Path) -> Result<RawConfig> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Resolve raw config to ResolvedLlmConfig
    fn resolve_config(&self, config: RawConfig) -> Result<ResolvedLlmConfig> {
        let protocol = Protocol::parse(&config.protocol);

        // Resolve API key (handle env: prefix)
        let api_key = match config.api_key.strip_prefix("env:") {
            Some(var_name) => std::env::var(var_name)
                .with_context(|| format!("Environment variable not found: {}", var_name))?,
            None => config.api_key,
        };

        let base_url = match config.base_url {
            Some(base_url) => base_url,
            None => protocol
                .default_base_url()
                .map(str::to_string)
                .ok_or_else(|| {
                    anyhow!("Protocol '{}' requires an explicit base_url", protocol.as_str())
                })?,
        };

        let model = match config.model {
            Some(model) => model,
            None => protocol
                .default_model()
                .map(str::to_string)
                .ok_or_else(|| anyhow!("Protocol '{}' requires a model", protocol.as_str()))?,
        };

        // Gemini runs deterministically unless told otherwise.
        let mut params = config.params;
        if protocol == Protocol::GoogleAI && params.temperature.is_none() {
            params.temperature = Some(0.0);
        }

        let resolved = ResolvedLlmConfig::new(protocol, base_url, api_key, model)
            .with_params(params)
            .with_headers(config.headers);

        resolved
            .validate()
            .map_err(|e| anyhow!("Configuration validation failed: {}", e))?;

        Ok(resolved)
    }
}

/// Find git repository root
fn find_git_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(".git").exists())
        .map(Path::to_path_buf)
}

/// Get XDG config directory
fn xdg_config_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(dirs::config_dir)
}
