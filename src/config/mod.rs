//! Configuration management for HumeGPT
//!
//! Supports configuration via:
//! 1. Config file (~/.config/humegpt/config.toml)
//! 2. `.env` file in the working directory (loaded by the binary)
//! 3. Environment variables (OPENAI_API_KEY, OPENAI_BASE_URL, OPENAI_MODEL)
//! 4. CLI arguments (override file/env settings)

use crate::api::{ApiConfig, ChatRequest, MalformedPolicy, DEFAULT_BASE_URL};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chat-completion API settings
    pub openai: OpenAISettings,

    /// What a session sends and shows
    pub session: SessionSettings,
}

/// OpenAI settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAISettings {
    /// API key (can also use OPENAI_API_KEY env var)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL for the OpenAI API
    pub base_url: String,

    /// Model to use
    pub model: String,

    /// Seconds to wait for the next piece of the response body (0 = no limit)
    pub read_timeout_secs: u64,

    /// What to do with a stream line that is not valid JSON (skip, abort)
    pub on_malformed: MalformedPolicy,
}

impl Default for OpenAISettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: "gpt-4-turbo".to_string(),
            read_timeout_secs: 60,
            on_malformed: MalformedPolicy::Skip,
        }
    }
}

/// Session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// System prompt sent first
    pub system_prompt: String,

    /// User message that starts the session
    pub prompt: String,

    /// Show the emotion annotation table after the response
    pub show_annotations: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            system_prompt: "You are a helpful assistant.".to_string(),
            prompt: "What is the capital of France? Answer and provide a 50 words history of this city."
                .to_string(),
            show_annotations: true,
        }
    }
}

impl Config {
    /// Get default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("humegpt")
            .join("config.toml")
    }

    /// Load config from specific path, falling back to defaults when absent
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default().with_env_overrides());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;

        // Apply environment variable overrides
        Ok(config.with_env_overrides())
    }

    /// Apply environment variable overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.trim().is_empty() {
                self.openai.api_key = Some(key);
            }
        }
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            self.openai.base_url = url;
        }
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            self.openai.model = model;
        }

        self
    }

    /// Save config to specific path
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key().is_none() {
            return Err(ConfigError::MissingRequired(
                "OpenAI API key (set OPENAI_API_KEY or openai.api_key)".to_string(),
            ));
        }

        if !self.openai.base_url.starts_with("http://")
            && !self.openai.base_url.starts_with("https://")
        {
            return Err(ConfigError::InvalidValue {
                key: "openai.base_url".to_string(),
                reason: "must start with http:// or https://".to_string(),
            });
        }

        if self.openai.model.trim().is_empty() {
            return Err(ConfigError::MissingRequired("openai.model".to_string()));
        }

        Ok(())
    }

    /// Get API key (from config or env)
    pub fn api_key(&self) -> Option<String> {
        self.openai
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|key| !key.trim().is_empty())
    }

    /// Connection settings for the streaming client
    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            api_key: self.api_key(),
            base_url: self.openai.base_url.clone(),
            read_timeout_secs: self.openai.read_timeout_secs,
            on_malformed: self.openai.on_malformed,
        }
    }

    /// The request a session starts with
    pub fn session_request(&self) -> ChatRequest {
        let mut request = ChatRequest::new(self.openai.model.clone());
        if !self.session.system_prompt.trim().is_empty() {
            request = request.with_system(self.session.system_prompt.clone());
        }
        request.with_user(self.session.prompt.clone())
    }

    /// Set a value by `section.field` key
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let (section, field) = key
            .split_once('.')
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

        let invalid = |reason: String| ConfigError::InvalidValue {
            key: key.to_string(),
            reason,
        };

        match (section, field) {
            ("openai", "api_key") => self.openai.api_key = Some(value.to_string()),
            ("openai", "base_url") => self.openai.base_url = value.to_string(),
            ("openai", "model") => self.openai.model = value.to_string(),
            ("openai", "read_timeout_secs") => {
                self.openai.read_timeout_secs =
                    value.parse().map_err(|e| invalid(format!("{}", e)))?
            }
            ("openai", "on_malformed") => self.openai.on_malformed = value.parse().map_err(invalid)?,
            ("session", "system_prompt") => self.session.system_prompt = value.to_string(),
            ("session", "prompt") => self.session.prompt = value.to_string(),
            ("session", "show_annotations") => {
                self.session.show_annotations =
                    value.parse().map_err(|e| invalid(format!("{}", e)))?
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }

        Ok(())
    }

    /// Copy with the API key hidden, for display
    pub fn masked(&self) -> Self {
        let mut config = self.clone();
        if config.openai.api_key.is_some() {
            config.openai.api_key = Some("***".to_string());
        }
        config
    }
}

/// Builder for creating Config programmatically
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.openai.api_key = Some(key.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.openai.base_url = url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.openai.model = model.into();
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.session.system_prompt = prompt.into();
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.session.prompt = prompt.into();
        self
    }

    pub fn on_malformed(mut self, policy: MalformedPolicy) -> Self {
        self.config.openai.on_malformed = policy;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
