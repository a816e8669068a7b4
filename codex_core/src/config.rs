//! Configuration for the Codex engine.
//!
//! Loaded from TOML, then overridden from the environment:
//! - `CODEX_BACKEND_ENDPOINT`: content backend base URL (default: "http://localhost:3001/api")
//! - `CODEX_BACKEND_PROTOCOL`: `single_shot` or `stream` (default: "stream")
//! - `CODEX_BACKEND_TIMEOUT_SECS`: request timeout (default: 120)
//! - `CODEX_ROOT_TOPIC`: topic activated on start-up (default: none)

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;
use crate::store::DEFAULT_EVENT_BUFFER;
use topic_model::validate_term;

/// How the backend delivers articles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendProtocol {
    /// One JSON article per request.
    SingleShot,
    /// Server-sent events with chunks and a completion.
    #[default]
    Stream,
}

impl std::str::FromStr for BackendProtocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "single_shot" | "single-shot" => Ok(BackendProtocol::SingleShot),
            "stream" => Ok(BackendProtocol::Stream),
            other => Err(ConfigError::Invalid(format!("unknown backend protocol: {other}"))),
        }
    }
}

/// Content backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub endpoint: String,
    pub protocol: BackendProtocol,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:3001/api".to_string(),
            protocol: BackendProtocol::default(),
            timeout_secs: 120,
        }
    }
}

/// Graph behaviour settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Topic activated when the explorer starts.
    pub root_topic: Option<String>,

    /// Also spawn reference stubs while an article is still streaming.
    pub extract_while_streaming: bool,

    /// Capacity of the store event channel.
    pub event_buffer: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            root_topic: None,
            extract_while_streaming: false,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CodexConfig {
    pub backend: BackendConfig,
    pub graph: GraphConfig,
}

impl CodexConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load a TOML file, apply environment overrides and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&text)?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with environment overrides, validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Override settings from `CODEX_*` environment variables.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(endpoint) = var("CODEX_BACKEND_ENDPOINT") {
            self.backend.endpoint = endpoint;
        }
        if let Some(protocol) = var("CODEX_BACKEND_PROTOCOL") {
            self.backend.protocol = protocol.parse()?;
        }
        if let Some(timeout) = var("CODEX_BACKEND_TIMEOUT_SECS") {
            self.backend.timeout_secs = timeout.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!(
                    "CODEX_BACKEND_TIMEOUT_SECS is not a number: {timeout}"
                ))
            })?;
        }
        if let Some(root) = var("CODEX_ROOT_TOPIC") {
            self.graph.root_topic = Some(root);
        }
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = self.backend.endpoint.trim();
        if endpoint.is_empty() {
            return Err(ConfigError::Invalid("backend endpoint cannot be empty".to_string()));
        }
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "backend endpoint must be an http(s) URL: {endpoint}"
            )));
        }
        if self.backend.timeout_secs == 0 {
            return Err(ConfigError::Invalid("backend timeout must be > 0".to_string()));
        }
        if self.graph.event_buffer == 0 {
            return Err(ConfigError::Invalid("event buffer must be > 0".to_string()));
        }
        if let Some(root) = &self.graph.root_topic {
            validate_term(root)
                .map_err(|e| ConfigError::Invalid(format!("root topic: {e}")))?;
        }
        Ok(())
    }
}
