//! Client configuration
//!
//! Loaded from `~/.loquat/config.toml`, then overridden by environment
//! variables. Every field has a default, so a missing file is fine.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::constants;
use crate::paths;

/// Configuration for the chat backend client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend root, e.g. `https://chat.example.com/api`
    pub base_url: String,
    /// Sent as `Authorization: Bearer ...` when set
    pub bearer_token: Option<String>,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
    /// Default for new messages
    pub max_output_tokens: u32,
    /// Model requested for new messages; backend default when None
    pub model: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: constants::http::DEFAULT_BASE_URL.to_string(),
            bearer_token: None,
            connect_timeout_secs: constants::http::CONNECT_TIMEOUT.as_secs(),
            user_agent: constants::http::USER_AGENT.to_string(),
            max_output_tokens: constants::chat::MAX_OUTPUT_TOKENS,
            model: None,
        }
    }
}

impl ClientConfig {
    /// Load from the default config file and the process environment
    pub fn load() -> Result<Self> {
        let config = Self::load_from(&paths::config_file())?;
        Ok(config.with_env(|key| std::env::var(key).ok()))
    }

    /// Load from a TOML file; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply environment overrides through `lookup`
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(constants::env::BASE_URL).filter(|v| !v.is_empty()) {
            self.base_url = url;
        }
        if let Some(token) = lookup(constants::env::TOKEN).filter(|v| !v.is_empty()) {
            self.bearer_token = Some(token);
        }
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
