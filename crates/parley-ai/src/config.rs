//! Connection settings for the completion server

use serde::{Deserialize, Serialize};

/// Default server: a local Ollama instance
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
/// Ollama accepts any bearer token
pub const DEFAULT_API_KEY: &str = "ollama";

/// Where to send requests and how to authenticate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: DEFAULT_API_KEY.to_string(),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Defaults overlaid with `PARLEY_BASE_URL` / `PARLEY_API_KEY`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(url) = lookup("PARLEY_BASE_URL").filter(|v| !v.is_empty()) {
            config.base_url = url;
        }
        if let Some(key) = lookup("PARLEY_API_KEY").filter(|v| !v.is_empty()) {
            config.api_key = key;
        }
        config
    }

    /// Base URL without a trailing slash
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Full URL for an API path such as `/v1/chat/completions`
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base(), path)
    }
}
