//! Configuration file support

use parley_ai::ClientConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Model used when neither the command line nor the config names one
pub const DEFAULT_MODEL: &str = "llama3.2";

/// Configuration for parley
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server base URL, e.g. http://localhost:11434
    pub base_url: Option<String>,
    /// Bearer token sent with every request
    pub api_key: Option<String>,
    /// Default model
    pub model: Option<String>,
    /// Where conversations are stored
    pub data_dir: Option<String>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("parley")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("PARLEY_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from the default location
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load config from `path`, falling back to defaults on any problem
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Write an example config file if none exists yet
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&path, example_config())?;
        Ok(path)
    }

    /// Server settings: command line, then config file, then environment
    pub fn client_config(&self, base_url: Option<String>, api_key: Option<String>) -> ClientConfig {
        let env = ClientConfig::from_env();
        ClientConfig {
            base_url: base_url
                .or_else(|| self.base_url.clone())
                .unwrap_or(env.base_url),
            api_key: api_key
                .or_else(|| self.api_key.clone())
                .unwrap_or(env.api_key),
        }
    }

    pub fn model(&self, model: Option<String>) -> String {
        model
            .or_else(|| self.model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }

    pub fn data_dir(&self, data_dir: Option<PathBuf>) -> PathBuf {
        data_dir
            .or_else(|| self.data_dir.as_ref().map(|d| expand_home(d)))
            .unwrap_or_else(parley_chat::FileStorage::default_dir)
    }
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# parley configuration file
# Place at ~/.config/parley/config.toml (Linux) or set PARLEY_CONFIG_PATH

# OpenAI-compatible server (Ollama by default)
base_url = "http://localhost:11434"

# Bearer token; Ollama accepts any value
api_key = "ollama"

# Default model
model = "llama3.2"

# Where conversations are stored (optional)
# data_dir = "~/.local/share/parley"
"#
}
