mod loader;

use serde::{Deserialize, Serialize};
use std::path::Path;

pub use loader::load_config;

use crate::api::GENERATE_PATH;

/// Address of the local Ollama server
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:11434";

/// Route the proxy serves generation requests on
pub const PROXY_GENERATE_ROUTE: &str = "/api/ollama-proxy";

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub stats: StatsConfig,
}

/// Proxy listen address
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    3000
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

/// Inference server the proxy relays to
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Full backend URL (e.g. "http://localhost:11434")
    #[serde(default = "default_backend_url")]
    pub url: String,
}

fn default_backend_url() -> String {
    DEFAULT_BACKEND_URL.to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
        }
    }
}

impl BackendConfig {
    /// Returns the base URL with trailing slash stripped
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    /// Upstream generate endpoint
    pub fn generate_url(&self) -> String {
        format!("{}{}", self.base_url(), GENERATE_PATH)
    }
}

/// Terminal chat client settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatConfig {
    #[serde(default = "default_model")]
    pub model: String,
    /// Explicit generation endpoint; defaults to this proxy's own route
    #[serde(default)]
    pub endpoint: Option<String>,
}

fn default_model() -> String {
    "llama3".to_string()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            endpoint: None,
        }
    }
}

/// Generation stats logging
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatsConfig {
    #[serde(default = "default_stats_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub format: StatsFormat,
}

fn default_stats_enabled() -> bool {
    true
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            enabled: default_stats_enabled(),
            format: StatsFormat::default(),
        }
    }
}

/// Stats output format
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StatsFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        load_config(path)
    }

    /// Load configuration, falling back to the default locations and then to
    /// built-in defaults when no file exists
    pub fn load_or_default(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        match config_path {
            Some(path) => Self::from_file(path),
            None => {
                let default_paths = ["config.yaml", "config.yml", "./config/config.yaml"];
                for p in default_paths {
                    let path = Path::new(p);
                    if path.exists() {
                        return Self::from_file(path);
                    }
                }
                tracing::debug!("No config file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Check values serde cannot check
    pub fn validate(&self) -> Result<(), ConfigError> {
        let backend = url::Url::parse(&self.backend.url)
            .map_err(|e| ConfigError::Validation(format!("backend.url {:?}: {}", self.backend.url, e)))?;
        if !matches!(backend.scheme(), "http" | "https") {
            return Err(ConfigError::Validation(format!(
                "backend.url must be http or https, got {}",
                backend.scheme()
            )));
        }

        if let Some(ref endpoint) = self.chat.endpoint {
            url::Url::parse(endpoint)
                .map_err(|e| ConfigError::Validation(format!("chat.endpoint {:?}: {}", endpoint, e)))?;
        }

        if self.chat.model.trim().is_empty() {
            return Err(ConfigError::Validation("chat.model must not be empty".to_string()));
        }

        Ok(())
    }

    /// Where the chat client sends generation requests.
    ///
    /// `direct` bypasses the proxy and talks to the inference server.
    pub fn chat_endpoint(&self, direct: bool) -> String {
        if direct {
            return self.backend.generate_url();
        }
        if let Some(ref endpoint) = self.chat.endpoint {
            return endpoint.clone();
        }
        // A wildcard listen address is not connectable; use loopback
        let host = match self.server.host.as_str() {
            "0.0.0.0" | "::" | "[::]" => "127.0.0.1",
            other => other,
        };
        format!("http://{}:{}{}", host, self.server.port, PROXY_GENERATE_ROUTE)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}
