use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use templater_client::ClientConfig;
use tokio::fs;
use tracing::{debug, warn};

use orchestrator::{ControllerConfig, DEFAULT_MAX_STALLED_STEPS};

pub const ENV_CONFIG_PATH: &str = "TEMPLATER_CONFIG";
pub const ENV_SERVICE_URL: &str = "TEMPLATER_SERVICE_URL";
pub const ENV_SERVICE_API_KEY: &str = "TEMPLATER_SERVICE_API_KEY";
pub const ENV_PORT: &str = "TEMPLATER_PORT";

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Where the remote generation service lives and how to talk to it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationServiceConfig {
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Unset means no timeout; slow calls are waited out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    pub max_retries: u32,
}

impl Default for GenerationServiceConfig {
    fn default() -> Self {
        let client = ClientConfig::default();
        Self {
            base_url: client.base_url,
            api_key: None,
            request_timeout_secs: None,
            max_retries: client.max_retries,
        }
    }
}

impl GenerationServiceConfig {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            request_timeout: self.request_timeout_secs.map(Duration::from_secs),
            max_retries: self.max_retries,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub max_stalled_steps: u32,
    pub event_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_stalled_steps: DEFAULT_MAX_STALLED_STEPS,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl OrchestratorConfig {
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            max_stalled_steps: self.max_stalled_steps,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub generation_service: GenerationServiceConfig,
    pub orchestrator: OrchestratorConfig,
    /// Default tracing directive; `RUST_LOG` takes precedence.
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            generation_service: GenerationServiceConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            log_filter: "info,server=debug,orchestrator=debug".to_string(),
        }
    }
}

impl AppConfig {
    /// Read config from a JSON file, falling back to defaults
    pub async fn read(config_path: &Path) -> Self {
        if !config_path.exists() {
            debug!(path = %config_path.display(), "Config file does not exist, using defaults");
            return Self::default();
        }

        match fs::read_to_string(config_path).await {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => {
                    debug!(path = %config_path.display(), "Config loaded successfully");
                    config
                }
                Err(e) => {
                    warn!(path = %config_path.display(), error = %e, "Failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(e) => {
                warn!(path = %config_path.display(), error = %e, "Failed to read config file, using defaults");
                Self::default()
            }
        }
    }

    /// Applies `TEMPLATER_*` environment overrides.
    pub fn apply_env(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(ENV_SERVICE_URL).filter(|v| !v.trim().is_empty()) {
            self.generation_service.base_url = url;
        }
        if let Some(key) = lookup(ENV_SERVICE_API_KEY).filter(|v| !v.trim().is_empty()) {
            self.generation_service.api_key = Some(key);
        }
        if let Some(port) = lookup(ENV_PORT) {
            match port.trim().parse() {
                Ok(port) => self.server.port = port,
                Err(e) => warn!(value = %port, error = %e, "Ignoring invalid {}", ENV_PORT),
            }
        }
        self
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.generation_service.max_retries, 0);
        assert!(config.generation_service.request_timeout_secs.is_none());
        assert_eq!(config.orchestrator.max_stalled_steps, 3);
        assert!(config
            .generation_service
            .client_config()
            .request_timeout
            .is_none());
    }

    #[tokio::test]
    async fn test_config_read_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let config = AppConfig::read(&temp_dir.path().join("missing.json")).await;
        assert_eq!(config.server.port, DEFAULT_PORT);
    }

    #[tokio::test]
    async fn test_config_read_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("templater.json");
        std::fs::write(
            &path,
            r#"{
                "server": { "port": 4000 },
                "generation_service": {
                    "base_url": "http://gen.local/api",
                    "request_timeout_secs": 90
                }
            }"#,
        )
        .unwrap();

        let config = AppConfig::read(&path).await;
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.generation_service.base_url, "http://gen.local/api");
        assert_eq!(
            config.generation_service.client_config().request_timeout,
            Some(Duration::from_secs(90))
        );
        assert_eq!(config.orchestrator.event_capacity, DEFAULT_EVENT_CAPACITY);
    }

    #[tokio::test]
    async fn test_config_read_invalid_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("templater.json");
        std::fs::write(&path, "{ not json").unwrap();

        let config = AppConfig::read(&path).await;
        assert_eq!(config.server.port, DEFAULT_PORT);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_SERVICE_URL, "http://override:9000/api"),
            (ENV_SERVICE_API_KEY, "secret"),
            (ENV_PORT, "8123"),
        ]);

        let config =
            AppConfig::default().apply_overrides(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(
            config.generation_service.base_url,
            "http://override:9000/api"
        );
        assert_eq!(config.generation_service.api_key.as_deref(), Some("secret"));
        assert_eq!(config.server.port, 8123);
        assert_eq!(config.bind_address(), "0.0.0.0:8123");
    }

    #[test]
    fn test_invalid_port_override_ignored() {
        let config = AppConfig::default().apply_overrides(|key| {
            (key == ENV_PORT).then(|| "not-a-port".to_string())
        });
        assert_eq!(config.server.port, DEFAULT_PORT);
    }
}
