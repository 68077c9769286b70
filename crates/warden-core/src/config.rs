use anyhow::Context;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Bind and response settings for the status API surface
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusApiConfig {
    /// Interface to bind; defaults to all interfaces
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port to listen on; 0 asks the OS for an ephemeral port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Banner returned by `GET /`
    #[serde(default = "default_message")]
    pub message: String,
}

impl Default for StatusApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            message: default_message(),
        }
    }
}

impl StatusApiConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Main supervisor configuration
///
/// The supervised command and its working directory are configuration
/// values rather than compile-time constants, so the same supervisor can
/// front any long-lived backend process.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(setter(into, strip_option))]
#[serde(rename_all = "camelCase")]
pub struct SupervisorConfig {
    /// Label used in logs
    pub name: String,

    /// Executable to launch
    pub command: String,

    #[builder(default)]
    #[builder(setter(custom))]
    #[serde(default)]
    pub args: Vec<String>,

    #[builder(default)]
    #[builder(setter(custom))]
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Working directory for the child; inherits the supervisor's when unset
    #[builder(default)]
    #[serde(default)]
    pub working_directory: Option<PathBuf>,

    #[builder(default)]
    #[serde(default)]
    pub status_api: StatusApiConfig,

    /// Delay between graceful and forced termination during shutdown (in milliseconds)
    #[builder(default = "default_shutdown_grace_ms()")]
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

impl SupervisorConfig {
    pub fn builder() -> SupervisorConfigBuilder {
        SupervisorConfigBuilder::default()
    }

    /// Load and validate a configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration and return errors if invalid
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.command.trim().is_empty() {
            return Err(anyhow::anyhow!("command must not be empty"));
        }

        if self.shutdown_grace_ms > 60_000 {
            return Err(anyhow::anyhow!(
                "shutdown_grace_ms should not exceed 60 seconds"
            ));
        }

        Ok(())
    }

    /// Get the shutdown grace period as Duration
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl SupervisorConfigBuilder {
    pub fn args<S: ToString, I: IntoIterator<Item = S>>(&mut self, iter: I) -> &mut Self {
        let args: Vec<String> = iter.into_iter().map(|s| s.to_string()).collect();
        self.args = Some(args);
        self
    }

    pub fn env<T: ToString>(&mut self, key: T, value: T) -> &mut Self {
        let map = self.env.get_or_insert_with(HashMap::new);
        map.insert(key.to_string(), value.to_string());

        self
    }

    pub fn env_multi<T: ToString, I: IntoIterator<Item = (T, T)>>(&mut self, iter: I) -> &mut Self {
        let env = self.env.get_or_insert_with(HashMap::new);
        for (key, value) in iter {
            env.insert(key.to_string(), value.to_string());
        }
        self
    }
}

// Default value functions for serde
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5000
}
fn default_message() -> String {
    "Backend supervisor".to_string()
}
fn default_shutdown_grace_ms() -> u64 {
    2_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_basic() {
        let config = SupervisorConfig::builder()
            .name("backend")
            .command("node")
            .args(["index.js"])
            .working_directory("/srv/backend")
            .build()
            .unwrap();

        assert_eq!(config.name, "backend");
        assert_eq!(config.command, "node");
        assert_eq!(config.args, vec!["index.js".to_string()]);
        assert_eq!(config.working_directory, Some(PathBuf::from("/srv/backend")));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_status_api_defaults() {
        let config = SupervisorConfig::builder()
            .name("backend")
            .command("node")
            .build()
            .unwrap();

        assert_eq!(config.status_api.host, "0.0.0.0");
        assert_eq!(config.status_api.port, 5000);
        assert_eq!(config.status_api.bind_addr(), "0.0.0.0:5000");
        assert_eq!(config.shutdown_grace_ms, 2_000);
        assert_eq!(config.shutdown_grace(), Duration::from_millis(2_000));
    }

    #[test]
    fn test_env_setters() {
        let config = SupervisorConfig::builder()
            .name("backend")
            .command("node")
            .env("PORT", "3001")
            .env_multi([("A", "1"), ("B", "2")])
            .build()
            .unwrap();

        assert_eq!(config.env.get("PORT"), Some(&"3001".to_string()));
        assert_eq!(config.env.len(), 3);
    }

    #[test]
    fn test_empty_command_rejected() {
        let config = SupervisorConfig::builder()
            .name("backend")
            .command("  ")
            .build()
            .unwrap();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_excessive_grace_period_rejected() {
        let mut config = SupervisorConfig::builder()
            .name("backend")
            .command("node")
            .build()
            .unwrap();
        config.shutdown_grace_ms = 90_000;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_with_defaults() {
        let raw = r#"{"name": "backend", "command": "node", "args": ["index.js"]}"#;
        let config: SupervisorConfig = serde_json::from_str(raw).unwrap();

        assert_eq!(config.command, "node");
        assert!(config.env.is_empty());
        assert_eq!(config.working_directory, None);
        assert_eq!(config.status_api.port, 5000);
    }

    #[test]
    fn test_json_round_trip() {
        let config = SupervisorConfig::builder()
            .name("backend")
            .command("node")
            .args(["index.js"])
            .build()
            .unwrap();

        let json = serde_json::to_string(&config).unwrap();
        let deserialized: SupervisorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }
}
