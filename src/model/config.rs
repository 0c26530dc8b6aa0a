use std::path::Path;

use serde::{Deserialize, Serialize};

/// Configuration for the client data layer, loadable from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the REST API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Quiet period of the save debounce timer, in milliseconds.
    #[serde(default = "default_quiet_period_ms")]
    pub quiet_period_ms: u64,
}

fn default_base_url() -> String {
    "http://localhost:8055".to_string()
}

fn default_quiet_period_ms() -> u64 {
    3000
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            base_url: default_base_url(),
            quiet_period_ms: default_quiet_period_ms(),
        }
    }
}

/// Error type for config loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ClientConfig {
    /// Parse a config from TOML text. Missing keys take their defaults.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load a config from a TOML file on disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// The debounce quiet period as a `Duration`.
    pub fn quiet_period(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.quiet_period_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_on_empty_toml() {
        let config = ClientConfig::from_toml("").unwrap();
        assert_eq!(config.base_url, "http://localhost:8055");
        assert_eq!(config.quiet_period_ms, 3000);
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = ClientConfig::from_toml(
            "base_url = \"https://spire.example.com\"\nquiet_period_ms = 500\n",
        )
        .unwrap();
        assert_eq!(config.base_url, "https://spire.example.com");
        assert_eq!(config.quiet_period().as_millis(), 500);
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(ClientConfig::from_toml("base_url = [").is_err());
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("client.toml");
        std::fs::write(&path, "quiet_period_ms = 100\n").unwrap();
        let config = ClientConfig::load(&path).unwrap();
        assert_eq!(config.quiet_period_ms, 100);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(ClientConfig::load(&dir.path().join("nope.toml")).is_err());
    }
}
