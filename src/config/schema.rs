//! Configuration schema for Keepsake
//!
//! Configuration is stored at `~/.config/keepsake/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Secrets API settings
    pub api: ApiConfig,

    /// Offline fallback settings
    pub fallback: FallbackConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Enable audit logging
    pub audit_log: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            audit_log: true,
        }
    }
}

/// Secrets API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API base URL
    pub host: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Access token
    pub token: Option<String>,

    /// Default project
    pub project: Option<String>,

    /// Default config within the project
    pub config: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "https://api.keepsake.dev".to_string(),
            timeout_secs: 10,
            token: None,
            project: None,
            config: None,
        }
    }
}

/// Offline fallback settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Read and write the encrypted fallback file
    pub enabled: bool,

    /// Skip downloading secrets the API reports unchanged
    pub cache: bool,

    /// Never modify the fallback file
    pub readonly: bool,

    /// Never contact the API; read the fallback file only
    pub only: bool,

    /// Fail when the fallback file cannot be written
    pub exit_on_write_failure: bool,

    /// Directory for fallback files (defaults to the platform cache dir)
    pub dir: Option<PathBuf>,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache: true,
            readonly: false,
            only: false,
            exit_on_write_failure: true,
            dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[general]"));
        assert!(toml.contains("[fallback]"));
    }

    #[test]
    fn config_deserializes_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.fallback.enabled);
        assert_eq!(config.api.timeout_secs, 10);
    }

    #[test]
    fn config_deserializes_partial() {
        let toml = r#"
            [fallback]
            readonly = true
            dir = "/var/cache/keepsake"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.fallback.readonly);
        assert_eq!(config.fallback.dir, Some(PathBuf::from("/var/cache/keepsake")));
        assert!(config.fallback.cache); // default preserved
    }
}
