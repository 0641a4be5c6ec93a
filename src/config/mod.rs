//! Configuration management for Keepsake

pub mod schema;

pub use schema::Config;

use crate::cache::store::write_private;
use crate::error::{KeepsakeError, KeepsakeResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("keepsake")
            .join("config.toml")
    }

    /// Get the state directory path
    pub fn state_dir() -> PathBuf {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("keepsake")
    }

    /// Get the audit log path
    pub fn audit_log_path() -> PathBuf {
        Self::state_dir().join("audit.log")
    }

    /// Get the default directory for fallback files.
    ///
    /// Unlike the other locations this never falls back to the working
    /// directory, since the files hold secret material.
    pub fn fallback_dir() -> KeepsakeResult<PathBuf> {
        dirs::cache_dir()
            .map(|dir| dir.join("keepsake").join("fallback"))
            .ok_or_else(|| {
                KeepsakeError::PathResolution("no home or cache directory available".to_string())
            })
    }

    /// Load configuration, using defaults if the file does not exist
    pub async fn load(&self) -> KeepsakeResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> KeepsakeResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| KeepsakeError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| KeepsakeError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> KeepsakeResult<()> {
        self.ensure_config_dir().await?;

        // May carry an API token
        let content = toml::to_string_pretty(config)?;
        write_private(&self.config_path, content.as_bytes()).map_err(|e| {
            KeepsakeError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> KeepsakeResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| KeepsakeError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_default_when_missing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nonexistent.toml");
        let manager = ConfigManager::with_path(path);

        let config = manager.load().await.unwrap();
        assert_eq!(config.general.log_format, "text");
    }

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.toml");
        let manager = ConfigManager::with_path(path);

        let mut config = Config::default();
        config.api.project = Some("backend".to_string());
        config.fallback.exit_on_write_failure = false;

        manager.save(&config).await.unwrap();
        let loaded = manager.load().await.unwrap();

        assert_eq!(loaded.api.project.as_deref(), Some("backend"));
        assert!(!loaded.fallback.exit_on_write_failure);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn saved_config_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        let manager = ConfigManager::with_path(path.clone());

        let mut config = Config::default();
        config.api.token = Some("dp.st.secret".into());
        manager.save(&config).await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        let leftovers: Vec<_> = std::fs::read_dir(temp.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn invalid_file_reports_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[fallback]\nenabled = \"maybe\"\n").unwrap();

        let err = ConfigManager::with_path(path.clone()).load().await.unwrap_err();
        match err {
            KeepsakeError::ConfigInvalid { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    #[serial_test::serial]
    fn fallback_dir_follows_xdg_cache_home() {
        let temp = TempDir::new().unwrap();
        let previous = std::env::var_os("XDG_CACHE_HOME");
        std::env::set_var("XDG_CACHE_HOME", temp.path());

        let dir = ConfigManager::fallback_dir();

        match previous {
            Some(value) => std::env::set_var("XDG_CACHE_HOME", value),
            None => std::env::remove_var("XDG_CACHE_HOME"),
        }
        #[cfg(target_os = "linux")]
        assert_eq!(dir.unwrap(), temp.path().join("keepsake").join("fallback"));
        #[cfg(not(target_os = "linux"))]
        assert!(dir.is_ok());
    }
}
