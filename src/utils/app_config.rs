/// Application configuration management
/// Stores dashboard settings in ~/.config/pm2-dash/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::constants::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// pm2 executable
    pub pm2_bin: String,
    /// pm2 name of the dashboard itself, hidden from the process list
    pub self_name: String,
    /// Persisted network identity record written by the setup scripts
    pub network_config: PathBuf,
    pub network_agent_bin: String,
    /// Container running the peer agent instance; empty disables the lookup
    pub peer_container: String,
    pub poll_interval: String,
    pub probe_timeout: String,
    pub host: String,
    pub port: u16,
    pub cors: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            pm2_bin: DEFAULT_PM2_BIN.to_string(),
            self_name: DEFAULT_SELF_NAME.to_string(),
            network_config: PathBuf::from(DEFAULT_NETWORK_CONFIG),
            network_agent_bin: DEFAULT_NETWORK_AGENT_BIN.to_string(),
            peer_container: DEFAULT_PEER_CONTAINER.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL.to_string(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT.to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            cors: false,
        }
    }
}

impl AppConfig {
    /// Get config file path ($PM2_DASH_CONFIG wins over the user config dir)
    pub fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("PM2_DASH_CONFIG") {
            return Ok(PathBuf::from(path));
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine the user config directory")?;

        Ok(config_dir.join("pm2-dash").join("config.toml"))
    }

    /// Load configuration from the default location, then apply env overrides
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a file, falling back to defaults if it is missing
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        fs::write(path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// `PORT` and `PM2_DASH_NETWORK_CONFIG` take precedence over the file
    pub fn apply_env_overrides(&mut self) {
        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse().ok()) {
            self.port = port;
        }
        if let Ok(path) = std::env::var("PM2_DASH_NETWORK_CONFIG") {
            self.network_config = PathBuf::from(path);
        }
    }

    pub fn poll_interval(&self) -> Result<Duration> {
        humantime::parse_duration(&self.poll_interval)
            .with_context(|| format!("Invalid poll_interval '{}'", self.poll_interval))
    }

    pub fn probe_timeout(&self) -> Result<Duration> {
        humantime::parse_duration(&self.probe_timeout)
            .with_context(|| format!("Invalid probe_timeout '{}'", self.probe_timeout))
    }

    pub fn peer_container(&self) -> Option<&str> {
        let name = self.peer_container.trim();
        (!name.is_empty()).then_some(name)
    }

    /// Validate configuration values, returning human-readable problems
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.pm2_bin.trim().is_empty() {
            errors.push("pm2_bin must not be empty".to_string());
        }
        if self.self_name.trim().is_empty() {
            errors.push("self_name must not be empty".to_string());
        }
        match self.poll_interval() {
            Ok(d) if d.is_zero() => errors.push("poll_interval must be greater than zero".to_string()),
            Ok(_) => {}
            Err(e) => errors.push(e.to_string()),
        }
        match self.probe_timeout() {
            Ok(d) if d.is_zero() => errors.push("probe_timeout must be greater than zero".to_string()),
            Ok(_) => {}
            Err(e) => errors.push(e.to_string()),
        }
        if self.port == 0 {
            errors.push("port must be non-zero".to_string());
        }

        errors
    }
}
