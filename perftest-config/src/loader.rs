//! Configuration loading and environment variable handling

use crate::domains::logging::{LogFormat, LogLevel, LoggingConfig};
use crate::domains::timing::TimingConfig;
use crate::domains::workspace::WorkspaceConfig;
use crate::domains::PerftestConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "PERFTEST".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<PerftestConfig> {
        let content = std::fs::read_to_string(path)?;
        let mut config: PerftestConfig = serde_yaml::from_str(&content)?;

        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<PerftestConfig> {
        let mut config = PerftestConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<PerftestConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    fn apply_env_overrides(&self, config: &mut PerftestConfig) -> ConfigResult<()> {
        self.apply_logging_overrides(&mut config.logging)?;
        self.apply_workspace_overrides(&mut config.workspace);
        self.apply_timing_overrides(&mut config.timing)?;
        Ok(())
    }

    fn apply_logging_overrides(&self, config: &mut LoggingConfig) -> ConfigResult<()> {
        if let Ok(log_level) = self.get_env_var("LOG_LEVEL") {
            config.level = LogLevel::from_str(&log_level)
                .map_err(|_| ConfigError::env(format!("Invalid LOG_LEVEL: {}", log_level)))?;
        }

        if let Ok(format) = self.get_env_var("LOG_FORMAT") {
            config.format = LogFormat::from_str(&format)
                .map_err(|_| ConfigError::env(format!("Invalid LOG_FORMAT: {}", format)))?;
        }

        Ok(())
    }

    fn apply_workspace_overrides(&self, config: &mut WorkspaceConfig) {
        if let Ok(root) = self.get_env_var("WORKSPACE_ROOT") {
            config.root = PathBuf::from(root);
        }
    }

    fn apply_timing_overrides(&self, config: &mut TimingConfig) -> ConfigResult<()> {
        if let Ok(settle) = self.get_env_var("COLLECT_SETTLE_SECONDS") {
            let seconds: u64 = settle.parse().map_err(|e| {
                ConfigError::env(format!("Invalid COLLECT_SETTLE_SECONDS: {}", e))
            })?;
            config.collect_settle = Duration::from_secs(seconds);
        }

        if let Ok(timeout) = self.get_env_var("QUEUE_TIMEOUT_SECONDS") {
            let seconds: u64 = timeout.parse().map_err(|e| {
                ConfigError::env(format!("Invalid QUEUE_TIMEOUT_SECONDS: {}", e))
            })?;
            config.queue_poll.timeout = Duration::from_secs(seconds);
        }

        Ok(())
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
