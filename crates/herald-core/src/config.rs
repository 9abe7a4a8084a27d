//! Dispatcher configuration: YAML file + environment overrides.
//!
//! Environment names match the producer deployment (`MESSAGES_PER_PROCESS`,
//! `TOKEN_TYPE`, `SKIPPING_COUNTER_LIMIT`, ...). A prefix can be set when several
//! dispatchers share one environment.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app::DispatchSettings;
use crate::domain::{TOKEN_TYPE_BOTH, TokenTypeFilter};
use crate::ports::MAX_BATCH_ENTRIES;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Environment variable error: {0}")]
    EnvError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Tasks fetched per cycle.
    pub message_num: usize,

    /// Token type filter; `"both"` disables it.
    pub token_type: String,

    /// Consecutive skipped ticks before a restart is requested.
    pub skipping_counter_limit: u32,

    pub tick_interval_ms: u64,

    /// Entries per transport request.
    pub max_batch_entries: usize,

    pub queue_url: Option<String>,
    pub region: String,
    pub log_level: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            message_num: 1,
            token_type: TOKEN_TYPE_BOTH.to_string(),
            skipping_counter_limit: 10,
            tick_interval_ms: 5_000,
            max_batch_entries: MAX_BATCH_ENTRIES,
            queue_url: None,
            region: "us-east-1".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl DispatcherConfig {
    pub fn token_type_filter(&self) -> TokenTypeFilter {
        match self.token_type.parse() {
            Ok(filter) => filter,
            Err(never) => match never {},
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            message_num: self.message_num,
            token_type: self.token_type_filter(),
            tick_interval: self.tick_interval(),
            skipping_counter_limit: self.skipping_counter_limit,
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.skipping_counter_limit == 0 {
            return Err(ConfigError::ValidationError(
                "skipping_counter_limit must be at least 1".to_string(),
            ));
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "tick_interval_ms must be greater than 0".to_string(),
            ));
        }
        if !(1..=MAX_BATCH_ENTRIES).contains(&self.max_batch_entries) {
            return Err(ConfigError::ValidationError(format!(
                "max_batch_entries must be between 1 and {MAX_BATCH_ENTRIES}"
            )));
        }
        if self.token_type.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "token_type must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

enum EnvSource {
    Process,
    Map(HashMap<String, String>),
}

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    prefix: Option<String>,
    env: EnvSource,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            prefix: None,
            env: EnvSource::Process,
        }
    }

    /// Variables are read as `{prefix}_{NAME}`.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Reads variables from `vars` instead of the process environment.
    pub fn with_env_map(mut self, vars: HashMap<String, String>) -> Self {
        self.env = EnvSource::Map(vars);
        self
    }

    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<DispatcherConfig> {
        let content = std::fs::read_to_string(path)?;
        let mut config: DispatcherConfig = serde_yaml::from_str(&content)?;
        self.apply_env_overrides(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_env(&self) -> ConfigResult<DispatcherConfig> {
        let mut config = DispatcherConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<DispatcherConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    fn apply_env_overrides(&self, config: &mut DispatcherConfig) -> ConfigResult<()> {
        if let Some(n) = self.parse_env_var("MESSAGES_PER_PROCESS")? {
            config.message_num = n;
        }
        if let Some(token_type) = self.get_env_var("TOKEN_TYPE") {
            config.token_type = token_type;
        }
        if let Some(limit) = self.parse_env_var("SKIPPING_COUNTER_LIMIT")? {
            config.skipping_counter_limit = limit;
        }
        if let Some(ms) = self.parse_env_var("TICK_INTERVAL_MS")? {
            config.tick_interval_ms = ms;
        }
        if let Some(n) = self.parse_env_var("MAX_BATCH_ENTRIES")? {
            config.max_batch_entries = n;
        }
        if let Some(url) = self.get_env_var("AWS_QUEUE_URL") {
            config.queue_url = Some(url);
        }
        if let Some(region) = self.get_env_var("AWS_REGION") {
            config.region = region;
        }
        if let Some(level) = self.get_env_var("LOG_LEVEL") {
            config.log_level = level;
        }
        Ok(())
    }

    fn parse_env_var<T>(&self, name: &str) -> ConfigResult<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get_env_var(name) {
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|e| ConfigError::EnvError(format!("Invalid {name}: {e}"))),
            None => Ok(None),
        }
    }

    /// Empty values count as unset.
    fn get_env_var(&self, name: &str) -> Option<String> {
        let key = match &self.prefix {
            Some(prefix) => format!("{prefix}_{name}"),
            None => name.to_string(),
        };
        let value = match &self.env {
            EnvSource::Process => std::env::var(&key).ok(),
            EnvSource::Map(vars) => vars.get(&key).cloned(),
        };
        value.filter(|v| !v.is_empty())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
