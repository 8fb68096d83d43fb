//! Configuration management with validation and defaults
//!
//! Values come from an optional TOML file, then environment overrides, then
//! validation. Every section has serde defaults so a partial file is enough.

use crate::errors::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path, str::FromStr, time::Duration};

/// Longest allowed round, one day
const MAX_ROUND_DURATION_SECS: u64 = 86_400;
const MIN_SCHEDULER_TICK_MS: u64 = 10;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub game: GameConfig,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub scheduler: SchedulerConfig,
}

/// Round rules, hot-reloadable through the coordinator
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub round_duration_secs: u64,
    pub max_active_participants: usize,
    /// Bound on each record store call; read once when the coordinator is built
    pub store_timeout_ms: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            round_duration_secs: 20,
            max_active_participants: 10,
            store_timeout_ms: 5_000,
        }
    }
}

impl GameConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.round_duration_secs == 0 || self.round_duration_secs > MAX_ROUND_DURATION_SECS {
            return Err(ConfigurationError::invalid(
                "game.round_duration_secs",
                self.round_duration_secs,
                "must be between 1 and 86400 seconds",
            ));
        }
        if self.max_active_participants == 0 {
            return Err(ConfigurationError::invalid(
                "game.max_active_participants",
                self.max_active_participants,
                "must be at least 1",
            ));
        }
        if self.store_timeout_ms == 0 {
            return Err(ConfigurationError::invalid(
                "game.store_timeout_ms",
                self.store_timeout_ms,
                "must be at least 1ms",
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: vec!["*".to_string()],
            request_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Rocksdb,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::Memory => write!(f, "memory"),
            StorageBackend::Rocksdb => write!(f, "rocksdb"),
        }
    }
}

impl FromStr for StorageBackend {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "rocksdb" | "rocks" => Ok(StorageBackend::Rocksdb),
            other => Err(ConfigurationError::invalid(
                "storage.backend",
                other,
                "expected 'memory' or 'rocksdb'",
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            data_dir: "./luckynine_data".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub tick_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_ms: 250,
        }
    }
}

impl SchedulerConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

/// Configuration loader with environment variable support
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Load from file and process environment, then validate
    pub fn load(&self) -> Result<AppConfig, ConfigurationError> {
        self.load_with(|key| std::env::var(key).ok())
    }

    /// Same as [`load`](Self::load) with an explicit variable lookup
    pub fn load_with<F>(&self, lookup: F) -> Result<AppConfig, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match self.config_path {
            Some(ref path) => self.load_from_file(path)?,
            None => AppConfig::default(),
        };

        self.apply_overrides_from(&mut config, lookup)?;
        self.validate(&config)?;
        Ok(config)
    }

    fn load_from_file(&self, path: &str) -> Result<AppConfig, ConfigurationError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path, e)))?;

        toml::from_str(&content)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e)))
    }

    /// Apply environment overrides. `SESSION_DURATION` and
    /// `MAX_PLAYERS_PER_SESSION` are accepted alongside the prefixed names.
    pub fn apply_overrides_from<F>(
        &self,
        config: &mut AppConfig,
        lookup: F,
    ) -> Result<(), ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |names: &[&'static str]| -> Option<(&'static str, String)> {
            names
                .iter()
                .find_map(|name| lookup(name).map(|value| (*name, value)))
        };

        if let Some((name, value)) = var(&["LUCKYNINE_ROUND_DURATION_SECS", "SESSION_DURATION"]) {
            config.game.round_duration_secs = parse_var(name, value, "invalid duration")?;
        }
        if let Some((name, value)) = var(&["LUCKYNINE_MAX_ACTIVE_PARTICIPANTS", "MAX_PLAYERS_PER_SESSION"]) {
            config.game.max_active_participants = parse_var(name, value, "invalid participant count")?;
        }
        if let Some((name, value)) = var(&["LUCKYNINE_STORE_TIMEOUT_MS"]) {
            config.game.store_timeout_ms = parse_var(name, value, "invalid timeout value")?;
        }

        if let Some((_, host)) = var(&["LUCKYNINE_HOST"]) {
            config.server.host = host;
        }
        if let Some((name, value)) = var(&["LUCKYNINE_PORT", "PORT"]) {
            config.server.port = parse_var(name, value, "invalid port number")?;
        }
        if let Some((_, origins)) = var(&["LUCKYNINE_CORS_ORIGINS"]) {
            config.server.cors_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }

        if let Some((_, backend)) = var(&["LUCKYNINE_STORAGE"]) {
            config.storage.backend = backend.parse()?;
        }
        if let Some((_, data_dir)) = var(&["LUCKYNINE_DATA_DIR"]) {
            config.storage.data_dir = data_dir;
        }

        if let Some((name, value)) = var(&["LUCKYNINE_SCHEDULER_ENABLED"]) {
            config.scheduler.enabled = parse_var(name, value, "invalid boolean value")?;
        }
        if let Some((name, value)) = var(&["LUCKYNINE_SCHEDULER_TICK_MS"]) {
            config.scheduler.tick_ms = parse_var(name, value, "invalid tick value")?;
        }

        Ok(())
    }

    pub fn validate(&self, config: &AppConfig) -> Result<(), ConfigurationError> {
        config.game.validate()?;

        if config.server.port == 0 {
            return Err(ConfigurationError::invalid("server.port", 0, "port cannot be zero"));
        }
        if config.server.request_timeout_secs == 0 {
            return Err(ConfigurationError::invalid(
                "server.request_timeout_secs",
                0,
                "request timeout cannot be zero",
            ));
        }
        if config.scheduler.tick_ms < MIN_SCHEDULER_TICK_MS {
            return Err(ConfigurationError::invalid(
                "scheduler.tick_ms",
                config.scheduler.tick_ms,
                "tick must be at least 10ms",
            ));
        }
        if config.storage.backend == StorageBackend::Rocksdb && config.storage.data_dir.is_empty() {
            return Err(ConfigurationError::MissingRequired("storage.data_dir".to_string()));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, config: &AppConfig, path: &str) -> Result<(), ConfigurationError> {
        let toml_string = toml::to_string_pretty(config)
            .map_err(|e| ConfigurationError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, toml_string)
            .map_err(|e| ConfigurationError::SaveFailed(format!("Failed to write to {}: {}", path, e)))
    }
}

fn parse_var<T: FromStr>(name: &str, value: String, reason: &str) -> Result<T, ConfigurationError> {
    let parsed = value.trim().parse();
    parsed.map_err(|_| ConfigurationError::invalid(name, value, reason))
}
