//! Gateway configuration with validation.
//!
//! Loaded from an optional JSON file, then overridden from `PG_*` environment
//! variables, then validated.

use crate::domain::window::WindowPolicy;
use pipeline_bus::Hop;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default number of requests sent before anything is yielded
pub const DEFAULT_PREFETCH: usize = 50;

/// Default number of requests admitted per delivered response
pub const DEFAULT_PREFETCH_ON_RECV: usize = 1;

/// Main gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Hop name recorded on every envelope route
    pub name: String,
    /// Instance identity recorded alongside the name
    pub identity: String,
    /// Initial window: requests sent before the first response is awaited
    pub prefetch: usize,
    /// Replenishment: requests admitted per delivered response
    pub prefetch_on_recv: usize,
    /// Warn when the initial prefetch fill takes longer than this
    #[serde(with = "humantime_serde")]
    pub prefetch_warn_after: Duration,
    /// Minimum time between progress snapshots of a streaming call
    #[serde(with = "humantime_serde")]
    pub stats_interval: Duration,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            name: "gateway".to_string(),
            identity: uuid::Uuid::new_v4().to_string(),
            prefetch: DEFAULT_PREFETCH,
            prefetch_on_recv: DEFAULT_PREFETCH_ON_RECV,
            prefetch_warn_after: Duration::from_secs(5),
            stats_interval: Duration::from_secs(1),
            logging: LoggingConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("name cannot be empty".into()));
        }

        if self.identity.trim().is_empty() {
            return Err(ConfigError::Invalid("identity cannot be empty".into()));
        }

        WindowPolicy::new(self.prefetch, self.prefetch_on_recv)?;

        if self.stats_interval.is_zero() {
            return Err(ConfigError::Invalid("stats_interval cannot be 0".into()));
        }

        Ok(())
    }

    /// Read a JSON configuration file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// File (if any), then environment overrides, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Override fields from the process environment.
    ///
    /// # Environment Variables
    ///
    /// - `PG_NAME`: Hop name
    /// - `PG_IDENTITY`: Hop identity
    /// - `PG_PREFETCH`: Initial window
    /// - `PG_PREFETCH_ON_RECV`: Replenishment window
    /// - `PG_LOG_LEVEL`: Log filter (`RUST_LOG` still wins at subscriber setup)
    /// - `PG_JSON_LOGS`: `true`/`1` for JSON log lines
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Override fields from an arbitrary key lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup("PG_NAME") {
            self.name = name;
        }
        if let Some(identity) = lookup("PG_IDENTITY") {
            self.identity = identity;
        }
        if let Some(value) = lookup("PG_PREFETCH") {
            self.prefetch = parse_count("PG_PREFETCH", &value)?;
        }
        if let Some(value) = lookup("PG_PREFETCH_ON_RECV") {
            self.prefetch_on_recv = parse_count("PG_PREFETCH_ON_RECV", &value)?;
        }
        if let Some(level) = lookup("PG_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(value) = lookup("PG_JSON_LOGS") {
            self.logging.json = value.to_lowercase() == "true" || value == "1";
        }
        Ok(())
    }

    /// The hop this gateway records on envelope routes
    pub fn hop(&self) -> Hop {
        Hop::new(self.name.clone(), self.identity.clone())
    }

    /// Window sizes for streaming calls
    pub fn window(&self) -> Result<WindowPolicy, ConfigError> {
        WindowPolicy::new(self.prefetch, self.prefetch_on_recv)
    }
}

fn parse_count(var: &str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var: var.to_string(),
        value: value.to_string(),
    })
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `pipeline_gateway=debug`
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Window sizes out of range
    #[error("invalid window: {0}")]
    InvalidWindow(String),
    /// Environment override that does not parse
    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: String, value: String },
    /// Configuration file could not be read
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Configuration file is not valid JSON for this schema
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Duration fields as human-readable strings (`"5s"`, `"250ms"`, `"2m"`)
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_nanos() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, &'static str> {
        let s = s.trim();
        // "ms" before "s" and "m"
        if let Some(ms) = s.strip_suffix("ms") {
            ms.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| "invalid milliseconds")
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid seconds")
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.trim()
                .parse::<u64>()
                .map(|m| Duration::from_secs(m * 60))
                .map_err(|_| "invalid minutes")
        } else {
            // Plain number: seconds
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid duration format")
        }
    }
}
