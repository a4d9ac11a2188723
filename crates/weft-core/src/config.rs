//! Configuration.
//!
//! All sections are optional in the file; missing keys take defaults.
//!
//! ```json
//! {
//!   "thread":   { "idle_backoff_ms": 1, "cycle_pause_ms": 0 },
//!   "tick":     { "period_ms": 16 },
//!   "registry": { "confine_binding": false },
//!   "logging":  { "filter": "info" }
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeftConfig {
    pub thread: ThreadExecutorConfig,
    pub tick: TickConfig,
    pub registry: RegistryConfig,
    pub logging: LoggingConfig,
}

impl WeftConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }
}

/// Loop settings for thread-backed executors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadExecutorConfig {
    /// Sleep between checks while the executor is disabled.
    pub idle_backoff_ms: u64,
    /// Pause after each cycle. 0 keeps the loop busy-polling.
    pub cycle_pause_ms: u64,
}

impl ThreadExecutorConfig {
    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }

    pub fn cycle_pause(&self) -> Duration {
        Duration::from_millis(self.cycle_pause_ms)
    }
}

impl Default for ThreadExecutorConfig {
    fn default() -> Self {
        Self {
            idle_backoff_ms: 1,
            cycle_pause_ms: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Period of the async host loop (`TickDriver::drive`).
    pub period_ms: u64,
}

impl TickConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms.max(1))
    }
}

impl Default for TickConfig {
    fn default() -> Self {
        Self { period_ms: 16 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Only allow `bind` from the thread that built the registry.
    pub confine_binding: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config = WeftConfig::from_json_str("{}").unwrap();
        assert_eq!(config, WeftConfig::default());
        assert_eq!(config.thread.idle_backoff(), Duration::from_millis(1));
        assert!(config.thread.cycle_pause().is_zero());
        assert_eq!(config.tick.period(), Duration::from_millis(16));
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = WeftConfig::from_json_str(
            r#"{ "thread": { "cycle_pause_ms": 5 }, "registry": { "confine_binding": true } }"#,
        )
        .unwrap();
        assert_eq!(config.thread.cycle_pause_ms, 5);
        assert_eq!(config.thread.idle_backoff_ms, 1);
        assert!(config.registry.confine_binding);
    }

    #[test]
    fn zero_tick_period_is_clamped() {
        let tick = TickConfig { period_ms: 0 };
        assert_eq!(tick.period(), Duration::from_millis(1));
    }

    #[test]
    fn malformed_document_is_an_error() {
        let err = WeftConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = WeftConfig::from_path("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
