//! Registry configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Errors raised while loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid registry configuration: {0}")]
    Invalid(String),
}

/// Timing knobs of the lifecycle engine. All durations are milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Delay between creation and promotion to `Scheduled`.
    pub scheduling_delay_ms: u64,
    /// How long `stop` waits for the executor to acknowledge cancellation.
    pub stop_grace_ms: u64,
    /// Upper bound on a single injection run (`None` = unbounded).
    pub run_timeout_ms: Option<u64>,
    /// Upper bound on collecting result metrics from monitoring.
    pub monitoring_timeout_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            scheduling_delay_ms: 1_000,
            stop_grace_ms: 5_000,
            run_timeout_ms: None,
            monitoring_timeout_ms: 2_000,
        }
    }
}

impl RegistryConfig {
    /// Load a JSON config file. Missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.run_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "run_timeout_ms must be positive when set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn scheduling_delay(&self) -> Duration {
        Duration::from_millis(self.scheduling_delay_ms)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_ms.map(Duration::from_millis)
    }

    pub fn monitoring_timeout(&self) -> Duration {
        Duration::from_millis(self.monitoring_timeout_ms)
    }
}
