//! Application configuration structures.

use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::publisher::DEFAULT_NAMESPACE;
use crate::source::{DEFAULT_CHANNEL_CAPACITY, HttpPollConfig};
use crate::staleness::DEFAULT_STALE_THRESHOLD;

use super::validation::{ConfigError, is_valid_metric_prefix};

// =============================================================================
// Constants
// =============================================================================

/// Default metrics server port.
pub const DEFAULT_PORT: u16 = 9118;

/// Default metrics server bind address.
pub const DEFAULT_BIND: &str = "0.0.0.0";

fn default_stale_threshold() -> Duration {
    DEFAULT_STALE_THRESHOLD
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

// =============================================================================
// Server Configuration
// =============================================================================

/// Metrics server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address (default: "0.0.0.0").
    pub bind: String,

    /// Server port (default: 9118).
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

// =============================================================================
// Metrics / Ingest Configuration
// =============================================================================

/// Published metric naming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Metric name prefix (default: "rtl_433").
    pub namespace: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

/// Ingestion loop settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Samples further than this from now are logged as stale (default: 120s).
    #[serde(default = "default_stale_threshold", with = "humantime_serde")]
    pub stale_threshold: Duration,

    /// Line channel capacity between source and ingestion (default: 1024).
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            stale_threshold: DEFAULT_STALE_THRESHOLD,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Metrics server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Metric naming.
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Ingestion settings.
    #[serde(default)]
    pub ingest: IngestConfig,

    /// HTTP poll mode settings. Poll mode is active when `poll.url` is set.
    #[serde(default)]
    pub poll: HttpPollConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Whether lines come from a polled URL rather than stdin.
    pub fn is_poll_mode(&self) -> bool {
        self.poll.url.is_some()
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate server bind address
        self.server.bind.parse::<IpAddr>().map_err(|_| {
            ConfigError::ValidationError(format!(
                "invalid server bind address: '{}'",
                self.server.bind
            ))
        })?;

        // Validate server port
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "server port must be non-zero".to_string(),
            ));
        }

        if !is_valid_metric_prefix(&self.metrics.namespace) {
            return Err(ConfigError::ValidationError(format!(
                "invalid metrics namespace: '{}'",
                self.metrics.namespace
            )));
        }

        if self.ingest.channel_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "ingest channel_capacity must be positive".to_string(),
            ));
        }

        if self.ingest.stale_threshold.is_zero() {
            return Err(ConfigError::ValidationError(
                "ingest stale_threshold must be non-zero".to_string(),
            ));
        }

        self.validate_poll()
    }

    fn validate_poll(&self) -> Result<(), ConfigError> {
        let poll = &self.poll;

        if poll.url.is_some() {
            poll.parsed_url()
                .map_err(|e| ConfigError::ValidationError(format!("poll: {}", e)))?;
        }

        if poll.interval.is_zero() {
            return Err(ConfigError::ValidationError(
                "poll interval must be non-zero".to_string(),
            ));
        }

        if poll.timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "poll timeout must be non-zero".to_string(),
            ));
        }

        if poll.retry.initial_backoff.is_zero() {
            return Err(ConfigError::ValidationError(
                "poll retry initial_backoff must be non-zero".to_string(),
            ));
        }

        if poll.retry.initial_backoff > poll.retry.max_backoff {
            return Err(ConfigError::ValidationError(format!(
                "poll retry initial_backoff ({:?}) exceeds max_backoff ({:?})",
                poll.retry.initial_backoff, poll.retry.max_backoff
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::RetryPolicy;
    use std::io::Write;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind, "0.0.0.0");
        assert_eq!(config.port, 9118);
    }

    #[test]
    fn test_app_config_default_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.is_poll_mode());
        assert_eq!(config.metrics.namespace, "rtl_433");
        assert_eq!(config.ingest.stale_threshold, Duration::from_secs(120));
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
server:
  bind: "127.0.0.1"
  port: 9200
metrics:
  namespace: weather
ingest:
  stale_threshold: 5m
poll:
  url: "http://receiver.local:8433/events"
  interval: 30s
  retry:
    max_retries: 2
"#
        )
        .unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.server.port, 9200);
        assert_eq!(config.metrics.namespace, "weather");
        assert_eq!(config.ingest.stale_threshold, Duration::from_secs(300));
        assert_eq!(config.ingest.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
        assert!(config.is_poll_mode());
        assert_eq!(config.poll.interval, Duration::from_secs(30));
        assert_eq!(config.poll.retry.max_retries, 2);
    }

    #[test]
    fn test_load_missing_file() {
        let result = AppConfig::load("/nonexistent/rtl433-exporter.yaml");
        assert!(matches!(result, Err(ConfigError::IoError(_))));
    }

    #[test]
    fn test_config_validation_invalid_port() {
        let config = AppConfig {
            server: ServerConfig {
                bind: "0.0.0.0".to_string(),
                port: 0,
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_bind_address() {
        let config = AppConfig {
            server: ServerConfig {
                bind: "not-an-ip".to_string(),
                port: 9118,
            },
            ..AppConfig::default()
        };

        let result = config.validate();
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("invalid server bind address")
        );
    }

    #[test]
    fn test_config_validation_invalid_namespace() {
        let config = AppConfig {
            metrics: MetricsConfig {
                namespace: "rtl-433".to_string(),
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_poll_url() {
        let config = AppConfig {
            poll: HttpPollConfig::new("file:///var/log/rtl_433.json"),
            ..AppConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("poll"));
    }

    #[test]
    fn test_config_validation_backoff_order() {
        let config = AppConfig {
            poll: HttpPollConfig::default().with_retry(RetryPolicy {
                max_retries: 3,
                initial_backoff: Duration::from_secs(10),
                max_backoff: Duration::from_secs(1),
            }),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
