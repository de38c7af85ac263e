//! Configuration module for the exporter.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Server settings (port, bind address)
//! - Metric naming (namespace)
//! - Ingestion settings (staleness threshold, channel capacity)
//! - HTTP poll mode (url, interval, timeout, retry policy)
//!
//! A config file is optional; every field has a default.

mod app;
mod validation;

pub use app::{AppConfig, IngestConfig, MetricsConfig, ServerConfig};
pub use validation::{ConfigError, is_valid_metric_prefix, parse_duration};

// Re-export constants
pub use app::{DEFAULT_BIND, DEFAULT_PORT};
