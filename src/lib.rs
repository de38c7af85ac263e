//! rtl433-exporter: Prometheus gauges from `rtl_433` sensor readings
//!
//! This crate turns the newline-delimited JSON records emitted by `rtl_433`
//! into last-known-value gauges per physical sensor. It can be used as a
//! library, or run as the standalone `rtl433-exporter` binary.
//!
//! # Architecture
//!
//! - **Source**: raw lines from stdin or a polled HTTP resource ([`source`])
//! - **Record**: line decoding with documented defaults ([`record`])
//! - **Staleness**: timestamp freshness warnings ([`staleness`])
//! - **Store**: last-value-wins aggregate keyed by sensor ([`store`])
//! - **Publisher**: scrape-time rendering as Prometheus gauges ([`publisher`])
//! - **Server**: `/metrics` and `/healthz` over HTTP ([`server`])
//!
//! # Example
//!
//! ```rust
//! use rtl433_exporter::{AggregateStore, Ingestor, StalenessChecker, publisher};
//!
//! let store = AggregateStore::new();
//! let ingestor = Ingestor::new(store.clone(), StalenessChecker::default());
//! ingestor
//!     .ingest_line(r#"{"model":"X","id":"1","channel":"A","temperature_C":21.5}"#)
//!     .unwrap();
//!
//! let registry = publisher::registry_for(store, "rtl_433").unwrap();
//! let text = publisher::render(&registry).unwrap();
//! assert!(text.contains(r#"rtl_433_temperature{channel="A",id="1",model="X"} 21.5"#));
//! ```

pub mod config;
pub mod ingest;
pub mod publisher;
pub mod record;
pub mod server;
pub mod source;
pub mod staleness;
pub mod store;

// Re-export commonly used types
pub use config::{AppConfig, ConfigError};
pub use ingest::{IngestCounts, IngestStats, Ingestor};
pub use publisher::{PublishError, SnapshotPublisher};
pub use record::{ParseError, Reading, SensorIdentity};
pub use source::{HttpPollConfig, HttpPollSource, LineSource, SourceError, StdinSource};
pub use staleness::{Staleness, StalenessChecker};
pub use store::{AggregateStore, MetricKind, Snapshot};
