//! Prometheus rendering of the aggregate store.
//!
//! [`SnapshotPublisher`] is a custom [`prometheus::core::Collector`]: each
//! scrape takes a fresh store snapshot and builds new gauge families from it,
//! so nothing is cached between scrapes.

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use thiserror::Error;

use crate::store::{AggregateStore, MetricKind};

/// Default metric name prefix.
pub const DEFAULT_NAMESPACE: &str = "rtl_433";

/// Label names, in the order of [`crate::SensorIdentity::label_values`].
pub const LABELS: [&str; 3] = ["model", "id", "channel"];

/// Errors from building or rendering metric families.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("exposition is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

struct KindFamily {
    kind: MetricKind,
    opts: Opts,
    /// Never populated; only provides the descriptor.
    prototype: GaugeVec,
}

/// Publishes the aggregate store as one gauge family per metric kind.
pub struct SnapshotPublisher {
    store: AggregateStore,
    families: Vec<KindFamily>,
}

impl SnapshotPublisher {
    /// Create a publisher for `store` with metric names `<namespace>_<kind>`.
    ///
    /// # Errors
    /// Returns `PublishError::Prometheus` if the namespace yields an invalid
    /// metric name.
    pub fn new(store: AggregateStore, namespace: &str) -> Result<Self, PublishError> {
        let families = MetricKind::ALL
            .into_iter()
            .map(|kind| -> Result<KindFamily, PublishError> {
                let opts = Opts::new(
                    format!("{namespace}_{kind}"),
                    format!("{kind} from the rtl_433 command"),
                );
                let prototype = GaugeVec::new(opts.clone(), &LABELS)?;
                Ok(KindFamily {
                    kind,
                    opts,
                    prototype,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { store, families })
    }

    /// Fully-qualified metric names, in publishing order.
    pub fn metric_names(&self) -> Vec<&str> {
        self.families.iter().map(|f| f.opts.name.as_str()).collect()
    }
}

impl std::fmt::Debug for SnapshotPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotPublisher")
            .field("metrics", &self.metric_names())
            .finish_non_exhaustive()
    }
}

impl Collector for SnapshotPublisher {
    fn desc(&self) -> Vec<&Desc> {
        self.families
            .iter()
            .flat_map(|f| f.prototype.desc())
            .collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let snapshot = self.store.snapshot();
        let mut out = Vec::with_capacity(self.families.len());

        for family in &self.families {
            let series = snapshot.series(family.kind);
            if series.is_empty() {
                continue;
            }

            let gauges = match GaugeVec::new(family.opts.clone(), &LABELS) {
                Ok(gauges) => gauges,
                Err(e) => {
                    tracing::error!(
                        metric = %family.opts.name,
                        error = %e,
                        "Failed to build gauge family"
                    );
                    continue;
                }
            };

            for (identity, value) in series {
                gauges
                    .with_label_values(&identity.label_values())
                    .set(*value);
            }
            out.extend(gauges.collect());
        }

        out
    }
}

/// Encode everything in `registry` in the text exposition format.
pub fn render(registry: &Registry) -> Result<String, PublishError> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Build a registry with a publisher for `store` already registered.
pub fn registry_for(store: AggregateStore, namespace: &str) -> Result<Registry, PublishError> {
    let registry = Registry::new();
    registry.register(Box::new(SnapshotPublisher::new(store, namespace)?))?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Reading;

    fn ingest(store: &AggregateStore, line: &str) {
        store.ingest(&Reading::parse(line).unwrap());
    }

    #[test]
    fn test_metric_names() {
        let publisher = SnapshotPublisher::new(AggregateStore::new(), DEFAULT_NAMESPACE).unwrap();
        assert_eq!(
            publisher.metric_names(),
            vec!["rtl_433_temperature", "rtl_433_battery", "rtl_433_humidity"]
        );
    }

    #[test]
    fn test_invalid_namespace_rejected() {
        assert!(SnapshotPublisher::new(AggregateStore::new(), "bad-name").is_err());
    }

    #[test]
    fn test_empty_store_renders_nothing() {
        let registry = registry_for(AggregateStore::new(), DEFAULT_NAMESPACE).unwrap();
        assert_eq!(render(&registry).unwrap(), "");
    }

    #[test]
    fn test_render_samples() {
        let store = AggregateStore::new();
        ingest(
            &store,
            r#"{"model":"X","id":"1","channel":"A","temperature_C":21.5,"battery_ok":1,"humidity":55}"#,
        );
        let registry = registry_for(store, DEFAULT_NAMESPACE).unwrap();
        let text = render(&registry).unwrap();

        assert!(text.contains("# HELP rtl_433_temperature temperature from the rtl_433 command"));
        assert!(text.contains("# TYPE rtl_433_temperature gauge"));
        assert!(text.contains(r#"rtl_433_temperature{channel="A",id="1",model="X"} 21.5"#));
        assert!(text.contains(r#"rtl_433_battery{channel="A",id="1",model="X"} 1"#));
        assert!(text.contains(r#"rtl_433_humidity{channel="A",id="1",model="X"} 55"#));
    }

    #[test]
    fn test_scrape_reflects_current_state() {
        let store = AggregateStore::new();
        let registry = registry_for(store.clone(), "sensors").unwrap();

        ingest(&store, r#"{"model":"X","temperature_C":1.5}"#);
        let first = render(&registry).unwrap();
        assert!(first.contains(r#"sensors_temperature{channel="None",id="None",model="X"} 1.5"#));

        ingest(&store, r#"{"model":"X","temperature_C":3.5}"#);
        ingest(&store, r#"{"model":"Y"}"#);
        let second = render(&registry).unwrap();
        assert!(second.contains(r#"sensors_temperature{channel="None",id="None",model="X"} 3.5"#));
        assert!(second.contains(r#"sensors_temperature{channel="None",id="None",model="Y"} -40"#));
        assert!(!second.contains("} 1.5"));
    }

    #[test]
    fn test_one_sample_per_identity() {
        let store = AggregateStore::new();
        ingest(&store, r#"{"model":"X","id":"1","channel":"A","humidity":40}"#);
        ingest(&store, r#"{"model":"X","id":"1","channel":"A","humidity":41}"#);
        let registry = registry_for(store, DEFAULT_NAMESPACE).unwrap();

        let families = registry.gather();
        let humidity = families
            .iter()
            .find(|mf| mf.get_name() == "rtl_433_humidity")
            .unwrap();
        assert_eq!(humidity.get_metric().len(), 1);
        assert_eq!(humidity.get_metric()[0].get_gauge().get_value(), 41.0);
    }
}
