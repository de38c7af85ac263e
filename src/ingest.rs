//! Ingestion loop: line -> reading -> staleness check -> aggregate store.
//!
//! Lines are processed strictly in arrival order, one at a time. A malformed
//! line is logged and skipped; it never stops the loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::mpsc;

use crate::record::{ParseError, Reading};
use crate::staleness::{Staleness, StalenessChecker};
use crate::store::AggregateStore;

/// Running counters for the ingestion loop.
#[derive(Debug, Default)]
pub struct IngestStats {
    lines: AtomicU64,
    ingested: AtomicU64,
    malformed: AtomicU64,
    stale: AtomicU64,
}

/// Point-in-time copy of [`IngestStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestCounts {
    pub lines: u64,
    pub ingested: u64,
    pub malformed: u64,
    pub stale: u64,
}

impl IngestStats {
    pub fn counts(&self) -> IngestCounts {
        IngestCounts {
            lines: self.lines.load(Ordering::Relaxed),
            ingested: self.ingested.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Applies raw lines to the aggregate store.
#[derive(Debug, Clone)]
pub struct Ingestor {
    store: AggregateStore,
    checker: StalenessChecker,
    stats: Arc<IngestStats>,
}

impl Ingestor {
    pub fn new(store: AggregateStore, checker: StalenessChecker) -> Self {
        Self {
            store,
            checker,
            stats: Arc::new(IngestStats::default()),
        }
    }

    pub fn store(&self) -> &AggregateStore {
        &self.store
    }

    /// Shared counters, readable while the loop runs.
    pub fn stats(&self) -> Arc<IngestStats> {
        Arc::clone(&self.stats)
    }

    /// Decode one line and apply it to the store.
    ///
    /// Staleness is reported but does not prevent the update.
    ///
    /// # Errors
    /// Returns `ParseError` for a malformed line; the store is left untouched.
    pub fn ingest_line(&self, line: &str) -> Result<Staleness, ParseError> {
        IngestStats::bump(&self.stats.lines);

        let reading = match Reading::parse(line) {
            Ok(reading) => reading,
            Err(e) => {
                IngestStats::bump(&self.stats.malformed);
                return Err(e);
            }
        };

        tracing::debug!(
            sensor = %reading.identity,
            temperature = reading.temperature,
            battery = reading.battery,
            humidity = reading.humidity,
            time = reading.time.as_deref().unwrap_or("-"),
            "Reading decoded"
        );

        let staleness = self.checker.check(&reading);
        if staleness.is_stale() {
            IngestStats::bump(&self.stats.stale);
        }

        self.store.ingest(&reading);
        IngestStats::bump(&self.stats.ingested);
        Ok(staleness)
    }

    /// Consume lines until the channel closes.
    pub async fn run(&self, mut lines: mpsc::Receiver<String>) -> IngestCounts {
        tracing::info!("Ingestion loop started");

        while let Some(line) = lines.recv().await {
            if let Err(e) = self.ingest_line(&line) {
                tracing::error!(line = %line.trim_end(), error = %e, "Skipping malformed record");
            }
        }

        let counts = self.stats.counts();
        tracing::info!(
            lines = counts.lines,
            ingested = counts.ingested,
            malformed = counts.malformed,
            stale = counts.stale,
            "Ingestion loop finished"
        );
        counts
    }
}
