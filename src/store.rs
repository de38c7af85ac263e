//! Last-value-wins aggregate state.
//!
//! The store keeps one map per [`MetricKind`], keyed by [`SensorIdentity`].
//! The ingestion loop is the only writer; scrapes read through [`AggregateStore::snapshot`],
//! which copies the maps under a short read lock so rendering never holds it.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use strum_macros::{AsRefStr, Display, EnumString};

use crate::record::{Reading, SensorIdentity};

/// Gauge kinds published per sensor.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumString, Display, AsRefStr,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MetricKind {
    Temperature,
    Battery,
    Humidity,
}

impl MetricKind {
    /// All kinds in publishing order.
    pub const ALL: [MetricKind; 3] = [Self::Temperature, Self::Battery, Self::Humidity];

    /// Value of this kind carried by a reading.
    pub fn value_of(&self, reading: &Reading) -> f64 {
        match self {
            Self::Temperature => reading.temperature,
            Self::Battery => reading.battery,
            Self::Humidity => reading.humidity,
        }
    }
}

/// Per-kind series: sensor identity to latest value.
pub type Series = BTreeMap<SensorIdentity, f64>;

/// Immutable copy of the store taken at one instant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    temperature: Series,
    battery: Series,
    humidity: Series,
}

impl Snapshot {
    /// Series for one kind.
    pub fn series(&self, kind: MetricKind) -> &Series {
        match kind {
            MetricKind::Temperature => &self.temperature,
            MetricKind::Battery => &self.battery,
            MetricKind::Humidity => &self.humidity,
        }
    }

    /// Latest value of `kind` for `identity`, if the sensor has reported.
    pub fn get(&self, kind: MetricKind, identity: &SensorIdentity) -> Option<f64> {
        self.series(kind).get(identity).copied()
    }

    /// Number of distinct sensors.
    pub fn len(&self) -> usize {
        // Every ingest writes all kinds, so any one series has the full key set.
        self.temperature.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn series_mut(&mut self, kind: MetricKind) -> &mut Series {
        match kind {
            MetricKind::Temperature => &mut self.temperature,
            MetricKind::Battery => &mut self.battery,
            MetricKind::Humidity => &mut self.humidity,
        }
    }
}

/// Shared aggregate table. Cloning yields another handle to the same state.
#[derive(Debug, Clone, Default)]
pub struct AggregateStore {
    inner: Arc<RwLock<Snapshot>>,
}

impl AggregateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite every kind at the reading's identity.
    ///
    /// All three kinds are written under one guard, so readers never see a
    /// key with some kinds updated and others not.
    pub fn ingest(&self, reading: &Reading) {
        let mut state = self.write();
        for kind in MetricKind::ALL {
            state
                .series_mut(kind)
                .insert(reading.identity.clone(), kind.value_of(reading));
        }
    }

    /// Copy of all series at the moment of the call.
    pub fn snapshot(&self) -> Snapshot {
        self.read().clone()
    }

    /// Number of distinct sensors seen so far.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Entries stay whole even if a writer panicked mid-ingest; poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, Snapshot> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Snapshot> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
