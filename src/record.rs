//! Record decoding for `rtl_433` JSON lines.
//!
//! Each line emitted by `rtl_433 -F json` is a single JSON object. Decoding
//! produces a fully populated [`Reading`]: absent fields are replaced by their
//! documented defaults here, so nothing downstream has to check for absence.

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Label value used when a record omits `model`, `id` or `channel`.
pub const MISSING_LABEL: &str = "None";

/// Temperature stored when a record has no `temperature_C`.
///
/// Sits well below anything a consumer sensor reports so dashboards can
/// tell it apart from a real reading.
pub const DEFAULT_TEMPERATURE: f64 = -40.0;

/// Battery flag stored when a record has no `battery_ok`.
pub const DEFAULT_BATTERY: f64 = 0.0;

/// Humidity stored when a record has no `humidity`.
pub const DEFAULT_HUMIDITY: f64 = 0.0;

/// Errors produced while decoding a single line.
///
/// All variants are recoverable: the offending line is skipped.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Line is not a JSON object.
    #[error("can't decode json: {0}")]
    Json(#[from] serde_json::Error),

    /// A known field carries a value of the wrong type.
    #[error("invalid value for '{field}': {value}")]
    InvalidField { field: &'static str, value: Value },
}

/// Identity of one physical sensor.
///
/// Two readings with equal identity describe the same device and overwrite
/// each other in the aggregate store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SensorIdentity {
    pub model: String,
    pub id: String,
    pub channel: String,
}

impl SensorIdentity {
    pub fn new(
        model: impl Into<String>,
        id: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            id: id.into(),
            channel: channel.into(),
        }
    }

    /// Label values in `model`, `id`, `channel` order.
    pub fn label_values(&self) -> [&str; 3] {
        [&self.model, &self.id, &self.channel]
    }
}

impl std::fmt::Display for SensorIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.model, self.id, self.channel)
    }
}

/// Wire shape of a record. Unknown keys are ignored.
#[derive(Debug, Default, Deserialize)]
struct RawRecord {
    #[serde(default)]
    model: Option<Value>,
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    channel: Option<Value>,
    #[serde(default, rename = "temperature_C")]
    temperature_c: Option<Value>,
    #[serde(default)]
    battery_ok: Option<Value>,
    #[serde(default)]
    humidity: Option<Value>,
    #[serde(default)]
    time: Option<Value>,
}

/// A decoded sensor reading with defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub identity: SensorIdentity,
    /// Degrees Celsius.
    pub temperature: f64,
    /// `1.0` when the battery is reported ok, `0.0` otherwise.
    pub battery: f64,
    /// Relative humidity in percent.
    pub humidity: f64,
    /// Receiver-local wall clock, `YYYY-MM-DD HH:MM:SS`, assumed UTC.
    pub time: Option<String>,
}

impl Reading {
    /// Decode one line into a reading.
    ///
    /// # Errors
    /// Returns `ParseError` if the line is not a JSON object or a known
    /// field has the wrong type.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        // Struct derives also accept a JSON array; only an object is a record.
        let object: Map<String, Value> = serde_json::from_str(line.trim())?;
        let raw: RawRecord = serde_json::from_value(Value::Object(object))?;

        let identity = SensorIdentity {
            model: label(raw.model),
            id: label(raw.id),
            channel: label(raw.channel),
        };

        let temperature =
            number("temperature_C", raw.temperature_c)?.unwrap_or(DEFAULT_TEMPERATURE);
        let battery = flag("battery_ok", raw.battery_ok)?.unwrap_or(DEFAULT_BATTERY);
        let humidity = number("humidity", raw.humidity)?.unwrap_or(DEFAULT_HUMIDITY);

        let time = match raw.time {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(other) => {
                return Err(ParseError::InvalidField {
                    field: "time",
                    value: other,
                });
            }
        };

        Ok(Self {
            identity,
            temperature,
            battery,
            humidity,
            time,
        })
    }
}

impl std::str::FromStr for Reading {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// String form of a label value, `None` for absent fields.
fn label(value: Option<Value>) -> String {
    match value {
        None | Some(Value::Null) => MISSING_LABEL.to_string(),
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
    }
}

fn number(field: &'static str, value: Option<Value>) -> Result<Option<f64>, ParseError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or(ParseError::InvalidField {
                field,
                value: Value::Number(n),
            }),
        Some(other) => Err(ParseError::InvalidField {
            field,
            value: other,
        }),
    }
}

/// Like [`number`], but also accepts JSON booleans as `0`/`1`.
fn flag(field: &'static str, value: Option<Value>) -> Result<Option<f64>, ParseError> {
    match value {
        Some(Value::Bool(b)) => Ok(Some(if b { 1.0 } else { 0.0 })),
        other => number(field, other),
    }
}
