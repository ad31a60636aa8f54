//! Wire envelopes for the collector's event endpoint.
//!
//! Every envelope is a JSON object with the fields `time`, `event`,
//! `sourcetype`, `source`, `index` and `host`, in that order. How `time` and
//! `event` are rendered depends on the [`EventFormat`]:
//!
//! - [`EventFormat::JsonString`]: `time` is the event time in seconds and
//!   `event` is a string (mappings are JSON-encoded first).
//! - [`EventFormat::JsonObject`]: as above but mappings are nested as objects.
//! - [`EventFormat::Log4j`]: `time` is the record's own `time` field as epoch
//!   milliseconds in a string and `event` is `"<time> <message>"`.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::{
    config::{EventFormat, HecConfig},
    normalizer::{CanonicalEvent, EventPayload},
    record::EventUnit,
};

/// Errors raised while building an envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// A field needed by the log4j layout is absent.
    #[error("log4j layout requires a '{0}' field in the record")]
    MissingField(&'static str),
    /// The record's `time` field is not a recognisable date-time.
    #[error("cannot parse record time '{0}'")]
    InvalidTime(String),
    /// JSON serialisation failed.
    #[error("cannot serialise envelope: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Serialize)]
#[serde(untagged)]
enum EnvelopeTime {
    Seconds(i64),
    Millis(String),
}

#[derive(Serialize)]
#[serde(untagged)]
enum EventBody<'a> {
    Text(&'a str),
    Json(&'a Value),
}

impl<'a> From<&'a EventPayload> for EventBody<'a> {
    fn from(payload: &'a EventPayload) -> Self {
        match payload {
            EventPayload::Text(text) => Self::Text(text),
            EventPayload::Json(value) => Self::Json(value),
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    time: EnvelopeTime,
    event: EventBody<'a>,
    sourcetype: &'a str,
    source: &'a str,
    index: &'a str,
    host: &'a str,
}

/// Serialises canonical events into wire envelopes.
#[derive(Clone, Debug)]
pub struct EnvelopeBuilder {
    format: EventFormat,
    source: String,
    host: String,
}

impl EnvelopeBuilder {
    /// Capture the static envelope fields from `config`.
    pub fn new(config: &HecConfig) -> Self {
        Self {
            format: config.format,
            source: config.source.clone(),
            host: config.event_host.clone(),
        }
    }

    /// Serialise one event into a single-line JSON object.
    pub fn build(&self, event: &CanonicalEvent, unit: &EventUnit) -> Result<String, EnvelopeError> {
        let log4j_event;
        let (time, body) = match self.format {
            EventFormat::JsonObject | EventFormat::JsonString => (
                EnvelopeTime::Seconds(unit.time),
                EventBody::from(&event.payload),
            ),
            EventFormat::Log4j => {
                let (millis, text) = log4j_parts(unit)?;
                log4j_event = text;
                (EnvelopeTime::Millis(millis), EventBody::Text(&log4j_event))
            }
        };
        let envelope = Envelope {
            time,
            event: body,
            sourcetype: &event.sourcetype,
            source: &self.source,
            index: &event.index,
            host: &self.host,
        };
        Ok(serde_json::to_string(&envelope)?)
    }
}

/// Extract `(epoch millis, "<time> <message>")` from a log4j-style record.
fn log4j_parts(unit: &EventUnit) -> Result<(String, String), EnvelopeError> {
    let time = match unit.record.field("time") {
        Some(Value::String(time)) => time,
        Some(other) => return Err(EnvelopeError::InvalidTime(other.to_string())),
        None => return Err(EnvelopeError::MissingField("time")),
    };
    let message = match unit.record.field("message") {
        Some(Value::String(message)) => message.clone(),
        Some(other) => other.to_string(),
        None => return Err(EnvelopeError::MissingField("message")),
    };
    let millis = parse_epoch_millis(time)?;
    Ok((millis.to_string(), format!("{time} {message}")))
}

const OFFSET_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%d/%b/%Y:%H:%M:%S %z",
];

const NAIVE_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
];

/// Parse a date-time string into milliseconds since the epoch.
///
/// Values without a UTC offset are read as UTC.
pub fn parse_epoch_millis(text: &str) -> Result<i64, EnvelopeError> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.timestamp_millis());
    }
    if let Some(dt) = OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(text, fmt).ok())
    {
        return Ok(dt.timestamp_millis());
    }
    if let Some(dt) = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
    {
        return Ok(dt.and_utc().timestamp_millis());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
        .ok_or_else(|| EnvelopeError::InvalidTime(text.to_owned()))
}
