//! Event records handed over by the host pipeline.
//!
//! This module defines [`RawRecord`], the shape-tagged record carried by each
//! [`EventUnit`], together with a byte-tolerant value decoder used when
//! records arrive as MessagePack with raw binary string fields.

use std::fmt;

use encoding_rs::UTF_8;
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_json::{Map, Number, Value};

/// A record of unspecified shape as produced upstream.
#[derive(Clone, Debug, PartialEq)]
pub enum RawRecord {
    /// Numeric scalar record.
    Number(Number),
    /// Mapping of string keys to arbitrary values.
    Object(Map<String, Value>),
    /// Anything else, forwarded unchanged.
    Opaque(Value),
}

impl RawRecord {
    /// Return the mapping when the record is object-shaped.
    pub fn as_object(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a top-level field of an object-shaped record.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(key))
    }
}

impl From<Value> for RawRecord {
    fn from(value: Value) -> Self {
        match value {
            Value::Number(n) => Self::Number(n),
            Value::Object(map) => Self::Object(map),
            other => Self::Opaque(other),
        }
    }
}

impl From<Map<String, Value>> for RawRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self::Object(map)
    }
}

impl From<i64> for RawRecord {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<&str> for RawRecord {
    fn from(value: &str) -> Self {
        Self::Opaque(Value::String(value.to_owned()))
    }
}

/// One log event as delivered by the host for a single flush.
#[derive(Clone, Debug, PartialEq)]
pub struct EventUnit {
    /// Routing tag attached by the host pipeline.
    pub tag: String,
    /// Event time as supplied by the caller (epoch seconds).
    pub time: i64,
    /// The record payload.
    pub record: RawRecord,
}

impl EventUnit {
    /// Construct a unit from its parts.
    pub fn new(tag: impl Into<String>, time: i64, record: impl Into<RawRecord>) -> Self {
        Self {
            tag: tag.into(),
            time,
            record: record.into(),
        }
    }
}

impl<'de> Deserialize<'de> for EventUnit {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (tag, time, record) = <(LenientString, i64, LenientValue)>::deserialize(deserializer)?;
        Ok(Self::new(tag.0, time, record.0))
    }
}

/// Decode bytes as UTF-8, substituting U+FFFD for invalid sequences.
pub fn decode_utf8_lossy(bytes: &[u8]) -> String {
    let (text, _) = UTF_8.decode_without_bom_handling(bytes);
    text.into_owned()
}

/// JSON value decoded from a self-describing format where strings may be
/// carried as raw bytes.
///
/// Byte strings are re-interpreted as UTF-8 so that text arriving with a
/// binary tag renders as characters rather than as an array of numbers.
#[derive(Debug)]
pub(crate) struct LenientValue(pub(crate) Value);

impl<'de> Deserialize<'de> for LenientValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(LenientVisitor).map(LenientValue)
    }
}

/// String decoded with the same byte tolerance as [`LenientValue`].
struct LenientString(String);

impl<'de> Deserialize<'de> for LenientString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match LenientValue::deserialize(deserializer)?.0 {
            Value::String(s) => Ok(LenientString(s)),
            other => Ok(LenientString(other.to_string())),
        }
    }
}

struct LenientVisitor;

impl<'de> Visitor<'de> for LenientVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any self-describing value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Number(v.into()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(Value::Number(v.into()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Number::from_f64(v).map_or(Value::Null, Value::Number))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Value, E> {
        Ok(Value::String(decode_utf8_lossy(v)))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        LenientValue::deserialize(deserializer).map(|v| v.0)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(LenientValue(item)) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A>(self, mut access: A) -> Result<Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut map = Map::new();
        while let Some((LenientString(key), LenientValue(value))) = access.next_entry()? {
            map.insert(key, value);
        }
        Ok(Value::Object(map))
    }
}
