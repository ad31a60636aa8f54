//! Conversion of raw events into canonical form.
//!
//! The [`Normalizer`] decides the payload, sourcetype and index of a single
//! [`EventUnit`]. Payload shape depends on the record variant and the
//! configured [`EventFormat`].

use log::debug;
use serde_json::Value;
use thiserror::Error;

use crate::{
    config::{EventFormat, HecConfig, IndexSelector, SourcetypeSelector},
    index_template::TemplateError,
    record::{EventUnit, RawRecord},
};

/// Errors raised while normalising an event.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// The dynamic index could not be computed for this record.
    #[error("cannot compute index for tag '{tag}': {source}")]
    Index {
        tag: String,
        #[source]
        source: TemplateError,
    },
    /// The record could not be JSON-encoded.
    #[error("cannot encode record as JSON: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Event body before it is wrapped into an envelope.
#[derive(Clone, Debug, PartialEq)]
pub enum EventPayload {
    /// Emitted as a JSON string.
    Text(String),
    /// Emitted as a nested JSON value.
    Json(Value),
}

/// Canonical `(payload, sourcetype, index)` triple derived from an event.
#[derive(Clone, Debug, PartialEq)]
pub struct CanonicalEvent {
    pub payload: EventPayload,
    pub sourcetype: String,
    pub index: String,
}

/// Applies the configured sourcetype, index and payload rules.
#[derive(Clone, Debug)]
pub struct Normalizer {
    sourcetype: SourcetypeSelector,
    index: IndexSelector,
    source: String,
    format: EventFormat,
}

impl Normalizer {
    /// Capture the parts of `config` relevant to normalisation.
    pub fn new(config: &HecConfig) -> Self {
        Self {
            sourcetype: config.sourcetype.clone(),
            index: config.index.clone(),
            source: config.source.clone(),
            format: config.format,
        }
    }

    /// Normalise one event.
    pub fn normalize(&self, unit: &EventUnit) -> Result<CanonicalEvent, NormalizeError> {
        let sourcetype = match &self.sourcetype {
            SourcetypeSelector::Tag => unit.tag.clone(),
            SourcetypeSelector::Static(value) => value.clone(),
        };
        let index = self.index_for(unit)?;
        debug!("splunk index: {index}");
        Ok(CanonicalEvent {
            payload: self.payload_for(&unit.record)?,
            sourcetype,
            index,
        })
    }

    fn index_for(&self, unit: &EventUnit) -> Result<String, NormalizeError> {
        match &self.index {
            IndexSelector::Static(index) => Ok(index.clone()),
            IndexSelector::Dynamic(template) => template
                .render(&self.source, &unit.record)
                .map_err(|source| NormalizeError::Index {
                    tag: unit.tag.clone(),
                    source,
                }),
        }
    }

    fn payload_for(&self, record: &RawRecord) -> Result<EventPayload, NormalizeError> {
        Ok(match record {
            RawRecord::Number(n) => EventPayload::Text(n.to_string()),
            RawRecord::Object(map) => match self.format {
                EventFormat::JsonObject => EventPayload::Json(Value::Object(map.clone())),
                EventFormat::JsonString | EventFormat::Log4j => {
                    EventPayload::Text(serde_json::to_string(map)?)
                }
            },
            RawRecord::Opaque(Value::String(s)) => EventPayload::Text(s.clone()),
            RawRecord::Opaque(other) => match self.format {
                EventFormat::JsonObject => EventPayload::Json(other.clone()),
                EventFormat::JsonString | EventFormat::Log4j => {
                    EventPayload::Text(serde_json::to_string(other)?)
                }
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HecConfigBuilder;
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn builder() -> HecConfigBuilder {
        HecConfigBuilder::new()
            .with_token("t")
            .with_event_host("some_host")
    }

    fn normalizer(builder: HecConfigBuilder) -> Normalizer {
        Normalizer::new(&builder.build().expect("valid config"))
    }

    #[rstest]
    fn tag_becomes_sourcetype_by_default(builder: HecConfigBuilder) {
        let n = normalizer(builder);
        let event = n
            .normalize(&EventUnit::new("test", 1, json!({"message": "data"})))
            .expect("normalize");
        assert_eq!(event.sourcetype, "test");
        assert_eq!(event.index, "main");
    }

    #[rstest]
    fn static_sourcetype_ignores_tag(builder: HecConfigBuilder) {
        let n = normalizer(builder.with_sourcetype("log"));
        for tag in ["a", "b", "c"] {
            let event = n
                .normalize(&EventUnit::new(tag, 1, json!({})))
                .expect("normalize");
            assert_eq!(event.sourcetype, "log");
        }
    }

    #[rstest]
    #[case(json!(42), "42")]
    #[case(json!(-7), "-7")]
    #[case(json!(2.5), "2.5")]
    fn numbers_are_stringified(
        builder: HecConfigBuilder,
        #[case] record: Value,
        #[case] text: &str,
    ) {
        let event = normalizer(builder)
            .normalize(&EventUnit::new("t", 1, record))
            .expect("normalize");
        assert_eq!(event.payload, EventPayload::Text(text.into()));
    }

    #[rstest]
    fn mapping_is_json_encoded_text_by_default(builder: HecConfigBuilder) {
        let event = normalizer(builder)
            .normalize(&EventUnit::new("t", 1, json!({"message": "say \"hi\""})))
            .expect("normalize");
        assert_eq!(
            event.payload,
            EventPayload::Text(r#"{"message":"say \"hi\""}"#.into())
        );
    }

    #[rstest]
    fn mapping_stays_structured_when_sent_as_json(builder: HecConfigBuilder) {
        let event = normalizer(builder.with_send_event_as_json(true))
            .normalize(&EventUnit::new("t", 1, json!({"message": "data"})))
            .expect("normalize");
        assert_eq!(event.payload, EventPayload::Json(json!({"message": "data"})));
    }

    #[rstest]
    fn opaque_strings_pass_through(builder: HecConfigBuilder) {
        let line = normalizer(builder)
            .normalize(&EventUnit::new("t", 1, "raw line"))
            .expect("normalize");
        assert_eq!(line.payload, EventPayload::Text("raw line".into()));
    }

    #[rstest]
    #[case(json!([1, 2]), "[1,2]")]
    #[case(json!(true), "true")]
    #[case(Value::Null, "null")]
    fn opaque_values_are_text_in_json_string_mode(
        builder: HecConfigBuilder,
        #[case] value: Value,
        #[case] expected: &str,
    ) {
        let event = normalizer(builder)
            .normalize(&EventUnit::new("t", 1, value))
            .expect("normalize");
        assert_eq!(event.payload, EventPayload::Text(expected.into()));
    }

    #[rstest]
    fn opaque_values_stay_structured_when_sent_as_json(builder: HecConfigBuilder) {
        let event = normalizer(builder.with_send_event_as_json(true))
            .normalize(&EventUnit::new("t", 1, json!([1, 2])))
            .expect("normalize");
        assert_eq!(event.payload, EventPayload::Json(json!([1, 2])));
    }

    #[rstest]
    fn dynamic_index_uses_source_and_record(builder: HecConfigBuilder) {
        let n = normalizer(
            builder
                .with_dynamic_index(true)
                .with_dynamic_index_pattern("prefix_${source}_${record['kubernetes']['pod_name']}"),
        );
        let event = n
            .normalize(&EventUnit::new(
                "t",
                1,
                json!({"message": "data", "kubernetes": {"pod_name": "mypod"}}),
            ))
            .expect("normalize");
        assert_eq!(event.index, "prefix_fluentd_mypod");
    }

    #[rstest]
    fn missing_dynamic_index_field_fails_the_event(builder: HecConfigBuilder) {
        let n = normalizer(
            builder
                .with_dynamic_index(true)
                .with_dynamic_index_pattern("${record['kubernetes']['pod_name']}"),
        );
        let err = n
            .normalize(&EventUnit::new("app", 1, json!({"message": "data"})))
            .expect_err("missing field");
        assert!(matches!(
            err,
            NormalizeError::Index {
                ref tag,
                source: TemplateError::MissingField(_),
            } if tag == "app"
        ));
    }
}
