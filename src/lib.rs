//! Formatting and delivery of log events to a Splunk HTTP Event Collector.
//!
//! The host pipeline hands each flush unit to a [`HecForwarder`], either as
//! decoded [`EventUnit`]s or as a MessagePack chunk. Events are normalised,
//! wrapped into collector envelopes and posted to
//! `/services/collector/event`. Any failure is returned so that the caller
//! can retry the whole unit.

pub mod batch;
pub mod chunk;
pub mod config;
pub mod envelope;
pub mod forwarder;
pub mod hec_client;
pub mod index_template;
pub mod normalizer;
pub mod record;
#[cfg(any(test, feature = "test-util"))]
pub mod test_utils;

pub use batch::{BatchDispatcher, BatchMode, FlushSummary};
pub use chunk::{ChunkError, decode_chunk, encode_event};
pub use config::{
    ConfigError, EventFormat, HecConfig, HecConfigBuilder, IndexSelector, Protocol,
    SourcetypeSelector,
};
pub use envelope::{EnvelopeBuilder, EnvelopeError};
pub use forwarder::{HecForwarder, WriteError};
pub use hec_client::{DeliveryError, HecClient, HecSink};
pub use index_template::{IndexTemplate, Segment, TemplateError};
pub use normalizer::{CanonicalEvent, EventPayload, NormalizeError, Normalizer};
pub use record::{EventUnit, RawRecord};
