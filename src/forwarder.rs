//! Per-flush entry point.
//!
//! [`HecForwarder`] owns the read-only pipeline state built from a
//! [`HecConfig`] and turns each flush unit into one or more requests. It
//! keeps no state between calls, so a shared reference may be used from
//! several threads at once.

use log::warn;
use serde_json::Value;
use thiserror::Error;

use crate::{
    batch::{BatchDispatcher, BatchMode, FlushSummary},
    chunk::{self, ChunkError},
    config::{ConfigError, HecConfig},
    envelope::{EnvelopeBuilder, EnvelopeError},
    hec_client::{DeliveryError, HecClient, HecSink},
    normalizer::{NormalizeError, Normalizer},
    record::EventUnit,
};

/// Flush-level failure. Every variant means the whole unit should be retried.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The buffered chunk could not be decoded.
    #[error(transparent)]
    Chunk(#[from] ChunkError),
    /// An event could not be normalised.
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    /// An envelope could not be built.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
    /// The collector rejected a request or could not be reached.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// Formats and delivers flush units to one collector.
#[derive(Debug)]
pub struct HecForwarder<S = HecClient> {
    normalizer: Normalizer,
    envelopes: EnvelopeBuilder,
    mode: BatchMode,
    sink: S,
}

impl HecForwarder<HecClient> {
    /// Build a forwarder that posts to the endpoint described by `config`.
    pub fn new(config: &HecConfig) -> Result<Self, ConfigError> {
        let client = HecClient::new(config)?;
        Ok(Self::with_sink(config, client))
    }
}

impl<S: HecSink> HecForwarder<S> {
    /// Build a forwarder that hands request bodies to `sink`.
    pub fn with_sink(config: &HecConfig, sink: S) -> Self {
        Self {
            normalizer: Normalizer::new(config),
            envelopes: EnvelopeBuilder::new(config),
            mode: BatchMode::from_setting(config.send_batched_events),
            sink,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Encode one event the way it is stored in a buffered chunk.
    pub fn format(&self, tag: &str, time: i64, record: &Value) -> Result<Vec<u8>, ChunkError> {
        chunk::encode_event(tag, time, record)
    }

    /// Decode a buffered chunk and deliver its events.
    pub fn write_chunk(&self, bytes: &[u8]) -> Result<FlushSummary, WriteError> {
        let units = chunk::decode_chunk(bytes).inspect_err(|err| {
            warn!("splunkhec: cannot decode chunk: {err}");
        })?;
        self.write(&units)
    }

    /// Deliver one flush unit.
    ///
    /// In per-event mode, events before a failing one have already been
    /// delivered when the error is returned.
    pub fn write<'a>(
        &self,
        units: impl IntoIterator<Item = &'a EventUnit>,
    ) -> Result<FlushSummary, WriteError> {
        let mut dispatcher = BatchDispatcher::new(&self.sink, self.mode);
        for unit in units {
            let envelope = self.envelope_for(unit).inspect_err(|err| {
                warn!("splunkhec: aborting flush at tag '{}': {err}", unit.tag);
            })?;
            dispatcher.push(envelope)?;
        }
        Ok(dispatcher.finish()?)
    }

    fn envelope_for(&self, unit: &EventUnit) -> Result<String, WriteError> {
        let event = self.normalizer.normalize(unit)?;
        Ok(self.envelopes.build(&event, unit)?)
    }
}
