//! MessagePack framing of buffered events.
//!
//! The host pipeline stores each event as a `[tag, time, record]` array and
//! concatenates those arrays into a chunk. [`encode_event`] produces one such
//! frame; [`decode_chunk`] walks a chunk back into [`EventUnit`] values.

use std::io::Cursor;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::record::EventUnit;

/// Errors raised while encoding or decoding a chunk.
#[derive(Debug, Error)]
pub enum ChunkError {
    /// A frame could not be serialised.
    #[error("failed to encode event: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    /// The chunk is truncated or not a sequence of `[tag, time, record]` frames.
    #[error("malformed chunk at byte {offset}: {source}")]
    Decode {
        offset: u64,
        #[source]
        source: rmp_serde::decode::Error,
    },
}

/// Serialise one event as a `[tag, time, record]` MessagePack array.
pub fn encode_event(tag: &str, time: i64, record: &Value) -> Result<Vec<u8>, ChunkError> {
    Ok(rmp_serde::to_vec(&(tag, time, record))?)
}

/// Decode every frame contained in `bytes`, in order.
///
/// An empty chunk yields no units.
pub fn decode_chunk(bytes: &[u8]) -> Result<Vec<EventUnit>, ChunkError> {
    let total = bytes.len() as u64;
    let mut de = rmp_serde::Deserializer::new(Cursor::new(bytes));
    let mut units = Vec::new();
    while de.position() < total {
        let offset = de.position();
        let unit = EventUnit::deserialize(&mut de)
            .map_err(|source| ChunkError::Decode { offset, source })?;
        units.push(unit);
    }
    Ok(units)
}
