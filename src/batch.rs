//! Grouping of envelopes into requests.
//!
//! In batched mode every envelope of a flush unit is collected and sent as
//! one newline-joined body when the unit is finished. Otherwise each
//! envelope is sent as soon as it is pushed, and the first failure aborts
//! the rest of the unit.

use log::debug;

use crate::hec_client::{DeliveryError, HecSink};

/// How envelopes are grouped into requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchMode {
    /// One request per flush unit.
    Batched,
    /// One request per event.
    PerEvent,
}

impl BatchMode {
    /// Map the `send_batched_events` setting onto a mode.
    pub fn from_setting(send_batched_events: bool) -> Self {
        if send_batched_events {
            Self::Batched
        } else {
            Self::PerEvent
        }
    }
}

/// Outcome of a successfully dispatched flush unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushSummary {
    /// Envelopes delivered.
    pub events: usize,
    /// HTTP requests issued.
    pub requests: usize,
}

/// Collects the envelopes of one flush unit and hands them to a sink.
pub struct BatchDispatcher<'a, S: HecSink + ?Sized> {
    sink: &'a S,
    mode: BatchMode,
    pending: Vec<String>,
    summary: FlushSummary,
}

impl<'a, S: HecSink + ?Sized> BatchDispatcher<'a, S> {
    pub fn new(sink: &'a S, mode: BatchMode) -> Self {
        Self {
            sink,
            mode,
            pending: Vec::new(),
            summary: FlushSummary::default(),
        }
    }

    /// Accept one envelope, sending it immediately in per-event mode.
    pub fn push(&mut self, envelope: String) -> Result<(), DeliveryError> {
        match self.mode {
            BatchMode::Batched => self.pending.push(envelope),
            BatchMode::PerEvent => {
                self.sink.send(&envelope)?;
                self.summary.events += 1;
                self.summary.requests += 1;
            }
        }
        Ok(())
    }

    /// Send whatever is pending and report what was delivered.
    ///
    /// An empty batch issues no request.
    pub fn finish(self) -> Result<FlushSummary, DeliveryError> {
        let mut summary = self.summary;
        if !self.pending.is_empty() {
            debug!("splunkhec: sending {} events in one request", self.pending.len());
            self.sink.send(&self.pending.join("\n"))?;
            summary.events += self.pending.len();
            summary.requests += 1;
        }
        Ok(summary)
    }
}
