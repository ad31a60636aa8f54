//! HTTP delivery to the collector's event endpoint.
//!
//! This module defines [`HecClient`], a blocking client that POSTs envelope
//! bodies to `<protocol>://<host>:<port>/services/collector/event` with
//! `Authorization: Splunk <token>`.
//!
//! # Response Handling
//!
//! - **200**: Success.
//! - **Any other status**: [`DeliveryError::Rejected`] carrying the `text`,
//!   `code` and `invalid-event-number` fields reported by the collector.
//! - **Network errors** (refused connection, TLS failure, timeout):
//!   [`DeliveryError::Transport`].
//!
//! Nothing is retried here. The caller retries the whole flush unit.

mod client;
mod error;


pub use client::{AUTHORIZATION_SCHEME, CONTENT_TYPE, HecClient};
pub use error::DeliveryError;

/// Destination for request bodies produced by the pipeline.
///
/// [`HecClient`] is the production implementation; tests substitute an
/// in-memory recorder.
pub trait HecSink {
    /// Deliver one request body.
    fn send(&self, body: &str) -> Result<(), DeliveryError>;
}

impl<S: HecSink + ?Sized> HecSink for &S {
    fn send(&self, body: &str) -> Result<(), DeliveryError> {
        (**self).send(body)
    }
}
