//! Delivery failures surfaced to the host pipeline.

use serde::Deserialize;
use thiserror::Error;

/// A failed delivery attempt. Every variant is retryable by the caller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// The collector answered with a status other than 200.
    #[error(
        "{message} (http status code {http_status}, status code {code}, invalid event number {invalid})",
        code = display_opt(.status_code),
        invalid = display_opt(.invalid_event_number)
    )]
    Rejected {
        /// `text` reported by the collector.
        message: String,
        /// `code` reported by the collector.
        status_code: Option<i64>,
        /// `invalid-event-number` reported by the collector.
        invalid_event_number: Option<i64>,
        /// HTTP status of the response.
        http_status: u16,
    },
    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),
}

impl DeliveryError {
    /// HTTP status of a rejected request.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Rejected { http_status, .. } => Some(*http_status),
            Self::Transport(_) => None,
        }
    }

    /// Build a [`DeliveryError::Rejected`] from a response status and body.
    ///
    /// A body that is not a collector error document is kept verbatim as the
    /// message.
    pub(crate) fn from_response(http_status: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) => Self::Rejected {
                message: parsed.text.unwrap_or_default(),
                status_code: parsed.code,
                invalid_event_number: parsed.invalid_event_number,
                http_status,
            },
            Err(_) => {
                let trimmed = body.trim();
                Self::Rejected {
                    message: if trimmed.is_empty() {
                        format!("HTTP {http_status}")
                    } else {
                        trimmed.to_owned()
                    },
                    status_code: None,
                    invalid_event_number: None,
                    http_status,
                }
            }
        }
    }
}

fn display_opt(value: &Option<i64>) -> String {
    value.map_or_else(|| "none".to_owned(), |v| v.to_string())
}

/// Error document returned by the collector.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    text: Option<String>,
    code: Option<i64>,
    #[serde(rename = "invalid-event-number")]
    invalid_event_number: Option<i64>,
}
