//! Configuration for the HEC forwarder.
//!
//! [`HecConfigBuilder`] collects user settings, validates them and produces a
//! read-only [`HecConfig`] shared by every stage of the pipeline. Settings can
//! also be loaded from an INI file via [`HecConfigBuilder::from_ini_file`].

use std::{fmt, str::FromStr, time::Duration};

use log::warn;

use crate::index_template::IndexTemplate;

mod builder;
mod ini;

pub use builder::{ConfigError, HecConfigBuilder};

/// Default collector host.
pub const DEFAULT_HOST: &str = "localhost";
/// Default collector port.
pub const DEFAULT_PORT: u16 = 8088;
/// Default index name.
pub const DEFAULT_INDEX: &str = "main";
/// Default `source` field.
pub const DEFAULT_SOURCE: &str = "fluentd";
/// Sourcetype sentinel selecting the event tag as sourcetype.
pub const SOURCETYPE_TAG: &str = "tag";
/// Host name used when the local host name cannot be resolved.
pub const UNKNOWN_HOST: &str = "unknown";
/// Path of the collector's event endpoint.
pub const EVENT_ENDPOINT_PATH: &str = "/services/collector/event";
/// Default connection timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default request timeout.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport scheme used to reach the collector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Protocol {
    #[default]
    Http,
    Https,
}

impl Protocol {
    /// URL scheme for this protocol.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            _ => Err(ConfigError::InvalidProtocol(s.to_owned())),
        }
    }
}

/// Serialisation mode of the wire envelope.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EventFormat {
    /// `usejson = false`: flat `"<time> <message>"` event with millisecond time.
    Log4j,
    /// `usejson = true`, `send_event_as_json = true`: nested JSON event.
    JsonObject,
    /// `usejson = true`, `send_event_as_json = false`: JSON-encoded string event.
    #[default]
    JsonString,
}

impl EventFormat {
    /// Select the mode from the two user-facing flags.
    pub fn from_flags(usejson: bool, send_event_as_json: bool) -> Self {
        match (usejson, send_event_as_json) {
            (false, _) => Self::Log4j,
            (true, true) => Self::JsonObject,
            (true, false) => Self::JsonString,
        }
    }
}

/// How the `index` field is chosen for each event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexSelector {
    /// The same index for every event.
    Static(String),
    /// An index computed per event from a template.
    Dynamic(IndexTemplate),
}

/// How the `sourcetype` field is chosen for each event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourcetypeSelector {
    /// Use the event tag.
    Tag,
    /// Use a fixed value.
    Static(String),
}

impl SourcetypeSelector {
    /// Interpret a configured sourcetype, honouring the `tag` sentinel.
    pub fn from_setting(value: &str) -> Self {
        if value == SOURCETYPE_TAG {
            Self::Tag
        } else {
            Self::Static(value.to_owned())
        }
    }
}

/// Validated, read-only configuration.
#[derive(Clone, Debug)]
pub struct HecConfig {
    /// Collector host name or address.
    pub host: String,
    /// Transport scheme.
    pub protocol: Protocol,
    /// Collector port.
    pub port: u16,
    /// HEC token sent in the `Authorization` header.
    pub token: String,
    /// Index selection policy.
    pub index: IndexSelector,
    /// `host` field of every envelope.
    pub event_host: String,
    /// `source` field of every envelope.
    pub source: String,
    /// Sourcetype selection policy.
    pub sourcetype: SourcetypeSelector,
    /// Envelope serialisation mode.
    pub format: EventFormat,
    /// Join all envelopes of a flush into a single request.
    pub send_batched_events: bool,
    /// Timeout for establishing connections.
    pub connect_timeout: Duration,
    /// Timeout for a whole request.
    pub write_timeout: Duration,
    /// Skip certificate and hostname verification for `https`.
    pub insecure_skip_verify: bool,
}

impl HecConfig {
    /// Start building a configuration.
    pub fn builder() -> HecConfigBuilder {
        HecConfigBuilder::new()
    }

    /// Full URL of the collector's event endpoint.
    pub fn endpoint_url(&self) -> String {
        format!(
            "{}://{}:{}{}",
            self.protocol, self.host, self.port, EVENT_ENDPOINT_PATH
        )
    }
}

/// Resolve the local host name, falling back to [`UNKNOWN_HOST`].
pub fn resolve_event_host() -> String {
    match hostname::get() {
        Ok(name) if !name.is_empty() => name.to_string_lossy().into_owned(),
        Ok(_) => {
            warn!("splunkhec: local host name is empty, using '{UNKNOWN_HOST}'");
            UNKNOWN_HOST.to_owned()
        }
        Err(err) => {
            warn!("splunkhec: failed to resolve local host name ({err}), using '{UNKNOWN_HOST}'");
            UNKNOWN_HOST.to_owned()
        }
    }
}
