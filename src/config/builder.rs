//! Builder and validation for [`HecConfig`].

use std::time::Duration;

use log::debug;
use thiserror::Error;

use crate::index_template::{IndexTemplate, TemplateError};

use super::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_HOST, DEFAULT_INDEX, DEFAULT_PORT, DEFAULT_SOURCE,
    DEFAULT_WRITE_TIMEOUT, EventFormat, HecConfig, IndexSelector, Protocol, SOURCETYPE_TAG,
    SourcetypeSelector, resolve_event_host,
};

/// Errors raised while building a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No token was configured.
    #[error("'token' parameter is required")]
    MissingToken,
    /// Dynamic indexing was enabled without a pattern.
    #[error("'dynamic_index_pattern' is required when 'dynamic_index' is enabled")]
    MissingDynamicIndexPattern,
    /// The dynamic index pattern does not parse.
    #[error("invalid 'dynamic_index_pattern': {0}")]
    InvalidIndexPattern(#[from] TemplateError),
    /// Unknown protocol name.
    #[error("unsupported protocol '{0}', expected 'http' or 'https'")]
    InvalidProtocol(String),
    /// Port is not a number in `1..=65535`.
    #[error("invalid port '{0}'")]
    InvalidPort(String),
    /// Any other invalid setting.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The TLS connector could not be created.
    #[error("failed to initialise TLS: {0}")]
    Tls(#[from] native_tls::Error),
    /// A configuration file could not be read.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
}

macro_rules! ensure_positive {
    ($value:expr, $field:expr) => {{
        if $value == 0 {
            Err(ConfigError::InvalidConfig(format!(
                "{} must be greater than zero",
                $field
            )))
        } else {
            Ok($value)
        }
    }};
}

macro_rules! option_setter {
    ($(#[$meta:meta])* $fn_name:ident, $field:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $fn_name(mut self, value: $ty) -> Self {
            self.$field = Some(value);
            self
        }
    };
}

/// Builder for [`HecConfig`].
///
/// Every field is optional until [`build`](Self::build) applies defaults and
/// validation. `token` has no default.
#[derive(Clone, Debug, Default)]
pub struct HecConfigBuilder {
    host: Option<String>,
    protocol: Option<String>,
    port: Option<String>,
    token: Option<String>,
    index: Option<String>,
    event_host: Option<String>,
    source: Option<String>,
    sourcetype: Option<String>,
    send_event_as_json: Option<bool>,
    usejson: Option<bool>,
    send_batched_events: Option<bool>,
    dynamic_index: Option<bool>,
    dynamic_index_pattern: Option<String>,
    connect_timeout_ms: Option<u64>,
    write_timeout_ms: Option<u64>,
    insecure_skip_verify: Option<bool>,
}

impl HecConfigBuilder {
    /// Create a builder with nothing set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the collector host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the protocol (`http` or `https`).
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    /// Set the collector port.
    pub fn with_port(mut self, port: impl ToString) -> Self {
        self.port = Some(port.to_string());
        self
    }

    /// Set the HEC token (required).
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the static index.
    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    /// Override the `host` field sent with every event.
    pub fn with_event_host(mut self, event_host: impl Into<String>) -> Self {
        self.event_host = Some(event_host.into());
        self
    }

    /// Set the `source` field.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Set the sourcetype; `tag` selects the event tag.
    pub fn with_sourcetype(mut self, sourcetype: impl Into<String>) -> Self {
        self.sourcetype = Some(sourcetype.into());
        self
    }

    /// Set the template used when dynamic indexing is enabled.
    pub fn with_dynamic_index_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.dynamic_index_pattern = Some(pattern.into());
        self
    }

    option_setter!(
        #[doc = "Send mapping records as nested JSON rather than as a string."]
        with_send_event_as_json,
        send_event_as_json,
        bool
    );
    option_setter!(
        #[doc = "Select JSON envelopes (`true`) or the flat log4j layout (`false`)."]
        with_usejson,
        usejson,
        bool
    );
    option_setter!(
        #[doc = "Join all events of a flush into one request."]
        with_send_batched_events,
        send_batched_events,
        bool
    );
    option_setter!(
        #[doc = "Compute the index per event from the dynamic index pattern."]
        with_dynamic_index,
        dynamic_index,
        bool
    );
    option_setter!(
        #[doc = "Set the connect timeout in milliseconds."]
        with_connect_timeout_ms,
        connect_timeout_ms,
        u64
    );
    option_setter!(
        #[doc = "Set the request timeout in milliseconds."]
        with_write_timeout_ms,
        write_timeout_ms,
        u64
    );
    option_setter!(
        #[doc = "Disable TLS certificate and hostname checks. Intended for test setups only."]
        with_insecure_skip_verify,
        insecure_skip_verify,
        bool
    );

    fn validate_token(&self) -> Result<String, ConfigError> {
        match &self.token {
            Some(token) if !token.trim().is_empty() => Ok(token.clone()),
            _ => Err(ConfigError::MissingToken),
        }
    }

    fn validate_port(&self) -> Result<u16, ConfigError> {
        let Some(port) = &self.port else {
            return Ok(DEFAULT_PORT);
        };
        match port.trim().parse::<u16>() {
            Ok(0) | Err(_) => Err(ConfigError::InvalidPort(port.clone())),
            Ok(value) => Ok(value),
        }
    }

    fn validate_timeouts(&self) -> Result<(), ConfigError> {
        if let Some(timeout) = self.connect_timeout_ms {
            ensure_positive!(timeout, "connect_timeout_ms")?;
        }
        if let Some(timeout) = self.write_timeout_ms {
            ensure_positive!(timeout, "write_timeout_ms")?;
        }
        Ok(())
    }

    fn build_index(&self) -> Result<IndexSelector, ConfigError> {
        if !self.dynamic_index.unwrap_or(false) {
            return Ok(IndexSelector::Static(
                self.index.clone().unwrap_or_else(|| DEFAULT_INDEX.into()),
            ));
        }
        let pattern = self
            .dynamic_index_pattern
            .as_deref()
            .ok_or(ConfigError::MissingDynamicIndexPattern)?;
        Ok(IndexSelector::Dynamic(IndexTemplate::parse(pattern)?))
    }

    /// Validate the settings and produce a [`HecConfig`].
    pub fn build(&self) -> Result<HecConfig, ConfigError> {
        let token = self.validate_token()?;
        let port = self.validate_port()?;
        self.validate_timeouts()?;
        let protocol = match &self.protocol {
            Some(p) => p.parse::<Protocol>()?,
            None => Protocol::default(),
        };
        let index = self.build_index()?;

        let config = HecConfig {
            host: self.host.clone().unwrap_or_else(|| DEFAULT_HOST.into()),
            protocol,
            port,
            token,
            index,
            event_host: self.event_host.clone().unwrap_or_else(resolve_event_host),
            source: self.source.clone().unwrap_or_else(|| DEFAULT_SOURCE.into()),
            sourcetype: SourcetypeSelector::from_setting(
                self.sourcetype.as_deref().unwrap_or(SOURCETYPE_TAG),
            ),
            format: EventFormat::from_flags(
                self.usejson.unwrap_or(true),
                self.send_event_as_json.unwrap_or(false),
            ),
            send_batched_events: self.send_batched_events.unwrap_or(false),
            connect_timeout: self
                .connect_timeout_ms
                .map_or(DEFAULT_CONNECT_TIMEOUT, Duration::from_millis),
            write_timeout: self
                .write_timeout_ms
                .map_or(DEFAULT_WRITE_TIMEOUT, Duration::from_millis),
            insecure_skip_verify: self.insecure_skip_verify.unwrap_or(false),
        };
        debug!("splunkhec: sending data to {}", config.endpoint_url());
        Ok(config)
    }
}
