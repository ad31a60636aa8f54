//! Blocking ureq client for the event endpoint.

use std::sync::Arc;

use log::{debug, warn};
use native_tls::TlsConnector;
use ureq::{Agent, AgentBuilder, Response};

use super::{DeliveryError, HecSink};
use crate::config::{ConfigError, HecConfig, Protocol};

/// Prefix of the `Authorization` header value.
pub const AUTHORIZATION_SCHEME: &str = "Splunk";
/// Content type of every request body.
pub const CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Sends request bodies to a single collector endpoint.
///
/// The underlying agent pools connections, so one client should be reused
/// for the lifetime of the output.
#[derive(Clone, Debug)]
pub struct HecClient {
    agent: Agent,
    url: String,
    authorization: String,
}

impl HecClient {
    /// Build a client for the endpoint described by `config`.
    ///
    /// Certificate and hostname checks stay enabled for HTTPS unless
    /// `insecure_skip_verify` is set.
    pub fn new(config: &HecConfig) -> Result<Self, ConfigError> {
        // 3xx responses are returned to the caller, never followed.
        let mut builder = AgentBuilder::new()
            .timeout_connect(config.connect_timeout)
            .timeout(config.write_timeout)
            .redirects(0);
        if config.protocol == Protocol::Https {
            builder = builder.tls_connector(Arc::new(tls_connector(config.insecure_skip_verify)?));
        }
        Ok(Self {
            agent: builder.build(),
            url: config.endpoint_url(),
            authorization: format!("{AUTHORIZATION_SCHEME} {}", config.token),
        })
    }

    /// Endpoint URL requests are posted to.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn post(&self, body: &str) -> Result<(), DeliveryError> {
        let result = self
            .agent
            .post(&self.url)
            .set("Authorization", &self.authorization)
            .set("Content-Type", CONTENT_TYPE)
            .send_string(body);
        match result {
            Ok(response) if response.status() == 200 => {
                debug!("splunkhec: response HTTP Status Code is 200");
                Ok(())
            }
            // Other 2xx and 3xx responses still count as rejections.
            Ok(response) => Err(rejected(response)),
            Err(ureq::Error::Status(_, response)) => Err(rejected(response)),
            Err(ureq::Error::Transport(err)) => Err(DeliveryError::Transport(err.to_string())),
        }
    }
}

impl HecSink for HecClient {
    fn send(&self, body: &str) -> Result<(), DeliveryError> {
        debug!("splunkhec: {body}");
        self.post(body).inspect_err(|err| {
            warn!("splunkhec: delivery to {} failed: {err}", self.url);
        })
    }
}

fn rejected(response: Response) -> DeliveryError {
    let status = response.status();
    debug!("splunkhec: response HTTP Status Code is {status}");
    let body = response
        .into_string()
        .unwrap_or_else(|err| format!("unreadable response body: {err}"));
    debug!("splunkhec: response {body}");
    DeliveryError::from_response(status, &body)
}

fn tls_connector(insecure_skip_verify: bool) -> Result<TlsConnector, ConfigError> {
    let mut builder = TlsConnector::builder();
    if insecure_skip_verify {
        builder.danger_accept_invalid_certs(true);
        builder.danger_accept_invalid_hostnames(true);
    }
    Ok(builder.build()?)
}
