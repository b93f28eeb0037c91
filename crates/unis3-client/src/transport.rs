//! Blocking HTTP transport over `reqwest`.

use std::time::Duration;

use unis3_core::TransportError;
use unis3_core::transport::{HttpRequest, HttpResponse, Transport};

/// [`Transport`] backed by a blocking `reqwest` client.
///
/// Redirects are not followed; S3 redirects carry signed hosts the client
/// must address itself.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    /// A transport with `reqwest`'s default timeouts.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Other` if the TLS backend cannot be
    /// initialised.
    pub fn new() -> Result<Self, TransportError> {
        Self::build(reqwest::blocking::Client::builder())
    }

    /// A transport whose requests fail with `Timeout` after `timeout`.
    ///
    /// # Errors
    ///
    /// See [`ReqwestTransport::new`].
    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        Self::build(reqwest::blocking::Client::builder().timeout(timeout))
    }

    /// Wrap an existing client, e.g. one with a custom proxy or pool.
    #[must_use]
    pub fn from_client(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }

    fn build(builder: reqwest::blocking::ClientBuilder) -> Result<Self, TransportError> {
        let client = builder
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| TransportError::Other(Box::new(e)))?;
        Ok(Self { client })
    }
}

fn transport_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else if err.is_builder() {
        TransportError::InvalidRequest(err.to_string())
    } else {
        TransportError::Other(Box::new(err))
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .request(request.method, request.uri.to_string())
            .headers(request.headers)
            .body(request.body.to_vec())
            .send()
            .map_err(transport_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        Ok(HttpResponse::streaming(status, headers, Box::new(response)))
    }
}
