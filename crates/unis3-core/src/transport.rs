//! The HTTP transport seam.
//!
//! The client builds fully signed [`HttpRequest`]s and hands them to a
//! [`Transport`]. Retries, deadlines and connection pooling are the
//! transport's business.

use std::fmt;
use std::io::{self, Read};
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, Uri};

use crate::error::TransportError;

/// A request ready to be sent.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URI including the encoded query string.
    pub uri: Uri,
    /// Headers, including the signature headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: Bytes,
}

impl HttpRequest {
    /// The value of header `name` if it is valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// A response whose body is read lazily.
pub struct HttpResponse {
    /// Status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Streaming body.
    pub body: Box<dyn Read + Send>,
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl HttpResponse {
    /// A response with an in-memory body.
    #[must_use]
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: Box::new(io::Cursor::new(body.into())),
        }
    }

    /// A response with a streaming body.
    #[must_use]
    pub fn streaming(status: StatusCode, headers: HeaderMap, body: Box<dyn Read + Send>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// The value of header `name` if it is valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Read the whole body into memory.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Io` if reading the body fails.
    pub fn into_bytes(mut self) -> Result<Bytes, TransportError> {
        let mut buf = Vec::new();
        self.body.read_to_end(&mut buf)?;
        Ok(Bytes::from(buf))
    }
}

/// Executes HTTP requests.
///
/// Implementations must be safe to share between threads; the client calls
/// `execute` concurrently when callers upload parts in parallel.
pub trait Transport: Send + Sync + fmt::Debug {
    /// Send `request` and return the response, whatever its status.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` only when no response was obtained.
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request)
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request)
    }
}
