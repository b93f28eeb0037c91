//! The client handle and the send path every operation goes through.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Uri};
use tracing::debug;
use unis3_auth::canonical::{canonical_query_from_pairs, encode_path};
use unis3_auth::{Credentials, RequestSigner, SignableRequest, SigningParams, hash_payload};
use unis3_core::transport::{HttpRequest, HttpResponse, Transport};
use unis3_core::{Dialect, translate};
use unis3_model::{S3Error, S3Result};

use crate::config::{ClientConfig, CredentialsConfig};
use crate::request::S3Request;

pub(crate) const SERVICE: &str = "s3";

/// Host and encoded path a request is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Target {
    pub scheme: &'static str,
    pub host: String,
    pub path: String,
}

impl Target {
    pub fn url(&self, encoded_query: &str) -> String {
        if encoded_query.is_empty() {
            format!("{}://{}{}", self.scheme, self.host, self.path)
        } else {
            format!("{}://{}{}?{encoded_query}", self.scheme, self.host, self.path)
        }
    }
}

/// A synchronous client for one S3-compatible endpoint.
///
/// Every operation signs its request, sends it through the injected
/// [`Transport`] and translates non-2xx responses into [`S3Error`]. The
/// client is `Send + Sync`; share it behind an `Arc` to issue requests from
/// several threads.
///
/// The region, credentials and TLS flag can be changed with the `set_*`
/// methods. They take `&mut self`, so they cannot race with requests on a
/// shared client.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use unis3_auth::Credentials;
/// use unis3_client::{ClientConfig, CredentialsConfig, S3Client};
/// use unis3_core::Provider;
/// use unis3_memory::MemoryServer;
///
/// let server = Arc::new(MemoryServer::new(
///     Provider::Generic,
///     &Credentials::new("AKID", "secret"),
/// ));
/// let config = ClientConfig::builder()
///     .credentials(CredentialsConfig::new("AKID", "secret"))
///     .secure(false)
///     .build();
/// let client = S3Client::new(config, server).unwrap();
/// client.create_bucket("photos", &Default::default()).unwrap();
/// assert!(client.bucket_exists("photos").unwrap());
/// ```
pub struct S3Client {
    config: ClientConfig,
    dialect: &'static Dialect,
    credentials: Credentials,
    signer: RequestSigner,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for S3Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Client")
            .field("endpoint", &self.config.endpoint)
            .field("region", &self.config.region)
            .field("provider", &self.dialect.provider)
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

impl S3Client {
    /// Create a client that sends requests through `transport`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the configuration does not validate.
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> S3Result<Self> {
        config.validate()?;
        let credentials = config.credentials.to_credentials();
        Ok(Self {
            dialect: config.provider.dialect(),
            config,
            credentials,
            signer: RequestSigner::new(),
            transport,
        })
    }

    /// Create a client over the blocking `reqwest` transport.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an invalid configuration and `Transport`
    /// if the HTTP client cannot be built.
    #[cfg(feature = "reqwest")]
    pub fn connect(config: ClientConfig) -> S3Result<Self> {
        let transport = crate::transport::ReqwestTransport::new()?;
        Self::new(config, Arc::new(transport))
    }

    /// The configuration in effect.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The dialect of the configured provider.
    #[must_use]
    pub fn dialect(&self) -> &'static Dialect {
        self.dialect
    }

    /// Change the signing region.
    pub fn set_region(&mut self, region: impl Into<String>) {
        self.config.region = region.into();
    }

    /// Replace the signing credentials.
    pub fn set_credentials(&mut self, credentials: CredentialsConfig) {
        self.credentials = credentials.to_credentials();
        self.config.credentials = credentials;
    }

    /// Switch between HTTPS and HTTP for endpoints without a scheme.
    pub fn set_secure(&mut self, secure: bool) {
        self.config.secure = secure;
    }

    pub(crate) fn signing_params(&self, timestamp: DateTime<Utc>) -> SigningParams<'_> {
        SigningParams {
            credentials: &self.credentials,
            region: &self.config.region,
            service: SERVICE,
            timestamp,
        }
    }

    pub(crate) fn signer(&self) -> &RequestSigner {
        &self.signer
    }

    fn scheme_and_host(&self) -> (&'static str, &str) {
        let endpoint = self.config.endpoint.trim().trim_end_matches('/');
        if let Some(host) = endpoint.strip_prefix("https://") {
            ("https", host)
        } else if let Some(host) = endpoint.strip_prefix("http://") {
            ("http", host)
        } else if self.config.secure {
            ("https", endpoint)
        } else {
            ("http", endpoint)
        }
    }

    /// Resolve host and path for a bucket and key under the addressing
    /// style in effect. Bucket names containing dots always use path style.
    pub(crate) fn target(&self, bucket: Option<&str>, key: Option<&str>) -> Target {
        let (scheme, host) = self.scheme_and_host();
        let path_style = self
            .config
            .force_path_style
            .unwrap_or(self.dialect.path_style);
        let Some(bucket) = bucket else {
            return Target {
                scheme,
                host: host.to_owned(),
                path: "/".to_owned(),
            };
        };
        if path_style || bucket.contains('.') {
            let raw = match key {
                Some(key) => format!("/{bucket}/{key}"),
                None => format!("/{bucket}"),
            };
            Target {
                scheme,
                host: host.to_owned(),
                path: encode_path(&raw),
            }
        } else {
            Target {
                scheme,
                host: format!("{bucket}.{host}"),
                path: encode_path(&key.map(|k| format!("/{k}")).unwrap_or_default()),
            }
        }
    }

    pub(crate) fn request<'a>(&self, method: http::Method) -> S3Request<'a> {
        S3Request::new(method, self.dialect)
    }

    /// Sign and send `request`, translating a non-2xx response into an
    /// error.
    pub(crate) fn send(&self, request: S3Request<'_>) -> S3Result<HttpResponse> {
        let target = self.target(request.bucket, request.key);
        let payload_hash = hash_payload(&request.body);
        let mut headers = request.headers;
        headers.push(("host".to_owned(), target.host.clone()));

        let signature_headers = self.signer.sign_headers(
            &SignableRequest {
                method: request.method.as_str(),
                path: &target.path,
                query: &request.query,
                headers: &headers,
                payload_hash: &payload_hash,
            },
            &self.signing_params(Utc::now()),
        )?;

        let url = target.url(&canonical_query_from_pairs(&request.query));
        let uri: Uri = url
            .parse()
            .map_err(|e| S3Error::invalid_input(format!("invalid request URI {url}: {e}")))?;
        let mut header_map = HeaderMap::with_capacity(headers.len() + signature_headers.len());
        for (name, value) in headers.iter().chain(signature_headers.iter()) {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| S3Error::invalid_input(format!("invalid header name {name}")))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|_| S3Error::invalid_input(format!("invalid value for header {name}")))?;
            header_map.append(header_name, header_value);
        }

        debug!(
            method = %request.method,
            bucket = ?request.bucket,
            key = ?request.key,
            size = request.body.len(),
            "sending request"
        );
        let response = self.transport.execute(HttpRequest {
            method: request.method,
            uri,
            headers: header_map,
            body: request.body,
        })?;
        if response.status.is_success() {
            return Ok(response);
        }
        let status = response.status;
        let body = response.into_bytes()?;
        let err = translate(status, &body, request.not_found);
        debug!(status = %status, kind = %err.kind(), "request failed");
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use unis3_core::Provider;
    use unis3_memory::MemoryServer;

    use super::*;

    fn client(provider: Provider, endpoint: &str, force_path_style: Option<bool>) -> S3Client {
        let server = Arc::new(MemoryServer::new(
            provider,
            &Credentials::new("AKID", "secret"),
        ));
        let config = ClientConfig::builder()
            .endpoint(endpoint.to_owned())
            .provider(provider)
            .force_path_style(force_path_style)
            .credentials(CredentialsConfig::new("AKID", "secret"))
            .build();
        S3Client::new(config, server).unwrap()
    }

    #[test]
    fn test_should_address_buckets_by_dialect() {
        let aws = client(Provider::Aws, "s3.amazonaws.com", None);
        let target = aws.target(Some("photos"), Some("2024/summer beach.jpg"));
        assert_eq!(target.host, "photos.s3.amazonaws.com");
        assert_eq!(target.path, "/2024/summer%20beach.jpg");
        assert_eq!(target.scheme, "https");

        let r2 = client(Provider::R2, "http://account.r2.example", None);
        let target = r2.target(Some("photos"), None);
        assert_eq!(target.host, "account.r2.example");
        assert_eq!(target.path, "/photos");
        assert_eq!(target.scheme, "http");
    }

    #[test]
    fn test_should_use_path_style_for_dotted_buckets_and_overrides() {
        let aws = client(Provider::Aws, "s3.amazonaws.com", None);
        let target = aws.target(Some("my.bucket"), Some("k"));
        assert_eq!(target.host, "s3.amazonaws.com");
        assert_eq!(target.path, "/my.bucket/k");

        let forced = client(Provider::Aws, "s3.amazonaws.com", Some(true));
        assert_eq!(forced.target(Some("b"), Some("k")).path, "/b/k");

        let virtual_root = aws.target(Some("b"), None);
        assert_eq!(virtual_root.path, "/");
        assert_eq!(aws.target(None, None).host, "s3.amazonaws.com");
    }

    #[test]
    fn test_should_apply_setters() {
        let mut client = client(Provider::Generic, "minio.local:9000", None);
        client.set_region("eu-west-1");
        client.set_secure(false);
        client.set_credentials(CredentialsConfig::new("NEWKEY", "new-secret"));
        assert_eq!(client.config().region, "eu-west-1");
        assert_eq!(client.target(None, None).url(""), "http://minio.local:9000/");
        let params = client.signing_params(Utc::now());
        assert_eq!(params.credentials.access_key_id, "NEWKEY");
        assert_eq!(params.region, "eu-west-1");
    }

    #[test]
    fn test_should_be_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<S3Client>();
    }

    #[test]
    fn test_should_reject_invalid_config() {
        let server = Arc::new(MemoryServer::new(
            Provider::Generic,
            &Credentials::new("AKID", "secret"),
        ));
        let config = ClientConfig::builder().part_size(1).build();
        let err = S3Client::new(config, server).unwrap_err();
        assert_eq!(err.kind(), unis3_model::ErrorKind::InvalidInput);
    }
}
