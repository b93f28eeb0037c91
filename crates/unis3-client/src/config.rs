//! Client configuration.
//!
//! Provides [`ClientConfig`], built explicitly with its typed builder or
//! loaded from environment variables via [`ClientConfig::from_env`].

use std::fmt;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;
use unis3_auth::Credentials;
use unis3_core::Provider;
use unis3_model::types::MIN_PART_SIZE;
use unis3_model::{S3Error, S3Result};

/// Default part size of the automatic multipart flow.
pub const DEFAULT_PART_SIZE: u64 = MIN_PART_SIZE;

/// Access key pair used to sign requests.
///
/// The secret and the session token are never printed or serialized.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsConfig {
    /// Access key id.
    pub access_key: String,
    /// Secret access key.
    #[serde(skip)]
    pub secret_key: String,
    /// STS session token.
    #[serde(skip)]
    pub session_token: Option<String>,
}

impl CredentialsConfig {
    /// Long-term credentials.
    #[must_use]
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            session_token: None,
        }
    }

    /// The signing form of these credentials.
    #[must_use]
    pub fn to_credentials(&self) -> Credentials {
        let credentials = Credentials::new(&self.access_key, &self.secret_key);
        match &self.session_token {
            Some(token) => credentials.with_session_token(token),
            None => credentials,
        }
    }
}

impl fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("access_key", &self.access_key)
            .finish_non_exhaustive()
    }
}

/// Configuration of an [`S3Client`](crate::S3Client).
///
/// # Examples
///
/// ```
/// use unis3_client::ClientConfig;
/// use unis3_core::Provider;
///
/// let config = ClientConfig::builder()
///     .endpoint("s3.us-west-2.amazonaws.com".to_owned())
///     .region("us-west-2".to_owned())
///     .provider(Provider::Aws)
///     .build();
/// assert!(config.secure);
/// assert_eq!(config.part_size, 5 * 1024 * 1024);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Host, optionally with a port and an `http://` or `https://` scheme.
    #[builder(default = String::from("localhost"))]
    pub endpoint: String,

    /// Signing region.
    #[builder(default = String::from("us-east-1"))]
    pub region: String,

    /// Vendor whose dialect the client speaks.
    #[builder(default)]
    pub provider: Provider,

    /// Use HTTPS when the endpoint has no scheme.
    #[builder(default = true)]
    pub secure: bool,

    /// Signing credentials.
    #[builder(default)]
    pub credentials: CredentialsConfig,

    /// Override the dialect's addressing style.
    #[builder(default)]
    pub force_path_style: Option<bool>,

    /// Chunk size of the automatic multipart flow; at least 5 MiB.
    #[builder(default = DEFAULT_PART_SIZE)]
    pub part_size: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: String::from("localhost"),
            region: String::from("us-east-1"),
            provider: Provider::Generic,
            secure: true,
            credentials: CredentialsConfig::default(),
            force_path_style: None,
            part_size: DEFAULT_PART_SIZE,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `UNIS3_ENDPOINT` | `endpoint` |
    /// | `UNIS3_REGION`, then `AWS_REGION` | `region` |
    /// | `UNIS3_PROVIDER` | `provider` |
    /// | `UNIS3_SECURE` | `secure` |
    /// | `UNIS3_PATH_STYLE` | `force_path_style` |
    /// | `AWS_ACCESS_KEY_ID`, then `ACCESS_KEY` | access key |
    /// | `AWS_SECRET_ACCESS_KEY`, then `SECRET_KEY` | secret key |
    /// | `AWS_SESSION_TOKEN` | session token |
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an unknown `UNIS3_PROVIDER`.
    pub fn from_env() -> S3Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> S3Result<Self> {
        let first = |names: &[&str]| names.iter().find_map(|name| lookup(name));
        let mut config = Self::default();

        if let Some(v) = lookup("UNIS3_ENDPOINT") {
            config.endpoint = v;
        }
        if let Some(v) = first(&["UNIS3_REGION", "AWS_REGION"]) {
            config.region = v;
        }
        if let Some(v) = lookup("UNIS3_PROVIDER") {
            config.provider = v
                .parse()
                .map_err(|e: unis3_core::UnknownProvider| S3Error::invalid_input(e.to_string()))?;
        }
        if let Some(v) = lookup("UNIS3_SECURE") {
            config.secure = parse_bool(&v);
        }
        if let Some(v) = lookup("UNIS3_PATH_STYLE") {
            config.force_path_style = Some(parse_bool(&v));
        }
        if let Some(v) = first(&["AWS_ACCESS_KEY_ID", "ACCESS_KEY"]) {
            config.credentials.access_key = v;
        }
        if let Some(v) = first(&["AWS_SECRET_ACCESS_KEY", "SECRET_KEY"]) {
            config.credentials.secret_key = v;
        }
        config.credentials.session_token = lookup("AWS_SESSION_TOKEN");

        Ok(config)
    }

    /// Check field invariants.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an empty endpoint or a part size below
    /// 5 MiB.
    pub fn validate(&self) -> S3Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(S3Error::invalid_input("endpoint must not be empty"));
        }
        if self.part_size < MIN_PART_SIZE {
            return Err(S3Error::invalid_input(format!(
                "part size {} is below the {MIN_PART_SIZE} byte minimum",
                self.part_size
            )));
        }
        Ok(())
    }
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}
