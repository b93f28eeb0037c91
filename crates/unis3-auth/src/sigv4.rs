//! AWS Signature Version 4 signing and verification.
//!
//! Signing flow (client side):
//!
//! 1. Add `x-amz-date`, `x-amz-content-sha256` and, for temporary
//!    credentials, `x-amz-security-token` to the request headers.
//! 2. Build the canonical request over every header the caller passes.
//! 3. Build the string to sign and derive (or reuse) the signing key.
//! 4. Emit the `Authorization` header.
//!
//! Verification (server side) turns the `Authorization` header, or the
//! `X-Amz-*` query of a presigned URL, into a [`SignatureClaim`], rebuilds
//! the same canonical request and compares signatures in constant time.
//! The main entry points are [`RequestSigner`] and [`verify_sigv4`].

use chrono::{DateTime, Utc};
use hmac::{Hmac, KeyInit, Mac};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::canonical::{
    assemble, build_canonical_query_string, build_canonical_uri, build_signed_headers_string,
    canonical_query_from_pairs, uri_encode,
};
use crate::credentials::{CredentialProvider, Credentials};
use crate::error::AuthError;

/// The only algorithm supported by this implementation.
pub(crate) const SUPPORTED_ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Payload hash used for presigned URLs and unsigned streaming bodies.
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// SHA-256 of the empty string.
pub const EMPTY_PAYLOAD_SHA256: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Longest allowed presigned URL lifetime: seven days.
pub const MAX_PRESIGN_EXPIRY_SECS: u64 = 7 * 24 * 60 * 60;

pub(crate) const AMZ_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const SCOPE_DATE_FORMAT: &str = "%Y%m%d";

type HmacSha256 = Hmac<Sha256>;

/// The result of a successful SigV4 verification.
#[derive(Debug, Clone)]
pub struct AuthResult {
    /// The access key ID that signed the request.
    pub access_key_id: String,
    /// The AWS region from the credential scope.
    pub region: String,
    /// The AWS service from the credential scope.
    pub service: String,
    /// The list of headers that were included in the signature.
    pub signed_headers: Vec<String>,
}

/// The `AKID/date/region/service/aws4_request` credential of a signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialScope {
    /// The access key ID.
    pub access_key_id: String,
    /// Scope date (`YYYYMMDD`).
    pub date: String,
    /// Scope region.
    pub region: String,
    /// Scope service.
    pub service: String,
}

impl CredentialScope {
    /// Split a `Credential=` value.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredential`] unless the value has five
    /// slash-separated fields ending in `aws4_request`.
    pub fn parse(credential: &str) -> Result<Self, AuthError> {
        match credential.splitn(5, '/').collect::<Vec<_>>()[..] {
            [access_key_id, date, region, service, "aws4_request"] => Ok(Self {
                access_key_id: access_key_id.to_owned(),
                date: date.to_owned(),
                region: region.to_owned(),
                service: service.to_owned(),
            }),
            _ => Err(AuthError::InvalidCredential),
        }
    }

    /// The scope without the access key, as it appears in the string to sign.
    #[must_use]
    pub fn scope(&self) -> String {
        format!("{}/{}/{}/aws4_request", self.date, self.region, self.service)
    }
}

/// What a request says about its own signature.
///
/// Header-signed requests carry it in `Authorization` plus `x-amz-date`;
/// presigned URLs carry it in `X-Amz-*` query parameters.
#[derive(Debug, Clone)]
pub struct SignatureClaim {
    /// Who signed, and for which day, region and service.
    pub credential: CredentialScope,
    /// Signing instant in `YYYYMMDDTHHMMSSZ` form.
    pub amz_date: String,
    /// Lowercase names of the signed headers.
    pub signed_headers: Vec<String>,
    /// Hex signature to check.
    pub signature: String,
}

/// Everything that scopes a signature apart from the request itself.
#[derive(Debug, Clone, Copy)]
pub struct SigningParams<'a> {
    /// Credentials to sign with.
    pub credentials: &'a Credentials,
    /// Region of the credential scope.
    pub region: &'a str,
    /// Service of the credential scope, `s3` for every call this crate makes.
    pub service: &'a str,
    /// Request time; also determines the scope date.
    pub timestamp: DateTime<Utc>,
}

/// A request to be signed.
///
/// `path` must already be URI-encoded (see
/// [`encode_path`](crate::canonical::encode_path)); `query` holds decoded
/// pairs and is encoded during signing.
#[derive(Debug, Clone, Copy)]
pub struct SignableRequest<'a> {
    /// HTTP method.
    pub method: &'a str,
    /// Encoded request path.
    pub path: &'a str,
    /// Decoded query parameters.
    pub query: &'a [(String, String)],
    /// Headers to sign, including `host`.
    pub headers: &'a [(String, String)],
    /// Hex SHA-256 of the body, or [`UNSIGNED_PAYLOAD`].
    pub payload_hash: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ScopeKey {
    secret: String,
    date: String,
    region: String,
    service: String,
}

/// Caches the most recent derived signing key.
///
/// The key only changes when the date, region, service or secret change, so
/// a single slot covers the common case of one client in one region.
#[derive(Debug, Default)]
struct SigningKeyCache {
    slot: Mutex<Option<(ScopeKey, Vec<u8>)>>,
}

impl SigningKeyCache {
    fn get_or_derive(&self, secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
        let key = ScopeKey {
            secret: secret.to_owned(),
            date: date.to_owned(),
            region: region.to_owned(),
            service: service.to_owned(),
        };
        let mut slot = self.slot.lock();
        if let Some((cached, signing_key)) = slot.as_ref() {
            if *cached == key {
                return signing_key.clone();
            }
        }
        let signing_key = derive_signing_key(secret, date, region, service);
        *slot = Some((key, signing_key.clone()));
        signing_key
    }
}

/// Signs requests with SigV4, either via headers or as presigned URLs.
#[derive(Debug, Default)]
pub struct RequestSigner {
    keys: SigningKeyCache,
}

impl RequestSigner {
    /// Create a signer with an empty key cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sign a request with the `Authorization` header.
    ///
    /// Returns the headers to add to the request: `x-amz-date`,
    /// `x-amz-content-sha256`, `x-amz-security-token` when the credentials
    /// carry a session token, and `authorization`. Every header in
    /// `request.headers` is signed.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::EmptyAccessKey`] for an empty access key id and
    /// [`AuthError::InvalidHeaderValue`] for header values containing
    /// control characters.
    pub fn sign_headers(
        &self,
        request: &SignableRequest<'_>,
        params: &SigningParams<'_>,
    ) -> Result<Vec<(String, String)>, AuthError> {
        if params.credentials.access_key_id.is_empty() {
            return Err(AuthError::EmptyAccessKey);
        }

        let amz_date = params.timestamp.format(AMZ_DATE_FORMAT).to_string();
        let mut added = vec![
            ("x-amz-date".to_owned(), amz_date.clone()),
            (
                "x-amz-content-sha256".to_owned(),
                request.payload_hash.to_owned(),
            ),
        ];
        if let Some(token) = &params.credentials.session_token {
            added.push(("x-amz-security-token".to_owned(), token.clone()));
        }

        let mut all_headers: Vec<(String, &str)> = Vec::new();
        for (name, value) in request.headers.iter().chain(added.iter()) {
            if value.chars().any(|c| c.is_control() && c != '\t') {
                return Err(AuthError::InvalidHeaderValue(name.clone()));
            }
            all_headers.push((name.to_lowercase(), value.as_str()));
        }
        let mut signed: Vec<&str> = all_headers.iter().map(|(name, _)| name.as_str()).collect();
        signed.sort_unstable();
        signed.dedup();

        let header_pairs: Vec<(&str, &str)> = all_headers
            .iter()
            .map(|(name, value)| (name.as_str(), *value))
            .collect();

        let canonical_request = assemble(
            request.method,
            &build_canonical_uri(request.path),
            &canonical_query_from_pairs(request.query),
            &header_pairs,
            &signed,
            request.payload_hash,
        );
        debug!(canonical_request, "Built canonical request for signing");

        let scope = credential_scope(params);
        let signature = self.signature(&canonical_request, &amz_date, &scope, params);

        let authorization = format!(
            "{SUPPORTED_ALGORITHM} Credential={}/{scope},SignedHeaders={},Signature={signature}",
            params.credentials.access_key_id,
            build_signed_headers_string(&signed),
        );
        added.push(("authorization".to_owned(), authorization));
        Ok(added)
    }

    /// Build the query string of a presigned URL.
    ///
    /// Only `host` is signed and the payload is `UNSIGNED-PAYLOAD`.
    /// `extra_query` carries operation parameters (such as `versionId` or
    /// response overrides) which become part of the signature. The returned
    /// string is already encoded and ends with `X-Amz-Signature`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidExpiry`] unless `1 <= expires_secs <= 604800`,
    /// and [`AuthError::EmptyAccessKey`] for an empty access key id.
    pub fn presign(
        &self,
        method: &str,
        path: &str,
        host: &str,
        extra_query: &[(String, String)],
        params: &SigningParams<'_>,
        expires_secs: u64,
    ) -> Result<String, AuthError> {
        if expires_secs == 0 || expires_secs > MAX_PRESIGN_EXPIRY_SECS {
            return Err(AuthError::InvalidExpiry(expires_secs));
        }
        if params.credentials.access_key_id.is_empty() {
            return Err(AuthError::EmptyAccessKey);
        }

        let amz_date = params.timestamp.format(AMZ_DATE_FORMAT).to_string();
        let scope = credential_scope(params);

        let mut query: Vec<(String, String)> = extra_query.to_vec();
        query.push(("X-Amz-Algorithm".to_owned(), SUPPORTED_ALGORITHM.to_owned()));
        query.push((
            "X-Amz-Credential".to_owned(),
            format!("{}/{scope}", params.credentials.access_key_id),
        ));
        query.push(("X-Amz-Date".to_owned(), amz_date.clone()));
        query.push(("X-Amz-Expires".to_owned(), expires_secs.to_string()));
        if let Some(token) = &params.credentials.session_token {
            query.push(("X-Amz-Security-Token".to_owned(), token.clone()));
        }
        query.push(("X-Amz-SignedHeaders".to_owned(), "host".to_owned()));

        let canonical_query = canonical_query_from_pairs(&query);
        let canonical_request = assemble(
            method,
            &build_canonical_uri(path),
            &canonical_query,
            &[("host", host)],
            &["host"],
            UNSIGNED_PAYLOAD,
        );
        debug!(canonical_request, "Built canonical request for presigning");

        let signature = self.signature(&canonical_request, &amz_date, &scope, params);
        Ok(format!(
            "{canonical_query}&{}={signature}",
            uri_encode("X-Amz-Signature", true)
        ))
    }

    fn signature(
        &self,
        canonical_request: &str,
        amz_date: &str,
        scope: &str,
        params: &SigningParams<'_>,
    ) -> String {
        let canonical_hash = hex::encode(Sha256::digest(canonical_request.as_bytes()));
        let string_to_sign = build_string_to_sign(amz_date, scope, &canonical_hash);
        let date = params.timestamp.format(SCOPE_DATE_FORMAT).to_string();
        let signing_key = self.keys.get_or_derive(
            &params.credentials.secret_access_key,
            &date,
            params.region,
            params.service,
        );
        compute_signature(&signing_key, &string_to_sign)
    }
}

fn credential_scope(params: &SigningParams<'_>) -> String {
    format!(
        "{}/{}/{}/aws4_request",
        params.timestamp.format(SCOPE_DATE_FORMAT),
        params.region,
        params.service
    )
}

/// Parse an `Authorization` header value.
///
/// The header does not carry the signing instant, so `amz_date` is the
/// request's `x-amz-date`.
///
/// # Errors
///
/// Returns [`AuthError::InvalidAuthHeader`] if a field is missing,
/// [`AuthError::UnsupportedAlgorithm`] for anything but `AWS4-HMAC-SHA256`
/// and [`AuthError::InvalidCredential`] for a malformed credential.
pub fn parse_authorization_header(
    header: &str,
    amz_date: &str,
) -> Result<SignatureClaim, AuthError> {
    let (algorithm, fields) = header.split_once(' ').ok_or(AuthError::InvalidAuthHeader)?;
    if algorithm != SUPPORTED_ALGORITHM {
        return Err(AuthError::UnsupportedAlgorithm(algorithm.to_owned()));
    }

    let credential = auth_field(fields, "Credential")?;
    let signed_headers = auth_field(fields, "SignedHeaders")?;
    let signature = auth_field(fields, "Signature")?;

    Ok(SignatureClaim {
        credential: CredentialScope::parse(credential)?,
        amz_date: amz_date.to_owned(),
        signed_headers: signed_headers.split(';').map(ToOwned::to_owned).collect(),
        signature: signature.to_owned(),
    })
}

fn auth_field<'h>(fields: &'h str, name: &str) -> Result<&'h str, AuthError> {
    fields
        .split(',')
        .find_map(|f| f.trim().strip_prefix(name)?.strip_prefix('='))
        .ok_or(AuthError::InvalidAuthHeader)
}

/// Build the SigV4 string to sign.
///
/// ```
/// use unis3_auth::sigv4::build_string_to_sign;
///
/// let sts = build_string_to_sign(
///     "20130524T000000Z",
///     "20130524/us-east-1/s3/aws4_request",
///     "7344ae5b7ee6c3e7e6b0fe0640412a37625d1fbfff95c48bbb2dc43964946972",
/// );
/// assert!(sts.starts_with("AWS4-HMAC-SHA256\n20130524T000000Z\n"));
/// ```
#[must_use]
pub fn build_string_to_sign(
    timestamp: &str,
    credential_scope: &str,
    canonical_request_hash: &str,
) -> String {
    format!("{SUPPORTED_ALGORITHM}\n{timestamp}\n{credential_scope}\n{canonical_request_hash}")
}

/// Derive the SigV4 signing key using the HMAC-SHA256 chain.
///
/// ```text
/// DateKey              = HMAC-SHA256("AWS4" + secret_key, date)
/// DateRegionKey        = HMAC-SHA256(DateKey, region)
/// DateRegionServiceKey = HMAC-SHA256(DateRegionKey, service)
/// SigningKey           = HMAC-SHA256(DateRegionServiceKey, "aws4_request")
/// ```
#[must_use]
pub fn derive_signing_key(secret_key: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let date_key = hmac_sha256(format!("AWS4{secret_key}").as_bytes(), date.as_bytes());
    let date_region_key = hmac_sha256(&date_key, region.as_bytes());
    let date_region_service_key = hmac_sha256(&date_region_key, service.as_bytes());
    hmac_sha256(&date_region_service_key, b"aws4_request")
}

/// Compute the hex-encoded HMAC-SHA256 signature of `data`.
#[must_use]
pub fn compute_signature(signing_key: &[u8], data: &str) -> String {
    let sig = hmac_sha256(signing_key, data.as_bytes());
    hex::encode(sig)
}

/// Verify an AWS SigV4-signed HTTP request.
///
/// # Errors
///
/// Returns an [`AuthError`] if the `Authorization` header or `x-amz-date`
/// is missing or malformed, the access key is unknown, a signed header is
/// missing or the signature does not match.
pub fn verify_sigv4(
    parts: &http::request::Parts,
    body_hash: &str,
    credential_provider: &dyn CredentialProvider,
) -> Result<AuthResult, AuthError> {
    let auth_header = parts
        .headers
        .get(http::header::AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;
    let amz_date = extract_header_value(parts, "x-amz-date")?;
    let claim = parse_authorization_header(auth_header, &amz_date)?;

    let canonical_query = build_canonical_query_string(parts.uri.query().unwrap_or(""));
    check_claim(parts, claim, &canonical_query, body_hash, credential_provider)
}

/// Rebuild the canonical request for `parts` and check `claim` against it.
///
/// `canonical_query` is already canonical; presigned URLs pass their query
/// without `X-Amz-Signature`.
pub(crate) fn check_claim(
    parts: &http::request::Parts,
    claim: SignatureClaim,
    canonical_query: &str,
    payload_hash: &str,
    credential_provider: &dyn CredentialProvider,
) -> Result<AuthResult, AuthError> {
    let SignatureClaim {
        credential,
        amz_date,
        signed_headers,
        signature,
    } = claim;
    debug!(
        access_key_id = %credential.access_key_id,
        scope = %credential.scope(),
        "Verifying SigV4 signature"
    );
    let secret_key = credential_provider.get_secret_key(&credential.access_key_id)?;

    let names: Vec<&str> = signed_headers.iter().map(String::as_str).collect();
    let header_pairs = collect_signed_headers(parts, &names)?;
    let canonical_request = assemble(
        parts.method.as_str(),
        &build_canonical_uri(parts.uri.path()),
        canonical_query,
        &header_pairs,
        &names,
        payload_hash,
    );

    let canonical_hash = hex::encode(Sha256::digest(canonical_request.as_bytes()));
    let string_to_sign = build_string_to_sign(&amz_date, &credential.scope(), &canonical_hash);
    let signing_key = derive_signing_key(
        &secret_key,
        &credential.date,
        &credential.region,
        &credential.service,
    );
    let expected = compute_signature(&signing_key, &string_to_sign);

    if bool::from(signature.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(AuthResult {
            access_key_id: credential.access_key_id,
            region: credential.region,
            service: credential.service,
            signed_headers,
        })
    } else {
        debug!(canonical_request, provided = %signature, "Signature mismatch");
        Err(AuthError::SignatureDoesNotMatch)
    }
}

fn extract_header_value(parts: &http::request::Parts, name: &str) -> Result<String, AuthError> {
    parts
        .headers
        .get(name)
        .ok_or_else(|| AuthError::MissingHeader(name.to_owned()))?
        .to_str()
        .map(ToOwned::to_owned)
        .map_err(|_| AuthError::MissingHeader(name.to_owned()))
}

/// Collect header name-value pairs for the specified signed headers.
///
/// Repeated headers are all returned; canonicalization comma-joins them.
pub(crate) fn collect_signed_headers<'a>(
    parts: &'a http::request::Parts,
    signed_headers: &[&'a str],
) -> Result<Vec<(&'a str, &'a str)>, AuthError> {
    let mut result = Vec::with_capacity(signed_headers.len());

    for &name in signed_headers {
        let mut values = parts.headers.get_all(name).iter().peekable();
        if values.peek().is_none() {
            return Err(AuthError::MissingHeader(name.to_owned()));
        }
        for value in values {
            let value = value
                .to_str()
                .map_err(|_| AuthError::MissingHeader(name.to_owned()))?;
            result.push((name, value));
        }
    }

    Ok(result)
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can accept keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Compute the SHA-256 hash of the given payload as a hex string.
///
/// ```
/// use unis3_auth::sigv4::hash_payload;
///
/// assert_eq!(
///     hash_payload(b""),
///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
/// );
/// ```
#[must_use]
pub fn hash_payload(payload: &[u8]) -> String {
    hex::encode(Sha256::digest(payload))
}
