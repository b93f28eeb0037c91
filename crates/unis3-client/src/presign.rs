//! Presigned URLs: time-boxed links any HTTP client can use without
//! credentials.

use std::time::Duration;

use chrono::{DateTime, Utc};
use http::Method;
use tracing::debug;
use unis3_model::S3Result;

use crate::S3Client;
use crate::request::wire_version_id;

impl S3Client {
    /// A URL that downloads `bucket`/`key` (or one version of it) until
    /// `expires` has passed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an expiry outside one second to seven
    /// days.
    pub fn presigned_get_object(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        expires: Duration,
    ) -> S3Result<String> {
        self.presigned_get_object_at(bucket, key, version_id, expires, Utc::now())
    }

    /// [`S3Client::presigned_get_object`] signed as of `now`.
    ///
    /// # Errors
    ///
    /// See [`S3Client::presigned_get_object`].
    pub fn presigned_get_object_at(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        expires: Duration,
        now: DateTime<Utc>,
    ) -> S3Result<String> {
        let query: Vec<(String, String)> = version_id
            .map(|v| ("versionId".to_owned(), wire_version_id(v, self.dialect())))
            .into_iter()
            .collect();
        self.presign_at(&Method::GET, bucket, key, expires, &query, now)
    }

    /// A URL that uploads to `bucket`/`key` with a plain PUT until
    /// `expires` has passed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an expiry outside one second to seven
    /// days.
    pub fn presigned_put_object(
        &self,
        bucket: &str,
        key: &str,
        expires: Duration,
    ) -> S3Result<String> {
        self.presigned_put_object_at(bucket, key, expires, Utc::now())
    }

    /// [`S3Client::presigned_put_object`] signed as of `now`.
    ///
    /// # Errors
    ///
    /// See [`S3Client::presigned_put_object`].
    pub fn presigned_put_object_at(
        &self,
        bucket: &str,
        key: &str,
        expires: Duration,
        now: DateTime<Utc>,
    ) -> S3Result<String> {
        self.presign_at(&Method::PUT, bucket, key, expires, &[], now)
    }

    /// Presign any object request. `extra_query` parameters (a version id,
    /// response header overrides, a part number) are covered by the
    /// signature.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an expiry outside one second to seven
    /// days or empty credentials.
    pub fn presign(
        &self,
        method: &Method,
        bucket: &str,
        key: &str,
        expires: Duration,
        extra_query: &[(String, String)],
    ) -> S3Result<String> {
        self.presign_at(method, bucket, key, expires, extra_query, Utc::now())
    }

    /// [`S3Client::presign`] signed as of `now`.
    ///
    /// # Errors
    ///
    /// See [`S3Client::presign`].
    pub fn presign_at(
        &self,
        method: &Method,
        bucket: &str,
        key: &str,
        expires: Duration,
        extra_query: &[(String, String)],
        now: DateTime<Utc>,
    ) -> S3Result<String> {
        let target = self.target(Some(bucket), Some(key));
        let query = self.signer().presign(
            method.as_str(),
            &target.path,
            &target.host,
            extra_query,
            &self.signing_params(now),
            expires.as_secs(),
        )?;
        debug!(%method, bucket, key, expires_secs = expires.as_secs(), "presigned url created");
        Ok(target.url(&query))
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use chrono::TimeZone;
    use http::{HeaderMap, StatusCode};
    use unis3_core::Provider;
    use unis3_core::transport::{HttpRequest, Transport};
    use unis3_model::ErrorKind;
    use unis3_model::input::{CreateBucketOptions, GetObjectOptions, PutObjectOptions};

    use crate::UploadSource;
    use crate::testing::memory_client;

    use super::*;

    fn fetch(
        server: &dyn Transport,
        method: Method,
        url: &str,
        body: &'static [u8],
    ) -> (StatusCode, Bytes) {
        let response = server
            .execute(HttpRequest {
                method,
                uri: url.parse().unwrap(),
                headers: HeaderMap::new(),
                body: Bytes::from_static(body),
            })
            .unwrap();
        let status = response.status;
        (status, response.into_bytes().unwrap())
    }

    #[test]
    fn test_should_embed_signature_parameters() {
        let (_server, client) = memory_client(Provider::Aws);
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let url = client
            .presigned_get_object_at("docs", "a b.txt", None, Duration::from_secs(60), now)
            .unwrap();
        assert!(url.starts_with("http://docs.localhost/a%20b.txt?"));
        assert!(url.contains("X-Amz-Expires=60"));
        assert!(url.contains("X-Amz-Date=20240501T120000Z"));
        assert!(url.contains("&X-Amz-Signature="));
    }

    #[test]
    fn test_should_reject_expiry_beyond_a_week() {
        let (_server, client) = memory_client(Provider::Generic);
        let err = client
            .presigned_put_object("docs", "k", Duration::from_secs(8 * 24 * 3600))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_should_serve_presigned_get_until_expiry() {
        let (server, client) = memory_client(Provider::Generic);
        client
            .create_bucket("shared", &CreateBucketOptions::default())
            .unwrap();
        client
            .put_object(
                "shared",
                "note.txt",
                UploadSource::from("hello"),
                &PutObjectOptions::default(),
            )
            .unwrap();

        let now = Utc::now();
        server.set_now(now);
        let url = client
            .presigned_get_object_at("shared", "note.txt", None, Duration::from_secs(30), now)
            .unwrap();
        let (status, body) = fetch(&*server, Method::GET, &url, b"");
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Bytes::from_static(b"hello"));

        server.advance(chrono::Duration::seconds(31));
        let (status, body) = fetch(&*server, Method::GET, &url, b"");
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(String::from_utf8_lossy(&body).contains("Request has expired"));
    }

    #[test]
    fn test_should_accept_presigned_put() {
        let (server, client) = memory_client(Provider::Generic);
        client
            .create_bucket("inbox", &CreateBucketOptions::default())
            .unwrap();
        let url = client
            .presigned_put_object("inbox", "upload.bin", Duration::from_secs(300))
            .unwrap();
        let (status, _) = fetch(&*server, Method::PUT, &url, b"payload");
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            client
                .get_object_bytes("inbox", "upload.bin", &GetObjectOptions::default())
                .unwrap(),
            Bytes::from_static(b"payload")
        );
    }
}
