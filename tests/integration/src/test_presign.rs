//! Presigned URLs fetched without credentials.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use http::{HeaderMap, Method, StatusCode};
    use unis3_client::UploadSource;
    use unis3_core::Provider;
    use unis3_core::transport::{HttpRequest, Transport};
    use unis3_memory::MemoryServer;
    use unis3_model::input::PutObjectOptions;
    use unis3_model::types::VersioningStatus;

    use crate::{create_test_bucket, memory_client};

    fn fetch(server: &MemoryServer, method: Method, url: &str, body: Bytes) -> (StatusCode, String) {
        let response = server
            .execute(HttpRequest {
                method,
                uri: url.parse().unwrap(),
                headers: HeaderMap::new(),
                body,
            })
            .unwrap();
        let status = response.status;
        let body = response.into_bytes().unwrap();
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    #[test]
    fn test_should_expire_presigned_get() {
        let (server, client) = memory_client(Provider::Aws);
        let bucket = create_test_bucket(&client, "share");
        client
            .put_object(&bucket, "report.txt", UploadSource::from("quarterly"), &PutObjectOptions::default())
            .unwrap();

        let now = chrono::Utc::now();
        server.set_now(now);
        let url = client
            .presigned_get_object_at(&bucket, "report.txt", None, Duration::from_secs(60), now)
            .unwrap();
        assert!(url.starts_with(&format!("http://{bucket}.localhost:9000/report.txt?")));

        let (status, body) = fetch(&server, Method::GET, &url, Bytes::new());
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "quarterly");

        server.advance(chrono::Duration::seconds(59));
        assert_eq!(fetch(&server, Method::GET, &url, Bytes::new()).0, StatusCode::OK);

        server.advance(chrono::Duration::seconds(2));
        let (status, body) = fetch(&server, Method::GET, &url, Bytes::new());
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body.contains("Request has expired"), "{body}");
    }

    #[test]
    fn test_should_reject_tampered_url() {
        let (server, client) = memory_client(Provider::R2);
        let bucket = create_test_bucket(&client, "tamper");
        client
            .put_object(&bucket, "a.txt", UploadSource::from("a"), &PutObjectOptions::default())
            .unwrap();
        let url = client
            .presigned_get_object(&bucket, "a.txt", None, Duration::from_secs(300))
            .unwrap();
        assert!(url.starts_with(&format!("http://localhost:9000/{bucket}/a.txt?")));

        let tampered = url.replace("/a.txt?", "/b.txt?");
        let (status, body) = fetch(&server, Method::GET, &tampered, Bytes::new());
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body.contains("SignatureDoesNotMatch"), "{body}");
    }

    #[test]
    fn test_should_pin_presigned_get_to_a_version() {
        for provider in [Provider::Generic, Provider::Tencent] {
            let (server, client) = memory_client(provider);
            let bucket = create_test_bucket(&client, "pinned");
            client
                .set_bucket_versioning(&bucket, VersioningStatus::Enabled)
                .unwrap();
            let first = client
                .put_object(&bucket, "doc", UploadSource::from("v1"), &PutObjectOptions::default())
                .unwrap()
                .version_id
                .unwrap();
            client
                .put_object(&bucket, "doc", UploadSource::from("v2"), &PutObjectOptions::default())
                .unwrap();

            let url = client
                .presigned_get_object(&bucket, "doc", Some(&first), Duration::from_secs(300))
                .unwrap();
            let (status, body) = fetch(&server, Method::GET, &url, Bytes::new());
            assert_eq!(status, StatusCode::OK, "{provider}");
            assert_eq!(body, "v1", "{provider}");
        }
    }

    #[test]
    fn test_should_accept_presigned_upload() {
        let (server, client) = memory_client(Provider::Aliyun);
        let bucket = create_test_bucket(&client, "dropbox");
        let url = client
            .presigned_put_object(&bucket, "incoming/scan.pdf", Duration::from_secs(600))
            .unwrap();

        let (status, _) = fetch(&server, Method::PUT, &url, Bytes::from_static(b"%PDF-1.7"));
        assert_eq!(status, StatusCode::OK);
        let object = client
            .stat_object(&bucket, "incoming/scan.pdf", &Default::default())
            .unwrap();
        assert_eq!(object.size, 8);
    }
}
