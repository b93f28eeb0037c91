//! Error translation: local failures, vendor error bodies and partial batch
//! failures.

#[cfg(test)]
mod tests {
    use http::StatusCode;
    use unis3_client::{ClientConfig, CredentialsConfig, S3Client, UploadSource};
    use unis3_core::Provider;
    use unis3_model::ErrorKind;
    use unis3_model::input::{
        DeleteObjectsOptions, GetObjectOptions, ObjectIdentifier, PutObjectOptions,
    };

    use crate::{ACCESS_KEY, create_test_bucket, memory_client, test_bucket_name};

    #[test]
    fn test_should_fail_locally_without_touching_the_server() {
        let (server, client) = memory_client(Provider::Generic);
        let bucket = create_test_bucket(&client, "local");
        client
            .put_object(&bucket, "k", UploadSource::from("remote"), &PutObjectOptions::default())
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("existing.txt");
        std::fs::write(&existing, b"precious").unwrap();
        let before = server.request_count();

        let err = client
            .upload_file(&bucket, "k", dir.path().join("absent.bin"), &PutObjectOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InputFileNotFound);
        assert!(err.is_local());

        let err = client
            .download_object(&bucket, "k", &existing, &GetObjectOptions::default(), false)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutputFileExists);
        assert_eq!(std::fs::read(&existing).unwrap(), b"precious");

        let err = client
            .delete_objects(&bucket, &[], &DeleteObjectsOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        assert_eq!(server.request_count(), before);

        client
            .download_object(&bucket, "k", &existing, &GetObjectOptions::default(), true)
            .unwrap();
        assert_eq!(std::fs::read(&existing).unwrap(), b"remote");
    }

    #[test]
    fn test_should_keep_vendor_error_details() {
        let (_server, client) = memory_client(Provider::Aliyun);
        let bucket = create_test_bucket(&client, "vendor");

        let err = client
            .get_object_bytes(&bucket, "missing.txt", &GetObjectOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ObjectNotFound);
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(err.vendor_code(), Some("NoSuchKey"));
        let body = err.body().unwrap();
        assert!(body.request_id.is_some());
        assert!(!err.is_local());

        let err = client
            .stat_object(&bucket, "missing.txt", &GetObjectOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ObjectNotFound);

        let err = client
            .get_object_bytes(&test_bucket_name("ghost"), "k", &GetObjectOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BucketNotFound);
    }

    #[test]
    fn test_should_reject_bad_signatures() {
        let (server, client) = memory_client(Provider::Generic);
        let bucket = create_test_bucket(&client, "auth");
        let config = ClientConfig::builder()
            .endpoint("localhost:9000".to_owned())
            .provider(Provider::Generic)
            .secure(false)
            .credentials(CredentialsConfig::new(ACCESS_KEY, "wrong-secret"))
            .build();
        let impostor = S3Client::new(config, server.clone()).unwrap();

        let err = impostor
            .get_object_bytes(&bucket, "k", &GetObjectOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SignatureDoesNotMatch);
        assert_eq!(err.status(), Some(StatusCode::FORBIDDEN));
    }

    #[test]
    fn test_should_report_partial_batch_failure() {
        let (_server, client) = memory_client(Provider::Aws);
        let bucket = create_test_bucket(&client, "batch");
        let mut etags = Vec::new();
        for key in ["keep-me", "drop-me"] {
            etags.push(
                client
                    .put_object(&bucket, key, UploadSource::from(key.to_owned()), &PutObjectOptions::default())
                    .unwrap()
                    .etag,
            );
        }

        let result = client
            .delete_objects(
                &bucket,
                &[
                    ObjectIdentifier::with_etag("drop-me", &etags[1]),
                    ObjectIdentifier::with_etag("keep-me", "\"0123456789abcdef0123456789abcdef\""),
                ],
                &DeleteObjectsOptions::default(),
            )
            .unwrap();
        assert!(!result.successful());
        let deleted: Vec<&str> = result.deleted.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(deleted, ["drop-me"]);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].key, "keep-me");
        assert_eq!(result.errors[0].code, "PreconditionFailed");

        let keys: Vec<String> = client
            .list_objects_page(&bucket, &Default::default())
            .unwrap()
            .items
            .into_iter()
            .map(|o| o.key)
            .collect();
        assert_eq!(keys, ["keep-me"]);
    }

    #[test]
    fn test_should_stay_quiet_about_successes() {
        let (_server, client) = memory_client(Provider::Generic);
        let bucket = create_test_bucket(&client, "quiet");
        let keys = ["a", "b", "c"];
        for key in keys {
            client
                .put_object(&bucket, key, UploadSource::from(key), &PutObjectOptions::default())
                .unwrap();
        }
        let ids: Vec<ObjectIdentifier> = keys.into_iter().map(ObjectIdentifier::new).collect();
        let result = client
            .delete_objects(
                &bucket,
                &ids,
                &DeleteObjectsOptions {
                    quiet: true,
                    ..DeleteObjectsOptions::default()
                },
            )
            .unwrap();
        assert!(result.successful());
        assert!(result.deleted.is_empty());
    }
}
