//! Conditional requests at every site, including the precedence rules for
//! mixed ETag and date conditions.

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use unis3_client::{S3Client, UploadSource};
    use unis3_core::Provider;
    use unis3_model::input::{
        CopyObjectOptions, CopySource, DeleteObjectOptions, GetObjectOptions, PutObjectOptions,
    };
    use unis3_model::types::{ConditionSpec, EtagCondition, S3Object};
    use unis3_model::{ErrorKind, S3Result};

    use crate::{create_test_bucket, memory_client};

    fn seeded(client: &S3Client, prefix: &str) -> (String, S3Object) {
        let bucket = create_test_bucket(client, prefix);
        client
            .put_object(&bucket, "src", UploadSource::from("v1"), &PutObjectOptions::default())
            .unwrap();
        let object = client
            .stat_object(&bucket, "src", &GetObjectOptions::default())
            .unwrap();
        (bucket, object)
    }

    fn copy_with(client: &S3Client, bucket: &str, conditions: ConditionSpec) -> S3Result<()> {
        let source = CopySource {
            conditions,
            ..CopySource::new(bucket, "src")
        };
        client
            .copy_object(&source, bucket, "dst", &CopyObjectOptions::default())
            .map(drop)
    }

    fn read_with(client: &S3Client, bucket: &str, conditions: ConditionSpec) -> S3Result<()> {
        client
            .stat_object(
                bucket,
                "src",
                &GetObjectOptions {
                    conditions,
                    ..GetObjectOptions::default()
                },
            )
            .map(drop)
    }

    #[test]
    fn test_should_let_matching_etag_override_stale_unmodified_since() {
        let (_server, client) = memory_client(Provider::Aws);
        let (bucket, object) = seeded(&client, "copy-match");
        let before = object.last_modified - Duration::seconds(1);

        copy_with(
            &client,
            &bucket,
            ConditionSpec {
                etag: Some(EtagCondition::IfMatch(object.etag.clone())),
                if_unmodified_since: Some(before),
                ..ConditionSpec::none()
            },
        )
        .unwrap();

        let err = copy_with(
            &client,
            &bucket,
            ConditionSpec {
                if_unmodified_since: Some(before),
                ..ConditionSpec::none()
            },
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
    }

    #[test]
    fn test_should_fail_matching_none_match_despite_modified_since() {
        let (_server, client) = memory_client(Provider::Aws);
        let (bucket, object) = seeded(&client, "copy-none-match");
        let before = object.last_modified - Duration::seconds(1);

        let err = copy_with(
            &client,
            &bucket,
            ConditionSpec {
                etag: Some(EtagCondition::IfNoneMatch(object.etag.clone())),
                if_modified_since: Some(before),
                ..ConditionSpec::none()
            },
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);

        copy_with(
            &client,
            &bucket,
            ConditionSpec {
                if_modified_since: Some(before),
                ..ConditionSpec::none()
            },
        )
        .unwrap();
    }

    #[test]
    fn test_should_report_not_modified_on_reads() {
        let (_server, client) = memory_client(Provider::Generic);
        let (bucket, object) = seeded(&client, "read");

        let err = read_with(&client, &bucket, ConditionSpec::if_none_match(&object.etag)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotModified);

        let err = read_with(
            &client,
            &bucket,
            ConditionSpec {
                if_modified_since: Some(object.last_modified),
                ..ConditionSpec::none()
            },
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotModified);

        let err = read_with(&client, &bucket, ConditionSpec::if_match("\"0000\"")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);

        let err = read_with(
            &client,
            &bucket,
            ConditionSpec {
                if_unmodified_since: Some(object.last_modified - Duration::seconds(1)),
                ..ConditionSpec::none()
            },
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);

        read_with(&client, &bucket, ConditionSpec::if_match(&object.etag)).unwrap();
    }

    #[test]
    fn test_should_make_conditional_create_idempotent() {
        for provider in Provider::ALL {
            let (_server, client) = memory_client(provider);
            let bucket = create_test_bucket(&client, "create-once");
            let options = PutObjectOptions {
                conditions: ConditionSpec::if_not_exists(),
                ..PutObjectOptions::default()
            };

            client
                .put_object(&bucket, "lease", UploadSource::from("owner-a"), &options)
                .unwrap();
            let err = client
                .put_object(&bucket, "lease", UploadSource::from("owner-b"), &options)
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::PreconditionFailed, "{provider}");
            assert_eq!(
                client
                    .get_object_bytes(&bucket, "lease", &GetObjectOptions::default())
                    .unwrap(),
                "owner-a".as_bytes()
            );
        }
    }

    #[test]
    fn test_should_guard_overwrite_and_delete_by_etag() {
        let (_server, client) = memory_client(Provider::Aws);
        let (bucket, object) = seeded(&client, "guard");

        let stale = PutObjectOptions {
            conditions: ConditionSpec::if_match("\"ffff\""),
            ..PutObjectOptions::default()
        };
        let err = client
            .put_object(&bucket, "src", UploadSource::from("v2"), &stale)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);

        let fresh = PutObjectOptions {
            conditions: ConditionSpec::if_match(&object.etag),
            ..PutObjectOptions::default()
        };
        let updated = client
            .put_object(&bucket, "src", UploadSource::from("v2"), &fresh)
            .unwrap();

        let err = client
            .delete_object(
                &bucket,
                "src",
                &DeleteObjectOptions {
                    conditions: ConditionSpec::if_match(&object.etag),
                    ..DeleteObjectOptions::default()
                },
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
        client
            .delete_object(
                &bucket,
                "src",
                &DeleteObjectOptions {
                    conditions: ConditionSpec::if_match(&updated.etag),
                    ..DeleteObjectOptions::default()
                },
            )
            .unwrap();
    }

    #[test]
    fn test_should_reject_inexpressible_conditions_locally() {
        let (server, client) = memory_client(Provider::Generic);
        let (bucket, object) = seeded(&client, "local");
        let before = server.request_count();

        let crossed = ConditionSpec {
            etag: Some(EtagCondition::IfMatch(object.etag.clone())),
            if_modified_since: Some(object.last_modified),
            ..ConditionSpec::none()
        };
        assert_eq!(
            read_with(&client, &bucket, crossed).unwrap_err().kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            read_with(&client, &bucket, ConditionSpec::if_not_exists())
                .unwrap_err()
                .kind(),
            ErrorKind::InvalidInput
        );

        let dated_write = PutObjectOptions {
            conditions: ConditionSpec {
                if_unmodified_since: Some(object.last_modified),
                ..ConditionSpec::none()
            },
            ..PutObjectOptions::default()
        };
        assert_eq!(
            client
                .put_object(&bucket, "src", UploadSource::from("x"), &dated_write)
                .unwrap_err()
                .kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(server.request_count(), before);
    }
}
