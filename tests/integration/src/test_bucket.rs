//! Bucket lifecycle and bucket configuration tests.

#[cfg(test)]
mod tests {
    use unis3_core::Provider;
    use unis3_model::ErrorKind;
    use unis3_model::input::{CreateBucketOptions, ListBucketsOptions, PutObjectOptions};
    use unis3_model::types::{
        DefaultRetention, ObjectLockConfiguration, PublicAccessBlockConfiguration, RetentionMode,
        Tagging, VersioningStatus,
    };

    use unis3_client::UploadSource;

    use crate::{create_locked_bucket, create_test_bucket, memory_client, test_bucket_name};

    #[test]
    fn test_should_refuse_to_delete_non_empty_bucket() {
        let (_server, client) = memory_client(Provider::Aws);
        let bucket = create_test_bucket(&client, "nonempty");
        client
            .put_object(&bucket, "keep.txt", UploadSource::from("x"), &PutObjectOptions::default())
            .unwrap();

        let err = client.delete_bucket(&bucket).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BucketNotEmpty);
        assert_eq!(err.vendor_code(), Some("BucketNotEmpty"));

        client
            .delete_object(&bucket, "keep.txt", &Default::default())
            .unwrap();
        client.delete_bucket(&bucket).unwrap();
        assert!(!client.bucket_exists(&bucket).unwrap());
    }

    #[test]
    fn test_should_report_duplicate_and_missing_buckets() {
        let (_server, client) = memory_client(Provider::Generic);
        let bucket = create_test_bucket(&client, "dup");
        let err = client
            .create_bucket(&bucket, &CreateBucketOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BucketAlreadyExists);

        let missing = test_bucket_name("missing");
        let err = client.delete_bucket(&missing).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BucketNotFound);
        let err = client.get_bucket_versioning(&missing).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BucketNotFound);
    }

    #[test]
    fn test_should_list_buckets_with_region_and_prefix() {
        let (_server, client) = memory_client(Provider::Aws);
        client
            .create_bucket(
                "eu-archive",
                &CreateBucketOptions {
                    region: Some("eu-west-1".to_owned()),
                    ..CreateBucketOptions::default()
                },
            )
            .unwrap();
        for name in ["eu-logs", "us-logs"] {
            client
                .create_bucket(name, &CreateBucketOptions::default())
                .unwrap();
        }

        let options = ListBucketsOptions {
            prefix: Some("eu-".to_owned()),
            max_buckets: Some(1),
            ..ListBucketsOptions::default()
        };
        let buckets = client.list_buckets(&options).collect_all().unwrap();
        let names: Vec<&str> = buckets.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["eu-archive", "eu-logs"]);
        assert_eq!(buckets[0].region.as_deref(), Some("eu-west-1"));
    }

    #[test]
    fn test_should_report_missing_bucket_configuration() {
        let (_server, client) = memory_client(Provider::Generic);
        let bucket = create_test_bucket(&client, "bare");

        assert_eq!(
            client.get_bucket_tagging(&bucket).unwrap_err().kind(),
            ErrorKind::NoTagSet
        );
        assert_eq!(
            client.get_bucket_policy(&bucket).unwrap_err().kind(),
            ErrorKind::NoBucketPolicy
        );
        assert_eq!(
            client.get_public_access_block(&bucket).unwrap_err().kind(),
            ErrorKind::NoPublicAccessBlock
        );
        assert_eq!(client.get_bucket_versioning(&bucket).unwrap(), None);
    }

    #[test]
    fn test_should_replace_bucket_configuration() {
        let (_server, client) = memory_client(Provider::Aws);
        let bucket = create_test_bucket(&client, "config");

        let tags = Tagging::new([("team", "storage"), ("env", "test")]).unwrap();
        client.set_bucket_tagging(&bucket, &tags).unwrap();
        assert_eq!(client.get_bucket_tagging(&bucket).unwrap(), tags);
        client.delete_bucket_tagging(&bucket).unwrap();
        assert_eq!(
            client.get_bucket_tagging(&bucket).unwrap_err().kind(),
            ErrorKind::NoTagSet
        );

        let policy = r#"{"Version":"2012-10-17","Statement":[]}"#;
        client.set_bucket_policy(&bucket, policy).unwrap();
        assert_eq!(client.get_bucket_policy(&bucket).unwrap(), policy);
        client.delete_bucket_policy(&bucket).unwrap();

        let block = PublicAccessBlockConfiguration {
            block_public_acls: true,
            restrict_public_buckets: true,
            ..PublicAccessBlockConfiguration::default()
        };
        client.set_public_access_block(&bucket, &block).unwrap();
        assert_eq!(client.get_public_access_block(&bucket).unwrap(), block);
        client.delete_public_access_block(&bucket).unwrap();

        client
            .set_bucket_versioning(&bucket, VersioningStatus::Enabled)
            .unwrap();
        client
            .set_bucket_versioning(&bucket, VersioningStatus::Suspended)
            .unwrap();
        assert_eq!(
            client.get_bucket_versioning(&bucket).unwrap(),
            Some(VersioningStatus::Suspended)
        );
    }

    #[test]
    fn test_should_apply_default_retention_to_new_objects() {
        let (_server, client) = memory_client(Provider::Aws);
        let bucket = create_locked_bucket(&client, "defaults");
        assert_eq!(
            client.get_bucket_versioning(&bucket).unwrap(),
            Some(VersioningStatus::Enabled)
        );

        let rule = DefaultRetention::days(RetentionMode::Governance, 1).unwrap();
        client
            .set_object_lock_configuration(&bucket, &ObjectLockConfiguration::with_default(rule))
            .unwrap();
        let stored = client.get_object_lock_configuration(&bucket).unwrap();
        assert!(stored.enabled);
        assert_eq!(stored.default_retention, Some(rule));

        let version = client
            .put_object(&bucket, "ledger.csv", UploadSource::from("a,b"), &PutObjectOptions::default())
            .unwrap()
            .version_id;
        let retention = client
            .get_object_retention(&bucket, "ledger.csv", version.as_deref())
            .unwrap()
            .unwrap();
        assert_eq!(retention.mode, RetentionMode::Governance);
    }
}
