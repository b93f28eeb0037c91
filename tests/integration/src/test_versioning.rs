//! Version addressing, the null version and delete markers under every
//! provider dialect.

#[cfg(test)]
mod tests {
    use unis3_client::{S3Client, UploadSource};
    use unis3_core::Provider;
    use unis3_model::ErrorKind;
    use unis3_model::input::{
        CopyObjectOptions, CopySource, DeleteObjectOptions, GetObjectOptions, ListVersionsOptions,
        PutObjectOptions,
    };
    use unis3_model::types::VersioningStatus;

    use crate::{create_test_bucket, memory_client};

    fn put(client: &S3Client, bucket: &str, key: &str, body: &'static str) -> Option<String> {
        client
            .put_object(bucket, key, UploadSource::from(body), &PutObjectOptions::default())
            .unwrap()
            .version_id
    }

    fn read(client: &S3Client, bucket: &str, key: &str, version: Option<&str>) -> Result<String, ErrorKind> {
        client
            .get_object_bytes(
                bucket,
                key,
                &GetObjectOptions {
                    version_id: version.map(str::to_owned),
                    ..GetObjectOptions::default()
                },
            )
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .map_err(|e| e.kind())
    }

    fn version_ids(client: &S3Client, bucket: &str) -> Vec<(String, bool)> {
        client
            .list_object_versions(bucket, &ListVersionsOptions::default())
            .collect_all()
            .unwrap()
            .into_iter()
            .map(|v| (v.version_id, v.delete_marker))
            .collect()
    }

    #[test]
    fn test_should_address_null_version_uniformly() {
        for provider in Provider::ALL {
            let (_server, client) = memory_client(provider);
            let bucket = create_test_bucket(&client, "null");
            assert_eq!(put(&client, &bucket, "doc", "before"), None, "{provider}");

            client
                .set_bucket_versioning(&bucket, VersioningStatus::Enabled)
                .unwrap();
            let v2 = put(&client, &bucket, "doc", "after").unwrap();
            assert_ne!(v2, "null");

            assert_eq!(read(&client, &bucket, "doc", Some("null")).unwrap(), "before", "{provider}");
            assert_eq!(read(&client, &bucket, "doc", Some(&v2)).unwrap(), "after", "{provider}");
            let stat = client
                .stat_object(
                    &bucket,
                    "doc",
                    &GetObjectOptions {
                        version_id: Some("null".to_owned()),
                        ..GetObjectOptions::default()
                    },
                )
                .unwrap();
            assert_eq!(stat.version_id, None, "{provider}");

            let copied = client
                .copy_object(
                    &CopySource {
                        version_id: Some("null".to_owned()),
                        ..CopySource::new(&bucket, "doc")
                    },
                    &bucket,
                    "restored",
                    &CopyObjectOptions::default(),
                )
                .unwrap();
            assert_eq!(copied.copy_source_version_id.as_deref(), Some("null"), "{provider}");
            assert_eq!(read(&client, &bucket, "restored", None).unwrap(), "before");

            client
                .delete_object(
                    &bucket,
                    "doc",
                    &DeleteObjectOptions {
                        version_id: Some("null".to_owned()),
                        ..DeleteObjectOptions::default()
                    },
                )
                .unwrap();
            let remaining: Vec<String> = version_ids(&client, &bucket)
                .into_iter()
                .map(|(id, _)| id)
                .filter(|id| id == "null" || *id == v2)
                .collect();
            assert_eq!(remaining, [v2.clone()], "{provider}");
        }
    }

    #[test]
    fn test_should_hide_object_behind_delete_marker() {
        for provider in [Provider::Aws, Provider::R2] {
            let (_server, client) = memory_client(provider);
            let bucket = create_test_bucket(&client, "marker");
            client
                .set_bucket_versioning(&bucket, VersioningStatus::Enabled)
                .unwrap();
            let v1 = put(&client, &bucket, "doc", "content").unwrap();

            let deleted = client
                .delete_object(&bucket, "doc", &DeleteObjectOptions::default())
                .unwrap();
            assert!(deleted.delete_marker);
            let marker = deleted.version_id.unwrap();

            assert_eq!(read(&client, &bucket, "doc", None), Err(ErrorKind::ObjectNotFound));
            assert_eq!(
                read(&client, &bucket, "doc", Some(&marker)),
                Err(ErrorKind::VersionIsDeleteMarker),
                "{provider}"
            );
            assert_eq!(read(&client, &bucket, "doc", Some(&v1)).unwrap(), "content");
            assert_eq!(
                version_ids(&client, &bucket),
                [(marker.clone(), true), (v1.clone(), false)]
            );

            client
                .delete_object(
                    &bucket,
                    "doc",
                    &DeleteObjectOptions {
                        version_id: Some(marker),
                        ..DeleteObjectOptions::default()
                    },
                )
                .unwrap();
            assert_eq!(read(&client, &bucket, "doc", None).unwrap(), "content");
        }
    }

    #[test]
    fn test_should_overwrite_null_version_while_suspended() {
        let (_server, client) = memory_client(Provider::Generic);
        let bucket = create_test_bucket(&client, "suspended");
        client
            .set_bucket_versioning(&bucket, VersioningStatus::Enabled)
            .unwrap();
        let kept = put(&client, &bucket, "doc", "kept").unwrap();
        client
            .set_bucket_versioning(&bucket, VersioningStatus::Suspended)
            .unwrap();
        assert_eq!(put(&client, &bucket, "doc", "first null"), None);
        assert_eq!(put(&client, &bucket, "doc", "second null"), None);

        let ids: Vec<String> = version_ids(&client, &bucket)
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, ["null".to_owned(), kept.clone()]);
        assert_eq!(read(&client, &bucket, "doc", Some("null")).unwrap(), "second null");
        assert_eq!(read(&client, &bucket, "doc", Some(&kept)).unwrap(), "kept");
    }
}
