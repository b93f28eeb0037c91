//! Object round trips, metadata, copies and tagging.

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::io::{Cursor, Write};

    use unis3_client::{S3Client, UploadSource};
    use unis3_core::Provider;
    use unis3_model::ErrorKind;
    use unis3_model::input::{
        CopyObjectOptions, CopySource, GetObjectOptions, PutObjectOptions,
    };
    use unis3_model::types::{MetadataDirective, ServerSideEncryption, Tagging, TaggingDirective};

    use crate::{MIB, create_test_bucket, memory_client, payload};

    fn round_trip(client: &S3Client, bucket: &str, key: &str, source: UploadSource, data: &[u8]) {
        client
            .put_object(bucket, key, source, &PutObjectOptions::default())
            .unwrap_or_else(|e| panic!("put {key}: {e}"));
        let object = client
            .stat_object(bucket, key, &GetObjectOptions::default())
            .unwrap();
        assert_eq!(object.size, data.len() as u64, "{key}");
        let body = client
            .get_object_bytes(bucket, key, &GetObjectOptions::default())
            .unwrap();
        assert!(body == data, "{key}: downloaded bytes differ");
    }

    #[test]
    fn test_should_round_trip_every_source_and_size() {
        let (_server, client) = memory_client(Provider::Generic);
        let bucket = create_test_bucket(&client, "roundtrip");
        let dir = tempfile::tempdir().unwrap();

        for size in [0, 1024, 6 * MIB] {
            let data = payload(size);

            round_trip(
                &client,
                &bucket,
                &format!("bytes-{size}"),
                UploadSource::from(data.clone()),
                &data,
            );

            let path = dir.path().join(format!("file-{size}"));
            std::fs::File::create(&path)
                .and_then(|mut f| f.write_all(&data))
                .unwrap();
            round_trip(
                &client,
                &bucket,
                &format!("file-{size}"),
                UploadSource::file(&path),
                &data,
            );

            round_trip(
                &client,
                &bucket,
                &format!("stream-{size}"),
                UploadSource::reader(Cursor::new(data.clone()), None),
                &data,
            );
            round_trip(
                &client,
                &bucket,
                &format!("sized-stream-{size}"),
                UploadSource::reader(Cursor::new(data.clone()), Some(size as u64)),
                &data,
            );
        }
    }

    #[test]
    fn test_should_download_to_file() {
        let (_server, client) = memory_client(Provider::Aws);
        let bucket = create_test_bucket(&client, "download");
        let data = payload(6 * MIB);
        client
            .put_object(&bucket, "big.bin", UploadSource::from(data.clone()), &PutObjectOptions::default())
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        let object = client
            .download_object(&bucket, "big.bin", &path, &GetObjectOptions::default(), false)
            .unwrap();
        assert_eq!(object.size, data.len() as u64);
        assert_eq!(std::fs::read(&path).unwrap(), data);
    }

    #[test]
    fn test_should_keep_metadata_and_tags() {
        let (_server, client) = memory_client(Provider::Aws);
        let bucket = create_test_bucket(&client, "meta");
        let options = PutObjectOptions {
            content_type: Some("application/json".to_owned()),
            cache_control: Some("max-age=60".to_owned()),
            user_metadata: BTreeMap::from([("origin".to_owned(), "sensor-7".to_owned())]),
            tags: Some(Tagging::new([("class", "telemetry")]).unwrap()),
            storage_class: Some("STANDARD_IA".to_owned()),
            sse: Some(ServerSideEncryption::s3()),
            ..PutObjectOptions::default()
        };
        client
            .put_object(&bucket, "reading.json", UploadSource::from("{}"), &options)
            .unwrap();

        let object = client
            .stat_object(&bucket, "reading.json", &GetObjectOptions::default())
            .unwrap();
        let metadata = object.metadata.unwrap();
        assert_eq!(metadata.content_type.as_deref(), Some("application/json"));
        assert_eq!(metadata.cache_control.as_deref(), Some("max-age=60"));
        assert_eq!(metadata.user_metadata["origin"], "sensor-7");
        assert_eq!(object.storage_class.as_deref(), Some("STANDARD_IA"));
        assert_eq!(object.tag_count, Some(1));
        assert_eq!(object.sse.map(|s| s.algorithm).as_deref(), Some("AES256"));

        let tags = client
            .get_object_tagging(&bucket, "reading.json", None)
            .unwrap();
        assert_eq!(tags.get("class"), Some("telemetry"));
    }

    #[test]
    fn test_should_copy_across_buckets_with_directives() {
        let (_server, client) = memory_client(Provider::Aws);
        let source_bucket = create_test_bucket(&client, "src");
        let target_bucket = create_test_bucket(&client, "dst");
        client
            .put_object(
                &source_bucket,
                "photos/cat.jpg",
                UploadSource::from("meow"),
                &PutObjectOptions {
                    content_type: Some("image/jpeg".to_owned()),
                    tags: Some(Tagging::new([("animal", "cat")]).unwrap()),
                    ..PutObjectOptions::default()
                },
            )
            .unwrap();

        let copied = client
            .copy_object(
                &CopySource::new(&source_bucket, "photos/cat.jpg"),
                &target_bucket,
                "copy.jpg",
                &CopyObjectOptions::default(),
            )
            .unwrap();
        let object = client
            .stat_object(&target_bucket, "copy.jpg", &GetObjectOptions::default())
            .unwrap();
        assert_eq!(object.etag, copied.etag);
        assert_eq!(
            object.metadata.and_then(|m| m.content_type).as_deref(),
            Some("image/jpeg")
        );
        assert_eq!(
            client
                .get_object_tagging(&target_bucket, "copy.jpg", None)
                .unwrap()
                .get("animal"),
            Some("cat")
        );

        client
            .copy_object(
                &CopySource::new(&source_bucket, "photos/cat.jpg"),
                &target_bucket,
                "replaced.jpg",
                &CopyObjectOptions {
                    metadata_directive: Some(MetadataDirective::Replace),
                    content_type: Some("image/png".to_owned()),
                    tagging_directive: Some(TaggingDirective::Replace),
                    tags: Some(Tagging::new([("animal", "dog")]).unwrap()),
                    ..CopyObjectOptions::default()
                },
            )
            .unwrap();
        let replaced = client
            .stat_object(&target_bucket, "replaced.jpg", &GetObjectOptions::default())
            .unwrap();
        assert_eq!(
            replaced.metadata.and_then(|m| m.content_type).as_deref(),
            Some("image/png")
        );
        assert_eq!(
            client
                .get_object_tagging(&target_bucket, "replaced.jpg", None)
                .unwrap()
                .get("animal"),
            Some("dog")
        );
        assert_eq!(
            client
                .get_object_bytes(&target_bucket, "replaced.jpg", &GetObjectOptions::default())
                .unwrap(),
            "meow".as_bytes()
        );
    }

    #[test]
    fn test_should_address_keys_with_special_characters() {
        for provider in [Provider::Aws, Provider::R2] {
            let (_server, client) = memory_client(provider);
            let bucket = create_test_bucket(&client, "chars");
            for key in ["with space.txt", "nested/dir/file+plus.txt", "unicode/日本.txt", "q?a=b&c"] {
                client
                    .put_object(&bucket, key, UploadSource::from(key.to_owned()), &PutObjectOptions::default())
                    .unwrap_or_else(|e| panic!("{provider} put {key}: {e}"));
                let body = client
                    .get_object_bytes(&bucket, key, &GetObjectOptions::default())
                    .unwrap();
                assert_eq!(body, key.as_bytes(), "{provider} {key}");
            }
        }
    }

    #[test]
    fn test_should_refuse_tags_the_provider_cannot_store() {
        let (server, client) = memory_client(Provider::R2);
        let bucket = create_test_bucket(&client, "untaggable");
        client
            .put_object(&bucket, "src.txt", UploadSource::from("src"), &PutObjectOptions::default())
            .unwrap();
        let before = server.request_count();
        let tags = Tagging::new([("team", "data")]).unwrap();

        let err = client
            .put_object(
                &bucket,
                "tagged.txt",
                UploadSource::from("body"),
                &PutObjectOptions {
                    tags: Some(tags.clone()),
                    ..PutObjectOptions::default()
                },
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = client
            .copy_object(
                &CopySource::new(&bucket, "src.txt"),
                &bucket,
                "tagged.txt",
                &CopyObjectOptions {
                    tagging_directive: Some(TaggingDirective::Replace),
                    tags: Some(tags),
                    ..CopyObjectOptions::default()
                },
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(server.request_count(), before);

        client
            .copy_object(
                &CopySource::new(&bucket, "src.txt"),
                &bucket,
                "copied.txt",
                &CopyObjectOptions {
                    tagging_directive: Some(TaggingDirective::Copy),
                    ..CopyObjectOptions::default()
                },
            )
            .unwrap();
    }

    #[test]
    fn test_should_reject_non_ascii_metadata_before_sending() {
        let (server, client) = memory_client(Provider::Generic);
        let bucket = create_test_bucket(&client, "meta");
        let before = server.request_count();
        let err = client
            .put_object(
                &bucket,
                "note.txt",
                UploadSource::from("hi"),
                &PutObjectOptions {
                    user_metadata: BTreeMap::from([("author".to_owned(), "José".to_owned())]),
                    ..PutObjectOptions::default()
                },
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(err.to_string().contains("ASCII"), "{err}");
        assert_eq!(server.request_count(), before);
    }
}
