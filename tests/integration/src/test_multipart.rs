//! Multipart upload lifecycle: manual parts, completion checks, aborts and
//! concurrent part uploads.

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use unis3_client::{S3Client, UploadSource};
    use unis3_core::Provider;
    use unis3_model::ErrorKind;
    use unis3_model::input::{GetObjectOptions, ListUploadsOptions, PutObjectOptions};
    use unis3_model::types::{CompletedPart, ConditionSpec, PartNumber};

    use crate::{MIB, create_test_bucket, memory_client, payload};

    fn start(client: &S3Client, bucket: &str, key: &str) -> String {
        client
            .create_multipart_upload(bucket, key, &PutObjectOptions::default())
            .unwrap()
            .upload_id
    }

    fn part(client: &S3Client, bucket: &str, key: &str, upload_id: &str, n: u32, body: Vec<u8>) -> CompletedPart {
        client
            .upload_part(bucket, key, upload_id, PartNumber::new(n).unwrap(), Bytes::from(body))
            .unwrap()
    }

    #[test]
    fn test_should_upload_parts_concurrently() {
        let (server, client) = memory_client(Provider::Aws);
        let bucket = create_test_bucket(&client, "parallel");
        let upload_id = start(&client, &bucket, "video.mp4");
        let chunks: Vec<Vec<u8>> = (0..4u8)
            .map(|i| vec![i; if i < 3 { 5 * MIB } else { 1024 }])
            .collect();

        let mut parts: Vec<CompletedPart> = std::thread::scope(|scope| {
            let handles: Vec<_> = chunks
                .iter()
                .enumerate()
                .map(|(i, chunk)| {
                    let (client, bucket, upload_id) = (&client, &bucket, &upload_id);
                    scope.spawn(move || {
                        let number = u32::try_from(i + 1).unwrap();
                        part(client, bucket, "video.mp4", upload_id, number, chunk.clone())
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        parts.sort_by_key(|p| p.part_number);

        client
            .complete_multipart_upload(&bucket, "video.mp4", &upload_id, &parts, &ConditionSpec::none())
            .unwrap();
        assert_eq!(server.upload_count(&bucket), 0);

        let body = client
            .get_object_bytes(&bucket, "video.mp4", &GetObjectOptions::default())
            .unwrap();
        assert_eq!(body.len(), 15 * MIB + 1024);
        assert_eq!(body[0], 0);
        assert_eq!(body[10 * MIB], 2);
        assert_eq!(body[15 * MIB], 3);
    }

    #[test]
    fn test_should_validate_parts_on_completion() {
        let (_server, client) = memory_client(Provider::Generic);
        let bucket = create_test_bucket(&client, "complete");
        let upload_id = start(&client, &bucket, "k");
        let first = part(&client, &bucket, "k", &upload_id, 1, payload(5 * MIB));
        let second = part(&client, &bucket, "k", &upload_id, 2, payload(10));
        let complete = |parts: &[CompletedPart]| {
            client
                .complete_multipart_upload(&bucket, "k", &upload_id, parts, &ConditionSpec::none())
                .unwrap_err()
                .kind()
        };

        assert_eq!(
            complete(&[second.clone(), first.clone()]),
            ErrorKind::InvalidPartOrder
        );
        let unknown = CompletedPart {
            part_number: 3,
            etag: second.etag.clone(),
        };
        assert_eq!(
            complete(&[first.clone(), second.clone(), unknown]),
            ErrorKind::InvalidPart
        );
        let wrong_etag = CompletedPart {
            etag: "\"00000000000000000000000000000000\"".to_owned(),
            ..second.clone()
        };
        assert_eq!(
            complete(&[first.clone(), wrong_etag]),
            ErrorKind::InvalidPart
        );

        let small_upload = start(&client, &bucket, "small");
        let a = part(&client, &bucket, "small", &small_upload, 1, payload(1024));
        let b = part(&client, &bucket, "small", &small_upload, 2, payload(1024));
        let err = client
            .complete_multipart_upload(&bucket, "small", &small_upload, &[a, b], &ConditionSpec::none())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EntityTooSmall);

        client
            .complete_multipart_upload(&bucket, "k", &upload_id, &[first, second], &ConditionSpec::none())
            .unwrap();
    }

    #[test]
    fn test_should_keep_latest_retry_of_a_part() {
        let (_server, client) = memory_client(Provider::Generic);
        let bucket = create_test_bucket(&client, "retry");
        let upload_id = start(&client, &bucket, "k");
        part(&client, &bucket, "k", &upload_id, 1, b"stale".to_vec());
        let retried = part(&client, &bucket, "k", &upload_id, 1, b"fresh".to_vec());

        client
            .complete_multipart_upload(&bucket, "k", &upload_id, &[retried], &ConditionSpec::none())
            .unwrap();
        assert_eq!(
            client
                .get_object_bytes(&bucket, "k", &GetObjectOptions::default())
                .unwrap(),
            "fresh".as_bytes()
        );
    }

    #[test]
    fn test_should_forget_aborted_uploads() {
        let (server, client) = memory_client(Provider::Aws);
        let bucket = create_test_bucket(&client, "abort");
        let upload_id = start(&client, &bucket, "k");
        let first = part(&client, &bucket, "k", &upload_id, 1, payload(10));

        client.abort_multipart_upload(&bucket, "k", &upload_id).unwrap();
        assert_eq!(server.upload_count(&bucket), 0);
        let err = client
            .complete_multipart_upload(&bucket, "k", &upload_id, &[first], &ConditionSpec::none())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UploadNotFound);
        let err = client
            .upload_part(&bucket, "k", &upload_id, PartNumber::new(2).unwrap(), Bytes::new())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UploadNotFound);
    }

    #[test]
    fn test_should_leave_no_upload_behind_when_a_part_fails() {
        let (server, client) = memory_client(Provider::Tencent);
        let bucket = create_test_bucket(&client, "fail");
        server.fail_next_upload_part();

        let source = UploadSource::reader(std::io::Cursor::new(payload(12 * MIB)), None);
        let err = client
            .put_object(&bucket, "broken.bin", source, &PutObjectOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ServerError);

        let uploads = client
            .list_multipart_uploads(&bucket, &ListUploadsOptions::default())
            .collect_all()
            .unwrap();
        assert!(uploads.is_empty());
        assert!(!client
            .list_objects_page(&bucket, &Default::default())
            .unwrap()
            .items
            .iter()
            .any(|o| o.key == "broken.bin"));
    }

    #[test]
    fn test_should_report_parts_count_only_where_supported() {
        for (provider, expected) in [(Provider::R2, Some(3)), (Provider::Aws, None)] {
            let (_server, client) = memory_client(provider);
            let bucket = create_test_bucket(&client, "count");
            let output = client
                .put_object(
                    &bucket,
                    "large",
                    UploadSource::reader(std::io::Cursor::new(payload(11 * MIB)), None),
                    &PutObjectOptions::default(),
                )
                .unwrap();
            assert_eq!(output.parts, Some(3), "{provider}");
            let object = client
                .stat_object(&bucket, "large", &GetObjectOptions::default())
                .unwrap();
            assert_eq!(object.parts_count, expected, "{provider}");
        }
    }
}
