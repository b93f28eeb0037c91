//! Pagination tests: following the cursors of every list operation to
//! exhaustion yields exactly the single-page listing.

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use unis3_client::{S3Client, UploadSource};
    use unis3_core::Provider;
    use unis3_model::input::{
        ListObjectsOptions, ListPartsOptions, ListUploadsOptions, ListVersionsOptions,
        PutObjectOptions,
    };
    use unis3_model::types::{PartNumber, VersioningStatus};

    use crate::{create_test_bucket, memory_client};

    fn put(client: &S3Client, bucket: &str, key: &str) {
        client
            .put_object(
                bucket,
                key,
                UploadSource::from(key.to_owned()),
                &PutObjectOptions::default(),
            )
            .unwrap();
    }

    #[test]
    fn test_should_page_ten_objects_in_threes() {
        let (_server, client) = memory_client(Provider::Generic);
        let bucket = create_test_bucket(&client, "pages");
        for i in 0..10 {
            put(&client, &bucket, &format!("key-{i:02}"));
        }

        let options = ListObjectsOptions {
            max_keys: Some(3),
            ..ListObjectsOptions::default()
        };
        let pages = client
            .list_objects(&bucket, &options)
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        let sizes: Vec<usize> = pages.iter().map(|p| p.items.len()).collect();
        assert_eq!(sizes, [3, 3, 3, 1]);
        assert!(pages[..3].iter().all(|p| !p.is_last()));
        assert!(pages[3].next.token.is_none());

        let paged: Vec<String> = pages
            .into_iter()
            .flat_map(|p| p.items)
            .map(|o| o.key)
            .collect();
        let single: Vec<String> = client
            .list_objects_page(&bucket, &ListObjectsOptions::default())
            .unwrap()
            .items
            .into_iter()
            .map(|o| o.key)
            .collect();
        assert_eq!(paged, single);
    }

    #[test]
    fn test_should_page_prefixes_and_objects_together() {
        let (_server, client) = memory_client(Provider::Aws);
        let bucket = create_test_bucket(&client, "tree");
        for key in ["a/1", "a/2", "b/1", "c", "d/x/1", "e"] {
            put(&client, &bucket, key);
        }

        let single = client
            .list_objects_page(
                &bucket,
                &ListObjectsOptions {
                    delimiter: Some("/".to_owned()),
                    ..ListObjectsOptions::default()
                },
            )
            .unwrap();
        assert_eq!(single.common_prefixes, ["a/", "b/", "d/"]);

        let options = ListObjectsOptions {
            delimiter: Some("/".to_owned()),
            max_keys: Some(2),
            ..ListObjectsOptions::default()
        };
        let (mut keys, mut prefixes) = (Vec::new(), Vec::new());
        for page in client.list_objects(&bucket, &options) {
            let page = page.unwrap();
            assert!(page.items.len() + page.common_prefixes.len() <= 2);
            keys.extend(page.items.into_iter().map(|o| o.key));
            prefixes.extend(page.common_prefixes);
        }
        assert_eq!(prefixes, single.common_prefixes);
        assert_eq!(keys, ["c", "e"]);
    }

    #[test]
    fn test_should_resume_after_start_key() {
        let (_server, client) = memory_client(Provider::Generic);
        let bucket = create_test_bucket(&client, "after");
        for key in ["a", "b", "c", "d"] {
            put(&client, &bucket, key);
        }
        let keys: Vec<String> = client
            .list_objects(
                &bucket,
                &ListObjectsOptions {
                    start_after: Some("b".to_owned()),
                    max_keys: Some(1),
                    ..ListObjectsOptions::default()
                },
            )
            .items()
            .map(|o| o.map(|o| o.key))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(keys, ["c", "d"]);
    }

    #[test]
    fn test_should_page_versions_identically_across_dialects() {
        for provider in Provider::ALL {
            let (_server, client) = memory_client(provider);
            let bucket = create_test_bucket(&client, "versions");
            put(&client, &bucket, "doc");
            client
                .set_bucket_versioning(&bucket, VersioningStatus::Enabled)
                .unwrap();
            for key in ["doc", "doc", "other"] {
                put(&client, &bucket, key);
            }

            let single = client
                .list_object_versions_page(&bucket, &ListVersionsOptions::default())
                .unwrap();
            assert!(single.is_last());
            assert_eq!(single.items.len(), 4, "{provider}");

            for page_size in 1..=3 {
                let paged = client
                    .list_object_versions(
                        &bucket,
                        &ListVersionsOptions {
                            max_keys: Some(page_size),
                            ..ListVersionsOptions::default()
                        },
                    )
                    .collect_all()
                    .unwrap();
                assert_eq!(paged, single.items, "{provider} page size {page_size}");
            }
            let null_versions = single
                .items
                .iter()
                .filter(|v| v.version_id == "null")
                .count();
            assert_eq!(null_versions, 1, "{provider}");
        }
    }

    #[test]
    fn test_should_page_uploads_and_parts() {
        let (_server, client) = memory_client(Provider::Generic);
        let bucket = create_test_bucket(&client, "uploads");
        let mut upload_ids = Vec::new();
        for key in ["a", "a", "b", "c", "c"] {
            upload_ids.push(
                client
                    .create_multipart_upload(&bucket, key, &PutObjectOptions::default())
                    .unwrap()
                    .upload_id,
            );
        }

        let single = client
            .list_multipart_uploads_page(&bucket, &ListUploadsOptions::default())
            .unwrap();
        assert_eq!(single.items.len(), 5);
        let paged = client
            .list_multipart_uploads(
                &bucket,
                &ListUploadsOptions {
                    max_uploads: Some(2),
                    ..ListUploadsOptions::default()
                },
            )
            .collect_all()
            .unwrap();
        assert_eq!(paged, single.items);

        let upload_id = &upload_ids[2];
        for number in 1..=4 {
            client
                .upload_part(
                    &bucket,
                    "b",
                    upload_id,
                    PartNumber::new(number).unwrap(),
                    Bytes::from(format!("part {number}")),
                )
                .unwrap();
        }
        let pages = client
            .list_parts(
                &bucket,
                "b",
                upload_id,
                &ListPartsOptions {
                    max_parts: Some(3),
                    ..ListPartsOptions::default()
                },
            )
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].next.marker, Some(3));
        assert!(pages[1].next.marker.is_none());
        let numbers: Vec<u32> = pages
            .into_iter()
            .flat_map(|p| p.items)
            .map(|p| p.part_number)
            .collect();
        assert_eq!(numbers, [1, 2, 3, 4]);
    }
}
