//! Smoke tests against a live S3-compatible endpoint.
//!
//! These are ignored by default; see the crate docs for the environment
//! they expect.

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use unis3_client::UploadSource;
    use unis3_model::input::{
        CreateBucketOptions, DeleteObjectOptions, GetObjectOptions, ListObjectsOptions,
        PutObjectOptions,
    };

    use crate::{MIB, live_client, payload, test_bucket_name};

    #[test]
    #[ignore = "requires running S3-compatible endpoint"]
    fn test_should_round_trip_against_live_endpoint() {
        let client = live_client();
        let bucket = test_bucket_name("live");
        client
            .create_bucket(&bucket, &CreateBucketOptions::default())
            .unwrap();

        let small = payload(1024);
        let large = payload(7 * MIB);
        client
            .put_object(&bucket, "small.bin", UploadSource::from(small.clone()), &PutObjectOptions::default())
            .unwrap();
        let uploaded = client
            .put_object(
                &bucket,
                "large.bin",
                UploadSource::reader(Cursor::new(large.clone()), None),
                &PutObjectOptions::default(),
            )
            .unwrap();
        assert_eq!(uploaded.parts, Some(2));

        assert_eq!(
            client
                .get_object_bytes(&bucket, "small.bin", &GetObjectOptions::default())
                .unwrap(),
            small
        );
        assert_eq!(
            client
                .get_object_bytes(&bucket, "large.bin", &GetObjectOptions::default())
                .unwrap(),
            large
        );

        let listed = client
            .list_objects(&bucket, &ListObjectsOptions::default())
            .collect_all()
            .unwrap();
        assert_eq!(listed.len(), 2);

        for object in listed {
            client
                .delete_object(&bucket, &object.key, &DeleteObjectOptions::default())
                .unwrap();
        }
        client.delete_bucket(&bucket).unwrap();
    }
}
