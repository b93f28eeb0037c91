//! Object-lock retention transitions and legal hold.

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Utc};
    use unis3_client::{S3Client, UploadSource};
    use unis3_core::Provider;
    use unis3_model::ErrorKind;
    use unis3_model::input::{
        CopyObjectOptions, CopySource, DeleteObjectOptions, GetObjectOptions, PutObjectOptions,
    };
    use unis3_model::types::{Retention, RetentionMode};

    use crate::{create_locked_bucket, memory_client};

    const KEY: &str = "contract.pdf";

    fn locked_version(client: &S3Client, prefix: &str, retention: Option<Retention>) -> (String, String) {
        let bucket = create_locked_bucket(client, prefix);
        let version = client
            .put_object(
                &bucket,
                KEY,
                UploadSource::from("signed"),
                &PutObjectOptions {
                    retention,
                    ..PutObjectOptions::default()
                },
            )
            .unwrap()
            .version_id
            .unwrap();
        (bucket, version)
    }

    fn in_secs(base: DateTime<Utc>, secs: i64) -> DateTime<Utc> {
        base + Duration::seconds(secs)
    }

    #[test]
    fn test_should_gate_governance_shortening_on_bypass() {
        let (_server, client) = memory_client(Provider::Aws);
        let t = Utc::now();
        let (bucket, version) = locked_version(
            &client,
            "governance",
            Some(Retention::new(RetentionMode::Governance, in_secs(t, 120))),
        );
        let update = |secs, bypass| {
            client.update_retention(
                &bucket,
                KEY,
                Some(&version),
                Some(Retention::new(RetentionMode::Governance, in_secs(t, secs))),
                bypass,
            )
        };

        update(180, false).unwrap();
        let err = update(60, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);
        update(60, true).unwrap();

        let stored = client
            .get_object_retention(&bucket, KEY, Some(&version))
            .unwrap()
            .unwrap();
        assert_eq!(stored.retain_until.timestamp(), in_secs(t, 60).timestamp());

        let err = client
            .update_retention(&bucket, KEY, Some(&version), None, false)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);
        client
            .update_retention(&bucket, KEY, Some(&version), None, true)
            .unwrap();
        assert_eq!(
            client
                .get_object_retention(&bucket, KEY, Some(&version))
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_should_only_extend_compliance() {
        let (_server, client) = memory_client(Provider::Aws);
        let t = Utc::now();
        let (bucket, version) = locked_version(
            &client,
            "compliance",
            Some(Retention::new(RetentionMode::Compliance, in_secs(t, 120))),
        );

        let shorter = Retention::new(RetentionMode::Compliance, in_secs(t, 60));
        let downgrade = Retention::new(RetentionMode::Governance, in_secs(t, 600));
        for (requested, label) in [
            (Some(shorter), "shorten"),
            (None, "remove"),
            (Some(downgrade), "downgrade"),
        ] {
            let err = client
                .update_retention(&bucket, KEY, Some(&version), requested, true)
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::AccessDenied, "{label}");
        }

        client
            .update_retention(
                &bucket,
                KEY,
                Some(&version),
                Some(Retention::new(RetentionMode::Compliance, in_secs(t, 600))),
                false,
            )
            .unwrap();

        let by_version = DeleteObjectOptions {
            version_id: Some(version.clone()),
            bypass_governance: true,
            ..DeleteObjectOptions::default()
        };
        let err = client.delete_object(&bucket, KEY, &by_version).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);
    }

    #[test]
    fn test_should_release_version_once_retention_lapses() {
        let (server, client) = memory_client(Provider::Aws);
        let t = Utc::now();
        let (bucket, version) = locked_version(
            &client,
            "lapse",
            Some(Retention::new(RetentionMode::Compliance, in_secs(t, 60))),
        );
        let by_version = DeleteObjectOptions {
            version_id: Some(version),
            ..DeleteObjectOptions::default()
        };
        assert_eq!(
            client
                .delete_object(&bucket, KEY, &by_version)
                .unwrap_err()
                .kind(),
            ErrorKind::AccessDenied
        );

        server.set_now(in_secs(t, 61));
        client.delete_object(&bucket, KEY, &by_version).unwrap();
    }

    #[test]
    fn test_should_hold_version_independently_of_retention() {
        let (_server, client) = memory_client(Provider::Aws);
        let (bucket, version) = locked_version(&client, "hold", None);
        client
            .set_object_legal_hold(&bucket, KEY, Some(&version), true)
            .unwrap();

        let by_version = DeleteObjectOptions {
            version_id: Some(version.clone()),
            bypass_governance: true,
            ..DeleteObjectOptions::default()
        };
        let err = client.delete_object(&bucket, KEY, &by_version).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);

        let marker = client
            .delete_object(&bucket, KEY, &DeleteObjectOptions::default())
            .unwrap();
        assert!(marker.delete_marker);
        assert!(marker.version_id.is_some());

        client
            .set_object_legal_hold(&bucket, KEY, Some(&version), false)
            .unwrap();
        assert!(!client
            .get_object_legal_hold(&bucket, KEY, Some(&version))
            .unwrap());
        client.delete_object(&bucket, KEY, &by_version).unwrap();
    }

    #[test]
    fn test_should_refuse_lock_settings_the_provider_cannot_store() {
        for provider in [Provider::R2, Provider::Aliyun] {
            let (server, client) = memory_client(provider);
            let bucket = create_locked_bucket(&client, "unlockable");
            client
                .put_object(&bucket, "plain.txt", UploadSource::from("plain"), &PutObjectOptions::default())
                .unwrap();
            let before = server.request_count();
            let compliance = Retention::new(RetentionMode::Compliance, Utc::now() + Duration::days(30));

            let locked = PutObjectOptions {
                retention: Some(compliance),
                ..PutObjectOptions::default()
            };
            let err = client
                .put_object(&bucket, KEY, UploadSource::from("signed"), &locked)
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "{provider}");
            let err = client.create_multipart_upload(&bucket, KEY, &locked).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "{provider}");

            let held = PutObjectOptions {
                legal_hold: Some(true),
                ..PutObjectOptions::default()
            };
            let err = client
                .put_object(&bucket, KEY, UploadSource::from("signed"), &held)
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "{provider}");

            let err = client
                .copy_object(
                    &CopySource::new(&bucket, "plain.txt"),
                    &bucket,
                    KEY,
                    &CopyObjectOptions {
                        retention: Some(compliance),
                        ..CopyObjectOptions::default()
                    },
                )
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "{provider}");

            assert_eq!(server.request_count(), before, "{provider}");
            let err = client
                .stat_object(&bucket, KEY, &GetObjectOptions::default())
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ObjectNotFound, "{provider}");
        }
    }
}
