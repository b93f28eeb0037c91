//! The list family. Each operation has a single-page form returning a
//! [`Page`] and a walking form returning a [`Paginator`] that follows the
//! cursor until the server reports the last page.

use http::Method;
use unis3_core::pagination::{DualCursor, Page, PartNumberCursor, Paginator, TokenCursor};
use unis3_model::input::{
    ListObjectsOptions, ListPartsOptions, ListUploadsOptions, ListVersionsOptions,
};
use unis3_model::output::{
    ListMultipartUploadsOutput, ListObjectVersionsOutput, ListObjectsV2Output, ListPartsOutput,
};
use unis3_model::types::{S3MultipartUpload, S3Object, S3ObjectVersion, S3Part};
use unis3_model::{ErrorKind, S3Result};

use crate::S3Client;
use crate::request::{listed_version_id, read_xml, reported_version_id, wire_version_id};

impl S3Client {
    /// One page of ListObjectsV2.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an out-of-range `max_keys` and
    /// `BucketNotFound` for a missing bucket.
    pub fn list_objects_page(
        &self,
        bucket: &str,
        options: &ListObjectsOptions,
    ) -> S3Result<Page<S3Object, TokenCursor>> {
        options.validate()?;
        let request = self
            .request(Method::GET)
            .bucket(bucket)
            .query("list-type", "2")
            .optional_query("prefix", options.prefix.as_deref())
            .optional_query("delimiter", options.delimiter.as_deref())
            .optional_query("start-after", options.start_after.as_deref())
            .optional_query("max-keys", options.max_keys)
            .optional_query("continuation-token", options.continuation_token.as_deref());
        let output: ListObjectsV2Output = read_xml(self.send(request)?)?;
        let dialect = self.dialect();
        let items = output
            .contents
            .into_iter()
            .map(|object| S3Object {
                version_id: reported_version_id(object.version_id.as_deref(), dialect),
                ..object
            })
            .collect();
        Ok(Page {
            items,
            common_prefixes: output.common_prefixes,
            next: TokenCursor::new(output.next_continuation_token),
        })
    }

    /// Walk every object under `options`.
    ///
    /// ```
    /// # use std::sync::Arc;
    /// # use unis3_auth::Credentials;
    /// # use unis3_client::{ClientConfig, CredentialsConfig, S3Client, UploadSource};
    /// # use unis3_core::Provider;
    /// # use unis3_memory::MemoryServer;
    /// # use unis3_model::input::{ListObjectsOptions, PutObjectOptions};
    /// # let server = Arc::new(MemoryServer::new(Provider::Generic, &Credentials::new("AKID", "secret")));
    /// # let config = ClientConfig::builder().credentials(CredentialsConfig::new("AKID", "secret")).build();
    /// # let client = S3Client::new(config, server).unwrap();
    /// # client.create_bucket("logs", &Default::default()).unwrap();
    /// for i in 0..5 {
    ///     let body = UploadSource::from(format!("line {i}"));
    ///     client.put_object("logs", &format!("2024/{i}.log"), body, &PutObjectOptions::default())?;
    /// }
    /// let options = ListObjectsOptions { max_keys: Some(2), ..Default::default() };
    /// let keys: Vec<String> = client
    ///     .list_objects("logs", &options)
    ///     .items()
    ///     .map(|object| object.map(|o| o.key))
    ///     .collect::<Result<_, _>>()?;
    /// assert_eq!(keys.len(), 5);
    /// # Ok::<(), unis3_model::S3Error>(())
    /// ```
    pub fn list_objects<'a>(
        &'a self,
        bucket: &'a str,
        options: &ListObjectsOptions,
    ) -> Paginator<
        S3Object,
        TokenCursor,
        impl FnMut(&TokenCursor) -> S3Result<Page<S3Object, TokenCursor>> + 'a,
    > {
        let options = options.clone();
        Paginator::starting_at(
            TokenCursor::new(options.continuation_token.clone()),
            move |cursor: &TokenCursor| {
                self.list_objects_page(
                    bucket,
                    &ListObjectsOptions {
                        continuation_token: cursor.token.clone(),
                        ..options.clone()
                    },
                )
            },
        )
    }

    /// One page of ListObjectVersions. Null versions are reported as
    /// `"null"` whatever the vendor's spelling.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an out-of-range `max_keys` or a version
    /// marker without a key marker.
    pub fn list_object_versions_page(
        &self,
        bucket: &str,
        options: &ListVersionsOptions,
    ) -> S3Result<Page<S3ObjectVersion, DualCursor>> {
        options.validate()?;
        let dialect = self.dialect();
        let request = self
            .request(Method::GET)
            .bucket(bucket)
            .flag("versions")
            .optional_query("prefix", options.prefix.as_deref())
            .optional_query("delimiter", options.delimiter.as_deref())
            .optional_query("max-keys", options.max_keys)
            .optional_query("key-marker", options.key_marker.as_deref())
            .optional_query(
                "version-id-marker",
                options
                    .version_id_marker
                    .as_deref()
                    .map(|v| wire_version_id(v, dialect)),
            );
        let output: ListObjectVersionsOutput = read_xml(self.send(request)?)?;
        let items = output
            .versions
            .into_iter()
            .map(|version| S3ObjectVersion {
                version_id: listed_version_id(&version.version_id, dialect),
                ..version
            })
            .collect();
        let next = DualCursor::new(
            output.next_key_marker,
            output
                .next_version_id_marker
                .map(|v| listed_version_id(&v, dialect)),
        );
        Ok(Page {
            items,
            common_prefixes: output.common_prefixes,
            next,
        })
    }

    /// Walk every version and delete marker under `options`.
    pub fn list_object_versions<'a>(
        &'a self,
        bucket: &'a str,
        options: &ListVersionsOptions,
    ) -> Paginator<
        S3ObjectVersion,
        DualCursor,
        impl FnMut(&DualCursor) -> S3Result<Page<S3ObjectVersion, DualCursor>> + 'a,
    > {
        let options = options.clone();
        Paginator::starting_at(
            DualCursor::new(
                options.key_marker.clone(),
                options.version_id_marker.clone(),
            ),
            move |cursor: &DualCursor| {
                self.list_object_versions_page(
                    bucket,
                    &ListVersionsOptions {
                        key_marker: cursor.key.clone(),
                        version_id_marker: cursor.secondary.clone(),
                        ..options.clone()
                    },
                )
            },
        )
    }

    /// One page of in-progress multipart uploads.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an out-of-range `max_uploads` or an
    /// upload-id marker without a key marker.
    pub fn list_multipart_uploads_page(
        &self,
        bucket: &str,
        options: &ListUploadsOptions,
    ) -> S3Result<Page<S3MultipartUpload, DualCursor>> {
        options.validate()?;
        let request = self
            .request(Method::GET)
            .bucket(bucket)
            .flag("uploads")
            .optional_query("prefix", options.prefix.as_deref())
            .optional_query("delimiter", options.delimiter.as_deref())
            .optional_query("max-uploads", options.max_uploads)
            .optional_query("key-marker", options.key_marker.as_deref())
            .optional_query("upload-id-marker", options.upload_id_marker.as_deref());
        let output: ListMultipartUploadsOutput = read_xml(self.send(request)?)?;
        Ok(Page {
            items: output.uploads,
            common_prefixes: output.common_prefixes,
            next: DualCursor::new(output.next_key_marker, output.next_upload_id_marker),
        })
    }

    /// Walk every in-progress multipart upload under `options`.
    pub fn list_multipart_uploads<'a>(
        &'a self,
        bucket: &'a str,
        options: &ListUploadsOptions,
    ) -> Paginator<
        S3MultipartUpload,
        DualCursor,
        impl FnMut(&DualCursor) -> S3Result<Page<S3MultipartUpload, DualCursor>> + 'a,
    > {
        let options = options.clone();
        Paginator::starting_at(
            DualCursor::new(options.key_marker.clone(), options.upload_id_marker.clone()),
            move |cursor: &DualCursor| {
                self.list_multipart_uploads_page(
                    bucket,
                    &ListUploadsOptions {
                        key_marker: cursor.key.clone(),
                        upload_id_marker: cursor.secondary.clone(),
                        ..options.clone()
                    },
                )
            },
        )
    }

    /// One page of the parts uploaded so far.
    ///
    /// # Errors
    ///
    /// Returns `UploadNotFound` for an unknown upload.
    pub fn list_parts_page(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        options: &ListPartsOptions,
    ) -> S3Result<Page<S3Part, PartNumberCursor>> {
        options.validate()?;
        let request = self
            .request(Method::GET)
            .bucket(bucket)
            .key(key)
            .not_found(ErrorKind::UploadNotFound)
            .query("uploadId", upload_id)
            .optional_query("max-parts", options.max_parts)
            .optional_query("part-number-marker", options.part_number_marker);
        let output: ListPartsOutput = read_xml(self.send(request)?)?;
        Ok(Page::new(
            output.parts,
            PartNumberCursor::new(output.next_part_number_marker),
        ))
    }

    /// Walk every part of an upload in part-number order.
    pub fn list_parts<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        upload_id: &'a str,
        options: &ListPartsOptions,
    ) -> Paginator<
        S3Part,
        PartNumberCursor,
        impl FnMut(&PartNumberCursor) -> S3Result<Page<S3Part, PartNumberCursor>> + 'a,
    > {
        let options = options.clone();
        Paginator::starting_at(
            PartNumberCursor::new(options.part_number_marker),
            move |cursor: &PartNumberCursor| {
                self.list_parts_page(
                    bucket,
                    key,
                    upload_id,
                    &ListPartsOptions {
                        part_number_marker: cursor.marker,
                        ..options.clone()
                    },
                )
            },
        )
    }
}
