//! Object operations: single PUT, HEAD, delete, batch delete, copy and
//! object tagging. Reads live in `download`, automatic multipart in
//! `multipart`.

use bytes::Bytes;
use chrono::Utc;
use http::Method;
use tracing::debug;
use unis3_auth::uri_encode;
use unis3_core::conditions::ConditionSite;
use unis3_model::input::{
    CopyObjectOptions, CopySource, DeleteObjectOptions, DeleteObjectsOptions, DeleteRequest,
    GetObjectOptions, MAX_PAGE_SIZE, ObjectIdentifier, PutObjectOptions,
};
use unis3_model::output::{
    CopyObjectOutput, CopyPartResult, DeleteObjectOutput, DeleteObjectsBatchResult,
    PutObjectOutput,
};
use unis3_model::types::{MAX_OBJECT_TAGS, MetadataDirective, S3Object, Tagging, TaggingDirective};
use unis3_model::{S3Error, S3Result};

use crate::S3Client;
use crate::request::{
    S3Request, expires_header, header, listed_version_id, object_from_headers, read_xml,
    reported_version_id, wire_version_id,
};

/// Headers shared by a single PUT and the start of a multipart upload.
pub(crate) fn write_headers<'a>(
    request: S3Request<'a>,
    options: &PutObjectOptions,
) -> S3Result<S3Request<'a>> {
    let mut request = request
        .optional_header("content-type", options.content_type.clone())
        .optional_header("cache-control", options.cache_control.clone())
        .optional_header("content-disposition", options.content_disposition.clone())
        .optional_header("content-encoding", options.content_encoding.clone())
        .optional_header("content-language", options.content_language.clone())
        .optional_header("expires", options.expires.as_ref().map(expires_header))
        .user_metadata(&options.user_metadata)?
        .optional_header("x-amz-storage-class", options.storage_class.clone())
        .sse(options.sse.as_ref())
        .lock(options.retention.as_ref(), options.legal_hold)?;
    if let Some(tags) = options.tags.as_ref().filter(|t| !t.is_empty()) {
        request =
            request.required_header("x-amz-tagging", tags.to_header_value(), "object tagging")?;
    }
    Ok(request)
}

/// The `x-amz-copy-source` value for `source`.
pub(crate) fn copy_source_header(source: &CopySource, client: &S3Client) -> String {
    let path = format!("/{}/{}", source.bucket, uri_encode(&source.key, false));
    match &source.version_id {
        Some(version) => format!(
            "{path}?versionId={}",
            uri_encode(&wire_version_id(version, client.dialect()), true)
        ),
        None => path,
    }
}

impl S3Client {
    /// Upload `body` with a single PUT.
    pub(crate) fn put_single(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        options: &PutObjectOptions,
    ) -> S3Result<PutObjectOutput> {
        let size = body.len();
        let request = write_headers(
            self.request(Method::PUT).bucket(bucket).key(key),
            options,
        )?
        .conditions(&options.conditions, ConditionSite::Write)?
        .body(body);
        let response = self.send(request)?;
        let output = PutObjectOutput {
            etag: header(&response, "etag").unwrap_or_default(),
            version_id: reported_version_id(response.header("x-amz-version-id"), self.dialect()),
            parts: None,
        };
        debug!(bucket, key, size, etag = %output.etag, "put_object completed");
        Ok(output)
    }

    /// Object metadata without the body.
    ///
    /// # Errors
    ///
    /// Returns `ObjectNotFound` for a missing key, `NotModified` or
    /// `PreconditionFailed` when a condition fails.
    pub fn stat_object(
        &self,
        bucket: &str,
        key: &str,
        options: &GetObjectOptions,
    ) -> S3Result<S3Object> {
        let request = self
            .request(Method::HEAD)
            .bucket(bucket)
            .key(key)
            .version_query(options.version_id.as_deref())
            .optional_header("range", options.range.as_ref().map(|r| r.header_value()))
            .conditions(&options.conditions, ConditionSite::Read)?;
        let response = self.send(request)?;
        object_from_headers(key, &response, self.dialect())
    }

    /// Delete the latest version (creating a delete marker on versioned
    /// buckets) or, with a version id, destroy that version.
    ///
    /// # Errors
    ///
    /// Returns `AccessDenied` when a locked version is targeted and
    /// `PreconditionFailed` when `If-Match` fails.
    pub fn delete_object(
        &self,
        bucket: &str,
        key: &str,
        options: &DeleteObjectOptions,
    ) -> S3Result<DeleteObjectOutput> {
        let request = self
            .request(Method::DELETE)
            .bucket(bucket)
            .key(key)
            .version_query(options.version_id.as_deref())
            .bypass_governance(options.bypass_governance)
            .conditions(&options.conditions, ConditionSite::Delete)?;
        let response = self.send(request)?;
        let output = DeleteObjectOutput {
            delete_marker: response.header("x-amz-delete-marker") == Some("true"),
            version_id: reported_version_id(response.header("x-amz-version-id"), self.dialect()),
        };
        debug!(bucket, key, delete_marker = output.delete_marker, "delete_object completed");
        Ok(output)
    }

    /// Delete up to 1000 keys or versions in one request.
    ///
    /// Per-entry failures are reported in the result, not raised. An entry
    /// carrying an ETag is deleted only if it still matches.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an empty or oversized batch; request-level
    /// failures such as a missing bucket are raised.
    pub fn delete_objects(
        &self,
        bucket: &str,
        objects: &[ObjectIdentifier],
        options: &DeleteObjectsOptions,
    ) -> S3Result<DeleteObjectsBatchResult> {
        if objects.is_empty() || objects.len() > MAX_PAGE_SIZE as usize {
            return Err(S3Error::invalid_input(format!(
                "a batch delete takes 1 to {MAX_PAGE_SIZE} keys"
            )));
        }
        let dialect = self.dialect();
        let body = DeleteRequest {
            objects: objects
                .iter()
                .map(|o| ObjectIdentifier {
                    version_id: o.version_id.as_deref().map(|v| wire_version_id(v, dialect)),
                    ..o.clone()
                })
                .collect(),
            quiet: options.quiet,
        };
        let request = self
            .request(Method::POST)
            .bucket(bucket)
            .flag("delete")
            .bypass_governance(options.bypass_governance)
            .xml_body("Delete", &body)?;
        let mut result: DeleteObjectsBatchResult = read_xml(self.send(request)?)?;

        let listed = |v: Option<String>| v.map(|v| listed_version_id(&v, dialect));
        for deleted in &mut result.deleted {
            deleted.version_id = listed(deleted.version_id.take());
            deleted.delete_marker_version_id = listed(deleted.delete_marker_version_id.take());
        }
        for error in &mut result.errors {
            error.version_id = listed(error.version_id.take());
        }
        debug!(
            bucket,
            deleted = result.deleted.len(),
            errors = result.errors.len(),
            "delete_objects completed"
        );
        Ok(result)
    }

    /// Server-side copy of `source` to `bucket`/`key`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for inconsistent options (metadata without the
    /// REPLACE directive, a source range), and `PreconditionFailed` when a
    /// source or target condition fails.
    pub fn copy_object(
        &self,
        source: &CopySource,
        bucket: &str,
        key: &str,
        options: &CopyObjectOptions,
    ) -> S3Result<CopyObjectOutput> {
        options.validate(Utc::now())?;
        if source.range.is_some() {
            return Err(S3Error::invalid_input(
                "a copy source range is only valid for upload_part_copy",
            ));
        }
        let mut request = self
            .request(Method::PUT)
            .bucket(bucket)
            .key(key)
            .header("x-amz-copy-source", copy_source_header(source, self))
            .conditions(&source.conditions, ConditionSite::CopySource)?
            .conditions(&options.conditions, ConditionSite::CopyTarget)?
            .optional_header(
                "x-amz-storage-class",
                options.storage_class.clone(),
            )
            .sse(options.sse.as_ref())
            .lock(options.retention.as_ref(), options.legal_hold)?;
        if let Some(directive) = options.metadata_directive {
            request = request.header("x-amz-metadata-directive", directive.as_str());
            if directive == MetadataDirective::Replace {
                request = request
                    .optional_header("content-type", options.content_type.clone())
                    .user_metadata(&options.user_metadata)?;
            }
        }
        match options.tagging_directive {
            Some(TaggingDirective::Replace) => {
                request = request.required_header(
                    "x-amz-tagging-directive",
                    TaggingDirective::Replace.as_str(),
                    "object tagging",
                )?;
            }
            Some(directive) => {
                request = request.vendor_header("x-amz-tagging-directive", directive.as_str());
            }
            None => {}
        }
        if let Some(tags) = &options.tags {
            request = request.required_header(
                "x-amz-tagging",
                tags.to_header_value(),
                "object tagging",
            )?;
        }

        let response = self.send(request)?;
        let dialect = self.dialect();
        let version_id = reported_version_id(response.header("x-amz-version-id"), dialect);
        let copy_source_version_id = response
            .header("x-amz-copy-source-version-id")
            .map(|v| listed_version_id(v, dialect));
        let result: CopyPartResult = read_xml(response)?;
        debug!(
            source_bucket = %source.bucket,
            source_key = %source.key,
            bucket,
            key,
            "copy_object completed"
        );
        Ok(CopyObjectOutput {
            etag: result.etag,
            last_modified: result.last_modified,
            version_id,
            copy_source_version_id,
        })
    }

    /// The tag set of an object version.
    ///
    /// # Errors
    ///
    /// Returns `ObjectNotFound` for a missing key or version.
    pub fn get_object_tagging(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> S3Result<Tagging> {
        let request = self
            .request(Method::GET)
            .bucket(bucket)
            .key(key)
            .flag("tagging")
            .version_query(version_id);
        read_xml(self.send(request)?)
    }

    /// Replace the tag set of an object version.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for more than 10 tags.
    pub fn set_object_tagging(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        tags: &Tagging,
    ) -> S3Result<()> {
        if tags.len() > MAX_OBJECT_TAGS {
            return Err(S3Error::invalid_input(format!(
                "objects carry at most {MAX_OBJECT_TAGS} tags"
            )));
        }
        let request = self
            .request(Method::PUT)
            .bucket(bucket)
            .key(key)
            .flag("tagging")
            .version_query(version_id)
            .xml_body("Tagging", tags)?;
        self.send(request)?;
        Ok(())
    }

    /// Remove the tag set of an object version.
    ///
    /// # Errors
    ///
    /// Returns `ObjectNotFound` for a missing key or version.
    pub fn delete_object_tagging(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> S3Result<()> {
        let request = self
            .request(Method::DELETE)
            .bucket(bucket)
            .key(key)
            .flag("tagging")
            .version_query(version_id);
        self.send(request)?;
        Ok(())
    }
}
