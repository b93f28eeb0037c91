//! Object handlers: put, get, head, delete, batch delete, copy and object
//! tagging.
//!
//! Conditions are evaluated while the bucket's object store is locked, so
//! a conditional write and the write itself are atomic.

use chrono::{DateTime, Utc};
use http::StatusCode;
use tracing::debug;
use unis3_core::conditions::{self, ConditionSite};
use unis3_core::object_lock;
use unis3_core::transport::HttpResponse;
use unis3_model::input::{DeleteRequest, MAX_PAGE_SIZE};
use unis3_model::output::{
    CopyPartResult, DeleteError, DeleteObjectOutput, DeleteObjectsBatchResult, DeletedObject,
};
use unis3_model::types::{
    ConditionSpec, MAX_OBJECT_TAGS, MetadataDirective, ObjectLockProperties, Tagging,
    TaggingDirective, VersioningStatus,
};
use unis3_model::{ErrorKind, S3Error, S3Result};

use super::{
    CopySourceRef, RequestContext, Response, WriteSettings, as_invalid_argument, object_headers,
    parse_copy_source, parse_range, select_object, select_object_mut, version_header, wire_kind,
};
use crate::checksums::{compute_etag, validate_content_md5};
use crate::server::MemoryServer;
use crate::state::{MemoryBucket, ObjectVersion, StoredObject};

impl MemoryServer {
    pub(crate) fn handle_put_object(&self, ctx: &RequestContext) -> S3Result<HttpResponse> {
        let bucket = self.state.bucket(ctx.bucket()?)?;
        let key = ctx.key()?;
        validate_content_md5(ctx.header("content-md5"), &ctx.body)?;
        let conditions = conditions::from_headers(ConditionSite::Write, |n| ctx.header(n))?;
        let settings = WriteSettings::from_request(ctx)?;
        let retention = object_lock::retention_for_new_version(
            bucket.object_lock.read().as_ref(),
            settings.retention,
            settings.legal_hold.is_some(),
            ctx.now,
        )?;

        let versioning = bucket.versioning();
        let etag = compute_etag(&ctx.body);
        let object = StoredObject {
            key: key.to_owned(),
            version_id: None,
            data: ctx.body.clone(),
            etag: etag.clone(),
            last_modified: ctx.now,
            metadata: settings.metadata,
            storage_class: settings.storage_class,
            sse: settings.sse.clone(),
            tags: settings.tags.unwrap_or_default(),
            lock: ObjectLockProperties {
                retention,
                legal_hold: settings.legal_hold.unwrap_or(false),
            },
            parts_count: None,
        };

        let version_id = {
            let mut objects = bucket.objects.write();
            conditions::evaluate(
                &conditions,
                ConditionSite::Write,
                objects.current(key).map(StoredObject::condition_state),
            )?;
            objects.put(object, versioning)
        };
        debug!(bucket = %bucket.name, key, size = ctx.body.len(), version_id = ?version_id, "object stored");

        Ok(Response::ok()
            .header("etag", &etag)?
            .optional_header(
                "x-amz-version-id",
                version_header(version_id.as_deref(), versioning, self.dialect),
            )?
            .optional_header(
                "x-amz-server-side-encryption",
                settings.sse.as_ref().map(|s| &s.algorithm),
            )?
            .empty())
    }

    /// GET and HEAD share lookup, conditions and headers; HEAD drops the body.
    pub(crate) fn handle_get_object(
        &self,
        ctx: &RequestContext,
        head: bool,
    ) -> S3Result<HttpResponse> {
        let bucket = self.state.bucket(ctx.bucket()?)?;
        let key = ctx.key()?;
        let requested = ctx.requested_version();
        let conditions = conditions::from_headers(ConditionSite::Read, |n| ctx.header(n))?;

        let object = {
            let objects = bucket.objects.read();
            let object = select_object(&objects, key, requested.as_ref())?;
            conditions::evaluate(&conditions, ConditionSite::Read, Some(object.condition_state()))?;
            object.clone()
        };

        let size = object.size();
        let range = ctx
            .header("range")
            .map(|r| parse_range(r, size))
            .transpose()?;
        let mut response = object_headers(
            Response::with_status(if range.is_some() {
                StatusCode::PARTIAL_CONTENT
            } else {
                StatusCode::OK
            }),
            &object,
            bucket.versioning(),
            self.dialect,
        )?;
        let body = match range {
            Some((start, end)) => {
                response = response.header("content-range", format!("bytes {start}-{end}/{size}"))?;
                let index = |n: u64| {
                    usize::try_from(n).map_err(|_| S3Error::new(ErrorKind::InvalidRange))
                };
                object.data.slice(index(start)?..=index(end)?)
            }
            None => object.data.clone(),
        };
        response = response.header("content-length", body.len().to_string())?;

        if head {
            Ok(response.empty())
        } else {
            Ok(response.body(body))
        }
    }

    pub(crate) fn handle_delete_object(&self, ctx: &RequestContext) -> S3Result<HttpResponse> {
        let bucket = self.state.bucket(ctx.bucket()?)?;
        let key = ctx.key()?;
        let conditions = conditions::from_headers(ConditionSite::Delete, |n| ctx.header(n))?;
        let bypass = ctx.flag("x-amz-bypass-governance-retention");
        let versioning = bucket.versioning();

        let output = delete_one(
            &bucket,
            key,
            ctx.requested_version(),
            &conditions,
            bypass,
            ctx.now,
        )?;
        debug!(bucket = %bucket.name, key, delete_marker = output.delete_marker, "object deleted");

        Ok(Response::no_content()
            .optional_header("x-amz-delete-marker", output.delete_marker.then_some("true"))?
            .optional_header(
                "x-amz-version-id",
                version_header(output.version_id.as_deref(), versioning, self.dialect),
            )?
            .empty())
    }

    /// Batch delete. Per-entry failures are reported in the result body.
    pub(crate) fn handle_delete_objects(&self, ctx: &RequestContext) -> S3Result<HttpResponse> {
        let bucket = self.state.bucket(ctx.bucket()?)?;
        validate_content_md5(ctx.header("content-md5"), &ctx.body)?;
        let request: DeleteRequest = ctx.xml_body()?;
        if request.objects.is_empty() || request.objects.len() > MAX_PAGE_SIZE as usize {
            return Err(S3Error::with_message(
                ErrorKind::InvalidArgument,
                format!("a batch delete takes 1 to {MAX_PAGE_SIZE} keys"),
            ));
        }
        let bypass = ctx.flag("x-amz-bypass-governance-retention");
        let versioning = bucket.versioning();

        let mut result = DeleteObjectsBatchResult::default();
        for entry in request.objects {
            let version = entry
                .version_id
                .as_deref()
                .map(|v| self.dialect.normalize_version_id(Some(v)));
            let conditions = entry
                .etag
                .clone()
                .map_or_else(ConditionSpec::none, ConditionSpec::if_match);
            match delete_one(&bucket, &entry.key, version.clone(), &conditions, bypass, ctx.now) {
                Ok(output) if !request.quiet => {
                    let marker_version = if output.delete_marker && version.is_none() {
                        version_header(output.version_id.as_deref(), versioning, self.dialect)
                    } else {
                        None
                    };
                    result.deleted.push(DeletedObject {
                        key: entry.key,
                        version_id: entry.version_id,
                        delete_marker: output.delete_marker,
                        delete_marker_version_id: marker_version,
                    });
                }
                Ok(_) => {}
                Err(err) => {
                    debug!(key = %entry.key, error = %err, "batch delete entry failed");
                    result.errors.push(DeleteError {
                        key: entry.key,
                        version_id: entry.version_id,
                        code: wire_kind(err.kind()).vendor_code().to_owned(),
                        message: err.message().to_owned(),
                    });
                }
            }
        }
        Response::ok().xml("DeleteResult", &result)
    }

    pub(crate) fn handle_copy_object(&self, ctx: &RequestContext) -> S3Result<HttpResponse> {
        let target = self.state.bucket(ctx.bucket()?)?;
        let key = ctx.key()?;
        let source_ref = copy_source(ctx)?;
        let source_conditions =
            conditions::from_headers(ConditionSite::CopySource, |n| ctx.header(n))?;
        let target_conditions =
            conditions::from_headers(ConditionSite::CopyTarget, |n| ctx.header(n))?;
        let settings = WriteSettings::from_request(ctx)?;
        let metadata_directive = directive::<MetadataDirective>(ctx, "x-amz-metadata-directive")?
            .unwrap_or(MetadataDirective::Copy);
        let tagging_directive = directive::<TaggingDirective>(ctx, "x-amz-tagging-directive")?
            .unwrap_or(TaggingDirective::Copy);

        let (source, source_versioning) = self.read_copy_source(&source_ref)?;
        conditions::evaluate(
            &source_conditions,
            ConditionSite::CopySource,
            Some(source.condition_state()),
        )?;

        let to_itself = source_ref.bucket == target.name && source_ref.key == key;
        if to_itself
            && metadata_directive == MetadataDirective::Copy
            && settings.storage_class.is_none()
            && ctx.header("x-amz-server-side-encryption").is_none()
        {
            return Err(S3Error::with_message(
                ErrorKind::InvalidArgument,
                "This copy request is illegal because it is trying to copy an object to itself \
                 without changing the object's metadata, storage class or encryption attributes",
            ));
        }

        let retention = object_lock::retention_for_new_version(
            target.object_lock.read().as_ref(),
            settings.retention,
            settings.legal_hold.is_some(),
            ctx.now,
        )?;
        let metadata = match metadata_directive {
            MetadataDirective::Copy => source.metadata.clone(),
            MetadataDirective::Replace => settings.metadata,
        };
        let tags = match tagging_directive {
            TaggingDirective::Copy => source.tags.clone(),
            TaggingDirective::Replace => settings.tags.unwrap_or_default(),
        };
        let etag = compute_etag(&source.data);
        let object = StoredObject {
            key: key.to_owned(),
            version_id: None,
            data: source.data.clone(),
            etag: etag.clone(),
            last_modified: ctx.now,
            metadata,
            storage_class: settings.storage_class,
            sse: settings.sse.clone(),
            tags,
            lock: ObjectLockProperties {
                retention,
                legal_hold: settings.legal_hold.unwrap_or(false),
            },
            parts_count: None,
        };

        let versioning = target.versioning();
        let version_id = {
            let mut objects = target.objects.write();
            conditions::evaluate(
                &target_conditions,
                ConditionSite::CopyTarget,
                objects.current(key).map(StoredObject::condition_state),
            )?;
            objects.put(object, versioning)
        };
        debug!(
            source = %format!("{}/{}", source_ref.bucket, source_ref.key),
            bucket = %target.name,
            key,
            "object copied"
        );

        let result = CopyPartResult {
            etag,
            last_modified: ctx.now,
        };
        Response::ok()
            .optional_header(
                "x-amz-version-id",
                version_header(version_id.as_deref(), versioning, self.dialect),
            )?
            .optional_header(
                "x-amz-copy-source-version-id",
                version_header(source.version_id.as_deref(), source_versioning, self.dialect),
            )?
            .optional_header(
                "x-amz-server-side-encryption",
                settings.sse.as_ref().map(|s| &s.algorithm),
            )?
            .xml("CopyObjectResult", &result)
    }

    /// Snapshot the object a copy reads from.
    pub(crate) fn read_copy_source(
        &self,
        source: &CopySourceRef,
    ) -> S3Result<(StoredObject, Option<VersioningStatus>)> {
        let bucket = self.state.bucket(&source.bucket)?;
        let objects = bucket.objects.read();
        let object = select_object(&objects, &source.key, source.version.as_ref()).map_err(|e| {
            if e.kind() == ErrorKind::VersionIsDeleteMarker {
                S3Error::with_message(
                    ErrorKind::InvalidArgument,
                    "The source of a copy request may not specifically refer to a delete marker",
                )
            } else {
                e
            }
        })?;
        Ok((object.clone(), bucket.versioning()))
    }

    pub(crate) fn handle_get_object_tagging(&self, ctx: &RequestContext) -> S3Result<HttpResponse> {
        let bucket = self.state.bucket(ctx.bucket()?)?;
        let requested = ctx.requested_version();
        let (tags, version_id) = {
            let objects = bucket.objects.read();
            let object = select_object(&objects, ctx.key()?, requested.as_ref())?;
            (object.tags.clone(), object.version_id.clone())
        };
        Response::ok()
            .optional_header(
                "x-amz-version-id",
                version_header(version_id.as_deref(), bucket.versioning(), self.dialect),
            )?
            .xml("Tagging", &tags)
    }

    pub(crate) fn handle_put_object_tagging(&self, ctx: &RequestContext) -> S3Result<HttpResponse> {
        let tags: Tagging = ctx.xml_body()?;
        if tags.len() > MAX_OBJECT_TAGS {
            return Err(S3Error::with_message(
                ErrorKind::InvalidArgument,
                format!("objects can have at most {MAX_OBJECT_TAGS} tags"),
            ));
        }
        self.replace_object_tags(ctx, tags, Response::ok())
    }

    pub(crate) fn handle_delete_object_tagging(
        &self,
        ctx: &RequestContext,
    ) -> S3Result<HttpResponse> {
        self.replace_object_tags(ctx, Tagging::default(), Response::no_content())
    }

    fn replace_object_tags(
        &self,
        ctx: &RequestContext,
        tags: Tagging,
        response: Response,
    ) -> S3Result<HttpResponse> {
        let bucket = self.state.bucket(ctx.bucket()?)?;
        let requested = ctx.requested_version();
        let version_id = {
            let mut objects = bucket.objects.write();
            let object = select_object_mut(&mut objects, ctx.key()?, requested.as_ref())?;
            object.tags = tags;
            object.version_id.clone()
        };
        Ok(response
            .optional_header(
                "x-amz-version-id",
                version_header(version_id.as_deref(), bucket.versioning(), self.dialect),
            )?
            .empty())
    }
}

/// Delete one key or version.
///
/// Without a version a delete marker may be created and object lock never
/// applies; with one the version is destroyed if its lock state allows.
/// Deleting a version that does not exist succeeds.
pub(crate) fn delete_one(
    bucket: &MemoryBucket,
    key: &str,
    version: Option<Option<String>>,
    conditions: &ConditionSpec,
    bypass: bool,
    now: DateTime<Utc>,
) -> S3Result<DeleteObjectOutput> {
    let versioning = bucket.versioning();
    let mut objects = bucket.objects.write();
    let Some(version_id) = version else {
        conditions::evaluate(
            conditions,
            ConditionSite::Delete,
            objects.current(key).map(StoredObject::condition_state),
        )?;
        let outcome = objects.delete_current(key, versioning, now);
        return Ok(DeleteObjectOutput {
            delete_marker: outcome.delete_marker,
            version_id: outcome.version_id,
        });
    };

    let delete_marker = match objects.version(key, version_id.as_deref()) {
        Some(ObjectVersion::Object(object)) => {
            conditions::evaluate(conditions, ConditionSite::Delete, Some(object.condition_state()))?;
            object_lock::check_version_delete(&object.lock, bypass, now)?;
            false
        }
        Some(ObjectVersion::DeleteMarker(_)) => {
            conditions::evaluate(conditions, ConditionSite::Delete, None)?;
            true
        }
        None => {
            conditions::evaluate(conditions, ConditionSite::Delete, None)?;
            false
        }
    };
    objects.remove_version(key, version_id.as_deref());
    Ok(DeleteObjectOutput {
        delete_marker,
        version_id,
    })
}

pub(crate) fn copy_source(ctx: &RequestContext) -> S3Result<CopySourceRef> {
    let header = ctx.header("x-amz-copy-source").ok_or_else(|| {
        S3Error::with_message(ErrorKind::InvalidArgument, "missing x-amz-copy-source")
    })?;
    parse_copy_source(header, ctx.dialect)
}

fn directive<T>(ctx: &RequestContext, header: &str) -> S3Result<Option<T>>
where
    T: std::str::FromStr<Err = S3Error>,
{
    ctx.header(header)
        .map(|v| v.parse::<T>().map_err(as_invalid_argument))
        .transpose()
}
