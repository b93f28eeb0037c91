//! Multipart upload handlers: create, upload part, upload part copy,
//! complete and abort.

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;

use bytes::BytesMut;
use tracing::{debug, info, warn};
use unis3_core::conditions::{self, ConditionSite};
use unis3_core::object_lock;
use unis3_core::transport::HttpResponse;
use unis3_model::output::{CompleteMultipartUploadOutput, CopyPartResult, CreateMultipartUploadOutput};
use unis3_model::types::{MIN_PART_SIZE, ObjectLockProperties, PartNumber, normalize_etag};
use unis3_model::{ErrorKind, S3Error, S3Result};
use unis3_xml::wire::CompleteMultipartUpload;
use uuid::Uuid;

use super::object::copy_source;
use super::{RequestContext, Response, WriteSettings, as_invalid_argument, parse_range, version_header};
use crate::checksums::{compute_etag, compute_multipart_etag, validate_content_md5};
use crate::server::MemoryServer;
use crate::state::{MultipartUpload, StoredObject, UploadPart};

pub(crate) fn upload_id_param(ctx: &RequestContext) -> S3Result<&str> {
    ctx.param("uploadId")
        .ok_or_else(|| S3Error::with_message(ErrorKind::InvalidArgument, "missing uploadId"))
}

fn part_number_param(ctx: &RequestContext) -> S3Result<PartNumber> {
    let number = ctx.u32_param("partNumber")?.ok_or_else(|| {
        S3Error::with_message(ErrorKind::InvalidArgument, "missing partNumber")
    })?;
    PartNumber::new(number).map_err(as_invalid_argument)
}

fn no_such_upload(upload_id: &str) -> S3Error {
    S3Error::with_message(
        ErrorKind::UploadNotFound,
        format!("The specified multipart upload does not exist: {upload_id}"),
    )
}

impl MemoryServer {
    pub(crate) fn handle_create_multipart_upload(
        &self,
        ctx: &RequestContext,
    ) -> S3Result<HttpResponse> {
        let bucket = self.state.bucket(ctx.bucket()?)?;
        let key = ctx.key()?;
        let settings = WriteSettings::from_request(ctx)?;
        // Lock settings are checked now so a bad request fails before any
        // part is sent; the retention itself is resolved at completion.
        object_lock::retention_for_new_version(
            bucket.object_lock.read().as_ref(),
            settings.retention,
            settings.legal_hold.is_some(),
            ctx.now,
        )?;

        let upload_id = Uuid::new_v4().simple().to_string();
        let upload = MultipartUpload {
            upload_id: upload_id.clone(),
            key: key.to_owned(),
            initiated: ctx.now,
            metadata: settings.metadata,
            storage_class: settings.storage_class,
            sse: settings.sse.clone(),
            tags: settings.tags.unwrap_or_default(),
            retention: settings.retention,
            legal_hold: settings.legal_hold.unwrap_or(false),
            parts: BTreeMap::new(),
        };
        bucket.multipart_uploads.insert(upload_id.clone(), upload);
        debug!(bucket = %bucket.name, key, upload_id = %upload_id, "multipart upload created");

        let output = CreateMultipartUploadOutput {
            bucket: bucket.name.clone(),
            key: key.to_owned(),
            upload_id,
        };
        Response::ok()
            .optional_header(
                "x-amz-server-side-encryption",
                settings.sse.as_ref().map(|s| &s.algorithm),
            )?
            .xml("InitiateMultipartUploadResult", &output)
    }

    pub(crate) fn handle_upload_part(&self, ctx: &RequestContext) -> S3Result<HttpResponse> {
        let bucket = self.state.bucket(ctx.bucket()?)?;
        let key = ctx.key()?;
        let upload_id = upload_id_param(ctx)?;
        let part_number = part_number_param(ctx)?;
        if self.fail_next_upload_part.swap(false, Ordering::SeqCst) {
            warn!(upload_id, part = %part_number, "failing upload part on request");
            return Err(S3Error::with_message(
                ErrorKind::ServerError,
                "injected upload part failure",
            ));
        }
        validate_content_md5(ctx.header("content-md5"), &ctx.body)?;

        let etag = compute_etag(&ctx.body);
        let mut upload = bucket
            .multipart_uploads
            .get_mut(upload_id)
            .filter(|u| u.key == key)
            .ok_or_else(|| no_such_upload(upload_id))?;
        upload.parts.insert(
            part_number.get(),
            UploadPart {
                part_number: part_number.get(),
                etag: etag.clone(),
                data: ctx.body.clone(),
                last_modified: ctx.now,
            },
        );
        let sse = upload.sse.as_ref().map(|s| s.algorithm.clone());
        drop(upload);
        debug!(upload_id, part = %part_number, size = ctx.body.len(), "part uploaded");

        Ok(Response::ok()
            .header("etag", &etag)?
            .optional_header("x-amz-server-side-encryption", sse)?
            .empty())
    }

    pub(crate) fn handle_upload_part_copy(&self, ctx: &RequestContext) -> S3Result<HttpResponse> {
        let bucket = self.state.bucket(ctx.bucket()?)?;
        let key = ctx.key()?;
        let upload_id = upload_id_param(ctx)?;
        let part_number = part_number_param(ctx)?;
        let source_ref = copy_source(ctx)?;
        let source_conditions =
            conditions::from_headers(ConditionSite::CopySource, |n| ctx.header(n))?;

        let (source, source_versioning) = self.read_copy_source(&source_ref)?;
        conditions::evaluate(
            &source_conditions,
            ConditionSite::CopySource,
            Some(source.condition_state()),
        )?;
        let data = match ctx.header("x-amz-copy-source-range") {
            Some(range) => {
                let (start, end) = parse_range(range, source.size())?;
                let index =
                    |n: u64| usize::try_from(n).map_err(|_| S3Error::new(ErrorKind::InvalidRange));
                source.data.slice(index(start)?..=index(end)?)
            }
            None => source.data.clone(),
        };

        let etag = compute_etag(&data);
        let mut upload = bucket
            .multipart_uploads
            .get_mut(upload_id)
            .filter(|u| u.key == key)
            .ok_or_else(|| no_such_upload(upload_id))?;
        upload.parts.insert(
            part_number.get(),
            UploadPart {
                part_number: part_number.get(),
                etag: etag.clone(),
                data,
                last_modified: ctx.now,
            },
        );
        drop(upload);

        let result = CopyPartResult {
            etag,
            last_modified: ctx.now,
        };
        Response::ok()
            .optional_header(
                "x-amz-copy-source-version-id",
                version_header(source.version_id.as_deref(), source_versioning, self.dialect),
            )?
            .xml("CopyPartResult", &result)
    }

    /// Assemble the listed parts into the final object.
    ///
    /// Checks run in order: ascending part numbers, then that every part
    /// exists with the given ETag, then the minimum size of every part but
    /// the last.
    pub(crate) fn handle_complete_multipart_upload(
        &self,
        ctx: &RequestContext,
    ) -> S3Result<HttpResponse> {
        let bucket = self.state.bucket(ctx.bucket()?)?;
        let key = ctx.key()?;
        let upload_id = upload_id_param(ctx)?;
        let conditions = conditions::from_headers(ConditionSite::Write, |n| ctx.header(n))?;
        let request: CompleteMultipartUpload = ctx.xml_body()?;

        let upload = bucket
            .multipart_uploads
            .get(upload_id)
            .filter(|u| u.key == key)
            .map(|u| u.value().clone())
            .ok_or_else(|| no_such_upload(upload_id))?;

        if request.parts.is_empty() {
            return Err(S3Error::with_message(
                ErrorKind::InvalidArgument,
                "You must specify at least one part",
            ));
        }
        if !request
            .parts
            .windows(2)
            .all(|pair| pair[0].part_number < pair[1].part_number)
        {
            return Err(S3Error::new(ErrorKind::InvalidPartOrder));
        }
        let mut chosen = Vec::with_capacity(request.parts.len());
        for requested in &request.parts {
            let part = upload
                .parts
                .get(&requested.part_number)
                .filter(|p| normalize_etag(&p.etag) == normalize_etag(&requested.etag))
                .ok_or_else(|| {
                    S3Error::with_message(
                        ErrorKind::InvalidPart,
                        format!(
                            "part {} was not uploaded or its ETag does not match",
                            requested.part_number
                        ),
                    )
                })?;
            chosen.push(part);
        }
        if let Some((_, leading)) = chosen.split_last() {
            if let Some(small) = leading
                .iter()
                .find(|p| (p.data.len() as u64) < MIN_PART_SIZE)
            {
                return Err(S3Error::with_message(
                    ErrorKind::EntityTooSmall,
                    format!(
                        "part {} is {} bytes; every part but the last needs {MIN_PART_SIZE}",
                        small.part_number,
                        small.data.len()
                    ),
                ));
            }
        }

        let mut data = BytesMut::with_capacity(chosen.iter().map(|p| p.data.len()).sum());
        for part in &chosen {
            data.extend_from_slice(&part.data);
        }
        let etags: Vec<&str> = chosen.iter().map(|p| p.etag.as_str()).collect();
        let etag = compute_multipart_etag(&etags);
        let retention = object_lock::retention_for_new_version(
            bucket.object_lock.read().as_ref(),
            upload.retention,
            upload.legal_hold,
            ctx.now,
        )?;
        let object = StoredObject {
            key: key.to_owned(),
            version_id: None,
            data: data.freeze(),
            etag: etag.clone(),
            last_modified: ctx.now,
            metadata: upload.metadata.clone(),
            storage_class: upload.storage_class.clone(),
            sse: upload.sse.clone(),
            tags: upload.tags.clone(),
            lock: ObjectLockProperties {
                retention,
                legal_hold: upload.legal_hold,
            },
            parts_count: u32::try_from(chosen.len()).ok(),
        };

        let versioning = bucket.versioning();
        let version_id = {
            let mut objects = bucket.objects.write();
            conditions::evaluate(
                &conditions,
                ConditionSite::Write,
                objects.current(key).map(StoredObject::condition_state),
            )?;
            objects.put(object, versioning)
        };
        bucket.multipart_uploads.remove(upload_id);
        info!(
            bucket = %bucket.name,
            key,
            upload_id,
            parts = chosen.len(),
            "multipart upload completed"
        );

        let output = CompleteMultipartUploadOutput {
            location: Some(format!("/{}/{key}", bucket.name)),
            bucket: bucket.name.clone(),
            key: key.to_owned(),
            etag,
            version_id: version_id.clone(),
        };
        Response::ok()
            .optional_header(
                "x-amz-version-id",
                version_header(version_id.as_deref(), versioning, self.dialect),
            )?
            .xml("CompleteMultipartUploadResult", &output)
    }

    pub(crate) fn handle_abort_multipart_upload(
        &self,
        ctx: &RequestContext,
    ) -> S3Result<HttpResponse> {
        let bucket = self.state.bucket(ctx.bucket()?)?;
        let key = ctx.key()?;
        let upload_id = upload_id_param(ctx)?;
        bucket
            .multipart_uploads
            .remove_if(upload_id, |_, u| u.key == key)
            .ok_or_else(|| no_such_upload(upload_id))?;
        debug!(bucket = %bucket.name, key, upload_id, "multipart upload aborted");
        Ok(Response::no_content().empty())
    }
}
