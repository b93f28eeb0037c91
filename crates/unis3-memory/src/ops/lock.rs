//! Per-version object lock: retention and legal hold.

use tracing::info;
use unis3_core::object_lock;
use unis3_core::transport::HttpResponse;
use unis3_model::{ErrorKind, S3Error, S3Result};
use unis3_xml::wire::{LegalHold, ObjectRetention};

use super::{
    RequestContext, Response, as_invalid_argument, select_object, select_object_mut,
    version_header,
};
use crate::server::MemoryServer;
use crate::state::MemoryBucket;

fn require_lock(bucket: &MemoryBucket) -> S3Result<()> {
    if bucket.is_lock_enabled() {
        Ok(())
    } else {
        Err(S3Error::new(ErrorKind::BucketLockNotEnabled))
    }
}

impl MemoryServer {
    pub(crate) fn handle_get_object_retention(
        &self,
        ctx: &RequestContext,
    ) -> S3Result<HttpResponse> {
        let bucket = self.state.bucket(ctx.bucket()?)?;
        require_lock(&bucket)?;
        let requested = ctx.requested_version();
        let retention = {
            let objects = bucket.objects.read();
            select_object(&objects, ctx.key()?, requested.as_ref())?
                .lock
                .retention
        };
        let retention = retention.ok_or_else(|| {
            S3Error::with_message(
                ErrorKind::NoObjectLockConfiguration,
                "The specified object does not have a retention configuration",
            )
        })?;
        Response::ok().xml(
            "Retention",
            &ObjectRetention {
                retention: Some(retention),
            },
        )
    }

    /// Replace a version's retention, subject to the lock transition rules.
    pub(crate) fn handle_put_object_retention(
        &self,
        ctx: &RequestContext,
    ) -> S3Result<HttpResponse> {
        let bucket = self.state.bucket(ctx.bucket()?)?;
        require_lock(&bucket)?;
        let body: ObjectRetention = ctx.xml_body()?;
        let bypass = ctx.flag("x-amz-bypass-governance-retention");
        let requested = ctx.requested_version();
        let key = ctx.key()?;

        let version_id = {
            let mut objects = bucket.objects.write();
            let object = select_object_mut(&mut objects, key, requested.as_ref())?;
            object_lock::check_retention_update(
                object.lock.retention.as_ref(),
                body.retention.as_ref(),
                bypass,
                ctx.now,
            )
            .map_err(as_invalid_argument)?;
            object.lock.retention = body.retention;
            object.version_id.clone()
        };
        info!(
            bucket = %bucket.name,
            key,
            retention = ?body.retention,
            bypass,
            "object retention updated"
        );
        Ok(Response::ok()
            .optional_header(
                "x-amz-version-id",
                version_header(version_id.as_deref(), bucket.versioning(), self.dialect),
            )?
            .empty())
    }

    pub(crate) fn handle_get_object_legal_hold(
        &self,
        ctx: &RequestContext,
    ) -> S3Result<HttpResponse> {
        let bucket = self.state.bucket(ctx.bucket()?)?;
        require_lock(&bucket)?;
        let requested = ctx.requested_version();
        let enabled = {
            let objects = bucket.objects.read();
            select_object(&objects, ctx.key()?, requested.as_ref())?
                .lock
                .legal_hold
        };
        Response::ok().xml("LegalHold", &LegalHold { enabled })
    }

    pub(crate) fn handle_put_object_legal_hold(
        &self,
        ctx: &RequestContext,
    ) -> S3Result<HttpResponse> {
        let bucket = self.state.bucket(ctx.bucket()?)?;
        require_lock(&bucket)?;
        let body: LegalHold = ctx.xml_body()?;
        let requested = ctx.requested_version();
        let key = ctx.key()?;

        let version_id = {
            let mut objects = bucket.objects.write();
            let object = select_object_mut(&mut objects, key, requested.as_ref())?;
            object.lock.legal_hold = body.enabled;
            object.version_id.clone()
        };
        info!(bucket = %bucket.name, key, enabled = body.enabled, "legal hold updated");
        Ok(Response::ok()
            .optional_header(
                "x-amz-version-id",
                version_header(version_id.as_deref(), bucket.versioning(), self.dialect),
            )?
            .empty())
    }
}
