//! Bucket handlers: create, delete, head, list, and the bucket-level
//! configuration documents (versioning, tags, policy, public access block,
//! object lock).

use tracing::debug;
use unis3_core::pagination::take_page;
use unis3_core::transport::HttpResponse;
use unis3_model::input::MAX_PAGE_SIZE;
use unis3_model::output::ListBucketsOutput;
use unis3_model::types::{
    Bucket, ObjectLockConfiguration, PublicAccessBlockConfiguration, Tagging, VersioningStatus,
};
use unis3_model::{ErrorKind, S3Error, S3Result};
use unis3_xml::wire::{CreateBucketConfiguration, VersioningConfiguration};

use super::{RequestContext, Response};
use crate::server::MemoryServer;

impl MemoryServer {
    pub(crate) fn handle_list_buckets(&self, ctx: &RequestContext) -> S3Result<HttpResponse> {
        let prefix = ctx.param("prefix").filter(|p| !p.is_empty());
        let limit = ctx
            .u32_param("max-buckets")?
            .unwrap_or(MAX_PAGE_SIZE)
            .min(MAX_PAGE_SIZE) as usize;
        let after = ctx.param("continuation-token").map(ToOwned::to_owned);

        let buckets: Vec<Bucket> = self
            .state
            .list_buckets()
            .iter()
            .filter(|b| prefix.is_none_or(|p| b.name.starts_with(p)))
            .map(|b| Bucket {
                name: b.name.clone(),
                creation_date: b.creation_date,
                region: b.region.clone(),
            })
            .collect();
        let (page, next) = take_page(&buckets, after.as_ref(), limit, |b| b.name.clone());

        let output = ListBucketsOutput {
            buckets: page.into_iter().cloned().collect(),
            prefix: prefix.map(ToOwned::to_owned),
            continuation_token: next,
        };
        Response::ok().xml("ListAllMyBucketsResult", &output)
    }

    pub(crate) fn handle_create_bucket(&self, ctx: &RequestContext) -> S3Result<HttpResponse> {
        let name = ctx.bucket()?;
        validate_bucket_name(name)?;
        let region = if ctx.body.is_empty() {
            None
        } else {
            ctx.xml_body::<CreateBucketConfiguration>()?
                .location_constraint
        };
        let lock = ctx.flag("x-amz-bucket-object-lock-enabled");
        self.state.create_bucket(name, region, lock, ctx.now)?;
        Ok(Response::ok().header("location", format!("/{name}"))?.empty())
    }

    pub(crate) fn handle_delete_bucket(&self, ctx: &RequestContext) -> S3Result<HttpResponse> {
        self.state.delete_bucket(ctx.bucket()?)?;
        Ok(Response::no_content().empty())
    }

    pub(crate) fn handle_head_bucket(&self, ctx: &RequestContext) -> S3Result<HttpResponse> {
        let bucket = self.state.bucket(ctx.bucket()?)?;
        Ok(Response::ok()
            .optional_header("x-amz-bucket-region", bucket.region.as_ref())?
            .empty())
    }

    pub(crate) fn handle_get_bucket_versioning(
        &self,
        ctx: &RequestContext,
    ) -> S3Result<HttpResponse> {
        let bucket = self.state.bucket(ctx.bucket()?)?;
        let config = VersioningConfiguration {
            status: bucket.versioning(),
        };
        Response::ok().xml("VersioningConfiguration", &config)
    }

    pub(crate) fn handle_put_bucket_versioning(
        &self,
        ctx: &RequestContext,
    ) -> S3Result<HttpResponse> {
        let bucket = self.state.bucket(ctx.bucket()?)?;
        let config: VersioningConfiguration = ctx.xml_body()?;
        let status = config.status.ok_or_else(|| {
            S3Error::with_message(ErrorKind::InvalidArgument, "versioning status is required")
        })?;
        if status == VersioningStatus::Suspended && bucket.is_lock_enabled() {
            return Err(S3Error::with_message(
                ErrorKind::InvalidArgument,
                "versioning cannot be suspended on a bucket with object lock",
            ));
        }
        bucket.set_versioning(status);
        Ok(Response::ok().empty())
    }

    pub(crate) fn handle_get_bucket_tagging(&self, ctx: &RequestContext) -> S3Result<HttpResponse> {
        let bucket = self.state.bucket(ctx.bucket()?)?;
        let tags = bucket
            .tags
            .read()
            .clone()
            .ok_or_else(|| S3Error::new(ErrorKind::NoTagSet))?;
        Response::ok().xml("Tagging", &tags)
    }

    pub(crate) fn handle_put_bucket_tagging(&self, ctx: &RequestContext) -> S3Result<HttpResponse> {
        let bucket = self.state.bucket(ctx.bucket()?)?;
        let tags: Tagging = ctx.xml_body()?;
        debug!(bucket = %bucket.name, count = tags.len(), "bucket tags replaced");
        *bucket.tags.write() = Some(tags);
        Ok(Response::no_content().empty())
    }

    pub(crate) fn handle_delete_bucket_tagging(
        &self,
        ctx: &RequestContext,
    ) -> S3Result<HttpResponse> {
        let bucket = self.state.bucket(ctx.bucket()?)?;
        *bucket.tags.write() = None;
        Ok(Response::no_content().empty())
    }

    pub(crate) fn handle_get_bucket_policy(&self, ctx: &RequestContext) -> S3Result<HttpResponse> {
        let bucket = self.state.bucket(ctx.bucket()?)?;
        let policy = bucket
            .policy
            .read()
            .clone()
            .ok_or_else(|| S3Error::new(ErrorKind::NoBucketPolicy))?;
        Ok(Response::ok()
            .header("content-type", "application/json")?
            .body(policy))
    }

    pub(crate) fn handle_put_bucket_policy(&self, ctx: &RequestContext) -> S3Result<HttpResponse> {
        let bucket = self.state.bucket(ctx.bucket()?)?;
        let policy = std::str::from_utf8(&ctx.body)
            .ok()
            .map(str::trim)
            .filter(|p| p.starts_with('{'))
            .ok_or_else(|| {
                S3Error::with_message(ErrorKind::InvalidArgument, "policies must be JSON objects")
            })?;
        *bucket.policy.write() = Some(policy.to_owned());
        Ok(Response::no_content().empty())
    }

    pub(crate) fn handle_delete_bucket_policy(
        &self,
        ctx: &RequestContext,
    ) -> S3Result<HttpResponse> {
        let bucket = self.state.bucket(ctx.bucket()?)?;
        *bucket.policy.write() = None;
        Ok(Response::no_content().empty())
    }

    pub(crate) fn handle_get_public_access_block(
        &self,
        ctx: &RequestContext,
    ) -> S3Result<HttpResponse> {
        let bucket = self.state.bucket(ctx.bucket()?)?;
        let config = bucket
            .public_access_block
            .read()
            .ok_or_else(|| S3Error::new(ErrorKind::NoPublicAccessBlock))?;
        Response::ok().xml("PublicAccessBlockConfiguration", &config)
    }

    pub(crate) fn handle_put_public_access_block(
        &self,
        ctx: &RequestContext,
    ) -> S3Result<HttpResponse> {
        let bucket = self.state.bucket(ctx.bucket()?)?;
        let config: PublicAccessBlockConfiguration = ctx.xml_body()?;
        *bucket.public_access_block.write() = Some(config);
        Ok(Response::ok().empty())
    }

    pub(crate) fn handle_delete_public_access_block(
        &self,
        ctx: &RequestContext,
    ) -> S3Result<HttpResponse> {
        let bucket = self.state.bucket(ctx.bucket()?)?;
        *bucket.public_access_block.write() = None;
        Ok(Response::no_content().empty())
    }

    pub(crate) fn handle_get_object_lock_configuration(
        &self,
        ctx: &RequestContext,
    ) -> S3Result<HttpResponse> {
        let bucket = self.state.bucket(ctx.bucket()?)?;
        let config = bucket
            .object_lock
            .read()
            .ok_or_else(|| S3Error::new(ErrorKind::NoObjectLockConfiguration))?;
        Response::ok().xml("ObjectLockConfiguration", &config)
    }

    pub(crate) fn handle_put_object_lock_configuration(
        &self,
        ctx: &RequestContext,
    ) -> S3Result<HttpResponse> {
        let bucket = self.state.bucket(ctx.bucket()?)?;
        let config: ObjectLockConfiguration = ctx.xml_body()?;
        if !bucket.is_lock_enabled() {
            return Err(S3Error::new(ErrorKind::BucketLockNotEnabled));
        }
        if !config.enabled {
            return Err(S3Error::with_message(
                ErrorKind::InvalidArgument,
                "object lock cannot be disabled once enabled",
            ));
        }
        debug!(bucket = %bucket.name, default = ?config.default_retention, "object lock configured");
        *bucket.object_lock.write() = Some(config);
        Ok(Response::ok().empty())
    }
}

/// Bucket names: 3 to 63 characters of lowercase letters, digits, `.` and
/// `-`, starting and ending with a letter or digit.
fn validate_bucket_name(name: &str) -> S3Result<()> {
    let valid_chars = name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'.' || b == b'-');
    let valid_ends = name
        .bytes()
        .next()
        .zip(name.bytes().last())
        .is_some_and(|(first, last)| first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric());
    if (3..=63).contains(&name.len()) && valid_chars && valid_ends && !name.contains("..") {
        Ok(())
    } else {
        Err(S3Error::with_message(
            ErrorKind::InvalidArgument,
            format!("invalid bucket name: {name}"),
        ))
    }
}
