//! Bucket operations and bucket-level configuration.

use http::Method;
use tracing::info;
use unis3_core::pagination::{Page, Paginator, TokenCursor};
use unis3_model::input::{CreateBucketOptions, ListBucketsOptions};
use unis3_model::output::ListBucketsOutput;
use unis3_model::types::{
    Bucket, MAX_BUCKET_TAGS, ObjectLockConfiguration, PublicAccessBlockConfiguration, Tagging,
    VersioningStatus,
};
use unis3_model::{ErrorKind, S3Error, S3Result};
use unis3_xml::wire::{CreateBucketConfiguration, VersioningConfiguration};

use crate::S3Client;
use crate::request::read_xml;

impl S3Client {
    /// Create `bucket`, optionally in a region and with object lock enabled.
    ///
    /// # Errors
    ///
    /// Returns `BucketAlreadyExists` if the name is taken.
    pub fn create_bucket(&self, bucket: &str, options: &CreateBucketOptions) -> S3Result<()> {
        let mut request = self.request(Method::PUT).bucket(bucket);
        if let Some(region) = &options.region {
            request = request.xml_body(
                "CreateBucketConfiguration",
                &CreateBucketConfiguration {
                    location_constraint: Some(region.clone()),
                },
            )?;
        }
        if options.object_lock_enabled {
            request = request.header("x-amz-bucket-object-lock-enabled", "true");
        }
        self.send(request)?;
        info!(bucket, region = ?options.region, lock = options.object_lock_enabled, "bucket created");
        Ok(())
    }

    /// Delete an empty bucket.
    ///
    /// # Errors
    ///
    /// Returns `BucketNotEmpty` while objects or versions remain.
    pub fn delete_bucket(&self, bucket: &str) -> S3Result<()> {
        self.send(self.request(Method::DELETE).bucket(bucket))?;
        info!(bucket, "bucket deleted");
        Ok(())
    }

    /// Whether `bucket` exists and is accessible.
    ///
    /// # Errors
    ///
    /// Returns any failure other than a missing bucket.
    pub fn bucket_exists(&self, bucket: &str) -> S3Result<bool> {
        match self.send(self.request(Method::HEAD).bucket(bucket)) {
            Ok(_) => Ok(true),
            Err(err) if err.kind() == ErrorKind::BucketNotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Fetch one page of buckets.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an out-of-range page size.
    pub fn list_buckets_page(
        &self,
        options: &ListBucketsOptions,
    ) -> S3Result<Page<Bucket, TokenCursor>> {
        options.validate()?;
        let request = self
            .request(Method::GET)
            .optional_query("prefix", options.prefix.as_deref())
            .optional_query("max-buckets", options.max_buckets)
            .optional_query("continuation-token", options.continuation_token.as_deref());
        let output: ListBucketsOutput = read_xml(self.send(request)?)?;
        Ok(Page::new(
            output.buckets,
            TokenCursor::new(output.continuation_token),
        ))
    }

    /// Walk every bucket, starting at `options.continuation_token`.
    pub fn list_buckets(
        &self,
        options: &ListBucketsOptions,
    ) -> Paginator<
        Bucket,
        TokenCursor,
        impl FnMut(&TokenCursor) -> S3Result<Page<Bucket, TokenCursor>> + '_,
    > {
        let options = options.clone();
        Paginator::starting_at(
            TokenCursor::new(options.continuation_token.clone()),
            move |cursor: &TokenCursor| {
                self.list_buckets_page(&ListBucketsOptions {
                    continuation_token: cursor.token.clone(),
                    ..options.clone()
                })
            },
        )
    }

    /// The versioning state; `None` for a bucket that was never versioned.
    ///
    /// # Errors
    ///
    /// Returns `BucketNotFound` for a missing bucket.
    pub fn get_bucket_versioning(&self, bucket: &str) -> S3Result<Option<VersioningStatus>> {
        let response = self.send(self.request(Method::GET).bucket(bucket).flag("versioning"))?;
        let config: VersioningConfiguration = read_xml(response)?;
        Ok(config.status)
    }

    /// Enable or suspend versioning.
    ///
    /// # Errors
    ///
    /// Returns `BucketNotFound` for a missing bucket.
    pub fn set_bucket_versioning(&self, bucket: &str, status: VersioningStatus) -> S3Result<()> {
        let request = self
            .request(Method::PUT)
            .bucket(bucket)
            .flag("versioning")
            .xml_body(
                "VersioningConfiguration",
                &VersioningConfiguration {
                    status: Some(status),
                },
            )?;
        self.send(request)?;
        info!(bucket, status = status.as_str(), "bucket versioning changed");
        Ok(())
    }

    /// The bucket's tag set.
    ///
    /// # Errors
    ///
    /// Returns `NoTagSet` when the bucket has no tags.
    pub fn get_bucket_tagging(&self, bucket: &str) -> S3Result<Tagging> {
        let response = self.send(self.request(Method::GET).bucket(bucket).flag("tagging"))?;
        read_xml(response)
    }

    /// Replace the bucket's tag set.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for more than 50 tags.
    pub fn set_bucket_tagging(&self, bucket: &str, tags: &Tagging) -> S3Result<()> {
        if tags.len() > MAX_BUCKET_TAGS {
            return Err(S3Error::invalid_input(format!(
                "buckets carry at most {MAX_BUCKET_TAGS} tags"
            )));
        }
        let request = self
            .request(Method::PUT)
            .bucket(bucket)
            .flag("tagging")
            .xml_body("Tagging", tags)?;
        self.send(request)?;
        Ok(())
    }

    /// Remove the bucket's tag set.
    ///
    /// # Errors
    ///
    /// Returns `BucketNotFound` for a missing bucket.
    pub fn delete_bucket_tagging(&self, bucket: &str) -> S3Result<()> {
        self.send(self.request(Method::DELETE).bucket(bucket).flag("tagging"))?;
        Ok(())
    }

    /// The bucket policy document.
    ///
    /// # Errors
    ///
    /// Returns `NoBucketPolicy` when none is set.
    pub fn get_bucket_policy(&self, bucket: &str) -> S3Result<String> {
        let response = self.send(self.request(Method::GET).bucket(bucket).flag("policy"))?;
        let body = response.into_bytes()?;
        String::from_utf8(body.to_vec())
            .map_err(|_| S3Error::malformed_response("bucket policy is not valid UTF-8"))
    }

    /// Replace the bucket policy with a JSON document.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the server rejects the document.
    pub fn set_bucket_policy(&self, bucket: &str, policy: &str) -> S3Result<()> {
        let request = self
            .request(Method::PUT)
            .bucket(bucket)
            .flag("policy")
            .header("content-type", "application/json")
            .body(policy.to_owned());
        self.send(request)?;
        Ok(())
    }

    /// Remove the bucket policy.
    ///
    /// # Errors
    ///
    /// Returns `BucketNotFound` for a missing bucket.
    pub fn delete_bucket_policy(&self, bucket: &str) -> S3Result<()> {
        self.send(self.request(Method::DELETE).bucket(bucket).flag("policy"))?;
        Ok(())
    }

    /// The bucket's public access block.
    ///
    /// # Errors
    ///
    /// Returns `NoPublicAccessBlock` when none is set.
    pub fn get_public_access_block(
        &self,
        bucket: &str,
    ) -> S3Result<PublicAccessBlockConfiguration> {
        let response = self.send(
            self.request(Method::GET)
                .bucket(bucket)
                .flag("publicAccessBlock"),
        )?;
        read_xml(response)
    }

    /// Replace the bucket's public access block.
    ///
    /// # Errors
    ///
    /// Returns `BucketNotFound` for a missing bucket.
    pub fn set_public_access_block(
        &self,
        bucket: &str,
        config: &PublicAccessBlockConfiguration,
    ) -> S3Result<()> {
        let request = self
            .request(Method::PUT)
            .bucket(bucket)
            .flag("publicAccessBlock")
            .xml_body("PublicAccessBlockConfiguration", config)?;
        self.send(request)?;
        Ok(())
    }

    /// Remove the bucket's public access block.
    ///
    /// # Errors
    ///
    /// Returns `BucketNotFound` for a missing bucket.
    pub fn delete_public_access_block(&self, bucket: &str) -> S3Result<()> {
        self.send(
            self.request(Method::DELETE)
                .bucket(bucket)
                .flag("publicAccessBlock"),
        )?;
        Ok(())
    }

    /// The bucket-level object lock configuration.
    ///
    /// # Errors
    ///
    /// Returns `NoObjectLockConfiguration` for a bucket created without
    /// object lock.
    pub fn get_object_lock_configuration(&self, bucket: &str) -> S3Result<ObjectLockConfiguration> {
        let response = self.send(self.request(Method::GET).bucket(bucket).flag("object-lock"))?;
        read_xml(response)
    }

    /// Replace the default retention of a lock-enabled bucket.
    ///
    /// # Errors
    ///
    /// Returns `BucketLockNotEnabled` for a bucket created without object
    /// lock.
    pub fn set_object_lock_configuration(
        &self,
        bucket: &str,
        config: &ObjectLockConfiguration,
    ) -> S3Result<()> {
        let request = self
            .request(Method::PUT)
            .bucket(bucket)
            .flag("object-lock")
            .xml_body("ObjectLockConfiguration", config)?;
        self.send(request)?;
        info!(bucket, "object lock configuration updated");
        Ok(())
    }
}
