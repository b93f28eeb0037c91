//! Per-version retention and legal hold.

use chrono::Utc;
use http::Method;
use tracing::info;
use unis3_model::types::Retention;
use unis3_model::{ErrorKind, S3Error, S3Result};
use unis3_xml::wire::{LegalHold, ObjectRetention};

use crate::S3Client;
use crate::request::read_xml;

impl S3Client {
    /// The retention of an object version; `None` when it has none.
    ///
    /// # Errors
    ///
    /// Returns `BucketLockNotEnabled` for a bucket without object lock.
    pub fn get_object_retention(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> S3Result<Option<Retention>> {
        let request = self
            .request(Method::GET)
            .bucket(bucket)
            .key(key)
            .flag("retention")
            .version_query(version_id);
        match self.send(request) {
            Ok(response) => Ok(read_xml::<ObjectRetention>(response)?.retention),
            Err(err) if err.kind() == ErrorKind::NoObjectLockConfiguration => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Set, extend, shorten or remove (`None`) the retention of an object
    /// version.
    ///
    /// Extending needs no bypass. Shortening or removing a GOVERNANCE
    /// retention needs `bypass_governance`; a COMPLIANCE retention can only
    /// be extended.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a retain-until date that is not in the
    /// future and `AccessDenied` for a transition the lock forbids.
    pub fn update_retention(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        retention: Option<Retention>,
        bypass_governance: bool,
    ) -> S3Result<()> {
        if retention.is_some_and(|r| r.retain_until <= Utc::now()) {
            return Err(S3Error::invalid_input(
                "retain-until date must be in the future",
            ));
        }
        let request = self
            .request(Method::PUT)
            .bucket(bucket)
            .key(key)
            .flag("retention")
            .version_query(version_id)
            .bypass_governance(bypass_governance)
            .xml_body("Retention", &ObjectRetention { retention })?;
        self.send(request)?;
        info!(bucket, key, retention = ?retention, bypass_governance, "retention updated");
        Ok(())
    }

    /// Whether an object version is under legal hold.
    ///
    /// # Errors
    ///
    /// Returns `BucketLockNotEnabled` for a bucket without object lock.
    pub fn get_object_legal_hold(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> S3Result<bool> {
        let request = self
            .request(Method::GET)
            .bucket(bucket)
            .key(key)
            .flag("legal-hold")
            .version_query(version_id);
        Ok(read_xml::<LegalHold>(self.send(request)?)?.enabled)
    }

    /// Place or lift a legal hold, independently of any retention.
    ///
    /// # Errors
    ///
    /// Returns `BucketLockNotEnabled` for a bucket without object lock.
    pub fn set_object_legal_hold(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        enabled: bool,
    ) -> S3Result<()> {
        let request = self
            .request(Method::PUT)
            .bucket(bucket)
            .key(key)
            .flag("legal-hold")
            .version_query(version_id)
            .xml_body("LegalHold", &LegalHold { enabled })?;
        self.send(request)?;
        info!(bucket, key, enabled, "legal hold changed");
        Ok(())
    }
}
