//! Body shapes that exist only on the wire.
//!
//! Most bodies map one-to-one onto `unis3_model` types. These do not: they
//! wrap a single optional value or a list the model keeps elsewhere.

use unis3_model::types::{CompletedPart, Retention, VersioningStatus};

/// `<VersioningConfiguration>`; a never-configured bucket has no status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VersioningConfiguration {
    /// `Enabled` or `Suspended`.
    pub status: Option<VersioningStatus>,
}

/// `<Retention>`; an empty element removes a retention.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObjectRetention {
    /// The retention, or `None` to clear it.
    pub retention: Option<Retention>,
}

/// `<LegalHold><Status>ON|OFF</Status></LegalHold>`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LegalHold {
    /// Whether the hold is on.
    pub enabled: bool,
}

/// `<CreateBucketConfiguration>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateBucketConfiguration {
    /// Requested region.
    pub location_constraint: Option<String>,
}

/// `<CompleteMultipartUpload>`; parts stay in the order given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompleteMultipartUpload {
    /// Parts as submitted.
    pub parts: Vec<CompletedPart>,
}
