//! Per-vendor behavioural differences as data.
//!
//! Every component consults a [`Dialect`] rather than branching on the
//! vendor. The in-memory server takes the same table so tests can run
//! against each vendor's shape.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A supported storage vendor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Amazon S3.
    Aws,
    /// Aliyun OSS.
    Aliyun,
    /// Tencent COS.
    Tencent,
    /// Cloudflare R2.
    R2,
    /// Any other S3-compatible endpoint (MinIO, Ceph, ...).
    #[default]
    Generic,
}

impl Provider {
    /// All providers.
    pub const ALL: [Self; 5] = [Self::Aws, Self::Aliyun, Self::Tencent, Self::R2, Self::Generic];

    /// Lower-case name, as accepted by [`FromStr`].
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Aws => "aws",
            Self::Aliyun => "aliyun",
            Self::Tencent => "tencent",
            Self::R2 => "r2",
            Self::Generic => "generic",
        }
    }

    /// The dialect table entry for this provider.
    #[must_use]
    pub fn dialect(self) -> &'static Dialect {
        Dialect::for_provider(self)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a provider name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown provider '{0}' (expected aws, aliyun, tencent, r2 or generic)")]
pub struct UnknownProvider(pub String);

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aws" | "s3" => Ok(Self::Aws),
            "aliyun" | "oss" => Ok(Self::Aliyun),
            "tencent" | "cos" => Ok(Self::Tencent),
            "r2" | "cloudflare" => Ok(Self::R2),
            "generic" | "minio" => Ok(Self::Generic),
            _ => Err(UnknownProvider(s.to_owned())),
        }
    }
}

/// How a vendor spells "no version id".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NullVersionId {
    /// The literal string `null`.
    Literal,
    /// An empty string.
    Empty,
}

impl NullVersionId {
    /// The wire form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Literal => "null",
            Self::Empty => "",
        }
    }
}

/// One row of the dialect table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialect {
    /// The vendor.
    pub provider: Provider,
    /// Path-style (`host/bucket/key`) rather than virtual-hosted
    /// (`bucket.host/key`) addressing.
    pub path_style: bool,
    /// Optional request headers the vendor rejects or ignores.
    pub unsupported_headers: &'static [&'static str],
    /// Representation of the null version id.
    pub null_version_id: NullVersionId,
    /// Whether objects are encrypted server-side without being asked.
    pub sse_by_default: bool,
    /// Whether `x-amz-mp-parts-count` is reported on reads.
    pub reports_parts_count: bool,
}

const LOCK_HEADERS: &[&str] = &[
    "x-amz-object-lock-mode",
    "x-amz-object-lock-retain-until-date",
    "x-amz-object-lock-legal-hold",
    "x-amz-bypass-governance-retention",
];

const R2_UNSUPPORTED: &[&str] = &[
    "x-amz-object-lock-mode",
    "x-amz-object-lock-retain-until-date",
    "x-amz-object-lock-legal-hold",
    "x-amz-bypass-governance-retention",
    "x-amz-tagging",
    "x-amz-tagging-directive",
];

static AWS: Dialect = Dialect {
    provider: Provider::Aws,
    path_style: false,
    unsupported_headers: &[],
    null_version_id: NullVersionId::Literal,
    sse_by_default: true,
    reports_parts_count: false,
};

static ALIYUN: Dialect = Dialect {
    provider: Provider::Aliyun,
    path_style: false,
    unsupported_headers: LOCK_HEADERS,
    null_version_id: NullVersionId::Literal,
    sse_by_default: false,
    reports_parts_count: false,
};

static TENCENT: Dialect = Dialect {
    provider: Provider::Tencent,
    path_style: false,
    unsupported_headers: &["x-amz-bypass-governance-retention"],
    null_version_id: NullVersionId::Empty,
    sse_by_default: false,
    reports_parts_count: false,
};

static R2: Dialect = Dialect {
    provider: Provider::R2,
    path_style: true,
    unsupported_headers: R2_UNSUPPORTED,
    null_version_id: NullVersionId::Empty,
    sse_by_default: true,
    reports_parts_count: true,
};

static GENERIC: Dialect = Dialect {
    provider: Provider::Generic,
    path_style: true,
    unsupported_headers: &[],
    null_version_id: NullVersionId::Literal,
    sse_by_default: false,
    reports_parts_count: false,
};

impl Dialect {
    /// The table entry for `provider`.
    #[must_use]
    pub fn for_provider(provider: Provider) -> &'static Self {
        match provider {
            Provider::Aws => &AWS,
            Provider::Aliyun => &ALIYUN,
            Provider::Tencent => &TENCENT,
            Provider::R2 => &R2,
            Provider::Generic => &GENERIC,
        }
    }

    /// Whether the vendor accepts the optional header `name`.
    #[must_use]
    pub fn supports_header(&self, name: &str) -> bool {
        !self
            .unsupported_headers
            .iter()
            .any(|h| h.eq_ignore_ascii_case(name))
    }

    /// Normalise a version id from the wire: the vendor's null form and an
    /// absent value both become `None`.
    #[must_use]
    pub fn normalize_version_id(&self, raw: Option<&str>) -> Option<String> {
        match raw.map(str::trim) {
            None | Some("" | "null") => None,
            Some(v) => Some(v.to_owned()),
        }
    }

    /// The version id a server reports for an unversioned write.
    #[must_use]
    pub fn null_version(&self) -> &'static str {
        self.null_version_id.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_parse_provider_names() {
        assert_eq!("AWS".parse::<Provider>().unwrap(), Provider::Aws);
        assert_eq!("r2".parse::<Provider>().unwrap(), Provider::R2);
        assert_eq!(" tencent ".parse::<Provider>().unwrap(), Provider::Tencent);
        assert!("dropbox".parse::<Provider>().is_err());
        for provider in Provider::ALL {
            assert_eq!(provider.as_str().parse::<Provider>().unwrap(), provider);
        }
    }

    #[test]
    fn test_should_serialize_provider_lowercase() {
        assert_eq!(serde_json::to_string(&Provider::Aliyun).unwrap(), "\"aliyun\"");
        let parsed: Provider = serde_json::from_str("\"generic\"").unwrap();
        assert_eq!(parsed, Provider::Generic);
    }

    #[test]
    fn test_should_report_parts_count_only_for_r2() {
        for provider in Provider::ALL {
            assert_eq!(
                provider.dialect().reports_parts_count,
                provider == Provider::R2
            );
        }
    }

    #[test]
    fn test_should_check_headers_case_insensitively() {
        let r2 = Provider::R2.dialect();
        assert!(!r2.supports_header("X-Amz-Tagging"));
        assert!(r2.supports_header("x-amz-storage-class"));
        assert!(Provider::Aws.dialect().supports_header("x-amz-object-lock-mode"));
    }

    #[test]
    fn test_should_normalize_null_version_ids() {
        let d = Provider::Generic.dialect();
        assert_eq!(d.normalize_version_id(Some("null")), None);
        assert_eq!(d.normalize_version_id(Some("")), None);
        assert_eq!(d.normalize_version_id(None), None);
        assert_eq!(d.normalize_version_id(Some("v1")).as_deref(), Some("v1"));
        assert_eq!(Provider::R2.dialect().null_version(), "");
        assert_eq!(Provider::Aws.dialect().null_version(), "null");
    }
}
