//! S3 XML serialization: converting unis3 types to S3-compatible XML.
//!
//! Implementations write child elements only; the root element and the
//! namespace come from [`to_xml`].

use std::io::{self, Write};

use chrono::{DateTime, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesText, Event};
use unis3_model::input::DeleteRequest;
use unis3_model::output::{
    CompleteMultipartUploadOutput, CopyPartResult, CreateMultipartUploadOutput,
    DeleteObjectsBatchResult, ListBucketsOutput, ListMultipartUploadsOutput,
    ListObjectVersionsOutput, ListObjectsV2Output, ListPartsOutput,
};
use unis3_model::types::{
    DefaultRetention, ObjectLockConfiguration, PublicAccessBlockConfiguration, S3Object, Tagging,
};

use crate::error::XmlError;
use crate::wire::{
    CompleteMultipartUpload, CreateBucketConfiguration, LegalHold, ObjectRetention,
    VersioningConfiguration,
};

/// The S3 XML namespace.
pub const S3_NAMESPACE: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

/// Trait for serializing S3 types to XML.
///
/// Uses `io::Result` because `quick_xml::Writer` closures require `io::Result<()>`.
pub trait S3Serialize {
    /// Serialize this value as XML child elements into the given writer.
    ///
    /// # Errors
    ///
    /// Returns `io::Error` if writing to the underlying writer fails.
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()>;
}

/// Serialize a value as a complete XML document under `root_element`.
///
/// # Errors
///
/// Returns `XmlError` if serialization fails.
pub fn to_xml<T: S3Serialize>(root_element: &str, value: &T) -> Result<Vec<u8>, XmlError> {
    let mut buf = Vec::with_capacity(512);
    let mut writer = Writer::new(&mut buf);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    writer
        .create_element(root_element)
        .with_attribute(("xmlns", S3_NAMESPACE))
        .write_inner_content(|w| value.serialize_xml(w))?;

    Ok(buf)
}

/// Format a timestamp as ISO 8601 with milliseconds and a `Z` suffix.
#[must_use]
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

// ---------------------------------------------------------------------------
// Helper functions for writing common XML patterns
// ---------------------------------------------------------------------------

fn write_text_element<W: Write>(writer: &mut Writer<W>, tag: &str, text: &str) -> io::Result<()> {
    writer
        .create_element(tag)
        .write_text_content(BytesText::new(text))?;
    Ok(())
}

fn write_optional_text<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    value: Option<&str>,
) -> io::Result<()> {
    if let Some(v) = value {
        write_text_element(writer, tag, v)?;
    }
    Ok(())
}

fn write_bool<W: Write>(writer: &mut Writer<W>, tag: &str, value: bool) -> io::Result<()> {
    write_text_element(writer, tag, if value { "true" } else { "false" })
}

fn write_number<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    value: impl ToString,
) -> io::Result<()> {
    write_text_element(writer, tag, &value.to_string())
}

fn write_timestamp<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    value: &DateTime<Utc>,
) -> io::Result<()> {
    write_text_element(writer, tag, &format_timestamp(value))
}

fn write_common_prefixes<W: Write>(writer: &mut Writer<W>, prefixes: &[String]) -> io::Result<()> {
    for prefix in prefixes {
        writer
            .create_element("CommonPrefixes")
            .write_inner_content(|w| write_text_element(w, "Prefix", prefix))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Bucket configuration bodies
// ---------------------------------------------------------------------------

impl S3Serialize for Tagging {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        writer.create_element("TagSet").write_inner_content(|w| {
            for tag in self.tags() {
                w.create_element("Tag").write_inner_content(|w| {
                    write_text_element(w, "Key", &tag.key)?;
                    write_text_element(w, "Value", &tag.value)
                })?;
            }
            Ok(())
        })?;
        Ok(())
    }
}

impl S3Serialize for VersioningConfiguration {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_optional_text(writer, "Status", self.status.map(|s| s.as_str()))
    }
}

impl S3Serialize for PublicAccessBlockConfiguration {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_bool(writer, "BlockPublicAcls", self.block_public_acls)?;
        write_bool(writer, "IgnorePublicAcls", self.ignore_public_acls)?;
        write_bool(writer, "BlockPublicPolicy", self.block_public_policy)?;
        write_bool(writer, "RestrictPublicBuckets", self.restrict_public_buckets)
    }
}

impl S3Serialize for CreateBucketConfiguration {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_optional_text(
            writer,
            "LocationConstraint",
            self.location_constraint.as_deref(),
        )
    }
}

impl S3Serialize for ObjectLockConfiguration {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        if self.enabled {
            write_text_element(writer, "ObjectLockEnabled", "Enabled")?;
        }
        if let Some(rule) = &self.default_retention {
            writer.create_element("Rule").write_inner_content(|w| {
                w.create_element("DefaultRetention")
                    .write_inner_content(|w| {
                        write_text_element(w, "Mode", rule.mode().as_str())?;
                        match rule {
                            DefaultRetention::Days { days, .. } => write_number(w, "Days", days),
                            DefaultRetention::Years { years, .. } => {
                                write_number(w, "Years", years)
                            }
                        }
                    })?;
                Ok(())
            })?;
        }
        Ok(())
    }
}

impl S3Serialize for ObjectRetention {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        if let Some(retention) = &self.retention {
            write_text_element(writer, "Mode", retention.mode.as_str())?;
            write_timestamp(writer, "RetainUntilDate", &retention.retain_until)?;
        }
        Ok(())
    }
}

impl S3Serialize for LegalHold {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "Status", if self.enabled { "ON" } else { "OFF" })
    }
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

impl S3Serialize for CompleteMultipartUpload {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        for part in &self.parts {
            writer.create_element("Part").write_inner_content(|w| {
                write_number(w, "PartNumber", part.part_number)?;
                write_text_element(w, "ETag", &part.etag)
            })?;
        }
        Ok(())
    }
}

impl S3Serialize for DeleteRequest {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        if self.quiet {
            write_bool(writer, "Quiet", true)?;
        }
        for object in &self.objects {
            writer.create_element("Object").write_inner_content(|w| {
                write_text_element(w, "Key", &object.key)?;
                write_optional_text(w, "VersionId", object.version_id.as_deref())?;
                write_optional_text(w, "ETag", object.etag.as_deref())
            })?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

impl S3Serialize for CreateMultipartUploadOutput {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "Bucket", &self.bucket)?;
        write_text_element(writer, "Key", &self.key)?;
        write_text_element(writer, "UploadId", &self.upload_id)
    }
}

impl S3Serialize for CompleteMultipartUploadOutput {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_optional_text(writer, "Location", self.location.as_deref())?;
        write_text_element(writer, "Bucket", &self.bucket)?;
        write_text_element(writer, "Key", &self.key)?;
        write_text_element(writer, "ETag", &self.etag)
    }
}

impl S3Serialize for CopyPartResult {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "ETag", &self.etag)?;
        write_timestamp(writer, "LastModified", &self.last_modified)
    }
}

impl S3Serialize for DeleteObjectsBatchResult {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        for deleted in &self.deleted {
            writer.create_element("Deleted").write_inner_content(|w| {
                write_text_element(w, "Key", &deleted.key)?;
                write_optional_text(w, "VersionId", deleted.version_id.as_deref())?;
                if deleted.delete_marker {
                    write_bool(w, "DeleteMarker", true)?;
                }
                write_optional_text(
                    w,
                    "DeleteMarkerVersionId",
                    deleted.delete_marker_version_id.as_deref(),
                )
            })?;
        }
        for error in &self.errors {
            writer.create_element("Error").write_inner_content(|w| {
                write_text_element(w, "Key", &error.key)?;
                write_optional_text(w, "VersionId", error.version_id.as_deref())?;
                write_text_element(w, "Code", &error.code)?;
                write_text_element(w, "Message", &error.message)
            })?;
        }
        Ok(())
    }
}

impl S3Serialize for ListBucketsOutput {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        writer.create_element("Buckets").write_inner_content(|w| {
            for bucket in &self.buckets {
                w.create_element("Bucket").write_inner_content(|w| {
                    write_text_element(w, "Name", &bucket.name)?;
                    write_timestamp(w, "CreationDate", &bucket.creation_date)?;
                    write_optional_text(w, "BucketRegion", bucket.region.as_deref())
                })?;
            }
            Ok(())
        })?;
        write_optional_text(writer, "ContinuationToken", self.continuation_token.as_deref())?;
        write_optional_text(writer, "Prefix", self.prefix.as_deref())
    }
}

fn write_object_entry<W: Write>(writer: &mut Writer<W>, object: &S3Object) -> io::Result<()> {
    writer.create_element("Contents").write_inner_content(|w| {
        write_text_element(w, "Key", &object.key)?;
        write_timestamp(w, "LastModified", &object.last_modified)?;
        write_text_element(w, "ETag", &object.etag)?;
        write_number(w, "Size", object.size)?;
        write_optional_text(w, "StorageClass", object.storage_class.as_deref())
    })?;
    Ok(())
}

impl S3Serialize for ListObjectsV2Output {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "Name", &self.name)?;
        write_optional_text(writer, "Prefix", self.prefix.as_deref())?;
        write_optional_text(writer, "Delimiter", self.delimiter.as_deref())?;
        write_optional_text(writer, "StartAfter", self.start_after.as_deref())?;
        write_number(writer, "MaxKeys", self.max_keys)?;
        write_number(writer, "KeyCount", self.key_count)?;
        write_bool(writer, "IsTruncated", self.is_truncated)?;
        write_optional_text(writer, "ContinuationToken", self.continuation_token.as_deref())?;
        write_optional_text(
            writer,
            "NextContinuationToken",
            self.next_continuation_token.as_deref(),
        )?;
        for object in &self.contents {
            write_object_entry(writer, object)?;
        }
        write_common_prefixes(writer, &self.common_prefixes)
    }
}

impl S3Serialize for ListObjectVersionsOutput {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "Name", &self.name)?;
        write_optional_text(writer, "Prefix", self.prefix.as_deref())?;
        write_optional_text(writer, "Delimiter", self.delimiter.as_deref())?;
        write_optional_text(writer, "KeyMarker", self.key_marker.as_deref())?;
        write_optional_text(writer, "VersionIdMarker", self.version_id_marker.as_deref())?;
        write_optional_text(writer, "NextKeyMarker", self.next_key_marker.as_deref())?;
        write_optional_text(
            writer,
            "NextVersionIdMarker",
            self.next_version_id_marker.as_deref(),
        )?;
        write_number(writer, "MaxKeys", self.max_keys)?;
        write_bool(writer, "IsTruncated", self.is_truncated)?;
        for version in &self.versions {
            let tag = if version.delete_marker {
                "DeleteMarker"
            } else {
                "Version"
            };
            writer.create_element(tag).write_inner_content(|w| {
                write_text_element(w, "Key", &version.key)?;
                write_text_element(w, "VersionId", &version.version_id)?;
                write_bool(w, "IsLatest", version.is_latest)?;
                write_timestamp(w, "LastModified", &version.last_modified)?;
                if !version.delete_marker {
                    write_optional_text(w, "ETag", version.etag.as_deref())?;
                    write_number(w, "Size", version.size)?;
                    write_optional_text(w, "StorageClass", version.storage_class.as_deref())?;
                }
                Ok(())
            })?;
        }
        write_common_prefixes(writer, &self.common_prefixes)
    }
}

impl S3Serialize for ListMultipartUploadsOutput {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "Bucket", &self.bucket)?;
        write_optional_text(writer, "KeyMarker", self.key_marker.as_deref())?;
        write_optional_text(writer, "UploadIdMarker", self.upload_id_marker.as_deref())?;
        write_optional_text(writer, "NextKeyMarker", self.next_key_marker.as_deref())?;
        write_optional_text(
            writer,
            "NextUploadIdMarker",
            self.next_upload_id_marker.as_deref(),
        )?;
        write_optional_text(writer, "Prefix", self.prefix.as_deref())?;
        write_optional_text(writer, "Delimiter", self.delimiter.as_deref())?;
        write_number(writer, "MaxUploads", self.max_uploads)?;
        write_bool(writer, "IsTruncated", self.is_truncated)?;
        for upload in &self.uploads {
            writer.create_element("Upload").write_inner_content(|w| {
                write_text_element(w, "Key", &upload.key)?;
                write_text_element(w, "UploadId", &upload.upload_id)?;
                write_timestamp(w, "Initiated", &upload.initiated)
            })?;
        }
        write_common_prefixes(writer, &self.common_prefixes)
    }
}

impl S3Serialize for ListPartsOutput {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "Bucket", &self.bucket)?;
        write_text_element(writer, "Key", &self.key)?;
        write_text_element(writer, "UploadId", &self.upload_id)?;
        if let Some(marker) = self.part_number_marker {
            write_number(writer, "PartNumberMarker", marker)?;
        }
        if let Some(marker) = self.next_part_number_marker {
            write_number(writer, "NextPartNumberMarker", marker)?;
        }
        write_number(writer, "MaxParts", self.max_parts)?;
        write_bool(writer, "IsTruncated", self.is_truncated)?;
        for part in &self.parts {
            writer.create_element("Part").write_inner_content(|w| {
                write_number(w, "PartNumber", part.part_number)?;
                if let Some(last_modified) = &part.last_modified {
                    write_timestamp(w, "LastModified", last_modified)?;
                }
                write_text_element(w, "ETag", &part.etag)?;
                if let Some(size) = part.size {
                    write_number(w, "Size", size)?;
                }
                Ok(())
            })?;
        }
        Ok(())
    }
}
