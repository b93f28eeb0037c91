//! S3 XML deserialization: parsing S3-compatible XML into unis3 types.
//!
//! [`from_xml`] positions the reader just past the root start tag; each
//! implementation then walks the children of the root with
//! [`for_each_child`]. Unknown elements are skipped so newer vendor fields
//! never break parsing.

use chrono::{DateTime, NaiveDateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::Event;
use unis3_model::input::{DeleteRequest, ObjectIdentifier};
use unis3_model::output::{
    CompleteMultipartUploadOutput, CopyPartResult, CreateMultipartUploadOutput, DeleteError,
    DeleteObjectsBatchResult, DeletedObject, ListBucketsOutput, ListMultipartUploadsOutput,
    ListObjectVersionsOutput, ListObjectsV2Output, ListPartsOutput,
};
use unis3_model::types::{
    Bucket, CompletedPart, DefaultRetention, ObjectLockConfiguration,
    PublicAccessBlockConfiguration, Retention, RetentionMode, S3MultipartUpload, S3Object,
    S3ObjectVersion, S3Part, Tagging, VersioningStatus,
};

use crate::error::XmlError;
use crate::wire::{
    CompleteMultipartUpload, CreateBucketConfiguration, LegalHold, ObjectRetention,
    VersioningConfiguration,
};

/// Trait for deserializing S3 types from XML.
pub trait S3Deserialize: Sized {
    /// Deserialize from the children of an already-opened element.
    ///
    /// # Errors
    ///
    /// Returns `XmlError` if the XML is malformed or a required element is
    /// missing.
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError>;
}

/// Parse a complete XML document into `T`.
///
/// A self-closing root (`<Retention/>`) is treated as a root with no
/// children.
///
/// # Errors
///
/// Returns `XmlError` if the document is not valid XML or does not match `T`.
pub fn from_xml<T: S3Deserialize>(xml: &[u8]) -> Result<T, XmlError> {
    let mut reader = Reader::from_reader(xml);
    loop {
        match reader.read_event()? {
            Event::Start(_) => return T::deserialize_xml(&mut reader),
            Event::Empty(_) => {
                let mut empty = Reader::from_reader(&b"<Empty></Empty>"[..]);
                empty.read_event()?;
                return T::deserialize_xml(&mut empty);
            }
            Event::Eof => return Err(XmlError::MissingElement("root element".to_owned())),
            _ => {}
        }
    }
}

/// Visit each child element of the current element until its end tag.
///
/// `visit` receives the child's local name and returns `false` when it did
/// not consume the child, in which case the child is skipped.
/// Self-closing children are skipped.
pub(crate) fn for_each_child<'a, F>(
    reader: &mut Reader<&'a [u8]>,
    context: &str,
    mut visit: F,
) -> Result<(), XmlError>
where
    F: FnMut(&mut Reader<&'a [u8]>, &str) -> Result<bool, XmlError>,
{
    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let local = e.local_name();
                let name = std::str::from_utf8(local.as_ref())
                    .map_err(|err| XmlError::ParseError(err.to_string()))?;
                if !visit(reader, name)? {
                    reader.read_to_end(e.name())?;
                }
            }
            Event::End(_) => return Ok(()),
            Event::Eof => {
                return Err(XmlError::MissingElement(format!("end of <{context}>")));
            }
            _ => {}
        }
    }
}

/// Read the text content of the current element, consuming its end tag.
pub(crate) fn read_text_content(reader: &mut Reader<&[u8]>) -> Result<String, XmlError> {
    let mut text = String::new();
    loop {
        match reader.read_event()? {
            Event::Text(e) => {
                let raw = e
                    .decode()
                    .map_err(|err| XmlError::ParseError(err.to_string()))?;
                let unescaped = quick_xml::escape::unescape(&raw)
                    .map_err(|err| XmlError::ParseError(err.to_string()))?;
                text.push_str(&unescaped);
            }
            Event::CData(e) => {
                let raw = e
                    .decode()
                    .map_err(|err| XmlError::ParseError(err.to_string()))?;
                text.push_str(&raw);
            }
            Event::GeneralRef(r) => {
                if let Some(ch) = r.resolve_char_ref()? {
                    text.push(ch);
                } else {
                    let name = r
                        .decode()
                        .map_err(|err| XmlError::ParseError(err.to_string()))?;
                    let resolved = quick_xml::escape::resolve_predefined_entity(&name)
                        .ok_or_else(|| {
                            XmlError::ParseError(format!("unknown entity &{name};"))
                        })?;
                    text.push_str(resolved);
                }
            }
            Event::End(_) => return Ok(text),
            Event::Start(e) => {
                return Err(XmlError::UnexpectedElement(
                    String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                ));
            }
            Event::Eof => return Err(XmlError::MissingElement("end of text".to_owned())),
            _ => {}
        }
    }
}

fn required<T>(value: Option<T>, name: &str) -> Result<T, XmlError> {
    value.ok_or_else(|| XmlError::MissingElement(name.to_owned()))
}

fn parse_bool(s: &str) -> Result<bool, XmlError> {
    match s.trim() {
        "true" | "TRUE" | "True" => Ok(true),
        "false" | "FALSE" | "False" => Ok(false),
        other => Err(XmlError::ParseError(format!("invalid boolean: {other}"))),
    }
}

fn parse_u32(s: &str) -> Result<u32, XmlError> {
    s.trim()
        .parse()
        .map_err(|_| XmlError::ParseError(format!("invalid integer: {s}")))
}

fn parse_u64(s: &str) -> Result<u64, XmlError> {
    s.trim()
        .parse()
        .map_err(|_| XmlError::ParseError(format!("invalid integer: {s}")))
}

/// Parse an S3 timestamp; a missing offset is read as UTC.
pub(crate) fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, XmlError> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| XmlError::ParseError(format!("invalid timestamp: {s}")))
}

fn read_bool(reader: &mut Reader<&[u8]>) -> Result<bool, XmlError> {
    parse_bool(&read_text_content(reader)?)
}

fn read_u32(reader: &mut Reader<&[u8]>) -> Result<u32, XmlError> {
    parse_u32(&read_text_content(reader)?)
}

fn read_u64(reader: &mut Reader<&[u8]>) -> Result<u64, XmlError> {
    parse_u64(&read_text_content(reader)?)
}

fn read_timestamp(reader: &mut Reader<&[u8]>) -> Result<DateTime<Utc>, XmlError> {
    parse_timestamp(&read_text_content(reader)?)
}

fn read_mode(reader: &mut Reader<&[u8]>) -> Result<RetentionMode, XmlError> {
    let text = read_text_content(reader)?;
    text.trim()
        .parse()
        .map_err(|_| XmlError::ParseError(format!("invalid retention mode: {text}")))
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

fn read_common_prefix(reader: &mut Reader<&[u8]>, into: &mut Vec<String>) -> Result<(), XmlError> {
    for_each_child(reader, "CommonPrefixes", |reader, name| {
        if name != "Prefix" {
            return Ok(false);
        }
        into.push(read_text_content(reader)?);
        Ok(true)
    })
}

// ---------------------------------------------------------------------------
// Bucket configuration bodies
// ---------------------------------------------------------------------------

impl S3Deserialize for Tagging {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut pairs: Vec<(String, String)> = Vec::new();
        for_each_child(reader, "Tagging", |reader, name| {
            if name != "TagSet" {
                return Ok(false);
            }
            for_each_child(reader, "TagSet", |reader, name| {
                if name != "Tag" {
                    return Ok(false);
                }
                let mut key = None;
                let mut value = String::new();
                for_each_child(reader, "Tag", |reader, name| {
                    match name {
                        "Key" => key = Some(read_text_content(reader)?),
                        "Value" => value = read_text_content(reader)?,
                        _ => return Ok(false),
                    }
                    Ok(true)
                })?;
                pairs.push((required(key, "Key")?, value));
                Ok(true)
            })?;
            Ok(true)
        })?;
        Tagging::new(pairs).map_err(|e| XmlError::ParseError(e.to_string()))
    }
}

impl S3Deserialize for VersioningConfiguration {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut status = None;
        for_each_child(reader, "VersioningConfiguration", |reader, name| {
            if name != "Status" {
                return Ok(false);
            }
            let text = read_text_content(reader)?;
            if !text.trim().is_empty() {
                status = Some(
                    text.trim()
                        .parse::<VersioningStatus>()
                        .map_err(|_| XmlError::ParseError(format!("invalid status: {text}")))?,
                );
            }
            Ok(true)
        })?;
        Ok(Self { status })
    }
}

impl S3Deserialize for PublicAccessBlockConfiguration {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut config = PublicAccessBlockConfiguration::default();
        for_each_child(reader, "PublicAccessBlockConfiguration", |reader, name| {
            match name {
                "BlockPublicAcls" => config.block_public_acls = read_bool(reader)?,
                "IgnorePublicAcls" => config.ignore_public_acls = read_bool(reader)?,
                "BlockPublicPolicy" => config.block_public_policy = read_bool(reader)?,
                "RestrictPublicBuckets" => config.restrict_public_buckets = read_bool(reader)?,
                _ => return Ok(false),
            }
            Ok(true)
        })?;
        Ok(config)
    }
}

impl S3Deserialize for CreateBucketConfiguration {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut config = CreateBucketConfiguration::default();
        for_each_child(reader, "CreateBucketConfiguration", |reader, name| {
            if name != "LocationConstraint" {
                return Ok(false);
            }
            config.location_constraint = non_empty(read_text_content(reader)?);
            Ok(true)
        })?;
        Ok(config)
    }
}

impl S3Deserialize for ObjectLockConfiguration {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut enabled = false;
        let mut rule: Option<(Option<RetentionMode>, Option<u32>, Option<u32>)> = None;
        for_each_child(reader, "ObjectLockConfiguration", |reader, name| {
            match name {
                "ObjectLockEnabled" => enabled = read_text_content(reader)?.trim() == "Enabled",
                "Rule" => for_each_child(reader, "Rule", |reader, name| {
                    if name != "DefaultRetention" {
                        return Ok(false);
                    }
                    let (mut mode, mut days, mut years) = (None, None, None);
                    for_each_child(reader, "DefaultRetention", |reader, name| {
                        match name {
                            "Mode" => mode = Some(read_mode(reader)?),
                            "Days" => days = Some(read_u32(reader)?),
                            "Years" => years = Some(read_u32(reader)?),
                            _ => return Ok(false),
                        }
                        Ok(true)
                    })?;
                    rule = Some((mode, days, years));
                    Ok(true)
                })?,
                _ => return Ok(false),
            }
            Ok(true)
        })?;

        let default_retention = match rule {
            Some((mode, days, years)) => Some(
                DefaultRetention::from_parts(required(mode, "Mode")?, days, years)
                    .map_err(|e| XmlError::ParseError(e.to_string()))?,
            ),
            None => None,
        };
        Ok(Self {
            enabled,
            default_retention,
        })
    }
}

impl S3Deserialize for ObjectRetention {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut mode = None;
        let mut until = None;
        for_each_child(reader, "Retention", |reader, name| {
            match name {
                "Mode" => mode = Some(read_mode(reader)?),
                "RetainUntilDate" => until = Some(read_timestamp(reader)?),
                _ => return Ok(false),
            }
            Ok(true)
        })?;
        let retention = match (mode, until) {
            (None, None) => None,
            (Some(mode), Some(until)) => Some(Retention::new(mode, until)),
            (None, Some(_)) => return Err(XmlError::MissingElement("Mode".to_owned())),
            (Some(_), None) => {
                return Err(XmlError::MissingElement("RetainUntilDate".to_owned()));
            }
        };
        Ok(Self { retention })
    }
}

impl S3Deserialize for LegalHold {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut enabled = None;
        for_each_child(reader, "LegalHold", |reader, name| {
            if name != "Status" {
                return Ok(false);
            }
            let text = read_text_content(reader)?;
            enabled = Some(match text.trim() {
                "ON" => true,
                "OFF" => false,
                other => {
                    return Err(XmlError::ParseError(format!(
                        "invalid legal hold status: {other}"
                    )));
                }
            });
            Ok(true)
        })?;
        Ok(Self {
            enabled: required(enabled, "Status")?,
        })
    }
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

impl S3Deserialize for CompleteMultipartUpload {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut parts = Vec::new();
        for_each_child(reader, "CompleteMultipartUpload", |reader, name| {
            if name != "Part" {
                return Ok(false);
            }
            let (mut number, mut etag) = (None, None);
            for_each_child(reader, "Part", |reader, name| {
                match name {
                    "PartNumber" => number = Some(read_u32(reader)?),
                    "ETag" => etag = Some(read_text_content(reader)?),
                    _ => return Ok(false),
                }
                Ok(true)
            })?;
            parts.push(CompletedPart {
                part_number: required(number, "PartNumber")?,
                etag: required(etag, "ETag")?,
            });
            Ok(true)
        })?;
        Ok(Self { parts })
    }
}

impl S3Deserialize for DeleteRequest {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut request = DeleteRequest::default();
        for_each_child(reader, "Delete", |reader, name| {
            match name {
                "Quiet" => request.quiet = read_bool(reader)?,
                "Object" => {
                    let (mut key, mut version_id, mut etag) = (None, None, None);
                    for_each_child(reader, "Object", |reader, name| {
                        match name {
                            "Key" => key = Some(read_text_content(reader)?),
                            "VersionId" => version_id = non_empty(read_text_content(reader)?),
                            "ETag" => etag = non_empty(read_text_content(reader)?),
                            _ => return Ok(false),
                        }
                        Ok(true)
                    })?;
                    request.objects.push(ObjectIdentifier {
                        key: required(key, "Key")?,
                        version_id,
                        etag,
                    });
                }
                _ => return Ok(false),
            }
            Ok(true)
        })?;
        Ok(request)
    }
}

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

impl S3Deserialize for CreateMultipartUploadOutput {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let (mut bucket, mut key, mut upload_id) = (String::new(), None, None);
        for_each_child(reader, "InitiateMultipartUploadResult", |reader, name| {
            match name {
                "Bucket" => bucket = read_text_content(reader)?,
                "Key" => key = Some(read_text_content(reader)?),
                "UploadId" => upload_id = non_empty(read_text_content(reader)?),
                _ => return Ok(false),
            }
            Ok(true)
        })?;
        Ok(Self {
            bucket,
            key: required(key, "Key")?,
            upload_id: required(upload_id, "UploadId")?,
        })
    }
}

impl S3Deserialize for CompleteMultipartUploadOutput {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut out = CompleteMultipartUploadOutput::default();
        let mut etag = None;
        for_each_child(reader, "CompleteMultipartUploadResult", |reader, name| {
            match name {
                "Location" => out.location = non_empty(read_text_content(reader)?),
                "Bucket" => out.bucket = read_text_content(reader)?,
                "Key" => out.key = read_text_content(reader)?,
                "ETag" => etag = Some(read_text_content(reader)?),
                _ => return Ok(false),
            }
            Ok(true)
        })?;
        out.etag = required(etag, "ETag")?;
        Ok(out)
    }
}

impl S3Deserialize for CopyPartResult {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let (mut etag, mut last_modified) = (None, None);
        for_each_child(reader, "CopyPartResult", |reader, name| {
            match name {
                "ETag" => etag = Some(read_text_content(reader)?),
                "LastModified" => last_modified = Some(read_timestamp(reader)?),
                _ => return Ok(false),
            }
            Ok(true)
        })?;
        Ok(Self {
            etag: required(etag, "ETag")?,
            last_modified: required(last_modified, "LastModified")?,
        })
    }
}

impl S3Deserialize for DeleteObjectsBatchResult {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut result = DeleteObjectsBatchResult::default();
        for_each_child(reader, "DeleteResult", |reader, name| {
            match name {
                "Deleted" => {
                    let mut deleted = DeletedObject::default();
                    for_each_child(reader, "Deleted", |reader, name| {
                        match name {
                            "Key" => deleted.key = read_text_content(reader)?,
                            "VersionId" => {
                                deleted.version_id = non_empty(read_text_content(reader)?);
                            }
                            "DeleteMarker" => deleted.delete_marker = read_bool(reader)?,
                            "DeleteMarkerVersionId" => {
                                deleted.delete_marker_version_id =
                                    non_empty(read_text_content(reader)?);
                            }
                            _ => return Ok(false),
                        }
                        Ok(true)
                    })?;
                    result.deleted.push(deleted);
                }
                "Error" => {
                    let mut error = DeleteError::default();
                    for_each_child(reader, "Error", |reader, name| {
                        match name {
                            "Key" => error.key = read_text_content(reader)?,
                            "VersionId" => {
                                error.version_id = non_empty(read_text_content(reader)?);
                            }
                            "Code" => error.code = read_text_content(reader)?,
                            "Message" => error.message = read_text_content(reader)?,
                            _ => return Ok(false),
                        }
                        Ok(true)
                    })?;
                    result.errors.push(error);
                }
                _ => return Ok(false),
            }
            Ok(true)
        })?;
        Ok(result)
    }
}

fn read_bucket(reader: &mut Reader<&[u8]>) -> Result<Bucket, XmlError> {
    let (mut bucket_name, mut created, mut region) = (None, None, None);
    for_each_child(reader, "Bucket", |reader, name| {
        match name {
            "Name" => bucket_name = Some(read_text_content(reader)?),
            "CreationDate" => created = Some(read_timestamp(reader)?),
            "BucketRegion" => region = non_empty(read_text_content(reader)?),
            _ => return Ok(false),
        }
        Ok(true)
    })?;
    Ok(Bucket {
        name: required(bucket_name, "Name")?,
        creation_date: required(created, "CreationDate")?,
        region,
    })
}

impl S3Deserialize for ListBucketsOutput {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut out = ListBucketsOutput::default();
        for_each_child(reader, "ListAllMyBucketsResult", |reader, name| {
            match name {
                "Buckets" => for_each_child(reader, "Buckets", |reader, name| {
                    if name != "Bucket" {
                        return Ok(false);
                    }
                    out.buckets.push(read_bucket(reader)?);
                    Ok(true)
                })?,
                "ContinuationToken" => {
                    out.continuation_token = non_empty(read_text_content(reader)?);
                }
                "Prefix" => out.prefix = non_empty(read_text_content(reader)?),
                _ => return Ok(false),
            }
            Ok(true)
        })?;
        Ok(out)
    }
}

fn read_object_entry(reader: &mut Reader<&[u8]>) -> Result<S3Object, XmlError> {
    let (mut key, mut last_modified) = (None, None);
    let (mut etag, mut size, mut storage_class) = (String::new(), 0, None);
    for_each_child(reader, "Contents", |reader, name| {
        match name {
            "Key" => key = Some(read_text_content(reader)?),
            "LastModified" => last_modified = Some(read_timestamp(reader)?),
            "ETag" => etag = read_text_content(reader)?,
            "Size" => size = read_u64(reader)?,
            "StorageClass" => storage_class = non_empty(read_text_content(reader)?),
            _ => return Ok(false),
        }
        Ok(true)
    })?;
    Ok(S3Object {
        key: required(key, "Key")?,
        version_id: None,
        size,
        etag,
        last_modified: required(last_modified, "LastModified")?,
        storage_class,
        metadata: None,
        tag_count: None,
        parts_count: None,
        sse: None,
        lock: None,
    })
}

impl S3Deserialize for ListObjectsV2Output {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut out = ListObjectsV2Output::default();
        for_each_child(reader, "ListBucketResult", |reader, name| {
            match name {
                "Name" => out.name = read_text_content(reader)?,
                "Prefix" => out.prefix = non_empty(read_text_content(reader)?),
                "Delimiter" => out.delimiter = non_empty(read_text_content(reader)?),
                "StartAfter" => out.start_after = non_empty(read_text_content(reader)?),
                "MaxKeys" => out.max_keys = read_u32(reader)?,
                "KeyCount" => out.key_count = read_u32(reader)?,
                "IsTruncated" => out.is_truncated = read_bool(reader)?,
                "ContinuationToken" => {
                    out.continuation_token = non_empty(read_text_content(reader)?);
                }
                "NextContinuationToken" => {
                    out.next_continuation_token = non_empty(read_text_content(reader)?);
                }
                "Contents" => out.contents.push(read_object_entry(reader)?),
                "CommonPrefixes" => read_common_prefix(reader, &mut out.common_prefixes)?,
                _ => return Ok(false),
            }
            Ok(true)
        })?;
        Ok(out)
    }
}

fn read_version_entry(
    reader: &mut Reader<&[u8]>,
    delete_marker: bool,
) -> Result<S3ObjectVersion, XmlError> {
    let context = if delete_marker {
        "DeleteMarker"
    } else {
        "Version"
    };
    let (mut key, mut version_id, mut last_modified) = (None, None, None);
    let (mut is_latest, mut size, mut etag, mut storage_class) = (false, 0, None, None);
    for_each_child(reader, context, |reader, name| {
        match name {
            "Key" => key = Some(read_text_content(reader)?),
            "VersionId" => version_id = non_empty(read_text_content(reader)?),
            "IsLatest" => is_latest = read_bool(reader)?,
            "LastModified" => last_modified = Some(read_timestamp(reader)?),
            "ETag" => etag = non_empty(read_text_content(reader)?),
            "Size" => size = read_u64(reader)?,
            "StorageClass" => storage_class = non_empty(read_text_content(reader)?),
            _ => return Ok(false),
        }
        Ok(true)
    })?;
    Ok(S3ObjectVersion {
        key: required(key, "Key")?,
        version_id: version_id.unwrap_or_else(|| "null".to_owned()),
        is_latest,
        size,
        last_modified: required(last_modified, "LastModified")?,
        etag,
        storage_class,
        delete_marker,
    })
}

impl S3Deserialize for ListObjectVersionsOutput {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut out = ListObjectVersionsOutput::default();
        for_each_child(reader, "ListVersionsResult", |reader, name| {
            match name {
                "Name" => out.name = read_text_content(reader)?,
                "Prefix" => out.prefix = non_empty(read_text_content(reader)?),
                "Delimiter" => out.delimiter = non_empty(read_text_content(reader)?),
                "MaxKeys" => out.max_keys = read_u32(reader)?,
                "IsTruncated" => out.is_truncated = read_bool(reader)?,
                "KeyMarker" => out.key_marker = non_empty(read_text_content(reader)?),
                "VersionIdMarker" => {
                    out.version_id_marker = non_empty(read_text_content(reader)?);
                }
                "NextKeyMarker" => out.next_key_marker = non_empty(read_text_content(reader)?),
                "NextVersionIdMarker" => {
                    out.next_version_id_marker = non_empty(read_text_content(reader)?);
                }
                "Version" => out.versions.push(read_version_entry(reader, false)?),
                "DeleteMarker" => out.versions.push(read_version_entry(reader, true)?),
                "CommonPrefixes" => read_common_prefix(reader, &mut out.common_prefixes)?,
                _ => return Ok(false),
            }
            Ok(true)
        })?;
        Ok(out)
    }
}

impl S3Deserialize for ListMultipartUploadsOutput {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut out = ListMultipartUploadsOutput::default();
        for_each_child(reader, "ListMultipartUploadsResult", |reader, name| {
            match name {
                "Bucket" => out.bucket = read_text_content(reader)?,
                "Prefix" => out.prefix = non_empty(read_text_content(reader)?),
                "Delimiter" => out.delimiter = non_empty(read_text_content(reader)?),
                "MaxUploads" => out.max_uploads = read_u32(reader)?,
                "IsTruncated" => out.is_truncated = read_bool(reader)?,
                "KeyMarker" => out.key_marker = non_empty(read_text_content(reader)?),
                "UploadIdMarker" => out.upload_id_marker = non_empty(read_text_content(reader)?),
                "NextKeyMarker" => out.next_key_marker = non_empty(read_text_content(reader)?),
                "NextUploadIdMarker" => {
                    out.next_upload_id_marker = non_empty(read_text_content(reader)?);
                }
                "Upload" => {
                    let (mut key, mut upload_id, mut initiated) = (None, None, None);
                    for_each_child(reader, "Upload", |reader, name| {
                        match name {
                            "Key" => key = Some(read_text_content(reader)?),
                            "UploadId" => upload_id = Some(read_text_content(reader)?),
                            "Initiated" => initiated = Some(read_timestamp(reader)?),
                            _ => return Ok(false),
                        }
                        Ok(true)
                    })?;
                    out.uploads.push(S3MultipartUpload {
                        key: required(key, "Key")?,
                        upload_id: required(upload_id, "UploadId")?,
                        initiated: required(initiated, "Initiated")?,
                    });
                }
                "CommonPrefixes" => read_common_prefix(reader, &mut out.common_prefixes)?,
                _ => return Ok(false),
            }
            Ok(true)
        })?;
        Ok(out)
    }
}

impl S3Deserialize for ListPartsOutput {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut out = ListPartsOutput::default();
        for_each_child(reader, "ListPartsResult", |reader, name| {
            match name {
                "Bucket" => out.bucket = read_text_content(reader)?,
                "Key" => out.key = read_text_content(reader)?,
                "UploadId" => out.upload_id = read_text_content(reader)?,
                "MaxParts" => out.max_parts = read_u32(reader)?,
                "IsTruncated" => out.is_truncated = read_bool(reader)?,
                "PartNumberMarker" => out.part_number_marker = optional_u32(reader)?,
                "NextPartNumberMarker" => out.next_part_number_marker = optional_u32(reader)?,
                "Part" => {
                    let (mut number, mut etag) = (None, None);
                    let (mut size, mut last_modified) = (None, None);
                    for_each_child(reader, "Part", |reader, name| {
                        match name {
                            "PartNumber" => number = Some(read_u32(reader)?),
                            "ETag" => etag = Some(read_text_content(reader)?),
                            "Size" => size = Some(read_u64(reader)?),
                            "LastModified" => last_modified = Some(read_timestamp(reader)?),
                            _ => return Ok(false),
                        }
                        Ok(true)
                    })?;
                    out.parts.push(S3Part {
                        part_number: required(number, "PartNumber")?,
                        etag: required(etag, "ETag")?,
                        size,
                        last_modified,
                    });
                }
                _ => return Ok(false),
            }
            Ok(true)
        })?;
        Ok(out)
    }
}

/// Markers of `0` or an empty element mean "from the start".
fn optional_u32(reader: &mut Reader<&[u8]>) -> Result<Option<u32>, XmlError> {
    let text = read_text_content(reader)?;
    if text.trim().is_empty() {
        return Ok(None);
    }
    let value = parse_u32(&text)?;
    Ok((value > 0).then_some(value))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::serialize::to_xml;

    #[test]
    fn test_should_parse_list_bucket_result() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>photos</Name>
  <Prefix>2024/</Prefix>
  <Delimiter>/</Delimiter>
  <MaxKeys>2</MaxKeys>
  <KeyCount>2</KeyCount>
  <IsTruncated>true</IsTruncated>
  <NextContinuationToken>tok-1</NextContinuationToken>
  <Contents>
    <Key>2024/a b &amp; c.jpg</Key>
    <LastModified>2024-05-01T10:00:00.000Z</LastModified>
    <ETag>&quot;abc&quot;</ETag>
    <Size>42</Size>
    <StorageClass>STANDARD</StorageClass>
    <Owner><ID>x</ID></Owner>
  </Contents>
  <CommonPrefixes><Prefix>2024/raw/</Prefix></CommonPrefixes>
</ListBucketResult>"#;
        let out: ListObjectsV2Output = from_xml(xml).unwrap();
        assert_eq!(out.name, "photos");
        assert_eq!(out.prefix.as_deref(), Some("2024/"));
        assert!(out.is_truncated);
        assert_eq!(out.next_continuation_token.as_deref(), Some("tok-1"));
        assert_eq!(out.contents.len(), 1);
        assert_eq!(out.contents[0].key, "2024/a b & c.jpg");
        assert_eq!(out.contents[0].etag, "\"abc\"");
        assert_eq!(out.contents[0].size, 42);
        assert_eq!(out.common_prefixes, vec!["2024/raw/".to_owned()]);
    }

    #[test]
    fn test_should_keep_version_and_marker_order() {
        let xml = br#"<ListVersionsResult>
  <Name>b</Name>
  <IsTruncated>false</IsTruncated>
  <DeleteMarker><Key>k</Key><VersionId>v3</VersionId><IsLatest>true</IsLatest>
    <LastModified>2024-01-03T00:00:00Z</LastModified></DeleteMarker>
  <Version><Key>k</Key><VersionId>v2</VersionId><IsLatest>false</IsLatest>
    <LastModified>2024-01-02T00:00:00Z</LastModified><ETag>"e"</ETag><Size>3</Size></Version>
</ListVersionsResult>"#;
        let out: ListObjectVersionsOutput = from_xml(xml).unwrap();
        assert_eq!(out.versions.len(), 2);
        assert!(out.versions[0].delete_marker);
        assert!(out.versions[0].is_latest);
        assert_eq!(out.versions[1].version_id, "v2");
        assert_eq!(out.versions[1].size, 3);
    }

    #[test]
    fn test_should_preserve_whitespace_around_entities() {
        let xml = b"<Tagging><TagSet><Tag><Key>a &lt; b</Key><Value> x &#38; y </Value></Tag></TagSet></Tagging>";
        let tagging: Tagging = from_xml(xml).unwrap();
        assert_eq!(tagging.get("a < b"), Some(" x & y "));
    }

    #[test]
    fn test_should_treat_empty_retention_as_clear() {
        let out: ObjectRetention = from_xml(b"<Retention/>").unwrap();
        assert_eq!(out.retention, None);
        assert!(from_xml::<ObjectRetention>(b"<Retention><Mode>GOVERNANCE</Mode></Retention>").is_err());
    }

    #[test]
    fn test_should_reject_lock_rule_with_days_and_years() {
        let xml = b"<ObjectLockConfiguration><ObjectLockEnabled>Enabled</ObjectLockEnabled>\
<Rule><DefaultRetention><Mode>GOVERNANCE</Mode><Days>1</Days><Years>1</Years></DefaultRetention></Rule>\
</ObjectLockConfiguration>";
        assert!(from_xml::<ObjectLockConfiguration>(xml).is_err());
    }

    #[test]
    fn test_should_parse_serialized_lock_configuration() {
        let config = ObjectLockConfiguration::with_default(
            DefaultRetention::days(RetentionMode::Compliance, 30).unwrap(),
        );
        let xml = to_xml("ObjectLockConfiguration", &config).unwrap();
        let parsed: ObjectLockConfiguration = from_xml(&xml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_should_parse_delete_result_with_errors() {
        let xml = br#"<DeleteResult>
  <Deleted><Key>a</Key><DeleteMarker>true</DeleteMarker><DeleteMarkerVersionId>m1</DeleteMarkerVersionId></Deleted>
  <Error><Key>b</Key><Code>AccessDenied</Code><Message>locked</Message></Error>
</DeleteResult>"#;
        let out: DeleteObjectsBatchResult = from_xml(xml).unwrap();
        assert_eq!(out.deleted.len(), 1);
        assert!(out.deleted[0].delete_marker);
        assert_eq!(out.deleted[0].delete_marker_version_id.as_deref(), Some("m1"));
        assert_eq!(out.errors[0].code, "AccessDenied");
    }

    #[test]
    fn test_should_parse_list_parts_markers() {
        let xml = b"<ListPartsResult><Bucket>b</Bucket><Key>k</Key><UploadId>u</UploadId>\
<PartNumberMarker>0</PartNumberMarker><NextPartNumberMarker>2</NextPartNumberMarker>\
<MaxParts>2</MaxParts><IsTruncated>true</IsTruncated>\
<Part><PartNumber>1</PartNumber><ETag>\"a\"</ETag><Size>5</Size></Part>\
<Part><PartNumber>2</PartNumber><ETag>\"b\"</ETag><Size>6</Size></Part>\
</ListPartsResult>";
        let out: ListPartsOutput = from_xml(xml).unwrap();
        assert_eq!(out.part_number_marker, None);
        assert_eq!(out.next_part_number_marker, Some(2));
        assert_eq!(out.parts[1].size, Some(6));
    }

    #[test]
    fn test_should_parse_timestamps_without_fraction_or_zone() {
        let expected = Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 6).unwrap();
        assert_eq!(parse_timestamp("2024-02-03T04:05:06Z").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-02-03T04:05:06.000Z").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-02-03T04:05:06").unwrap(), expected);
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_should_require_legal_hold_status() {
        assert!(from_xml::<LegalHold>(b"<LegalHold></LegalHold>").is_err());
        let hold: LegalHold = from_xml(b"<LegalHold><Status>ON</Status></LegalHold>").unwrap();
        assert!(hold.enabled);
    }
}
