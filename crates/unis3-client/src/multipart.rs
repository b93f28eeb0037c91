//! Uploads: the payload sources, the single-PUT/multipart decision and the
//! multipart primitives it is built on.
//!
//! In-memory buffers always go up in one PUT. Files and streams larger than
//! [`MULTIPART_THRESHOLD`] are split into parts of the configured part
//! size; if anything fails after the upload was created it is aborted
//! before the error is returned.

use std::fmt;
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::Utc;
use http::Method;
use tracing::{debug, info, warn};
use unis3_core::conditions::ConditionSite;
use unis3_model::input::{CopySource, PutObjectOptions};
use unis3_model::output::{
    CompleteMultipartUploadOutput, CopyPartResult, CreateMultipartUploadOutput, PutObjectOutput,
};
use unis3_model::types::{
    CompletedPart, ConditionSpec, MAX_PART_NUMBER, MIN_PART_SIZE, PartNumber,
};
use unis3_model::{ErrorKind, S3Error, S3Result};
use unis3_xml::wire::CompleteMultipartUpload;

use crate::S3Client;
use crate::ops::{copy_source_header, write_headers};
use crate::request::{header, read_xml, reported_version_id};

/// Files and streams strictly larger than this go multipart.
pub const MULTIPART_THRESHOLD: u64 = MIN_PART_SIZE;

/// The payload of [`S3Client::put_object`].
pub enum UploadSource {
    /// A buffer already in memory; always a single PUT.
    Bytes(Bytes),
    /// A local file, opened when the upload starts.
    File(PathBuf),
    /// A stream with an optional known length.
    Reader(Box<dyn Read + Send>, Option<u64>),
}

impl UploadSource {
    /// A local file.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    /// A stream. Pass `size` when the length is known up front.
    pub fn reader(reader: impl Read + Send + 'static, size: Option<u64>) -> Self {
        Self::Reader(Box::new(reader), size)
    }
}

impl fmt::Debug for UploadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            Self::Reader(_, size) => f.debug_tuple("Reader").field(size).finish(),
        }
    }
}

impl From<Bytes> for UploadSource {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<u8>> for UploadSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for UploadSource {
    fn from(bytes: &'static [u8]) -> Self {
        Self::Bytes(Bytes::from_static(bytes))
    }
}

impl From<String> for UploadSource {
    fn from(text: String) -> Self {
        Self::Bytes(Bytes::from(text))
    }
}

impl From<&'static str> for UploadSource {
    fn from(text: &'static str) -> Self {
        Self::Bytes(Bytes::from_static(text.as_bytes()))
    }
}

fn open_input(path: &Path) -> S3Result<(File, u64)> {
    let file = File::open(path).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => S3Error::with_message(
            ErrorKind::InputFileNotFound,
            format!("{} does not exist", path.display()),
        )
        .with_source(err),
        _ => S3Error::from(err),
    })?;
    let size = file.metadata()?.len();
    Ok((file, size))
}

/// Read up to `limit` bytes; fewer only at end of stream.
fn read_chunk<R: Read>(reader: &mut R, limit: u64) -> io::Result<Vec<u8>> {
    let mut chunk = Vec::with_capacity(usize::try_from(limit).unwrap_or(0));
    reader.take(limit).read_to_end(&mut chunk)?;
    Ok(chunk)
}

fn part_number(index: usize) -> S3Result<PartNumber> {
    PartNumber::new(u32::try_from(index + 1).unwrap_or(u32::MAX))
}

impl S3Client {
    /// Upload an object from any [`UploadSource`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for invalid options, `InputFileNotFound` for a
    /// missing file (before any request), `PreconditionFailed` when a write
    /// condition fails and whatever a part upload or completion raised.
    pub fn put_object(
        &self,
        bucket: &str,
        key: &str,
        source: UploadSource,
        options: &PutObjectOptions,
    ) -> S3Result<PutObjectOutput> {
        options.validate(Utc::now())?;
        match source {
            UploadSource::Bytes(bytes) => self.put_single(bucket, key, bytes, options),
            UploadSource::File(path) => {
                let (file, size) = open_input(&path)?;
                self.put_stream(bucket, key, file, Some(size), options)
            }
            UploadSource::Reader(reader, size) => {
                self.put_stream(bucket, key, reader, size, options)
            }
        }
    }

    /// Upload the file at `path`.
    ///
    /// # Errors
    ///
    /// See [`S3Client::put_object`].
    pub fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        path: impl AsRef<Path>,
        options: &PutObjectOptions,
    ) -> S3Result<PutObjectOutput> {
        self.put_object(
            bucket,
            key,
            UploadSource::file(path.as_ref()),
            options,
        )
    }

    fn put_stream<R: Read>(
        &self,
        bucket: &str,
        key: &str,
        mut reader: R,
        size: Option<u64>,
        options: &PutObjectOptions,
    ) -> S3Result<PutObjectOutput> {
        if let Some(size) = size {
            if size <= MULTIPART_THRESHOLD {
                let body = read_chunk(&mut reader, size)?;
                return self.put_single(bucket, key, Bytes::from(body), options);
            }
            return self.put_multipart(bucket, key, reader, options);
        }

        let window = read_chunk(&mut reader, MULTIPART_THRESHOLD + 1)?;
        if window.len() as u64 <= MULTIPART_THRESHOLD {
            return self.put_single(bucket, key, Bytes::from(window), options);
        }
        self.put_multipart(bucket, key, Cursor::new(window).chain(reader), options)
    }

    fn put_multipart<R: Read>(
        &self,
        bucket: &str,
        key: &str,
        reader: R,
        options: &PutObjectOptions,
    ) -> S3Result<PutObjectOutput> {
        let upload_id = self.create_multipart_upload(bucket, key, options)?.upload_id;
        let uploaded = self.upload_chunks(bucket, key, &upload_id, reader, &options.conditions);
        self.finish_multipart(bucket, key, &upload_id, uploaded)
    }

    fn upload_chunks<R: Read>(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        mut reader: R,
        conditions: &ConditionSpec,
    ) -> S3Result<(CompleteMultipartUploadOutput, usize)> {
        let part_size = self.config().part_size;
        let mut parts = Vec::new();
        loop {
            let chunk = read_chunk(&mut reader, part_size)?;
            if chunk.is_empty() && !parts.is_empty() {
                break;
            }
            let number = part_number(parts.len())?;
            let last = (chunk.len() as u64) < part_size;
            parts.push(self.upload_part(bucket, key, upload_id, number, Bytes::from(chunk))?);
            if last {
                break;
            }
        }
        let output = self.complete_multipart_upload(bucket, key, upload_id, &parts, conditions)?;
        Ok((output, parts.len()))
    }

    /// Log a completed flow, or abort the upload and return the original
    /// error.
    fn finish_multipart(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        result: S3Result<(CompleteMultipartUploadOutput, usize)>,
    ) -> S3Result<PutObjectOutput> {
        match result {
            Ok((output, parts)) => {
                info!(bucket, key, upload_id, parts, "multipart upload completed");
                Ok(PutObjectOutput {
                    etag: output.etag,
                    version_id: output.version_id,
                    parts: u32::try_from(parts).ok(),
                })
            }
            Err(err) => {
                debug!(bucket, key, upload_id, kind = %err.kind(), "aborting multipart upload");
                if let Err(abort_err) = self.abort_multipart_upload(bucket, key, upload_id) {
                    warn!(
                        bucket,
                        key,
                        upload_id,
                        error = %abort_err,
                        "failed to abort multipart upload"
                    );
                }
                Err(err)
            }
        }
    }

    /// Start a multipart upload carrying the object's headers, tags and
    /// lock settings.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for invalid options and `BucketNotFound` for
    /// a missing bucket.
    pub fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        options: &PutObjectOptions,
    ) -> S3Result<CreateMultipartUploadOutput> {
        options.validate(Utc::now())?;
        let request = write_headers(
            self.request(Method::POST).bucket(bucket).key(key),
            options,
        )?
        .flag("uploads");
        let output: CreateMultipartUploadOutput = read_xml(self.send(request)?)?;
        debug!(bucket, key, upload_id = %output.upload_id, "multipart upload created");
        Ok(output)
    }

    /// Upload one part. Parts may be sent concurrently; assembly follows
    /// the part numbers given on completion.
    ///
    /// # Errors
    ///
    /// Returns `UploadNotFound` for an unknown upload.
    pub fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: PartNumber,
        body: Bytes,
    ) -> S3Result<CompletedPart> {
        let size = body.len();
        let request = self
            .request(Method::PUT)
            .bucket(bucket)
            .key(key)
            .not_found(ErrorKind::UploadNotFound)
            .query("partNumber", part_number.to_string())
            .query("uploadId", upload_id)
            .body(body)
            .content_md5();
        let response = self.send(request)?;
        let etag = header(&response, "etag").ok_or_else(|| {
            S3Error::malformed_response(format!("part {part_number} response has no ETag"))
        })?;
        debug!(upload_id, part = %part_number, size, "part uploaded");
        Ok(CompletedPart {
            part_number: part_number.get(),
            etag,
        })
    }

    /// Fill one part from an existing object, optionally only a byte range
    /// of it. Copy-source conditions in `source` apply.
    ///
    /// # Errors
    ///
    /// Returns `UploadNotFound` for an unknown upload, `ObjectNotFound` for
    /// a missing source and `PreconditionFailed` when a source condition
    /// fails.
    pub fn upload_part_copy(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: PartNumber,
        source: &CopySource,
    ) -> S3Result<CompletedPart> {
        let request = self
            .request(Method::PUT)
            .bucket(bucket)
            .key(key)
            .query("partNumber", part_number.to_string())
            .query("uploadId", upload_id)
            .header("x-amz-copy-source", copy_source_header(source, self))
            .optional_header(
                "x-amz-copy-source-range",
                source.range.as_ref().map(|r| r.header_value()),
            )
            .conditions(&source.conditions, ConditionSite::CopySource)?;
        let result: CopyPartResult = read_xml(self.send(request)?)?;
        debug!(upload_id, part = %part_number, source_key = %source.key, "part copied");
        Ok(CompletedPart {
            part_number: part_number.get(),
            etag: result.etag,
        })
    }

    /// Assemble the upload from `parts`, sent in the order given.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPartOrder` for parts out of ascending order,
    /// `InvalidPart` for a part the server never received, `EntityTooSmall`
    /// for a short non-last part and `PreconditionFailed` when a write
    /// condition fails.
    pub fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
        conditions: &ConditionSpec,
    ) -> S3Result<CompleteMultipartUploadOutput> {
        let body = CompleteMultipartUpload {
            parts: parts.to_vec(),
        };
        let request = self
            .request(Method::POST)
            .bucket(bucket)
            .key(key)
            .not_found(ErrorKind::UploadNotFound)
            .query("uploadId", upload_id)
            .conditions(conditions, ConditionSite::Write)?
            .xml_body("CompleteMultipartUpload", &body)?;
        let response = self.send(request)?;
        let version_id = reported_version_id(response.header("x-amz-version-id"), self.dialect());
        let output: CompleteMultipartUploadOutput = read_xml(response)?;
        Ok(CompleteMultipartUploadOutput {
            version_id,
            ..output
        })
    }

    /// Abort an upload, discarding its parts.
    ///
    /// # Errors
    ///
    /// Returns `UploadNotFound` for an unknown upload.
    pub fn abort_multipart_upload(&self, bucket: &str, key: &str, upload_id: &str) -> S3Result<()> {
        let request = self
            .request(Method::DELETE)
            .bucket(bucket)
            .key(key)
            .not_found(ErrorKind::UploadNotFound)
            .query("uploadId", upload_id);
        self.send(request)?;
        debug!(bucket, key, upload_id, "multipart upload aborted");
        Ok(())
    }

    /// Build `bucket`/`key` from ranges of existing objects without
    /// transferring their bytes. Every source but the last must cover at
    /// least 5 MiB.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an empty or oversized source list, and
    /// otherwise what the part copies or completion raised; the upload is
    /// aborted first.
    pub fn compose_object(
        &self,
        bucket: &str,
        key: &str,
        sources: &[CopySource],
        options: &PutObjectOptions,
    ) -> S3Result<PutObjectOutput> {
        if sources.is_empty() || sources.len() > MAX_PART_NUMBER as usize {
            return Err(S3Error::invalid_input(format!(
                "compose takes 1 to {MAX_PART_NUMBER} sources"
            )));
        }
        let upload_id = self.create_multipart_upload(bucket, key, options)?.upload_id;
        let composed = self.copy_parts(bucket, key, &upload_id, sources, &options.conditions);
        self.finish_multipart(bucket, key, &upload_id, composed)
    }

    fn copy_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        sources: &[CopySource],
        conditions: &ConditionSpec,
    ) -> S3Result<(CompleteMultipartUploadOutput, usize)> {
        let mut parts = Vec::with_capacity(sources.len());
        for (index, source) in sources.iter().enumerate() {
            let number = part_number(index)?;
            parts.push(self.upload_part_copy(bucket, key, upload_id, number, source)?);
        }
        let output = self.complete_multipart_upload(bucket, key, upload_id, &parts, conditions)?;
        Ok((output, parts.len()))
    }
}
