//! Object reads: a streaming body, an in-memory buffer, a file or any
//! writer.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;

use bytes::Bytes;
use http::Method;
use tracing::debug;
use unis3_core::conditions::ConditionSite;
use unis3_model::input::GetObjectOptions;
use unis3_model::types::S3Object;
use unis3_model::{ErrorKind, S3Error, S3Result};

use crate::S3Client;
use crate::request::object_from_headers;

/// Metadata plus the streaming body of a GET.
///
/// The body is read from the transport as the caller reads from this
/// value.
pub struct GetObjectOutput {
    /// The object as described by the response headers.
    pub object: S3Object,
    body: Box<dyn Read + Send>,
}

impl fmt::Debug for GetObjectOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GetObjectOutput")
            .field("object", &self.object)
            .finish_non_exhaustive()
    }
}

impl Read for GetObjectOutput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.body.read(buf)
    }
}

impl GetObjectOutput {
    /// Read the rest of the body into memory.
    ///
    /// # Errors
    ///
    /// Returns `LocalIo` if reading the body fails.
    pub fn into_bytes(mut self) -> S3Result<Bytes> {
        let mut buf = Vec::new();
        self.body.read_to_end(&mut buf)?;
        Ok(Bytes::from(buf))
    }

    /// Copy the rest of the body into `sink`, returning the bytes written.
    ///
    /// # Errors
    ///
    /// Returns `LocalIo` if reading the body or writing the sink fails.
    pub fn write_to<W: Write + ?Sized>(mut self, sink: &mut W) -> S3Result<u64> {
        Ok(io::copy(&mut self.body, sink)?)
    }
}

impl S3Client {
    /// Fetch an object, optionally one version or one byte range of it.
    ///
    /// # Errors
    ///
    /// Returns `ObjectNotFound` for a missing key, `InvalidRange` for an
    /// unsatisfiable range, and `NotModified` or `PreconditionFailed` when
    /// a read condition fails.
    pub fn get_object(
        &self,
        bucket: &str,
        key: &str,
        options: &GetObjectOptions,
    ) -> S3Result<GetObjectOutput> {
        let request = self
            .request(Method::GET)
            .bucket(bucket)
            .key(key)
            .version_query(options.version_id.as_deref())
            .optional_header("range", options.range.as_ref().map(|r| r.header_value()))
            .conditions(&options.conditions, ConditionSite::Read)?;
        let response = self.send(request)?;
        let object = object_from_headers(key, &response, self.dialect())?;
        debug!(bucket, key, size = object.size, "get_object started");
        Ok(GetObjectOutput {
            object,
            body: response.body,
        })
    }

    /// Fetch an object into memory.
    ///
    /// # Errors
    ///
    /// See [`S3Client::get_object`].
    pub fn get_object_bytes(
        &self,
        bucket: &str,
        key: &str,
        options: &GetObjectOptions,
    ) -> S3Result<Bytes> {
        self.get_object(bucket, key, options)?.into_bytes()
    }

    /// Stream an object into `writer`.
    ///
    /// # Errors
    ///
    /// See [`S3Client::get_object`]; write failures are `LocalIo`.
    pub fn download_to_writer<W: Write + ?Sized>(
        &self,
        bucket: &str,
        key: &str,
        writer: &mut W,
        options: &GetObjectOptions,
    ) -> S3Result<S3Object> {
        let output = self.get_object(bucket, key, options)?;
        let object = output.object.clone();
        let written = output.write_to(writer)?;
        debug!(bucket, key, written, "download completed");
        Ok(object)
    }

    /// Download an object to `path`.
    ///
    /// Without `overwrite` an existing file is an error raised before any
    /// request. A partially written file is removed on failure.
    ///
    /// # Errors
    ///
    /// Returns `OutputFileExists` when `path` exists and `overwrite` is
    /// false, otherwise see [`S3Client::download_to_writer`].
    pub fn download_object(
        &self,
        bucket: &str,
        key: &str,
        path: impl AsRef<Path>,
        options: &GetObjectOptions,
        overwrite: bool,
    ) -> S3Result<S3Object> {
        let path = path.as_ref();
        if !overwrite && path.exists() {
            return Err(output_exists(path));
        }
        let output = self.get_object(bucket, key, options)?;
        let object = output.object.clone();

        let mut file = open_output(path, overwrite)?;
        let copied = output.write_to(&mut file).and_then(|written| {
            file.sync_all()?;
            Ok(written)
        });
        match copied {
            Ok(written) => {
                debug!(bucket, key, path = %path.display(), written, "download completed");
                Ok(object)
            }
            Err(err) => {
                drop(file);
                if let Err(remove_err) = fs::remove_file(path) {
                    debug!(path = %path.display(), error = %remove_err, "could not remove partial download");
                }
                Err(err)
            }
        }
    }
}

fn output_exists(path: &Path) -> S3Error {
    S3Error::with_message(
        ErrorKind::OutputFileExists,
        format!("{} already exists", path.display()),
    )
}

fn open_output(path: &Path, overwrite: bool) -> S3Result<File> {
    let mut options = OpenOptions::new();
    options.write(true);
    if overwrite {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }
    options.open(path).map_err(|err| match err.kind() {
        io::ErrorKind::AlreadyExists => output_exists(path),
        _ => S3Error::from(err),
    })
}
