//! ETag computation and `Content-MD5` validation.

use base64::Engine;
use md5::{Digest, Md5};
use unis3_model::{ErrorKind, S3Error, S3Result};

/// Hex-encoded MD5 of `data`.
///
/// ```
/// use unis3_memory::checksums::compute_md5;
///
/// assert_eq!(compute_md5(b"hello"), "5d41402abc4b2a76b9719d911017c592");
/// ```
#[must_use]
pub fn compute_md5(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

/// Quoted MD5 ETag of a single-part object.
#[must_use]
pub fn compute_etag(data: &[u8]) -> String {
    format!("\"{}\"", compute_md5(data))
}

/// Composite ETag of a multipart object: the MD5 of the concatenated binary
/// part digests, suffixed with the part count.
#[must_use]
pub fn compute_multipart_etag(part_etags: &[impl AsRef<str>]) -> String {
    let mut combined = Vec::with_capacity(part_etags.len() * 16);
    for etag in part_etags {
        let hex_str = etag.as_ref().trim_matches('"');
        if let Ok(bytes) = hex::decode(hex_str) {
            combined.extend_from_slice(&bytes);
        }
    }
    let digest = hex::encode(Md5::digest(&combined));
    format!("\"{digest}-{}\"", part_etags.len())
}

/// Check a base64 `Content-MD5` header against `body`. No header passes.
///
/// # Errors
///
/// Returns `InvalidArgument` if the header is not base64 or does not match.
pub fn validate_content_md5(content_md5: Option<&str>, body: &[u8]) -> S3Result<()> {
    let Some(expected) = content_md5 else {
        return Ok(());
    };
    let expected = base64::engine::general_purpose::STANDARD
        .decode(expected.trim())
        .map_err(|_| {
            S3Error::with_message(ErrorKind::InvalidArgument, "Content-MD5 is not valid base64")
        })?;
    if Md5::digest(body).as_slice() != expected.as_slice() {
        return Err(S3Error::with_message(
            ErrorKind::InvalidArgument,
            "the Content-MD5 you specified did not match what was received",
        ));
    }
    Ok(())
}
