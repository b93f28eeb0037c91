//! Listing handlers: objects (v2), object versions, multipart uploads and
//! parts.
//!
//! Every listing caps its page size at 1000 and reports a resume marker
//! only when more entries remain.

use unis3_core::pagination::take_page;
use unis3_core::transport::HttpResponse;
use unis3_model::{ErrorKind, S3Error, S3Result};
use unis3_model::input::MAX_PAGE_SIZE;
use unis3_model::output::{
    ListMultipartUploadsOutput, ListObjectVersionsOutput, ListObjectsV2Output, ListPartsOutput,
};
use unis3_model::types::S3MultipartUpload;

use super::multipart::upload_id_param;
use super::{RequestContext, Response, decode_continuation_token, encode_continuation_token};
use crate::server::MemoryServer;
use crate::state::{Entry, StoredObject, VersionMarker, covered_by_marker, group_entries};

fn page_size(ctx: &RequestContext, name: &str) -> S3Result<u32> {
    Ok(ctx
        .u32_param(name)?
        .unwrap_or(MAX_PAGE_SIZE)
        .min(MAX_PAGE_SIZE))
}

fn non_empty<'a>(ctx: &'a RequestContext, name: &str) -> Option<&'a str> {
    ctx.param(name).filter(|v| !v.is_empty())
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

impl MemoryServer {
    pub(crate) fn handle_list_objects_v2(&self, ctx: &RequestContext) -> S3Result<HttpResponse> {
        let bucket = self.state.bucket(ctx.bucket()?)?;
        let prefix = ctx.param("prefix").unwrap_or("");
        let delimiter = non_empty(ctx, "delimiter");
        let max_keys = page_size(ctx, "max-keys")?;
        let start_after = non_empty(ctx, "start-after");
        let token = non_empty(ctx, "continuation-token");
        let resume = token.map(decode_continuation_token).transpose()?;
        let after = resume.as_deref().or(start_after);

        let page = bucket
            .objects
            .read()
            .list_objects(prefix, delimiter, after, max_keys as usize);
        let contents: Vec<_> = page.objects.iter().map(StoredObject::to_s3_object).collect();

        let output = ListObjectsV2Output {
            name: bucket.name.clone(),
            prefix: Some(prefix.to_owned()).filter(|p| !p.is_empty()),
            delimiter: delimiter.map(ToOwned::to_owned),
            start_after: start_after.map(ToOwned::to_owned),
            max_keys,
            key_count: count(contents.len() + page.common_prefixes.len()),
            is_truncated: page.next_marker.is_some(),
            continuation_token: token.map(ToOwned::to_owned),
            next_continuation_token: page.next_marker.as_deref().map(encode_continuation_token),
            contents,
            common_prefixes: page.common_prefixes,
        };
        Response::ok().xml("ListBucketResult", &output)
    }

    pub(crate) fn handle_list_object_versions(
        &self,
        ctx: &RequestContext,
    ) -> S3Result<HttpResponse> {
        let bucket = self.state.bucket(ctx.bucket()?)?;
        let prefix = ctx.param("prefix").unwrap_or("");
        let delimiter = non_empty(ctx, "delimiter");
        let max_keys = page_size(ctx, "max-keys")?;
        let key_marker = non_empty(ctx, "key-marker");
        let raw_version_marker = ctx.param("version-id-marker");
        let null_id = self.dialect.null_version();
        // A version marker only means something next to a key marker.
        let version_marker = match (key_marker, raw_version_marker) {
            (Some(_), Some(v)) if v == "null" || v == null_id => Some(None),
            (Some(_), Some(v)) if !v.is_empty() => Some(Some(v)),
            _ => None,
        };

        let page = bucket.objects.read().list_versions(
            prefix,
            delimiter,
            VersionMarker {
                key: key_marker,
                version: version_marker,
            },
            max_keys as usize,
        );

        let output = ListObjectVersionsOutput {
            name: bucket.name.clone(),
            prefix: Some(prefix.to_owned()).filter(|p| !p.is_empty()),
            delimiter: delimiter.map(ToOwned::to_owned),
            max_keys,
            is_truncated: page.next_key_marker.is_some(),
            key_marker: key_marker.map(ToOwned::to_owned),
            version_id_marker: raw_version_marker.map(ToOwned::to_owned),
            next_key_marker: page.next_key_marker,
            next_version_id_marker: page
                .next_version_id_marker
                .map(|v| v.unwrap_or_else(|| null_id.to_owned())),
            versions: page
                .versions
                .iter()
                .map(|(version, is_latest)| version.to_s3_version(*is_latest, null_id))
                .collect(),
            common_prefixes: page.common_prefixes,
        };
        Response::ok().xml("ListVersionsResult", &output)
    }

    /// Uploads sort by key, then initiation time, then upload id.
    pub(crate) fn handle_list_multipart_uploads(
        &self,
        ctx: &RequestContext,
    ) -> S3Result<HttpResponse> {
        let bucket = self.state.bucket(ctx.bucket()?)?;
        let prefix = ctx.param("prefix").unwrap_or("");
        let delimiter = non_empty(ctx, "delimiter");
        let max_uploads = page_size(ctx, "max-uploads")?;
        let key_marker = non_empty(ctx, "key-marker");
        let upload_id_marker = non_empty(ctx, "upload-id-marker");

        let mut uploads: Vec<S3MultipartUpload> = bucket
            .multipart_uploads
            .iter()
            .map(|entry| entry.value().to_s3_upload())
            .collect();
        uploads.sort_by(|a, b| {
            (a.key.as_str(), a.initiated, a.upload_id.as_str())
                .cmp(&(b.key.as_str(), b.initiated, b.upload_id.as_str()))
        });

        let resume_at = key_marker.zip(upload_id_marker).and_then(|(km, um)| {
            uploads
                .iter()
                .position(|u| u.key == km && u.upload_id == um)
                .map(|pos| pos + 1)
        });
        let remaining = uploads
            .iter()
            .enumerate()
            .filter(|(i, u)| match (key_marker, resume_at) {
                (None, _) => true,
                (Some(_), Some(start)) => *i >= start,
                (Some(km), None) => !covered_by_marker(&u.key, km, delimiter),
            })
            .map(|(_, u)| (u.key.as_str(), u));
        let limit = max_uploads as usize;
        let entries = group_entries(remaining, prefix, delimiter, limit);
        let truncated = entries.len() > limit;

        let mut output = ListMultipartUploadsOutput {
            bucket: bucket.name.clone(),
            prefix: Some(prefix.to_owned()).filter(|p| !p.is_empty()),
            delimiter: delimiter.map(ToOwned::to_owned),
            max_uploads,
            is_truncated: false,
            key_marker: key_marker.map(ToOwned::to_owned),
            upload_id_marker: upload_id_marker.map(ToOwned::to_owned),
            next_key_marker: None,
            next_upload_id_marker: None,
            uploads: Vec::new(),
            common_prefixes: Vec::new(),
        };
        let mut last = None;
        for entry in entries.into_iter().take(limit) {
            match entry {
                Entry::Item(upload) => {
                    last = Some((upload.key.clone(), Some(upload.upload_id.clone())));
                    output.uploads.push(upload.clone());
                }
                Entry::Prefix(cp) => {
                    last = Some((cp.clone(), None));
                    output.common_prefixes.push(cp);
                }
            }
        }
        if truncated {
            if let Some((key, upload_id)) = last {
                output.is_truncated = true;
                output.next_key_marker = Some(key);
                output.next_upload_id_marker = upload_id;
            }
        }
        Response::ok().xml("ListMultipartUploadsResult", &output)
    }

    pub(crate) fn handle_list_parts(&self, ctx: &RequestContext) -> S3Result<HttpResponse> {
        let bucket = self.state.bucket(ctx.bucket()?)?;
        let key = ctx.key()?;
        let upload_id = upload_id_param(ctx)?;
        let max_parts = page_size(ctx, "max-parts")?;
        let marker = ctx.u32_param("part-number-marker")?;

        let upload = bucket
            .multipart_uploads
            .get(upload_id)
            .filter(|u| u.key == key)
            .map(|u| u.value().clone())
            .ok_or_else(|| S3Error::new(ErrorKind::UploadNotFound))?;
        let (page, next) = take_page(
            upload.parts.values(),
            marker.as_ref(),
            max_parts as usize,
            |p| p.part_number,
        );

        let output = ListPartsOutput {
            bucket: bucket.name.clone(),
            key: key.to_owned(),
            upload_id: upload_id.to_owned(),
            max_parts,
            is_truncated: next.is_some(),
            part_number_marker: marker,
            next_part_number_marker: next,
            parts: page.into_iter().map(|p| p.to_s3_part()).collect(),
        };
        Response::ok().xml("ListPartsResult", &output)
    }
}
