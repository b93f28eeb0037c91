//! S3 operations, grouped by resource. Each submodule adds methods to
//! [`crate::S3Client`].

mod bucket;
mod list;
mod lock;
mod object;

pub(crate) use object::{copy_source_header, write_headers};
