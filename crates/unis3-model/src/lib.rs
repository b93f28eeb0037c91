//! Data model for the unis3 S3-compatible client.
//!
//! This crate holds the types shared by every other unis3 crate:
//!
//! - [`error`]: the unified [`ErrorKind`] taxonomy and the [`S3Error`] value
//!   every fallible operation returns.
//! - [`types`]: buckets, objects, versions, parts, uploads, object-lock and
//!   tagging values.
//! - [`input`]: per-operation option structs, validated before any I/O.
//! - [`output`]: per-operation results, including the list result shapes
//!   used on the wire.

pub mod error;
pub mod input;
pub mod output;
pub mod types;

pub use error::{ErrorFamily, ErrorKind, S3Error, S3Result, VendorErrorBody};
