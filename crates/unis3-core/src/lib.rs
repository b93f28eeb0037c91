//! Vendor-neutral protocol logic for unis3.
//!
//! Everything here is pure: no I/O beyond the [`Transport`] trait, no
//! shared mutable state. Both the client and the in-memory server build on
//! these modules, so a rule is written once and enforced on both sides.
//!
//! - [`conditions`]: precondition headers per operation site, and their
//!   server-side evaluation.
//! - [`pagination`]: cursor shapes and the [`Paginator`] iterator.
//! - [`object_lock`]: retention transitions and version-delete rules.
//! - [`dialect`]: the per-vendor [`Dialect`] table.
//! - [`error`]: translation of responses into [`unis3_model::S3Error`].
//! - [`transport`]: the [`Transport`] seam.

pub mod conditions;
pub mod dialect;
pub mod error;
pub mod object_lock;
pub mod pagination;
pub mod transport;

pub use conditions::{ConditionSite, ObjectState};
pub use dialect::{Dialect, NullVersionId, Provider, UnknownProvider};
pub use error::{TransportError, kind_for_code, translate};
pub use pagination::{
    Cursor, DualCursor, Items, Page, PartNumberCursor, Paginator, TokenCursor,
};
pub use transport::{HttpRequest, HttpResponse, Transport};
