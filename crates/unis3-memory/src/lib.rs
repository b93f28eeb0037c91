//! In-memory S3-compatible server for unis3.
//!
//! [`MemoryServer`] implements [`unis3_core::Transport`], so an
//! `S3Client` can talk to it exactly as it would to a real endpoint: every
//! request is signed, verified, routed and answered with vendor-shaped XML.
//! It speaks one vendor dialect at a time, which lets the client's
//! per-vendor normalization be exercised without a network.
//!
//! # Architecture
//!
//! ```text
//! Transport::execute
//!        |
//!        v
//! MemoryServer (SigV4 verification, routing, error XML)
//!        |
//!        v
//!   ops::* handlers (one per operation)
//!        |
//!        v
//!   MemoryState (buckets, version stacks, uploads)
//! ```

pub mod checksums;
mod ops;
pub mod router;
mod server;
pub mod state;

pub use server::{DEFAULT_DOMAIN, MemoryServer};
