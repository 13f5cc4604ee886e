//! Wire codec for a BPv6 bundle: the primary block, custody transfer
//! enhancement block (CTEB), bundle integrity block (BIB), and payload
//! block, built on a self-delimiting numeric value (SDNV) codec.
//!
//! This crate is the pure, stateless half of the engine: it knows how to
//! lay bytes down and read them back, and nothing about storage, clocks,
//! or custody bookkeeping. See `bpv6-engine` for the send/receive state
//! machine and the active bundle table built on top of this codec.

pub mod block;
pub mod builder;
pub mod crc;
pub mod eid;
pub mod error;
pub mod field;
pub mod flags;
pub mod sdnv;

pub use error::Error;
pub use eid::Eid;
pub use field::Field;

/// Epoch used by bundle creation timestamps: 2000-01-01 00:00:00 UTC.
pub const EPOCH_2000: time::OffsetDateTime = time::macros::datetime!(2000-01-01 00:00:00 UTC);

/// Sentinel creation time meaning "no accurate clock at the source".
pub const UNKNOWN_CREATION_TIME: u64 = 0;

/// Sentinel creation time requesting a best-effort time-to-live extension
/// rather than a real expiration.
pub const TTL_CREATION_TIME: u64 = u64::MAX;

/// Lifetime substituted when the local clock is unreliable, chosen large
/// enough that a receiver with a working clock won't prematurely expire
/// the bundle.
pub const BEST_EFFORT_LIFETIME: u64 = 60 * 60 * 24 * 365;

/// Largest value representable in a `bp_val_t`-equivalent field; used as a
/// saturating ceiling when an expiration-time computation overflows.
pub const MAX_ENCODED_VALUE: u64 = u64::MAX;

/// Maximum size of a bundle's in-memory header buffer.
pub const BUNDLE_HDR_BUF_SIZE: usize = 128;
