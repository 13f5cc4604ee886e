//! The send/receive state machine, active bundle table, and DACS codec
//! built on top of the `bpv6` wire codec and the `bpv6-rt`/`bpv6-core`
//! collaborators.

pub mod cbuf;
pub mod dacs;
pub mod error;
pub mod receive;
pub mod send;

pub use cbuf::{ActiveBundle, CbufError, CircularBundleTable};
pub use error::{CustodyInfo, Disposition, Error};
