//! The storage collaborator: `create` is called once per fragment
//! produced by the send path; `delete` is called once per CID
//! acknowledged by an incoming ACS.

use async_trait::async_trait;
use thiserror::Error;

use crate::StorageId;

/// How long a blocking storage call should wait, mirroring
/// `bpv6_rt::lock::Timeout`'s `-1`/`0`/`n` encoding. Duplicated here
/// rather than depending on `bpv6-rt` so a storage backend crate can
/// depend on just this trait crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Return immediately if the call can't complete.
    Immediate,
    /// Block until the call completes.
    Forever,
    /// Block for at most this many milliseconds.
    Millis(u64),
}

/// Errors a storage backend can report back to the engine.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The backend rejected the write (disk full, queue full, I/O error).
    #[error("storage backend rejected the write: {0}")]
    WriteFailed(String),
    /// `delete` was asked to remove a CID the backend doesn't have.
    #[error("storage backend has no record for the given id")]
    NotFound,
    /// The call did not complete within its timeout.
    #[error("storage call timed out")]
    Timeout,
}

/// A place to put bundle fragments and to reclaim them once
/// custody-acknowledged. One fragment (administrative record or payload
/// fragment) per [`Storage::create`] call.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Stores `bytes` (a complete bundle fragment, header included).
    /// `is_record` marks an administrative-record bundle (ACS, status)
    /// rather than an application payload. Returns an opaque id the
    /// engine can later pass to [`Storage::delete`].
    async fn create(
        &self,
        is_record: bool,
        bytes: &[u8],
        timeout: Timeout,
    ) -> Result<StorageId, StorageError>;

    /// Removes a previously stored fragment, e.g. once its CID has been
    /// acknowledged by an ACS.
    async fn delete(&self, id: StorageId) -> Result<(), StorageError>;
}
