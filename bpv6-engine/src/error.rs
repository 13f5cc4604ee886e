//! Engine-level error and disposition types: special negative return
//! codes become the variants of [`Disposition`], returned by
//! [`crate::receive::receive_bundle`] on success paths that aren't a
//! flat "delivered"; everything else is a proper [`Error`].

use bpv6::eid::Eid;
use bpv6::flags::EventFlags;
use bpv6_core::Cid;
use thiserror::Error;

/// Fatal outcomes of a send or receive call.
#[derive(Error, Debug)]
pub enum Error {
    /// The wire codec rejected the bundle.
    #[error(transparent)]
    Codec(#[from] bpv6::Error),
    /// The storage collaborator rejected a write.
    #[error(transparent)]
    Storage(#[from] bpv6_core::StorageError),
    /// Custody was requested but the forwarder found no CTEB — only
    /// aggregate custody is supported.
    #[error("custody requested with no CTEB present")]
    CustodyWithoutCteb,
    /// The destination matches the local node but not any local service,
    /// and the service number wasn't the admin-endpoint 0.
    #[error("no local route for service {0}")]
    RouteNeeded(u64),
    /// An unrecognized admin-record type byte that isn't ACS.
    #[error("unrecognized or unsupported admin record type {0:#04x}")]
    UnknownRecord(u8),
    /// The bundle (or one of its blocks) required dropping outright; this
    /// is also how an exhausted exclusion list is reported, carrying
    /// [`EventFlags::NONCOMPLIANT`].
    #[error("bundle dropped: {0:?}")]
    Dropped(EventFlags),
}

/// Custody info exposed to the caller whenever a received bundle is
/// forwarded, accepted locally, or handed to the application, and
/// custody was requested of this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CustodyInfo {
    /// The custody ID assigned by the previous custodian.
    pub cid: Cid,
    /// The previous custodian's node number.
    pub custodian_node: u64,
    /// The previous custodian's service number.
    pub custodian_service: u64,
}

/// The non-fatal outcomes `receive_bundle` can return: named variants in
/// place of negative special-case return codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The bundle is not for this node; it has been rebuilt for
    /// forwarding and handed back in the caller-supplied output bundle.
    PendingForward(Option<CustodyInfo>),
    /// The bundle is for this node's application layer.
    PendingAcceptance(Option<CustodyInfo>),
    /// The bundle is an aggregate custody signal for this node to ingest.
    PendingAcknowledgment { source: Eid },
    /// The bundle has been handed to the application and is awaiting its
    /// disposition (deliver-and-wait semantics).
    PendingApplication,
    /// The bundle's expiration time has already passed.
    PendingExpiration,
}
