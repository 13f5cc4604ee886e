//! Compressed-EID form: an `ipn` endpoint identifier as a `(node, service)`
//! pair of SDNVs, the only profile this codec supports (dictionary-based
//! EIDs are rejected at parse time — see [`crate::error::Error::DictionaryNotSupported`]).

use core::fmt;

/// An `ipn:node.service` endpoint identifier, compressed as two integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Eid {
    /// The node number.
    pub node: u64,
    /// The service number.
    pub service: u64,
}

impl Eid {
    /// Constructs an EID from its node and service numbers.
    pub const fn new(node: u64, service: u64) -> Self {
        Self { node, service }
    }

    /// The null endpoint, `ipn:0.0`.
    pub const NULL: Eid = Eid::new(0, 0);

    /// Renders the CTEB custodian-EID string form, `"ipn:node.service\0"`.
    pub fn to_cteb_string(self) -> Vec<u8> {
        let mut s = format!("ipn:{}.{}", self.node, self.service).into_bytes();
        s.push(0);
        s
    }

    /// Parses a CTEB custodian-EID string, tolerating a trailing NUL.
    pub fn from_cteb_string(bytes: &[u8]) -> Option<Self> {
        let bytes = bytes.strip_suffix(&[0]).unwrap_or(bytes);
        let s = core::str::from_utf8(bytes).ok()?;
        let rest = s.strip_prefix("ipn:")?;
        let (node, service) = rest.split_once('.')?;
        Some(Eid::new(node.parse().ok()?, service.parse().ok()?))
    }
}

impl fmt::Display for Eid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ipn:{}.{}", self.node, self.service)
    }
}
