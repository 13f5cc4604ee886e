//! Bundle builder: lays down the primary block, optional CTEB,
//! optional BIB, any forwarded extension blocks, and reserves the payload
//! block's position, into a fixed-size header buffer.

use crate::block::{bib, cteb, primary};
use crate::crc::CrcType;
use crate::eid::Eid;
use crate::error::Error;
use crate::flags::{BlockFlags, ProcessingControlFlags};
use crate::{BUNDLE_HDR_BUF_SIZE, UNKNOWN_CREATION_TIME};

/// Source/destination/report-to endpoints for a bundle about to be sent.
#[derive(Debug, Clone, Copy)]
pub struct Route {
    /// Local source endpoint.
    pub source: Eid,
    /// Destination endpoint.
    pub destination: Eid,
    /// Report-to endpoint (status reports), often equal to `source`.
    pub report_to: Eid,
}

/// Per-bundle policy, the Rust-side counterpart of the bundle-in-flight
/// record's attribute set.
#[derive(Debug, Clone, Copy)]
pub struct Attributes {
    /// Bundle lifetime in seconds.
    pub lifetime: u64,
    /// 3-bit class-of-service value.
    pub class_of_service: u8,
    /// `Some(kind)` to emit a BIB secured with `kind`; `None` to omit it.
    pub integrity_check: Option<CrcType>,
    /// Maximum total bundle size (header + payload) this route will carry.
    pub max_bundle_length: usize,
    /// Whether this bundle may be fragmented if it doesn't fit.
    pub allow_fragmentation: bool,
    /// Whether custody transfer is requested (emits a CTEB).
    pub request_custody: bool,
    /// Skip expiration checks on receipt (diagnostics / testing).
    pub ignore_expiration: bool,
    /// This bundle's payload is an administrative record.
    pub admin_record: bool,
}

/// The assembled, not-yet-sent header for one bundle, with enough
/// bookkeeping to rewrite selected fields later without relaying anything.
#[derive(Debug, Clone)]
pub struct BundleHeader {
    /// The header bytes laid down so far (primary, CTEB, BIB, forwarded
    /// extensions); the payload block header follows at `pay_offset`.
    pub buf: [u8; BUNDLE_HDR_BUF_SIZE],
    /// Length of the header written into `buf` so far, up to `pay_offset`.
    pub header_len: usize,
    /// `true` if creation time and sequence still need to be filled in
    /// at send time (a freshly originated bundle); `false` when this
    /// header was seeded from a received bundle's primary block
    /// (forwarding path).
    pub prebuilt: bool,
    /// Offsets of the primary block's rewritable fields.
    pub primary_layout: primary::Layout,
    /// Byte offset of the CTEB, or 0 if custody was not requested.
    pub cteb_offset: usize,
    /// Offsets of the CTEB's rewritable fields, if present.
    pub cteb_layout: Option<cteb::Layout>,
    /// Byte offset of the BIB, or 0 if integrity-check was not requested.
    pub bib_offset: usize,
    /// Offsets of the BIB's rewritable fields, if present.
    pub bib_layout: Option<bib::Layout>,
    /// Which CRC the BIB (if any) is keyed on.
    pub cipher_suite: Option<CrcType>,
    /// Byte offset at which the payload block header belongs.
    pub pay_offset: usize,
}

/// Builds a bundle header.
///
/// `pri_override`, when given, is a primary block copied verbatim from a
/// received bundle (the forwarding path) — in that case `prebuilt` is
/// `false`, since creation time/sequence are already set. Otherwise the
/// primary block is seeded from `route`/`attributes` and `prebuilt` is
/// `true`. `forwarded_header` is the exclusion-complement slice of an
/// inbound bundle's extension blocks being carried across a forwarding
/// hop (empty when none).
pub fn build(
    route: &Route,
    attributes: &Attributes,
    pri_override: Option<primary::PrimaryBlock>,
    forwarded_header: &[u8],
) -> Result<BundleHeader, Error> {
    let mut buf = [0u8; BUNDLE_HDR_BUF_SIZE];

    let (primary_block, prebuilt) = match pri_override {
        Some(pri) => (pri, false),
        None => {
            let mut pcf = ProcessingControlFlags::empty().with_class_of_service(
                attributes.class_of_service,
            );
            if attributes.request_custody {
                pcf |= ProcessingControlFlags::CUSTODY_REQUESTED;
            }
            if attributes.allow_fragmentation {
                pcf |= ProcessingControlFlags::FRAGMENTATION_ALLOWED;
            }
            if attributes.admin_record {
                pcf |= ProcessingControlFlags::IS_ADMIN_RECORD;
            }
            (
                primary::PrimaryBlock {
                    version: 6,
                    pcf,
                    blklen: 0,
                    destination: route.destination,
                    source: route.source,
                    report_to: route.report_to,
                    custodian: route.source,
                    creation_time: UNKNOWN_CREATION_TIME,
                    creation_seq: 0,
                    lifetime: attributes.lifetime,
                    frag_offset: 0,
                    payload_len: 0,
                },
                true,
            )
        }
    };

    let (pri_len, primary_layout) = primary::write_canonical(&mut buf, &primary_block)?;
    let mut idx = pri_len;

    let mut cteb_offset = 0;
    let mut cteb_layout = None;
    if attributes.request_custody {
        cteb_offset = idx;
        let cteb_block = cteb::CtebBlock {
            flags: BlockFlags::empty(),
            custody_id: 0,
            custodian: primary_block.custodian,
        };
        if idx >= buf.len() {
            return Err(Error::BundleTooLarge(idx, BUNDLE_HDR_BUF_SIZE));
        }
        let (len, layout) = cteb::write_canonical(&mut buf, idx, &cteb_block, 8)?;
        idx += len;
        cteb_layout = Some(layout);
    }

    let mut bib_offset = 0;
    let mut bib_layout = None;
    if let Some(cipher_suite) = attributes.integrity_check {
        bib_offset = idx;
        let bib_block = bib::BibBlock {
            flags: BlockFlags::empty(),
            cipher_suite: bib::CrcTypeWire(cipher_suite),
            result: vec![0u8; cipher_suite.byte_len()],
        };
        if idx >= buf.len() {
            return Err(Error::BundleTooLarge(idx, BUNDLE_HDR_BUF_SIZE));
        }
        let (len, layout) = bib::write_canonical(&mut buf, idx, &bib_block)?;
        idx += len;
        bib_layout = Some(layout);
    }

    let fwd_end = idx + forwarded_header.len();
    if fwd_end > buf.len() {
        return Err(Error::BundleTooLarge(fwd_end, BUNDLE_HDR_BUF_SIZE));
    }
    buf[idx..fwd_end].copy_from_slice(forwarded_header);
    idx = fwd_end;

    let pay_offset = idx;

    Ok(BundleHeader {
        buf,
        header_len: idx,
        prebuilt,
        primary_layout,
        cteb_offset,
        cteb_layout,
        bib_offset,
        bib_layout,
        cipher_suite: attributes.integrity_check,
        pay_offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::primary::offset as pri_offset;

    fn route() -> Route {
        Route {
            source: Eid::new(1, 1),
            destination: Eid::new(2, 1),
            report_to: Eid::new(1, 1),
        }
    }

    fn base_attrs() -> Attributes {
        Attributes {
            lifetime: 3600,
            class_of_service: 0,
            integrity_check: None,
            max_bundle_length: 1024,
            allow_fragmentation: false,
            request_custody: false,
            ignore_expiration: false,
            admin_record: false,
        }
    }

    #[test]
    fn plain_bundle_header_is_primary_only() {
        let header = build(&route(), &base_attrs(), None, &[]).unwrap();
        assert_eq!(header.header_len, pri_offset::CANONICAL_LEN);
        assert_eq!(header.pay_offset, pri_offset::CANONICAL_LEN);
        assert_eq!(header.cteb_offset, 0);
        assert_eq!(header.bib_offset, 0);
        assert!(header.prebuilt);
    }

    #[test]
    fn custody_and_integrity_add_cteb_then_bib() {
        let mut attrs = base_attrs();
        attrs.request_custody = true;
        attrs.integrity_check = Some(CrcType::Crc16X25);
        let header = build(&route(), &attrs, None, &[]).unwrap();
        assert_eq!(header.cteb_offset, pri_offset::CANONICAL_LEN);
        assert!(header.bib_offset > header.cteb_offset);
        assert!(header.pay_offset > header.bib_offset);
    }

    #[test]
    fn oversized_header_fails() {
        let attrs = base_attrs();
        let huge = vec![0u8; BUNDLE_HDR_BUF_SIZE];
        let err = build(&route(), &attrs, None, &huge).unwrap_err();
        assert!(matches!(err, Error::BundleTooLarge(..)));
    }
}
