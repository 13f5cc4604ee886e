//! Receive path: parses an inbound bundle, classifies it as
//! forward / local-deliver / admin-record, verifies the BIB, computes an
//! exclusion list of bytes that must be stripped before forwarding, and
//! extracts custody info.

use bpv6::block::{bib, cteb, payload, primary, type_byte};
use bpv6::builder::{self, Attributes, BundleHeader, Route};
use bpv6::eid::Eid;
use bpv6::flags::{BlockFlags, EventFlags, ProcessingControlFlags};
use bpv6::field::Field;
use bpv6::sdnv;
use bpv6_core::Cid;
use bpv6_rt::clock::Clock;
use tracing::{debug, trace, warn};

use crate::error::{CustodyInfo, Disposition, Error};
use crate::send::expiration_time;

/// Administrative-record type bytes, chosen as an internal marker set
/// the way PCF and BIB security-result-type bits are.
mod admin_record_type {
    pub const CUSTODY_SIGNAL: u8 = 0x00;
    pub const AGGREGATE_CUSTODY_SIGNAL: u8 = 0x01;
    pub const STATUS_REPORT: u8 = 0x02;
}

/// Maximum exclusion-list entries before a bundle is considered
/// noncompliant (capacity 16, checked at 14 already-used entries to
/// leave headroom for the loop's own PRI/BIB/payload exclusions added
/// up front).
const EXCLUSION_LIST_FULL_AT: usize = 14;

enum Segment {
    Raw(core::ops::Range<usize>),
    CtebPatched(Vec<u8>),
}

/// Parses `buf` in place (unrecognized blocks may have their
/// forwarded-without-processing bit set), returning the disposition and,
/// for the forwarding case, the rebuilt header ready to send onward.
pub fn receive_bundle(
    buf: &mut [u8],
    local_node: u64,
    local_service: u64,
    clock: &impl Clock,
    ignore_expiration: bool,
) -> Result<(Disposition, Option<BundleHeader>), Error> {
    let (pri, pri_len, _pri_layout) = primary::parse(buf)?;

    let exprtime = expiration_time(pri.creation_time, pri.lifetime);
    if !ignore_expiration {
        if let Ok(now) = clock.systime() {
            let sentinel = exprtime == bpv6::UNKNOWN_CREATION_TIME || exprtime == bpv6::TTL_CREATION_TIME;
            if !sentinel && exprtime <= now {
                debug!(exprtime, now, "bundle expired before receipt");
                return Ok((Disposition::PendingExpiration, None));
            }
        }
    }

    let mut segments: Vec<Segment> = Vec::new();
    let mut exclusions: Vec<core::ops::Range<usize>> = vec![0..pri_len];

    let mut cteb: Option<(cteb::CtebBlock, core::ops::Range<usize>)> = None;
    let mut bib_block: Option<bib::BibBlock> = None;
    let mut payload_body: Option<core::ops::Range<usize>> = None;

    let mut idx = pri_len;
    while idx < buf.len() {
        if exclusions.len() >= EXCLUSION_LIST_FULL_AT {
            warn!(used = exclusions.len(), "exclusion list capacity exceeded, dropping bundle");
            return Err(Error::Dropped(EventFlags::NONCOMPLIANT));
        }

        let block_type = buf[idx];
        match block_type {
            t if t == type_byte::BIB => {
                let (block, len, _layout) = bib::parse(buf, idx)?;
                exclusions.push(idx..idx + len);
                bib_block = Some(block);
                idx += len;
            }
            t if t == type_byte::CTEB => {
                let (block, len, _layout) = cteb::parse(buf, idx)?;
                let range = idx..idx + len;
                segments.push(Segment::Raw(range.clone()));
                cteb = Some((block, range));
                idx += len;
            }
            t if t == type_byte::PAY => {
                let (_flags, len, header_len, _layout) = payload::parse_header(buf, idx)?;
                let body_start = idx + header_len;
                let body_end = body_start + len as usize;
                if body_end > buf.len() {
                    return Err(bpv6::Error::BufferTooShort(buf.len()).into());
                }
                exclusions.push(idx..body_end);
                payload_body = Some(body_start..body_end);
                idx = body_end;
                break;
            }
            _ => {
                let mut flags_f = Field::auto(idx + 1);
                let after_flags = sdnv::read(buf, &mut flags_f)?;
                let mut blklen_f = Field::auto(after_flags);
                let after_len = sdnv::read(buf, &mut blklen_f)?;
                let body_end = after_len + blklen_f.value as usize;
                if body_end > buf.len() {
                    return Err(bpv6::Error::BufferTooShort(buf.len()).into());
                }
                let range = idx..body_end;
                let flags = BlockFlags::from_bits_truncate(flags_f.value);

                if flags.contains(BlockFlags::DELETE_BUNDLE_ON_NOPROC) {
                    warn!(block_type, "unrecognized block requires deletion, dropping bundle");
                    return Err(Error::Dropped(EventFlags::DROPPED));
                } else if flags.contains(BlockFlags::DROP_BLOCK_ON_NOPROC) {
                    trace!(block_type, "dropping unrecognized block from forwarded bundle");
                    exclusions.push(range.clone());
                } else {
                    trace!(block_type, "forwarding unrecognized block without processing");
                    let patched = (flags | BlockFlags::FORWARDED_WITHOUT_PROC).bits();
                    let mut patch_field = Field::at(flags_f.index, flags_f.width);
                    patch_field.value = patched;
                    sdnv::write(buf, &mut patch_field)?;
                    segments.push(Segment::Raw(range.clone()));
                }
                idx = body_end;
            }
        }
    }

    if let Some(block) = &bib_block {
        let body = payload_body
            .clone()
            .ok_or_else(|| bpv6::Error::BufferTooShort(buf.len()))?;
        if let Err(e) = bib::verify(block, &buf[body]) {
            warn!(error = %e, "BIB integrity check failed");
            return Err(e.into());
        }
    }

    let custody_requested = pri.pcf.contains(ProcessingControlFlags::CUSTODY_REQUESTED);
    let custody_info = match &cteb {
        Some((block, _)) if custody_requested => Some(CustodyInfo {
            cid: Cid(block.custody_id),
            custodian_node: block.custodian.node,
            custodian_service: block.custodian.service,
        }),
        _ => None,
    };

    let is_local_node = pri.destination.node == local_node;
    let is_admin = pri.pcf.contains(ProcessingControlFlags::IS_ADMIN_RECORD);

    if !is_local_node {
        if custody_requested && cteb.is_none() {
            warn!("custody requested with no CTEB present; only aggregate custody is supported");
            return Err(Error::CustodyWithoutCteb);
        }

        if let Some((ref cteb_block, ref range)) = cteb {
            let patched = cteb::CtebBlock {
                flags: cteb_block.flags,
                custody_id: cteb_block.custody_id,
                custodian: Eid::new(local_node, local_service),
            };
            let mut tmp = vec![0u8; range.len() + 64];
            let (len, _) = cteb::write_canonical(&mut tmp, 0, &patched, 8)?;
            tmp.truncate(len);
            for s in segments.iter_mut() {
                let matches = matches!(s, Segment::Raw(r) if *r == *range);
                if matches {
                    *s = Segment::CtebPatched(tmp.clone());
                }
            }
        }

        let mut forwarded_header = Vec::new();
        for segment in &segments {
            match segment {
                Segment::Raw(range) => forwarded_header.extend_from_slice(&buf[range.clone()]),
                Segment::CtebPatched(bytes) => forwarded_header.extend_from_slice(bytes),
            }
        }

        let mut patched_pri = pri;
        if custody_requested {
            patched_pri.custodian = Eid::new(local_node, local_service);
            patched_pri.report_to = Eid::new(0, 0);
        }

        let route = Route {
            source: pri.source,
            destination: pri.destination,
            report_to: patched_pri.report_to,
        };
        let attributes = Attributes {
            lifetime: pri.lifetime,
            class_of_service: pri.pcf.class_of_service(),
            integrity_check: None,
            max_bundle_length: bpv6::BUNDLE_HDR_BUF_SIZE,
            allow_fragmentation: pri.pcf.contains(ProcessingControlFlags::FRAGMENTATION_ALLOWED),
            request_custody: false,
            ignore_expiration,
            admin_record: is_admin,
        };

        let header = builder::build(&route, &attributes, Some(patched_pri), &forwarded_header)?;
        return Ok((Disposition::PendingForward(custody_info), Some(header)));
    }

    if pri.destination.service != local_service && pri.destination.service != 0 {
        return Err(Error::RouteNeeded(pri.destination.service));
    }

    if is_admin {
        let body = payload_body.ok_or_else(|| bpv6::Error::BufferTooShort(buf.len()))?;
        let record_type = *buf.get(body.start).ok_or(bpv6::Error::BufferTooShort(buf.len()))?;
        return match record_type {
            admin_record_type::AGGREGATE_CUSTODY_SIGNAL => Ok((
                Disposition::PendingAcknowledgment {
                    source: Eid::new(pri.custodian.node, pri.custodian.service),
                },
                None,
            )),
            admin_record_type::CUSTODY_SIGNAL | admin_record_type::STATUS_REPORT => {
                warn!(record_type, "custody signals and status reports are not supported");
                Err(Error::Dropped(EventFlags::NONCOMPLIANT))
            }
            other => {
                warn!(record_type = other, "unrecognized administrative record type");
                Err(Error::UnknownRecord(other))
            }
        };
    }

    Ok((Disposition::PendingAcceptance(custody_info), None))
}
