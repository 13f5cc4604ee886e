//! Primary block (PRI) codec.
//!
//! Canonical layout (offsets in bytes from the block start):
//! `version` 0×1; `pcf` 1×3; `blklen` 4×1; the four endpoint IDs packed
//! contiguously from offset 5 (node×4, service×2 each, 24 bytes total);
//! `createsec` 29×6; `createseq` 35×2; `lifetime` 37×6; `dictlen` 43×1;
//! and, only when the bundle is a fragment, `fragoffset` 44×4 and
//! `paylen` 48×4. This crate always reserves the fragment fields in the
//! canonical layout (width-but-possibly-zero-valued) so a bundle's header
//! can be built once and have its fragment status decided independently at
//! send time, per the bundle-in-flight record's `prebuilt` design.

use crate::eid::Eid;
use crate::error::Error;
use crate::field::Field;
use crate::flags::ProcessingControlFlags;
use crate::sdnv;

/// Byte offsets of the primary block's fixed-width canonical fields.
pub mod offset {
    /// Version byte.
    pub const VERSION: usize = 0;
    /// Processing-control-flags SDNV, fixed width 3.
    pub const PCF: usize = 1;
    /// Block-length SDNV, fixed width 1.
    pub const BLKLEN: usize = 4;
    /// Destination node SDNV, fixed width 4.
    pub const DST_NODE: usize = 5;
    /// Destination service SDNV, fixed width 2.
    pub const DST_SERV: usize = 9;
    /// Source node SDNV, fixed width 4.
    pub const SRC_NODE: usize = 11;
    /// Source service SDNV, fixed width 2.
    pub const SRC_SERV: usize = 15;
    /// Report-to node SDNV, fixed width 4.
    pub const RPT_NODE: usize = 17;
    /// Report-to service SDNV, fixed width 2.
    pub const RPT_SERV: usize = 21;
    /// Custodian node SDNV, fixed width 4.
    pub const CST_NODE: usize = 23;
    /// Custodian service SDNV, fixed width 2.
    pub const CST_SERV: usize = 27;
    /// Creation-time SDNV, fixed width 6 (seconds since 2000-01-01 UTC).
    pub const CREATESEC: usize = 29;
    /// Creation-sequence SDNV, fixed width 2.
    pub const CREATESEQ: usize = 35;
    /// Lifetime SDNV, fixed width 6.
    pub const LIFETIME: usize = 37;
    /// Dictionary-length SDNV, fixed width 1; must always encode 0.
    pub const DICTLEN: usize = 43;
    /// Fragment-offset SDNV, fixed width 4; meaningful iff `IS_FRAGMENT`.
    pub const FRAGOFFSET: usize = 44;
    /// Original-payload-length SDNV, fixed width 4; meaningful iff `IS_FRAGMENT`.
    pub const PAYLEN: usize = 48;
    /// Total canonical length of the primary block.
    pub const CANONICAL_LEN: usize = 52;
}

/// A decoded (or about-to-be-encoded) primary block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimaryBlock {
    /// Protocol version; always 6 for a block this codec accepts.
    pub version: u8,
    /// Processing-control-flags.
    pub pcf: ProcessingControlFlags,
    /// Length of this block, excluding the version byte, as encoded on
    /// the wire (present for parity with the C layout; not otherwise used).
    pub blklen: u64,
    /// Destination endpoint.
    pub destination: Eid,
    /// Source endpoint.
    pub source: Eid,
    /// Report-to endpoint.
    pub report_to: Eid,
    /// Current custodian endpoint.
    pub custodian: Eid,
    /// Creation time, seconds since 2000-01-01 UTC, or
    /// [`crate::UNKNOWN_CREATION_TIME`] / [`crate::TTL_CREATION_TIME`].
    pub creation_time: u64,
    /// Creation sequence number, disambiguating bundles with the same
    /// creation time from the same source.
    pub creation_seq: u64,
    /// Bundle lifetime in seconds.
    pub lifetime: u64,
    /// Fragment offset; only meaningful when `pcf` has `IS_FRAGMENT` set.
    pub frag_offset: u64,
    /// Original total payload length; only meaningful under `IS_FRAGMENT`.
    pub payload_len: u64,
}

/// Byte offsets chosen for each SDNV field of a just-written or
/// just-parsed primary block, so the engine can rewrite them later.
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    /// Location and width of the processing-control-flags field.
    pub pcf: Field,
    /// Location and width of the block-length field.
    pub blklen: Field,
    /// Location and width of the creation-time field.
    pub createsec: Field,
    /// Location and width of the creation-sequence field.
    pub createseq: Field,
    /// Location and width of the lifetime field.
    pub lifetime: Field,
    /// Location and width of the fragment-offset field.
    pub frag_offset: Field,
    /// Location and width of the payload-length field.
    pub payload_len: Field,
}

fn eid_fields(node_off: usize, serv_off: usize, eid: Eid) -> (Field, Field) {
    (
        Field::with_value(node_off, 4, eid.node),
        Field::with_value(serv_off, 2, eid.service),
    )
}

/// Writes `block` at its fixed canonical offsets, returning the bytes
/// written (always [`offset::CANONICAL_LEN`]) and the field layout for
/// later in-place rewrite.
pub fn write_canonical(buf: &mut [u8], block: &PrimaryBlock) -> Result<(usize, Layout), Error> {
    if buf.len() < offset::CANONICAL_LEN {
        return Err(Error::BufferTooShort(buf.len()));
    }
    buf[offset::VERSION] = block.version;

    let mut pcf = Field::with_value(offset::PCF, 3, block.pcf.bits());
    sdnv::write(buf, &mut pcf)?;

    let mut blklen = Field::with_value(offset::BLKLEN, 1, block.blklen);
    sdnv::write(buf, &mut blklen)?;

    for (node_off, serv_off, eid) in [
        (offset::DST_NODE, offset::DST_SERV, block.destination),
        (offset::SRC_NODE, offset::SRC_SERV, block.source),
        (offset::RPT_NODE, offset::RPT_SERV, block.report_to),
        (offset::CST_NODE, offset::CST_SERV, block.custodian),
    ] {
        let (mut node, mut serv) = eid_fields(node_off, serv_off, eid);
        sdnv::write(buf, &mut node)?;
        sdnv::write(buf, &mut serv)?;
    }

    let mut createsec = Field::with_value(offset::CREATESEC, 6, block.creation_time);
    sdnv::write(buf, &mut createsec)?;

    let mut createseq = Field::with_value(offset::CREATESEQ, 2, block.creation_seq);
    sdnv::write(buf, &mut createseq)?;

    let mut lifetime = Field::with_value(offset::LIFETIME, 6, block.lifetime);
    sdnv::write(buf, &mut lifetime)?;

    let mut dictlen = Field::with_value(offset::DICTLEN, 1, 0);
    sdnv::write(buf, &mut dictlen)?;

    let mut frag_offset = Field::with_value(offset::FRAGOFFSET, 4, block.frag_offset);
    sdnv::write(buf, &mut frag_offset)?;

    let mut payload_len = Field::with_value(offset::PAYLEN, 4, block.payload_len);
    sdnv::write(buf, &mut payload_len)?;

    Ok((
        offset::CANONICAL_LEN,
        Layout {
            pcf,
            blklen,
            createsec,
            createseq,
            lifetime,
            frag_offset,
            payload_len,
        },
    ))
}

/// Parses a primary block at its fixed canonical offsets.
pub fn parse(buf: &[u8]) -> Result<(PrimaryBlock, usize, Layout), Error> {
    if buf.len() < offset::CANONICAL_LEN {
        return Err(Error::BufferTooShort(buf.len()));
    }
    let version = buf[offset::VERSION];

    let mut pcf_f = Field::at(offset::PCF, 3);
    sdnv::read(buf, &mut pcf_f)?;
    let pcf = ProcessingControlFlags::from_bits_truncate(pcf_f.value);

    let mut blklen = Field::at(offset::BLKLEN, 1);
    sdnv::read(buf, &mut blklen)?;

    let mut dst_node = Field::at(offset::DST_NODE, 4);
    let mut dst_serv = Field::at(offset::DST_SERV, 2);
    let mut src_node = Field::at(offset::SRC_NODE, 4);
    let mut src_serv = Field::at(offset::SRC_SERV, 2);
    let mut rpt_node = Field::at(offset::RPT_NODE, 4);
    let mut rpt_serv = Field::at(offset::RPT_SERV, 2);
    let mut cst_node = Field::at(offset::CST_NODE, 4);
    let mut cst_serv = Field::at(offset::CST_SERV, 2);
    for f in [
        &mut dst_node,
        &mut dst_serv,
        &mut src_node,
        &mut src_serv,
        &mut rpt_node,
        &mut rpt_serv,
        &mut cst_node,
        &mut cst_serv,
    ] {
        sdnv::read(buf, f)?;
    }

    let mut createsec = Field::at(offset::CREATESEC, 6);
    sdnv::read(buf, &mut createsec)?;

    let mut createseq = Field::at(offset::CREATESEQ, 2);
    sdnv::read(buf, &mut createseq)?;

    let mut lifetime = Field::at(offset::LIFETIME, 6);
    sdnv::read(buf, &mut lifetime)?;

    let mut dictlen = Field::at(offset::DICTLEN, 1);
    sdnv::read(buf, &mut dictlen)?;
    if dictlen.value != 0 {
        return Err(Error::DictionaryNotSupported(dictlen.value));
    }

    let mut frag_offset = Field::at(offset::FRAGOFFSET, 4);
    sdnv::read(buf, &mut frag_offset)?;

    let mut payload_len = Field::at(offset::PAYLEN, 4);
    sdnv::read(buf, &mut payload_len)?;

    let block = PrimaryBlock {
        version,
        pcf,
        blklen: blklen.value,
        destination: Eid::new(dst_node.value, dst_serv.value),
        source: Eid::new(src_node.value, src_serv.value),
        report_to: Eid::new(rpt_node.value, rpt_serv.value),
        custodian: Eid::new(cst_node.value, cst_serv.value),
        creation_time: createsec.value,
        creation_seq: createseq.value,
        lifetime: lifetime.value,
        frag_offset: frag_offset.value,
        payload_len: payload_len.value,
    };

    Ok((
        block,
        offset::CANONICAL_LEN,
        Layout {
            pcf: pcf_f,
            blklen,
            createsec,
            createseq,
            lifetime,
            frag_offset,
            payload_len,
        },
    ))
}

/// Rewrites a single already-laid-out field in place, at the width
/// recorded in `layout_field`, masking the new value to that width.
pub fn rewrite_field(buf: &mut [u8], layout_field: &mut Field, value: u64) -> Result<(), Error> {
    layout_field.value = value;
    sdnv::mask(layout_field);
    sdnv::write(buf, layout_field)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PrimaryBlock {
        PrimaryBlock {
            version: 6,
            pcf: ProcessingControlFlags::CUSTODY_REQUESTED,
            blklen: 0,
            destination: Eid::new(2, 1),
            source: Eid::new(1, 1),
            report_to: Eid::new(0, 0),
            custodian: Eid::new(1, 1),
            creation_time: 12345,
            creation_seq: 0,
            lifetime: 3600,
            frag_offset: 0,
            payload_len: 0,
        }
    }

    #[test]
    fn round_trips_canonical_layout() {
        let block = sample();
        let mut buf = [0u8; offset::CANONICAL_LEN];
        let (written, _) = write_canonical(&mut buf, &block).unwrap();
        assert_eq!(written, offset::CANONICAL_LEN);

        let (parsed, read_len, _) = parse(&buf).unwrap();
        assert_eq!(read_len, offset::CANONICAL_LEN);
        assert_eq!(parsed, block);
    }

    #[test]
    fn rejects_nonzero_dictlen() {
        let block = sample();
        let mut buf = [0u8; offset::CANONICAL_LEN];
        write_canonical(&mut buf, &block).unwrap();
        buf[offset::DICTLEN] = 1;
        assert!(matches!(
            parse(&buf),
            Err(Error::DictionaryNotSupported(1))
        ));
    }

    #[test]
    fn rewrite_field_updates_in_place_without_shifting() {
        let block = sample();
        let mut buf = [0u8; offset::CANONICAL_LEN];
        let (_, mut layout) = write_canonical(&mut buf, &block).unwrap();

        rewrite_field(&mut buf, &mut layout.createsec, 99999).unwrap();
        let (parsed, _, _) = parse(&buf).unwrap();
        assert_eq!(parsed.creation_time, 99999);
        assert_eq!(parsed.destination, block.destination);
    }
}
