//! Custody transfer enhancement block (CTEB) codec.
//!
//! Layout: block-type byte (0x0A); flags SDNV; block-length SDNV;
//! custody-ID SDNV; custodian EID string (`"ipn:node.service\0"`). Unlike
//! the primary block, fields are laid out sequentially starting at the
//! type byte — there is no fixed canonical offset table for CTEB, only a
//! remembered offset for the custody-ID field so it can be rewritten
//! in-place when a forwarder reassigns custody.

use crate::eid::Eid;
use crate::error::Error;
use crate::field::Field;
use crate::flags::BlockFlags;
use crate::sdnv;

use super::type_byte;

/// A decoded (or about-to-be-encoded) CTEB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CtebBlock {
    /// Block processing flags.
    pub flags: BlockFlags,
    /// The custody ID assigned by the current custodian.
    pub custody_id: u64,
    /// The current custodian's endpoint.
    pub custodian: Eid,
}

/// Remembered offsets needed to rewrite a CTEB in place later.
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    /// Location and width of the custody-ID field.
    pub custody_id: Field,
}

/// Lays `block` out sequentially starting at `base`. `cid_width` reserves
/// a fixed width for the custody-ID SDNV (0 = minimum width, no later
/// rewrite headroom beyond what that width already allows).
pub fn write_canonical(
    buf: &mut [u8],
    base: usize,
    block: &CtebBlock,
    cid_width: usize,
) -> Result<(usize, Layout), Error> {
    let eid_bytes = block.custodian.to_cteb_string();

    if base >= buf.len() {
        return Err(Error::BufferTooShort(buf.len()));
    }
    buf[base] = type_byte::CTEB;
    let mut idx = base + 1;

    let mut flags = Field::auto(idx);
    flags.value = block.flags.bits();
    idx = sdnv::write(buf, &mut flags)?;

    // block-length is unknown until the custody-ID width and EID string
    // length are both fixed; write a placeholder now and correct it once
    // the body length is known.
    let blklen_index = idx;
    let mut blklen = Field::auto(blklen_index);
    // placeholder write to reserve space; corrected once body length known
    idx = sdnv::write(buf, &mut blklen)?;

    let mut custody_id = Field {
        value: block.custody_id,
        index: idx,
        width: cid_width,
    };
    idx = sdnv::write(buf, &mut custody_id)?;

    let eid_start = idx;
    let eid_end = eid_start + eid_bytes.len();
    if eid_end > buf.len() {
        return Err(Error::BufferTooShort(buf.len()));
    }
    buf[eid_start..eid_end].copy_from_slice(&eid_bytes);
    idx = eid_end;

    let body_len = (custody_id.end() - blklen.end()) + eid_bytes.len();
    let mut blklen_final = Field {
        value: body_len as u64,
        index: blklen_index,
        width: blklen.width,
    };
    sdnv::write(buf, &mut blklen_final)?;

    Ok((idx - base, Layout { custody_id }))
}

/// Parses a CTEB starting at `base`, returning the block, the total
/// bytes consumed, and the layout needed to rewrite the custody ID later.
pub fn parse(buf: &[u8], base: usize) -> Result<(CtebBlock, usize, Layout), Error> {
    let found = *buf
        .get(base)
        .ok_or(Error::BufferTooShort(buf.len()))?;
    if found != type_byte::CTEB {
        return Err(Error::WrongBlockType {
            expected: type_byte::CTEB,
            found,
        });
    }
    let mut idx = base + 1;

    let mut flags_f = Field::auto(idx);
    idx = sdnv::read(buf, &mut flags_f)?;

    let mut blklen = Field::auto(idx);
    idx = sdnv::read(buf, &mut blklen)?;

    let mut custody_id = Field::auto(idx);
    idx = sdnv::read(buf, &mut custody_id)?;

    let eid_start = idx;
    let nul = buf[eid_start..]
        .iter()
        .position(|&b| b == 0)
        .ok_or(Error::BufferTooShort(buf.len()))?;
    let eid_end = eid_start + nul + 1;
    let custodian = Eid::from_cteb_string(&buf[eid_start..eid_end])
        .ok_or(Error::FailedToParse(crate::flags::EventFlags::FAILED_TO_PARSE))?;
    idx = eid_end;

    let block = CtebBlock {
        flags: BlockFlags::from_bits_truncate(flags_f.value),
        custody_id: custody_id.value,
        custodian,
    };
    Ok((block, idx - base, Layout { custody_id }))
}

/// Rewrites the custody-ID field in place at its recorded width.
pub fn rewrite_custody_id(buf: &mut [u8], layout: &mut Layout, value: u64) -> Result<(), Error> {
    layout.custody_id.value = value;
    sdnv::mask(&mut layout.custody_id);
    sdnv::write(buf, &mut layout.custody_id)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let block = CtebBlock {
            flags: BlockFlags::LAST_BLOCK,
            custody_id: 42,
            custodian: Eid::new(1, 1),
        };
        let mut buf = [0u8; 64];
        let (len, _) = write_canonical(&mut buf, 0, &block, 0).unwrap();
        let (parsed, read_len, _) = parse(&buf, 0).unwrap();
        assert_eq!(read_len, len);
        assert_eq!(parsed, block);
    }

    #[test]
    fn rewrite_custody_id_in_place() {
        let block = CtebBlock {
            flags: BlockFlags::empty(),
            custody_id: 1,
            custodian: Eid::new(1, 1),
        };
        let mut buf = [0u8; 64];
        let (_, mut layout) = write_canonical(&mut buf, 0, &block, 4).unwrap();
        rewrite_custody_id(&mut buf, &mut layout, 9999).unwrap();
        let (parsed, _, _) = parse(&buf, 0).unwrap();
        assert_eq!(parsed.custody_id, 9999);
        assert_eq!(parsed.custodian, block.custodian);
    }
}
