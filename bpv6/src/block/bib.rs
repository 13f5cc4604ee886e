//! Bundle integrity block (BIB) codec.
//!
//! Layout: block-type byte (0x0D); flags SDNV; block-length SDNV;
//! security-target-count SDNV (always 1); security-target-type byte
//! (must equal the payload block type); cipher-suite-id SDNV (CRC-16/X.25
//! = 0, CRC-32/Castagnoli = 1); cipher-suite-flags SDNV; compound-length
//! SDNV; security-result-type byte; security-result-length SDNV (2 or 4);
//! raw CRC bytes, big-endian (never through the SDNV codec).

use crate::crc::CrcType;
use crate::error::Error;
use crate::field::Field;
use crate::flags::BlockFlags;
use crate::sdnv;

use super::type_byte;

/// The only security-result-type this codec emits or accepts: a bare
/// integrity signature (the CRC bytes themselves), chosen as an internal
/// marker the way PCF bit positions are.
pub const SECURITY_RESULT_TYPE_INTEGRITY_SIGNATURE: u8 = 0x01;

/// A decoded (or about-to-be-encoded) BIB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibBlock {
    /// Block processing flags.
    pub flags: BlockFlags,
    /// Which CRC secures the payload block.
    pub cipher_suite: CrcTypeWire,
    /// The CRC bytes themselves, big-endian.
    pub result: Vec<u8>,
}

/// A thin wrapper so `BibBlock` can derive `PartialEq`/`Eq` over
/// [`CrcType`], which itself doesn't.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrcTypeWire(pub CrcType);

/// Remembered offset needed to rewrite the BIB result in place per
/// fragment without re-laying the rest of the block.
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    /// Byte range of the raw CRC result within the enclosing buffer.
    pub result_range: core::ops::Range<usize>,
}

/// Lays `block` out sequentially starting at `base`.
pub fn write_canonical(
    buf: &mut [u8],
    base: usize,
    block: &BibBlock,
) -> Result<(usize, Layout), Error> {
    if base >= buf.len() {
        return Err(Error::BufferTooShort(buf.len()));
    }
    buf[base] = type_byte::BIB;
    let mut idx = base + 1;

    let mut flags = Field::auto(idx);
    flags.value = block.flags.bits();
    idx = sdnv::write(buf, &mut flags)?;

    let blklen_index = idx;
    let mut blklen_placeholder = Field::auto(blklen_index);
    idx = sdnv::write(buf, &mut blklen_placeholder)?;
    let body_start = idx;

    let mut target_count = Field::auto(idx);
    target_count.value = 1;
    idx = sdnv::write(buf, &mut target_count)?;

    buf[idx] = type_byte::PAY;
    idx += 1;

    let mut cipher_suite_id = Field::auto(idx);
    cipher_suite_id.value = block.cipher_suite.0.cipher_suite_id();
    idx = sdnv::write(buf, &mut cipher_suite_id)?;

    let mut cipher_suite_flags = Field::auto(idx);
    cipher_suite_flags.value = 0;
    idx = sdnv::write(buf, &mut cipher_suite_flags)?;

    let mut compound_len = Field::auto(idx);
    // security-result-type byte + result-length field + result bytes
    compound_len.value = (1 + 1 + block.result.len()) as u64;
    idx = sdnv::write(buf, &mut compound_len)?;

    buf[idx] = SECURITY_RESULT_TYPE_INTEGRITY_SIGNATURE;
    idx += 1;

    let mut result_len = Field::auto(idx);
    result_len.value = block.result.len() as u64;
    idx = sdnv::write(buf, &mut result_len)?;

    let result_start = idx;
    let result_end = result_start + block.result.len();
    if result_end > buf.len() {
        return Err(Error::BufferTooShort(buf.len()));
    }
    buf[result_start..result_end].copy_from_slice(&block.result);
    idx = result_end;

    let mut blklen = Field {
        value: (idx - body_start) as u64,
        index: blklen_index,
        width: blklen_placeholder.width,
    };
    sdnv::write(buf, &mut blklen)?;

    Ok((
        idx - base,
        Layout {
            result_range: result_start..result_end,
        },
    ))
}

/// Parses a BIB starting at `base`.
pub fn parse(buf: &[u8], base: usize) -> Result<(BibBlock, usize, Layout), Error> {
    let found = *buf.get(base).ok_or(Error::BufferTooShort(buf.len()))?;
    if found != type_byte::BIB {
        return Err(Error::WrongBlockType {
            expected: type_byte::BIB,
            found,
        });
    }
    let mut idx = base + 1;

    let mut flags_f = Field::auto(idx);
    idx = sdnv::read(buf, &mut flags_f)?;

    let mut blklen = Field::auto(idx);
    idx = sdnv::read(buf, &mut blklen)?;

    let mut target_count = Field::auto(idx);
    idx = sdnv::read(buf, &mut target_count)?;

    let target_type = *buf.get(idx).ok_or(Error::BufferTooShort(buf.len()))?;
    if target_type != type_byte::PAY {
        return Err(Error::InvalidBibTargetType(target_type));
    }
    idx += 1;

    let mut cipher_suite_id = Field::auto(idx);
    idx = sdnv::read(buf, &mut cipher_suite_id)?;
    let cipher_suite = CrcType::from_cipher_suite_id(cipher_suite_id.value)?;

    let mut cipher_suite_flags = Field::auto(idx);
    idx = sdnv::read(buf, &mut cipher_suite_flags)?;

    let mut compound_len = Field::auto(idx);
    idx = sdnv::read(buf, &mut compound_len)?;

    let result_type = *buf.get(idx).ok_or(Error::BufferTooShort(buf.len()))?;
    if result_type != SECURITY_RESULT_TYPE_INTEGRITY_SIGNATURE {
        return Err(Error::InvalidBibResultType(result_type));
    }
    idx += 1;

    let mut result_len = Field::auto(idx);
    idx = sdnv::read(buf, &mut result_len)?;

    let result_start = idx;
    let result_end = result_start + result_len.value as usize;
    if result_end > buf.len() {
        return Err(Error::BufferTooShort(buf.len()));
    }
    let result = buf[result_start..result_end].to_vec();
    idx = result_end;

    let block = BibBlock {
        flags: BlockFlags::from_bits_truncate(flags_f.value),
        cipher_suite: CrcTypeWire(cipher_suite),
        result,
    };
    Ok((
        block,
        idx - base,
        Layout {
            result_range: result_start..result_end,
        },
    ))
}

/// Recomputes the CRC of `payload` and rewrites the BIB's result bytes
/// in place, without touching block-length or any other field.
pub fn rewrite_result(buf: &mut [u8], layout: &Layout, cipher_suite: CrcType, payload: &[u8]) {
    let fresh = cipher_suite.compute_be(payload);
    debug_assert_eq!(fresh.len(), layout.result_range.len());
    buf[layout.result_range.clone()].copy_from_slice(&fresh);
}

/// Verifies the BIB's result bytes against `payload`.
pub fn verify(block: &BibBlock, payload: &[u8]) -> Result<(), Error> {
    block.cipher_suite.0.verify_be(payload, &block.result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let payload = b"HELLO";
        let result = CrcType::Crc16X25.compute_be(payload);
        let block = BibBlock {
            flags: BlockFlags::empty(),
            cipher_suite: CrcTypeWire(CrcType::Crc16X25),
            result,
        };
        let mut buf = [0u8; 64];
        let (len, _) = write_canonical(&mut buf, 0, &block).unwrap();
        let (parsed, read_len, _) = parse(&buf, 0).unwrap();
        assert_eq!(read_len, len);
        assert_eq!(parsed, block);
        verify(&parsed, payload).unwrap();
    }

    #[test]
    fn verify_fails_after_payload_mutation() {
        let payload = b"HELLO".to_vec();
        let result = CrcType::Crc16X25.compute_be(&payload);
        let block = BibBlock {
            flags: BlockFlags::empty(),
            cipher_suite: CrcTypeWire(CrcType::Crc16X25),
            result,
        };
        let mut tampered = payload.clone();
        tampered[0] ^= 1;
        assert!(verify(&block, &tampered).is_err());
    }

    #[test]
    fn rewrite_result_updates_crc_for_new_fragment() {
        let payload_a = b"HELLO";
        let payload_b = b"WORLD";
        let block = BibBlock {
            flags: BlockFlags::empty(),
            cipher_suite: CrcTypeWire(CrcType::Crc16X25),
            result: CrcType::Crc16X25.compute_be(payload_a),
        };
        let mut buf = [0u8; 64];
        let (_, layout) = write_canonical(&mut buf, 0, &block).unwrap();
        rewrite_result(&mut buf, &layout, CrcType::Crc16X25, payload_b);
        let (parsed, _, _) = parse(&buf, 0).unwrap();
        verify(&parsed, payload_b).unwrap();
    }
}
