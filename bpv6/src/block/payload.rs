//! Payload block (PAY) codec.
//!
//! Layout: block-type byte (0x01); flags SDNV; block-length SDNV; then
//! `block-length` bytes of opaque payload. The header (everything before
//! the payload bytes) is rewritten once per fragment at send time, so its
//! flags and length fields are given a small fixed width rather than a
//! minimal one, letting the payload length grow or shrink across
//! fragments without relaying the rest of the bundle.

use crate::error::Error;
use crate::field::Field;
use crate::flags::BlockFlags;
use crate::sdnv;

use super::type_byte;

/// Fixed width reserved for the flags SDNV in the payload header.
pub const FLAGS_WIDTH: usize = 1;
/// Fixed width reserved for the block-length SDNV in the payload header,
/// large enough for any fragment size this engine will produce.
pub const BLKLEN_WIDTH: usize = 2;
/// Total size of the fixed payload header: type byte + flags + blklen.
pub const HEADER_LEN: usize = 1 + FLAGS_WIDTH + BLKLEN_WIDTH;

/// Remembered offsets for rewriting the payload header per fragment.
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    /// Location and width of the flags field.
    pub flags: Field,
    /// Location and width of the block-length field.
    pub blklen: Field,
}

/// Writes the payload header at `base`, with `flags` and a length of
/// `payload_len` bytes. Returns the header length and the layout needed
/// to rewrite it for the next fragment.
pub fn write_header(
    buf: &mut [u8],
    base: usize,
    flags: BlockFlags,
    payload_len: u64,
) -> Result<(usize, Layout), Error> {
    if base + HEADER_LEN > buf.len() {
        return Err(Error::BufferTooShort(buf.len()));
    }
    buf[base] = type_byte::PAY;

    let mut flags_f = Field::with_value(base + 1, FLAGS_WIDTH, flags.bits());
    sdnv::write(buf, &mut flags_f)?;

    let mut blklen_f = Field::with_value(base + 1 + FLAGS_WIDTH, BLKLEN_WIDTH, payload_len);
    sdnv::write(buf, &mut blklen_f)?;

    Ok((
        HEADER_LEN,
        Layout {
            flags: flags_f,
            blklen: blklen_f,
        },
    ))
}

/// Rewrites the header in place for a new fragment length.
pub fn rewrite_header(buf: &mut [u8], layout: &mut Layout, payload_len: u64) -> Result<(), Error> {
    layout.blklen.value = payload_len;
    sdnv::mask(&mut layout.blklen);
    sdnv::write(buf, &mut layout.blklen)?;
    Ok(())
}

/// Parses a payload header at `base`, returning the flags, the declared
/// payload length, and the total header length consumed.
pub fn parse_header(buf: &[u8], base: usize) -> Result<(BlockFlags, u64, usize, Layout), Error> {
    let found = *buf.get(base).ok_or(Error::BufferTooShort(buf.len()))?;
    if found != type_byte::PAY {
        return Err(Error::WrongBlockType {
            expected: type_byte::PAY,
            found,
        });
    }
    let mut idx = base + 1;

    let mut flags_f = Field::auto(idx);
    idx = sdnv::read(buf, &mut flags_f)?;

    let mut blklen_f = Field::auto(idx);
    idx = sdnv::read(buf, &mut blklen_f)?;

    Ok((
        BlockFlags::from_bits_truncate(flags_f.value),
        blklen_f.value,
        idx - base,
        Layout {
            flags: flags_f,
            blklen: blklen_f,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let mut buf = [0u8; 16];
        let (len, _) = write_header(&mut buf, 0, BlockFlags::LAST_BLOCK, 5).unwrap();
        let (flags, blklen, read_len, _) = parse_header(&buf, 0).unwrap();
        assert_eq!(len, read_len);
        assert_eq!(flags, BlockFlags::LAST_BLOCK);
        assert_eq!(blklen, 5);
    }

    #[test]
    fn header_is_fixed_four_bytes() {
        let mut buf = [0u8; 16];
        let (len, _) = write_header(&mut buf, 0, BlockFlags::empty(), 5).unwrap();
        assert_eq!(len, HEADER_LEN);
        assert_eq!(HEADER_LEN, 4);
    }

    #[test]
    fn rewrite_header_changes_length_only() {
        let mut buf = [0u8; 16];
        let (_, mut layout) = write_header(&mut buf, 0, BlockFlags::empty(), 5).unwrap();
        rewrite_header(&mut buf, &mut layout, 999).unwrap();
        let (_, blklen, _, _) = parse_header(&buf, 0).unwrap();
        assert_eq!(blklen, 999);
    }
}
