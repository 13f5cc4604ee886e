//! CRC-16/X.25 and CRC-32/Castagnoli over a payload slice, written as raw
//! big-endian bytes — never through the SDNV codec.
//!
//! Profile choice (`CRC_16_IBM_SDLC` / `CRC_32_ISCSI`) names the `crc`
//! crate's constants for these exact two algorithms.

use crate::error::Error;

const X25: ::crc::Crc<u16> = ::crc::Crc::<u16>::new(&::crc::CRC_16_IBM_SDLC);
const CASTAGNOLI: ::crc::Crc<u32> = ::crc::Crc::<u32>::new(&::crc::CRC_32_ISCSI);

/// The cipher-suite-id carried in a BIB, naming which CRC secures the
/// target block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrcType {
    /// CRC-16/X.25, cipher-suite-id 0.
    Crc16X25,
    /// CRC-32/Castagnoli, cipher-suite-id 1.
    Crc32Castagnoli,
}

impl CrcType {
    /// Width in bytes of this CRC's raw encoding.
    pub const fn byte_len(self) -> usize {
        match self {
            CrcType::Crc16X25 => 2,
            CrcType::Crc32Castagnoli => 4,
        }
    }

    /// Decodes a BIB cipher-suite-id field.
    pub fn from_cipher_suite_id(id: u64) -> Result<Self, Error> {
        match id {
            0 => Ok(CrcType::Crc16X25),
            1 => Ok(CrcType::Crc32Castagnoli),
            other => Err(Error::InvalidCipherSuiteId(other)),
        }
    }

    /// The BIB cipher-suite-id naming this CRC.
    pub const fn cipher_suite_id(self) -> u64 {
        match self {
            CrcType::Crc16X25 => 0,
            CrcType::Crc32Castagnoli => 1,
        }
    }

    /// Computes the CRC of `data` and appends it as raw big-endian bytes.
    pub fn compute_be(self, data: &[u8]) -> Vec<u8> {
        match self {
            CrcType::Crc16X25 => X25.checksum(data).to_be_bytes().to_vec(),
            CrcType::Crc32Castagnoli => CASTAGNOLI.checksum(data).to_be_bytes().to_vec(),
        }
    }

    /// Verifies `expected` (raw big-endian bytes, as read off the wire)
    /// against the CRC of `data`.
    pub fn verify_be(self, data: &[u8], expected: &[u8]) -> Result<(), Error> {
        if expected.len() != self.byte_len() {
            return Err(Error::FailedIntegrityCheck);
        }
        let actual = self.compute_be(data);
        if actual == expected {
            Ok(())
        } else {
            Err(Error::FailedIntegrityCheck)
        }
    }
}
