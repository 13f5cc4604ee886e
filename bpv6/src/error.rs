//! The primary error type for the `bpv6` crate.

use thiserror::Error;

use crate::flags::EventFlags;

/// Errors that can occur while encoding or decoding a BPv6 block.
#[derive(Error, Debug)]
pub enum Error {
    /// The buffer ended before the SDNV at the given offset could be read.
    #[error("SDNV at offset {0} is incomplete")]
    SdnvIncomplete(usize),

    /// The SDNV at the given offset decodes to a value wider than 64 bits.
    #[error("SDNV at offset {0} overflows 64 bits")]
    SdnvOverflow(usize),

    /// A fixed-width SDNV write was asked to carry a value that doesn't fit.
    #[error("value {value} does not fit in a {width}-byte SDNV")]
    SdnvTooNarrow {
        /// The value that didn't fit.
        value: u64,
        /// The fixed width it was asked to fit in.
        width: usize,
    },

    /// The buffer is too short to hold the block's known fixed-offset fields.
    #[error("buffer of {0} bytes is too short for this block's canonical layout")]
    BufferTooShort(usize),

    /// A block's type byte did not match what the caller expected.
    #[error("expected block type {expected:#04x}, found {found:#04x}")]
    WrongBlockType {
        /// The type byte the codec expected.
        expected: u8,
        /// The type byte actually present.
        found: u8,
    },

    /// A BIB's security-target-type did not name the payload block.
    #[error("BIB security-target-type {0:#04x} is not the payload block type")]
    InvalidBibTargetType(u8),

    /// A BIB's security-result-type was not the integrity-signature marker.
    #[error("BIB security-result-type {0:#04x} is not the integrity-signature marker")]
    InvalidBibResultType(u8),

    /// A BIB's cipher-suite-id named neither CRC-16/X.25 nor CRC-32/Castagnoli.
    #[error("cipher suite id {0} is neither CRC-16/X.25 nor CRC-32/Castagnoli")]
    InvalidCipherSuiteId(u64),

    /// A primary block's dictionary-length field was nonzero (compressed-EID
    /// profile only; the legacy dictionary scheme is unsupported).
    #[error("dictionary length {0} is nonzero; only the compressed-EID profile is supported")]
    DictionaryNotSupported(u64),

    /// The assembled header would exceed the 128-byte header buffer.
    #[error("bundle header of {0} bytes exceeds the {1}-byte header buffer")]
    BundleTooLarge(usize, usize),

    /// A computed or verified CRC did not match.
    #[error("integrity check failed")]
    FailedIntegrityCheck,

    /// A generic parse failure, carrying the flags accumulated up to the
    /// point of failure.
    #[error("failed to parse bundle: {0:?}")]
    FailedToParse(EventFlags),
}

impl Error {
    /// The subset of [`EventFlags`] implied by this error's kind, for
    /// callers that want to OR it into an accumulated flags word rather
    /// than match on the error itself.
    pub fn event_flags(&self) -> EventFlags {
        match self {
            Error::SdnvIncomplete(_) => EventFlags::SDNV_INCOMPLETE,
            Error::SdnvOverflow(_) | Error::SdnvTooNarrow { .. } => EventFlags::SDNV_OVERFLOW,
            Error::BufferTooShort(_) | Error::WrongBlockType { .. } => {
                EventFlags::FAILED_TO_PARSE
            }
            Error::InvalidBibTargetType(_) => EventFlags::INVALID_BIB_TARGET_TYPE,
            Error::InvalidBibResultType(_) => EventFlags::INVALID_BIB_RESULT_TYPE,
            Error::InvalidCipherSuiteId(_) => EventFlags::INVALID_CIPHER_SUITEID,
            Error::DictionaryNotSupported(_) => EventFlags::NONCOMPLIANT,
            Error::BundleTooLarge(..) => EventFlags::BUNDLE_TOO_LARGE,
            Error::FailedIntegrityCheck => EventFlags::FAILED_INTEGRITY_CHECK,
            Error::FailedToParse(f) => *f,
        }
    }
}
