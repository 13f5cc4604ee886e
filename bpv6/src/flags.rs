//! Typed bit flags for event/error conditions and the primary block's
//! processing-control-flags / block-flag bytes.

use bitflags::bitflags;

bitflags! {
    /// Soft/warning and fatal conditions accumulated across a call chain.
    ///
    /// A caller ORs these together across sub-operations, the same
    /// OR-merge semantics an integer flags word would carry, but typed
    /// and named.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EventFlags: u32 {
        /// A block or bundle violated a MUST in the specification.
        const NONCOMPLIANT             = 1 << 0;
        /// The bundle was dropped outright (e.g. a fatal extension block).
        const DROPPED                  = 1 << 1;
        /// A header would exceed the fixed bundle header buffer.
        const BUNDLE_TOO_LARGE         = 1 << 2;
        /// An admin record type byte was not recognized.
        const UNKNOWNREC               = 1 << 3;
        /// A BIB cipher-suite-id was neither CRC-16/X.25 nor CRC-32/Castagnoli.
        const INVALID_CIPHER_SUITEID   = 1 << 4;
        /// A BIB security-result-type was not the integrity-signature marker.
        const INVALID_BIB_RESULT_TYPE  = 1 << 5;
        /// A BIB security-target-type did not name the payload block.
        const INVALID_BIB_TARGET_TYPE  = 1 << 6;
        /// Generic block parse failure.
        const FAILED_TO_PARSE          = 1 << 7;
        /// An SDNV decoded to a value wider than 64 bits.
        const SDNV_OVERFLOW            = 1 << 8;
        /// An SDNV ran off the end of the buffer.
        const SDNV_INCOMPLETE          = 1 << 9;
        /// The clock was unreliable; creation time fell back to the sentinel.
        const UNRELIABLE_TIME          = 1 << 10;
        /// A BIB's CRC did not match the payload.
        const FAILED_INTEGRITY_CHECK   = 1 << 11;
        /// The storage collaborator rejected a fragment.
        const STORE_FAILURE            = 1 << 12;
        /// A bundle needs an application-level route that doesn't exist.
        const ROUTE_NEEDED             = 1 << 13;
        /// A call could not be completed with the data given so far.
        const INCOMPLETE               = 1 << 14;
        /// The caller violated a precondition of the API itself.
        const API_ERROR                = 1 << 15;
    }
}

bitflags! {
    /// Primary block processing-control-flags (PCF).
    ///
    /// These bits are named by role rather than pinned to numeric wire
    /// positions (unlike the block-flag mask, which is given explicitly);
    /// this is an internal bit assignment, stable across this crate's own
    /// read/write pairing.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ProcessingControlFlags: u64 {
        /// The bundle is a fragment; `fragoffset`/`paylen` are present.
        const IS_FRAGMENT            = 0x01;
        /// The payload is an administrative record (CS/ACS/status).
        const IS_ADMIN_RECORD        = 0x02;
        /// The source permits this bundle to be fragmented in transit.
        const FRAGMENTATION_ALLOWED  = 0x04;
        /// Custody transfer is requested; a CTEB follows the primary block.
        const CUSTODY_REQUESTED      = 0x08;
        /// The source asked for an application-acknowledgment.
        const APP_ACK_REQUESTED      = 0x10;
        /// Class-of-service, a 3-bit field occupying bits 5-7.
        const CLASS_OF_SERVICE_MASK  = 0xE0;
    }
}

impl ProcessingControlFlags {
    /// Extracts the 3-bit class-of-service value (0-7).
    pub fn class_of_service(self) -> u8 {
        ((self.bits() & Self::CLASS_OF_SERVICE_MASK.bits()) >> 5) as u8
    }

    /// Returns a copy with the class-of-service bits set to `cos & 0x07`.
    pub fn with_class_of_service(self, cos: u8) -> Self {
        let cleared = self.bits() & !Self::CLASS_OF_SERVICE_MASK.bits();
        Self::from_bits_truncate(cleared | (u64::from(cos & 0x07) << 5))
    }
}

bitflags! {
    /// Per-block flag mask bits, shared by CTEB, BIB, and extension
    /// blocks.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct BlockFlags: u64 {
        /// Replicate this block in every fragment of the bundle.
        const REPLICATE_ALL_FRAGMENTS  = 0x01;
        /// Notify the source if this block cannot be processed.
        const NOTIFY_ON_NOPROC         = 0x02;
        /// Delete the whole bundle if this block cannot be processed.
        const DELETE_BUNDLE_ON_NOPROC  = 0x04;
        /// This is the last block in the bundle.
        const LAST_BLOCK               = 0x08;
        /// Drop just this block if it cannot be processed.
        const DROP_BLOCK_ON_NOPROC     = 0x10;
        /// Set by a forwarder that passed this block on unprocessed.
        const FORWARDED_WITHOUT_PROC   = 0x20;
        /// This block carries an EID reference.
        const EID_REF                  = 0x40;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_of_service_round_trips() {
        let pcf = ProcessingControlFlags::CUSTODY_REQUESTED.with_class_of_service(5);
        assert_eq!(pcf.class_of_service(), 5);
        assert!(pcf.contains(ProcessingControlFlags::CUSTODY_REQUESTED));
    }

    #[test]
    fn class_of_service_masks_to_three_bits() {
        let pcf = ProcessingControlFlags::empty().with_class_of_service(0xFF);
        assert_eq!(pcf.class_of_service(), 0x07);
    }
}
