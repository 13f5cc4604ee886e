//! Send path: fragments the application payload against a
//! max-bundle-size budget, sets creation time and expiration, updates
//! the BIB's CRC per fragment, and hands each fragment to storage.

use bpv6::block::payload;
use bpv6::builder::{Attributes, BundleHeader};
use bpv6::flags::ProcessingControlFlags;
use bpv6::sdnv;
use bpv6::{BEST_EFFORT_LIFETIME, MAX_ENCODED_VALUE, TTL_CREATION_TIME, UNKNOWN_CREATION_TIME};
use bpv6_core::{Storage, Timeout};
use bpv6_rt::clock::Clock;
use tracing::warn;

use crate::error::Error;

/// Computes the expiration time from a creation time and lifetime,
/// propagating the unknown/TTL sentinels unchanged and saturating rather
/// than wrapping on overflow.
pub fn expiration_time(creation_time: u64, lifetime: u64) -> u64 {
    if creation_time == UNKNOWN_CREATION_TIME || creation_time == TTL_CREATION_TIME {
        return creation_time;
    }
    creation_time.saturating_add(lifetime).min(MAX_ENCODED_VALUE)
}

/// Sends `bytes` as one or more fragments of the bundle described by
/// `header`/`attributes`, via `storage`. Returns the number of fragments
/// stored.
pub async fn send_bundle<C: Clock, S: Storage>(
    header: &mut BundleHeader,
    attributes: &Attributes,
    bytes: &[u8],
    storage: &S,
    clock: &C,
    timeout: Timeout,
) -> Result<usize, Error> {
    let fixed_header_len = header.pay_offset + payload::HEADER_LEN;
    if attributes.max_bundle_length <= fixed_header_len {
        return Err(bpv6::Error::BundleTooLarge(
            fixed_header_len,
            attributes.max_bundle_length,
        )
        .into());
    }
    let max_paysize = attributes.max_bundle_length - fixed_header_len;

    let size = bytes.len();
    let is_fragment = size > max_paysize;
    if is_fragment && !attributes.allow_fragmentation {
        return Err(bpv6::Error::BundleTooLarge(size, max_paysize).into());
    }
    if is_fragment {
        let mut pcf = header.primary_layout.pcf;
        pcf.value |= ProcessingControlFlags::IS_FRAGMENT.bits();
        sdnv::write(&mut header.buf, &mut pcf)?;
        header.primary_layout.pcf = pcf;
    }

    if header.prebuilt {
        match clock.systime() {
            Ok(now) => {
                let mut createsec = header.primary_layout.createsec;
                createsec.value = now;
                sdnv::mask(&mut createsec);
                sdnv::write(&mut header.buf, &mut createsec)?;
                header.primary_layout.createsec = createsec;
            }
            Err(_) => {
                warn!("clock unreliable, falling back to unknown creation time and best-effort lifetime");
                let mut createsec = header.primary_layout.createsec;
                createsec.value = UNKNOWN_CREATION_TIME;
                sdnv::write(&mut header.buf, &mut createsec)?;
                header.primary_layout.createsec = createsec;

                let mut lifetime_f = header.primary_layout.lifetime;
                lifetime_f.value = BEST_EFFORT_LIFETIME;
                sdnv::mask(&mut lifetime_f);
                sdnv::write(&mut header.buf, &mut lifetime_f)?;
                header.primary_layout.lifetime = lifetime_f;
            }
        }
    }

    let mut fragments_sent = 0;
    let mut payload_offset = 0usize;
    while payload_offset < size || (size == 0 && fragments_sent == 0) {
        let fragment_size = max_paysize.min(size - payload_offset);

        if is_fragment {
            let mut frag_offset_f = header.primary_layout.frag_offset;
            frag_offset_f.value = payload_offset as u64;
            sdnv::mask(&mut frag_offset_f);
            sdnv::write(&mut header.buf, &mut frag_offset_f)?;
            header.primary_layout.frag_offset = frag_offset_f;

            let mut payload_len_f = header.primary_layout.payload_len;
            payload_len_f.value = size as u64;
            sdnv::mask(&mut payload_len_f);
            sdnv::write(&mut header.buf, &mut payload_len_f)?;
            header.primary_layout.payload_len = payload_len_f;
        }

        let fragment = &bytes[payload_offset..payload_offset + fragment_size];

        if let (Some(cipher_suite), Some(bib_layout)) = (header.cipher_suite, &header.bib_layout) {
            bpv6::block::bib::rewrite_result(&mut header.buf, bib_layout, cipher_suite, fragment);
        }

        let (_, mut pay_layout) =
            payload::write_header(&mut header.buf, header.pay_offset, Default::default(), fragment_size as u64)?;
        let header_size = header.pay_offset + payload::HEADER_LEN;
        payload::rewrite_header(&mut header.buf, &mut pay_layout, fragment_size as u64)?;

        let mut full_fragment = header.buf[..header_size].to_vec();
        full_fragment.extend_from_slice(fragment);

        storage
            .create(attributes.admin_record, &full_fragment, timeout)
            .await?;

        fragments_sent += 1;
        payload_offset += fragment_size;
    }

    if header.prebuilt {
        let mut createseq = header.primary_layout.createseq;
        createseq.value += 1;
        sdnv::mask(&mut createseq);
        sdnv::write(&mut header.buf, &mut createseq)?;
        header.primary_layout.createseq = createseq;
    }

    Ok(fragments_sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bpv6::builder::{self, Route};
    use bpv6::crc::CrcType;
    use bpv6::eid::Eid;
    use bpv6_core::StorageId;
    use bpv6_rt::clock::FixedClock;

    struct MemStorage {
        fragments: tokio::sync::Mutex<Vec<Vec<u8>>>,
    }

    #[async_trait::async_trait]
    impl Storage for MemStorage {
        async fn create(
            &self,
            _is_record: bool,
            bytes: &[u8],
            _timeout: Timeout,
        ) -> Result<StorageId, bpv6_core::StorageError> {
            let mut guard = self.fragments.lock().await;
            guard.push(bytes.to_vec());
            Ok(StorageId(guard.len() as u64 - 1))
        }

        async fn delete(&self, _id: StorageId) -> Result<(), bpv6_core::StorageError> {
            Ok(())
        }
    }

    fn route() -> Route {
        Route {
            source: Eid::new(1, 1),
            destination: Eid::new(2, 1),
            report_to: Eid::new(1, 1),
        }
    }

    #[tokio::test]
    async fn small_payload_sends_one_fragment() {
        let attrs = builder::Attributes {
            lifetime: 3600,
            class_of_service: 0,
            integrity_check: None,
            max_bundle_length: 1024,
            allow_fragmentation: false,
            request_custody: false,
            ignore_expiration: false,
            admin_record: false,
        };
        let mut header = builder::build(&route(), &attrs, None, &[]).unwrap();
        let storage = MemStorage {
            fragments: tokio::sync::Mutex::new(Vec::new()),
        };
        let clock = FixedClock::new(100);

        let sent = send_bundle(&mut header, &attrs, b"HELLO", &storage, &clock, Timeout::Forever)
            .await
            .unwrap();
        assert_eq!(sent, 1);
        assert_eq!(storage.fragments.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn large_payload_fragments_when_allowed() {
        let attrs = builder::Attributes {
            lifetime: 3600,
            class_of_service: 0,
            integrity_check: None,
            max_bundle_length: 1024,
            allow_fragmentation: true,
            request_custody: false,
            ignore_expiration: false,
            admin_record: false,
        };
        let mut header = builder::build(&route(), &attrs, None, &[]).unwrap();
        let storage = MemStorage {
            fragments: tokio::sync::Mutex::new(Vec::new()),
        };
        let clock = FixedClock::new(100);

        let payload = vec![0xABu8; 10_000];
        let sent = send_bundle(&mut header, &attrs, &payload, &storage, &clock, Timeout::Forever)
            .await
            .unwrap();
        assert!(sent > 1);
    }

    #[tokio::test]
    async fn unreliable_clock_falls_back_to_unknown_creation_time() {
        let attrs = builder::Attributes {
            lifetime: 3600,
            class_of_service: 0,
            integrity_check: Some(CrcType::Crc16X25),
            max_bundle_length: 1024,
            allow_fragmentation: false,
            request_custody: false,
            ignore_expiration: false,
            admin_record: false,
        };
        let mut header = builder::build(&route(), &attrs, None, &[]).unwrap();
        let storage = MemStorage {
            fragments: tokio::sync::Mutex::new(Vec::new()),
        };
        let clock = FixedClock::new(100);
        clock.force_unreliable_once();

        send_bundle(&mut header, &attrs, b"HELLO", &storage, &clock, Timeout::Forever)
            .await
            .unwrap();
        assert_eq!(header.primary_layout.createsec.value, UNKNOWN_CREATION_TIME);
    }
}
