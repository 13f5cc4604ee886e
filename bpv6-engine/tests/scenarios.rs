//! Integration tests exercising the numbered scenarios of the send/receive
//! state machine end to end, against an in-memory storage collaborator.

use bpv6::block::{bib, cteb, payload, primary, type_byte};
use bpv6::builder::{self, Attributes, Route};
use bpv6::crc::CrcType;
use bpv6::eid::Eid;
use bpv6::field::Field;
use bpv6::flags::{BlockFlags, ProcessingControlFlags};
use bpv6::sdnv;
use bpv6_core::{Cid, StorageId, Timeout};
use bpv6_engine::cbuf::{ActiveBundle, CbufError, CircularBundleTable};
use bpv6_engine::error::Disposition;
use bpv6_engine::receive::receive_bundle;
use bpv6_engine::send::send_bundle;
use bpv6_mem::MemStorage;
use bpv6_rt::clock::FixedClock;

fn route(dest: Eid) -> Route {
    Route {
        source: Eid::new(1, 1),
        destination: dest,
        report_to: Eid::new(1, 1),
    }
}

fn no_custody_attrs(max_bundle_length: usize) -> Attributes {
    Attributes {
        lifetime: 3600,
        class_of_service: 0,
        integrity_check: None,
        max_bundle_length,
        allow_fragmentation: false,
        request_custody: false,
        ignore_expiration: false,
        admin_record: false,
    }
}

/// Scenario 1: a plain, unfragmented, custody-free, integrity-free send.
#[tokio::test]
async fn scenario_1_plain_bundle_has_primary_only_header() {
    let attrs = no_custody_attrs(1024);
    let mut header = builder::build(&route(Eid::new(2, 1)), &attrs, None, &[]).unwrap();
    assert_eq!(header.pay_offset, primary::offset::CANONICAL_LEN);

    let storage = MemStorage::new();
    let clock = FixedClock::new(100);
    let sent = send_bundle(&mut header, &attrs, b"HELLO", &storage, &clock, Timeout::Forever)
        .await
        .unwrap();
    assert_eq!(sent, 1);

    let fragments = storage.all_ordered().await;
    assert_eq!(fragments.len(), 1);
    let bytes = &fragments[0];

    let (_, pri_len, _) = primary::parse(bytes).unwrap();
    assert_eq!(pri_len, primary::offset::CANONICAL_LEN);

    let (_, pay_len, pay_header_len, _) = payload::parse_header(bytes, pri_len).unwrap();
    assert_eq!(pay_header_len, payload::HEADER_LEN);
    assert_eq!(pay_len, 5);
    assert_eq!(bytes.len(), pri_len + payload::HEADER_LEN + 5);
}

/// Scenario 2: custody requested with a CRC-16 BIB; the BIB's 2-byte
/// result must equal the CRC-16/X.25 of the payload.
#[tokio::test]
async fn scenario_2_custody_and_integrity_emit_cteb_then_bib() {
    let mut attrs = no_custody_attrs(1024);
    attrs.request_custody = true;
    attrs.integrity_check = Some(CrcType::Crc16X25);

    let mut header = builder::build(&route(Eid::new(2, 1)), &attrs, None, &[]).unwrap();
    assert_eq!(header.cteb_offset, primary::offset::CANONICAL_LEN);
    assert!(header.bib_offset > header.cteb_offset);

    let storage = MemStorage::new();
    let clock = FixedClock::new(100);
    send_bundle(&mut header, &attrs, b"HELLO", &storage, &clock, Timeout::Forever)
        .await
        .unwrap();

    let fragments = storage.all_ordered().await;
    let bytes = &fragments[0];

    let (_, pri_len, _) = primary::parse(bytes).unwrap();
    assert_eq!(bytes[pri_len], type_byte::CTEB);
    let (_, cteb_len, _) = cteb::parse(bytes, pri_len).unwrap();
    assert_eq!(bytes[pri_len + cteb_len], type_byte::BIB);
    let (bib_block, _, _) = bib::parse(bytes, pri_len + cteb_len).unwrap();

    assert_eq!(bib_block.result, CrcType::Crc16X25.compute_be(b"HELLO"));
}

/// Scenario 3: a 10 KB payload fragmented against a 1024-byte budget.
#[tokio::test]
async fn scenario_3_large_payload_is_fragmented() {
    let mut attrs = no_custody_attrs(1024);
    attrs.allow_fragmentation = true;

    let mut header = builder::build(&route(Eid::new(2, 1)), &attrs, None, &[]).unwrap();
    let fixed_header_len = header.pay_offset + payload::HEADER_LEN;
    let max_paysize = attrs.max_bundle_length - fixed_header_len;

    let storage = MemStorage::new();
    let clock = FixedClock::new(100);
    let payload_bytes = vec![0xABu8; 10_000];
    let sent = send_bundle(
        &mut header,
        &attrs,
        &payload_bytes,
        &storage,
        &clock,
        Timeout::Forever,
    )
    .await
    .unwrap();

    let expected_fragments = 10_000usize.div_ceil(max_paysize);
    assert_eq!(sent, expected_fragments);

    let fragments = storage.all_ordered().await;
    assert_eq!(fragments.len(), expected_fragments);

    let mut expected_offset = 0u64;
    for bytes in &fragments {
        let (pri, pri_len, _) = primary::parse(bytes).unwrap();
        assert!(pri.pcf.contains(ProcessingControlFlags::IS_FRAGMENT));
        assert_eq!(pri.frag_offset, expected_offset);
        assert_eq!(pri.payload_len, 10_000);

        let (_, pay_len, _, _) = payload::parse_header(bytes, pri_len).unwrap();
        expected_offset += pay_len;
    }
    assert_eq!(expected_offset, 10_000);
}

fn record(cid: u64) -> ActiveBundle {
    ActiveBundle {
        storage_id: StorageId(cid),
        retransmit_time: 0,
        custody_id: Cid(cid),
    }
}

/// Scenario 4: capacity-8 table, insert 0..7, remove CID 3, insert CID 11
/// (11 mod 8 == 3); the table recovers the slot and `next` walks forward
/// from the oldest surviving CID.
#[tokio::test]
async fn scenario_4_active_table_reuses_slot_after_wraparound() {
    let mut table = CircularBundleTable::new(8);
    for cid in 0..8 {
        table.add(record(cid), false).unwrap();
    }
    table.remove(Cid(3)).unwrap();
    table.add(record(11), false).unwrap();
    assert_eq!(table.count(), 8);

    assert_eq!(table.next().unwrap().custody_id, Cid(0));
    table.remove(Cid(0)).unwrap();
    assert_eq!(table.next().unwrap().custody_id, Cid(1));
}

/// Scenario 5: a duplicate insert without `overwrite` is rejected and the
/// count is unaffected.
#[tokio::test]
async fn scenario_5_duplicate_insert_without_overwrite_is_rejected() {
    let mut table = CircularBundleTable::new(8);
    table.add(record(0), false).unwrap();
    let err = table.add(record(0), false).unwrap_err();
    assert!(matches!(err, CbufError::Duplicate(Cid(0))));
    assert_eq!(table.count(), 1);
}

/// Scenario 6: forwarding a bundle with a recognized CTEB and one
/// unrecognized extension block flagged DROP-BLOCK-ON-NOPROC. The
/// rebuilt bundle must not carry the unrecognized block, and the CTEB's
/// custodian fields must be rewritten to the local node/service.
#[tokio::test]
async fn scenario_6_forward_drops_unrecognized_block_and_patches_cteb() {
    let mut attrs = no_custody_attrs(1024);
    attrs.request_custody = true;

    // Build primary + CTEB via the builder, destined for a third node.
    let mut header = builder::build(&route(Eid::new(99, 1)), &attrs, None, &[]).unwrap();
    header.primary_layout.createsec.value = 100;
    sdnv::write(&mut header.buf, &mut header.primary_layout.createsec).unwrap();

    let cteb_layout = header.cteb_layout.as_ref().unwrap();
    let original_cid = cteb_layout.custody_id.value;
    assert_eq!(original_cid, 0);

    let mut idx = header.pay_offset;

    // Append one unrecognized extension block with DROP-BLOCK-ON-NOPROC.
    let ext_type_byte = 0x3Fu8;
    header.buf[idx] = ext_type_byte;
    idx += 1;
    let mut flags_f = Field::auto(idx);
    flags_f.value = BlockFlags::DROP_BLOCK_ON_NOPROC.bits();
    idx = sdnv::write(&mut header.buf, &mut flags_f).unwrap();
    let mut blklen_f = Field::auto(idx);
    blklen_f.value = 0;
    idx = sdnv::write(&mut header.buf, &mut blklen_f).unwrap();
    let ext_block_start = header.pay_offset;
    let ext_block_end = idx;

    // Append the payload block.
    let (_, mut pay_layout) =
        payload::write_header(&mut header.buf, idx, BlockFlags::LAST_BLOCK, 5).unwrap();
    payload::rewrite_header(&mut header.buf, &mut pay_layout, 5).unwrap();
    idx += payload::HEADER_LEN;

    let mut bytes = header.buf[..idx].to_vec();
    bytes.extend_from_slice(b"HELLO");

    let clock = FixedClock::new(200);
    let (disposition, forwarded) = receive_bundle(&mut bytes, 2, 1, &clock, false).unwrap();

    let custody_info = match disposition {
        Disposition::PendingForward(info) => info.expect("CTEB was present"),
        other => panic!("expected PendingForward, got {other:?}"),
    };
    assert_eq!(custody_info.cid, Cid(0));

    let forwarded = forwarded.expect("forwarding produces a rebuilt header");
    let cteb_off = forwarded.cteb_offset;
    let (cteb_block, cteb_len, _) = cteb::parse(&forwarded.buf, cteb_off).unwrap();
    assert_eq!(cteb_block.custodian, Eid::new(2, 1));

    // No unrecognized block survives: the payload offset follows directly
    // after the (patched) CTEB, with nothing from the dropped extension.
    assert_eq!(forwarded.pay_offset, cteb_off + cteb_len);
    assert!(ext_block_end > ext_block_start);
}
