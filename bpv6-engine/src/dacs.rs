//! DACS (aggregate custody signal) builder/parser: serializes a
//! set of acknowledged CIDs as a base CID followed by alternating
//! "number acknowledged / number skipped" SDNV fills.

use bpv6::error::Error as CodecError;
use bpv6::field::Field;
use bpv6::sdnv;
use bpv6_core::Cid;

/// Turns a sorted, deduplicated list of acknowledged CIDs into the
/// alternating run-length fills an ACS body is made of.
fn runs_from_cids(cids: &[u64]) -> Vec<(u64, u64)> {
    // (acked_count, skipped_count) pairs, skipped_count being the gap
    // before the *next* run (0 for the final run).
    let mut runs = Vec::new();
    let mut i = 0;
    while i < cids.len() {
        let start = cids[i];
        let mut j = i + 1;
        while j < cids.len() && cids[j] == cids[j - 1] + 1 {
            j += 1;
        }
        let acked = (cids[j - 1] - start) + 1;
        let skipped = if j < cids.len() { cids[j] - cids[j - 1] - 1 } else { 0 };
        runs.push((acked, skipped));
        i = j;
    }
    runs
}

/// Serializes `acked` (need not be pre-sorted) as an ACS body: base CID
/// SDNV, then up to `max_fills` alternating acked/skipped-count SDNVs.
/// Fills beyond `max_fills` are dropped; callers that need every CID
/// acknowledged should call this repeatedly with the remainder.
pub fn populate_ack(acked: &[Cid], max_fills: usize) -> Result<Vec<u8>, CodecError> {
    if acked.is_empty() {
        return Ok(Vec::new());
    }
    let mut sorted: Vec<u64> = acked.iter().map(|c| c.0).collect();
    sorted.sort_unstable();
    sorted.dedup();

    let base_cid = sorted[0];
    let runs = runs_from_cids(&sorted);

    let mut buf = vec![0u8; 8 + max_fills.min(runs.len()) * 2 * 10 + 32];
    let mut idx = 0;

    let mut base = Field::auto(idx);
    base.value = base_cid;
    idx = sdnv::write(&mut buf, &mut base)?;

    for &(acked_run, skipped_run) in runs.iter().take(max_fills) {
        let mut acked_f = Field::auto(idx);
        acked_f.value = acked_run;
        idx = sdnv::write(&mut buf, &mut acked_f)?;

        let mut skipped_f = Field::auto(idx);
        skipped_f.value = skipped_run;
        idx = sdnv::write(&mut buf, &mut skipped_f)?;
    }

    buf.truncate(idx);
    Ok(buf)
}

/// Parses an ACS body, invoking `remove_cb` once per acknowledged CID in
/// ascending order. Returns the total number of CIDs acknowledged.
pub fn receive_ack(buf: &[u8], mut remove_cb: impl FnMut(Cid)) -> Result<usize, CodecError> {
    if buf.is_empty() {
        return Ok(0);
    }
    let mut idx = 0;
    let mut base = Field::auto(idx);
    idx = sdnv::read(buf, &mut base)?;

    let mut cursor = base.value;
    let mut total = 0usize;

    while idx < buf.len() {
        let mut acked_f = Field::auto(idx);
        idx = sdnv::read(buf, &mut acked_f)?;

        for offset in 0..acked_f.value {
            remove_cb(Cid(cursor + offset));
            total += 1;
        }
        cursor += acked_f.value;

        if idx >= buf.len() {
            break;
        }
        let mut skipped_f = Field::auto(idx);
        idx = sdnv::read(buf, &mut skipped_f)?;
        cursor += skipped_f.value;
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_run_round_trips() {
        let acked: Vec<Cid> = (10..15).map(Cid).collect();
        let body = populate_ack(&acked, 16).unwrap();

        let mut seen = Vec::new();
        let total = receive_ack(&body, |cid| seen.push(cid)).unwrap();
        assert_eq!(total, 5);
        assert_eq!(seen, acked);
    }

    #[test]
    fn two_runs_with_a_gap_round_trip() {
        let acked = vec![Cid(0), Cid(1), Cid(2), Cid(5), Cid(6)];
        let body = populate_ack(&acked, 16).unwrap();

        let mut seen = Vec::new();
        receive_ack(&body, |cid| seen.push(cid)).unwrap();
        assert_eq!(seen, acked);
    }

    #[test]
    fn fills_capped_at_max() {
        let acked = vec![Cid(0), Cid(2), Cid(4), Cid(6)];
        let body = populate_ack(&acked, 1).unwrap();
        let mut seen = Vec::new();
        let total = receive_ack(&body, |cid| seen.push(cid)).unwrap();
        assert_eq!(total, 1);
        assert_eq!(seen, vec![Cid(0)]);
    }
}
