//! Active-bundle table: a fixed-capacity, CID-indexed circular
//! array supporting O(1) add/lookup/erase, used to drive custody
//! retransmission and ACS ingest.

use bpv6_core::{Cid, StorageId};
use thiserror::Error;

/// Errors from active-bundle-table operations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CbufError {
    /// `add` without `overwrite` found the slot already holding this CID.
    #[error("CID {0:?} is already present")]
    Duplicate(Cid),
    /// The table has no free slot to service the request.
    #[error("table is full")]
    Full,
    /// `remove`/`available` named a CID whose slot doesn't hold it.
    #[error("CID {0:?} is not present")]
    NotFound(Cid),
    /// `next` was called on a table with nothing outstanding.
    #[error("no outstanding bundle")]
    Timeout,
}

/// One slot's worth of custody bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveBundle {
    /// Where the fragment's bytes live.
    pub storage_id: StorageId,
    /// Absolute retransmit deadline, seconds since 2000-01-01 UTC.
    pub retransmit_time: u64,
    /// The CID this record tracks.
    pub custody_id: Cid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Vacant,
    Occupied(ActiveBundle),
}

/// The active-bundle table itself.
pub struct CircularBundleTable {
    slots: Vec<Slot>,
    num_entries: usize,
    oldest_cid: Cid,
    newest_cid: Cid,
}

impl CircularBundleTable {
    /// Creates an empty table of the given capacity.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "active bundle table capacity must be nonzero");
        Self {
            slots: vec![Slot::Vacant; capacity],
            num_entries: 0,
            oldest_cid: Cid(0),
            newest_cid: Cid(0),
        }
    }

    /// Table capacity.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    pub fn count(&self) -> usize {
        self.num_entries
    }

    fn index_of(&self, cid: Cid) -> usize {
        (cid.0 % self.slots.len() as u64) as usize
    }

    /// Returns `Ok(())` iff the slot `cid` would occupy is currently
    /// vacant.
    pub fn available(&self, cid: Cid) -> Result<(), CbufError> {
        match self.slots[self.index_of(cid)] {
            Slot::Vacant => Ok(()),
            Slot::Occupied(_) => Err(CbufError::Full),
        }
    }

    /// Inserts `record`. Without `overwrite`, a non-vacant slot whose CID
    /// already equals `record.custody_id` is reported as
    /// [`CbufError::Duplicate`] rather than clobbered; any other
    /// occupant is overwritten regardless (CID collisions within
    /// `capacity` distance are only ever detected by this equality
    /// check, never refused outright).
    pub fn add(&mut self, record: ActiveBundle, overwrite: bool) -> Result<(), CbufError> {
        let idx = self.index_of(record.custody_id);
        if !overwrite {
            if let Slot::Occupied(existing) = self.slots[idx] {
                if existing.custody_id == record.custody_id {
                    return Err(CbufError::Duplicate(record.custody_id));
                }
            }
        }

        if matches!(self.slots[idx], Slot::Vacant) {
            self.num_entries += 1;
        }
        self.slots[idx] = Slot::Occupied(record);

        if !overwrite && record.custody_id.0 >= self.newest_cid.0 {
            self.newest_cid = record.custody_id.next();
        }
        Ok(())
    }

    /// Returns the oldest outstanding record, advancing `oldest_cid` past
    /// any vacant slots it finds along the way. `oldest_cid` is the only
    /// thing `next` ever advances; `remove` leaves it untouched.
    pub fn next(&mut self) -> Result<ActiveBundle, CbufError> {
        while self.oldest_cid.0 < self.newest_cid.0 {
            let idx = self.index_of(self.oldest_cid);
            if let Slot::Occupied(record) = self.slots[idx] {
                if record.custody_id == self.oldest_cid {
                    return Ok(record);
                }
            }
            self.oldest_cid = self.oldest_cid.next();
        }
        Err(CbufError::Timeout)
    }

    /// Removes and returns the record for `cid`; the slot must be
    /// occupied by exactly that CID.
    pub fn remove(&mut self, cid: Cid) -> Result<ActiveBundle, CbufError> {
        let idx = self.index_of(cid);
        match self.slots[idx] {
            Slot::Occupied(record) if record.custody_id == cid => {
                self.slots[idx] = Slot::Vacant;
                self.num_entries -= 1;
                Ok(record)
            }
            _ => Err(CbufError::NotFound(cid)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(cid: u64) -> ActiveBundle {
        ActiveBundle {
            storage_id: StorageId(cid),
            retransmit_time: 0,
            custody_id: Cid(cid),
        }
    }

    #[test]
    fn wraparound_reuses_slot_after_remove() {
        let mut table = CircularBundleTable::new(8);
        for cid in 0..8 {
            table.add(record(cid), false).unwrap();
        }
        table.remove(Cid(3)).unwrap();
        table.add(record(11), false).unwrap(); // 11 % 8 == 3
        assert_eq!(table.count(), 8);

        let first = table.next().unwrap();
        assert_eq!(first.custody_id, Cid(0));
        table.remove(Cid(0)).unwrap();
        let second = table.next().unwrap();
        assert_eq!(second.custody_id, Cid(1));
    }

    #[test]
    fn duplicate_insert_without_overwrite_is_rejected() {
        let mut table = CircularBundleTable::new(8);
        table.add(record(0), false).unwrap();
        let err = table.add(record(0), false).unwrap_err();
        assert!(matches!(err, CbufError::Duplicate(Cid(0))));
        assert_eq!(table.count(), 1);
    }

    #[test]
    fn next_is_monotone_in_oldest_cid() {
        let mut table = CircularBundleTable::new(4);
        table.add(record(1), false).unwrap();
        table.add(record(2), false).unwrap();
        let first = table.next().unwrap();
        assert_eq!(first.custody_id, Cid(1));
        table.remove(Cid(1)).unwrap();
        let second = table.next().unwrap();
        assert_eq!(second.custody_id, Cid(2));
    }

    #[test]
    fn next_on_empty_table_times_out() {
        let mut table = CircularBundleTable::new(4);
        assert!(matches!(table.next(), Err(CbufError::Timeout)));
    }

    #[test]
    fn count_always_matches_occupied_slots() {
        let mut table = CircularBundleTable::new(4);
        table.add(record(0), false).unwrap();
        table.add(record(1), false).unwrap();
        table.remove(Cid(0)).unwrap();
        assert_eq!(table.count(), 1);
    }
}
