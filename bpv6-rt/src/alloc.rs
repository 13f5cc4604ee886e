//! Allocator byte-accounting, shared by any storage backend that
//! allocates bundle buffers.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Process-wide allocation counters. The high-water mark is a diagnostic,
/// not an enforced limit.
#[derive(Default)]
pub struct AllocStats {
    current_bytes: AtomicUsize,
    high_water_bytes: AtomicUsize,
}

impl AllocStats {
    /// Records an allocation of `bytes`, updating the high-water mark if
    /// this pushes `current_bytes` past it.
    pub fn record_alloc(&self, bytes: usize) {
        let current = self.current_bytes.fetch_add(bytes, Ordering::AcqRel) + bytes;
        self.high_water_bytes.fetch_max(current, Ordering::AcqRel);
    }

    /// Records a deallocation of `bytes`.
    pub fn record_free(&self, bytes: usize) {
        self.current_bytes.fetch_sub(bytes, Ordering::AcqRel);
    }

    /// Bytes currently accounted as allocated.
    pub fn current_bytes(&self) -> usize {
        self.current_bytes.load(Ordering::Acquire)
    }

    /// The highest `current_bytes` has ever reached.
    pub fn high_water_bytes(&self) -> usize {
        self.high_water_bytes.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_water_tracks_peak_not_current() {
        let stats = AllocStats::default();
        stats.record_alloc(100);
        stats.record_alloc(50);
        stats.record_free(100);
        assert_eq!(stats.current_bytes(), 50);
        assert_eq!(stats.high_water_bytes(), 150);
    }
}
