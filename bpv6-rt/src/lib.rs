//! OS abstraction layer for the BPv6 engine: named locks, a wall clock
//! with retrograde detection, a runtime-agnostic sleep, a logging sink
//! wired to `tracing`, and allocator byte-accounting.
//!
//! Everything here is modeled as an explicit `Runtime` handle created at
//! startup and threaded through the engine, rather than ambient process
//! globals — the lock registry, the log-enable mask, and the allocator
//! counters all hang off one value the caller owns.

pub mod alloc;
pub mod clock;
pub mod lock;
pub mod sleep;

pub use alloc::AllocStats;
pub use clock::{Clock, SystemClock};
pub use lock::{LockHandle, LockRegistry, Timeout};

/// Subset of [`bpv6::flags::EventFlags`] worth logging by default
/// (noncompliant / dropped / bundle-too-large).
pub fn default_log_enable_mask() -> bpv6::flags::EventFlags {
    bpv6::flags::EventFlags::NONCOMPLIANT
        | bpv6::flags::EventFlags::DROPPED
        | bpv6::flags::EventFlags::BUNDLE_TOO_LARGE
}

/// The collaborators the engine needs from its host environment, bundled
/// into one handle so nothing is reached via a process-wide global.
pub struct Runtime<C: Clock = SystemClock> {
    /// The lock registry backing named locks.
    pub locks: LockRegistry,
    /// The clock collaborator.
    pub clock: C,
    /// Allocator byte-accounting, shared across any storage backend that
    /// allocates bundle buffers.
    pub alloc_stats: AllocStats,
    /// Which event flags are actually logged.
    pub log_enable_mask: bpv6::flags::EventFlags,
}

impl Runtime<SystemClock> {
    /// A runtime using the real OS wall clock.
    pub fn new() -> Self {
        Self {
            locks: LockRegistry::new(),
            clock: SystemClock::default(),
            alloc_stats: AllocStats::default(),
            log_enable_mask: default_log_enable_mask(),
        }
    }
}

impl Default for Runtime<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> Runtime<C> {
    /// Emits a log line for `event` if it's in the enable mask.
    pub fn log(&self, event: bpv6::flags::EventFlags, file: &str, line: u32, message: &str) {
        if !self.log_enable_mask.intersects(event) {
            return;
        }
        if event.is_empty() {
            tracing::trace!(target: "bpv6", %file, line, "{message}");
        } else {
            tracing::warn!(target: "bpv6", %file, line, ?event, "{message}");
        }
    }
}
