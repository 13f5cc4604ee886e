//! Named locks: a (mutex, condvar) pair per entry in a process-wide
//! registry, addressed by an opaque serial-encoded handle rather than a
//! raw pointer, so a destroyed lock can't be dereferenced once it's gone.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;

/// Errors from the lock registry.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The handle does not name a live lock (destroyed, or never issued).
    #[error("lock handle is stale or unknown")]
    InvalidHandle,
    /// A wait expired before the lock could be acquired / the condition
    /// was signaled.
    #[error("lock wait timed out")]
    Timeout,
}

/// How long a blocking lock call should wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Return `Timeout` immediately if the lock is not free.
    Immediate,
    /// Block until the lock is free.
    Forever,
    /// Block for at most this many milliseconds.
    Millis(u64),
}

impl Timeout {
    /// Converts the classic `-1 = forever / 0 = immediate / n = ms` integer
    /// encoding into a [`Timeout`].
    pub fn from_millis_encoded(timeout_ms: i64) -> Self {
        match timeout_ms {
            i64::MIN..=-1 => Timeout::Forever,
            0 => Timeout::Immediate,
            ms => Timeout::Millis(ms as u64),
        }
    }
}

/// An opaque handle to a named lock. Never dereferenced directly; only
/// the [`LockRegistry`] that issued it can resolve it back to a lock, and
/// only while the generation recorded in the handle still matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockHandle {
    serial: u32,
}

struct Entry {
    mutex: Mutex<bool>,
    condvar: Condvar,
}

/// A process-wide table of named locks, protected by its own recursive
/// registration mutex (registering/destroying locks is rare; acquiring
/// one that already exists never touches this outer mutex after lookup).
#[derive(Default)]
pub struct LockRegistry {
    next_serial: Mutex<u32>,
    entries: Mutex<HashMap<u32, Arc<Entry>>>,
}

impl LockRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a new named lock, returning its handle.
    pub fn create(&self) -> LockHandle {
        let mut next = self.next_serial.lock().unwrap();
        let serial = *next;
        *next = next.wrapping_add(1);
        drop(next);

        self.entries.lock().unwrap().insert(
            serial,
            Arc::new(Entry {
                mutex: Mutex::new(false),
                condvar: Condvar::new(),
            }),
        );
        LockHandle { serial }
    }

    /// Destroys a named lock. Any handle referencing it becomes invalid.
    pub fn destroy(&self, handle: LockHandle) {
        self.entries.lock().unwrap().remove(&handle.serial);
    }

    fn resolve(&self, handle: LockHandle) -> Result<Arc<Entry>, Error> {
        self.entries
            .lock()
            .unwrap()
            .get(&handle.serial)
            .cloned()
            .ok_or(Error::InvalidHandle)
    }

    /// Acquires the named lock, marking it held for the duration of the
    /// returned guard's lifetime, honoring `timeout`.
    pub fn acquire(&self, handle: LockHandle, timeout: Timeout) -> Result<LockGuard<'_>, Error> {
        let entry = self.resolve(handle)?;
        let mut held = entry.mutex.lock().unwrap();

        match timeout {
            Timeout::Immediate => {
                if *held {
                    return Err(Error::Timeout);
                }
            }
            Timeout::Forever => {
                while *held {
                    held = entry.condvar.wait(held).unwrap();
                }
            }
            Timeout::Millis(ms) => {
                let deadline = Instant::now() + Duration::from_millis(ms);
                while *held {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(Error::Timeout);
                    }
                    let (guard, result) =
                        entry.condvar.wait_timeout(held, remaining).unwrap();
                    held = guard;
                    if result.timed_out() && *held {
                        return Err(Error::Timeout);
                    }
                }
            }
        }

        *held = true;
        Ok(LockGuard {
            entry,
            _registry: self,
        })
    }
}

/// RAII guard releasing and signaling a named lock on drop.
pub struct LockGuard<'a> {
    entry: Arc<Entry>,
    _registry: &'a LockRegistry,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        let mut held = self.entry.mutex.lock().unwrap();
        *held = false;
        self.entry.condvar.notify_one();
    }
}
