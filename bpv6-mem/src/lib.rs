//! In-memory `Storage` backend and deserializable `Config`. Used by the
//! engine's own tests and by any embedder that doesn't need persistence.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bpv6_core::{Storage, StorageError, StorageId, Timeout};
use bpv6_rt::AllocStats;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

pub use bpv6_rt::clock::SystemClock;

/// Tunables for the in-memory engine, deserializable via `serde`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Capacity of the active-bundle table.
    pub active_table_capacity: usize,
    /// Maximum bundle length a route built with this config will carry.
    pub max_bundle_length: usize,
    /// Default bundle lifetime in seconds when a caller doesn't override it.
    pub default_lifetime_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            active_table_capacity: 1024,
            max_bundle_length: 8192,
            default_lifetime_secs: 3600,
        }
    }
}

/// An in-memory, process-local bundle fragment store keyed by an
/// incrementing [`StorageId`], with [`AllocStats`] accounting for every
/// stored byte.
pub struct MemStorage {
    fragments: Mutex<HashMap<u64, Vec<u8>>>,
    next_id: AtomicU64,
    alloc_stats: AllocStats,
}

impl MemStorage {
    /// An empty store.
    pub fn new() -> Self {
        Self {
            fragments: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            alloc_stats: AllocStats::default(),
        }
    }

    /// Allocation byte-accounting for everything currently stored.
    pub fn alloc_stats(&self) -> &AllocStats {
        &self.alloc_stats
    }

    /// Number of fragments currently held.
    pub async fn len(&self) -> usize {
        self.fragments.lock().await.len()
    }

    /// `true` iff no fragments are currently held.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Every stored fragment, in the order [`Storage::create`] assigned
    /// their ids — the order the send path produced them in.
    pub async fn all_ordered(&self) -> Vec<Vec<u8>> {
        let guard = self.fragments.lock().await;
        let mut ids: Vec<&u64> = guard.keys().collect();
        ids.sort_unstable();
        ids.into_iter().map(|id| guard[id].clone()).collect()
    }
}

impl Default for MemStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MemStorage {
    async fn create(
        &self,
        _is_record: bool,
        bytes: &[u8],
        _timeout: Timeout,
    ) -> Result<StorageId, StorageError> {
        let id = self.next_id.fetch_add(1, Ordering::AcqRel);
        self.alloc_stats.record_alloc(bytes.len());
        self.fragments.lock().await.insert(id, bytes.to_vec());
        Ok(StorageId(id))
    }

    async fn delete(&self, id: StorageId) -> Result<(), StorageError> {
        let removed = self.fragments.lock().await.remove(&id.0);
        match removed {
            Some(bytes) => {
                self.alloc_stats.record_free(bytes.len());
                Ok(())
            }
            None => Err(StorageError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_delete_round_trips() {
        let storage = MemStorage::new();
        let id = storage
            .create(false, b"HELLO", Timeout::Forever)
            .await
            .unwrap();
        assert_eq!(storage.len().await, 1);
        assert_eq!(storage.alloc_stats().current_bytes(), 5);

        storage.delete(id).await.unwrap();
        assert!(storage.is_empty().await);
        assert_eq!(storage.alloc_stats().current_bytes(), 0);
    }

    #[tokio::test]
    async fn delete_unknown_id_fails() {
        let storage = MemStorage::new();
        assert!(matches!(
            storage.delete(StorageId(42)).await,
            Err(StorageError::NotFound)
        ));
    }

    #[test]
    fn default_config_has_sane_capacity() {
        let cfg = Config::default();
        assert!(cfg.active_table_capacity > 0);
        assert!(cfg.max_bundle_length > 0);
    }
}
