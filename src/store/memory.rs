use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

use super::SessionAdapter;
use crate::config::AdapterKind;
use crate::errors::StorageError;
use crate::models::{now_millis, StoredToken};

/// In-process session storage.
///
/// Each instance owns its map, so independent stores can coexist in one
/// process. Expired entries are dropped lazily on read, or in bulk by
/// `evict_expired()`. Nothing survives a restart.
#[derive(Clone, Default)]
pub struct MemoryAdapter {
    entries: Arc<DashMap<String, StoredToken>>,
    closed: Arc<AtomicBool>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of physically retained entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl SessionAdapter for MemoryAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Memory
    }

    // The token's own `expires` is the absolute expiry, so `ttl` adds nothing here.
    async fn put(&self, key: &str, token: &StoredToken, _ttl: Duration) -> Result<(), StorageError> {
        self.ensure_open()?;
        self.entries.insert(key.to_string(), token.clone());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredToken>, StorageError> {
        self.ensure_open()?;
        let Some(entry) = self.entries.get(key) else {
            return Ok(None);
        };
        if !entry.is_expired() {
            return Ok(Some(entry.value().clone()));
        }

        // expired; release the shard lock before removing
        drop(entry);
        self.entries
            .remove_if(key, |_, token| token.is_expired_at(now_millis()));
        Ok(None)
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        self.ensure_open()?;
        // An expired entry is already gone as far as callers can tell.
        let removed = self.entries.remove(key);
        Ok(removed.is_some_and(|(_, token)| !token.is_expired()))
    }

    async fn evict_expired(&self) -> Result<usize, StorageError> {
        self.ensure_open()?;
        let now = now_millis();
        let before = self.entries.len();
        self.entries.retain(|_, token| !token.is_expired_at(now));
        Ok(before.saturating_sub(self.entries.len()))
    }

    async fn close(&self) -> Result<(), StorageError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(StorageError::Closed);
        }
        self.entries.clear();
        Ok(())
    }
}
