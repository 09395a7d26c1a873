//! Storage adapters for session tokens.
//!
//! Three backends share one contract:
//!   - `memory`: per-instance `DashMap`, lost on restart.
//!   - `file`: one JSON file per key, written via temp file + rename.
//!   - `remote`: Redis, with expiry delegated to `SET ... PX`.
//!
//! Whatever the backend, a `get` on a lapsed key must look exactly like a
//! `get` on a key that was never written, and a `put` on a live key replaces it.

pub mod file;
pub mod memory;
pub mod remote;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{AdapterKind, SessionConfig};
use crate::errors::{ConfigError, SessionError, StorageError};
use crate::models::StoredToken;

pub use file::FileAdapter;
pub use memory::MemoryAdapter;
pub use remote::RemoteAdapter;

/// Capability set every session storage backend provides.
#[async_trait]
pub trait SessionAdapter: Send + Sync {
    /// Which variant this is, for logs and diagnostics.
    fn kind(&self) -> AdapterKind;

    /// Write `token` under `key`, replacing any previous value.
    /// `ttl` is the remaining lifetime; zero means the token is already dead.
    async fn put(&self, key: &str, token: &StoredToken, ttl: Duration) -> Result<(), StorageError>;

    /// Read the token under `key`. Missing and expired entries are both `None`.
    async fn get(&self, key: &str) -> Result<Option<StoredToken>, StorageError>;

    /// Remove `key`. Returns whether an entry was present.
    async fn remove(&self, key: &str) -> Result<bool, StorageError>;

    /// Drop entries that are expired but still physically retained.
    /// Backends with native expiry have nothing to do.
    async fn evict_expired(&self) -> Result<usize, StorageError> {
        Ok(0)
    }

    /// Release connections, handles and memory held by the adapter.
    async fn close(&self) -> Result<(), StorageError>;
}

/// Build the adapter selected by `config`.
pub async fn build_adapter(config: &SessionConfig) -> Result<Arc<dyn SessionAdapter>, SessionError> {
    config.validate()?;

    let adapter: Arc<dyn SessionAdapter> = match config.adapter {
        AdapterKind::Memory => Arc::new(MemoryAdapter::new()),
        AdapterKind::File => {
            let file = config
                .file
                .as_ref()
                .ok_or(ConfigError::Missing("session.file.sessionsRoot"))?;
            Arc::new(FileAdapter::open(&file.sessions_root).await?)
        }
        AdapterKind::Remote => {
            let remote = config
                .remote
                .as_ref()
                .ok_or(ConfigError::Missing("session.remote"))?;
            Arc::new(RemoteAdapter::connect(remote).await?)
        }
    };

    tracing::info!(adapter = %adapter.kind(), "session adapter ready");
    Ok(adapter)
}
