use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::RwLock;

use super::SessionAdapter;
use crate::config::{AdapterKind, RemoteConfig};
use crate::errors::StorageError;
use crate::models::token::key_fingerprint;
use crate::models::StoredToken;

/// Redis-backed session storage.
///
/// Expiry is native: tokens are written with `SET key value PX <ttl_ms>` and
/// Redis reclaims them itself. Every round-trip is bounded by the configured
/// timeout, and both timeouts and connection failures surface as
/// `StorageError`, never as a missing token.
pub struct RemoteAdapter {
    conn: RwLock<Option<ConnectionManager>>,
    prefix: String,
    timeout: Duration,
}

impl RemoteAdapter {
    pub async fn connect(config: &RemoteConfig) -> Result<Self, StorageError> {
        let timeout = config.timeout();
        let client = redis::Client::open(config.connection_url())?;
        let conn = match tokio::time::timeout(timeout, ConnectionManager::new(client)).await {
            Ok(conn) => conn?,
            Err(_) => return Err(StorageError::Timeout(timeout)),
        };

        tracing::info!(
            host = %config.host,
            port = config.port,
            db = config.db,
            prefix = %config.key_prefix,
            "connected to redis session backend"
        );

        Ok(Self {
            conn: RwLock::new(Some(conn)),
            prefix: config.key_prefix.clone(),
            timeout,
        })
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// A handle to the shared connection. In-flight commands keep their own
    /// clone, so `close` never cuts them off mid-request.
    async fn connection(&self) -> Result<ConnectionManager, StorageError> {
        self.conn.read().await.clone().ok_or(StorageError::Closed)
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, StorageError>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(StorageError::from),
            Err(_) => Err(StorageError::Timeout(self.timeout)),
        }
    }
}

#[async_trait]
impl SessionAdapter for RemoteAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Remote
    }

    async fn put(&self, key: &str, token: &StoredToken, ttl: Duration) -> Result<(), StorageError> {
        let mut conn = self.connection().await?;
        let full_key = self.namespaced(key);
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);

        // PX 0 is rejected by Redis; a dead token still has to replace
        // whatever live value the key held.
        if ttl_ms == 0 {
            self.bounded(conn.del::<_, u64>(&full_key)).await?;
            tracing::debug!(key = %key_fingerprint(key), "stored already-expired session; key cleared");
            return Ok(());
        }

        let json = serde_json::to_string(token)?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(&full_key).arg(json).arg("PX").arg(ttl_ms);
        self.bounded(cmd.query_async::<_, ()>(&mut conn)).await?;
        tracing::debug!(key = %key_fingerprint(key), ttl_ms, "session written to redis");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredToken>, StorageError> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = self
            .bounded(conn.get::<_, Option<String>>(self.namespaced(key)))
            .await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        let mut conn = self.connection().await?;
        let removed: u64 = self
            .bounded(conn.del::<_, u64>(self.namespaced(key)))
            .await?;
        Ok(removed > 0)
    }

    async fn close(&self) -> Result<(), StorageError> {
        match self.conn.write().await.take() {
            Some(_) => {
                tracing::info!("redis session backend closed");
                Ok(())
            }
            None => Err(StorageError::Closed),
        }
    }
}
