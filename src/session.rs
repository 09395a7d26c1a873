//! Session token store.
//!
//! `SessionStore` is the only entry point callers use. It validates input,
//! hands storage to the configured adapter, and applies the confirmation
//! rules itself so every backend behaves the same way.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::{AdapterKind, SessionConfig};
use crate::errors::{SessionError, SessionResult};
use crate::models::token::key_fingerprint;
use crate::models::{now_millis, StoredToken, Token};
use crate::store::{build_adapter, SessionAdapter};

pub struct SessionStore {
    adapter: Arc<dyn SessionAdapter>,
    closed: AtomicBool,
}

impl SessionStore {
    /// Build a store backed by the adapter `config` selects.
    pub async fn connect(config: &SessionConfig) -> SessionResult<Self> {
        let adapter = build_adapter(config).await?;
        Ok(Self::with_adapter(adapter))
    }

    /// Build a store around an already constructed adapter.
    pub fn with_adapter(adapter: Arc<dyn SessionAdapter>) -> Self {
        Self {
            adapter,
            closed: AtomicBool::new(false),
        }
    }

    pub fn adapter_kind(&self) -> AdapterKind {
        self.adapter.kind()
    }

    fn ensure_open(&self) -> SessionResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SessionError::StoreClosed);
        }
        Ok(())
    }

    /// Persist `token` under its key, replacing any token already stored there.
    ///
    /// A token whose `expires` is already in the past is accepted, but will
    /// never confirm.
    pub async fn store_token(&self, token: &Token) -> SessionResult<()> {
        self.ensure_open()?;
        if token.key.is_empty() {
            return Err(SessionError::MalformedToken("key must not be empty"));
        }
        if token.credential.is_empty() {
            return Err(SessionError::MalformedToken("credential must not be empty"));
        }

        let stored = token.to_stored();
        let ttl = stored.ttl();
        self.adapter.put(&token.key, &stored, ttl).await?;

        tracing::debug!(
            adapter = %self.adapter.kind(),
            key = %key_fingerprint(&token.key),
            ttl_ms = ttl.as_millis() as u64,
            "session token stored"
        );
        Ok(())
    }

    /// Confirm that `key` names a live token and, when `credential` is given,
    /// that it matches.
    ///
    /// Unknown key, expired token and wrong credential all fail with the same
    /// `InvalidToken`. Passing `None` skips the credential check, which is how
    /// callers prove a key is gone after deleting it.
    pub async fn confirm_token(
        &self,
        key: &str,
        credential: Option<&str>,
    ) -> SessionResult<StoredToken> {
        self.ensure_open()?;
        if key.is_empty() {
            return Err(SessionError::InvalidToken);
        }

        let token = match self.adapter.get(key).await? {
            // Adapters already hide expired entries; re-check here so clock
            // rounding in a backend cannot let a dead token through.
            Some(t) if !t.is_expired_at(now_millis()) => t,
            _ => {
                tracing::debug!(key = %key_fingerprint(key), "session token rejected: absent or expired");
                return Err(SessionError::InvalidToken);
            }
        };

        if let Some(presented) = credential {
            if !token.credential_matches(presented) {
                tracing::debug!(key = %key_fingerprint(key), "session token rejected: credential mismatch");
                return Err(SessionError::InvalidToken);
            }
        }

        Ok(token)
    }

    /// Remove the token under `key`. Returns `1` if one was removed, `0` otherwise.
    pub async fn delete_token(&self, key: &str) -> SessionResult<u64> {
        self.ensure_open()?;
        let removed = self.adapter.remove(key).await?;
        tracing::debug!(key = %key_fingerprint(key), removed, "session token delete");
        Ok(u64::from(removed))
    }

    /// Remove several tokens, e.g. every session of a user on logout.
    /// Returns how many were actually removed. Stops at the first storage failure.
    pub async fn delete_tokens<I, K>(&self, keys: I) -> SessionResult<u64>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let mut total = 0;
        for key in keys {
            total += self.delete_token(key.as_ref()).await?;
        }
        Ok(total)
    }

    /// Drop expired entries the backend still holds. Returns how many went.
    pub async fn sweep_expired(&self) -> SessionResult<usize> {
        self.ensure_open()?;
        Ok(self.adapter.evict_expired().await?)
    }

    /// Release the adapter's resources. Every later call, including a second
    /// `quit`, fails with `StoreClosed`.
    pub async fn quit(&self) -> SessionResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(SessionError::StoreClosed);
        }
        self.adapter.close().await?;
        tracing::info!(adapter = %self.adapter.kind(), "session store closed");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
