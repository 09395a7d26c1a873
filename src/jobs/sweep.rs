//! Background job: drop expired sessions that a backend still holds on to.
//!
//! Expiry is always enforced at read time; this job only bounds memory and
//! disk usage for the memory and file adapters. Redis expires keys itself,
//! so sweeping a remote store is a cheap no-op.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time;

use crate::errors::SessionError;
use crate::session::SessionStore;

/// Sweep cadence for long-running services that have no reason to pick another.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Spawn the sweeper. The task exits on its own once the store is closed.
///
/// ```no_run
/// # async fn run() -> session_store::SessionResult<()> {
/// use std::sync::Arc;
/// use session_store::jobs::sweep::{self, DEFAULT_SWEEP_INTERVAL};
/// use session_store::{SessionConfig, SessionStore};
///
/// let store = Arc::new(SessionStore::connect(&SessionConfig::file(".session")).await?);
/// let sweeper = sweep::spawn(store.clone(), DEFAULT_SWEEP_INTERVAL);
///
/// // ... serve requests ...
///
/// store.quit().await?;
/// let _ = sweeper.await;
/// # Ok(())
/// # }
/// ```
pub fn spawn(store: Arc<SessionStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(every);
        // the first tick fires immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            match store.sweep_expired().await {
                Ok(0) => tracing::debug!("session sweep: nothing expired"),
                Ok(evicted) => tracing::info!(
                    evicted,
                    adapter = %store.adapter_kind(),
                    "session sweep removed expired tokens"
                ),
                Err(SessionError::StoreClosed) => {
                    tracing::debug!("session store closed; sweeper exiting");
                    return;
                }
                Err(e) => tracing::warn!(error = %e, "session sweep failed"),
            }
        }
    })
}
