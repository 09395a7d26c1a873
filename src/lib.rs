//! Session token store with interchangeable memory, file and Redis backends.
//!
//! ```no_run
//! use std::time::Duration;
//! use session_store::{SessionConfig, SessionStore, Token};
//!
//! # async fn demo() -> Result<(), session_store::SessionError> {
//! let store = SessionStore::connect(&SessionConfig::memory()).await?;
//! let token = Token::issue("colinskow", vec!["user".into()], "key", "secret", Duration::from_secs(60));
//! store.store_token(&token).await?;
//! let confirmed = store.confirm_token("key", Some("secret")).await?;
//! assert_eq!(confirmed.id, "colinskow");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod errors;
pub mod jobs;
pub mod models;
pub mod session;
pub mod store;

pub use config::{AdapterKind, SessionConfig};
pub use errors::{SessionError, SessionResult, StorageError};
pub use models::{StoredToken, Token};
pub use session::SessionStore;
