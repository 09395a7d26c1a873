use std::time::Duration;

use thiserror::Error;

/// Failures raised by the session store to its callers.
///
/// `InvalidToken` deliberately covers every confirmation failure (unknown
/// key, expired token, wrong credential) so callers cannot probe which keys
/// exist. Infrastructure trouble is always reported as `Storage`.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid token")]
    InvalidToken,

    #[error("malformed token: {0}")]
    MalformedToken(&'static str),

    #[error("session store closed")]
    StoreClosed,

    #[error("storage error: {0}")]
    Storage(StorageError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl SessionError {
    /// True for failures a caller may retry (storage trouble, not bad input).
    pub fn is_storage(&self) -> bool {
        matches!(self, SessionError::Storage(_))
    }
}

impl From<StorageError> for SessionError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Closed => SessionError::StoreClosed,
            other => SessionError::Storage(other),
        }
    }
}

/// Failures raised by an adapter while talking to its backing storage.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("adapter closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown session adapter: {0}")]
    UnknownAdapter(String),

    #[error("missing config value: {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_adapter_maps_to_store_closed() {
        let err: SessionError = StorageError::Closed.into();
        assert!(matches!(err, SessionError::StoreClosed));
    }

    #[test]
    fn test_timeout_stays_a_storage_error() {
        let err: SessionError = StorageError::Timeout(Duration::from_millis(5)).into();
        assert!(err.is_storage());
        assert!(!matches!(err, SessionError::InvalidToken));
    }

    #[test]
    fn test_invalid_token_message() {
        assert_eq!(SessionError::InvalidToken.to_string(), "invalid token");
    }
}
