use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// A freshly issued session token, as handed to `SessionStore::store_token`.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    /// Owner identity. Not unique: one user may hold many tokens.
    pub id: String,
    pub roles: Vec<String>,
    /// Secret lookup key. Unique among live tokens.
    pub key: String,
    /// Secret compared on confirmation. Never persisted in clear.
    pub credential: String,
    /// Milliseconds since the Unix epoch.
    pub issued: i64,
    /// Milliseconds since the Unix epoch.
    pub expires: i64,
}

impl Token {
    /// Build a token issued now that lives for `ttl`.
    pub fn issue(
        id: impl Into<String>,
        roles: Vec<String>,
        key: impl Into<String>,
        credential: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        let issued = now_millis();
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        Self {
            id: id.into(),
            roles,
            key: key.into(),
            credential: credential.into(),
            issued,
            expires: issued.saturating_add(ttl_ms),
        }
    }

    /// Convert into the persisted form, replacing the credential with its digest.
    pub fn to_stored(&self) -> StoredToken {
        StoredToken {
            id: self.id.clone(),
            roles: self.roles.clone(),
            key: self.key.clone(),
            credential_hash: credential_digest(&self.credential),
            issued: self.issued,
            expires: self.expires,
        }
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("id", &self.id)
            .field("roles", &self.roles)
            .field("key", &"[REDACTED]")
            .field("credential", &"[REDACTED]")
            .field("issued", &self.issued)
            .field("expires", &self.expires)
            .finish()
    }
}

/// The persisted form of a [`Token`], and what a successful confirmation returns.
///
/// The JSON layout (`_id`, `roles`, `key`, `credential_hash`, `issued`,
/// `expires`) is shared by the file and Redis adapters, so a token written
/// by one process can be confirmed by any other process using the same backend.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    #[serde(rename = "_id")]
    pub id: String,
    pub roles: Vec<String>,
    pub key: String,
    pub(crate) credential_hash: String,
    pub issued: i64,
    pub expires: i64,
}

impl StoredToken {
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms >= self.expires
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_millis())
    }

    /// Remaining lifetime, or zero once expired.
    pub fn ttl(&self) -> Duration {
        let remaining = self.expires.saturating_sub(now_millis());
        Duration::from_millis(u64::try_from(remaining).unwrap_or(0))
    }

    /// Constant-time comparison of `credential` against the stored digest.
    pub fn credential_matches(&self, credential: &str) -> bool {
        let presented = credential_digest(credential);
        presented
            .as_bytes()
            .ct_eq(self.credential_hash.as_bytes())
            .into()
    }
}

impl fmt::Debug for StoredToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredToken")
            .field("id", &self.id)
            .field("roles", &self.roles)
            .field("key", &"[REDACTED]")
            .field("issued", &self.issued)
            .field("expires", &self.expires)
            .finish()
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn credential_digest(credential: &str) -> String {
    hex::encode(Sha256::digest(credential.as_bytes()))
}

/// Short, non-reversible label for a key, safe to put in log lines.
pub fn key_fingerprint(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    hex::encode(&digest[..4])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Token {
        Token {
            id: "colinskow".into(),
            roles: vec!["admin".into(), "user".into()],
            key: "test123".into(),
            credential: "pass123".into(),
            issued: 1_000,
            expires: 51_000,
        }
    }

    #[test]
    fn test_stored_token_never_contains_plaintext_credential() {
        let stored = sample().to_stored();
        let json = serde_json::to_string(&stored).unwrap();
        assert!(!json.contains("pass123"), "credential leaked: {}", json);
        assert!(json.contains("\"_id\":\"colinskow\""));
    }

    #[test]
    fn test_credential_matches() {
        let stored = sample().to_stored();
        assert!(stored.credential_matches("pass123"));
        assert!(!stored.credential_matches("wrongpass"));
        assert!(!stored.credential_matches(""));
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let stored = sample().to_stored();
        assert!(!stored.is_expired_at(50_999));
        assert!(stored.is_expired_at(51_000));
    }

    #[test]
    fn test_issue_sets_expiry_from_ttl() {
        let token = Token::issue("u", vec![], "k", "c", Duration::from_secs(60));
        assert_eq!(token.expires - token.issued, 60_000);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let out = format!("{:?} {:?}", sample(), sample().to_stored());
        assert!(!out.contains("pass123"));
        assert!(!out.contains("test123"));
    }
}
