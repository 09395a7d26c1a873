//! File-backed session storage.
//!
//! Every token lives in its own JSON file under `sessions_root`:
//!
//! ```text
//! <sessions_root>/<hex(sha256(key))>.json
//! ```
//!
//! Key bytes never reach the filesystem directly, so arbitrary keys cannot
//! traverse out of the root or collide with reserved names. Writes go to a
//! uniquely named temp file in the same directory, are fsynced, then renamed
//! over the target: readers in this or any other process see either the old
//! record or the new one, never a torn write.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;

use super::SessionAdapter;
use crate::config::AdapterKind;
use crate::errors::StorageError;
use crate::models::token::key_fingerprint;
use crate::models::{now_millis, StoredToken};

const RECORD_EXT: &str = "json";
const TEMP_EXT: &str = "tmp";

/// Temp files older than this are leftovers from a crashed writer.
const STALE_TEMP_AGE: Duration = Duration::from_secs(300);

pub struct FileAdapter {
    root: PathBuf,
    closed: AtomicBool,
}

impl FileAdapter {
    /// Open (creating if needed) a session directory.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;
        tracing::debug!(root = %root.display(), "file session adapter opened");
        Ok(Self {
            root,
            closed: AtomicBool::new(false),
        })
    }

    /// Path of the record file for `key`.
    pub fn record_path(&self, key: &str) -> PathBuf {
        let name = hex::encode(Sha256::digest(key.as_bytes()));
        self.root.join(format!("{}.{}", name, RECORD_EXT))
    }

    fn temp_path(&self, record: &Path) -> PathBuf {
        let stem = record
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("record");
        self.root.join(format!(
            ".{}.{}.{}",
            stem,
            uuid::Uuid::new_v4().simple(),
            TEMP_EXT
        ))
    }

    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed);
        }
        Ok(())
    }

    async fn read_record(path: &Path) -> Result<Option<StoredToken>, StorageError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn write_atomic(&self, target: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        let temp = self.temp_path(target);
        let result: std::io::Result<()> = async {
            let mut file = tokio::fs::File::create(&temp).await?;
            file.write_all(bytes).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&temp, target).await
        }
        .await;

        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl SessionAdapter for FileAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::File
    }

    // Expiry is embedded in the record itself; `ttl` is not needed on disk.
    async fn put(&self, key: &str, token: &StoredToken, _ttl: Duration) -> Result<(), StorageError> {
        self.ensure_open()?;
        let bytes = serde_json::to_vec(token)?;
        let path = self.record_path(key);
        self.write_atomic(&path, &bytes).await?;
        tracing::debug!(key = %key_fingerprint(key), "session record written");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredToken>, StorageError> {
        self.ensure_open()?;
        let Some(token) = Self::read_record(&self.record_path(key)).await? else {
            return Ok(None);
        };
        if token.key != key {
            tracing::warn!(key = %key_fingerprint(key), "session record key mismatch; ignoring");
            return Ok(None);
        }
        if token.is_expired() {
            return Ok(None);
        }
        Ok(Some(token))
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        self.ensure_open()?;
        let path = self.record_path(key);
        // Expired, foreign or unreadable records count as absent but are
        // deleted all the same.
        let live = match Self::read_record(&path).await {
            Ok(Some(token)) => token.key == key && !token.is_expired(),
            Ok(None) => return Ok(false),
            Err(StorageError::Serialization(_)) => false,
            Err(e) => return Err(e),
        };
        let removed = remove_if_present(&path).await?;
        Ok(removed && live)
    }

    async fn evict_expired(&self) -> Result<usize, StorageError> {
        self.ensure_open()?;
        let now = now_millis();
        let mut evicted = 0;
        let mut dir = tokio::fs::read_dir(&self.root).await?;

        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            match path.extension().and_then(|e| e.to_str()) {
                Some(RECORD_EXT) => {
                    let token = match Self::read_record(&path).await {
                        Ok(Some(t)) => t,
                        Ok(None) => continue,
                        Err(e) => {
                            tracing::warn!(path = %path.display(), error = %e, "skipping unreadable session record");
                            continue;
                        }
                    };
                    if token.is_expired_at(now) && remove_if_present(&path).await? {
                        evicted += 1;
                    }
                }
                Some(TEMP_EXT) => {
                    let stale = entry
                        .metadata()
                        .await
                        .and_then(|m| m.modified())
                        .ok()
                        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
                        .is_some_and(|age| age > STALE_TEMP_AGE);
                    if stale {
                        remove_if_present(&path).await?;
                    }
                }
                _ => {}
            }
        }

        Ok(evicted)
    }

    async fn close(&self) -> Result<(), StorageError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(StorageError::Closed);
        }
        Ok(())
    }
}

async fn remove_if_present(path: &Path) -> Result<bool, StorageError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Token;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("session-file-{}", uuid::Uuid::new_v4().simple()))
    }

    fn token(key: &str, ttl_ms: i64) -> StoredToken {
        let now = now_millis();
        Token {
            id: "user".into(),
            roles: vec!["admin".into()],
            key: key.into(),
            credential: "secret".into(),
            issued: now,
            expires: now + ttl_ms,
        }
        .to_stored()
    }

    #[tokio::test]
    async fn test_round_trip_through_disk() {
        let dir = scratch_dir();
        let adapter = FileAdapter::open(&dir).await.unwrap();
        let t = token("abc", 60_000);

        adapter.put("abc", &t, t.ttl()).await.unwrap();
        assert!(adapter.record_path("abc").exists());
        assert_eq!(adapter.get("abc").await.unwrap(), Some(t));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_hostile_keys_stay_inside_root() {
        let dir = scratch_dir();
        let adapter = FileAdapter::open(&dir).await.unwrap();

        for key in ["../../etc/passwd", "a/b\\c", "CON", "nul\0byte", ""] {
            let path = adapter.record_path(key);
            assert_eq!(path.parent(), Some(dir.as_path()), "key {:?} escaped root", key);
        }

        let t = token("../escape", 60_000);
        adapter.put("../escape", &t, t.ttl()).await.unwrap();
        assert!(adapter.get("../escape").await.unwrap().is_some());

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_record_reads_as_absent() {
        let dir = scratch_dir();
        let adapter = FileAdapter::open(&dir).await.unwrap();
        let t = token("old", -5);

        adapter.put("old", &t, Duration::ZERO).await.unwrap();
        assert_eq!(adapter.get("old").await.unwrap(), None);

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let dir = scratch_dir();
        let adapter = FileAdapter::open(&dir).await.unwrap();
        let t = token("k", 60_000);
        adapter.put("k", &t, t.ttl()).await.unwrap();
        adapter.put("k", &t, t.ttl()).await.unwrap();

        let mut names = Vec::new();
        let mut rd = tokio::fs::read_dir(&dir).await.unwrap();
        while let Some(e) = rd.next_entry().await.unwrap() {
            names.push(e.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names.len(), 1, "unexpected files: {:?}", names);
        assert!(names[0].ends_with(".json"));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_record_is_a_storage_error() {
        let dir = scratch_dir();
        let adapter = FileAdapter::open(&dir).await.unwrap();
        tokio::fs::write(adapter.record_path("broken"), b"{not json")
            .await
            .unwrap();

        let err = adapter.get("broken").await.unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_remove_and_evict() {
        let dir = scratch_dir();
        let adapter = FileAdapter::open(&dir).await.unwrap();
        let live = token("live", 60_000);
        let dead = token("dead", -5);
        adapter.put("live", &live, live.ttl()).await.unwrap();
        adapter.put("dead", &dead, Duration::ZERO).await.unwrap();

        assert_eq!(adapter.evict_expired().await.unwrap(), 1);
        assert!(!adapter.record_path("dead").exists());

        assert!(adapter.remove("live").await.unwrap());
        assert!(!adapter.remove("live").await.unwrap());

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_remove_of_expired_record_reports_absent() {
        let dir = scratch_dir();
        let adapter = FileAdapter::open(&dir).await.unwrap();
        let dead = token("dead", -5);
        adapter.put("dead", &dead, Duration::ZERO).await.unwrap();

        assert!(!adapter.remove("dead").await.unwrap());
        assert!(!adapter.record_path("dead").exists());

        tokio::fs::write(adapter.record_path("broken"), b"{not json")
            .await
            .unwrap();
        assert!(!adapter.remove("broken").await.unwrap());
        assert!(!adapter.record_path("broken").exists());

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_second_instance_sees_first_instance_writes() {
        let dir = scratch_dir();
        let writer = FileAdapter::open(&dir).await.unwrap();
        let reader = FileAdapter::open(&dir).await.unwrap();
        let t = token("shared", 60_000);

        writer.put("shared", &t, t.ttl()).await.unwrap();
        assert_eq!(reader.get("shared").await.unwrap(), Some(t));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
