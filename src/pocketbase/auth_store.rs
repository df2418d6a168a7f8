use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::{broadcast, RwLock};

use super::error::PocketBaseError;

/// The authenticated user record as returned by PocketBase auth endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRecord {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, rename = "collectionName")]
    pub collection_name: String,
    #[serde(default)]
    pub verified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthChange {
    Saved(AuthRecord),
    Cleared,
}

impl AuthChange {
    pub fn record(&self) -> Option<&AuthRecord> {
        match self {
            Self::Saved(record) => Some(record),
            Self::Cleared => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredAuth {
    token: String,
    record: AuthRecord,
}

/// Holds the current auth token and record, optionally mirrored to a JSON
/// file, and broadcasts every change to subscribers.
#[derive(Debug)]
pub struct AuthStore {
    current: RwLock<Option<StoredAuth>>,
    changes: broadcast::Sender<AuthChange>,
    persist_path: Option<PathBuf>,
}

impl Default for AuthStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            current: RwLock::new(None),
            changes,
            persist_path: None,
        }
    }

    /// Opens a store backed by `path`. A missing file is an empty session; an
    /// unreadable one is discarded with a warning.
    pub async fn with_file(path: impl Into<PathBuf>) -> Result<Self, PocketBaseError> {
        let path = path.into();
        let mut store = Self::new();

        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => match serde_json::from_str::<StoredAuth>(&raw) {
                Ok(stored) => {
                    debug!("Loaded persisted session for user {}", stored.record.id);
                    store.current = RwLock::new(Some(stored));
                }
                Err(e) => warn!("Ignoring unreadable session file {}: {e}", path.display()),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(PocketBaseError::Io(e.to_string())),
        }

        store.persist_path = Some(path);
        Ok(store)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.changes.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.changes.receiver_count()
    }

    pub async fn token(&self) -> Option<String> {
        self.current.read().await.as_ref().map(|s| s.token.clone())
    }

    pub async fn record(&self) -> Option<AuthRecord> {
        self.current.read().await.as_ref().map(|s| s.record.clone())
    }

    /// True when a token is held and its `exp` claim lies in the future.
    pub async fn is_valid(&self) -> bool {
        match self.current.read().await.as_ref() {
            Some(stored) => token_expiry(&stored.token).is_some_and(|exp| exp > Utc::now().timestamp()),
            None => false,
        }
    }

    pub async fn save(&self, token: String, record: AuthRecord) -> Result<(), PocketBaseError> {
        let stored = StoredAuth {
            token,
            record: record.clone(),
        };
        self.persist(Some(&stored)).await?;
        *self.current.write().await = Some(stored);
        let _ = self.changes.send(AuthChange::Saved(record));
        Ok(())
    }

    /// Drops the session locally. Never fails: a persistence error is logged
    /// and the in-memory state is cleared regardless.
    pub async fn clear(&self) {
        if let Err(e) = self.persist(None).await {
            warn!("Failed to remove persisted session: {e}");
        }
        *self.current.write().await = None;
        let _ = self.changes.send(AuthChange::Cleared);
    }

    async fn persist(&self, stored: Option<&StoredAuth>) -> Result<(), PocketBaseError> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };

        match stored {
            Some(stored) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| PocketBaseError::Io(e.to_string()))?;
                }
                let raw = serde_json::to_string_pretty(stored)
                    .map_err(|e| PocketBaseError::Parse(e.to_string()))?;
                tokio::fs::write(path, raw)
                    .await
                    .map_err(|e| PocketBaseError::Io(e.to_string()))
            }
            None => match tokio::fs::remove_file(path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(PocketBaseError::Io(e.to_string())),
            },
        }
    }
}

/// Reads the `exp` claim of a JWT without verifying its signature.
fn token_expiry(token: &str) -> Option<i64> {
    #[derive(Deserialize)]
    struct Claims {
        exp: i64,
    }

    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice::<Claims>(&bytes).ok().map(|c| c.exp)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn make_token(exp: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"id":"u1","exp":{exp}}}"#));
        format!("{header}.{payload}.signature")
    }

    pub(crate) fn record(id: &str, email: &str) -> AuthRecord {
        AuthRecord {
            id: id.to_string(),
            email: email.to_string(),
            collection_name: "users".to_string(),
            verified: false,
        }
    }

    #[test]
    fn test_token_expiry_reads_exp_claim() {
        assert_eq!(token_expiry(&make_token(1_900_000_000)), Some(1_900_000_000));
        assert_eq!(token_expiry("not-a-jwt"), None);
        assert_eq!(token_expiry("a.!!!.c"), None);
    }

    #[tokio::test]
    async fn test_validity_follows_expiry() {
        let store = AuthStore::new();
        assert!(!store.is_valid().await);

        let future = Utc::now().timestamp() + 3600;
        store.save(make_token(future), record("u1", "a@b.co")).await.unwrap();
        assert!(store.is_valid().await);

        let past = Utc::now().timestamp() - 10;
        store.save(make_token(past), record("u1", "a@b.co")).await.unwrap();
        assert!(!store.is_valid().await);
    }

    #[tokio::test]
    async fn test_changes_are_broadcast() {
        let store = AuthStore::new();
        let mut rx = store.subscribe();

        store.save(make_token(0), record("u1", "a@b.co")).await.unwrap();
        store.clear().await;

        assert_eq!(rx.recv().await.unwrap(), AuthChange::Saved(record("u1", "a@b.co")));
        assert_eq!(rx.recv().await.unwrap(), AuthChange::Cleared);
        assert!(store.token().await.is_none());
    }

    #[tokio::test]
    async fn test_session_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let store = AuthStore::with_file(&path).await.unwrap();
        store.save(make_token(42), record("u9", "x@y.co")).await.unwrap();
        drop(store);

        let reopened = AuthStore::with_file(&path).await.unwrap();
        assert_eq!(reopened.record().await.unwrap().id, "u9");
        assert_eq!(reopened.token().await.unwrap(), make_token(42));

        reopened.clear().await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_corrupt_session_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = AuthStore::with_file(&path).await.unwrap();
        assert!(store.record().await.is_none());
    }
}
