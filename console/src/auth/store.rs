//! Persistent key-value store for the session credential.
//!
//! The store is a single JSON file of string entries under the configured
//! state directory. The bearer credential lives under [`ID_TOKEN_KEY`];
//! the identity authority keeps its own bookkeeping under keys prefixed
//! with [`AUTHORITY_KEY_PREFIX`]. Every mutation is written through to
//! disk, whole-file, so the last completed write wins.

use crate::errors::SessionError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Key under which the active bearer credential is persisted.
pub const ID_TOKEN_KEY: &str = "idToken";

/// Prefix of the authority-managed keys swept on purge.
pub const AUTHORITY_KEY_PREFIX: &str = "CognitoIdentityServiceProvider";

const STORE_FILE: &str = "session.json";

/// File-backed map of session entries, shared across tasks.
#[derive(Clone, Debug)]
pub struct SessionStore {
    path: PathBuf,
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl SessionStore {
    /// Opens the store under `state_dir`, creating the directory and an
    /// empty map when nothing has been persisted yet.
    pub async fn open(state_dir: &Path) -> Result<Self, SessionError> {
        tokio::fs::create_dir_all(state_dir)
            .await
            .map_err(|e| SessionError::Store(format!("failed to create state dir: {e}")))?;

        let path = state_dir.join(STORE_FILE);
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(raw) if raw.trim().is_empty() => HashMap::new(),
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|e| SessionError::Store(format!("corrupt state file: {e}")))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                return Err(SessionError::Store(format!(
                    "failed to read state file: {e}"
                )));
            }
        };

        Ok(Self {
            path,
            entries: Arc::new(RwLock::new(entries)),
        })
    }

    /// Returns the value stored under `key`, if any.
    pub async fn get(&self, key: &str) -> Option<String> {
        self.entries.read().await.get(key).cloned()
    }

    /// Stores `value` under `key` and writes the store through to disk.
    pub async fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries).await
    }

    /// Removes `key`. Removing an absent key is not an error.
    pub async fn remove(&self, key: &str) -> Result<(), SessionError> {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        self.persist(&entries).await
    }

    /// Convenience accessor for the bearer credential.
    pub async fn credential(&self) -> Option<String> {
        self.get(ID_TOKEN_KEY).await
    }

    /// Persists the bearer credential under its well-known key.
    pub async fn set_credential(&self, token: &str) -> Result<(), SessionError> {
        self.set(ID_TOKEN_KEY, token).await
    }

    /// Removes the credential entry and sweeps every authority-prefixed
    /// key. Idempotent: purging an already-empty store succeeds.
    pub async fn purge(&self) -> Result<(), SessionError> {
        let mut entries = self.entries.write().await;
        entries.remove(ID_TOKEN_KEY);
        entries.retain(|key, _| !key.starts_with(AUTHORITY_KEY_PREFIX));
        debug!("purged session store");
        self.persist(&entries).await
    }

    async fn persist(&self, entries: &HashMap<String, String>) -> Result<(), SessionError> {
        let raw = serde_json::to_string_pretty(entries)
            .map_err(|e| SessionError::Store(format!("failed to encode state: {e}")))?;
        tokio::fs::write(&self.path, raw)
            .await
            .map_err(|e| SessionError::Store(format!("failed to write state file: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_roundtrip_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).await.unwrap();

        store.set_credential("tok-123").await.unwrap();
        assert_eq!(store.credential().await, Some("tok-123".to_string()));

        // A fresh handle over the same directory sees the persisted value.
        let reopened = SessionStore::open(dir.path()).await.unwrap();
        assert_eq!(reopened.credential().await, Some("tok-123".to_string()));
    }

    #[tokio::test]
    async fn test_open_missing_file_yields_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).await.unwrap();
        assert_eq!(store.credential().await, None);
    }

    #[tokio::test]
    async fn test_purge_sweeps_credential_and_authority_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).await.unwrap();

        store.set_credential("tok").await.unwrap();
        store
            .set(
                "CognitoIdentityServiceProvider.client.user.idToken",
                "authority-tok",
            )
            .await
            .unwrap();
        store
            .set("CognitoIdentityServiceProvider.client.LastAuthUser", "user")
            .await
            .unwrap();
        store.set("unrelated", "kept").await.unwrap();

        store.purge().await.unwrap();

        assert_eq!(store.credential().await, None);
        assert_eq!(
            store
                .get("CognitoIdentityServiceProvider.client.user.idToken")
                .await,
            None
        );
        assert_eq!(
            store
                .get("CognitoIdentityServiceProvider.client.LastAuthUser")
                .await,
            None
        );
        assert_eq!(store.get("unrelated").await, Some("kept".to_string()));
    }

    #[tokio::test]
    async fn test_purge_twice_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).await.unwrap();

        store.set_credential("tok").await.unwrap();
        store.purge().await.unwrap();
        // Second purge over an already-clean store must not error.
        store.purge().await.unwrap();
        assert_eq!(store.credential().await, None);
    }

    #[tokio::test]
    async fn test_remove_absent_key_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).await.unwrap();
        store.remove("never-set").await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_state_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join(STORE_FILE), "{ not json")
            .await
            .unwrap();

        let err = SessionStore::open(dir.path()).await.unwrap_err();
        assert!(matches!(err, SessionError::Store(_)));
    }
}
