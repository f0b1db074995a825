//! Persistence for the bearer token and the developer API key.
//!
//! The store is plain key/value: it does not encrypt and does not look at
//! expiry. Values live under two well-known keys, `authToken` and
//! `developerApiKey`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use keyring::Entry;
use thiserror::Error;
use tracing::debug;

/// Storage file name in the per-origin storage directory
const STORAGE_FILE: &str = "storage.json";

/// Keychain service name
const KEYRING_SERVICE: &str = "omeife";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StorageKey {
    AuthToken,
    DeveloperApiKey,
}

impl StorageKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::AuthToken => "authToken",
            StorageKey::DeveloperApiKey => "developerApiKey",
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage file is corrupt: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("keychain error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// Backend for persisted credentials.
///
/// Implementors provide the raw key/value operations; the typed
/// token/API-key accessors are built on top of them.
pub trait TokenStore: Send + Sync {
    fn get(&self, key: StorageKey) -> Result<Option<String>, StoreError>;
    fn set(&self, key: StorageKey, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: StorageKey) -> Result<(), StoreError>;

    fn save_token(&self, token: &str) -> Result<(), StoreError> {
        self.set(StorageKey::AuthToken, token)
    }

    fn load_token(&self) -> Result<Option<String>, StoreError> {
        self.get(StorageKey::AuthToken)
    }

    fn clear_token(&self) -> Result<(), StoreError> {
        self.remove(StorageKey::AuthToken)
    }

    fn save_api_key(&self, api_key: &str) -> Result<(), StoreError> {
        self.set(StorageKey::DeveloperApiKey, api_key)
    }

    fn load_api_key(&self) -> Result<Option<String>, StoreError> {
        self.get(StorageKey::DeveloperApiKey)
    }

    fn clear_api_key(&self) -> Result<(), StoreError> {
        self.remove(StorageKey::DeveloperApiKey)
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    values: Mutex<BTreeMap<StorageKey, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> std::sync::MutexGuard<'_, BTreeMap<StorageKey, String>> {
        // A panic while holding the lock cannot leave the map half-written.
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: StorageKey) -> Result<Option<String>, StoreError> {
        Ok(self.values().get(&key).cloned())
    }

    fn set(&self, key: StorageKey, value: &str) -> Result<(), StoreError> {
        self.values().insert(key, value.to_string());
        Ok(())
    }

    fn remove(&self, key: StorageKey) -> Result<(), StoreError> {
        self.values().remove(&key);
        Ok(())
    }
}

// ============================================================================
// File
// ============================================================================

/// JSON object file in a per-origin directory, e.g.
/// `~/.cache/omeife/apis.omeife.ai/storage.json`.
pub struct FileTokenStore {
    dir: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(STORAGE_FILE)
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let path = self.path();
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&path)?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn write_all(&self, values: &BTreeMap<String, String>) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir)?;
        let contents = serde_json::to_string_pretty(values)?;
        std::fs::write(self.path(), contents)?;
        Ok(())
    }

    fn modify<F>(&self, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut values = self.read_all()?;
        f(&mut values);
        self.write_all(&values)
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, key: StorageKey) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.read_all()?.remove(key.as_str()))
    }

    fn set(&self, key: StorageKey, value: &str) -> Result<(), StoreError> {
        debug!(key = key.as_str(), "Persisting value");
        self.modify(|values| {
            values.insert(key.as_str().to_string(), value.to_string());
        })
    }

    fn remove(&self, key: StorageKey) -> Result<(), StoreError> {
        if !self.path().exists() {
            return Ok(());
        }
        debug!(key = key.as_str(), "Removing value");
        self.modify(|values| {
            values.remove(key.as_str());
        })
    }
}

// ============================================================================
// OS keychain
// ============================================================================

/// Values stored as OS keychain entries, one per key, scoped by API host.
pub struct KeyringTokenStore {
    scope: String,
}

impl KeyringTokenStore {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
        }
    }

    fn entry(&self, key: StorageKey) -> Result<Entry, StoreError> {
        let account = format!("{}:{}", self.scope, key.as_str());
        Ok(Entry::new(KEYRING_SERVICE, &account)?)
    }
}

impl TokenStore for KeyringTokenStore {
    fn get(&self, key: StorageKey) -> Result<Option<String>, StoreError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: StorageKey, value: &str) -> Result<(), StoreError> {
        self.entry(key)?.set_password(value)?;
        Ok(())
    }

    fn remove(&self, key: StorageKey) -> Result<(), StoreError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "omeife-store-{}-{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_storage_key_names() {
        assert_eq!(StorageKey::AuthToken.as_str(), "authToken");
        assert_eq!(StorageKey::DeveloperApiKey.as_str(), "developerApiKey");
    }

    #[test]
    fn test_memory_store_token_and_key_are_independent() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.load_token().unwrap(), None);

        store.save_token("t1").unwrap();
        store.save_api_key("k1").unwrap();
        store.clear_token().unwrap();

        assert_eq!(store.load_token().unwrap(), None);
        assert_eq!(store.load_api_key().unwrap().as_deref(), Some("k1"));
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = temp_dir("reopen");
        {
            let store = FileTokenStore::new(dir.clone());
            store.save_token("t1").unwrap();
            store.save_api_key("k1").unwrap();
        }

        let reopened = FileTokenStore::new(dir.clone());
        assert_eq!(reopened.load_token().unwrap().as_deref(), Some("t1"));
        assert_eq!(reopened.load_api_key().unwrap().as_deref(), Some("k1"));

        let raw = std::fs::read_to_string(reopened.path()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["authToken"], "t1");
        assert_eq!(parsed["developerApiKey"], "k1");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_file_store_clear() {
        let dir = temp_dir("clear");
        let store = FileTokenStore::new(dir.clone());

        // Clearing before anything was written is a no-op
        store.clear_token().unwrap();
        assert!(!store.path().exists());

        store.save_token("t1").unwrap();
        store.clear_token().unwrap();
        store.clear_api_key().unwrap();
        assert_eq!(store.load_token().unwrap(), None);
        assert_eq!(std::fs::read_to_string(store.path()).unwrap().trim(), "{}");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_file_store_corrupt_file() {
        let dir = temp_dir("corrupt");
        std::fs::create_dir_all(&dir).unwrap();
        let store = FileTokenStore::new(dir.clone());
        std::fs::write(store.path(), "not json").unwrap();

        assert!(matches!(store.load_token(), Err(StoreError::Serde(_))));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
