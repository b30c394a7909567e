//! Durable key-value storage for session state.
//!
//! Access is synchronous. Backends:
//! - `FileStore`: a JSON map in the cache directory (default)
//! - `KeyringStore`: one OS keychain entry per key
//! - `MemoryStore`: process-local, nothing survives a restart

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use keyring::Entry;
use tracing::{debug, warn};

/// Session file name in cache directory
pub const SESSION_FILE: &str = "session.json";

/// Keychain service name for `KeyringStore`
const KEYRING_SERVICE: &str = "blixx";

pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;

    /// Write several keys. Backends that can commit them together override this.
    fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.remove(key)?;
        }
        Ok(())
    }
}

/// Stores all keys in a single JSON file, rewritten atomically on change.
pub struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(cache_dir: impl AsRef<Path>) -> Self {
        Self {
            path: cache_dir.as_ref().join(SESSION_FILE),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read session file {}", self.path.display()))?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&contents).context("Failed to parse session file")
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<()> {
        if map.is_empty() {
            if self.path.exists() {
                std::fs::remove_file(&self.path).context("Failed to remove session file")?;
            }
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(map)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, contents).context("Failed to write session file")?;
        std::fs::rename(&tmp, &self.path).context("Failed to replace session file")?;
        Ok(())
    }

    /// Read-modify-write. A corrupt file is replaced rather than blocking
    /// every later login and logout.
    fn update(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut map = match self.read_map() {
            Ok(map) => map,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Discarding unreadable session file"
                );
                BTreeMap::new()
            }
        };
        f(&mut map);
        self.write_map(&map)
    }
}

impl SessionStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_map()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.set_many(&[(key, value)])
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.remove_many(&[key])
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        self.update(|map| {
            for (key, value) in entries {
                map.insert(key.to_string(), value.to_string());
            }
        })?;
        debug!(path = %self.path.display(), keys = entries.len(), "Session file updated");
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> Result<()> {
        self.update(|map| {
            for key in keys {
                map.remove(*key);
            }
        })
    }
}

/// Stores each key as its own OS keychain credential.
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self::with_service(KEYRING_SERVICE)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry> {
        Entry::new(&self.service, key).context("Failed to create keyring entry")
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for KeyringStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve value from keychain"),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entry(key)?
            .set_password(value)
            .context("Failed to store value in keychain")
    }

    fn remove(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete credential from keychain"),
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_cache_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("blixx-test-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = temp_cache_dir("round-trip");
        let store = FileStore::new(&dir);

        assert_eq!(store.get("accessToken").unwrap(), None);

        store
            .set_many(&[("accessToken", "A1"), ("refreshToken", "R1")])
            .unwrap();
        assert_eq!(store.get("accessToken").unwrap().as_deref(), Some("A1"));
        assert_eq!(store.get("refreshToken").unwrap().as_deref(), Some("R1"));

        // A second instance over the same directory sees the same data
        let reopened = FileStore::new(&dir);
        assert_eq!(reopened.get("accessToken").unwrap().as_deref(), Some("A1"));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_file_store_remove_deletes_file_when_empty() {
        let dir = temp_cache_dir("remove");
        let store = FileStore::new(&dir);

        store.set("user", r#"{"username":"alice"}"#).unwrap();
        assert!(store.path().exists());

        store.remove_many(&["accessToken", "user"]).unwrap();
        assert!(!store.path().exists());
        assert_eq!(store.get("user").unwrap(), None);

        // Removing again is fine
        store.remove("user").unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() {
        let dir = temp_cache_dir("corrupt");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(SESSION_FILE), "not json").unwrap();

        let store = FileStore::new(&dir);
        assert!(store.get("accessToken").is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_file_store_recovers_from_corrupt_file() {
        let dir = temp_cache_dir("recover");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(SESSION_FILE), "{truncated").unwrap();

        // Logout still clears the file
        let store = FileStore::new(&dir);
        store
            .remove_many(&["accessToken", "refreshToken", "user"])
            .unwrap();
        assert!(!store.path().exists());

        // And a later login persists again
        std::fs::write(dir.join(SESSION_FILE), "{truncated").unwrap();
        store
            .set_many(&[("accessToken", "A1"), ("refreshToken", "R1")])
            .unwrap();
        assert_eq!(store.get("accessToken").unwrap().as_deref(), Some("A1"));
        assert_eq!(store.get("refreshToken").unwrap().as_deref(), Some("R1"));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    // Needs a usable OS keychain (Keychain, Credential Manager or the
    // kernel keyutils); run with `cargo test -- --ignored`.
    #[test]
    #[ignore]
    fn test_keyring_store_persists_across_instances() {
        let service = format!("blixx-test-{}", std::process::id());
        let writer = KeyringStore::with_service(service.clone());
        writer.set("accessToken", "A1").unwrap();

        let reader = KeyringStore::with_service(service.clone());
        assert_eq!(reader.get("accessToken").unwrap().as_deref(), Some("A1"));

        reader.remove("accessToken").unwrap();
        assert_eq!(writer.get("accessToken").unwrap(), None);
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        store.set("accessToken", "A1").unwrap();
        assert_eq!(store.get("accessToken").unwrap().as_deref(), Some("A1"));
        assert_eq!(store.len(), 1);

        store.remove("accessToken").unwrap();
        store.remove("accessToken").unwrap();
        assert!(store.is_empty());
    }
}
