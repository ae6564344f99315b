//! Local key-value persistence
//!
//! Each key is one JSON document `<key>.json` under the data directory.
//! Keys are written independently, there is no cross-key transaction.

use crate::error::StoreError;
use log::{debug, error};
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const CHAT_HISTORY_KEY: &str = "chatHistory";
pub const CHAT_SETTINGS_KEY: &str = "chatSettings";
pub const THEME_KEY: &str = "theme";

/// Resolve the data directory: explicit override, env var, then platform default.
pub fn resolve_data_dir(explicit: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir;
    }
    if let Ok(dir) = std::env::var("LIFETRACE_TUI_DATA_DIR") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::data_dir()
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".local").join("share")
        })
        .join("lifetrace-tui")
}

/// Cheap-to-clone handle on the store directory.
#[derive(Clone)]
pub struct LocalStore {
    root: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl LocalStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", key))
    }

    /// `Ok(None)` when the key has never been written.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let bytes = match fs::read(self.path_for(key)) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(value)?;
        let _guard = self.write_lock.lock();
        fs::write(self.path_for(key), json)?;
        debug!("Stored key {}", key);
        Ok(())
    }

    /// Deleting a missing key is not an error.
    pub fn delete(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Read a key, logging and discarding any error.
    pub fn load_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        match self.get(key) {
            Ok(Some(v)) => v,
            Ok(None) => T::default(),
            Err(e) => {
                error!("Failed to load {}: {}", key, e);
                T::default()
            }
        }
    }

    /// Write a key, logging any error.
    pub fn save_logged<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        if let Err(e) = self.set(key, value) {
            error!("Failed to persist {}: {}", key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        let v: Option<Vec<String>> = store.get("nothing").unwrap();
        assert!(v.is_none());
    }

    #[test]
    fn test_set_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        store.set(THEME_KEY, "light").unwrap();
        assert_eq!(store.get::<String>(THEME_KEY).unwrap().as_deref(), Some("light"));

        store.delete(THEME_KEY).unwrap();
        assert!(store.get::<String>(THEME_KEY).unwrap().is_none());
        // second delete is a no-op
        store.delete(THEME_KEY).unwrap();
    }

    #[test]
    fn test_corrupt_value_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        fs::write(dir.path().join("chatHistory.json"), b"{not json").unwrap();
        assert!(store.get::<Vec<String>>(CHAT_HISTORY_KEY).is_err());
        let v: Vec<String> = store.load_or_default(CHAT_HISTORY_KEY);
        assert!(v.is_empty());
    }

    #[test]
    fn test_explicit_data_dir_wins() {
        let dir = resolve_data_dir(Some(PathBuf::from("/tmp/explicit")));
        assert_eq!(dir, PathBuf::from("/tmp/explicit"));
    }
}
