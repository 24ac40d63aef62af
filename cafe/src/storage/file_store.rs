//! File-backed key-value store
//!
//! One JSON file per key: key "cafe_menu" is stored at "<root>/cafe_menu.json".
//! Writes go to a temp file first and are renamed into place.

use super::backend::KeyValueStore;
use crate::error::{AppError, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const EXTENSION: &str = "json";

/// Directory of JSON files, one per key
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `root`
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        tracing::info!("File store opened at: {:?}", root);
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
            && !key.starts_with('.');
        if !valid {
            return Err(AppError::Storage(format!("Invalid storage key: {:?}", key)));
        }
        Ok(self.root.join(format!("{}.{}", key, EXTENSION)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;

        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(value.as_bytes())?;
        file.sync_all()?;

        fs::rename(temp_path, &path)?;

        tracing::trace!("Wrote key {} ({} bytes)", key, value.len());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (FileStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::open(temp_dir.path().join("data")).unwrap();
        (store, temp_dir)
    }

    #[test]
    fn test_write_and_read() {
        let (store, _temp) = create_test_store();

        store.set("cafe_menu", r#"[{"name":"Buna"}]"#).unwrap();

        let value = store.get("cafe_menu").unwrap();
        assert_eq!(value.as_deref(), Some(r#"[{"name":"Buna"}]"#));
        assert!(store.root().join("cafe_menu.json").exists());
    }

    #[test]
    fn test_missing_key() {
        let (store, _temp) = create_test_store();
        assert_eq!(store.get("nothing").unwrap(), None);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let (store, _temp) = create_test_store();

        store.set("cafe_cart_1", "[]").unwrap();
        store.remove("cafe_cart_1").unwrap();
        store.remove("cafe_cart_1").unwrap();

        assert_eq!(store.get("cafe_cart_1").unwrap(), None);
    }

    #[test]
    fn test_keys_ignore_other_files() {
        let (store, _temp) = create_test_store();

        store.set("cafe_users", "[]").unwrap();
        store.set("cafe_menu", "[]").unwrap();
        fs::write(store.root().join("notes.txt"), "x").unwrap();

        assert_eq!(store.keys().unwrap(), vec!["cafe_menu", "cafe_users"]);
    }

    #[test]
    fn test_rejects_path_like_keys() {
        let (store, _temp) = create_test_store();

        assert!(store.set("../escape", "[]").is_err());
        assert!(store.set("a/b", "[]").is_err());
        assert!(store.get("").is_err());
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("data");

        {
            let store = FileStore::open(&root).unwrap();
            store.set("currentUser", r#"{"id":"1"}"#).unwrap();
        }

        let store = FileStore::open(&root).unwrap();
        assert_eq!(
            store.get("currentUser").unwrap().as_deref(),
            Some(r#"{"id":"1"}"#)
        );
    }
}
