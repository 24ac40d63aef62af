//! Typed storage handle
//!
//! `Storage` wraps a shared backend with JSON (de)serialization, a
//! store-wide writer lock and a change channel. Every handle carries a tab
//! id; `open_tab` hands out a sibling handle over the same backend, which is
//! how a second browser tab is modelled.
//!
//! Read failures never surface as errors: a malformed collection is logged
//! and read as absent.

use super::backend::{KeyValueStore, MemoryStore};
use crate::error::{AppError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use uuid::Uuid;

const EVENT_CHANNEL_CAPACITY: usize = 256;

fn get_logged(backend: &dyn KeyValueStore, key: &str) -> Option<String> {
    match backend.get(key) {
        Ok(value) => value,
        Err(e) => {
            tracing::error!("Failed to read key {}: {}", key, e);
            None
        }
    }
}

/// A committed change to one key
#[derive(Debug, Clone, PartialEq)]
pub struct StorageEvent {
    pub key: String,
    /// `None` when the key was removed
    pub new_value: Option<String>,
    /// Tab that made the change
    pub origin: Uuid,
}

#[derive(Clone)]
pub struct Storage {
    backend: Arc<dyn KeyValueStore>,
    writer: Arc<Mutex<()>>,
    events: broadcast::Sender<StorageEvent>,
    tab_id: Uuid,
}

/// Backend reads without a sender on the change channel. Once every
/// `Storage` handle is gone, subscribers see the channel close.
#[derive(Clone)]
pub struct StorageReader {
    backend: Arc<dyn KeyValueStore>,
}

impl StorageReader {
    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        get_logged(self.backend.as_ref(), key).and_then(|raw| decode(key, &raw))
    }
}

impl Storage {
    pub fn new(backend: impl KeyValueStore + 'static) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            backend: Arc::new(backend),
            writer: Arc::new(Mutex::new(())),
            events,
            tab_id: Uuid::new_v4(),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    /// Sibling handle over the same backend with its own tab id
    pub fn open_tab(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            writer: Arc::clone(&self.writer),
            events: self.events.clone(),
            tab_id: Uuid::new_v4(),
        }
    }

    pub fn tab_id(&self) -> Uuid {
        self.tab_id
    }

    /// Receive every committed change, from this tab and all siblings
    pub fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }

    /// Read-only view that does not keep the change channel open
    pub fn reader(&self) -> StorageReader {
        StorageReader {
            backend: Arc::clone(&self.backend),
        }
    }

    /// Raw string under `key`; backend failures read as absent
    pub fn get_raw(&self, key: &str) -> Option<String> {
        get_logged(self.backend.as_ref(), key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get_raw(key).is_some()
    }

    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_raw(key).and_then(|raw| decode(key, &raw))
    }

    /// Read a collection; absent or malformed reads as empty
    pub fn read_collection<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        self.read(key).unwrap_or_default()
    }

    pub fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        self.transaction(|tx| tx.put(key, value))
    }

    /// Store a raw string without going through serde
    pub fn write_raw(&self, key: &str, raw: &str) -> Result<()> {
        self.transaction(|tx| {
            tx.put_raw(key, raw.to_string());
            Ok(())
        })
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.transaction(|tx| {
            tx.remove(key);
            Ok(())
        })
    }

    pub fn keys(&self) -> Vec<String> {
        match self.backend.keys() {
            Ok(keys) => keys,
            Err(e) => {
                tracing::error!("Failed to list keys: {}", e);
                Vec::new()
            }
        }
    }

    /// Remove every key
    pub fn clear(&self) -> Result<()> {
        let keys = self.keys();
        self.transaction(|tx| {
            for key in &keys {
                tx.remove(key);
            }
            Ok(())
        })
    }

    /// Run `f` against staged state while holding the writer lock.
    ///
    /// Writes are applied only if `f` returns `Ok`. Reads inside `f` see the
    /// staged values.
    pub fn transaction<R>(&self, f: impl FnOnce(&mut Transaction<'_>) -> Result<R>) -> Result<R> {
        let _guard = self
            .writer
            .lock()
            .map_err(|_| AppError::Storage("writer lock poisoned".to_string()))?;

        let mut tx = Transaction {
            storage: self,
            staged: BTreeMap::new(),
        };

        let result = f(&mut tx)?;
        let staged = tx.staged;

        // Backends have no multi-key atomicity: a failure here leaves the
        // keys committed so far in place.
        for (key, value) in staged {
            match &value {
                Some(raw) => self.backend.set(&key, raw)?,
                None => self.backend.remove(&key)?,
            }
            // No receivers is fine
            let _ = self.events.send(StorageEvent {
                key,
                new_value: value,
                origin: self.tab_id,
            });
        }

        Ok(result)
    }
}

/// Staged writes against a `Storage`, committed as a unit
pub struct Transaction<'a> {
    storage: &'a Storage,
    staged: BTreeMap<String, Option<String>>,
}

impl Transaction<'_> {
    fn raw(&self, key: &str) -> Option<String> {
        match self.staged.get(key) {
            Some(value) => value.clone(),
            None => self.storage.get_raw(key),
        }
    }

    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.raw(key).and_then(|raw| decode(key, &raw))
    }

    pub fn collection<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        self.read(key).unwrap_or_default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.raw(key).is_some()
    }

    pub fn put<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.put_raw(key, raw);
        Ok(())
    }

    pub fn put_raw(&mut self, key: &str, raw: String) {
        self.staged.insert(key.to_string(), Some(raw));
    }

    pub fn remove(&mut self, key: &str) {
        self.staged.insert(key.to_string(), None);
    }
}

fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> Option<T> {
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Discarding malformed value under {}: {}", key, e);
            None
        }
    }
}
