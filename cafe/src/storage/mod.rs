//! Storage module
//!
//! Key-value substrate holding JSON-encoded collections under fixed keys.
//! `Storage` is the typed handle every repository works through; the
//! backends only move strings around.

pub mod backend;
pub mod file_store;
pub mod local;

pub use backend::{KeyValueStore, MemoryStore};
pub use file_store::FileStore;
pub use local::{Storage, StorageEvent, StorageReader, Transaction};
