//! Branch ↔ thread mapping store.
//!
//! The store trait keeps the core storage-agnostic; the default
//! implementation persists to SQLite under `.codebutler/mappings.db`.

pub mod db;
pub mod error;
pub mod store;

pub use error::{MappingError, Result};
pub use store::{MappingStore, SqliteMappingStore};
