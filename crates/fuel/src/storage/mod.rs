//! Storage traits and implementations
//!
//! Everything persisted locally goes through the string-keyed
//! [`KeyValueStore`] abstraction. The typed stores on top of it
//! ([`FuelEntriesStore`], [`SettingsStore`]) own the encoding.

mod entries;
mod memory;
mod settings;
mod sqlite;
mod traits;

pub use entries::{ENTRIES_NAMESPACE, FuelEntriesStore};
pub use memory::InMemoryKeyValueStore;
pub use settings::{SETTINGS_NAMESPACE, SettingsStore, SheetIdProvider, StoredAccessToken};
pub use sqlite::SqliteKeyValueStore;
pub use traits::KeyValueStore;

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

/// Open the entry and settings stores backed by one SQLite database
pub fn open_sqlite(db_path: impl AsRef<Path>) -> Result<(FuelEntriesStore, SettingsStore)> {
    let db = SqliteKeyValueStore::open(db_path)?;
    let entries = FuelEntriesStore::new(Arc::new(db.namespaced(ENTRIES_NAMESPACE)));
    let settings = SettingsStore::new(Arc::new(db.namespaced(SETTINGS_NAMESPACE)));
    Ok((entries, settings))
}
