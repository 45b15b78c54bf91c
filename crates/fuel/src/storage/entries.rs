//! Local backup of fuel entries
//!
//! The whole list lives under a single key as a JSON array. A missing or
//! unreadable value is treated as an empty list so a corrupt backup never
//! blocks new entries from being recorded.

use anyhow::{Context, Result};
use log::warn;
use std::sync::Arc;

use super::KeyValueStore;
use crate::models::{EntryId, FuelEntry};

/// Namespace for the entry list in shared stores
pub const ENTRIES_NAMESPACE: &str = "fuel_entries";

const ENTRIES_KEY: &str = "entries";

/// Persists [`FuelEntry`] lists in a [`KeyValueStore`]
#[derive(Clone)]
pub struct FuelEntriesStore {
    store: Arc<dyn KeyValueStore>,
}

impl FuelEntriesStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// All entries in insertion order
    pub fn entries(&self) -> Result<Vec<FuelEntry>> {
        Ok(decode_entries(self.store.get(ENTRIES_KEY)?))
    }

    /// Look up a single entry
    pub fn get_entry(&self, id: &EntryId) -> Result<Option<FuelEntry>> {
        Ok(self.entries()?.into_iter().find(|e| &e.id == id))
    }

    /// Replace the whole list
    pub fn save_entries(&self, entries: &[FuelEntry]) -> Result<()> {
        let json = serde_json::to_string(entries).context("Failed to encode entries")?;
        self.store.set(ENTRIES_KEY, &json)
    }

    /// Append an entry
    pub fn add_entry(&self, entry: FuelEntry) -> Result<()> {
        let mut entry = Some(entry);
        self.modify(|entries| {
            if let Some(entry) = entry.take() {
                entries.push(entry);
            }
        })
    }

    /// Replace the entry with the given ID; no-op when it is absent
    pub fn update_entry(&self, id: &EntryId, updated: FuelEntry) -> Result<()> {
        let mut updated = Some(updated);
        self.modify(|entries| {
            if let Some(slot) = entries.iter_mut().find(|e| &e.id == id)
                && let Some(updated) = updated.take()
            {
                *slot = updated;
            }
        })
    }

    /// Remove the entry with the given ID
    pub fn delete_entry(&self, id: &EntryId) -> Result<()> {
        self.modify(|entries| entries.retain(|e| &e.id != id))
    }

    /// Replace the entry in place if its ID exists, otherwise append it
    pub fn upsert_entry(&self, entry: FuelEntry) -> Result<()> {
        let mut entry = Some(entry);
        self.modify(|entries| {
            let Some(entry) = entry.take() else {
                return;
            };
            match entries.iter_mut().find(|e| e.id == entry.id) {
                Some(slot) => *slot = entry,
                None => entries.push(entry),
            }
        })
    }

    /// Read-modify-write the list under the store's lock
    fn modify(&self, mut f: impl FnMut(&mut Vec<FuelEntry>)) -> Result<()> {
        self.store.update(ENTRIES_KEY, &mut |current| {
            let mut entries = decode_entries(current);
            f(&mut entries);
            let json = serde_json::to_string(&entries).context("Failed to encode entries")?;
            Ok(Some(json))
        })
    }
}

fn decode_entries(json: Option<String>) -> Vec<FuelEntry> {
    let Some(json) = json else {
        return Vec::new();
    };
    match serde_json::from_str(&json) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Discarding unreadable entry backup: {}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SyncStatus;
    use crate::storage::InMemoryKeyValueStore;
    use chrono::NaiveDate;

    fn make_entry(id: &str, gallons: f64) -> FuelEntry {
        FuelEntry::with_id(
            EntryId::new(id),
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            gallons,
            1000.0,
            gallons * 3.5,
        )
    }

    fn create_store() -> (FuelEntriesStore, Arc<InMemoryKeyValueStore>) {
        let kv = Arc::new(InMemoryKeyValueStore::new());
        (FuelEntriesStore::new(kv.clone()), kv)
    }

    #[test]
    fn test_empty_when_missing() {
        let (store, _) = create_store();
        assert!(store.entries().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_backup_reads_as_empty() {
        let (store, kv) = create_store();
        kv.set(ENTRIES_KEY, "{not json").unwrap();
        assert!(store.entries().unwrap().is_empty());

        // And it can still be written over
        store.add_entry(make_entry("e1", 5.0)).unwrap();
        assert_eq!(store.entries().unwrap().len(), 1);
    }

    #[test]
    fn test_add_preserves_order() {
        let (store, _) = create_store();
        store.add_entry(make_entry("e1", 1.0)).unwrap();
        store.add_entry(make_entry("e2", 2.0)).unwrap();
        store.add_entry(make_entry("e3", 3.0)).unwrap();

        let ids: Vec<_> = store
            .entries()
            .unwrap()
            .into_iter()
            .map(|e| e.id.0)
            .collect();
        assert_eq!(ids, vec!["e1", "e2", "e3"]);
    }

    #[test]
    fn test_update_entry() {
        let (store, _) = create_store();
        store.add_entry(make_entry("e1", 1.0)).unwrap();

        let updated = make_entry("e1", 1.0).mark_failed("offline");
        store.update_entry(&EntryId::new("e1"), updated).unwrap();

        let entry = store.get_entry(&EntryId::new("e1")).unwrap().unwrap();
        assert_eq!(entry.status, SyncStatus::Error);
        assert_eq!(entry.error_message.as_deref(), Some("offline"));
    }

    #[test]
    fn test_update_missing_entry_is_noop() {
        let (store, _) = create_store();
        store.add_entry(make_entry("e1", 1.0)).unwrap();
        store
            .update_entry(&EntryId::new("nope"), make_entry("nope", 9.0))
            .unwrap();

        let entries = store.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id.as_str(), "e1");
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let (store, _) = create_store();
        store.add_entry(make_entry("e1", 1.0)).unwrap();
        store.add_entry(make_entry("e2", 2.0)).unwrap();

        store.upsert_entry(make_entry("e1", 7.0)).unwrap();
        store.upsert_entry(make_entry("e3", 3.0)).unwrap();

        let entries = store.entries().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].id.as_str(), "e1");
        assert_eq!(entries[0].gallons, 7.0);
        assert_eq!(entries[2].id.as_str(), "e3");
    }

    #[test]
    fn test_delete_entry() {
        let (store, _) = create_store();
        store.add_entry(make_entry("e1", 1.0)).unwrap();
        store.add_entry(make_entry("e2", 2.0)).unwrap();

        store.delete_entry(&EntryId::new("e1")).unwrap();
        let entries = store.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id.as_str(), "e2");

        // Deleting an unknown ID leaves the list alone
        store.delete_entry(&EntryId::new("e1")).unwrap();
        assert_eq!(store.entries().unwrap().len(), 1);
    }

    #[test]
    fn test_save_entries_overwrites() {
        let (store, _) = create_store();
        store.add_entry(make_entry("e1", 1.0)).unwrap();
        store.save_entries(&[make_entry("e9", 9.0)]).unwrap();

        let entries = store.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id.as_str(), "e9");
    }
}
