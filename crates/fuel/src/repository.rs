//! Local-first fuel entry repository
//!
//! Coordinates between the local entry store and the selected spreadsheet.

use anyhow::{Context, Result};
use log::{info, warn};
use std::sync::Arc;

use crate::models::{EntryId, FuelEntry};
use crate::sheets::{AuthorizationRequired, SheetsApi};
use crate::storage::{FuelEntriesStore, SheetIdProvider};

/// Repository for fuel entries
///
/// Writes happen in two steps:
/// 1. Persist the entry locally
/// 2. Push it to the selected spreadsheet and record the outcome on the entry
///
/// The local copy always survives a failed remote write.
pub struct FuelRepository {
    sheets: Arc<dyn SheetsApi>,
    entries: FuelEntriesStore,
    sheet_ids: Arc<dyn SheetIdProvider>,
}

impl FuelRepository {
    pub fn new(
        sheets: Arc<dyn SheetsApi>,
        entries: FuelEntriesStore,
        sheet_ids: Arc<dyn SheetIdProvider>,
    ) -> Self {
        Self {
            sheets,
            entries,
            sheet_ids,
        }
    }

    /// All locally stored entries
    pub fn entries(&self) -> Result<Vec<FuelEntry>> {
        self.entries.entries()
    }

    /// Save an entry and sync it to the selected spreadsheet
    ///
    /// Remote failures are recorded on the returned entry. Only
    /// [`AuthorizationRequired`] is also returned as an error, after the
    /// entry has been stored with its error status.
    pub fn add_entry(&self, entry: FuelEntry) -> Result<FuelEntry> {
        self.entries.upsert_entry(entry.clone())?;

        let Some(sheet) = self.sheet_ids.selected_spreadsheet()? else {
            info!("No spreadsheet selected, entry {} kept locally", entry.id);
            return Ok(entry);
        };

        let id = entry.id.clone();
        let (updated, auth_error) =
            match self
                .sheets
                .append_entry(&entry, &sheet.id, &sheet.worksheet_name)
            {
                Ok(range) => (entry.mark_synced(sheet.id.as_str(), range), None),
                Err(e) => {
                    warn!("Failed to sync entry {}: {:#}", id, e);
                    let auth_error = AuthorizationRequired::find(&e).cloned();
                    (entry.mark_failed(format!("{:#}", e)), auth_error)
                }
            };

        self.entries.update_entry(&id, updated.clone())?;

        if let Some(auth_error) = auth_error {
            return Err(auth_error.into());
        }
        Ok(updated)
    }

    /// Push a stored entry again
    pub fn retry(&self, id: &EntryId) -> Result<FuelEntry> {
        let entry = self
            .entries
            .get_entry(id)?
            .with_context(|| format!("Entry {} not found", id))?;
        info!("Retrying entry {}", id);
        self.add_entry(entry)
    }

    /// Remove an entry from the spreadsheet (when present) and locally
    ///
    /// A failed remote delete keeps the local entry.
    pub fn delete(&self, id: &EntryId) -> Result<()> {
        if let Some(sheet) = self.sheet_ids.selected_spreadsheet()? {
            match self
                .sheets
                .find_row_number(&sheet.id, id, &sheet.worksheet_name)?
            {
                Some(row) => {
                    self.sheets
                        .delete_row(&sheet.id, row, &sheet.worksheet_name)?;
                }
                None => info!("Entry {} not found in spreadsheet {}", id, sheet.id),
            }
        }

        self.entries.delete_entry(id)?;
        info!("Deleted entry {}", id);
        Ok(())
    }
}
