//! Domain models for fuel log entities

mod entry;
mod spreadsheet;

pub use entry::{EntryId, FuelEntry, SyncStatus};
pub use spreadsheet::{DEFAULT_WORKSHEET_NAME, SelectedSpreadsheet};
