//! Fuel crate - Business logic for the Lumen fuel log
//!
//! This crate provides platform-independent functionality including:
//! - Domain models (FuelEntry, SelectedSpreadsheet)
//! - Google Sheets / Drive API client and OAuth authorization brokers
//! - Key-value storage abstractions for entries and settings
//! - Local-first repository that syncs entries to a spreadsheet
//! - Operation runner and deep-link parsing for UI hosts
//!
//! This crate has zero UI dependencies and exports a UniFFI facade
//! (see [`ffi`]) for the mobile shells.

uniffi::setup_scaffolding!();

pub mod config;
pub mod ffi;
pub mod links;
pub mod models;
pub mod operations;
pub mod repository;
pub mod sheets;
pub mod storage;

pub use config::{GoogleCredentials, LumenConfig};
pub use links::{DraftField, FuelDraft, FuelLink, LinkIntake, PickedFile, parse_link};
pub use models::{DEFAULT_WORKSHEET_NAME, EntryId, FuelEntry, SelectedSpreadsheet, SyncStatus};
pub use operations::{Operation, OperationOutcome, OperationRunner};
pub use repository::FuelRepository;
pub use sheets::{
    Authorization, AuthorizationBroker, AuthorizationRequired, PendingAuthorization, SheetsApi,
    SheetsClient, StoredTokenBroker, WorksheetNotFound,
};
pub use storage::{
    FuelEntriesStore, InMemoryKeyValueStore, KeyValueStore, SettingsStore, SheetIdProvider,
    SqliteKeyValueStore,
};
