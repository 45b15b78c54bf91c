//! FFI-friendly type wrappers for UniFFI export
//!
//! These types convert internal Rust types to FFI-compatible versions:
//! - `NaiveDate` → `String` (ISO 8601, YYYY-MM-DD)
//! - `EntryId` → `String`
//! - `anyhow::Error` → [`FuelError`]

use crate::links::FuelDraft;
use crate::models::{FuelEntry, SelectedSpreadsheet, SyncStatus};
use crate::sheets::{AuthorizationRequired, WorksheetNotFound};

// ============================================================================
// Error Types
// ============================================================================

/// FFI-friendly error type
#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum FuelError {
    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Network error: {message}")]
    Network { message: String },

    /// The host must show `resolution` to the user, then retry
    #[error("Authorization required")]
    AuthorizationRequired { resolution: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Another operation is in progress")]
    Busy,
}

impl From<anyhow::Error> for FuelError {
    fn from(e: anyhow::Error) -> Self {
        FuelError::from(&e)
    }
}

impl From<&anyhow::Error> for FuelError {
    fn from(e: &anyhow::Error) -> Self {
        if let Some(auth) = AuthorizationRequired::find(e) {
            return FuelError::AuthorizationRequired {
                resolution: auth.pending().resolution.clone(),
            };
        }
        if let Some(missing) = e.chain().find_map(|c| c.downcast_ref::<WorksheetNotFound>()) {
            return FuelError::NotFound {
                resource: format!("worksheet {}", missing.0),
            };
        }

        let message = format!("{:#}", e);
        if e.chain().any(|cause| cause.is::<ureq::Error>()) {
            FuelError::Network { message }
        } else {
            FuelError::Storage { message }
        }
    }
}

// ============================================================================
// Entry Types
// ============================================================================

/// Sync state of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiSyncStatus {
    Pending,
    Synced,
    Error,
}

impl From<SyncStatus> for FfiSyncStatus {
    fn from(s: SyncStatus) -> Self {
        match s {
            SyncStatus::Pending => FfiSyncStatus::Pending,
            SyncStatus::Synced => FfiSyncStatus::Synced,
            SyncStatus::Error => FfiSyncStatus::Error,
        }
    }
}

/// FFI-friendly fuel entry
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiFuelEntry {
    pub id: String,
    /// ISO date (YYYY-MM-DD)
    pub date: String,
    pub gallons: f64,
    /// Odometer reading
    pub miles: f64,
    pub cost: f64,
    pub spreadsheet_id: Option<String>,
    pub sheet_range: Option<String>,
    /// Link to the synced row
    pub sheet_url: Option<String>,
    pub status: FfiSyncStatus,
    pub error_message: Option<String>,
}

impl From<FuelEntry> for FfiFuelEntry {
    fn from(e: FuelEntry) -> Self {
        let sheet_url = e.sheet_url();
        Self {
            id: e.id.0,
            date: e.date.to_string(),
            gallons: e.gallons,
            miles: e.miles,
            cost: e.cost,
            spreadsheet_id: e.spreadsheet_id,
            sheet_range: e.sheet_range,
            sheet_url,
            status: e.status.into(),
            error_message: e.error_message,
        }
    }
}

// ============================================================================
// Spreadsheet Types
// ============================================================================

/// FFI-friendly selected spreadsheet
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiSpreadsheet {
    pub id: String,
    pub name: String,
    pub uri: String,
    pub worksheet_name: String,
}

impl From<SelectedSpreadsheet> for FfiSpreadsheet {
    fn from(s: SelectedSpreadsheet) -> Self {
        Self {
            id: s.id,
            name: s.name,
            uri: s.uri,
            worksheet_name: s.worksheet_name,
        }
    }
}

// ============================================================================
// Deep Links
// ============================================================================

/// Fill-up values from a link that still need user input
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiFuelDraft {
    pub gallons: Option<String>,
    pub odometer: Option<String>,
    pub cost: Option<String>,
    pub date: Option<String>,
}

impl From<FuelDraft> for FfiFuelDraft {
    fn from(d: FuelDraft) -> Self {
        Self {
            gallons: d.gallons,
            odometer: d.odometer,
            cost: d.cost,
            date: d.date,
        }
    }
}

/// What handling a deep link did
#[derive(Debug, Clone, uniffi::Enum)]
pub enum FfiLinkOutcome {
    /// The entry was saved (check its status for the sync result)
    Added { entry: FfiFuelEntry },
    /// One value is missing; show the edit dialog prefilled with `draft`
    NeedsEdit { draft: FfiFuelDraft },
    /// Two or more values are missing; show an error
    TooMuchMissing { draft: FfiFuelDraft },
    /// A picker result selected a spreadsheet
    SpreadsheetSelected { spreadsheet: FfiSpreadsheet },
    Unrecognized,
}

// ============================================================================
// Authorization Callback
// ============================================================================

/// Answer from the host's authorization client
#[derive(Debug, Clone, PartialEq, uniffi::Enum)]
pub enum FfiAuthorization {
    Granted { access_token: String },
    /// `resolution` identifies the UI the host must launch (e.g. a pending intent key)
    ResolutionRequired { resolution: String },
    Failed { message: String },
}

/// Callback interface wrapping the platform authorization client
///
/// Kotlin implements this with `Identity.getAuthorizationClient`.
#[uniffi::export(callback_interface)]
pub trait AuthorizationCallback: Send + Sync {
    /// Request an access token for `scopes` without showing UI
    fn authorize(&self, scopes: Vec<String>) -> FfiAuthorization;
    /// Revoke or forget the host's cached authorization
    fn sign_out(&self);
}

// ============================================================================
// Log Callback
// ============================================================================

/// Log level for FFI callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<log::Level> for FfiLogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => FfiLogLevel::Error,
            log::Level::Warn => FfiLogLevel::Warn,
            log::Level::Info => FfiLogLevel::Info,
            log::Level::Debug => FfiLogLevel::Debug,
            log::Level::Trace => FfiLogLevel::Trace,
        }
    }
}

impl From<FfiLogLevel> for log::Level {
    fn from(level: FfiLogLevel) -> Self {
        match level {
            FfiLogLevel::Error => log::Level::Error,
            FfiLogLevel::Warn => log::Level::Warn,
            FfiLogLevel::Info => log::Level::Info,
            FfiLogLevel::Debug => log::Level::Debug,
            FfiLogLevel::Trace => log::Level::Trace,
        }
    }
}

/// Callback interface for receiving log messages from Rust
///
/// Kotlin should forward these to `android.util.Log`.
#[uniffi::export(callback_interface)]
pub trait LogCallback: Send + Sync {
    /// Called when a log message is emitted
    ///
    /// # Arguments
    /// * `level` - The log level (error, warn, info, debug, trace)
    /// * `target` - The logging target (typically module path, e.g., "fuel::repository")
    /// * `message` - The log message
    fn on_log(&self, level: FfiLogLevel, target: String, message: String);
}
