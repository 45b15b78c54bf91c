//! Fuel entry model representing a single fill-up

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Unique identifier for a fuel entry
///
/// The same ID is written to the first column of the spreadsheet row so the
/// row can be found again when the entry is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub String);

impl EntryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random ID
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for EntryId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EntryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Remote sync state of an entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    /// Stored locally, not (yet) written to a spreadsheet
    #[default]
    Pending,
    /// Row appended to the spreadsheet
    Synced,
    /// Last remote write failed
    Error,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Synced => "synced",
            SyncStatus::Error => "error",
        }
    }
}

/// A single fuel purchase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuelEntry {
    pub id: EntryId,
    /// Purchase date, stored as YYYY-MM-DD
    pub date: NaiveDate,
    pub gallons: f64,
    /// Odometer reading at the fill-up
    pub miles: f64,
    pub cost: f64,

    /// Spreadsheet the row was written to
    #[serde(default)]
    pub spreadsheet_id: Option<String>,
    /// A1 range reported by the append call (e.g. "Sheet1!A5:E5")
    #[serde(default)]
    pub sheet_range: Option<String>,
    #[serde(default)]
    pub status: SyncStatus,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl FuelEntry {
    /// Create a new pending entry with a fresh ID
    pub fn new(date: NaiveDate, gallons: f64, miles: f64, cost: f64) -> Self {
        Self::with_id(EntryId::generate(), date, gallons, miles, cost)
    }

    /// Create a pending entry with a known ID
    pub fn with_id(id: EntryId, date: NaiveDate, gallons: f64, miles: f64, cost: f64) -> Self {
        Self {
            id,
            date,
            gallons,
            miles,
            cost,
            spreadsheet_id: None,
            sheet_range: None,
            status: SyncStatus::Pending,
            error_message: None,
        }
    }

    /// Link to the synced row, if the entry has landed in a spreadsheet
    pub fn sheet_url(&self) -> Option<String> {
        let spreadsheet_id = self.spreadsheet_id.as_deref()?;
        let range = self.sheet_range.as_deref()?;
        Some(format!(
            "https://docs.google.com/spreadsheets/d/{}#gid=0&range={}",
            spreadsheet_id, range
        ))
    }

    /// Record a successful append
    pub fn mark_synced(mut self, spreadsheet_id: impl Into<String>, range: Option<String>) -> Self {
        self.status = SyncStatus::Synced;
        self.spreadsheet_id = Some(spreadsheet_id.into());
        self.sheet_range = range;
        self.error_message = None;
        self
    }

    /// Record a failed append, keeping any previous sheet location
    pub fn mark_failed(mut self, message: impl Into<String>) -> Self {
        self.status = SyncStatus::Error;
        self.error_message = Some(message.into());
        self
    }

    /// Cost per gallon, if any fuel was bought
    pub fn price_per_gallon(&self) -> Option<f64> {
        if self.gallons > 0.0 {
            Some(self.cost / self.gallons)
        } else {
            None
        }
    }
}
