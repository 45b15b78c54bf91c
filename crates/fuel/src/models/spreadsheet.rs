//! The spreadsheet the user picked as sync target

use serde::{Deserialize, Serialize};

/// Worksheet used when the user never chose one
pub const DEFAULT_WORKSHEET_NAME: &str = "Sheet1";

/// A spreadsheet selected as the sync target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedSpreadsheet {
    /// Drive file ID of the spreadsheet
    pub id: String,
    /// Display name of the file
    pub name: String,
    /// Link to the file (may be empty)
    pub uri: String,
    /// Tab that rows are appended to
    pub worksheet_name: String,
}

impl SelectedSpreadsheet {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            uri: String::new(),
            worksheet_name: DEFAULT_WORKSHEET_NAME.to_string(),
        }
    }
}
