//! Google Sheets integration
//!
//! This module provides:
//! - OAuth2 authorization brokers
//! - Sheets / Drive API client for appending, locating and deleting rows

mod auth;
mod client;

pub use auth::{
    Authorization, AuthorizationBroker, AuthorizationRequired, DRIVE_FILE_SCOPE,
    PendingAuthorization, REQUIRED_SCOPES, StoredTokenBroker, USERINFO_EMAIL_SCOPE,
};
pub use client::{
    SheetsApi, SheetsClient, WorksheetNotFound, delete_row_request, entry_row, id_column_range,
    quoted_worksheet, row_number_of,
};

/// Sheets / Drive API response types
pub mod api {
    use serde::{Deserialize, Serialize};

    use super::WorksheetNotFound;

    /// Response from appending values
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct AppendValuesResponse {
        pub spreadsheet_id: Option<String>,
        pub table_range: Option<String>,
        pub updates: Option<UpdateValuesResponse>,
    }

    /// Summary of the cells an append touched
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct UpdateValuesResponse {
        pub updated_range: Option<String>,
        pub updated_rows: Option<u32>,
    }

    /// A block of cell values
    #[derive(Debug, Default, Deserialize, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ValueRange {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub range: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub major_dimension: Option<String>,
        pub values: Option<Vec<Vec<serde_json::Value>>>,
    }

    impl ValueRange {
        /// Row-major value range for writing
        pub fn rows(values: Vec<Vec<serde_json::Value>>) -> Self {
            Self {
                range: None,
                major_dimension: Some("ROWS".to_string()),
                values: Some(values),
            }
        }
    }

    /// Spreadsheet with only tab properties requested
    #[derive(Debug, Deserialize)]
    pub struct Spreadsheet {
        #[serde(default)]
        pub sheets: Vec<Sheet>,
    }

    impl Spreadsheet {
        /// Numeric ID of the tab with the given title
        pub fn sheet_id_for(&self, title: &str) -> Result<i64, WorksheetNotFound> {
            self.sheets
                .iter()
                .map(|sheet| &sheet.properties)
                .find(|props| props.title == title)
                .map(|props| props.sheet_id)
                .ok_or_else(|| WorksheetNotFound(title.to_string()))
        }
    }

    #[derive(Debug, Deserialize)]
    pub struct Sheet {
        pub properties: SheetProperties,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SheetProperties {
        pub sheet_id: i64,
        pub title: String,
    }

    /// OAuth2 userinfo response
    #[derive(Debug, Deserialize)]
    pub struct UserInfo {
        pub email: Option<String>,
    }

    /// Drive file metadata
    #[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct DriveFile {
        pub id: String,
        pub name: String,
        pub mime_type: Option<String>,
        pub web_view_link: Option<String>,
    }

    /// Page of Drive files
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct DriveFileList {
        #[serde(default)]
        pub files: Vec<DriveFile>,
        pub next_page_token: Option<String>,
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_sheet_id_for() {
            let spreadsheet: Spreadsheet = serde_json::from_str(
                r#"{"sheets": [
                    {"properties": {"sheetId": 0, "title": "Sheet1"}},
                    {"properties": {"sheetId": 981, "title": "Truck"}}
                ]}"#,
            )
            .unwrap();

            assert_eq!(spreadsheet.sheet_id_for("Truck").unwrap(), 981);
            let err = spreadsheet.sheet_id_for("Boat").unwrap_err();
            assert_eq!(err.to_string(), "Worksheet 'Boat' not found");
        }

        #[test]
        fn test_append_response_updated_range() {
            let response: AppendValuesResponse = serde_json::from_str(
                r#"{
                    "spreadsheetId": "abc",
                    "tableRange": "Sheet1!A1:E3",
                    "updates": {"updatedRange": "Sheet1!A4:E4", "updatedRows": 1}
                }"#,
            )
            .unwrap();

            let updates = response.updates.unwrap();
            assert_eq!(updates.updated_range.as_deref(), Some("Sheet1!A4:E4"));
        }

        #[test]
        fn test_rows_body_serialization() {
            let body = ValueRange::rows(vec![vec!["a".into(), 1.5.into()]]);
            assert_eq!(
                serde_json::to_value(&body).unwrap(),
                serde_json::json!({"majorDimension": "ROWS", "values": [["a", 1.5]]})
            );
        }
    }
}
