//! Google Sheets / Drive HTTP client
//!
//! Credentials are acquired lazily from the [`AuthorizationBroker`] the
//! first time a service is used and the resulting session handle is cached
//! until [`SheetsClient::clear_sessions`] is called or the API rejects the
//! token. Uses synchronous HTTP (ureq) to be executor-agnostic.

use anyhow::{Context, Result, anyhow};
use log::{debug, error, info, warn};
use serde::de::DeserializeOwned;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::api::{
    AppendValuesResponse, DriveFile, DriveFileList, Spreadsheet, UserInfo, ValueRange,
};
use super::auth::{Authorization, AuthorizationBroker, AuthorizationRequired, REQUIRED_SCOPES};
use crate::models::{EntryId, FuelEntry};

/// Error indicating the configured worksheet does not exist in the spreadsheet
#[derive(Debug, thiserror::Error)]
#[error("Worksheet '{0}' not found")]
pub struct WorksheetNotFound(pub String);

/// Remote operations the repository needs from a spreadsheet backend
pub trait SheetsApi: Send + Sync {
    /// Append one row for `entry` to `worksheet`; returns the A1 range that
    /// was written
    fn append_entry(
        &self,
        entry: &FuelEntry,
        spreadsheet_id: &str,
        worksheet: &str,
    ) -> Result<Option<String>>;

    /// 1-based row whose first column equals `entry_id`
    ///
    /// Lookup failures are reported as `Ok(None)`; only
    /// [`AuthorizationRequired`] is returned as an error.
    fn find_row_number(
        &self,
        spreadsheet_id: &str,
        entry_id: &EntryId,
        worksheet: &str,
    ) -> Result<Option<u32>>;

    /// Delete a 1-based row from the named worksheet
    fn delete_row(&self, spreadsheet_id: &str, row: u32, worksheet: &str) -> Result<()>;
}

/// Which API a cached session belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Service {
    Sheets,
    Drive,
}

/// An authorized handle on one Google API
struct ApiSession {
    agent: ureq::Agent,
    access_token: String,
}

impl ApiSession {
    fn new(access_token: String) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(SheetsClient::REQUEST_TIMEOUT))
            .build();
        Self {
            agent: config.into(),
            access_token,
        }
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

#[derive(Default)]
struct Sessions {
    sheets: Option<Arc<ApiSession>>,
    drive: Option<Arc<ApiSession>>,
}

impl Sessions {
    fn slot(&mut self, service: Service) -> &mut Option<Arc<ApiSession>> {
        match service {
            Service::Sheets => &mut self.sheets,
            Service::Drive => &mut self.drive,
        }
    }
}

/// Client for the Sheets, Drive and OAuth2 userinfo APIs
pub struct SheetsClient {
    broker: Arc<dyn AuthorizationBroker>,
    sessions: Mutex<Sessions>,
}

impl SheetsClient {
    /// API base URLs
    const SHEETS_URL: &'static str = "https://sheets.googleapis.com/v4/spreadsheets";
    const DRIVE_URL: &'static str = "https://www.googleapis.com/drive/v3/files";
    const USERINFO_URL: &'static str = "https://www.googleapis.com/oauth2/v2/userinfo";

    const SPREADSHEET_MIME_TYPE: &'static str = "application/vnd.google-apps.spreadsheet";
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(broker: Arc<dyn AuthorizationBroker>) -> Self {
        Self {
            broker,
            sessions: Mutex::new(Sessions::default()),
        }
    }

    /// Check whether credentials are available without showing any UI
    pub fn is_authorized(&self) -> bool {
        match self.acquire_access_token() {
            Ok(_) => true,
            Err(e) if AuthorizationRequired::find(&e).is_some() => false,
            Err(e) => {
                // Anything else also means we cannot proceed
                error!("Unexpected error during authorization check: {:#}", e);
                false
            }
        }
    }

    /// Email address of the signed-in user
    ///
    /// Asks the broker for a token on every call and leaves the cached
    /// sessions untouched. Returns [`AuthorizationRequired`] when the user
    /// must authorize first; a failing userinfo call yields `None`.
    pub fn signed_in_user_email(&self) -> Result<Option<String>> {
        let session = ApiSession::new(self.acquire_access_token()?);

        let response = session
            .agent
            .get(Self::USERINFO_URL)
            .header("Authorization", &session.bearer())
            .call();
        let result: Result<UserInfo> = self.read_response(Service::Drive, response, "get user info");

        match result {
            Ok(info) => Ok(info.email),
            Err(e) => {
                error!("Could not fetch user email: {:#}", e);
                Ok(None)
            }
        }
    }

    /// Drop cached session handles (sign-out)
    pub fn clear_sessions(&self) -> Result<()> {
        let mut sessions = self.lock_sessions()?;
        *sessions = Sessions::default();
        debug!("Cleared cached API sessions");
        Ok(())
    }

    // === Sheets API ===

    /// Append a row to the given range and return the updated range
    pub fn append_row(
        &self,
        spreadsheet_id: &str,
        range: &str,
        row: Vec<serde_json::Value>,
    ) -> Result<Option<String>> {
        let session = self.session(Service::Sheets)?;
        let url = format!(
            "{}/{}/values/{}:append?valueInputOption=USER_ENTERED&includeValuesInResponse=false",
            Self::SHEETS_URL,
            urlencoding::encode(spreadsheet_id),
            urlencoding::encode(range),
        );
        let body = ValueRange::rows(vec![row]);

        let response = session
            .agent
            .post(&url)
            .header("Authorization", &session.bearer())
            .send_json(&body);
        let appended: AppendValuesResponse =
            self.read_response(Service::Sheets, response, "append values")?;

        let updated_range = appended.updates.and_then(|u| u.updated_range);
        info!(
            "Data added to spreadsheet {} at range {}",
            spreadsheet_id,
            updated_range.as_deref().unwrap_or("(unknown)")
        );
        Ok(updated_range)
    }

    /// Read a range as columns
    pub fn get_columns(&self, spreadsheet_id: &str, range: &str) -> Result<ValueRange> {
        let url = format!(
            "{}/{}/values/{}?majorDimension=COLUMNS",
            Self::SHEETS_URL,
            urlencoding::encode(spreadsheet_id),
            urlencoding::encode(range),
        );
        self.get_json(Service::Sheets, &url, "get values")
    }

    /// Fetch the spreadsheet's tab properties
    pub fn get_spreadsheet(&self, spreadsheet_id: &str) -> Result<Spreadsheet> {
        let url = format!(
            "{}/{}?fields=sheets.properties",
            Self::SHEETS_URL,
            urlencoding::encode(spreadsheet_id),
        );
        self.get_json(Service::Sheets, &url, "get spreadsheet")
    }

    fn batch_update(&self, spreadsheet_id: &str, body: &serde_json::Value) -> Result<()> {
        let session = self.session(Service::Sheets)?;
        let url = format!(
            "{}/{}:batchUpdate",
            Self::SHEETS_URL,
            urlencoding::encode(spreadsheet_id),
        );

        let response = session
            .agent
            .post(&url)
            .header("Authorization", &session.bearer())
            .send_json(body);
        let _: serde_json::Value = self.read_response(Service::Sheets, response, "batch update")?;
        Ok(())
    }

    // === Drive API ===

    /// Name and link of a Drive file
    pub fn spreadsheet_metadata(&self, file_id: &str) -> Result<DriveFile> {
        let url = format!(
            "{}/{}?fields=id,name,mimeType,webViewLink",
            Self::DRIVE_URL,
            urlencoding::encode(file_id),
        );
        self.get_json(Service::Drive, &url, "get file")
    }

    /// All spreadsheets visible to the app
    ///
    /// With the drive.file scope this is the set of files the user opened
    /// through Lumen or its picker.
    pub fn list_spreadsheets(&self) -> Result<Vec<DriveFile>> {
        let query = format!(
            "mimeType='{}' and trashed=false",
            Self::SPREADSHEET_MIME_TYPE
        );
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = format!(
                "{}?q={}&fields={}&pageSize=100",
                Self::DRIVE_URL,
                urlencoding::encode(&query),
                urlencoding::encode("nextPageToken,files(id,name,mimeType,webViewLink)"),
            );
            if let Some(token) = &page_token {
                url.push_str(&format!("&pageToken={}", urlencoding::encode(token)));
            }

            let page: DriveFileList = self.get_json(Service::Drive, &url, "list files")?;
            files.extend(page.files);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(files)
    }

    // === Session management ===

    fn lock_sessions(&self) -> Result<MutexGuard<'_, Sessions>> {
        self.sessions
            .lock()
            .map_err(|_| anyhow!("session cache lock poisoned"))
    }

    /// Ask the broker for a token, turning a required resolution into an error
    fn acquire_access_token(&self) -> Result<String> {
        match self.broker.authorize(REQUIRED_SCOPES)? {
            Authorization::Granted { access_token } => Ok(access_token),
            Authorization::ResolutionRequired(pending) => {
                Err(AuthorizationRequired(pending).into())
            }
        }
    }

    /// Cached session for `service`, authorizing on first use
    fn session(&self, service: Service) -> Result<Arc<ApiSession>> {
        let mut sessions = self.lock_sessions()?;
        let slot = sessions.slot(service);
        if let Some(session) = slot {
            return Ok(Arc::clone(session));
        }

        let session = Arc::new(ApiSession::new(self.acquire_access_token()?));
        *slot = Some(Arc::clone(&session));
        debug!("Created {:?} session", service);
        Ok(session)
    }

    fn invalidate(&self, service: Service) {
        if let Ok(mut sessions) = self.sessions.lock() {
            *sessions.slot(service) = None;
        }
    }

    fn get_json<T: DeserializeOwned>(&self, service: Service, url: &str, what: &str) -> Result<T> {
        let session = self.session(service)?;
        debug!("GET {}", url);
        let response = session
            .agent
            .get(url)
            .header("Authorization", &session.bearer())
            .call();
        self.read_response(service, response, what)
    }

    /// Decode a JSON response; a 401 drops the cached session so the next
    /// call re-authorizes
    fn read_response<T: DeserializeOwned>(
        &self,
        service: Service,
        response: Result<ureq::http::Response<ureq::Body>, ureq::Error>,
        what: &str,
    ) -> Result<T> {
        match response {
            Ok(mut response) => response
                .body_mut()
                .read_json()
                .with_context(|| format!("Failed to parse {} response", what)),
            Err(e @ ureq::Error::StatusCode(401)) => {
                warn!("{} rejected the access token, dropping cached session", what);
                self.invalidate(service);
                Err(anyhow::Error::new(e).context(format!("Failed to {}: access token rejected", what)))
            }
            Err(e @ ureq::Error::StatusCode(_)) => {
                Err(anyhow::Error::new(e).context(format!("Failed to {}", what)))
            }
            Err(e) => Err(anyhow::Error::new(e).context(format!("Failed to send {} request", what))),
        }
    }
}

impl SheetsApi for SheetsClient {
    fn append_entry(
        &self,
        entry: &FuelEntry,
        spreadsheet_id: &str,
        worksheet: &str,
    ) -> Result<Option<String>> {
        self.append_row(spreadsheet_id, &quoted_worksheet(worksheet), entry_row(entry))
            .context("Error adding data to spreadsheet")
    }

    fn find_row_number(
        &self,
        spreadsheet_id: &str,
        entry_id: &EntryId,
        worksheet: &str,
    ) -> Result<Option<u32>> {
        match self.get_columns(spreadsheet_id, &id_column_range(worksheet)) {
            Ok(columns) => Ok(row_number_of(&columns, entry_id.as_str())),
            Err(e) => {
                if let Some(auth) = AuthorizationRequired::find(&e) {
                    return Err(auth.clone().into());
                }
                error!("Row lookup for {} failed: {:#}", entry_id, e);
                Ok(None)
            }
        }
    }

    fn delete_row(&self, spreadsheet_id: &str, row: u32, worksheet: &str) -> Result<()> {
        anyhow::ensure!(row >= 1, "Row numbers start at 1, got {}", row);

        let spreadsheet = self
            .get_spreadsheet(spreadsheet_id)
            .context("Error deleting row")?;
        let sheet_id = spreadsheet.sheet_id_for(worksheet)?;

        self.batch_update(spreadsheet_id, &delete_row_request(sheet_id, row))
            .context("Error deleting row")?;

        info!("Row {} deleted from spreadsheet {}", row, spreadsheet_id);
        Ok(())
    }
}

/// Row written for an entry: id, date, odometer, gallons, cost
pub fn entry_row(entry: &FuelEntry) -> Vec<serde_json::Value> {
    vec![
        entry.id.as_str().into(),
        entry.date.to_string().into(),
        entry.miles.into(),
        entry.gallons.into(),
        entry.cost.into(),
    ]
}

/// Worksheet name as an A1 sheet reference: single-quoted, inner `'` doubled
///
/// Unquoted, a tab named "2024" or "A1" would be read as a cell range.
pub fn quoted_worksheet(worksheet: &str) -> String {
    format!("'{}'", worksheet.replace('\'', "''"))
}

/// A1 range of the ID column
pub fn id_column_range(worksheet: &str) -> String {
    format!("{}!A:A", quoted_worksheet(worksheet))
}

/// 1-based row of the first cell in the first column equal to `id`
pub fn row_number_of(columns: &ValueRange, id: &str) -> Option<u32> {
    let column = columns.values.as_ref()?.first()?;
    column
        .iter()
        .position(|cell| cell_text(cell) == id)
        .map(|index| index as u32 + 1)
}

fn cell_text(cell: &serde_json::Value) -> String {
    match cell {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Batch update body deleting one 1-based row
pub fn delete_row_request(sheet_id: i64, row: u32) -> serde_json::Value {
    serde_json::json!({
        "requests": [{
            "deleteDimension": {
                "range": {
                    "sheetId": sheet_id,
                    "dimension": "ROWS",
                    // API is 0-indexed, end exclusive
                    "startIndex": row - 1,
                    "endIndex": row,
                }
            }
        }]
    })
}
