//! User settings: the selected spreadsheet and stored OAuth tokens

use anyhow::Result;
use std::sync::Arc;

use super::KeyValueStore;
use crate::models::{DEFAULT_WORKSHEET_NAME, SelectedSpreadsheet};

/// Namespace for settings in shared stores
pub const SETTINGS_NAMESPACE: &str = "lumen_settings";

mod keys {
    pub const SHEET_ID: &str = "sheet_id";
    pub const SHEET_NAME: &str = "sheet_name";
    pub const SHEET_URI: &str = "sheet_uri";
    pub const WORKSHEET_NAME: &str = "worksheet_name";
    pub const ACCESS_TOKEN: &str = "access_token";
    pub const ACCESS_TOKEN_EXPIRES_AT: &str = "access_token_expires_at";
    pub const REFRESH_TOKEN: &str = "refresh_token";
}

/// Supplies the spreadsheet entries should be synced to
pub trait SheetIdProvider: Send + Sync {
    /// The current target, or `None` when the user has not picked one
    fn selected_spreadsheet(&self) -> Result<Option<SelectedSpreadsheet>>;
}

/// An access token with its expiry (Unix seconds)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAccessToken {
    pub token: String,
    pub expires_at: Option<i64>,
}

/// Typed access to settings kept in a [`KeyValueStore`]
#[derive(Clone)]
pub struct SettingsStore {
    store: Arc<dyn KeyValueStore>,
}

impl SettingsStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// The selected spreadsheet; requires both ID and name to be saved
    pub fn sheet_info(&self) -> Result<Option<SelectedSpreadsheet>> {
        let id = self.store.get(keys::SHEET_ID)?;
        let name = self.store.get(keys::SHEET_NAME)?;
        let (Some(id), Some(name)) = (id, name) else {
            return Ok(None);
        };

        let uri = self.store.get(keys::SHEET_URI)?.unwrap_or_default();
        let worksheet_name = self.worksheet_name()?;

        Ok(Some(SelectedSpreadsheet {
            id,
            name,
            uri,
            worksheet_name,
        }))
    }

    /// Saved worksheet name, falling back to the default tab
    pub fn worksheet_name(&self) -> Result<String> {
        Ok(self
            .store
            .get(keys::WORKSHEET_NAME)?
            .unwrap_or_else(|| DEFAULT_WORKSHEET_NAME.to_string()))
    }

    pub fn save_sheet(&self, id: &str, name: &str, uri: &str) -> Result<()> {
        self.store.set(keys::SHEET_ID, id)?;
        self.store.set(keys::SHEET_NAME, name)?;
        self.store.set(keys::SHEET_URI, uri)?;
        Ok(())
    }

    /// Forget the selected spreadsheet; the worksheet name is kept
    pub fn clear_sheet(&self) -> Result<()> {
        self.store.remove(keys::SHEET_ID)?;
        self.store.remove(keys::SHEET_NAME)?;
        self.store.remove(keys::SHEET_URI)?;
        Ok(())
    }

    pub fn save_worksheet_name(&self, name: &str) -> Result<()> {
        self.store.set(keys::WORKSHEET_NAME, name)
    }

    pub fn access_token(&self) -> Result<Option<StoredAccessToken>> {
        let Some(token) = self.store.get(keys::ACCESS_TOKEN)? else {
            return Ok(None);
        };
        let expires_at = self
            .store
            .get(keys::ACCESS_TOKEN_EXPIRES_AT)?
            .and_then(|v| v.parse().ok());
        Ok(Some(StoredAccessToken { token, expires_at }))
    }

    pub fn save_access_token(&self, token: &str, expires_at: Option<i64>) -> Result<()> {
        self.store.set(keys::ACCESS_TOKEN, token)?;
        match expires_at {
            Some(ts) => self
                .store
                .set(keys::ACCESS_TOKEN_EXPIRES_AT, &ts.to_string())?,
            None => self.store.remove(keys::ACCESS_TOKEN_EXPIRES_AT)?,
        }
        Ok(())
    }

    pub fn refresh_token(&self) -> Result<Option<String>> {
        self.store.get(keys::REFRESH_TOKEN)
    }

    pub fn save_refresh_token(&self, token: &str) -> Result<()> {
        self.store.set(keys::REFRESH_TOKEN, token)
    }

    /// Remove all stored OAuth tokens
    pub fn clear_tokens(&self) -> Result<()> {
        self.store.remove(keys::ACCESS_TOKEN)?;
        self.store.remove(keys::ACCESS_TOKEN_EXPIRES_AT)?;
        self.store.remove(keys::REFRESH_TOKEN)?;
        Ok(())
    }
}

impl SheetIdProvider for SettingsStore {
    fn selected_spreadsheet(&self) -> Result<Option<SelectedSpreadsheet>> {
        self.sheet_info()
    }
}
