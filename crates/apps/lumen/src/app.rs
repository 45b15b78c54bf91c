//! Command handlers
//!
//! `LumenApp` wires the local stores, the Google client and the repository
//! together once per invocation.

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use fuel::sheets::REQUIRED_SCOPES;
use fuel::storage;
use fuel::{
    Authorization, AuthorizationBroker, DraftField, EntryId, FuelDraft, FuelEntriesStore,
    FuelEntry, FuelLink, FuelRepository, GoogleCredentials, LinkIntake, LumenConfig,
    SettingsStore, SheetsClient, StoredTokenBroker, parse_link,
};
use log::{info, warn};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use crate::output;

/// Broker used when no OAuth client credentials are configured
struct UnconfiguredBroker;

impl AuthorizationBroker for UnconfiguredBroker {
    fn authorize(&self, _scopes: &[&str]) -> Result<Authorization> {
        bail!("Google credentials not configured")
    }
}

pub struct LumenApp {
    config: LumenConfig,
    db_path: PathBuf,
    entries: FuelEntriesStore,
    settings: SettingsStore,
    token_broker: Option<Arc<StoredTokenBroker>>,
    sheets: Arc<SheetsClient>,
    repository: FuelRepository,
}

impl LumenApp {
    /// Open the database and set up the Google client
    pub fn open(db_path: Option<PathBuf>) -> Result<Self> {
        let config = LumenConfig::load()?;
        let db_path = match db_path {
            Some(path) => path,
            None => config.database_path()?,
        };

        let (entries, settings) = storage::open_sqlite(&db_path)
            .with_context(|| format!("Failed to open database {}", db_path.display()))?;

        let credentials = match GoogleCredentials::load() {
            Ok(creds) => Some(creds),
            Err(e) => {
                warn!("Google credentials not found: {}", e);
                if let Some(path) = GoogleCredentials::default_credentials_path() {
                    warn!(
                        "To sync with Google Sheets, either:\n\
                         1. Place your Google OAuth credentials at: {}\n\
                         2. Or set environment variables: LUMEN_GOOGLE_CLIENT_ID and LUMEN_GOOGLE_CLIENT_SECRET",
                        path.display()
                    );
                }
                None
            }
        };

        Ok(Self::from_parts(config, db_path, entries, settings, credentials))
    }

    fn from_parts(
        config: LumenConfig,
        db_path: PathBuf,
        entries: FuelEntriesStore,
        settings: SettingsStore,
        credentials: Option<GoogleCredentials>,
    ) -> Self {
        let token_broker =
            credentials.map(|creds| Arc::new(StoredTokenBroker::new(creds, settings.clone())));
        let broker: Arc<dyn AuthorizationBroker> = match &token_broker {
            Some(broker) => broker.clone() as Arc<dyn AuthorizationBroker>,
            None => Arc::new(UnconfiguredBroker),
        };
        let sheets = Arc::new(SheetsClient::new(broker));
        let repository =
            FuelRepository::new(sheets.clone(), entries.clone(), Arc::new(settings.clone()));

        Self {
            config,
            db_path,
            entries,
            settings,
            token_broker,
            sheets,
            repository,
        }
    }

    fn token_broker(&self) -> Result<&StoredTokenBroker> {
        self.token_broker
            .as_deref()
            .context("Google credentials not configured")
    }

    // === Account ===

    pub fn login(&self) -> Result<()> {
        self.token_broker()?.complete_authorization(REQUIRED_SCOPES)?;
        match self.sheets.signed_in_user_email()? {
            Some(email) => println!("Signed in as {}", email),
            None => println!("Signed in"),
        }
        Ok(())
    }

    pub fn logout(&self) -> Result<()> {
        self.sheets.clear_sessions()?;
        match &self.token_broker {
            Some(broker) => broker.sign_out()?,
            // Tokens may remain from a run that had credentials
            None => self.settings.clear_tokens()?,
        }
        println!("Signed out");
        Ok(())
    }

    pub fn status(&self) -> Result<()> {
        println!("Database:    {}", self.db_path.display());

        if self.token_broker.is_none() {
            println!("Account:     Google credentials not configured");
        } else if self.sheets.is_authorized() {
            let email = self.sheets.signed_in_user_email().ok().flatten();
            println!(
                "Account:     {}",
                email.as_deref().unwrap_or("authorized (email unavailable)")
            );
        } else {
            println!("Account:     not signed in (run `lumen login`)");
        }

        match self.settings.sheet_info()? {
            Some(sheet) => {
                println!("Spreadsheet: {} ({})", sheet.name, sheet.id);
                println!("Worksheet:   {}", sheet.worksheet_name);
            }
            None => println!("Spreadsheet: none selected (run `lumen sheet pick`)"),
        }

        let entries = self.entries.entries()?;
        println!("Entries:     {}", output::status_counts(&entries));
        Ok(())
    }

    // === Entries ===

    pub fn add(&self, gallons: f64, odometer: f64, cost: f64, date: Option<&str>) -> Result<()> {
        let date = match date {
            Some(date) => date
                .parse::<NaiveDate>()
                .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", date))?,
            None => chrono::Local::now().date_naive(),
        };
        self.save(FuelEntry::new(date, gallons, odometer, cost))
    }

    pub fn link(&self, url: &str) -> Result<()> {
        match parse_link(url) {
            LinkIntake::Fuel(FuelLink::Complete(draft)) => self.save(draft.into_entry()?),
            LinkIntake::Fuel(FuelLink::NeedsEdit(mut draft)) => {
                for field in draft.missing_fields() {
                    let value = prompt(&format!("{}: ", field.as_str()))?;
                    draft.set_field(field, value);
                }
                self.save(draft.into_entry()?)
            }
            LinkIntake::Fuel(FuelLink::TooMuchMissing(draft)) => {
                bail!(
                    "Link is missing {}; at most one value can be filled in",
                    missing_list(&draft)
                )
            }
            LinkIntake::PickedFile(file) => {
                self.settings.save_sheet(&file.id, &file.name, &file.web_url())?;
                println!("Selected spreadsheet {} ({})", file.name, file.id);
                Ok(())
            }
            LinkIntake::Unrecognized => bail!("Unrecognized link: {}", url),
        }
    }

    pub fn list(&self, json: bool) -> Result<()> {
        let entries = self.repository.entries()?;
        if json {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        } else if entries.is_empty() {
            println!("No entries yet");
        } else {
            print!("{}", output::entry_table(&entries));
        }
        Ok(())
    }

    pub fn retry(&self, id: &str) -> Result<()> {
        let id = self.resolve_id(id)?;
        let entry = self.repository.retry(&id)?;
        print_saved(&entry);
        Ok(())
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        let id = self.resolve_id(id)?;
        self.repository.delete(&id)?;
        println!("Deleted {}", id);
        Ok(())
    }

    fn save(&self, entry: FuelEntry) -> Result<()> {
        let entry = self.repository.add_entry(entry)?;
        print_saved(&entry);
        Ok(())
    }

    /// Accept a unique ID prefix as printed by `list`
    fn resolve_id(&self, prefix: &str) -> Result<EntryId> {
        let matches: Vec<EntryId> = self
            .entries
            .entries()?
            .into_iter()
            .map(|e| e.id)
            .filter(|id| id.as_str().starts_with(prefix))
            .collect();

        match matches.as_slice() {
            [id] => Ok(id.clone()),
            [] => bail!("No entry matches '{}'", prefix),
            _ => bail!("'{}' matches {} entries; use more characters", prefix, matches.len()),
        }
    }

    // === Spreadsheet selection ===

    pub fn list_sheets(&self) -> Result<()> {
        let files = self.sheets.list_spreadsheets()?;
        if files.is_empty() {
            println!("No spreadsheets available. Run `lumen sheet pick` to grant access to one.");
        }
        for file in files {
            println!("{}  {}", file.id, file.name);
        }
        Ok(())
    }

    pub fn select_sheet(&self, id: &str, name: Option<&str>) -> Result<()> {
        let (name, uri) = match name {
            Some(name) => (name.to_string(), String::new()),
            None => {
                let file = self.sheets.spreadsheet_metadata(id)?;
                (file.name, file.web_view_link.unwrap_or_default())
            }
        };
        self.settings.save_sheet(id, &name, &uri)?;
        info!("Selected spreadsheet {}", id);
        println!("Selected spreadsheet {} ({})", name, id);
        Ok(())
    }

    pub fn set_worksheet(&self, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            bail!("Worksheet name cannot be empty");
        }
        self.settings.save_worksheet_name(name)?;
        println!("Entries will be appended to worksheet '{}'", name);
        Ok(())
    }

    pub fn clear_sheet(&self) -> Result<()> {
        self.settings.clear_sheet()?;
        println!("Spreadsheet selection cleared");
        Ok(())
    }

    pub fn pick_sheet(&self) -> Result<()> {
        let url = self.config.picker_url();
        println!("Opening spreadsheet picker: {}", url);
        if let Err(e) = open::that(url) {
            eprintln!("Failed to open browser: {}. Please open the URL manually.", e);
        }
        println!("When the picker hands back a lumen://picker-result link, run:");
        println!("  lumen link '<link>'");
        Ok(())
    }
}

fn print_saved(entry: &FuelEntry) {
    println!("{}", output::entry_summary(entry));
}

fn missing_list(draft: &FuelDraft) -> String {
    draft
        .missing_fields()
        .iter()
        .map(DraftField::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn prompt(label: &str) -> Result<String> {
    let mut stdout = std::io::stdout();
    write!(stdout, "{}", label)?;
    stdout.flush()?;

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read input")?;
    Ok(line.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_list() {
        let draft = FuelDraft {
            gallons: Some("3".to_string()),
            ..Default::default()
        };
        assert_eq!(missing_list(&draft), "odometer, cost");
    }

    #[test]
    fn test_unconfigured_broker_fails() {
        assert!(UnconfiguredBroker.authorize(REQUIRED_SCOPES).is_err());
    }

    fn app(dir: &tempfile::TempDir, credentials: Option<GoogleCredentials>) -> LumenApp {
        let db_path = dir.path().join("lumen.db");
        let (entries, settings) = storage::open_sqlite(&db_path).unwrap();
        LumenApp::from_parts(LumenConfig::default(), db_path, entries, settings, credentials)
    }

    fn store_tokens(app: &LumenApp) {
        let expires_at = chrono::Utc::now().timestamp() + 3600;
        app.settings.save_access_token("access", Some(expires_at)).unwrap();
        app.settings.save_refresh_token("refresh").unwrap();
    }

    #[test]
    fn test_logout_signs_out_through_broker() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(
            &dir,
            Some(GoogleCredentials {
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
            }),
        );
        store_tokens(&app);
        assert!(app.sheets.is_authorized());

        app.logout().unwrap();
        assert!(app.settings.access_token().unwrap().is_none());
        assert!(app.settings.refresh_token().unwrap().is_none());
        assert!(!app.sheets.is_authorized());
    }

    #[test]
    fn test_logout_without_credentials_clears_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir, None);
        store_tokens(&app);

        app.logout().unwrap();
        assert!(app.settings.access_token().unwrap().is_none());
        assert!(app.settings.refresh_token().unwrap().is_none());
    }
}
