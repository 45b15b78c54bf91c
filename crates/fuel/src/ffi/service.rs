//! FuelService facade for UniFFI export
//!
//! This provides a high-level, FFI-friendly API that wraps the local
//! stores, the Sheets client and the single-flight operation runner.

use chrono::NaiveDate;
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;

use crate::ffi::types::*;
use crate::links::{FuelLink, LinkIntake, parse_link};
use crate::models::{EntryId, FuelEntry};
use crate::operations::{Operation, OperationOutcome, OperationRunner};
use crate::repository::FuelRepository;
use crate::sheets::{Authorization, AuthorizationBroker, PendingAuthorization, SheetsClient};
use crate::storage::{self, FuelEntriesStore, SettingsStore};

/// Adapts the host's [`AuthorizationCallback`] to [`AuthorizationBroker`]
struct CallbackBroker {
    callback: Arc<dyn AuthorizationCallback>,
}

impl AuthorizationBroker for CallbackBroker {
    fn authorize(&self, scopes: &[&str]) -> anyhow::Result<Authorization> {
        let scopes = scopes.iter().map(|s| s.to_string()).collect();
        match self.callback.authorize(scopes) {
            FfiAuthorization::Granted { access_token } => Ok(Authorization::Granted { access_token }),
            FfiAuthorization::ResolutionRequired { resolution } => Ok(
                Authorization::ResolutionRequired(PendingAuthorization::new(resolution)),
            ),
            FfiAuthorization::Failed { message } => {
                anyhow::bail!("Authorization failed: {}", message)
            }
        }
    }
}

/// Main service object for the fuel log
///
/// This is the primary entry point for Kotlin/Swift code. Methods block on
/// network I/O, so hosts should call them off the main thread.
#[derive(uniffi::Object)]
pub struct FuelService {
    entries: FuelEntriesStore,
    settings: SettingsStore,
    sheets: Arc<SheetsClient>,
    runner: OperationRunner,
    authorization: Arc<dyn AuthorizationCallback>,
}

#[uniffi::export]
impl FuelService {
    /// Create a new FuelService
    ///
    /// # Arguments
    /// * `db_path` - Path to the SQLite database file
    /// * `authorization` - Host authorization client
    #[uniffi::constructor]
    pub fn new(
        db_path: String,
        authorization: Box<dyn AuthorizationCallback>,
    ) -> Result<Arc<Self>, FuelError> {
        if let Some(parent) = PathBuf::from(&db_path).parent() {
            std::fs::create_dir_all(parent).map_err(|e| FuelError::Storage {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let (entries, settings) = storage::open_sqlite(&db_path).map_err(|e| FuelError::Storage {
            message: format!("Failed to open database: {:#}", e),
        })?;

        let authorization: Arc<dyn AuthorizationCallback> = Arc::from(authorization);
        let broker = CallbackBroker {
            callback: authorization.clone(),
        };

        Ok(Arc::new(Self::with_parts(
            entries,
            settings,
            Arc::new(broker),
            authorization,
        )))
    }

    // ========================================================================
    // Entries
    // ========================================================================

    /// All locally stored entries
    pub fn list_entries(&self) -> Result<Vec<FfiFuelEntry>, FuelError> {
        let entries = self.entries.entries()?;
        Ok(entries.into_iter().map(FfiFuelEntry::from).collect())
    }

    /// Record a fill-up and sync it to the selected spreadsheet
    ///
    /// `date` is YYYY-MM-DD; `None` or blank means today.
    pub fn add_entry(
        &self,
        gallons: f64,
        odometer: f64,
        cost: f64,
        date: Option<String>,
    ) -> Result<FfiFuelEntry, FuelError> {
        let date = parse_date(date.as_deref())?;
        let entry = FuelEntry::new(date, gallons, odometer, cost);
        self.run_add(entry)
    }

    /// Handle a `lumen://` deep link
    pub fn add_entry_from_link(&self, url: String) -> Result<FfiLinkOutcome, FuelError> {
        match parse_link(&url) {
            LinkIntake::Fuel(FuelLink::Complete(draft)) => {
                let entry = draft.into_entry().map_err(|e| FuelError::InvalidInput {
                    message: e.to_string(),
                })?;
                let entry = self.run_add(entry)?;
                Ok(FfiLinkOutcome::Added { entry })
            }
            LinkIntake::Fuel(FuelLink::NeedsEdit(draft)) => Ok(FfiLinkOutcome::NeedsEdit {
                draft: draft.into(),
            }),
            LinkIntake::Fuel(FuelLink::TooMuchMissing(draft)) => {
                Ok(FfiLinkOutcome::TooMuchMissing {
                    draft: draft.into(),
                })
            }
            LinkIntake::PickedFile(file) => {
                self.settings
                    .save_sheet(&file.id, &file.name, &file.web_url())?;
                info!("Selected spreadsheet {} from picker", file.id);
                let spreadsheet = self.selected_spreadsheet()?.ok_or_else(|| FuelError::NotFound {
                    resource: format!("spreadsheet {}", file.id),
                })?;
                Ok(FfiLinkOutcome::SpreadsheetSelected { spreadsheet })
            }
            LinkIntake::Unrecognized => {
                warn!("Ignoring unrecognized link");
                Ok(FfiLinkOutcome::Unrecognized)
            }
        }
    }

    /// Push a stored entry to the spreadsheet again
    pub fn retry_entry(&self, id: String) -> Result<FfiFuelEntry, FuelError> {
        let entry = self
            .entries
            .get_entry(&EntryId::new(id.clone()))?
            .ok_or_else(|| FuelError::NotFound {
                resource: format!("entry {}", id),
            })?;
        self.run_add(entry)
    }

    /// Re-run the last failed add or delete
    ///
    /// Returns `None` when nothing failed; adds return the stored entry.
    pub fn retry_last_failed(&self) -> Result<Option<FfiFuelEntry>, FuelError> {
        match self.runner.retry_last_failed() {
            None => Ok(None),
            Some(outcome) => Ok(outcome_to_result(outcome)?.map(FfiFuelEntry::from)),
        }
    }

    /// Delete an entry from the spreadsheet and locally
    pub fn delete_entry(&self, id: String) -> Result<(), FuelError> {
        let outcome = self.runner.run(Operation::Delete(EntryId::new(id)));
        outcome_to_result(outcome)?;
        Ok(())
    }

    /// Whether an add/delete is in flight
    pub fn is_busy(&self) -> bool {
        self.runner.is_busy()
    }

    // ========================================================================
    // Spreadsheet Selection
    // ========================================================================

    pub fn selected_spreadsheet(&self) -> Result<Option<FfiSpreadsheet>, FuelError> {
        let sheet = self.settings.sheet_info()?;
        Ok(sheet.map(FfiSpreadsheet::from))
    }

    pub fn select_spreadsheet(&self, id: String, name: String, uri: String) -> Result<(), FuelError> {
        self.settings.save_sheet(&id, &name, &uri)?;
        info!("Selected spreadsheet {}", id);
        Ok(())
    }

    pub fn clear_spreadsheet(&self) -> Result<(), FuelError> {
        self.settings.clear_sheet()?;
        Ok(())
    }

    /// Set the tab entries are appended to
    pub fn set_worksheet_name(&self, name: String) -> Result<(), FuelError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(FuelError::InvalidInput {
                message: "Worksheet name cannot be empty".to_string(),
            });
        }
        self.settings.save_worksheet_name(name)?;
        Ok(())
    }

    // ========================================================================
    // Authorization
    // ========================================================================

    /// Check for usable credentials without showing UI
    pub fn is_authorized(&self) -> bool {
        self.sheets.is_authorized()
    }

    pub fn signed_in_user_email(&self) -> Result<Option<String>, FuelError> {
        Ok(self.sheets.signed_in_user_email()?)
    }

    /// Drop cached sessions and tokens and tell the host to sign out
    pub fn sign_out(&self) -> Result<(), FuelError> {
        self.sheets.clear_sessions()?;
        self.settings.clear_tokens()?;
        self.authorization.sign_out();
        info!("Signed out");
        Ok(())
    }
}

impl FuelService {
    fn with_parts(
        entries: FuelEntriesStore,
        settings: SettingsStore,
        broker: Arc<dyn AuthorizationBroker>,
        authorization: Arc<dyn AuthorizationCallback>,
    ) -> Self {
        let sheets = Arc::new(SheetsClient::new(broker));
        let repository = FuelRepository::new(
            sheets.clone(),
            entries.clone(),
            Arc::new(settings.clone()),
        );
        Self {
            entries,
            settings,
            sheets,
            runner: OperationRunner::new(Arc::new(repository)),
            authorization,
        }
    }

    fn run_add(&self, entry: FuelEntry) -> Result<FfiFuelEntry, FuelError> {
        let outcome = self.runner.run(Operation::Add(entry));
        outcome_to_result(outcome)?
            .map(FfiFuelEntry::from)
            .ok_or_else(|| FuelError::Storage {
                message: "Entry was not returned".to_string(),
            })
    }
}

fn outcome_to_result(outcome: OperationOutcome) -> Result<Option<FuelEntry>, FuelError> {
    match outcome {
        OperationOutcome::Completed { entry } => Ok(entry),
        OperationOutcome::Busy => Err(FuelError::Busy),
        OperationOutcome::Failed { error, .. } => Err(FuelError::from(error)),
    }
}

fn parse_date(date: Option<&str>) -> Result<NaiveDate, FuelError> {
    match date.map(str::trim) {
        Some(date) if !date.is_empty() => {
            date.parse().map_err(|_| FuelError::InvalidInput {
                message: format!("Invalid date '{}', expected YYYY-MM-DD", date),
            })
        }
        _ => Ok(chrono::Local::now().date_naive()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SyncStatus;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Host stub answering with a fixed authorization
    struct HostAuth {
        answer: Mutex<FfiAuthorization>,
        signed_out: AtomicBool,
    }

    impl AuthorizationCallback for HostAuth {
        fn authorize(&self, _scopes: Vec<String>) -> FfiAuthorization {
            self.answer.lock().unwrap().clone()
        }

        fn sign_out(&self) {
            self.signed_out.store(true, Ordering::SeqCst);
        }
    }

    fn service(answer: FfiAuthorization) -> (Arc<FuelService>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("data").join("lumen.db");
        let host = HostAuth {
            answer: Mutex::new(answer),
            signed_out: AtomicBool::new(false),
        };
        let service = FuelService::new(db.to_string_lossy().into_owned(), Box::new(host)).unwrap();
        (service, dir)
    }

    fn needs_consent() -> FfiAuthorization {
        FfiAuthorization::ResolutionRequired {
            resolution: "intent-1".to_string(),
        }
    }

    #[test]
    fn test_add_without_spreadsheet_is_local() {
        let (service, _dir) = service(needs_consent());

        let entry = service
            .add_entry(10.0, 1234.0, 40.0, Some("2024-04-01".to_string()))
            .unwrap();
        assert_eq!(entry.status, FfiSyncStatus::Pending);
        assert_eq!(entry.date, "2024-04-01");
        assert_eq!(service.list_entries().unwrap().len(), 1);
    }

    #[test]
    fn test_add_requiring_consent_reports_resolution() {
        let (service, _dir) = service(needs_consent());
        service
            .select_spreadsheet("sheet".into(), "Fuel".into(), String::new())
            .unwrap();

        let err = service.add_entry(10.0, 1234.0, 40.0, None).unwrap_err();
        assert!(matches!(
            err,
            FuelError::AuthorizationRequired { ref resolution } if resolution == "intent-1"
        ));

        // Saved locally with its error, and remembered for retry
        let entries = service.list_entries().unwrap();
        assert_eq!(entries[0].status, FfiSyncStatus::Error);
        assert!(service.runner.last_failed().is_some());
    }

    #[test]
    fn test_invalid_date() {
        let (service, _dir) = service(needs_consent());
        let err = service
            .add_entry(1.0, 2.0, 3.0, Some("yesterday".to_string()))
            .unwrap_err();
        assert!(matches!(err, FuelError::InvalidInput { .. }));
    }

    #[test]
    fn test_link_outcomes() {
        let (service, _dir) = service(needs_consent());

        let outcome = service
            .add_entry_from_link("lumen://gas?gallons=5&odometer=10&cost=20&date=2024-01-01".into())
            .unwrap();
        assert!(matches!(outcome, FfiLinkOutcome::Added { .. }));

        let outcome = service
            .add_entry_from_link("lumen://gas?gallons=5&cost=20".into())
            .unwrap();
        match outcome {
            FfiLinkOutcome::NeedsEdit { draft } => assert_eq!(draft.odometer, None),
            other => panic!("unexpected {:?}", other),
        }

        let outcome = service
            .add_entry_from_link("lumen://gas?gallons=5".into())
            .unwrap();
        assert!(matches!(outcome, FfiLinkOutcome::TooMuchMissing { .. }));

        let err = service
            .add_entry_from_link("lumen://gas?gallons=x&odometer=10&cost=20".into())
            .unwrap_err();
        assert!(matches!(err, FuelError::InvalidInput { ref message } if message == "Invalid number format"));

        assert_eq!(service.list_entries().unwrap().len(), 1);
    }

    #[test]
    fn test_picker_link_selects_spreadsheet() {
        let (service, _dir) = service(needs_consent());
        service.set_worksheet_name("Truck".into()).unwrap();

        let outcome = service
            .add_entry_from_link("lumen://picker-result?fileId=abc&fileName=Fuel".into())
            .unwrap();
        let FfiLinkOutcome::SpreadsheetSelected { spreadsheet } = outcome else {
            panic!("expected selection");
        };
        assert_eq!(spreadsheet.id, "abc");
        assert_eq!(spreadsheet.worksheet_name, "Truck");
        assert_eq!(service.selected_spreadsheet().unwrap(), Some(spreadsheet));

        service.clear_spreadsheet().unwrap();
        assert_eq!(service.selected_spreadsheet().unwrap(), None);
    }

    #[test]
    fn test_retry_unknown_entry() {
        let (service, _dir) = service(needs_consent());
        assert!(matches!(
            service.retry_entry("nope".into()),
            Err(FuelError::NotFound { .. })
        ));
        assert!(service.retry_last_failed().unwrap().is_none());
    }

    #[test]
    fn test_delete_local_entry() {
        let (service, _dir) = service(needs_consent());
        let entry = service.add_entry(1.0, 2.0, 3.0, None).unwrap();

        service.delete_entry(entry.id).unwrap();
        assert!(service.list_entries().unwrap().is_empty());
    }

    #[test]
    fn test_authorization_state_and_sign_out() {
        let (service, _dir) = service(FfiAuthorization::Granted {
            access_token: "token".to_string(),
        });
        assert!(service.is_authorized());
        service.sign_out().unwrap();

        let (service, _dir) = service_with_failure();
        assert!(!service.is_authorized());
    }

    fn service_with_failure() -> (Arc<FuelService>, tempfile::TempDir) {
        service(FfiAuthorization::Failed {
            message: "play services unavailable".to_string(),
        })
    }

    #[test]
    fn test_failed_outcome_keeps_error_kind() {
        let outcome = OperationOutcome::Failed {
            error: anyhow::Error::new(ureq::Error::StatusCode(503)).context("Error deleting row"),
            authorization: None,
        };
        assert!(matches!(outcome_to_result(outcome), Err(FuelError::Network { .. })));

        let outcome = OperationOutcome::Failed {
            error: anyhow::anyhow!("database connection lock poisoned"),
            authorization: None,
        };
        assert!(matches!(outcome_to_result(outcome), Err(FuelError::Storage { .. })));

        assert!(matches!(
            outcome_to_result(OperationOutcome::Busy),
            Err(FuelError::Busy)
        ));
    }

    #[test]
    fn test_empty_worksheet_name_rejected() {
        let (service, _dir) = service(needs_consent());
        assert!(service.set_worksheet_name("  ".into()).is_err());
    }

    #[test]
    fn test_entry_status_round_trip_through_store() {
        let (service, _dir) = service(needs_consent());
        let added = service.add_entry(3.0, 4.0, 5.0, None).unwrap();
        let stored = service.entries.get_entry(&EntryId::new(added.id)).unwrap().unwrap();
        assert_eq!(stored.status, SyncStatus::Pending);
    }
}
