//! Single-flight operation runner for UI hosts
//!
//! Runs one repository operation at a time and remembers the last one that
//! failed so the user can retry it.

use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::models::{EntryId, FuelEntry};
use crate::repository::FuelRepository;
use crate::sheets::{AuthorizationRequired, PendingAuthorization};

/// A user-initiated repository operation
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Add(FuelEntry),
    Delete(EntryId),
}

impl Operation {
    fn describe(&self) -> String {
        match self {
            Operation::Add(entry) => format!("add {}", entry.id),
            Operation::Delete(id) => format!("delete {}", id),
        }
    }
}

/// How a run ended
#[derive(Debug)]
pub enum OperationOutcome {
    /// Another operation was in flight; nothing was done
    Busy,
    /// The operation finished; adds carry the stored entry
    Completed { entry: Option<FuelEntry> },
    /// The operation failed and was remembered for retry
    Failed {
        error: anyhow::Error,
        authorization: Option<PendingAuthorization>,
    },
}

impl OperationOutcome {
    pub fn is_busy(&self) -> bool {
        matches!(self, OperationOutcome::Busy)
    }
}

/// Runs repository operations one at a time
pub struct OperationRunner {
    repository: Arc<FuelRepository>,
    busy: AtomicBool,
    last_failed: Mutex<Option<Operation>>,
}

/// Clears the busy flag when dropped
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl OperationRunner {
    pub fn new(repository: Arc<FuelRepository>) -> Self {
        Self {
            repository,
            busy: AtomicBool::new(false),
            last_failed: Mutex::new(None),
        }
    }

    pub fn repository(&self) -> &Arc<FuelRepository> {
        &self.repository
    }

    /// Whether an operation is in flight
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// The operation `retry_last_failed` would run
    pub fn last_failed(&self) -> Option<Operation> {
        self.last_failed.lock().ok().and_then(|last| last.clone())
    }

    /// Run an operation unless another one is in flight
    pub fn run(&self, operation: Operation) -> OperationOutcome {
        let Some(_guard) = self.try_begin() else {
            debug!("Rejected {}: busy", operation.describe());
            return OperationOutcome::Busy;
        };
        self.execute(operation)
    }

    /// Re-run the last failed operation; `None` when there is nothing to retry
    pub fn retry_last_failed(&self) -> Option<OperationOutcome> {
        let Some(_guard) = self.try_begin() else {
            return Some(OperationOutcome::Busy);
        };
        let operation = self.last_failed()?;
        info!("Retrying last failed operation: {}", operation.describe());
        Some(self.execute(operation))
    }

    fn try_begin(&self) -> Option<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| BusyGuard(&self.busy))
    }

    fn execute(&self, operation: Operation) -> OperationOutcome {
        let result = match &operation {
            Operation::Add(entry) => self.repository.add_entry(entry.clone()).map(Some),
            Operation::Delete(id) => self.repository.delete(id).map(|_| None),
        };

        match result {
            Ok(entry) => {
                self.set_last_failed(None);
                OperationOutcome::Completed { entry }
            }
            Err(e) => {
                warn!("Operation {} failed: {:#}", operation.describe(), e);
                let authorization = AuthorizationRequired::find(&e).map(|a| a.pending().clone());
                self.set_last_failed(Some(operation));
                OperationOutcome::Failed {
                    error: e,
                    authorization,
                }
            }
        }
    }

    fn set_last_failed(&self, operation: Option<Operation>) {
        if let Ok(mut last) = self.last_failed.lock() {
            *last = operation;
        }
    }
}
