//! FFI bindings for UniFFI export
//!
//! This module provides Kotlin/Swift bindings for the fuel crate via UniFFI.
//!
//! ## Usage from Kotlin
//!
//! ```kotlin
//! // Route Rust logs to logcat first
//! initializeLogging(logCallback, FfiLogLevel.INFO)
//!
//! // The authorization callback wraps Identity.getAuthorizationClient
//! val service = FuelService(dbPath = "${filesDir}/lumen.db", authorization = authCallback)
//!
//! try {
//!     service.addEntry(gallons = 10.2, odometer = 45120.0, cost = 38.5, date = null)
//! } catch (e: FuelException.AuthorizationRequired) {
//!     launchConsent(e.resolution)
//!     // then: service.retryLastFailed()
//! }
//! ```

mod logging;
mod service;
mod types;

pub use logging::{init_ffi_logger, initialize_logging, set_log_callback, set_log_level};
pub use service::*;
pub use types::*;
