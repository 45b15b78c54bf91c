//! FFI logging backend that routes logs to Kotlin/Swift via callback
//!
//! Installs a `log` backend that forwards records to a UniFFI
//! [`LogCallback`], so Rust logs show up in logcat / unified logging.

use std::sync::{Arc, OnceLock, RwLock};

use log::{Level, Log, Metadata, Record, SetLoggerError};

use super::types::{FfiLogLevel, LogCallback};

/// Global storage for the FFI logger
static FFI_LOGGER: OnceLock<FfiLogger> = OnceLock::new();

/// Logger that forwards to a callback when one is set
struct FfiLogger {
    callback: RwLock<Option<Arc<dyn LogCallback>>>,
    max_level: RwLock<Level>,
}

impl FfiLogger {
    fn new(max_level: Level) -> Self {
        Self {
            callback: RwLock::new(None),
            max_level: RwLock::new(max_level),
        }
    }

    fn set_callback(&self, callback: Option<Arc<dyn LogCallback>>) {
        if let Ok(mut guard) = self.callback.write() {
            *guard = callback;
        }
    }

    fn set_max_level(&self, level: Level) {
        if let Ok(mut guard) = self.max_level.write() {
            *guard = level;
        }
    }

    fn max_level(&self) -> Level {
        self.max_level.read().map(|l| *l).unwrap_or(Level::Info)
    }
}

impl Log for FfiLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level()
            && self.callback.read().is_ok_and(|cb| cb.is_some())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        if let Ok(guard) = self.callback.read()
            && let Some(callback) = guard.as_ref()
        {
            callback.on_log(
                FfiLogLevel::from(record.level()),
                record.target().to_string(),
                record.args().to_string(),
            );
        }
    }

    fn flush(&self) {}
}

/// Install the FFI logger as the global logger
///
/// Fails if another logger (e.g. env_logger) is already installed. The
/// callback can be set later via [`set_log_callback`]; until then records
/// are dropped.
pub fn init_ffi_logger(max_level: Level) -> Result<(), SetLoggerError> {
    let logger = FFI_LOGGER.get_or_init(|| FfiLogger::new(max_level));
    log::set_logger(logger)?;
    log::set_max_level(max_level.to_level_filter());
    Ok(())
}

/// Set (or clear with `None`) the callback receiving log records
pub fn set_log_callback(callback: Option<Arc<dyn LogCallback>>) {
    if let Some(logger) = FFI_LOGGER.get() {
        logger.set_callback(callback);
    }
}

/// Update the maximum log level
pub fn set_log_level(level: Level) {
    if let Some(logger) = FFI_LOGGER.get() {
        logger.set_max_level(level);
        log::set_max_level(level.to_level_filter());
    }
}

/// Route Rust logs to the host
///
/// Safe to call more than once; later calls replace the callback and level.
#[uniffi::export]
pub fn initialize_logging(callback: Box<dyn LogCallback>, max_level: FfiLogLevel) {
    let level = Level::from(max_level);
    if init_ffi_logger(level).is_err() {
        // Already installed
        set_log_level(level);
    }
    set_log_callback(Some(Arc::from(callback)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Collect(Mutex<Vec<(FfiLogLevel, String)>>);

    impl LogCallback for Collect {
        fn on_log(&self, level: FfiLogLevel, _target: String, message: String) {
            self.0.lock().unwrap().push((level, message));
        }
    }

    #[test]
    fn test_logger_filters_by_level() {
        let logger = FfiLogger::new(Level::Info);
        let sink = Arc::new(Collect(Mutex::new(Vec::new())));
        logger.set_callback(Some(sink.clone()));

        logger.log(
            &Record::builder()
                .level(Level::Warn)
                .target("fuel::test")
                .args(format_args!("kept"))
                .build(),
        );
        logger.log(
            &Record::builder()
                .level(Level::Debug)
                .args(format_args!("dropped"))
                .build(),
        );

        let seen = sink.0.lock().unwrap();
        assert_eq!(*seen, vec![(FfiLogLevel::Warn, "kept".to_string())]);
    }

    #[test]
    fn test_logger_without_callback_is_disabled() {
        let logger = FfiLogger::new(Level::Trace);
        let metadata = Metadata::builder().level(Level::Error).build();
        assert!(!logger.enabled(&metadata));
    }
}
