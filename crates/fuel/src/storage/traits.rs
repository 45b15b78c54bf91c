//! Storage trait definitions

use anyhow::Result;

/// Opaque string-keyed persistence
///
/// Values are stored as strings; callers own the encoding (JSON for entry
/// lists, raw strings for settings). Implementations must be safe to share
/// across threads.
pub trait KeyValueStore: Send + Sync {
    /// Read a value
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a value (no-op if absent)
    fn remove(&self, key: &str) -> Result<()>;

    /// Atomically read-modify-write a single key
    ///
    /// `f` receives the current value and returns the new one; returning
    /// `None` removes the key. No other writer can interleave between the
    /// read and the write.
    fn update(
        &self,
        key: &str,
        f: &mut dyn FnMut(Option<String>) -> Result<Option<String>>,
    ) -> Result<()>;

    /// List all keys currently stored
    fn keys(&self) -> Result<Vec<String>>;
}
