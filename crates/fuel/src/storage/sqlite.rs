//! SQLite-backed key-value storage
//!
//! One table holds every namespace; each `SqliteKeyValueStore` handle is
//! bound to a single namespace and handles created with
//! [`SqliteKeyValueStore::namespaced`] share the same connection.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, OptionalExtension, params};
use rusqlite_migration::{M, Migrations};

use super::KeyValueStore;

/// Namespace used by [`SqliteKeyValueStore::open`]
const DEFAULT_NAMESPACE: &str = "default";

/// Database migrations
///
/// Each migration is applied in order. The user_version pragma tracks which
/// migrations have been applied.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        // Migration 1: Initial schema
        M::up(
            r#"
            CREATE TABLE kv (
                namespace TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (namespace, key)
            );
            "#,
        ),
    ])
}

/// SQLite-based key-value store
pub struct SqliteKeyValueStore {
    conn: Arc<Mutex<Connection>>,
    namespace: String,
}

impl SqliteKeyValueStore {
    /// Open (or create) a store at `db_path`
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        // WAL keeps readers unblocked while an entry list is rewritten;
        // NORMAL sync is safe under WAL.
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            "#,
        )?;

        migrations()
            .to_latest(&mut conn)
            .context("Failed to run database migrations")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            namespace: DEFAULT_NAMESPACE.to_string(),
        })
    }

    /// A handle on the same database bound to another namespace
    pub fn namespaced(&self, namespace: impl Into<String>) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection lock poisoned"))
    }
}

fn read_value(conn: &Connection, namespace: &str, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM kv WHERE namespace = ? AND key = ?",
            params![namespace, key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

fn write_value(conn: &Connection, namespace: &str, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO kv (namespace, key, value, updated_at)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(namespace, key) DO UPDATE SET
            value = excluded.value,
            updated_at = excluded.updated_at",
        params![namespace, key, value, chrono::Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

fn delete_value(conn: &Connection, namespace: &str, key: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM kv WHERE namespace = ? AND key = ?",
        params![namespace, key],
    )?;
    Ok(())
}

impl KeyValueStore for SqliteKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        read_value(&conn, &self.namespace, key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn()?;
        write_value(&conn, &self.namespace, key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let conn = self.conn()?;
        delete_value(&conn, &self.namespace, key)
    }

    fn update(
        &self,
        key: &str,
        f: &mut dyn FnMut(Option<String>) -> Result<Option<String>>,
    ) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let current = read_value(&tx, &self.namespace, key)?;
        match f(current)? {
            Some(value) => write_value(&tx, &self.namespace, key, &value)?,
            None => delete_value(&tx, &self.namespace, key)?,
        }

        tx.commit()?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT key FROM kv WHERE namespace = ? ORDER BY key")?;
        let keys = stmt
            .query_map(params![self.namespace], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_test_store() -> (SqliteKeyValueStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        // Use .test.sqlite extension to clearly distinguish from production databases
        let db_path = dir.path().join("lumen.test.sqlite");
        let store = SqliteKeyValueStore::open(&db_path).unwrap();
        (store, dir)
    }

    #[test]
    fn test_set_get_remove() {
        let (store, _dir) = create_test_store();

        assert_eq!(store.get("entries").unwrap(), None);
        store.set("entries", "[]").unwrap();
        assert_eq!(store.get("entries").unwrap().as_deref(), Some("[]"));

        store.set("entries", "[1]").unwrap();
        assert_eq!(store.get("entries").unwrap().as_deref(), Some("[1]"));

        store.remove("entries").unwrap();
        assert_eq!(store.get("entries").unwrap(), None);
    }

    #[test]
    fn test_namespaces_are_isolated() {
        let (store, _dir) = create_test_store();
        let entries = store.namespaced("fuel_entries");
        let settings = store.namespaced("lumen_settings");

        entries.set("k", "entries").unwrap();
        settings.set("k", "settings").unwrap();

        assert_eq!(entries.get("k").unwrap().as_deref(), Some("entries"));
        assert_eq!(settings.get("k").unwrap().as_deref(), Some("settings"));
        assert_eq!(store.get("k").unwrap(), None);
        assert_eq!(settings.namespace(), "lumen_settings");
    }

    #[test]
    fn test_update_commits_and_removes() {
        let (store, _dir) = create_test_store();

        store
            .update("n", &mut |current| {
                let n: i64 = current.map(|v| v.parse()).transpose()?.unwrap_or(0);
                Ok(Some((n + 1).to_string()))
            })
            .unwrap();
        store
            .update("n", &mut |current| {
                let n: i64 = current.map(|v| v.parse()).transpose()?.unwrap_or(0);
                Ok(Some((n + 1).to_string()))
            })
            .unwrap();
        assert_eq!(store.get("n").unwrap().as_deref(), Some("2"));

        store.update("n", &mut |_| Ok(None)).unwrap();
        assert_eq!(store.get("n").unwrap(), None);
    }

    #[test]
    fn test_failed_update_rolls_back() {
        let (store, _dir) = create_test_store();
        store.set("k", "original").unwrap();

        let result = store.update("k", &mut |_| anyhow::bail!("refused"));
        assert!(result.is_err());
        assert_eq!(store.get("k").unwrap().as_deref(), Some("original"));
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("lumen.test.sqlite");

        {
            let store = SqliteKeyValueStore::open(&db_path).unwrap();
            store.namespaced("fuel_entries").set("entries", "[]").unwrap();
        }

        let store = SqliteKeyValueStore::open(&db_path).unwrap();
        assert_eq!(
            store.namespaced("fuel_entries").get("entries").unwrap().as_deref(),
            Some("[]")
        );
    }

    #[test]
    fn test_keys() {
        let store = SqliteKeyValueStore::open_in_memory().unwrap();
        store.set("b", "2").unwrap();
        store.set("a", "1").unwrap();
        store.namespaced("other").set("c", "3").unwrap();
        assert_eq!(store.keys().unwrap(), vec!["a", "b"]);
    }
}
