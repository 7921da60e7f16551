//! SQLite-backed durable key-value store

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, OptionalExtension, params};
use rusqlite_migration::{M, Migrations};

use super::KvStore;

/// Database file name inside the mailsync config directory
pub const DEFAULT_DB_FILE: &str = "mailsync.db";

/// Database migrations
///
/// Each migration is applied in order. The user_version pragma tracks which
/// migrations have been applied.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(
        r#"
        CREATE TABLE kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        "#,
    )])
}

/// SQLite implementation of [`KvStore`]
pub struct SqliteKvStore {
    conn: Mutex<Connection>,
}

impl SqliteKvStore {
    /// Open (or create) a store at `db_path`
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;

        // Drafts are rewritten on every keystroke
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            "#,
        )?;

        Self::with_connection(conn)
    }

    /// Open the store in the shared config directory
    pub fn open_default() -> Result<Self> {
        let dir = config::ensure_config_dir()?;
        Self::open(dir.join(DEFAULT_DB_FILE))
    }

    /// Open a throwaway store that lives only as long as the process
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::with_connection(conn)
    }

    fn with_connection(mut conn: Connection) -> Result<Self> {
        migrations()
            .to_latest(&mut conn)
            .context("Failed to run database migrations")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| anyhow!("database lock poisoned"))
    }
}

impl KvStore for SqliteKvStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO kv (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = datetime('now')
            "#,
            params![key, value],
        )
        .with_context(|| format!("Failed to store {key}"))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT key FROM kv WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key ASC",
        )?;
        let keys = stmt
            .query_map(params![prefix], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_test_store() -> (SqliteKvStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = SqliteKvStore::open(dir.path().join("kv.test.sqlite")).unwrap();
        (store, dir)
    }

    #[test]
    fn test_upsert_and_remove() {
        let (store, _dir) = create_test_store();

        store.set("active/acct/INBOX", "42").unwrap();
        store.set("active/acct/INBOX", "43").unwrap();
        assert_eq!(store.get("active/acct/INBOX").unwrap().as_deref(), Some("43"));

        store.remove("active/acct/INBOX").unwrap();
        assert!(store.get("active/acct/INBOX").unwrap().is_none());
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kv.test.sqlite");

        {
            let store = SqliteKvStore::open(&path).unwrap();
            store.set("drafts/1", r#"{"subject":"s","body":"b"}"#).unwrap();
        }

        let store = SqliteKvStore::open(&path).unwrap();
        assert!(store.get("drafts/1").unwrap().is_some());
    }

    #[test]
    fn test_keys_with_prefix() {
        let store = SqliteKvStore::open_in_memory().unwrap();
        store.set("drafts/1", "{}").unwrap();
        store.set("drafts/2", "{}").unwrap();
        store.set("draftsX", "{}").unwrap();
        store.set("instruction/1", "\"\"").unwrap();

        let keys = store.keys_with_prefix("drafts/").unwrap();
        assert_eq!(keys, vec!["drafts/1".to_string(), "drafts/2".to_string()]);
    }
}
