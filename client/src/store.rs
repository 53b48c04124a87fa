//! Local persistence for commit secrets.
//!
//! Secrets must outlive the process between commit and reveal. The store is a flat string
//! keyspace; keys are namespaced by flow and asset id (see [secret_key]).

use crate::{Error, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::{
    collections::BTreeMap,
    path::Path,
    sync::{Arc, Mutex},
};
use suu_types::Flow;

/// Key under which the secret of `flow` for `subject` is kept.
pub fn secret_key(flow: Flow, subject: u64) -> String {
    format!("{flow}-secret-{subject}")
}

pub trait SecretStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn delete(&self, key: &str) -> Result<()>;
}

impl<T: SecretStore + ?Sized> SecretStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key)
    }
}

fn poisoned<T>(_: T) -> Error {
    Error::Store("lock poisoned".to_string())
}

/// Process-local store. Contents are lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SecretStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().map_err(poisoned)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .map_err(poisoned)?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().map_err(poisoned)?.remove(key);
        Ok(())
    }
}

fn sqlite_error(err: rusqlite::Error) -> Error {
    Error::Store(err.to_string())
}

/// Store backed by a SQLite file.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(sqlite_error)?;
        Self::init(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(sqlite_error)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=FULL;
             CREATE TABLE IF NOT EXISTS secrets (
                 key TEXT PRIMARY KEY,
                 value TEXT NOT NULL
             );",
        )
        .map_err(sqlite_error)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl SecretStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().map_err(poisoned)?;
        conn.query_row(
            "SELECT value FROM secrets WHERE key = ?",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(sqlite_error)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().map_err(poisoned)?;
        conn.execute(
            "INSERT OR REPLACE INTO secrets (key, value) VALUES (?, ?)",
            params![key, value],
        )
        .map_err(sqlite_error)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock().map_err(poisoned)?;
        conn.execute("DELETE FROM secrets WHERE key = ?", params![key])
            .map_err(sqlite_error)?;
        Ok(())
    }
}
