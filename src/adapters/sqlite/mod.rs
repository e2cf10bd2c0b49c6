//! SQLite adapter: Implementation of ModelStore.
//!
//! Stores one artifact per identity in a `model_artifacts` table. The artifact
//! bytes are the same format the file adapter writes; metadata columns are
//! denormalized copies for inspection with plain SQL.
//!
//! # Mutex Behavior
//!
//! The connection is protected by a `Mutex`. A poisoned mutex surfaces as
//! `StorageError::LockPoisoned` instead of a panic, so analysis callers can
//! degrade to the rule-based path.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};

use crate::domain::RidgeModel;
use crate::ports::ModelStore;

use super::StorageError;

/// SQLite model store adapter.
pub struct SqliteModelStore {
    conn: Mutex<Connection>,
}

impl SqliteModelStore {
    /// Open (or create) a database at the given path.
    ///
    /// # Errors
    /// Returns error if database cannot be opened or initialized.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory SQLite database (for testing).
    ///
    /// # Errors
    /// Returns error if database cannot be created.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.lock()?;

        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS model_artifacts (
                identity TEXT PRIMARY KEY,
                artifact BLOB NOT NULL,
                lag_depth INTEGER NOT NULL,
                samples INTEGER NOT NULL,
                trained_at TEXT NOT NULL,
                saved_at TEXT NOT NULL
            );
            ",
        )?;

        Ok(())
    }

    /// Write raw bytes under an identity, bypassing the model codec.
    ///
    /// Used to simulate damaged artifacts in tests and by tooling that copies
    /// artifacts between stores.
    ///
    /// # Errors
    /// Returns error if the write fails.
    pub fn put_raw(&self, identity: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let conn = self.lock()?;
        conn.execute(
            r"
            INSERT OR REPLACE INTO model_artifacts (
                identity, artifact, lag_depth, samples, trained_at, saved_at
            ) VALUES (?1, ?2, 0, 0, '', ?3)
            ",
            params![identity, bytes, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Number of stored artifacts.
    ///
    /// # Errors
    /// Returns error if the query fails.
    pub fn count(&self) -> Result<usize, StorageError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM model_artifacts", [], |row| {
            row.get(0)
        })?;
        Ok(count as usize)
    }
}

impl ModelStore for SqliteModelStore {
    type Error = StorageError;

    fn exists(&self, identity: &str) -> Result<bool, Self::Error> {
        let conn = self.lock()?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM model_artifacts WHERE identity = ?1",
            params![identity],
            |row| row.get(0),
        )?;

        Ok(count > 0)
    }

    fn load(&self, identity: &str) -> Result<Option<RidgeModel>, Self::Error> {
        let conn = self.lock()?;

        let bytes: Option<Vec<u8>> = conn
            .query_row(
                "SELECT artifact FROM model_artifacts WHERE identity = ?1",
                params![identity],
                |row| row.get(0),
            )
            .optional()?;

        match bytes {
            Some(bytes) => Ok(Some(RidgeModel::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    fn save(&self, identity: &str, model: &RidgeModel) -> Result<(), Self::Error> {
        let conn = self.lock()?;

        conn.execute(
            r"
            INSERT OR REPLACE INTO model_artifacts (
                identity, artifact, lag_depth, samples, trained_at, saved_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
            params![
                identity,
                model.to_bytes(),
                model.lag_depth() as i64,
                model.samples() as i64,
                model.trained_at().to_rfc3339(),
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;

        tracing::info!("Saved model artifact {:?} to database", identity);
        Ok(())
    }

    fn delete(&self, identity: &str) -> Result<(), Self::Error> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM model_artifacts WHERE identity = ?1",
            params![identity],
        )?;
        tracing::info!("Deleted model artifact {:?} from database", identity);
        Ok(())
    }
}
