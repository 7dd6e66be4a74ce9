//! Key-value persistence seam.
//!
//! The conversation log only needs whole-value reads and writes under a
//! single key, so that is all this trait offers.

use rusqlite::{params, OptionalExtension};

use kalpataru_core::error::KalpataruError;

use crate::db::Database;

/// A local string key-value store.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, KalpataruError>;

    /// Insert or overwrite the value under `key`.
    fn set(&self, key: &str, value: &str) -> Result<(), KalpataruError>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), KalpataruError>;
}

impl KeyValueStore for Database {
    fn get(&self, key: &str) -> Result<Option<String>, KalpataruError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| KalpataruError::Storage(format!("Failed to read key {}: {}", key, e)))
        })
    }

    fn set(&self, key: &str, value: &str) -> Result<(), KalpataruError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO kv_store (key, value, updated_at)
                 VALUES (?1, ?2, strftime('%s', 'now'))
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at",
                params![key, value],
            )
            .map_err(|e| KalpataruError::Storage(format!("Failed to write key {}: {}", key, e)))?;
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> Result<(), KalpataruError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM kv_store WHERE key = ?1", params![key])
                .map_err(|e| {
                    KalpataruError::Storage(format!("Failed to remove key {}: {}", key, e))
                })?;
            Ok(())
        })
    }
}
