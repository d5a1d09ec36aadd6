//! Keyed blob operations for the local case store.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::store::{StorageBackend, StorageError, StorageResult, StoredBlob};

impl Database {
    /// Insert or replace the blob stored under `key`.
    pub fn put_blob(&self, key: &str, value: &str, checksum: &str) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO local_store (key, value, checksum, updated_at)
            VALUES (?1, ?2, ?3, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                checksum = excluded.checksum,
                updated_at = excluded.updated_at
            "#,
            params![key, value, checksum],
        )?;
        Ok(())
    }

    /// Get the blob and checksum stored under `key`.
    pub fn get_blob(&self, key: &str) -> DbResult<Option<(String, String)>> {
        self.conn
            .query_row(
                "SELECT value, checksum FROM local_store WHERE key = ?",
                [key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(Into::into)
    }

    /// Delete the blob stored under `key`.
    pub fn delete_blob(&self, key: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM local_store WHERE key = ?", [key])?;
        Ok(rows_affected > 0)
    }
}

impl From<DbError> for StorageError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::StorageFull => StorageError::Quota {
                bytes: 0,
                limit: None,
            },
            other => StorageError::Backend(other.to_string()),
        }
    }
}

impl StorageBackend for Database {
    fn read(&self, key: &str) -> StorageResult<Option<StoredBlob>> {
        Ok(self
            .get_blob(key)?
            .map(|(value, checksum)| StoredBlob { value, checksum }))
    }

    fn write(&mut self, key: &str, blob: &StoredBlob) -> StorageResult<()> {
        self.put_blob(key, &blob.value, &blob.checksum)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        self.delete_blob(key)?;
        Ok(())
    }
}
