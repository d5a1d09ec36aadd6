//! In-memory storage backend with a byte quota and fault injection.

use std::collections::HashMap;

use super::{StorageBackend, StorageError, StorageResult, StoredBlob};

/// Keyed blobs held in a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    blobs: HashMap<String, StoredBlob>,
    capacity: Option<usize>,
    corrupt_writes: bool,
    fail_operations: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend rejecting any blob larger than `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// Store a truncated value on every write, so read-back differs.
    pub fn corrupt_writes(&mut self, enabled: bool) {
        self.corrupt_writes = enabled;
    }

    /// Make every operation fail with a backend error.
    pub fn fail_operations(&mut self, enabled: bool) {
        self.fail_operations = enabled;
    }

    /// Raw blob under `key`.
    pub fn get(&self, key: &str) -> Option<StoredBlob> {
        self.blobs.get(key).cloned()
    }

    fn check_available(&self) -> StorageResult<()> {
        if self.fail_operations {
            return Err(StorageError::Backend("storage unavailable".into()));
        }
        Ok(())
    }
}

impl StorageBackend for MemoryBackend {
    fn read(&self, key: &str) -> StorageResult<Option<StoredBlob>> {
        self.check_available()?;
        Ok(self.get(key))
    }

    fn write(&mut self, key: &str, blob: &StoredBlob) -> StorageResult<()> {
        self.check_available()?;
        if let Some(capacity) = self.capacity {
            if blob.value.len() > capacity {
                return Err(StorageError::Quota {
                    bytes: blob.value.len(),
                    limit: Some(capacity),
                });
            }
        }

        let mut stored = blob.clone();
        if self.corrupt_writes {
            let keep = stored.value.len() / 2;
            stored.value.truncate(keep);
        }
        self.blobs.insert(key.to_string(), stored);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        self.check_available()?;
        self.blobs.remove(key);
        Ok(())
    }
}
