//! Local store: the whole case collection as one checksummed blob.
//!
//! Writes are verified by reading the blob back. Reads never fail; an
//! unreadable blob is logged and treated as an empty collection.

mod memory;

pub use memory::*;

use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::CoreConfig;
use crate::models::CaseRecord;

/// A serialized collection together with its checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub value: String,
    pub checksum: String,
}

impl StoredBlob {
    /// Build a blob, computing the checksum of `value`.
    pub fn new(value: String) -> Self {
        let checksum = checksum(&value);
        Self { value, checksum }
    }

    /// Whether the stored checksum matches the value.
    pub fn is_intact(&self) -> bool {
        checksum(&self.value) == self.checksum
    }
}

/// SHA-256 of the blob, lowercase hex.
pub fn checksum(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

/// Local store errors.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage verification failed: {0}")]
    Verification(String),

    #[error("{}", quota_guidance(.bytes, .limit))]
    Quota { bytes: usize, limit: Option<usize> },

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn quota_guidance(bytes: &usize, limit: &Option<usize>) -> String {
    let size = match (bytes, limit) {
        (0, _) => "the device storage is full".to_string(),
        (bytes, Some(limit)) => format!("{} bytes needed, {} allowed", bytes, limit),
        (bytes, None) => format!("{} bytes needed", bytes),
    };
    format!(
        "Local storage quota exceeded ({}). Sync pending cases, then delete old cases or export them to CSV to free space.",
        size
    )
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A keyed blob store.
pub trait StorageBackend: Send {
    /// Read the blob under `key`, if any.
    fn read(&self, key: &str) -> StorageResult<Option<StoredBlob>>;

    /// Atomically replace the blob under `key`.
    fn write(&mut self, key: &str, blob: &StoredBlob) -> StorageResult<()>;

    /// Remove the blob under `key`. Missing keys are not an error.
    fn remove(&mut self, key: &str) -> StorageResult<()>;
}

/// Persistence for the full case collection.
pub struct LocalStore<B: StorageBackend> {
    backend: B,
    key: String,
    max_blob_bytes: Option<usize>,
}

impl<B: StorageBackend> LocalStore<B> {
    /// Create a store with the default configuration.
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, &CoreConfig::default())
    }

    /// Create a store using the key and quota from `config`.
    pub fn with_config(backend: B, config: &CoreConfig) -> Self {
        Self {
            backend,
            key: config.storage_key.clone(),
            max_blob_bytes: config.max_blob_bytes,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Load every decodable record.
    ///
    /// Missing, corrupt or unparseable blobs yield an empty collection.
    /// Records without a usable `caseId` are skipped.
    pub fn load(&self) -> Vec<CaseRecord> {
        let blob = match self.backend.read(&self.key) {
            Ok(Some(blob)) => blob,
            Ok(None) => return Vec::new(),
            Err(e) => {
                log::warn!("Failed to read local cases: {}", e);
                return Vec::new();
            }
        };

        if !blob.is_intact() {
            log::warn!("Local cases checksum mismatch; ignoring stored blob");
            return Vec::new();
        }

        let entries = match serde_json::from_str::<Value>(&blob.value) {
            Ok(Value::Array(entries)) => entries,
            Ok(_) => {
                log::warn!("Local cases blob is not an array; ignoring it");
                return Vec::new();
            }
            Err(e) => {
                log::warn!("Failed to parse local cases: {}", e);
                return Vec::new();
            }
        };

        let mut records = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            match CaseRecord::from_stored(entry) {
                Ok(record) => records.push(record.normalized()),
                Err(e) => log::warn!("Skipping stored case at index {}: {}", index, e),
            }
        }
        records
    }

    /// Replace the stored collection and verify the write.
    ///
    /// On error the previous blob is left in place.
    pub fn save(&mut self, cases: &[CaseRecord]) -> StorageResult<()> {
        let blob = StoredBlob::new(serde_json::to_string(cases)?);

        if let Some(limit) = self.max_blob_bytes {
            if blob.value.len() > limit {
                return Err(StorageError::Quota {
                    bytes: blob.value.len(),
                    limit: Some(limit),
                });
            }
        }

        self.backend.write(&self.key, &blob)?;

        match self.backend.read(&self.key)? {
            Some(read_back) if read_back == blob => {
                log::debug!("Saved {} cases ({} bytes)", cases.len(), blob.value.len());
                Ok(())
            }
            Some(_) => Err(StorageError::Verification(
                "stored data does not match what was written".into(),
            )),
            None => Err(StorageError::Verification(
                "stored data missing after write".into(),
            )),
        }
    }

    /// Remove the stored collection. Failures are logged, not returned.
    pub fn clear(&mut self) {
        if let Err(e) = self.backend.remove(&self.key) {
            log::warn!("Failed to clear local cases: {}", e);
        }
    }
}
