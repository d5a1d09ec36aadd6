//! Runtime configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default storage key for the case collection.
pub const DEFAULT_STORAGE_KEY: &str = "surgery_cases_local";

/// Default page size when fetching the remote snapshot.
pub const DEFAULT_PAGE_SIZE: u64 = 100;

/// Default quota for the serialized collection (5 MiB, the usual browser
/// local-storage allowance).
pub const DEFAULT_MAX_BLOB_BYTES: usize = 5 * 1024 * 1024;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Core configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Key the case collection is stored under
    pub storage_key: String,
    /// Page size for remote snapshot fetches
    pub page_size: u64,
    /// Maximum serialized collection size; `None` disables the check
    pub max_blob_bytes: Option<usize>,
    /// SQLite database path; `None` keeps the store in memory
    pub database_path: Option<String>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            max_blob_bytes: Some(DEFAULT_MAX_BLOB_BYTES),
            database_path: None,
        }
    }
}

impl CoreConfig {
    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: CoreConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.storage_key.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "storage_key",
                reason: "must not be empty".into(),
            });
        }
        if self.page_size == 0 {
            return Err(ConfigError::Invalid {
                field: "page_size",
                reason: "must be at least 1".into(),
            });
        }
        if self.max_blob_bytes == Some(0) {
            return Err(ConfigError::Invalid {
                field: "max_blob_bytes",
                reason: "must be positive or null".into(),
            });
        }
        Ok(())
    }
}
