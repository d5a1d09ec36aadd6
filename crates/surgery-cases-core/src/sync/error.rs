//! Sync error taxonomy.

use thiserror::Error;

use super::gateway::{GatewayError, GatewayErrorKind};
use crate::store::StorageError;

/// Coarse grouping for status display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncErrorCategory {
    Connection,
    Authorization,
    Network,
    Storage,
    Data,
    Busy,
}

/// A classified sync failure. One per round trip.
///
/// The carried detail is for logs; show [`SyncError::user_message`] to users.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("Backend connection not available")]
    ConnectionUnavailable,

    #[error("Not authorized: {0}")]
    Authorization(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Storage verification failed: {0}")]
    StorageVerification(String),

    #[error("Storage quota exceeded: {0}")]
    StorageQuota(String),

    #[error("Malformed data: {0}")]
    MalformedData(String),

    #[error("A sync is already in progress")]
    SyncInProgress,
}

impl SyncError {
    /// Human-readable message. Never contains gateway-internal text.
    pub fn user_message(&self) -> String {
        match self {
            SyncError::ConnectionUnavailable => {
                "Backend connection not available. Sign in and try again.".into()
            }
            SyncError::Authorization(_) => {
                "You are not authorized to sync with the backend. Please check your permissions."
                    .into()
            }
            SyncError::ServiceUnavailable(_) => {
                "Backend service is currently unavailable. Please try again in a moment.".into()
            }
            SyncError::Network(_) => {
                "Network error during sync. Please check your internet connection.".into()
            }
            SyncError::StorageVerification(_) => {
                "Could not save cases on this device. Your unsynced changes are still pending."
                    .into()
            }
            SyncError::StorageQuota(guidance) => guidance.clone(),
            SyncError::MalformedData(_) => {
                "Received case data that could not be merged safely. Please try again.".into()
            }
            SyncError::SyncInProgress => "A sync is already in progress.".into(),
        }
    }

    pub fn category(&self) -> SyncErrorCategory {
        match self {
            SyncError::ConnectionUnavailable | SyncError::ServiceUnavailable(_) => {
                SyncErrorCategory::Connection
            }
            SyncError::Authorization(_) => SyncErrorCategory::Authorization,
            SyncError::Network(_) => SyncErrorCategory::Network,
            SyncError::StorageVerification(_) | SyncError::StorageQuota(_) => {
                SyncErrorCategory::Storage
            }
            SyncError::MalformedData(_) => SyncErrorCategory::Data,
            SyncError::SyncInProgress => SyncErrorCategory::Busy,
        }
    }

    /// Whether retrying the same round trip later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::ServiceUnavailable(_) | SyncError::Network(_) | SyncError::SyncInProgress
        )
    }
}

impl From<GatewayError> for SyncError {
    fn from(e: GatewayError) -> Self {
        match e.kind {
            GatewayErrorKind::NotAuthorized => SyncError::Authorization(e.message),
            GatewayErrorKind::ServiceUnavailable | GatewayErrorKind::Unclassified => {
                SyncError::ServiceUnavailable(e.message)
            }
            GatewayErrorKind::Network => SyncError::Network(e.message),
            GatewayErrorKind::MalformedRequest => SyncError::MalformedData(e.message),
        }
    }
}

impl From<StorageError> for SyncError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Quota { .. } => SyncError::StorageQuota(e.to_string()),
            StorageError::Serialization(inner) => SyncError::MalformedData(inner.to_string()),
            StorageError::Verification(_) | StorageError::Backend(_) => {
                SyncError::StorageVerification(e.to_string())
            }
        }
    }
}
