//! Remote case gateway boundary.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{CaseDraft, CaseId, CaseUpdate, SurgeryCase};

/// What went wrong at the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayErrorKind {
    NotAuthorized,
    ServiceUnavailable,
    Network,
    MalformedRequest,
    Unclassified,
}

/// Gateway error with a structured kind.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct GatewayError {
    pub kind: GatewayErrorKind,
    pub message: String,
}

impl GatewayError {
    pub fn new(kind: GatewayErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Classify an unstructured transport message by substring.
    ///
    /// Only for transports that cannot report a kind themselves.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        let contains_any = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

        let kind = if contains_any(&["unauthorized", "not authorized", "forbidden"]) {
            GatewayErrorKind::NotAuthorized
        } else if contains_any(&[
            "canister",
            "service unavailable",
            "replica",
            "actor",
            "initialization",
            "initialize",
        ]) {
            GatewayErrorKind::ServiceUnavailable
        } else if contains_any(&["network", "fetch", "timeout", "timed out", "connection"]) {
            GatewayErrorKind::Network
        } else if contains_any(&["invalid argument", "malformed", "decode", "deserializ"]) {
            GatewayErrorKind::MalformedRequest
        } else {
            GatewayErrorKind::Unclassified
        };

        Self { kind, message }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// The authenticated remote case collection.
#[async_trait]
pub trait CaseGateway: Send + Sync {
    /// One page of cases starting at offset `start`.
    ///
    /// Use [`fetch_all_cases`] to get the full snapshot.
    async fn fetch_page(&self, start: u64, limit: u64) -> GatewayResult<Vec<SurgeryCase>>;

    /// Idempotent bulk upsert.
    async fn push_cases(&self, cases: &[SurgeryCase]) -> GatewayResult<()>;

    /// Create a case, returning its server-assigned id.
    async fn create_case(&self, draft: &CaseDraft) -> GatewayResult<CaseId>;

    /// Partially update a case. Returns `false` when the id is unknown.
    async fn update_case(&self, case_id: CaseId, update: &CaseUpdate) -> GatewayResult<bool>;

    /// Delete a case. Unknown ids are a no-op.
    async fn delete_case(&self, case_id: CaseId) -> GatewayResult<()>;
}

/// Fetch every remote case, page by page, until an empty or short page.
pub async fn fetch_all_cases(
    gateway: &dyn CaseGateway,
    page_size: u64,
) -> GatewayResult<Vec<SurgeryCase>> {
    let page_size = page_size.max(1);
    let mut cases = Vec::new();
    let mut start = 0;

    loop {
        let page = gateway.fetch_page(start, page_size).await?;
        let count = page.len() as u64;
        cases.extend(page);
        if count < page_size {
            break;
        }
        start += count;
    }

    log::debug!("Fetched {} remote cases", cases.len());
    Ok(cases)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_message_classification() {
        let cases = [
            ("Unauthorized: caller is anonymous", GatewayErrorKind::NotAuthorized),
            ("Canister abc is stopped", GatewayErrorKind::ServiceUnavailable),
            ("Replica returned an error", GatewayErrorKind::ServiceUnavailable),
            ("Actor initialization failed", GatewayErrorKind::ServiceUnavailable),
            ("Failed to fetch", GatewayErrorKind::Network),
            ("Request timeout after 30s", GatewayErrorKind::Network),
            ("Connection reset by peer", GatewayErrorKind::Network),
            ("Malformed candid payload", GatewayErrorKind::MalformedRequest),
            ("something odd", GatewayErrorKind::Unclassified),
        ];
        for (message, kind) in cases {
            assert_eq!(GatewayError::from_message(message).kind, kind, "{}", message);
        }
    }

    #[test]
    fn test_authorization_checked_first() {
        let err = GatewayError::from_message("Network says: not authorized");
        assert_eq!(err.kind, GatewayErrorKind::NotAuthorized);
        assert_eq!(err.to_string(), "Network says: not authorized");
    }
}
