//! Sync orchestrator: one fetch, push, refetch, merge, persist round trip.
//!
//! Nothing is written locally until the final step, so a failed round trip
//! leaves the local store and the view exactly as they were.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tokio::sync::Mutex as TokioMutex;

use super::error::SyncError;
use super::gateway::{fetch_all_cases, CaseGateway};
use crate::cases::CasesStore;
use crate::config::{CoreConfig, DEFAULT_PAGE_SIZE};
use crate::merge::{has_pending, merge_cases, pending_tombstones, prepare_cases_for_sync};
use crate::models::CaseRecord;
use crate::store::StorageBackend;

/// Step of the current round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Fetching,
    Pushing,
    RefetchingAfterPush,
    Merging,
    Persisting,
}

/// Outcome of a successful round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Cases sent in the bulk upsert (0 when nothing was pending)
    pub pushed: usize,
    /// Remote deletions issued
    pub deleted: usize,
    /// Cases in the post-push snapshot
    pub fetched: usize,
    /// Records persisted locally (0 when the store was cleared mid-sync)
    pub merged: usize,
    pub duration: Duration,
}

/// Drives sync round trips for a [`CasesStore`].
///
/// At most one round trip runs at a time; overlapping calls are rejected
/// with [`SyncError::SyncInProgress`].
pub struct SyncOrchestrator<B: StorageBackend> {
    cases: Arc<CasesStore<B>>,
    gateway: RwLock<Option<Arc<dyn CaseGateway>>>,
    page_size: u64,
    in_flight: TokioMutex<()>,
    phase: Mutex<SyncPhase>,
    last_error: Mutex<Option<SyncError>>,
}

impl<B: StorageBackend> SyncOrchestrator<B> {
    pub fn new(cases: Arc<CasesStore<B>>) -> Self {
        Self::with_page_size(cases, DEFAULT_PAGE_SIZE)
    }

    pub fn with_config(cases: Arc<CasesStore<B>>, config: &CoreConfig) -> Self {
        Self::with_page_size(cases, config.page_size)
    }

    pub fn with_page_size(cases: Arc<CasesStore<B>>, page_size: u64) -> Self {
        Self {
            cases,
            gateway: RwLock::new(None),
            page_size: page_size.max(1),
            in_flight: TokioMutex::new(()),
            phase: Mutex::new(SyncPhase::Idle),
            last_error: Mutex::new(None),
        }
    }

    /// Make the remote available, e.g. after sign-in.
    pub fn attach_gateway(&self, gateway: Arc<dyn CaseGateway>) {
        *self.gateway.write().unwrap_or_else(PoisonError::into_inner) = Some(gateway);
    }

    /// Drop the remote, e.g. on sign-out.
    pub fn detach_gateway(&self) {
        *self.gateway.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_connected(&self) -> bool {
        self.gateway
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Error from the most recent round trip, cleared on success.
    pub fn last_error(&self) -> Option<SyncError> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn has_pending_changes(&self) -> bool {
        self.cases.has_pending()
    }

    pub fn cases(&self) -> &Arc<CasesStore<B>> {
        &self.cases
    }

    fn set_phase(&self, phase: SyncPhase) {
        log::debug!("Sync phase: {:?}", phase);
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
    }

    fn record_outcome(&self, outcome: Option<SyncError>) {
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = outcome;
    }

    /// Run one round trip.
    pub async fn sync(&self) -> Result<SyncReport, SyncError> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            log::debug!("Sync requested while another is running");
            return Err(SyncError::SyncInProgress);
        };

        let gateway = self
            .gateway
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(gateway) = gateway else {
            log::warn!("Sync skipped: no backend connection");
            self.record_outcome(Some(SyncError::ConnectionUnavailable));
            return Err(SyncError::ConnectionUnavailable);
        };

        let result = self.round_trip(gateway.as_ref()).await;
        self.set_phase(SyncPhase::Idle);

        match &result {
            Ok(report) => {
                log::info!(
                    "Sync complete: pushed {}, deleted {}, fetched {}, stored {} in {:?}",
                    report.pushed,
                    report.deleted,
                    report.fetched,
                    report.merged,
                    report.duration
                );
                self.record_outcome(None);
            }
            Err(e) => {
                log::error!("Sync failed: {}", e);
                self.record_outcome(Some(e.clone()));
            }
        }
        result
    }

    async fn round_trip(&self, gateway: &dyn CaseGateway) -> Result<SyncReport, SyncError> {
        let started = Instant::now();
        let (generation, local) = self.cases.sync_snapshot();

        self.set_phase(SyncPhase::Fetching);
        let remote = fetch_all_cases(gateway, self.page_size).await?;

        let mut pushed = 0;
        let mut deleted = 0;
        if has_pending(&local) {
            self.set_phase(SyncPhase::Pushing);
            let payload = prepare_cases_for_sync(&local, &remote);
            gateway.push_cases(&payload).await?;
            pushed = payload.len();

            for case_id in pending_tombstones(&local) {
                gateway.delete_case(case_id).await?;
                deleted += 1;
            }
        }

        self.set_phase(SyncPhase::RefetchingAfterPush);
        let refetched = fetch_all_cases(gateway, self.page_size).await?;

        self.set_phase(SyncPhase::Merging);
        let merged = settle(merge_cases(&local, &refetched));

        self.set_phase(SyncPhase::Persisting);
        let stored = self
            .cases
            .persist_sync_result(generation, &local, merged)?
            .map_or(0, |records| records.len());

        Ok(SyncReport {
            pushed,
            deleted,
            fetched: refetched.len(),
            merged: stored,
            duration: started.elapsed(),
        })
    }
}

/// Finish a merged collection: drop confirmed tombstones, clear pending
/// flags and re-normalize.
fn settle(merged: Vec<CaseRecord>) -> Vec<CaseRecord> {
    merged
        .into_iter()
        .filter(|record| !record.deleted)
        .map(|mut record| {
            record.pending_sync = false;
            record.normalized()
        })
        .collect()
}
