//! In-process gateway used by tests and demos.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::gateway::{CaseGateway, GatewayError, GatewayResult};
use crate::dates::now_nanos;
use crate::models::{CaseDraft, CaseId, CaseUpdate, SurgeryCase};

/// Gateway operations, for fault injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOp {
    FetchPage,
    PushCases,
    CreateCase,
    UpdateCase,
    DeleteCase,
}

#[derive(Default)]
struct ServerState {
    cases: BTreeMap<CaseId, SurgeryCase>,
    next_id: CaseId,
    clock: i64,
    faults: HashMap<GatewayOp, VecDeque<GatewayError>>,
    calls: HashMap<GatewayOp, usize>,
}

impl ServerState {
    /// Monotonic server timestamp.
    fn tick(&mut self) -> i64 {
        self.clock = now_nanos().max(self.clock + 1);
        self.clock
    }

    fn begin(&mut self, op: GatewayOp) -> GatewayResult<()> {
        *self.calls.entry(op).or_default() += 1;
        match self.faults.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn confirm(&mut self, mut case: SurgeryCase) -> SurgeryCase {
        case.is_synchronized = true;
        case.last_sync_timestamp = self.tick();
        case
    }
}

/// A gateway backed by an ordered map. Cases are served in id order.
pub struct InMemoryGateway {
    state: Mutex<ServerState>,
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ServerState {
                next_id: 1,
                ..Default::default()
            }),
        }
    }

    /// Gateway pre-populated with `cases`, stored as given.
    pub fn with_cases(cases: impl IntoIterator<Item = SurgeryCase>) -> Self {
        let gateway = Self::new();
        {
            let mut state = gateway.lock();
            for case in cases {
                state.next_id = state.next_id.max(case.case_id + 1);
                state.cases.insert(case.case_id, case);
            }
        }
        gateway
    }

    fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next call of `op` fail with `error`. Faults queue up.
    pub fn fail_next(&self, op: GatewayOp, error: GatewayError) {
        self.lock().faults.entry(op).or_default().push_back(error);
    }

    /// Number of times `op` was called, failed calls included.
    pub fn call_count(&self, op: GatewayOp) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Current server contents in id order.
    pub fn snapshot(&self) -> Vec<SurgeryCase> {
        self.lock().cases.values().cloned().collect()
    }

    pub fn get(&self, case_id: CaseId) -> Option<SurgeryCase> {
        self.lock().cases.get(&case_id).cloned()
    }
}

#[async_trait]
impl CaseGateway for InMemoryGateway {
    async fn fetch_page(&self, start: u64, limit: u64) -> GatewayResult<Vec<SurgeryCase>> {
        let mut state = self.lock();
        state.begin(GatewayOp::FetchPage)?;
        Ok(state
            .cases
            .values()
            .skip(start as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn push_cases(&self, cases: &[SurgeryCase]) -> GatewayResult<()> {
        let mut state = self.lock();
        state.begin(GatewayOp::PushCases)?;
        for incoming in cases {
            if let Some(existing) = state.cases.get(&incoming.case_id) {
                let unchanged = SurgeryCase {
                    is_synchronized: existing.is_synchronized,
                    last_sync_timestamp: existing.last_sync_timestamp,
                    ..incoming.clone()
                };
                if unchanged == *existing {
                    continue;
                }
            }
            let confirmed = state.confirm(incoming.clone());
            state.next_id = state.next_id.max(confirmed.case_id.saturating_add(1));
            state.cases.insert(confirmed.case_id, confirmed);
        }
        Ok(())
    }

    async fn create_case(&self, draft: &CaseDraft) -> GatewayResult<CaseId> {
        let mut state = self.lock();
        state.begin(GatewayOp::CreateCase)?;
        let case_id = state.next_id;
        state.next_id += 1;
        let case = state.confirm(SurgeryCase::from_draft(case_id, draft));
        state.cases.insert(case_id, case);
        Ok(case_id)
    }

    async fn update_case(&self, case_id: CaseId, update: &CaseUpdate) -> GatewayResult<bool> {
        let mut state = self.lock();
        state.begin(GatewayOp::UpdateCase)?;
        let Some(mut case) = state.cases.get(&case_id).cloned() else {
            return Ok(false);
        };
        update.apply_to(&mut case);
        let case = state.confirm(case);
        state.cases.insert(case_id, case);
        Ok(true)
    }

    async fn delete_case(&self, case_id: CaseId) -> GatewayResult<()> {
        let mut state = self.lock();
        state.begin(GatewayOp::DeleteCase)?;
        state.cases.remove(&case_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::gateway::{fetch_all_cases, GatewayErrorKind};

    fn make_case(case_id: CaseId) -> SurgeryCase {
        SurgeryCase::from_draft(
            case_id,
            &CaseDraft {
                medical_record_number: format!("MRN-{}", case_id),
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_fetch_all_pages() {
        let gateway = InMemoryGateway::with_cases((1..=25).map(make_case));
        let cases = fetch_all_cases(&gateway, 10).await.unwrap();
        assert_eq!(cases.len(), 25);
        assert_eq!(cases[24].case_id, 25);
        // 10 + 10 + 5
        assert_eq!(gateway.call_count(GatewayOp::FetchPage), 3);
    }

    #[tokio::test]
    async fn test_fetch_all_exact_multiple() {
        let gateway = InMemoryGateway::with_cases((1..=20).map(make_case));
        let cases = fetch_all_cases(&gateway, 10).await.unwrap();
        assert_eq!(cases.len(), 20);
        // Third page is empty
        assert_eq!(gateway.call_count(GatewayOp::FetchPage), 3);
    }

    #[tokio::test]
    async fn test_push_confirms_and_is_idempotent() {
        let gateway = InMemoryGateway::new();
        let case = make_case(7);
        gateway.push_cases(&[case.clone()]).await.unwrap();

        let stored = gateway.get(7).unwrap();
        assert!(stored.is_synchronized);
        let first_stamp = stored.last_sync_timestamp;

        gateway.push_cases(&[case]).await.unwrap();
        assert_eq!(gateway.get(7).unwrap().last_sync_timestamp, first_stamp);
    }

    #[tokio::test]
    async fn test_create_update_delete() {
        let gateway = InMemoryGateway::with_cases([make_case(41)]);
        let case_id = gateway
            .create_case(&CaseDraft {
                medical_record_number: "NEW".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(case_id, 42);

        let update = CaseUpdate {
            notes: Some("post-op".into()),
            ..Default::default()
        };
        assert!(gateway.update_case(case_id, &update).await.unwrap());
        assert!(!gateway.update_case(999, &update).await.unwrap());
        assert_eq!(gateway.get(case_id).unwrap().notes, "post-op");

        gateway.delete_case(case_id).await.unwrap();
        gateway.delete_case(case_id).await.unwrap();
        assert_eq!(gateway.get(case_id), None);
    }

    #[tokio::test]
    async fn test_fault_injection_is_one_shot() {
        let gateway = InMemoryGateway::new();
        gateway.fail_next(
            GatewayOp::FetchPage,
            GatewayError::new(GatewayErrorKind::Network, "offline"),
        );
        let err = gateway.fetch_page(0, 10).await.unwrap_err();
        assert_eq!(err.kind, GatewayErrorKind::Network);
        assert!(gateway.fetch_page(0, 10).await.is_ok());
    }
}
