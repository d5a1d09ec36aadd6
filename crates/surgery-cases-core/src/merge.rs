//! Reconciliation of local and remote case snapshots.
//!
//! Shared fields always come from the remote copy; fields that only exist
//! on this device always come from the local copy. There is no per-field
//! versioning, so concurrent edits of the same case from two devices keep
//! whichever version the server stored last.

use std::collections::{HashMap, HashSet};

use crate::models::{CaseId, CaseRecord, SurgeryCase};

/// Merge a local snapshot with a remote snapshot.
///
/// - local only: kept unchanged
/// - remote only: adopted with `pending_sync = false`
/// - both: remote core fields, local-only fields and `pending_sync` from local
///
/// Local records come first in local order, then remote-only records in
/// remote order.
pub fn merge_cases(local: &[CaseRecord], remote: &[SurgeryCase]) -> Vec<CaseRecord> {
    let remote_by_id: HashMap<CaseId, &SurgeryCase> =
        remote.iter().map(|case| (case.case_id, case)).collect();
    let local_ids: HashSet<CaseId> = local.iter().map(CaseRecord::case_id).collect();

    let mut merged: Vec<CaseRecord> = local
        .iter()
        .map(|record| match remote_by_id.get(&record.case_id()) {
            Some(remote_case) => CaseRecord {
                case: (*remote_case).clone(),
                ..record.clone()
            },
            None => record.clone(),
        })
        .collect();

    let mut adopted = HashSet::new();
    for case in remote {
        if local_ids.contains(&case.case_id) || !adopted.insert(case.case_id) {
            continue;
        }
        if let Some(latest) = remote_by_id.get(&case.case_id) {
            merged.push(CaseRecord::from_remote((*latest).clone()));
        }
    }

    merged
}

/// Build the bulk-upsert payload: the full remote snapshot with every
/// pending local record laid over it.
///
/// Pending local edits win for the same id. The result never has fewer
/// entries than the distinct ids in `remote`.
pub fn prepare_cases_for_sync(local: &[CaseRecord], remote: &[SurgeryCase]) -> Vec<SurgeryCase> {
    let mut payload: Vec<SurgeryCase> = Vec::with_capacity(remote.len());
    let mut position: HashMap<CaseId, usize> = HashMap::new();

    for case in remote {
        match position.get(&case.case_id) {
            Some(&index) => payload[index] = case.clone(),
            None => {
                position.insert(case.case_id, payload.len());
                payload.push(case.clone());
            }
        }
    }

    for record in local.iter().filter(|record| record.pending_sync) {
        let wire = record.to_remote();
        match position.get(&wire.case_id) {
            Some(&index) => payload[index] = wire,
            None => {
                position.insert(wire.case_id, payload.len());
                payload.push(wire);
            }
        }
    }

    payload
}

/// Ids of locally deleted records whose remote deletion is still pending.
pub fn pending_tombstones(local: &[CaseRecord]) -> Vec<CaseId> {
    local
        .iter()
        .filter(|record| record.deleted && record.pending_sync)
        .map(CaseRecord::case_id)
        .collect()
}

/// Whether any local record awaits sync.
pub fn has_pending(local: &[CaseRecord]) -> bool {
    local.iter().any(|record| record.pending_sync)
}
