//! Cases store: the local store plus the in-memory view the UI reads.
//!
//! Every mutation is applied to a copy of the view, saved and verified, and
//! only then published. A failed save leaves both the stored blob and the
//! view untouched.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard};

use thiserror::Error;

use crate::export::{rows_to_cases, CsvRow};
use crate::models::{generate_case_id, CaseDraft, CaseId, CaseRecord, TaskKey};
use crate::store::{LocalStore, StorageBackend, StorageError, StorageResult};

/// Cases store errors.
#[derive(Error, Debug)]
pub enum CasesError {
    #[error("Case not found: {0}")]
    NotFound(CaseId),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

impl<T> From<PoisonError<T>> for CasesError {
    fn from(e: PoisonError<T>) -> Self {
        CasesError::LockPoisoned(e.to_string())
    }
}

pub type CasesResult<T> = Result<T, CasesError>;

/// Owner of the persisted case collection for one session.
///
/// Created at startup, cleared on logout.
pub struct CasesStore<B: StorageBackend> {
    store: Mutex<LocalStore<B>>,
    view: RwLock<Vec<CaseRecord>>,
    /// Bumped by every `clear`
    generation: AtomicU64,
}

impl<B: StorageBackend> CasesStore<B> {
    /// Wrap a local store and load its contents.
    pub fn new(store: LocalStore<B>) -> Self {
        let records = store.load();
        log::info!("Loaded {} local cases", records.len());
        Self {
            store: Mutex::new(store),
            view: RwLock::new(records),
            generation: AtomicU64::new(0),
        }
    }

    fn read_view(&self) -> RwLockReadGuard<'_, Vec<CaseRecord>> {
        self.view.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, records: Vec<CaseRecord>) {
        *self.view.write().unwrap_or_else(PoisonError::into_inner) = records;
    }

    /// Re-read the stored collection into the view. Returns visible cases.
    pub fn load(&self) -> CasesResult<Vec<CaseRecord>> {
        let store = self.store.lock()?;
        let records = store.load();
        self.publish(records);
        drop(store);
        Ok(self.cases())
    }

    /// Cases to display: everything not deleted.
    pub fn cases(&self) -> Vec<CaseRecord> {
        self.read_view()
            .iter()
            .filter(|record| !record.deleted)
            .cloned()
            .collect()
    }

    /// Every record, tombstones included.
    pub fn all_records(&self) -> Vec<CaseRecord> {
        self.read_view().clone()
    }

    /// A visible case by id.
    pub fn get(&self, case_id: CaseId) -> Option<CaseRecord> {
        self.read_view()
            .iter()
            .find(|record| record.case_id() == case_id && !record.deleted)
            .cloned()
    }

    /// Whether any record awaits sync.
    pub fn has_pending(&self) -> bool {
        crate::merge::has_pending(&self.read_view())
    }

    /// Apply `f` to a copy of the collection, persist it, then publish it.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut Vec<CaseRecord>) -> CasesResult<T>,
    ) -> CasesResult<T> {
        let mut store = self.store.lock()?;
        let mut records = self.read_view().clone();
        let output = f(&mut records)?;
        store.save(&records)?;
        self.publish(records);
        Ok(output)
    }

    /// Create a new pending case.
    pub fn add_case(&self, draft: &CaseDraft) -> CasesResult<CaseRecord> {
        self.mutate(|records| {
            let record = CaseRecord::new_local(draft);
            records.push(record.clone());
            log::debug!("Added case {}", record.case_id());
            Ok(record)
        })
    }

    /// Replace a case's fields from a form submission.
    pub fn update_case(&self, case_id: CaseId, draft: &CaseDraft) -> CasesResult<CaseRecord> {
        self.mutate(|records| {
            let record = find_visible(records, case_id)?;
            record.apply_draft(draft);
            Ok(record.clone())
        })
    }

    /// Flip a task's checked state.
    pub fn toggle_task(&self, case_id: CaseId, key: TaskKey) -> CasesResult<CaseRecord> {
        self.mutate(|records| {
            let record = find_visible(records, case_id)?;
            record.case.tasks_checklist.toggle_checked(key);
            record.case.is_synchronized = false;
            record.case.last_sync_timestamp = crate::dates::now_nanos();
            record.pending_sync = true;
            Ok(record.clone())
        })
    }

    /// Delete a case. The tombstone stays until a sync confirms it.
    pub fn delete_case(&self, case_id: CaseId) -> CasesResult<()> {
        self.mutate(|records| {
            find_visible(records, case_id)?.mark_deleted();
            log::debug!("Deleted case {}", case_id);
            Ok(())
        })
    }

    /// Add imported cases as pending. A record whose id is already present
    /// is skipped, never replaced. Returns the number of records added.
    pub fn import_cases(&self, imported: Vec<CaseRecord>) -> CasesResult<usize> {
        self.mutate(|records| {
            let mut taken: HashSet<CaseId> = records.iter().map(CaseRecord::case_id).collect();
            let mut count = 0;
            for mut record in imported {
                if !taken.insert(record.case_id()) {
                    log::warn!("Skipping imported case {}: id already in use", record.case_id());
                    continue;
                }
                record.pending_sync = true;
                records.push(record);
                count += 1;
            }
            log::info!("Imported {} cases", count);
            Ok(count)
        })
    }

    /// Add parsed CSV rows as new pending cases. Ids count up from one
    /// freshly generated base and skip any id already in the collection.
    pub fn import_rows(&self, rows: &[CsvRow]) -> CasesResult<usize> {
        self.mutate(|records| {
            let taken: HashSet<CaseId> = records.iter().map(CaseRecord::case_id).collect();
            let imported = rows_to_cases(rows, generate_case_id(), &taken);
            let count = imported.len();
            records.extend(imported);
            log::info!("Imported {} rows", count);
            Ok(count)
        })
    }

    /// Remove all local data. Used on logout.
    pub fn clear(&self) -> CasesResult<()> {
        let mut store = self.store.lock()?;
        self.generation.fetch_add(1, Ordering::SeqCst);
        store.clear();
        self.publish(Vec::new());
        Ok(())
    }

    /// Every record plus the clear generation they belong to, read together.
    pub(crate) fn sync_snapshot(&self) -> (u64, Vec<CaseRecord>) {
        let _store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        (self.generation.load(Ordering::SeqCst), self.all_records())
    }

    /// Persist the result of a sync round trip.
    ///
    /// Records that changed locally since `started_from` was taken keep their
    /// current version and stay pending. Returns `None` without writing when
    /// the store was cleared after `generation` was read.
    pub(crate) fn persist_sync_result(
        &self,
        generation: u64,
        started_from: &[CaseRecord],
        merged: Vec<CaseRecord>,
    ) -> StorageResult<Option<Vec<CaseRecord>>> {
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        if self.generation.load(Ordering::SeqCst) != generation {
            log::warn!("Discarding sync result: local data was cleared during the round trip");
            return Ok(None);
        }
        let current = self.read_view().clone();
        let records = overlay_local_edits(started_from, &current, merged);
        store.save(&records)?;
        self.publish(records.clone());
        Ok(Some(records))
    }
}

fn find_visible(records: &mut [CaseRecord], case_id: CaseId) -> CasesResult<&mut CaseRecord> {
    records
        .iter_mut()
        .find(|record| record.case_id() == case_id && !record.deleted)
        .ok_or(CasesError::NotFound(case_id))
}

/// Lay records edited since `started_from` over `merged`.
fn overlay_local_edits(
    started_from: &[CaseRecord],
    current: &[CaseRecord],
    mut merged: Vec<CaseRecord>,
) -> Vec<CaseRecord> {
    let before: HashMap<CaseId, &CaseRecord> =
        started_from.iter().map(|r| (r.case_id(), r)).collect();

    for record in current {
        if before.get(&record.case_id()) == Some(&record) {
            continue;
        }
        log::debug!("Keeping local edit of case {} made during sync", record.case_id());
        match merged.iter_mut().find(|r| r.case_id() == record.case_id()) {
            Some(existing) => *existing = record.clone(),
            None => merged.push(record.clone()),
        }
    }
    merged
}
