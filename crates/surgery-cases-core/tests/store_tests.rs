//! Local store integration tests against the SQLite backend.

use proptest::prelude::*;
use surgery_cases_core::cases::CasesStore;
use surgery_cases_core::config::CoreConfig;
use surgery_cases_core::db::Database;
use surgery_cases_core::models::{CaseDraft, CaseRecord, TaskItem, TaskKey};
use surgery_cases_core::store::{LocalStore, StorageError};

fn make_draft(mrn: &str) -> CaseDraft {
    let mut draft = CaseDraft {
        medical_record_number: mrn.to_string(),
        arrival_date: 1_710_504_000_000_000_000,
        presenting_complaint: "Cruciate rupture".to_string(),
        ..Default::default()
    };
    draft.patient_demographics.name = "Max".to_string();
    draft.patient_demographics.species = "Canine".to_string();
    draft.tasks_checklist.labs = TaskItem {
        required: true,
        checked: false,
    };
    draft
}

#[test]
fn test_sqlite_round_trip_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cases.db");

    let mut record = CaseRecord::new_local(&make_draft("A-100"));
    record.case.case_id = (1u64 << 60) + 7;
    record.demographics_raw_text = "Max, 4y MN lab".to_string();

    {
        let mut store = LocalStore::new(Database::open(&path).unwrap());
        store.save(&[record.clone()]).unwrap();
    }

    let store = LocalStore::new(Database::open(&path).unwrap());
    let loaded = store.load();
    assert_eq!(loaded, vec![record]);
    assert_eq!(loaded[0].case_id(), (1u64 << 60) + 7);
}

#[test]
fn test_cases_store_persists_edits() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cases.db");

    let added = {
        let cases = CasesStore::new(LocalStore::new(Database::open(&path).unwrap()));
        let added = cases.add_case(&make_draft("A-1")).unwrap();
        cases.toggle_task(added.case_id(), TaskKey::Labs).unwrap();
        cases.add_case(&make_draft("A-2")).unwrap();
        added
    };

    let cases = CasesStore::new(LocalStore::new(Database::open(&path).unwrap()));
    assert_eq!(cases.cases().len(), 2);
    let reloaded = cases.get(added.case_id()).unwrap();
    assert!(reloaded.case.tasks_checklist.labs.checked);
    assert!(reloaded.pending_sync);
}

#[test]
fn test_quota_failure_keeps_last_good_state() {
    let config = CoreConfig {
        max_blob_bytes: Some(4_096),
        ..Default::default()
    };
    let db = Database::open_in_memory().unwrap();
    let cases = CasesStore::new(LocalStore::with_config(db, &config));
    let first = cases.add_case(&make_draft("A-1")).unwrap();

    let mut big = make_draft("A-2");
    big.notes = "x".repeat(8_192);
    let err = cases.add_case(&big).unwrap_err();
    assert!(err.to_string().contains("free space"));
    assert!(matches!(
        err,
        surgery_cases_core::cases::CasesError::Storage(StorageError::Quota { .. })
    ));

    assert_eq!(cases.cases(), vec![first.clone()]);
    assert_eq!(cases.load().unwrap(), vec![first]);
}

#[test]
fn test_clear_removes_blob() {
    let db = Database::open_in_memory().unwrap();
    let mut store = LocalStore::new(db);
    store.save(&[CaseRecord::new_local(&make_draft("A-1"))]).unwrap();
    store.clear();
    assert!(store.load().is_empty());
}

proptest! {
    #[test]
    fn prop_sqlite_round_trip(
        case_id in any::<u64>(),
        arrival_date in any::<i64>(),
        mrn in "[A-Z]{1,3}-[0-9]{1,8}",
        notes in "\\PC{0,40}",
    ) {
        let mut draft = make_draft(&mrn);
        draft.arrival_date = arrival_date;
        draft.notes = notes;
        let mut record = CaseRecord::new_local(&draft);
        record.case.case_id = case_id;

        let mut store = LocalStore::new(Database::open_in_memory().unwrap());
        store.save(&[record.clone()]).unwrap();
        prop_assert_eq!(store.load(), vec![record]);
    }
}
