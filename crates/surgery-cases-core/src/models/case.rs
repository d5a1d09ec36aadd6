//! Surgery case models.
//!
//! [`SurgeryCase`] is the shape the remote gateway knows about.
//! [`CaseRecord`] wraps it with fields that only ever live on this device.

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::checklist::{normalize_checklist, TasksChecklist};
use super::demographics::{normalize_demographics, Demographics};
use super::tagged_int;
use crate::dates::now_nanos;

/// Case identifier. Assigned on the device that creates the case.
pub type CaseId = u64;

/// Multiplier applied to the coarse timestamp when generating ids.
pub const CASE_ID_MULTIPLIER: u64 = 1_000_000;

/// Generate a new case id: unix seconds × 1_000_000 + random offset.
///
/// Ids from the same second collide with probability 1e-6 per pair, and the
/// result stays far above any sequential id a server hands out.
pub fn generate_case_id() -> CaseId {
    let seconds = chrono::Utc::now().timestamp().max(0) as u64;
    let offset = rand::thread_rng().gen_range(0..CASE_ID_MULTIPLIER);
    seconds * CASE_ID_MULTIPLIER + offset
}

/// A case as exchanged with the remote gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SurgeryCase {
    /// Immutable case identifier
    #[serde(with = "tagged_int")]
    pub case_id: CaseId,
    /// Medical record number (required)
    pub medical_record_number: String,
    /// Arrival date, nanoseconds at 12:00 UTC
    #[serde(with = "tagged_int")]
    pub arrival_date: i64,
    /// Presenting complaint
    #[serde(default)]
    pub presenting_complaint: String,
    /// Free-form notes
    #[serde(default)]
    pub notes: String,
    /// Patient demographics
    pub patient_demographics: Demographics,
    /// Follow-up tasks
    pub tasks_checklist: TasksChecklist,
    /// Whether the server has confirmed this version
    #[serde(default)]
    pub is_synchronized: bool,
    /// Last modification/sync time, nanoseconds
    #[serde(with = "tagged_int")]
    pub last_sync_timestamp: i64,
}

/// A case as held on this device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CaseRecord {
    #[serde(flatten)]
    pub case: SurgeryCase,
    /// Local UUID for the record, never sent upstream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_id: Option<String>,
    /// Local edits not yet confirmed by the remote
    #[serde(default)]
    pub pending_sync: bool,
    /// Text pasted into the demographics quick-add box
    #[serde(default)]
    pub demographics_raw_text: String,
    /// Object URL of a captured label photo
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_image_url: Option<String>,
    /// Deleted locally, remote deletion pending
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
}

/// Form contents for creating or editing a case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseDraft {
    pub medical_record_number: String,
    pub arrival_date: i64,
    pub presenting_complaint: String,
    pub notes: String,
    pub patient_demographics: Demographics,
    pub tasks_checklist: TasksChecklist,
    pub demographics_raw_text: String,
    pub captured_image_url: Option<String>,
}

/// Partial update sent to the gateway's `update_case`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseUpdate {
    pub medical_record_number: Option<String>,
    pub arrival_date: Option<i64>,
    pub presenting_complaint: Option<String>,
    pub notes: Option<String>,
    pub patient_demographics: Option<Demographics>,
    pub tasks_checklist: Option<TasksChecklist>,
}

impl CaseUpdate {
    /// Apply the present fields to a case. `case_id` is never touched.
    pub fn apply_to(&self, case: &mut SurgeryCase) {
        if let Some(mrn) = &self.medical_record_number {
            case.medical_record_number = mrn.clone();
        }
        if let Some(arrival_date) = self.arrival_date {
            case.arrival_date = arrival_date;
        }
        if let Some(complaint) = &self.presenting_complaint {
            case.presenting_complaint = complaint.clone();
        }
        if let Some(notes) = &self.notes {
            case.notes = notes.clone();
        }
        if let Some(demographics) = &self.patient_demographics {
            case.patient_demographics = demographics.normalized();
        }
        if let Some(checklist) = self.tasks_checklist {
            case.tasks_checklist = checklist;
        }
    }

    /// Whether the update changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A stored record that cannot be turned into a case.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedRecord {
    #[error("record is not an object")]
    NotAnObject,

    #[error("missing or invalid field: {0}")]
    InvalidField(&'static str),
}

impl SurgeryCase {
    /// Build a case from a draft with the given id.
    pub fn from_draft(case_id: CaseId, draft: &CaseDraft) -> Self {
        Self {
            case_id,
            medical_record_number: draft.medical_record_number.trim().to_string(),
            arrival_date: draft.arrival_date,
            presenting_complaint: draft.presenting_complaint.clone(),
            notes: draft.notes.clone(),
            patient_demographics: draft.patient_demographics.normalized(),
            tasks_checklist: draft.tasks_checklist,
            is_synchronized: false,
            last_sync_timestamp: now_nanos(),
        }
    }
}

impl CaseRecord {
    /// Create a new, not-yet-synced case from a form submission.
    pub fn new_local(draft: &CaseDraft) -> Self {
        let mut case = SurgeryCase::from_draft(generate_case_id(), draft);
        case.tasks_checklist = TasksChecklist::for_new_case(&draft.tasks_checklist);
        Self {
            case,
            local_id: Some(uuid::Uuid::new_v4().to_string()),
            pending_sync: true,
            demographics_raw_text: draft.demographics_raw_text.clone(),
            captured_image_url: draft.captured_image_url.clone().filter(|u| !u.is_empty()),
            deleted: false,
        }
    }

    /// Materialize a record from a remote case.
    pub fn from_remote(case: SurgeryCase) -> Self {
        Self {
            case,
            local_id: None,
            pending_sync: false,
            demographics_raw_text: String::new(),
            captured_image_url: None,
            deleted: false,
        }
    }

    pub fn case_id(&self) -> CaseId {
        self.case.case_id
    }

    /// Replace every mutable field from a form submission and mark pending.
    ///
    /// `case_id` and `local_id` are preserved.
    pub fn apply_draft(&mut self, draft: &CaseDraft) {
        let case_id = self.case.case_id;
        self.case = SurgeryCase::from_draft(case_id, draft);
        self.demographics_raw_text = draft.demographics_raw_text.clone();
        self.captured_image_url = draft.captured_image_url.clone().filter(|u| !u.is_empty());
        self.pending_sync = true;
    }

    /// Mark as deleted; the tombstone is kept until the remote confirms.
    pub fn mark_deleted(&mut self) {
        self.deleted = true;
        self.pending_sync = true;
        self.case.last_sync_timestamp = now_nanos();
    }

    /// Strip local-only fields, yielding the wire shape.
    pub fn to_remote(&self) -> SurgeryCase {
        self.case.clone()
    }

    /// Re-normalize demographics and defaults. Idempotent.
    pub fn normalized(mut self) -> Self {
        self.case.patient_demographics = self.case.patient_demographics.normalized();
        self.case.medical_record_number = self.case.medical_record_number.trim().to_string();
        if self.captured_image_url.as_deref() == Some("") {
            self.captured_image_url = None;
        }
        self
    }

    /// Decode a stored record of any historical shape.
    ///
    /// `caseId`, `medicalRecordNumber` and `arrivalDate` are required; every
    /// other field is defaulted and normalized.
    pub fn from_stored(value: &Value) -> Result<Self, MalformedRecord> {
        let object = value.as_object().ok_or(MalformedRecord::NotAnObject)?;

        let case_id = object
            .get("caseId")
            .and_then(tagged_int::from_value::<u64>)
            .ok_or(MalformedRecord::InvalidField("caseId"))?;
        let medical_record_number = object
            .get("medicalRecordNumber")
            .and_then(Value::as_str)
            .ok_or(MalformedRecord::InvalidField("medicalRecordNumber"))?
            .trim()
            .to_string();
        let arrival_date = object
            .get("arrivalDate")
            .and_then(tagged_int::from_value::<i64>)
            .ok_or(MalformedRecord::InvalidField("arrivalDate"))?;

        let text = |name: &str| -> String {
            object
                .get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let flag = |name: &str| object.get(name).and_then(Value::as_bool).unwrap_or(false);

        let case = SurgeryCase {
            case_id,
            medical_record_number,
            arrival_date,
            presenting_complaint: text("presentingComplaint"),
            notes: text("notes"),
            patient_demographics: normalize_demographics(
                object.get("patientDemographics").unwrap_or(&Value::Null),
            ),
            tasks_checklist: normalize_checklist(
                object.get("tasksChecklist").unwrap_or(&Value::Null),
            ),
            is_synchronized: flag("isSynchronized"),
            last_sync_timestamp: object
                .get("lastSyncTimestamp")
                .and_then(tagged_int::from_value::<i64>)
                .unwrap_or(0),
        };

        Ok(Self {
            case,
            local_id: object
                .get("localId")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            pending_sync: flag("pendingSync"),
            demographics_raw_text: text("demographicsRawText"),
            captured_image_url: object
                .get("capturedImageUrl")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            deleted: flag("deleted"),
        })
    }
}

/// Display sort field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    ArrivalDate,
    MedicalRecordNumber,
}

/// Display sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Sort cases for display. Ties fall back to case id.
pub fn sort_cases(cases: &mut [CaseRecord], field: SortField, direction: SortDirection) {
    cases.sort_by(|a, b| {
        let ordering = match field {
            SortField::ArrivalDate => a.case.arrival_date.cmp(&b.case.arrival_date),
            SortField::MedicalRecordNumber => a
                .case
                .medical_record_number
                .to_lowercase()
                .cmp(&b.case.medical_record_number.to_lowercase()),
        }
        .then_with(|| a.case_id().cmp(&b.case_id()));

        match direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskItem;
    use serde_json::json;

    fn make_draft(mrn: &str) -> CaseDraft {
        let mut draft = CaseDraft {
            medical_record_number: format!(" {} ", mrn),
            arrival_date: 1_700_000_000_000_000_000,
            ..Default::default()
        };
        draft.patient_demographics.name = "Max ".into();
        draft.tasks_checklist.labs = TaskItem { required: true, checked: true };
        draft
    }

    #[test]
    fn test_generate_case_id_range() {
        let id = generate_case_id();
        let seconds = chrono::Utc::now().timestamp() as u64;
        assert!(id / CASE_ID_MULTIPLIER <= seconds);
        assert!(id / CASE_ID_MULTIPLIER + 5 >= seconds);
    }

    #[test]
    fn test_new_local_case() {
        let record = CaseRecord::new_local(&make_draft("A-100"));
        assert!(record.pending_sync);
        assert!(!record.case.is_synchronized);
        assert_eq!(record.case.medical_record_number, "A-100");
        assert_eq!(record.case.patient_demographics.name, "Max");
        // New cases start unchecked
        assert_eq!(record.case.tasks_checklist.labs, TaskItem { required: true, checked: false });
        assert_eq!(record.local_id.as_ref().map(|s| s.len()), Some(36));
    }

    #[test]
    fn test_apply_draft_preserves_ids() {
        let mut record = CaseRecord::new_local(&make_draft("A-100"));
        record.pending_sync = false;
        let case_id = record.case_id();
        let local_id = record.local_id.clone();

        let mut edit = make_draft("A-200");
        edit.notes = "Recheck in 2 weeks".into();
        record.apply_draft(&edit);

        assert_eq!(record.case_id(), case_id);
        assert_eq!(record.local_id, local_id);
        assert_eq!(record.case.medical_record_number, "A-200");
        assert_eq!(record.case.notes, "Recheck in 2 weeks");
        assert!(record.pending_sync);
        // Edits keep the submitted checked state
        assert!(record.case.tasks_checklist.labs.checked);
    }

    #[test]
    fn test_case_update_apply() {
        let mut case = CaseRecord::new_local(&make_draft("A-1")).case;
        let update = CaseUpdate {
            notes: Some("updated".into()),
            ..Default::default()
        };
        assert!(!update.is_empty());
        update.apply_to(&mut case);
        assert_eq!(case.notes, "updated");
        assert_eq!(case.medical_record_number, "A-1");
        assert!(CaseUpdate::default().is_empty());
    }

    #[test]
    fn test_from_stored_legacy_record() {
        let stored = json!({
            "caseId": "9007199254740993n",
            "medicalRecordNumber": "B-7",
            "arrivalDate": "1700000000000000000n",
            "patientDemographics": { "name": "Luna", "species": "Feline", "breed": "DSH", "age": "3n" },
            "tasksChecklist": { "labs": true },
            "isSynchronized": true,
            "lastSyncTimestamp": "1700000000000000001n",
        });

        let record = CaseRecord::from_stored(&stored).unwrap();
        assert_eq!(record.case_id(), 9_007_199_254_740_993);
        assert_eq!(record.case.presenting_complaint, "");
        assert_eq!(record.case.patient_demographics.name, "Luna");
        assert!(record.case.tasks_checklist.labs.checked);
        assert!(!record.pending_sync);
        assert_eq!(record.captured_image_url, None);
        assert_eq!(record.case.last_sync_timestamp, 1_700_000_000_000_000_001);
    }

    #[test]
    fn test_from_stored_rejects_missing_id() {
        let stored = json!({ "medicalRecordNumber": "B-7", "arrivalDate": "1n" });
        assert_eq!(
            CaseRecord::from_stored(&stored),
            Err(MalformedRecord::InvalidField("caseId"))
        );
        assert_eq!(CaseRecord::from_stored(&json!([1])), Err(MalformedRecord::NotAnObject));
    }

    #[test]
    fn test_serialized_round_trip_through_from_stored() {
        let mut record = CaseRecord::new_local(&make_draft("C-3"));
        record.captured_image_url = Some("blob:abc".into());
        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("caseId").unwrap().as_str().unwrap().ends_with('n'));
        assert_eq!(CaseRecord::from_stored(&value).unwrap(), record);
    }

    #[test]
    fn test_sort_cases() {
        let mut a = CaseRecord::new_local(&make_draft("b-2"));
        a.case.arrival_date = 10;
        let mut b = CaseRecord::new_local(&make_draft("A-1"));
        b.case.arrival_date = 20;
        let mut cases = vec![a.clone(), b.clone()];

        sort_cases(&mut cases, SortField::ArrivalDate, SortDirection::Descending);
        assert_eq!(cases[0].case_id(), b.case_id());

        sort_cases(&mut cases, SortField::MedicalRecordNumber, SortDirection::Descending);
        assert_eq!(cases[0].case_id(), a.case_id());
    }
}
