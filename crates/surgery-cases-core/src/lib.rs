//! Surgery Cases Core Library
//!
//! Local-first tracking of veterinary surgery cases with opportunistic sync
//! against a remote case collection.
//!
//! # Architecture
//!
//! ```text
//!   UI edits ──► CasesStore ──► LocalStore (checksummed blob, verify-after-write)
//!                    ▲
//!                    │ persist (only after a full round trip)
//!                    │
//!             SyncOrchestrator
//!        fetch ─► push superset ─► refetch ─► merge ─► persist
//!                    │
//!                    ▼
//!               CaseGateway (remote, async)
//! ```
//!
//! # Core Principle
//!
//! **A failed sync never touches local data.** The local store is written once,
//! at the end of a successful round trip, or not at all.
//!
//! # Modules
//!
//! - [`models`]: Case, demographics and checklist types with normalization
//! - [`store`]: Local store over a pluggable keyed-blob backend
//! - [`db`]: SQLite backend
//! - [`merge`]: Local/remote reconciliation
//! - [`sync`]: Gateway trait, error taxonomy and round-trip orchestrator
//! - [`cases`]: Injectable case store owning the in-memory view
//! - [`export`]: CSV export and import
//! - [`prefill`], [`dates`], [`config`]

pub mod cases;
pub mod config;
pub mod dates;
pub mod db;
pub mod export;
pub mod merge;
pub mod models;
pub mod prefill;
pub mod store;
pub mod sync;

// Re-export commonly used types
pub use cases::{CasesError, CasesStore};
pub use config::CoreConfig;
pub use db::Database;
pub use merge::{merge_cases, prepare_cases_for_sync};
pub use models::{
    CaseDraft, CaseId, CaseRecord, CaseUpdate, Demographics, SortDirection, SortField,
    SurgeryCase, TaskItem, TaskKey, TasksChecklist,
};
pub use store::{LocalStore, MemoryBackend, StorageBackend, StorageError};
pub use sync::{CaseGateway, GatewayError, SyncError, SyncOrchestrator, SyncReport};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::Arc;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum SurgeryCasesError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<db::DbError> for SurgeryCasesError {
    fn from(e: db::DbError) -> Self {
        SurgeryCasesError::StorageError(e.to_string())
    }
}

impl From<CasesError> for SurgeryCasesError {
    fn from(e: CasesError) -> Self {
        match e {
            CasesError::NotFound(case_id) => SurgeryCasesError::NotFound(case_id.to_string()),
            other => SurgeryCasesError::StorageError(other.to_string()),
        }
    }
}

impl From<export::CsvError> for SurgeryCasesError {
    fn from(e: export::CsvError) -> Self {
        SurgeryCasesError::StorageError(e.to_string())
    }
}

impl From<config::ConfigError> for SurgeryCasesError {
    fn from(e: config::ConfigError) -> Self {
        SurgeryCasesError::InvalidInput(e.to_string())
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a case store backed by the database at the given path.
#[uniffi::export]
pub fn open_case_store(path: String) -> Result<Arc<SurgeryCasesCore>, SurgeryCasesError> {
    let db = Database::open(&path)?;
    Ok(Arc::new(SurgeryCasesCore::new(LocalStore::new(db))))
}

/// Create an in-memory case store (for testing).
#[uniffi::export]
pub fn open_case_store_in_memory() -> Result<Arc<SurgeryCasesCore>, SurgeryCasesError> {
    let db = Database::open_in_memory()?;
    Ok(Arc::new(SurgeryCasesCore::new(LocalStore::new(db))))
}

/// Open a case store from a JSON [`CoreConfig`].
#[uniffi::export]
pub fn open_case_store_with_config(
    config_json: String,
) -> Result<Arc<SurgeryCasesCore>, SurgeryCasesError> {
    let config = CoreConfig::from_json_str(&config_json)?;
    let db = match &config.database_path {
        Some(path) => Database::open(path)?,
        None => Database::open_in_memory()?,
    };
    Ok(Arc::new(SurgeryCasesCore::new(LocalStore::with_config(
        db, &config,
    ))))
}

/// Display label of a task.
#[uniffi::export]
pub fn task_label(key: FfiTaskKey) -> String {
    TaskKey::from(key).label().to_string()
}

/// Pull demographics out of pasted patient text.
#[uniffi::export]
pub fn extract_demographics(text: String) -> FfiExtractedDemographics {
    surgery_cases_extract::extract_demographics(&text).into()
}

/// Validate a `YYYY-MM-DD` date (years 1900-2100).
#[uniffi::export]
pub fn is_valid_date_only(text: String) -> bool {
    dates::validate_date_only(&text).is_some()
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe case store wrapper for FFI.
#[derive(uniffi::Object)]
pub struct SurgeryCasesCore {
    cases: Arc<CasesStore<Database>>,
}

impl SurgeryCasesCore {
    fn new(store: LocalStore<Database>) -> Self {
        Self {
            cases: Arc::new(CasesStore::new(store)),
        }
    }

    /// Shared handle for a [`SyncOrchestrator`].
    ///
    /// Sync is driven from Rust: the host embeds a Rust [`CaseGateway`] and
    /// builds the orchestrator over this store.
    pub fn cases_store(&self) -> Arc<CasesStore<Database>> {
        Arc::clone(&self.cases)
    }
}

#[uniffi::export]
impl SurgeryCasesCore {
    // =========================================================================
    // Case Operations
    // =========================================================================

    /// Visible cases, sorted.
    pub fn list_cases(&self, field: FfiSortField, direction: FfiSortDirection) -> Vec<FfiCaseRecord> {
        let mut cases = self.cases.cases();
        models::sort_cases(&mut cases, field.into(), direction.into());
        cases.into_iter().map(Into::into).collect()
    }

    /// Get a case by ID.
    pub fn get_case(&self, case_id: u64) -> Option<FfiCaseRecord> {
        self.cases.get(case_id).map(Into::into)
    }

    /// Create a new case, pending sync.
    pub fn add_case(&self, draft: FfiCaseDraft) -> Result<FfiCaseRecord, SurgeryCasesError> {
        let draft: CaseDraft = draft.try_into()?;
        Ok(self.cases.add_case(&draft)?.into())
    }

    /// Replace a case's fields.
    pub fn update_case(
        &self,
        case_id: u64,
        draft: FfiCaseDraft,
    ) -> Result<FfiCaseRecord, SurgeryCasesError> {
        let draft: CaseDraft = draft.try_into()?;
        Ok(self.cases.update_case(case_id, &draft)?.into())
    }

    /// Toggle a task's checked state.
    pub fn toggle_task(
        &self,
        case_id: u64,
        key: FfiTaskKey,
    ) -> Result<FfiCaseRecord, SurgeryCasesError> {
        Ok(self.cases.toggle_task(case_id, key.into())?.into())
    }

    /// Delete a case.
    pub fn delete_case(&self, case_id: u64) -> Result<(), SurgeryCasesError> {
        Ok(self.cases.delete_case(case_id)?)
    }

    /// Check if any case awaits sync.
    pub fn has_pending_changes(&self) -> bool {
        self.cases.has_pending()
    }

    /// Remove all local data (logout).
    pub fn clear(&self) -> Result<(), SurgeryCasesError> {
        Ok(self.cases.clear()?)
    }

    // =========================================================================
    // Prefill
    // =========================================================================

    /// Demographics from the latest case with this medical record number.
    pub fn prefill_for_mrn(&self, mrn: String) -> Option<FfiPrefill> {
        let cases = self.cases.cases();
        prefill::find_latest_matching_case(&mrn, &cases)
            .map(prefill::PrefillData::from_case)
            .map(Into::into)
    }

    // =========================================================================
    // CSV Operations
    // =========================================================================

    /// Export visible cases as CSV.
    pub fn export_csv(&self) -> Result<String, SurgeryCasesError> {
        Ok(export::cases_to_csv(&self.cases.cases())?)
    }

    /// Import cases from CSV as new pending cases.
    ///
    /// All or nothing: when any row has an error nothing is imported and the
    /// errors are returned in the summary.
    pub fn import_csv(&self, text: String) -> Result<FfiImportSummary, SurgeryCasesError> {
        let parsed = export::parse_csv(&text);
        let imported = if !parsed.errors.is_empty() {
            log::warn!("CSV import refused: {} invalid rows", parsed.errors.len());
            0
        } else if parsed.rows.is_empty() {
            0
        } else {
            self.cases.import_rows(&parsed.rows)?
        };

        Ok(FfiImportSummary {
            imported: imported as u32,
            errors: parsed
                .errors
                .into_iter()
                .map(|e| format!("Row {} ({}): {}", e.row, e.field, e.message))
                .collect(),
            warnings: parsed.warnings,
        })
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe task key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiTaskKey {
    DischargeNotes,
    PdvmNotified,
    Labs,
    Histo,
    SurgeryReport,
    Imaging,
    Culture,
}

impl From<FfiTaskKey> for TaskKey {
    fn from(key: FfiTaskKey) -> Self {
        match key {
            FfiTaskKey::DischargeNotes => TaskKey::DischargeNotes,
            FfiTaskKey::PdvmNotified => TaskKey::PdvmNotified,
            FfiTaskKey::Labs => TaskKey::Labs,
            FfiTaskKey::Histo => TaskKey::Histo,
            FfiTaskKey::SurgeryReport => TaskKey::SurgeryReport,
            FfiTaskKey::Imaging => TaskKey::Imaging,
            FfiTaskKey::Culture => TaskKey::Culture,
        }
    }
}

impl From<TaskKey> for FfiTaskKey {
    fn from(key: TaskKey) -> Self {
        match key {
            TaskKey::DischargeNotes => FfiTaskKey::DischargeNotes,
            TaskKey::PdvmNotified => FfiTaskKey::PdvmNotified,
            TaskKey::Labs => FfiTaskKey::Labs,
            TaskKey::Histo => FfiTaskKey::Histo,
            TaskKey::SurgeryReport => FfiTaskKey::SurgeryReport,
            TaskKey::Imaging => FfiTaskKey::Imaging,
            TaskKey::Culture => FfiTaskKey::Culture,
        }
    }
}

#[derive(Debug, Clone, Copy, uniffi::Enum)]
pub enum FfiSortField {
    ArrivalDate,
    MedicalRecordNumber,
}

impl From<FfiSortField> for SortField {
    fn from(field: FfiSortField) -> Self {
        match field {
            FfiSortField::ArrivalDate => SortField::ArrivalDate,
            FfiSortField::MedicalRecordNumber => SortField::MedicalRecordNumber,
        }
    }
}

#[derive(Debug, Clone, Copy, uniffi::Enum)]
pub enum FfiSortDirection {
    Ascending,
    Descending,
}

impl From<FfiSortDirection> for SortDirection {
    fn from(direction: FfiSortDirection) -> Self {
        match direction {
            FfiSortDirection::Ascending => SortDirection::Ascending,
            FfiSortDirection::Descending => SortDirection::Descending,
        }
    }
}

/// FFI-safe checklist entry.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct FfiTaskEntry {
    pub key: FfiTaskKey,
    pub required: bool,
    pub checked: bool,
}

fn checklist_to_entries(checklist: &TasksChecklist) -> Vec<FfiTaskEntry> {
    TaskKey::ALL
        .into_iter()
        .map(|key| {
            let item = checklist.get(key);
            FfiTaskEntry {
                key: key.into(),
                required: item.required,
                checked: item.checked,
            }
        })
        .collect()
}

fn entries_to_checklist(entries: &[FfiTaskEntry]) -> TasksChecklist {
    let mut checklist = TasksChecklist::default();
    for entry in entries {
        *checklist.get_mut(entry.key.into()) = TaskItem {
            required: entry.required,
            checked: entry.checked,
        };
    }
    checklist
}

/// FFI-safe patient demographics.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct FfiDemographics {
    pub name: String,
    pub owner_last_name: String,
    pub species: String,
    pub breed: String,
    pub sex: String,
    pub date_of_birth: String,
}

impl From<Demographics> for FfiDemographics {
    fn from(d: Demographics) -> Self {
        Self {
            name: d.name,
            owner_last_name: d.owner_last_name,
            species: d.species,
            breed: d.breed,
            sex: d.sex,
            date_of_birth: d.date_of_birth,
        }
    }
}

impl From<FfiDemographics> for Demographics {
    fn from(d: FfiDemographics) -> Self {
        Demographics {
            name: d.name,
            owner_last_name: d.owner_last_name,
            species: d.species,
            breed: d.breed,
            sex: d.sex,
            date_of_birth: d.date_of_birth,
        }
    }
}

/// FFI-safe case record.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCaseRecord {
    pub case_id: u64,
    pub local_id: Option<String>,
    pub medical_record_number: String,
    pub arrival_date: i64,
    /// Arrival date as `YYYY-MM-DD`
    pub arrival_date_text: String,
    pub presenting_complaint: String,
    pub notes: String,
    pub demographics: FfiDemographics,
    pub tasks: Vec<FfiTaskEntry>,
    pub is_synchronized: bool,
    pub pending_sync: bool,
    pub last_sync_timestamp: i64,
    pub demographics_raw_text: String,
    pub captured_image_url: Option<String>,
}

impl From<CaseRecord> for FfiCaseRecord {
    fn from(record: CaseRecord) -> Self {
        let case = record.case;
        Self {
            case_id: case.case_id,
            local_id: record.local_id,
            medical_record_number: case.medical_record_number,
            arrival_date: case.arrival_date,
            arrival_date_text: dates::nanos_to_date_only(case.arrival_date),
            presenting_complaint: case.presenting_complaint,
            notes: case.notes,
            demographics: case.patient_demographics.into(),
            tasks: checklist_to_entries(&case.tasks_checklist),
            is_synchronized: case.is_synchronized,
            pending_sync: record.pending_sync,
            last_sync_timestamp: case.last_sync_timestamp,
            demographics_raw_text: record.demographics_raw_text,
            captured_image_url: record.captured_image_url,
        }
    }
}

/// FFI-safe case form.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCaseDraft {
    pub medical_record_number: String,
    /// `YYYY-MM-DD`
    pub arrival_date: String,
    pub presenting_complaint: String,
    pub notes: String,
    pub demographics: FfiDemographics,
    pub tasks: Vec<FfiTaskEntry>,
    pub demographics_raw_text: String,
    pub captured_image_url: Option<String>,
}

impl TryFrom<FfiCaseDraft> for CaseDraft {
    type Error = SurgeryCasesError;

    fn try_from(draft: FfiCaseDraft) -> Result<Self, Self::Error> {
        if draft.medical_record_number.trim().is_empty() {
            return Err(SurgeryCasesError::InvalidInput(
                "Medical record number is required".into(),
            ));
        }
        if dates::validate_date_only(&draft.arrival_date).is_none() {
            return Err(SurgeryCasesError::InvalidInput(format!(
                "Invalid arrival date: {}",
                draft.arrival_date
            )));
        }

        Ok(CaseDraft {
            medical_record_number: draft.medical_record_number,
            arrival_date: dates::date_only_to_nanos(&draft.arrival_date),
            presenting_complaint: draft.presenting_complaint,
            notes: draft.notes,
            patient_demographics: draft.demographics.into(),
            tasks_checklist: entries_to_checklist(&draft.tasks),
            demographics_raw_text: draft.demographics_raw_text,
            captured_image_url: draft.captured_image_url,
        })
    }
}

/// FFI-safe prefill data.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPrefill {
    pub pet_name: String,
    pub owner_last_name: String,
    pub species: String,
    pub breed: String,
    pub sex: String,
    pub date_of_birth: String,
}

impl From<prefill::PrefillData> for FfiPrefill {
    fn from(p: prefill::PrefillData) -> Self {
        Self {
            pet_name: p.pet_name,
            owner_last_name: p.owner_last_name,
            species: p.species,
            breed: p.breed,
            sex: p.sex,
            date_of_birth: p.date_of_birth,
        }
    }
}

/// Demographics pulled from pasted text. Empty strings mean not found.
#[derive(Debug, Clone, Default, PartialEq, Eq, uniffi::Record)]
pub struct FfiExtractedDemographics {
    pub medical_record_number: String,
    pub pet_name: String,
    pub owner_last_name: String,
    pub species: String,
    pub breed: String,
    pub sex: String,
    pub date_of_birth: String,
}

impl From<surgery_cases_extract::ExtractedDemographics> for FfiExtractedDemographics {
    fn from(e: surgery_cases_extract::ExtractedDemographics) -> Self {
        Self {
            medical_record_number: e.medical_record_number.unwrap_or_default(),
            pet_name: e.pet_name.unwrap_or_default(),
            owner_last_name: e.owner_last_name.unwrap_or_default(),
            species: e.species.map(|s| s.as_str().to_string()).unwrap_or_default(),
            breed: e.breed.unwrap_or_default(),
            sex: e.sex.map(|s| s.as_str().to_string()).unwrap_or_default(),
            date_of_birth: e.date_of_birth.unwrap_or_default(),
        }
    }
}

/// Result of a CSV import.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiImportSummary {
    pub imported: u32,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_draft(mrn: &str) -> FfiCaseDraft {
        FfiCaseDraft {
            medical_record_number: mrn.into(),
            arrival_date: "2024-05-01".into(),
            presenting_complaint: "TPLO".into(),
            notes: String::new(),
            demographics: FfiDemographics {
                name: "Max".into(),
                owner_last_name: "Smith".into(),
                species: String::new(),
                breed: "Labrador".into(),
                sex: String::new(),
                date_of_birth: String::new(),
            },
            tasks: vec![FfiTaskEntry {
                key: FfiTaskKey::Labs,
                required: true,
                checked: true,
            }],
            demographics_raw_text: String::new(),
            captured_image_url: None,
        }
    }

    #[test]
    fn test_ffi_case_lifecycle() {
        let core = open_case_store_in_memory().unwrap();
        let record = core.add_case(make_draft("A-1")).unwrap();
        assert_eq!(record.arrival_date_text, "2024-05-01");
        assert!(record.pending_sync);
        let labs = record.tasks.iter().find(|t| t.key == FfiTaskKey::Labs).unwrap();
        assert!(labs.required && !labs.checked);

        let toggled = core.toggle_task(record.case_id, FfiTaskKey::Labs).unwrap();
        assert!(toggled.tasks.iter().any(|t| t.key == FfiTaskKey::Labs && t.checked));

        let listed = core.list_cases(FfiSortField::ArrivalDate, FfiSortDirection::Descending);
        assert_eq!(listed.len(), 1);

        core.delete_case(record.case_id).unwrap();
        assert!(core.get_case(record.case_id).is_none());
        assert!(core.has_pending_changes());
    }

    #[test]
    fn test_ffi_rejects_invalid_draft() {
        let core = open_case_store_in_memory().unwrap();
        assert!(matches!(
            core.add_case(make_draft("  ")),
            Err(SurgeryCasesError::InvalidInput(_))
        ));

        let mut draft = make_draft("A-1");
        draft.arrival_date = "05/01/2024".into();
        assert!(matches!(core.add_case(draft), Err(SurgeryCasesError::InvalidInput(_))));
        assert!(matches!(
            core.update_case(404, make_draft("A-1")),
            Err(SurgeryCasesError::NotFound(_))
        ));
    }

    #[test]
    fn test_ffi_prefill_and_csv() {
        let core = open_case_store_in_memory().unwrap();
        core.add_case(make_draft("A-1")).unwrap();

        let prefill = core.prefill_for_mrn(" a-1 ".into()).unwrap();
        assert_eq!(prefill.pet_name, "Max");
        assert_eq!(prefill.species, "Canine");

        let csv = core.export_csv().unwrap();
        let other = open_case_store_in_memory().unwrap();
        let summary = other.import_csv(csv).unwrap();
        assert_eq!(summary.imported, 1);
        assert!(summary.errors.is_empty());
        assert_eq!(other.list_cases(FfiSortField::MedicalRecordNumber, FfiSortDirection::Ascending).len(), 1);
    }

    #[test]
    fn test_ffi_import_keeps_every_row() {
        let mut csv = String::from("Medical Record #,Arrival Date,Pet Name,Species,Breed\n");
        for i in 0..3000 {
            csv.push_str(&format!("R-{},2024-01-02,Pet {},Canine,\n", i, i));
        }
        let core = open_case_store_in_memory().unwrap();
        let summary = core.import_csv(csv).unwrap();

        assert_eq!(summary.imported, 3000);
        let cases = core.list_cases(FfiSortField::ArrivalDate, FfiSortDirection::Ascending);
        assert_eq!(cases.len(), 3000);
    }

    #[test]
    fn test_ffi_import_refuses_file_with_errors() {
        let core = open_case_store_in_memory().unwrap();
        let csv = "Medical Record #,Arrival Date,Pet Name,Species,Breed\n\
                   A-1,2024-01-02,Rex,,\n\
                   ,2024-01-02,NoMrn,,\n";
        let summary = core.import_csv(csv.into()).unwrap();

        assert_eq!(summary.imported, 0);
        assert_eq!(summary.errors.len(), 1);
        assert!(summary.errors[0].starts_with("Row 3"));
        assert!(core.list_cases(FfiSortField::ArrivalDate, FfiSortDirection::Ascending).is_empty());
    }

    #[test]
    fn test_ffi_extract_demographics() {
        let extracted = extract_demographics("MRN: A-12345\nName: Buddy\nSpecies: Dog\nSex: MN".into());
        assert_eq!(extracted.medical_record_number, "A-12345");
        assert_eq!(extracted.pet_name, "Buddy");
        assert_eq!(extracted.species, "Canine");
        assert_eq!(extracted.sex, "Male Neutered");
        assert_eq!(extracted.date_of_birth, "");
    }

    #[test]
    fn test_open_with_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cases.db");
        let config = format!(
            r#"{{"database_path": {:?}, "storage_key": "clinic_a"}}"#,
            path.to_string_lossy()
        );
        {
            let core = open_case_store_with_config(config.clone()).unwrap();
            core.add_case(make_draft("A-1")).unwrap();
        }
        let core = open_case_store_with_config(config).unwrap();
        assert_eq!(core.list_cases(FfiSortField::ArrivalDate, FfiSortDirection::Ascending).len(), 1);

        assert!(matches!(
            open_case_store_with_config(r#"{"page_size": 0}"#.into()),
            Err(SurgeryCasesError::InvalidInput(_))
        ));
    }
}
