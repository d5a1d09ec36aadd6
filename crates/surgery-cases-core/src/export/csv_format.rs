//! CSV export and import of cases.
//!
//! Columns: the five fixed columns below, then one column per task labelled
//! with [`TaskKey::label`]. A task cell is blank when the task is not
//! required, otherwise `Yes` or `No`.

use std::collections::{HashMap, HashSet};

use csv::{QuoteStyle, ReaderBuilder, Trim, WriterBuilder};
use thiserror::Error;

use crate::dates::{date_only_to_nanos, nanos_to_date_only, today_date_only, validate_date_only};
use crate::models::{CaseDraft, CaseId, CaseRecord, TaskItem, TaskKey, TasksChecklist};

pub const COLUMN_MRN: &str = "Medical Record #";
pub const COLUMN_ARRIVAL_DATE: &str = "Arrival Date";
pub const COLUMN_PET_NAME: &str = "Pet Name";
pub const COLUMN_SPECIES: &str = "Species";
pub const COLUMN_BREED: &str = "Breed";

const FIXED_COLUMNS: [&str; 5] = [
    COLUMN_MRN,
    COLUMN_ARRIVAL_DATE,
    COLUMN_PET_NAME,
    COLUMN_SPECIES,
    COLUMN_BREED,
];

/// Species for imported rows without one.
const IMPORT_DEFAULT_SPECIES: &str = "Other";

/// CSV export errors.
#[derive(Error, Debug)]
pub enum CsvError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV output error: {0}")]
    Output(String),
}

/// A validation problem in one row. Row numbers are 1-based file lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvValidationError {
    pub row: usize,
    pub field: String,
    pub message: String,
}

/// One accepted data row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvRow {
    pub medical_record_number: String,
    pub arrival_date: String,
    pub pet_name: String,
    pub species: String,
    pub breed: String,
    /// Raw cell per recognized task column present in the file
    pub tasks: HashMap<TaskKey, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvParseResult {
    pub rows: Vec<CsvRow>,
    pub errors: Vec<CsvValidationError>,
    pub warnings: Vec<String>,
}

impl CsvParseResult {
    fn file_error(&mut self, message: impl Into<String>) {
        self.errors.push(CsvValidationError {
            row: 0,
            field: "file".into(),
            message: message.into(),
        });
    }

    fn row_error(&mut self, row: usize, field: &str, message: impl Into<String>) {
        self.errors.push(CsvValidationError {
            row,
            field: field.into(),
            message: message.into(),
        });
    }
}

fn task_cell(item: TaskItem) -> &'static str {
    match (item.required, item.checked) {
        (false, _) => "",
        (true, true) => "Yes",
        (true, false) => "No",
    }
}

/// Export visible cases as CSV, every cell quoted.
pub fn cases_to_csv(cases: &[CaseRecord]) -> Result<String, CsvError> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_writer(Vec::new());

    writer.write_record(
        FIXED_COLUMNS
            .iter()
            .copied()
            .chain(TaskKey::ALL.iter().map(TaskKey::label)),
    )?;

    for record in cases.iter().filter(|r| !r.deleted) {
        let case = &record.case;
        let demographics = &case.patient_demographics;
        let mut cells = vec![
            case.medical_record_number.clone(),
            nanos_to_date_only(case.arrival_date),
            demographics.name.clone(),
            demographics.species.clone(),
            demographics.breed.clone(),
        ];
        cells.extend(
            TaskKey::ALL
                .iter()
                .map(|key| task_cell(case.tasks_checklist.get(*key)).to_string()),
        );
        writer.write_record(&cells)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| CsvError::Output(e.error().to_string()))?;
    String::from_utf8(bytes).map_err(|e| CsvError::Output(e.to_string()))
}

/// Parse CSV text into rows, collecting per-row errors.
///
/// Rows with the wrong column count, a blank medical record number, or an
/// invalid arrival date are reported and skipped. Unknown columns produce a
/// warning and are ignored. Quoted cells may span lines.
pub fn parse_csv(text: &str) -> CsvParseResult {
    let mut result = CsvParseResult::default();
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = match reader.headers() {
        Ok(headers) => headers.iter().map(str::to_string).collect(),
        Err(e) => {
            result.file_error(format!("Could not read CSV header: {}", e));
            return result;
        }
    };
    if headers.iter().all(String::is_empty) {
        result.file_error("CSV file is empty or has no data rows");
        return result;
    }

    let unrecognized: Vec<&str> = headers
        .iter()
        .map(String::as_str)
        .filter(|h| !FIXED_COLUMNS.contains(h) && TaskKey::from_csv_column(h).is_none())
        .collect();
    if !unrecognized.is_empty() {
        result.warnings.push(format!(
            "Unrecognized task columns found and will be ignored: {}.",
            unrecognized.join(", ")
        ));
    }

    let mut data_rows = 0;
    for record in reader.records() {
        data_rows += 1;
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                let line = e.position().map_or(0, |p| p.line() as usize);
                result.row_error(line, "row", format!("Unreadable row: {}", e));
                continue;
            }
        };
        let line = record.position().map_or(0, |p| p.line() as usize);

        if record.len() != headers.len() {
            result.row_error(
                line,
                "row",
                format!(
                    "Column count mismatch (expected {}, got {})",
                    headers.len(),
                    record.len()
                ),
            );
            continue;
        }

        let mut row = CsvRow::default();
        for (header, value) in headers.iter().zip(record.iter()) {
            let value = value.to_string();
            match header.as_str() {
                COLUMN_MRN => row.medical_record_number = value,
                COLUMN_ARRIVAL_DATE => row.arrival_date = value,
                COLUMN_PET_NAME => row.pet_name = value,
                COLUMN_SPECIES => row.species = value,
                COLUMN_BREED => row.breed = value,
                other => {
                    if let Some(key) = TaskKey::from_csv_column(other) {
                        row.tasks.insert(key, value);
                    }
                }
            }
        }

        if row.medical_record_number.is_empty() {
            result.row_error(line, COLUMN_MRN, "Medical Record # is required");
            continue;
        }
        if !row.arrival_date.is_empty() && validate_date_only(&row.arrival_date).is_none() {
            result.row_error(line, COLUMN_ARRIVAL_DATE, "Arrival Date must be YYYY-MM-DD");
            continue;
        }

        result.rows.push(row);
    }

    if data_rows == 0 {
        result.file_error("CSV file is empty or has no data rows");
    }
    result
}

fn parse_task_value(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "yes" | "true" | "1")
}

impl CsvRow {
    /// Checklist from the task cells: any non-blank cell marks the task
    /// required; `yes`, `true` or `1` marks it checked.
    pub fn checklist(&self) -> TasksChecklist {
        let mut checklist = TasksChecklist::default();
        for (key, value) in &self.tasks {
            if !value.trim().is_empty() {
                *checklist.get_mut(*key) = TaskItem {
                    required: true,
                    checked: parse_task_value(value),
                };
            }
        }
        checklist
    }

    /// Build a pending local case with the given id.
    ///
    /// A blank arrival date means today.
    pub fn to_case(&self, case_id: CaseId) -> CaseRecord {
        let arrival_date = if self.arrival_date.trim().is_empty() {
            date_only_to_nanos(&today_date_only())
        } else {
            date_only_to_nanos(&self.arrival_date)
        };
        let mut draft = CaseDraft {
            medical_record_number: self.medical_record_number.clone(),
            arrival_date,
            ..Default::default()
        };
        draft.patient_demographics.name = self.pet_name.clone();
        draft.patient_demographics.species = if self.species.trim().is_empty() {
            IMPORT_DEFAULT_SPECIES.to_string()
        } else {
            self.species.clone()
        };
        draft.patient_demographics.breed = self.breed.clone();

        let mut record = CaseRecord::new_local(&draft);
        record.case.case_id = case_id;
        record.case.tasks_checklist = self.checklist();
        record
    }
}

/// Pending cases for `rows`, with consecutive ids counted up from `base`.
/// Ids in `taken` are skipped, so every returned id is distinct and new.
pub fn rows_to_cases(rows: &[CsvRow], base: CaseId, taken: &HashSet<CaseId>) -> Vec<CaseRecord> {
    let mut next = base;
    rows.iter()
        .map(|row| {
            while taken.contains(&next) {
                next = next.wrapping_add(1);
            }
            let record = row.to_case(next);
            next = next.wrapping_add(1);
            record
        })
        .collect()
}
