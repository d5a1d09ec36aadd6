//! Prefill a new case from the patient's most recent visit.

use crate::models::CaseRecord;

/// Species used when the source case has none.
pub const DEFAULT_SPECIES: &str = "Canine";

/// Sex used when the source case has none.
pub const DEFAULT_SEX: &str = "Male";

/// Demographics to copy into the new-case form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefillData {
    pub pet_name: String,
    pub owner_last_name: String,
    pub species: String,
    pub breed: String,
    pub sex: String,
    pub date_of_birth: String,
}

impl PrefillData {
    pub fn from_case(source: &CaseRecord) -> Self {
        let demographics = &source.case.patient_demographics;
        let or_default = |value: &str, default: &str| {
            if value.is_empty() {
                default.to_string()
            } else {
                value.to_string()
            }
        };

        Self {
            pet_name: demographics.name.clone(),
            owner_last_name: demographics.owner_last_name.clone(),
            species: or_default(&demographics.species, DEFAULT_SPECIES),
            breed: demographics.breed.clone(),
            sex: or_default(&demographics.sex, DEFAULT_SEX),
            date_of_birth: demographics.date_of_birth.clone(),
        }
    }
}

/// Most recent case with the same medical record number.
///
/// Matching ignores case and surrounding whitespace. The latest arrival date
/// wins, then the highest case id. Blank input matches nothing.
pub fn find_latest_matching_case<'a>(
    mrn: &str,
    cases: &'a [CaseRecord],
) -> Option<&'a CaseRecord> {
    let wanted = mrn.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }

    cases
        .iter()
        .filter(|c| !c.deleted && c.case.medical_record_number.trim().to_lowercase() == wanted)
        .max_by(|a, b| {
            a.case
                .arrival_date
                .cmp(&b.case.arrival_date)
                .then_with(|| a.case_id().cmp(&b.case_id()))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CaseDraft;

    fn make_case(case_id: u64, mrn: &str, arrival_date: i64, name: &str) -> CaseRecord {
        let mut draft = CaseDraft {
            medical_record_number: mrn.into(),
            arrival_date,
            ..Default::default()
        };
        draft.patient_demographics.name = name.into();
        let mut record = CaseRecord::new_local(&draft);
        record.case.case_id = case_id;
        record
    }

    #[test]
    fn test_latest_by_arrival_then_id() {
        let cases = vec![
            make_case(1, "A-100", 10, "old"),
            make_case(2, " a-100 ", 30, "newest-low-id"),
            make_case(3, "A-100", 30, "newest"),
            make_case(4, "B-200", 50, "other"),
        ];
        let found = find_latest_matching_case("a-100", &cases).unwrap();
        assert_eq!(found.case_id(), 3);
    }

    #[test]
    fn test_no_match() {
        let cases = vec![make_case(1, "A-100", 10, "x")];
        assert!(find_latest_matching_case("   ", &cases).is_none());
        assert!(find_latest_matching_case("Z-1", &cases).is_none());
    }

    #[test]
    fn test_deleted_cases_ignored() {
        let mut deleted = make_case(9, "A-100", 99, "gone");
        deleted.mark_deleted();
        let cases = vec![make_case(1, "A-100", 10, "kept"), deleted];
        assert_eq!(find_latest_matching_case("A-100", &cases).unwrap().case_id(), 1);
    }

    #[test]
    fn test_prefill_defaults() {
        let mut source = make_case(1, "A-100", 10, "Max");
        source.case.patient_demographics.breed = "Beagle".into();

        let prefill = PrefillData::from_case(&source);
        assert_eq!(prefill.pet_name, "Max");
        assert_eq!(prefill.species, "Canine");
        assert_eq!(prefill.sex, "Male");
        assert_eq!(prefill.breed, "Beagle");

        source.case.patient_demographics.species = "Feline".into();
        source.case.patient_demographics.sex = "Female Spayed".into();
        let prefill = PrefillData::from_case(&source);
        assert_eq!(prefill.species, "Feline");
        assert_eq!(prefill.sex, "Female Spayed");
    }
}
