//! Demographics extraction from pasted patient text.
//!
//! Pattern matching only; every field is best-effort and left `None` when
//! nothing matches.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Species bucket.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Species {
    Canine,
    Feline,
    Other,
}

impl Species {
    pub fn as_str(&self) -> &'static str {
        match self {
            Species::Canine => "Canine",
            Species::Feline => "Feline",
            Species::Other => "Other",
        }
    }
}

/// Sex and reproductive status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Sex {
    #[serde(rename = "Male")]
    Male,
    #[serde(rename = "Male Neutered")]
    MaleNeutered,
    #[serde(rename = "Female")]
    Female,
    #[serde(rename = "Female Spayed")]
    FemaleSpayed,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "Male",
            Sex::MaleNeutered => "Male Neutered",
            Sex::Female => "Female",
            Sex::FemaleSpayed => "Female Spayed",
        }
    }
}

/// Fields recovered from free text.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedDemographics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medical_record_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pet_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub species: Option<Species>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sex: Option<Sex>,
    /// `YYYY-MM-DD`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
}

impl ExtractedDemographics {
    /// Whether nothing was found.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// ============================================================================
// Patterns
// ============================================================================

/// Compile a list of patterns once.
fn compiled(cell: &'static OnceLock<Vec<Regex>>, patterns: &[&str]) -> &'static [Regex] {
    cell.get_or_init(|| {
        patterns
            .iter()
            .map(|p| Regex::new(p).expect("demographics regex is valid"))
            .collect()
    })
}

fn mrn_patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    compiled(
        &RE,
        &[
            r"(?i)(?:mrn|medical\s*record|record\s*#?|patient\s*#?)[:\s]+([a-z0-9-]+)",
            // Prefixed codes: "A-12345", "AB 123456"
            r"(?i)\b([a-z]{1,3}[-\s]?\d{4,10})\b",
        ],
    )
}

fn name_patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    compiled(
        &RE,
        &[
            r"(?i)(?:pet\s*name|patient\s*name|name)[:\s]+([a-z][\w\s'-]+?)(?:\n|$|,|\||owner|species|breed)",
            r"(?i)(?:pet|patient)[:\s]+([a-z][\w\s'-]+?)(?:\n|$|,|\||owner|species|breed)",
        ],
    )
}

fn owner_patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    compiled(
        &RE,
        &[
            r"(?i)(?:owner\s*last\s*name|owner\s*name|owner)[:\s]+([a-z][\w\s'-]+?)(?:\n|$|,|\||species|breed|sex)",
            r"(?i)(?:last\s*name)[:\s]+([a-z][\w\s'-]+?)(?:\n|$|,|\||species|breed|sex)",
        ],
    )
}

fn breed_patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    compiled(
        &RE,
        &[r"(?i)breed[:\s]+([a-z][\w\s'-]+?)(?:\n|$|,|\||sex|male|female|dob|date)"],
    )
}

fn dob_patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    compiled(
        &RE,
        &[
            r"(?i)(?:dob|date\s*of\s*birth|born)[:\s]+(\d{4}[-/]\d{1,2}[-/]\d{1,2})",
            r"(?i)(?:dob|date\s*of\s*birth|born)[:\s]+(\d{1,2}[-/]\d{1,2}[-/]\d{4})",
            r"\b(\d{4}[-/]\d{1,2}[-/]\d{1,2})\b",
        ],
    )
}

/// Species keywords, checked in order against lowercased text.
fn species_patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    compiled(
        &RE,
        &[
            r"\b(?:dogs?|canine|puppy)\b",
            r"\b(?:cats?|feline|kitten)\b",
            r"\b(?:bird|rabbit|ferret|reptile|hamster|guinea pig)\b",
        ],
    )
}

/// Sex keywords, checked in order against lowercased text.
fn sex_patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    compiled(
        &RE,
        &[
            r"\b(?:male\s*neutered|neutered\s*male|mn|castrated)\b",
            r"\b(?:female\s*spayed|spayed\s*female|fs|spayed)\b",
            r"\b(?:male|m)\b",
            r"\b(?:female|f)\b",
        ],
    )
}

fn capitalized_word() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z][\w'-]*$").expect("capitalized word regex is valid"))
}

fn date_ymd() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{4})[-/](\d{1,2})[-/](\d{1,2})$").expect("date regex is valid"))
}

fn date_mdy() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{1,2})[-/](\d{1,2})[-/](\d{4})$").expect("date regex is valid"))
}

/// Labels that are never a pet name.
const NAME_STOP_WORDS: &[&str] = &[
    "name", "pet", "owner", "species", "breed", "sex", "male", "female", "canine", "feline",
    "date", "birth", "dob", "mrn", "record", "medical",
];

/// Breed keywords, most specific first.
const COMMON_BREEDS: &[&str] = &[
    "labrador retriever",
    "golden retriever",
    "german shepherd",
    "french bulldog",
    "labrador",
    "retriever",
    "shepherd",
    "bulldog",
    "beagle",
    "poodle",
    "terrier",
    "chihuahua",
    "dachshund",
    "boxer",
    "husky",
    "corgi",
    "pug",
    "shih tzu",
    "persian",
    "siamese",
    "maine coon",
    "ragdoll",
    "bengal",
    "sphynx",
    "tabby",
    "mixed breed",
    "mixed",
    "domestic shorthair",
    "domestic longhair",
    "dsh",
    "dlh",
];

// ============================================================================
// Extraction
// ============================================================================

fn first_capture(patterns: &[Regex], text: &str) -> Option<String> {
    patterns
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// First capitalized word (plus a following capitalized word) that is not a
/// field label.
fn fallback_pet_name(text: &str) -> Option<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let is_name = |word: &str| capitalized_word().is_match(word);

    words.iter().enumerate().find_map(|(i, word)| {
        if !is_name(*word) || NAME_STOP_WORDS.contains(&word.to_lowercase().as_str()) {
            return None;
        }
        match words.get(i + 1) {
            Some(next) if is_name(*next) => Some(format!("{} {}", word, next)),
            _ => Some(word.to_string()),
        }
    })
}

fn extract_species(lower: &str) -> Option<Species> {
    let patterns = species_patterns();
    [Species::Canine, Species::Feline, Species::Other]
        .into_iter()
        .zip(patterns)
        .find(|(_, re)| re.is_match(lower))
        .map(|(species, _)| species)
}

fn extract_sex(lower: &str) -> Option<Sex> {
    let patterns = sex_patterns();
    if patterns[0].is_match(lower) {
        Some(Sex::MaleNeutered)
    } else if patterns[1].is_match(lower) {
        Some(Sex::FemaleSpayed)
    } else if patterns[2].is_match(lower) && !lower.contains("female") {
        Some(Sex::Male)
    } else if patterns[3].is_match(lower) {
        Some(Sex::Female)
    } else {
        None
    }
}

/// Normalize `YYYY-M-D`, `YYYY/M/D`, `M/D/YYYY` or `M-D-YYYY` to
/// `YYYY-MM-DD`. Other formats yield `None`.
pub fn normalize_date_string(text: &str) -> Option<String> {
    let text = text.trim();
    if let Some(caps) = date_ymd().captures(text) {
        return Some(format!("{}-{:0>2}-{:0>2}", &caps[1], &caps[2], &caps[3]));
    }
    if let Some(caps) = date_mdy().captures(text) {
        return Some(format!("{}-{:0>2}-{:0>2}", &caps[3], &caps[1], &caps[2]));
    }
    None
}

/// Extract demographics from pasted text.
pub fn extract_demographics(text: &str) -> ExtractedDemographics {
    if text.trim().is_empty() {
        return ExtractedDemographics::default();
    }
    let lower = text.to_lowercase();

    let medical_record_number = first_capture(mrn_patterns(), text)
        .map(|mrn| mrn.split_whitespace().collect::<String>());

    let pet_name = first_capture(name_patterns(), text).or_else(|| fallback_pet_name(text));

    let breed = first_capture(breed_patterns(), text).or_else(|| {
        COMMON_BREEDS
            .iter()
            .find(|breed| lower.contains(*breed))
            .map(|breed| title_case(breed))
    });

    let date_of_birth = dob_patterns()
        .iter()
        .filter_map(|re| re.captures(text))
        .filter_map(|caps| caps.get(1).and_then(|m| normalize_date_string(m.as_str())))
        .next();

    ExtractedDemographics {
        medical_record_number,
        pet_name,
        owner_last_name: first_capture(owner_patterns(), text),
        species: extract_species(&lower),
        breed,
        sex: extract_sex(&lower),
        date_of_birth,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_labelled_text() {
        let text = "MRN: A-12345\nName: Buddy\nOwner: Smith\nSpecies: Dog\nBreed: Golden Retriever\nSex: MN\nDOB: 03/15/2019";
        let extracted = extract_demographics(text);

        assert_eq!(extracted.medical_record_number.as_deref(), Some("A-12345"));
        assert_eq!(extracted.pet_name.as_deref(), Some("Buddy"));
        assert_eq!(extracted.owner_last_name.as_deref(), Some("Smith"));
        assert_eq!(extracted.species, Some(Species::Canine));
        assert_eq!(extracted.breed.as_deref(), Some("Golden Retriever"));
        assert_eq!(extracted.sex, Some(Sex::MaleNeutered));
        assert_eq!(extracted.date_of_birth.as_deref(), Some("2019-03-15"));
    }

    #[test]
    fn test_loose_text() {
        let text = "Bella - spayed female cat, DSH\nPatient #: 4417892\nOwner: Jones\nDOB 2021/7/4";
        let extracted = extract_demographics(text);

        assert_eq!(extracted.medical_record_number.as_deref(), Some("4417892"));
        assert_eq!(extracted.pet_name.as_deref(), Some("Bella"));
        assert_eq!(extracted.owner_last_name.as_deref(), Some("Jones"));
        assert_eq!(extracted.species, Some(Species::Feline));
        assert_eq!(extracted.breed.as_deref(), Some("Dsh"));
        assert_eq!(extracted.sex, Some(Sex::FemaleSpayed));
        assert_eq!(extracted.date_of_birth.as_deref(), Some("2021-07-04"));
    }

    #[test]
    fn test_prefixed_code_and_two_word_name() {
        let extracted = extract_demographics("Mister Whiskers AB 123456 male rabbit");
        assert_eq!(extracted.medical_record_number.as_deref(), Some("AB123456"));
        assert_eq!(extracted.pet_name.as_deref(), Some("Mister Whiskers"));
        assert_eq!(extracted.species, Some(Species::Other));
        assert_eq!(extracted.sex, Some(Sex::Male));
    }

    #[test]
    fn test_female_not_male() {
        let extracted = extract_demographics("Luna, female");
        assert_eq!(extracted.sex, Some(Sex::Female));
        assert_eq!(extracted.species, None);
    }

    #[test]
    fn test_empty_text() {
        assert!(extract_demographics("").is_empty());
        assert!(extract_demographics("   \n ").is_empty());
    }

    #[test]
    fn test_normalize_date_string() {
        assert_eq!(normalize_date_string("2020-1-5").as_deref(), Some("2020-01-05"));
        assert_eq!(normalize_date_string("2020/12/25").as_deref(), Some("2020-12-25"));
        assert_eq!(normalize_date_string("1/5/2020").as_deref(), Some("2020-01-05"));
        assert_eq!(normalize_date_string("2020.01.05"), None);
        assert_eq!(normalize_date_string(""), None);
    }

    #[test]
    fn test_serialized_names() {
        let extracted = ExtractedDemographics {
            pet_name: Some("Max".into()),
            sex: Some(Sex::MaleNeutered),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_string(&extracted).unwrap(),
            r#"{"petName":"Max","sex":"Male Neutered"}"#
        );
    }

    proptest! {
        #[test]
        fn prop_extract_never_panics(text in "\\PC{0,200}") {
            let extracted = extract_demographics(&text);
            if let Some(dob) = extracted.date_of_birth {
                prop_assert_eq!(dob.chars().count(), 10);
            }
        }
    }
}
