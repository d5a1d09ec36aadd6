//! Patient demographics attached to each case.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Patient demographics. All fields are plain trimmed strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Demographics {
    /// Pet name
    pub name: String,
    /// Owner last name
    pub owner_last_name: String,
    /// Species (e.g., "Canine", "Feline", "Other")
    pub species: String,
    /// Breed
    pub breed: String,
    /// Sex (e.g., "Male Neutered")
    pub sex: String,
    /// Date of birth as YYYY-MM-DD, empty when unknown
    pub date_of_birth: String,
}

impl Demographics {
    /// Trim every field.
    pub fn normalized(&self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            owner_last_name: self.owner_last_name.trim().to_string(),
            species: self.species.trim().to_string(),
            breed: self.breed.trim().to_string(),
            sex: self.sex.trim().to_string(),
            date_of_birth: self.date_of_birth.trim().to_string(),
        }
    }
}

/// Coerce a stored demographics value of any shape into [`Demographics`].
///
/// Missing or non-string members become empty strings.
pub fn normalize_demographics(value: &Value) -> Demographics {
    let field = |name: &str| -> String {
        value
            .get(name)
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    };

    Demographics {
        name: field("name"),
        owner_last_name: field("ownerLastName"),
        species: field("species"),
        breed: field("breed"),
        sex: field("sex"),
        date_of_birth: field("dateOfBirth"),
    }
}
