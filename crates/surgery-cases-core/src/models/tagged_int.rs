//! Lossless 64-bit integer encoding for the persisted blob.
//!
//! Integers are written as `"<digits>n"` strings so that readers with
//! double-precision numbers (browser storage, JS bridges) never round them.
//! Reading also accepts plain JSON numbers and untagged digit strings from
//! older blobs.
//!
//! Use as `#[serde(with = "tagged_int")]`.

use std::fmt::Display;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serializer};
use serde_json::Value;

const TAG: char = 'n';

/// Encode an integer as a tagged string.
pub fn encode<T: Display>(value: &T) -> String {
    format!("{value}{TAG}")
}

/// Decode a tagged or plain digit string.
pub fn decode_str<T: FromStr>(text: &str) -> Option<T> {
    let digits = text.strip_suffix(TAG).unwrap_or(text);
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Decode an integer from any accepted JSON representation.
pub fn from_value<T: FromStr>(value: &Value) -> Option<T> {
    match value {
        Value::String(text) => decode_str(text),
        Value::Number(number) if number.is_u64() || number.is_i64() => {
            decode_str(&number.to_string())
        }
        _ => None,
    }
}

pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Display,
    S: Serializer,
{
    serializer.serialize_str(&encode(value))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawInt {
    Text(String),
    Unsigned(u64),
    Signed(i64),
}

pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: FromStr,
    D: Deserializer<'de>,
{
    let text = match RawInt::deserialize(deserializer)? {
        RawInt::Text(text) => text,
        RawInt::Unsigned(n) => n.to_string(),
        RawInt::Signed(n) => n.to_string(),
    };
    decode_str(&text).ok_or_else(|| de::Error::custom(format!("invalid integer: {text:?}")))
}
