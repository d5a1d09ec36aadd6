//! Demographics extraction for new surgery cases.
//!
//! Turns pasted patient text (a discharge summary, a referral note, a line
//! copied from the practice system) into form fields. Matching is
//! deterministic: labelled fields first, then keyword fallbacks.

mod demographics;

pub use demographics::*;
