//! Export and import of cases for spreadsheets.

mod csv_format;

pub use csv_format::*;
