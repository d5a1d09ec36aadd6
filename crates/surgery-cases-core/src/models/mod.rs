//! Domain models for surgery case tracking.

mod case;
mod checklist;
mod demographics;
pub mod tagged_int;

pub use case::*;
pub use checklist::*;
pub use demographics::*;
