//! Synchronization with the remote case gateway.
//!
//! Round trip:
//! 1. Fetch the full remote snapshot (paginated)
//! 2. If anything is pending, push the remote snapshot overlaid with local
//!    pending edits, then issue pending deletions
//! 3. Refetch the snapshot the server now holds
//! 4. Merge, clear pending flags, persist

mod error;
mod gateway;
mod memory_gateway;
mod orchestrator;

pub use error::*;
pub use gateway::*;
pub use memory_gateway::*;
pub use orchestrator::*;
