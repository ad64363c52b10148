//! Activity log
//!
//! Append-only JSONL files, one per day, recording who did what to which
//! loan or offer. Written after a transaction commits.

pub mod reader;
pub mod store;

pub use reader::{ActivityFilter, ActivityReader};
pub use store::ActivityLog;
