//! Shared value types for the cohort workspace.
//!
//! Everything here is plain data: the purchase record handed over by a data
//! loader, the calendar `Period` it is bucketed into, and the small enums
//! that select how an analysis is run.

pub mod enums;
pub mod error;
pub mod period;
pub mod record;

// Re-export the core types to provide a clean public API.
pub use enums::{CohortMetric, PeriodGranularity, PeriodIndexing};
pub use error::CoreError;
pub use period::Period;
pub use record::{TransactionRecord, parse_timestamp};
