//! # Cohort Analytics Engine
//!
//! This crate turns a batch of purchase records into a cohort retention
//! analysis: which calendar period each user was acquired in, how each cohort
//! behaved in every later period, and what share of each cohort was still
//! buying.
//!
//! ## Architectural Principles
//!
//! - **Pure Logic:** No I/O. It depends only on `core-types`; loading the
//!   records and rendering the results belong to the caller.
//! - **Stateless Pipeline:** The `CohortRetentionEngine` runs four stages
//!   (`assign_cohorts`, `aggregate_periods`, `label_cohort_periods`,
//!   `compute_retention`), each taking the previous stage's output by value or
//!   reference and returning a new structure. Nothing is mutated in place.
//!
//! ## Public API
//!
//! - `CohortRetentionEngine`: the pipeline, plus `verify_aggregate`.
//! - `CohortReport`, `PeriodAggregate`, `LabeledAggregate`, `RetentionMatrix`:
//!   the stage outputs.
//! - `CohortTable`: the `cohort_group -> cohort_period -> value` mapping handed
//!   to presentation code, built from labeled aggregates by `pivot`.
//! - `AnalyticsError`: the specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod engine;
pub mod error;
pub mod report;
pub mod table;
pub mod verify;

// Re-export the key components to create a clean, public-facing API.
pub use engine::{CohortRetentionEngine, CohortSettings};
pub use error::AnalyticsError;
pub use report::{
    CohortAssignments, CohortReport, LabeledAggregate, PeriodAggregate, RetentionMatrix,
};
pub use table::{CohortTable, pivot};
