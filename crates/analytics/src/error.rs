use core_types::CohortMetric;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyticsError {
    #[error("Invalid record at index {index}: {reason}")]
    InvalidRecord { index: usize, reason: String },

    #[error("User '{0}' has orders but no cohort assignment")]
    UnassignedUser(String),

    #[error("Cohort {0} has no row for its first period; cohort assignment and aggregation disagree")]
    EmptyCohort(String),

    #[error("Order period {order_period} is {offset} periods from cohort {cohort_group}; cohort periods must be between 1 and u32::MAX")]
    CohortPeriodOutOfRange {
        cohort_group: String,
        order_period: String,
        offset: i64,
    },

    #[error("Cohort {cohort_group} has more than one row for cohort period {cohort_period}")]
    DuplicateCohortPeriod {
        cohort_group: String,
        cohort_period: u32,
    },

    #[error("Summed charges overflow for cohort {cohort_group}, period {order_period}")]
    ChargeOverflow {
        cohort_group: String,
        order_period: String,
    },

    #[error("No aggregate exists for cohort {cohort_group}, period {order_period}")]
    MissingAggregate {
        cohort_group: String,
        order_period: String,
    },

    #[error(
        "Aggregate mismatch for cohort {cohort_group}, period {order_period}: {metric} is {actual}, raw records give {expected}"
    )]
    AggregateMismatch {
        cohort_group: String,
        order_period: String,
        metric: CohortMetric,
        expected: String,
        actual: String,
    },
}
