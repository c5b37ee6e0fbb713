use serde::{Deserialize, Serialize};

/// The calendar bucket size orders and cohorts are truncated to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum PeriodGranularity {
    Day,
    /// ISO week, starting on Monday.
    Week,
    #[default]
    Month,
    Quarter,
    Year,
}

/// How the `cohort_period` ordinal is assigned within a cohort.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum PeriodIndexing {
    /// Nth period with any recorded activity. Periods without orders are
    /// skipped, so the ordinal after a gap is still `previous + 1`.
    #[default]
    ObservedActivity,
    /// Nth calendar period since the cohort's first period. Periods without
    /// orders leave holes in the numbering.
    CalendarDistance,
}

/// The three per-cell aggregates computed for each (cohort, period) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum CohortMetric {
    /// Distinct users.
    #[default]
    #[cfg_attr(feature = "clap", value(name = "users"))]
    TotalUsers,
    /// Distinct orders.
    #[cfg_attr(feature = "clap", value(name = "orders"))]
    TotalOrders,
    /// Sum of charges.
    #[cfg_attr(feature = "clap", value(name = "charges"))]
    TotalCharges,
}

impl CohortMetric {
    pub fn label(&self) -> &'static str {
        match self {
            CohortMetric::TotalUsers => "total_users",
            CohortMetric::TotalOrders => "total_orders",
            CohortMetric::TotalCharges => "total_charges",
        }
    }
}

impl std::fmt::Display for CohortMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
