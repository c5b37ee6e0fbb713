use crate::engine::CohortSettings;
use crate::table::CohortTable;
use core_types::{CohortMetric, Period};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Each user's cohort group: the period of their first-ever order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CohortAssignments {
    by_user: BTreeMap<String, Period>,
}

impl CohortAssignments {
    pub fn get(&self, user_id: &str) -> Option<Period> {
        self.by_user.get(user_id).copied()
    }

    pub fn len(&self) -> usize {
        self.by_user.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_user.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Period)> {
        self.by_user.iter().map(|(user, cohort)| (user.as_str(), *cohort))
    }

    /// Number of users acquired in each cohort group.
    pub fn users_per_cohort(&self) -> BTreeMap<Period, usize> {
        let mut counts = BTreeMap::new();
        for cohort in self.by_user.values() {
            *counts.entry(*cohort).or_insert(0) += 1;
        }
        counts
    }
}

impl FromIterator<(String, Period)> for CohortAssignments {
    fn from_iter<I: IntoIterator<Item = (String, Period)>>(iter: I) -> Self {
        Self {
            by_user: iter.into_iter().collect(),
        }
    }
}

/// Totals for one observed (cohort group, order period) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodAggregate {
    pub cohort_group: Period,
    pub order_period: Period,
    pub total_users: usize,
    pub total_orders: usize,
    pub total_charges: Decimal,
}

/// A `PeriodAggregate` with its position inside the cohort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabeledAggregate {
    pub cohort_group: Period,
    pub order_period: Period,
    /// 1 is the cohort's first active period.
    pub cohort_period: u32,
    pub total_users: usize,
    pub total_orders: usize,
    pub total_charges: Decimal,
}

impl LabeledAggregate {
    pub fn from_aggregate(aggregate: PeriodAggregate, cohort_period: u32) -> Self {
        Self {
            cohort_group: aggregate.cohort_group,
            order_period: aggregate.order_period,
            cohort_period,
            total_users: aggregate.total_users,
            total_orders: aggregate.total_orders,
            total_charges: aggregate.total_charges,
        }
    }

    pub fn metric(&self, metric: CohortMetric) -> Decimal {
        match metric {
            CohortMetric::TotalUsers => Decimal::from(self.total_users),
            CohortMetric::TotalOrders => Decimal::from(self.total_orders),
            CohortMetric::TotalCharges => self.total_charges,
        }
    }
}

/// Share of each cohort's first-period users active in each cohort period.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetentionMatrix {
    cohort_sizes: BTreeMap<Period, usize>,
    ratios: CohortTable<Decimal>,
}

impl RetentionMatrix {
    pub(crate) fn new(cohort_sizes: BTreeMap<Period, usize>, ratios: CohortTable<Decimal>) -> Self {
        Self {
            cohort_sizes,
            ratios,
        }
    }

    pub fn ratio(&self, cohort_group: &Period, cohort_period: u32) -> Option<Decimal> {
        self.ratios.get(cohort_group, cohort_period).copied()
    }

    /// `total_users` in the cohort's first period.
    pub fn cohort_size(&self, cohort_group: &Period) -> Option<usize> {
        self.cohort_sizes.get(cohort_group).copied()
    }

    pub fn cohort_sizes(&self) -> &BTreeMap<Period, usize> {
        &self.cohort_sizes
    }

    pub fn cohorts(&self) -> impl Iterator<Item = &Period> {
        self.ratios.cohorts()
    }

    pub fn ratios(&self) -> &CohortTable<Decimal> {
        &self.ratios
    }

    pub fn max_cohort_period(&self) -> Option<u32> {
        self.ratios.max_cohort_period()
    }

    pub fn is_empty(&self) -> bool {
        self.ratios.is_empty()
    }

    /// A view over a subset of cohorts and cohort periods.
    pub fn select(&self, cohorts: &[Period], max_period: Option<u32>) -> Self {
        let ratios = self.ratios.select(cohorts, max_period);
        let cohort_sizes = self
            .cohort_sizes
            .iter()
            .filter(|(cohort, _)| ratios.row(cohort).is_some())
            .map(|(cohort, size)| (*cohort, *size))
            .collect();

        Self {
            cohort_sizes,
            ratios,
        }
    }

    /// True when every cohort starts at exactly 1 and never rises above it.
    ///
    /// A ratio above 1 means users were attributed to a later period of an
    /// earlier cohort, which points at inconsistent inputs.
    pub fn is_consistent(&self) -> bool {
        self.ratios.rows().all(|(_, row)| {
            row.get(&1) == Some(&Decimal::ONE) && row.values().all(|ratio| *ratio <= Decimal::ONE)
        })
    }
}

/// Everything one pipeline run produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortReport {
    pub settings: CohortSettings,
    pub cohorts: CohortAssignments,
    pub aggregates: Vec<LabeledAggregate>,
    pub retention: RetentionMatrix,
}
