use crate::report::LabeledAggregate;
use core_types::{CohortMetric, Period};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// A sparse `cohort_group -> cohort_period -> value` mapping.
///
/// This is the "unstacked" shape presentation code wants: one row per cohort,
/// one column per cohort period. Cells that were never observed are absent,
/// not zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CohortTable<T> {
    cells: BTreeMap<Period, BTreeMap<u32, T>>,
}

impl<T> Default for CohortTable<T> {
    fn default() -> Self {
        Self {
            cells: BTreeMap::new(),
        }
    }
}

impl<T> CohortTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, cohort_group: Period, cohort_period: u32, value: T) -> Option<T> {
        self.cells
            .entry(cohort_group)
            .or_default()
            .insert(cohort_period, value)
    }

    pub fn get(&self, cohort_group: &Period, cohort_period: u32) -> Option<&T> {
        self.cells.get(cohort_group)?.get(&cohort_period)
    }

    pub fn row(&self, cohort_group: &Period) -> Option<&BTreeMap<u32, T>> {
        self.cells.get(cohort_group)
    }

    /// Cohort groups in chronological order.
    pub fn cohorts(&self) -> impl Iterator<Item = &Period> {
        self.cells.keys()
    }

    pub fn rows(&self) -> impl Iterator<Item = (&Period, &BTreeMap<u32, T>)> {
        self.cells.iter()
    }

    /// The largest cohort period present in any row.
    pub fn max_cohort_period(&self) -> Option<u32> {
        self.cells
            .values()
            .filter_map(|row| row.keys().next_back().copied())
            .max()
    }

    /// Number of cohort rows.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.values().map(BTreeMap::len).sum()
    }
}

impl<T: Clone> CohortTable<T> {
    /// Restricts the table to the given cohorts (all of them when `cohorts` is
    /// empty) and to cohort periods up to `max_period`.
    pub fn select(&self, cohorts: &[Period], max_period: Option<u32>) -> Self {
        let cells = self
            .cells
            .iter()
            .filter(|(cohort, _)| cohorts.is_empty() || cohorts.contains(cohort))
            .map(|(cohort, row)| {
                let row = row
                    .iter()
                    .filter(|(period, _)| max_period.is_none_or(|max| **period <= max))
                    .map(|(period, value)| (*period, value.clone()))
                    .collect();
                (*cohort, row)
            })
            .collect();

        Self { cells }
    }
}

impl<T> FromIterator<(Period, u32, T)> for CohortTable<T> {
    fn from_iter<I: IntoIterator<Item = (Period, u32, T)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (cohort_group, cohort_period, value) in iter {
            table.insert(cohort_group, cohort_period, value);
        }
        table
    }
}

/// Unstacks one of the three aggregate metrics into a `CohortTable`.
pub fn pivot(labeled: &[LabeledAggregate], metric: CohortMetric) -> CohortTable<Decimal> {
    labeled
        .iter()
        .map(|row| (row.cohort_group, row.cohort_period, row.metric(metric)))
        .collect()
}
