use crate::error::AnalyticsError;
use crate::report::{
    CohortAssignments, CohortReport, LabeledAggregate, PeriodAggregate, RetentionMatrix,
};
use crate::table::CohortTable;
use chrono::NaiveDateTime;
use core_types::{Period, PeriodGranularity, PeriodIndexing, TransactionRecord};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// The knobs a cohort analysis is run with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortSettings {
    pub granularity: PeriodGranularity,
    pub indexing: PeriodIndexing,
}

/// A stateless calculator for cohort retention.
#[derive(Debug, Default)]
pub struct CohortRetentionEngine {
    settings: CohortSettings,
}

impl CohortRetentionEngine {
    pub fn new(settings: CohortSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> CohortSettings {
        self.settings
    }

    /// Runs all four stages over `records`.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `CohortReport` or the first `AnalyticsError`
    /// hit. No partial report is produced.
    pub fn run(&self, records: &[TransactionRecord]) -> Result<CohortReport, AnalyticsError> {
        let cohorts = self.assign_cohorts(records)?;
        let aggregates = self.aggregate_periods(records, &cohorts)?;
        let labeled = self.label_cohort_periods(aggregates)?;
        let retention = self.compute_retention(&labeled)?;

        if !retention.is_consistent() {
            tracing::warn!("Retention ratios fall outside (0, 1]; check the input for misattributed users.");
        }

        tracing::info!(
            records = records.len(),
            users = cohorts.len(),
            cohorts = retention.cohort_sizes().len(),
            cells = labeled.len(),
            "Cohort analysis complete."
        );

        Ok(CohortReport {
            settings: self.settings,
            cohorts,
            aggregates: labeled,
            retention,
        })
    }

    /// Assigns every user to the period of their earliest order.
    ///
    /// Fails on the first record with a missing user, a missing or unparseable
    /// `order_date`, or a negative charge.
    pub fn assign_cohorts(
        &self,
        records: &[TransactionRecord],
    ) -> Result<CohortAssignments, AnalyticsError> {
        let mut first_orders: HashMap<&str, NaiveDateTime> = HashMap::new();

        for (index, record) in records.iter().enumerate() {
            let placed_at = validated_timestamp(index, record)?;
            first_orders
                .entry(record.user_id.as_str())
                .and_modify(|first| {
                    if placed_at < *first {
                        *first = placed_at;
                    }
                })
                .or_insert(placed_at);
        }

        let assignments: CohortAssignments = first_orders
            .into_iter()
            .map(|(user, first)| (user.to_string(), self.period_of(first)))
            .collect();

        tracing::debug!(users = assignments.len(), "Assigned cohort groups.");
        Ok(assignments)
    }

    /// Rolls records up by (cohort group, order period).
    ///
    /// Only pairs with at least one record are produced. The returned order is
    /// chronological, but callers that need an order should sort explicitly.
    pub fn aggregate_periods(
        &self,
        records: &[TransactionRecord],
        cohorts: &CohortAssignments,
    ) -> Result<Vec<PeriodAggregate>, AnalyticsError> {
        let mut groups: BTreeMap<(Period, Period), Accumulator<'_>> = BTreeMap::new();

        for (index, record) in records.iter().enumerate() {
            let placed_at = validated_timestamp(index, record)?;
            let cohort_group = cohorts
                .get(&record.user_id)
                .ok_or_else(|| AnalyticsError::UnassignedUser(record.user_id.clone()))?;
            let order_period = self.period_of(placed_at);

            groups
                .entry((cohort_group, order_period))
                .or_default()
                .absorb(record)
                .ok_or_else(|| AnalyticsError::ChargeOverflow {
                    cohort_group: cohort_group.to_string(),
                    order_period: order_period.to_string(),
                })?;
        }

        let aggregates: Vec<PeriodAggregate> = groups
            .into_iter()
            .map(|((cohort_group, order_period), acc)| acc.finish(cohort_group, order_period))
            .collect();

        tracing::debug!(groups = aggregates.len(), "Aggregated cohort periods.");
        Ok(aggregates)
    }

    /// Numbers each cohort's periods according to the configured indexing.
    ///
    /// Calendar distance is measured from the cohort group itself, so a cohort
    /// whose own period is missing gets no period-1 row and is rejected later by
    /// `compute_retention`. An order period before its cohort group fails here.
    pub fn label_cohort_periods(
        &self,
        aggregates: Vec<PeriodAggregate>,
    ) -> Result<Vec<LabeledAggregate>, AnalyticsError> {
        let mut by_cohort: BTreeMap<Period, Vec<PeriodAggregate>> = BTreeMap::new();
        for aggregate in aggregates {
            by_cohort.entry(aggregate.cohort_group).or_default().push(aggregate);
        }

        let mut labeled = Vec::new();
        for (cohort_group, mut rows) in by_cohort {
            rows.sort_by_key(|row| row.order_period);

            for (rank, row) in rows.into_iter().enumerate() {
                let offset = match self.settings.indexing {
                    PeriodIndexing::ObservedActivity => i64::try_from(rank).unwrap_or(i64::MAX),
                    PeriodIndexing::CalendarDistance => row.order_period.periods_since(&cohort_group),
                };
                let cohort_period = offset
                    .checked_add(1)
                    .and_then(|period| u32::try_from(period).ok())
                    .filter(|period| *period >= 1)
                    .ok_or_else(|| AnalyticsError::CohortPeriodOutOfRange {
                        cohort_group: cohort_group.to_string(),
                        order_period: row.order_period.to_string(),
                        offset,
                    })?;
                labeled.push(LabeledAggregate::from_aggregate(row, cohort_period));
            }
        }

        Ok(labeled)
    }

    /// Divides every cell's `total_users` by its cohort's period-1 `total_users`.
    pub fn compute_retention(
        &self,
        labeled: &[LabeledAggregate],
    ) -> Result<RetentionMatrix, AnalyticsError> {
        let mut users: BTreeMap<Period, BTreeMap<u32, usize>> = BTreeMap::new();
        for row in labeled {
            let previous = users
                .entry(row.cohort_group)
                .or_default()
                .insert(row.cohort_period, row.total_users);
            if previous.is_some() {
                return Err(AnalyticsError::DuplicateCohortPeriod {
                    cohort_group: row.cohort_group.to_string(),
                    cohort_period: row.cohort_period,
                });
            }
        }

        let mut cohort_sizes = BTreeMap::new();
        let mut ratios = CohortTable::new();

        for (cohort_group, periods) in users {
            let base_size = periods
                .get(&1)
                .copied()
                .filter(|size| *size > 0)
                .ok_or_else(|| AnalyticsError::EmptyCohort(cohort_group.to_string()))?;
            let base = Decimal::from(base_size);

            for (cohort_period, total_users) in periods {
                ratios.insert(cohort_group, cohort_period, Decimal::from(total_users) / base);
            }
            cohort_sizes.insert(cohort_group, base_size);
        }

        Ok(RetentionMatrix::new(cohort_sizes, ratios))
    }

    pub(crate) fn period_of(&self, timestamp: NaiveDateTime) -> Period {
        self.settings.granularity.truncate(timestamp.date())
    }
}

pub(crate) fn validated_timestamp(
    index: usize,
    record: &TransactionRecord,
) -> Result<NaiveDateTime, AnalyticsError> {
    record.validate().map_err(|err| AnalyticsError::InvalidRecord {
        index,
        reason: err.to_string(),
    })
}

/// Running distinct-user, distinct-order and charge totals for one group.
#[derive(Debug, Default)]
struct Accumulator<'a> {
    users: HashSet<&'a str>,
    orders: HashSet<&'a str>,
    charges: Decimal,
}

impl<'a> Accumulator<'a> {
    /// Adds one record. Returns `None` if the charge total would overflow.
    fn absorb(&mut self, record: &'a TransactionRecord) -> Option<()> {
        self.charges = self.charges.checked_add(record.total_charge)?;
        self.users.insert(record.user_id.as_str());
        self.orders.insert(record.order_id.as_str());
        Some(())
    }

    fn finish(self, cohort_group: Period, order_period: Period) -> PeriodAggregate {
        PeriodAggregate {
            cohort_group,
            order_period,
            total_users: self.users.len(),
            total_orders: self.orders.len(),
            total_charges: self.charges,
        }
    }
}
