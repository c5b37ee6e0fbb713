use crate::engine::{CohortRetentionEngine, validated_timestamp};
use crate::error::AnalyticsError;
use crate::report::{CohortAssignments, LabeledAggregate};
use core_types::{CohortMetric, Period, TransactionRecord};
use rust_decimal::Decimal;
use std::collections::HashSet;

impl CohortRetentionEngine {
    /// Recomputes one aggregate row straight from the raw records and checks
    /// that the pipeline produced the same numbers.
    ///
    /// Charges are compared after rounding to cents. Returns the verified row.
    pub fn verify_aggregate(
        &self,
        records: &[TransactionRecord],
        cohorts: &CohortAssignments,
        labeled: &[LabeledAggregate],
        cohort_group: Period,
        order_period: Period,
    ) -> Result<LabeledAggregate, AnalyticsError> {
        let row = labeled
            .iter()
            .find(|row| row.cohort_group == cohort_group && row.order_period == order_period)
            .ok_or_else(|| AnalyticsError::MissingAggregate {
                cohort_group: cohort_group.to_string(),
                order_period: order_period.to_string(),
            })?;

        // Filter first, then count, independently of the aggregation stage.
        let mut subset = Vec::new();
        for (index, record) in records.iter().enumerate() {
            let placed_at = validated_timestamp(index, record)?;
            if cohorts.get(&record.user_id) == Some(cohort_group)
                && self.period_of(placed_at) == order_period
            {
                subset.push(record);
            }
        }

        let expected_users = subset
            .iter()
            .map(|record| record.user_id.as_str())
            .collect::<HashSet<_>>()
            .len();
        let expected_orders = subset
            .iter()
            .map(|record| record.order_id.as_str())
            .collect::<HashSet<_>>()
            .len();
        let expected_charges = subset
            .iter()
            .try_fold(Decimal::ZERO, |sum, record| sum.checked_add(record.total_charge))
            .ok_or_else(|| AnalyticsError::ChargeOverflow {
                cohort_group: cohort_group.to_string(),
                order_period: order_period.to_string(),
            })?;

        let mismatch = |metric: CohortMetric, expected: String, actual: String| {
            AnalyticsError::AggregateMismatch {
                cohort_group: cohort_group.to_string(),
                order_period: order_period.to_string(),
                metric,
                expected,
                actual,
            }
        };

        if expected_users != row.total_users {
            return Err(mismatch(
                CohortMetric::TotalUsers,
                expected_users.to_string(),
                row.total_users.to_string(),
            ));
        }
        if expected_orders != row.total_orders {
            return Err(mismatch(
                CohortMetric::TotalOrders,
                expected_orders.to_string(),
                row.total_orders.to_string(),
            ));
        }
        if expected_charges.round_dp(2) != row.total_charges.round_dp(2) {
            return Err(mismatch(
                CohortMetric::TotalCharges,
                expected_charges.round_dp(2).to_string(),
                row.total_charges.round_dp(2).to_string(),
            ));
        }

        tracing::debug!(%cohort_group, %order_period, "Aggregate verified against raw records.");
        Ok(row.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use core_types::PeriodGranularity;
    use rust_decimal_macros::dec;

    fn month(y: i32, m: u32) -> Period {
        PeriodGranularity::Month.truncate(NaiveDate::from_ymd_opt(y, m, 1).unwrap())
    }

    fn records() -> Vec<TransactionRecord> {
        vec![
            TransactionRecord::new("U1", "O1", "2009-01-15", dec!(10.10)),
            TransactionRecord::new("U1", "O2", "2009-03-02", dec!(20.20)),
            TransactionRecord::new("U2", "O3", "2009-01-20", dec!(5.05)),
            TransactionRecord::new("U3", "O4", "2009-03-09", dec!(7.00)),
        ]
    }

    #[test]
    fn pipeline_output_verifies() {
        let engine = CohortRetentionEngine::default();
        let records = records();
        let report = engine.run(&records).unwrap();

        for row in &report.aggregates {
            let verified = engine
                .verify_aggregate(
                    &records,
                    &report.cohorts,
                    &report.aggregates,
                    row.cohort_group,
                    row.order_period,
                )
                .unwrap();
            assert_eq!(&verified, row);
        }
    }

    #[test]
    fn tampered_row_is_caught() {
        let engine = CohortRetentionEngine::default();
        let records = records();
        let mut report = engine.run(&records).unwrap();
        report.aggregates[0].total_charges += dec!(0.01);

        let err = engine
            .verify_aggregate(
                &records,
                &report.cohorts,
                &report.aggregates,
                month(2009, 1),
                month(2009, 1),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            AnalyticsError::AggregateMismatch {
                metric: CohortMetric::TotalCharges,
                ..
            }
        ));
    }

    #[test]
    fn tampered_counts_are_caught() {
        let engine = CohortRetentionEngine::default();
        let records = records();
        let mut report = engine.run(&records).unwrap();
        report.aggregates[0].total_orders += 1;

        let err = engine
            .verify_aggregate(
                &records,
                &report.cohorts,
                &report.aggregates,
                month(2009, 1),
                month(2009, 1),
            )
            .unwrap_err();
        assert_eq!(
            err,
            AnalyticsError::AggregateMismatch {
                cohort_group: "2009-01".to_string(),
                order_period: "2009-01".to_string(),
                metric: CohortMetric::TotalOrders,
                expected: "2".to_string(),
                actual: "3".to_string(),
            }
        );
    }

    #[test]
    fn unobserved_pair_is_missing() {
        let engine = CohortRetentionEngine::default();
        let records = records();
        let report = engine.run(&records).unwrap();

        let err = engine
            .verify_aggregate(
                &records,
                &report.cohorts,
                &report.aggregates,
                month(2009, 1),
                month(2009, 2),
            )
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::MissingAggregate { .. }));
    }
}
