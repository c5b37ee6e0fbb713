use analytics::{CohortRetentionEngine, CohortSettings, table::pivot};
use chrono::NaiveDate;
use core_types::{CohortMetric, Period, PeriodGranularity, PeriodIndexing, TransactionRecord};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{BTreeSet, HashSet};

fn month(y: i32, m: u32) -> Period {
    PeriodGranularity::Month.truncate(NaiveDate::from_ymd_opt(y, m, 1).unwrap())
}

/// A small store: three cohorts over half a year, with gaps, repeat buyers
/// and multi-line orders.
fn fixture() -> Vec<TransactionRecord> {
    let rows: [(&str, &str, &str, Decimal); 16] = [
        ("alice", "1001", "2009-01-03", dec!(114.58)),
        ("bob", "1002", "2009-01-09", dec!(21.00)),
        ("carol", "1003", "2009-01-27", dec!(48.10)),
        ("alice", "1004", "2009-02-14", dec!(33.33)),
        ("dave", "1005", "2009-02-02", dec!(60.00)),
        ("dave", "1005", "2009-02-02", dec!(15.00)),
        ("erin", "1006", "2009-02-20", dec!(12.75)),
        ("bob", "1007", "2009-03-01", dec!(19.99)),
        ("alice", "1008", "2009-04-11", dec!(70.00)),
        ("dave", "1009", "2009-04-18", dec!(42.42)),
        ("frank", "1010", "2009-04-30 18:45:00", dec!(8.50)),
        ("carol", "1011", "2009-06-05", dec!(66.60)),
        ("erin", "1012", "2009-06-06", dec!(9.99)),
        ("frank", "1013", "2009-06-07", dec!(30.00)),
        ("alice", "1014", "2009-06-30T23:59:59", dec!(5.00)),
        ("bob", "1015", "2009-06-15", dec!(11.11)),
    ];

    rows.into_iter()
        .map(|(user, order, date, charge)| TransactionRecord::new(user, order, date, charge))
        .collect()
}

#[test]
fn running_twice_gives_identical_output() {
    let engine = CohortRetentionEngine::default();
    let records = fixture();
    assert_eq!(engine.run(&records).unwrap(), engine.run(&records).unwrap());
}

#[test]
fn first_period_ratio_is_exactly_one() {
    for indexing in [PeriodIndexing::ObservedActivity, PeriodIndexing::CalendarDistance] {
        let engine = CohortRetentionEngine::new(CohortSettings {
            indexing,
            ..CohortSettings::default()
        });
        let report = engine.run(&fixture()).unwrap();

        for cohort in report.retention.cohorts() {
            assert_eq!(report.retention.ratio(cohort, 1), Some(Decimal::ONE));
        }
        assert!(report.retention.is_consistent());
    }
}

#[test]
fn order_counts_are_conserved() {
    let records = fixture();
    let report = CohortRetentionEngine::default().run(&records).unwrap();

    let distinct_orders: HashSet<&str> = records.iter().map(|r| r.order_id.as_str()).collect();
    let counted: usize = report.aggregates.iter().map(|row| row.total_orders).sum();
    assert_eq!(counted, distinct_orders.len());

    let charged: Decimal = report.aggregates.iter().map(|row| row.total_charges).sum();
    let raw: Decimal = records.iter().map(|r| r.total_charge).sum();
    assert_eq!(charged, raw);
}

#[test]
fn cohorts_are_first_order_months() {
    let report = CohortRetentionEngine::default().run(&fixture()).unwrap();
    let cohorts = &report.cohorts;

    assert_eq!(cohorts.get("alice"), Some(month(2009, 1)));
    assert_eq!(cohorts.get("bob"), Some(month(2009, 1)));
    assert_eq!(cohorts.get("carol"), Some(month(2009, 1)));
    assert_eq!(cohorts.get("dave"), Some(month(2009, 2)));
    assert_eq!(cohorts.get("erin"), Some(month(2009, 2)));
    assert_eq!(cohorts.get("frank"), Some(month(2009, 4)));
    assert_eq!(cohorts.len(), 6);

    let sizes = cohorts.users_per_cohort();
    assert_eq!(sizes.get(&month(2009, 1)), Some(&3));
    assert_eq!(report.retention.cohort_size(&month(2009, 1)), Some(3));
}

#[test]
fn only_observed_pairs_are_materialized() {
    let records = fixture();
    let report = CohortRetentionEngine::default().run(&records).unwrap();

    let observed: BTreeSet<(Period, Period)> = records
        .iter()
        .map(|r| {
            let date = r.order_timestamp().unwrap().date();
            (report.cohorts.get(&r.user_id).unwrap(), PeriodGranularity::Month.truncate(date))
        })
        .collect();
    let produced: BTreeSet<(Period, Period)> = report
        .aggregates
        .iter()
        .map(|row| (row.cohort_group, row.order_period))
        .collect();

    assert_eq!(produced, observed);
    assert!(report.aggregates.iter().all(|row| row.total_users > 0));
    // The January cohort bought nothing in May.
    assert!(!produced.contains(&(month(2009, 1), month(2009, 5))));
}

#[test]
fn indexing_policies_disagree_after_a_gap() {
    let records = fixture();
    let observed = CohortRetentionEngine::default().run(&records).unwrap();
    let calendar = CohortRetentionEngine::new(CohortSettings {
        indexing: PeriodIndexing::CalendarDistance,
        ..CohortSettings::default()
    })
    .run(&records)
    .unwrap();

    let jan = month(2009, 1);
    // January cohort is active in Jan, Feb, Mar, Apr and Jun.
    let observed_users = pivot(&observed.aggregates, CohortMetric::TotalUsers);
    let calendar_users = pivot(&calendar.aggregates, CohortMetric::TotalUsers);
    assert_eq!(observed_users.row(&jan).unwrap().len(), 5);
    assert_eq!(observed_users.max_cohort_period(), Some(5));
    assert_eq!(calendar_users.get(&jan, 6), Some(&dec!(3)));
    assert_eq!(calendar_users.get(&jan, 5), None);

    assert_eq!(observed.retention.ratio(&jan, 5), Some(Decimal::ONE));
    assert_eq!(calendar.retention.ratio(&jan, 6), Some(Decimal::ONE));
}

#[test]
fn selection_narrows_the_retention_view() {
    let report = CohortRetentionEngine::default().run(&fixture()).unwrap();
    let view = report.retention.select(&[month(2009, 2)], Some(2));

    assert_eq!(view.cohorts().count(), 1);
    assert_eq!(view.cohort_size(&month(2009, 2)), Some(2));
    assert_eq!(view.cohort_size(&month(2009, 1)), None);
    assert_eq!(view.max_cohort_period(), Some(2));
}
