use crate::enums::PeriodGranularity;
use crate::error::CoreError;
use chrono::{Datelike, Days, Months, NaiveDate, Weekday};
use serde::{Serialize, Serializer};
use std::fmt;

/// A calendar bucket: a granularity plus the first day it covers.
///
/// Periods of the same granularity order chronologically. They serialize as
/// their display label (`2009-01`, `2009-Q1`, ...) so they can be used as
/// map keys in JSON output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Period {
    granularity: PeriodGranularity,
    start: NaiveDate,
}

impl PeriodGranularity {
    /// Truncates a date to the period containing it.
    pub fn truncate(&self, date: NaiveDate) -> Period {
        let start = match self {
            PeriodGranularity::Day => date,
            PeriodGranularity::Week => {
                date - Days::new(u64::from(date.weekday().num_days_from_monday()))
            }
            PeriodGranularity::Month => first_of_month(date),
            PeriodGranularity::Quarter => {
                first_of_month(date) - Months::new(date.month0() % 3)
            }
            PeriodGranularity::Year => date - Days::new(u64::from(date.ordinal0())),
        };

        Period {
            granularity: *self,
            start,
        }
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.day0()))
}

impl Period {
    pub fn granularity(&self) -> PeriodGranularity {
        self.granularity
    }

    /// The first calendar day covered by this period.
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// A monotone integer index for the period. Consecutive periods of the
    /// same granularity differ by exactly one.
    pub fn ordinal(&self) -> i64 {
        let date = self.start;
        match self.granularity {
            PeriodGranularity::Day => i64::from(date.num_days_from_ce()),
            // 0001-01-01 is a Monday, so week starts sit on multiples of 7 from day 1.
            PeriodGranularity::Week => (i64::from(date.num_days_from_ce()) - 1).div_euclid(7),
            PeriodGranularity::Month => i64::from(date.year()) * 12 + i64::from(date.month0()),
            PeriodGranularity::Quarter => {
                i64::from(date.year()) * 4 + i64::from(date.month0() / 3)
            }
            PeriodGranularity::Year => i64::from(date.year()),
        }
    }

    /// Number of whole periods from `earlier` to `self`.
    pub fn periods_since(&self, earlier: &Period) -> i64 {
        self.ordinal() - earlier.ordinal()
    }

    /// Parses a period label in the format produced by `Display`.
    pub fn parse(granularity: PeriodGranularity, label: &str) -> Result<Self, CoreError> {
        let label = label.trim();
        let invalid = || CoreError::InvalidDate(label.to_string());

        let date = match granularity {
            PeriodGranularity::Day => {
                NaiveDate::parse_from_str(label, "%Y-%m-%d").map_err(|_| invalid())?
            }
            PeriodGranularity::Month => {
                NaiveDate::parse_from_str(&format!("{label}-01"), "%Y-%m-%d")
                    .map_err(|_| invalid())?
            }
            PeriodGranularity::Week => {
                let (year, week) = label.split_once("-W").ok_or_else(invalid)?;
                let year = year.parse::<i32>().map_err(|_| invalid())?;
                let week = week.parse::<u32>().map_err(|_| invalid())?;
                NaiveDate::from_isoywd_opt(year, week, Weekday::Mon).ok_or_else(invalid)?
            }
            PeriodGranularity::Quarter => {
                let (year, quarter) = label.split_once("-Q").ok_or_else(invalid)?;
                let year = year.parse::<i32>().map_err(|_| invalid())?;
                let quarter = quarter.parse::<u32>().map_err(|_| invalid())?;
                if !(1..=4).contains(&quarter) {
                    return Err(invalid());
                }
                NaiveDate::from_ymd_opt(year, (quarter - 1) * 3 + 1, 1).ok_or_else(invalid)?
            }
            PeriodGranularity::Year => {
                let year = label.parse::<i32>().map_err(|_| invalid())?;
                NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(invalid)?
            }
        };

        Ok(granularity.truncate(date))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let date = self.start;
        match self.granularity {
            PeriodGranularity::Day => write!(f, "{}", date.format("%Y-%m-%d")),
            PeriodGranularity::Week => {
                let week = date.iso_week();
                write!(f, "{}-W{:02}", week.year(), week.week())
            }
            PeriodGranularity::Month => write!(f, "{}", date.format("%Y-%m")),
            PeriodGranularity::Quarter => write!(f, "{}-Q{}", date.year(), date.month0() / 3 + 1),
            PeriodGranularity::Year => write!(f, "{}", date.year()),
        }
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
