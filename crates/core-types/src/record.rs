use crate::error::CoreError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// One purchase event, as handed over by whatever loaded the dataset.
///
/// `order_date` stays in its delivered text form so that a missing or
/// malformed timestamp can be reported against the record that carried it.
/// The field aliases accept the column names of the Relay Foods purchase
/// export (`UserId`, `OrderId`, `OrderDate`, `TotalCharges`). Ids may be
/// strings or integers; integers are kept as their decimal text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    #[serde(alias = "UserId", deserialize_with = "identifier")]
    pub user_id: String,
    #[serde(alias = "OrderId", deserialize_with = "identifier")]
    pub order_id: String,
    #[serde(default, alias = "OrderDate")]
    pub order_date: Option<String>,
    #[serde(alias = "TotalCharges")]
    pub total_charge: Decimal,
}

impl TransactionRecord {
    pub fn new(
        user_id: impl Into<String>,
        order_id: impl Into<String>,
        order_date: impl Into<String>,
        total_charge: Decimal,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            order_id: order_id.into(),
            order_date: Some(order_date.into()),
            total_charge,
        }
    }

    /// Checks the record's required fields and returns its parsed order time.
    pub fn validate(&self) -> Result<NaiveDateTime, CoreError> {
        if self.user_id.trim().is_empty() {
            return Err(CoreError::InvalidInput(
                "user_id".to_string(),
                "missing".to_string(),
            ));
        }
        if self.order_id.trim().is_empty() {
            return Err(CoreError::InvalidInput(
                "order_id".to_string(),
                "missing".to_string(),
            ));
        }
        if self.total_charge < Decimal::ZERO {
            return Err(CoreError::InvalidInput(
                "total_charge".to_string(),
                format!("negative amount {}", self.total_charge),
            ));
        }
        self.order_timestamp()
    }

    /// Parses `order_date`, failing if it is absent or unreadable.
    pub fn order_timestamp(&self) -> Result<NaiveDateTime, CoreError> {
        match self.order_date.as_deref() {
            Some(raw) => parse_timestamp(raw),
            None => Err(CoreError::InvalidInput(
                "order_date".to_string(),
                "missing".to_string(),
            )),
        }
    }
}

/// Accepts an id given either as a string or as an integer.
fn identifier<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Signed(i64),
        Unsigned(u64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text,
        RawId::Signed(number) => number.to_string(),
        RawId::Unsigned(number) => number.to_string(),
    })
}

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parses an order timestamp.
///
/// Accepts RFC 3339 (the wall-clock time is kept, the offset dropped),
/// `YYYY-MM-DD[T| ]HH:MM:SS[.fff]` and bare `YYYY-MM-DD` dates.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, CoreError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CoreError::InvalidInput(
            "order_date".to_string(),
            "missing".to_string(),
        ));
    }

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(timestamp.naive_local());
    }

    for format in DATETIME_FORMATS {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(timestamp);
        }
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map(|date| date.and_time(NaiveTime::MIN))
        .map_err(|_| CoreError::InvalidDate(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_the_supported_timestamp_forms() {
        let expected = NaiveDate::from_ymd_opt(2009, 1, 15).unwrap();
        for raw in [
            "2009-01-15",
            "2009-01-15 08:30:00",
            "2009-01-15T08:30:00.250",
            "2009-01-15T08:30:00-05:00",
        ] {
            assert_eq!(parse_timestamp(raw).unwrap().date(), expected, "{raw}");
        }
    }

    #[test]
    fn offset_timestamps_keep_their_local_date() {
        let parsed = parse_timestamp("2009-01-31T23:30:00-05:00").unwrap();
        assert_eq!(parsed.date(), NaiveDate::from_ymd_opt(2009, 1, 31).unwrap());
    }

    #[test]
    fn rejects_garbage_dates() {
        assert_eq!(
            parse_timestamp("15/01/2009"),
            Err(CoreError::InvalidDate("15/01/2009".to_string()))
        );
    }

    #[test]
    fn missing_order_date_fails_validation() {
        let mut record = TransactionRecord::new("U1", "O1", "2009-01-15", dec!(10));
        record.order_date = None;
        let err = record.validate().unwrap_err();
        assert!(err.to_string().contains("order_date"));
    }

    #[test]
    fn blank_user_and_negative_charge_fail_validation() {
        let blank = TransactionRecord::new("  ", "O1", "2009-01-15", dec!(10));
        assert!(blank.validate().unwrap_err().to_string().contains("user_id"));

        let refund = TransactionRecord::new("U1", "O1", "2009-01-15", dec!(-3.50));
        assert!(refund.validate().unwrap_err().to_string().contains("total_charge"));
    }

    #[test]
    fn deserializes_export_column_names() {
        let json = r#"{"UserId":47,"OrderId":1001,"OrderDate":"2009-01-02 00:00:00","TotalCharges":114.58}"#;
        let record: TransactionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.user_id, "47");
        assert_eq!(record.order_id, "1001");
        assert_eq!(record.total_charge, dec!(114.58));
        assert!(record.validate().is_ok());
    }

    #[test]
    fn string_ids_still_deserialize() {
        let json = r#"[{"user_id":"u-47","order_id":"A1","order_date":"2009-01-02","total_charge":"5.10"}]"#;
        let records: Vec<TransactionRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(records[0].user_id, "u-47");
        assert_eq!(records[0].total_charge, dec!(5.10));
    }

    #[test]
    fn fractional_ids_are_rejected() {
        let json = r#"{"user_id":4.5,"order_id":"A1","order_date":"2009-01-02","total_charge":1}"#;
        assert!(serde_json::from_str::<TransactionRecord>(json).is_err());
    }
}
