//! Human-facing order numbers.
//!
//! Order numbers are assigned by the database at insert time from a monotonic
//! sequence, formatted as `ORD-<YYYYMMDD>-<6-digit zero-padded sequence>`.
//! Clients never generate them for real orders; this type exists to validate
//! and display them (and for the in-memory backend to mimic the trigger).

use core::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an [`OrderNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderNumberError {
    /// Wrong prefix, separators or length.
    #[error("order number must look like ORD-YYYYMMDD-NNNNNN")]
    Malformed,
    /// The date segment is not a calendar date.
    #[error("order number has an invalid date segment")]
    InvalidDate,
}

/// An order number such as `ORD-20260119-000042`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderNumber(String);

impl OrderNumber {
    const PREFIX: &'static str = "ORD";
    const SEQUENCE_WIDTH: usize = 6;

    /// Format an order number from a date and a sequence value.
    ///
    /// The sequence wraps at one million so the segment stays six digits,
    /// the same as the database trigger.
    #[must_use]
    pub fn format(date: NaiveDate, sequence: u64) -> Self {
        Self(format!(
            "{}-{}-{:0width$}",
            Self::PREFIX,
            date.format("%Y%m%d"),
            sequence % 1_000_000,
            width = Self::SEQUENCE_WIDTH
        ))
    }

    /// Parse and validate an order number.
    ///
    /// # Errors
    ///
    /// Returns `OrderNumberError::Malformed` if the shape is wrong and
    /// `OrderNumberError::InvalidDate` if the date segment is not a real date.
    pub fn parse(s: &str) -> Result<Self, OrderNumberError> {
        let mut parts = s.split('-');
        let (Some(prefix), Some(date), Some(seq), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(OrderNumberError::Malformed);
        };

        if prefix != Self::PREFIX
            || date.len() != 8
            || seq.len() != Self::SEQUENCE_WIDTH
            || !date.bytes().all(|b| b.is_ascii_digit())
            || !seq.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(OrderNumberError::Malformed);
        }

        NaiveDate::parse_from_str(date, "%Y%m%d").map_err(|_| OrderNumberError::InvalidDate)?;

        Ok(Self(s.to_owned()))
    }

    /// The order number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The date segment.
    #[must_use]
    pub fn date(&self) -> Option<NaiveDate> {
        self.0
            .get(4..12)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y%m%d").ok())
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for OrderNumber {
    type Error = OrderNumberError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<OrderNumber> for String {
    fn from(number: OrderNumber) -> Self {
        number.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_format_pads_sequence() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 19).unwrap();
        assert_eq!(
            OrderNumber::format(date, 42).as_str(),
            "ORD-20260119-000042"
        );
    }

    #[test]
    fn test_parse_valid() {
        let number = OrderNumber::parse("ORD-20251231-123456").unwrap();
        assert_eq!(number.date(), NaiveDate::from_ymd_opt(2025, 12, 31));
    }

    #[test]
    fn test_parse_rejects_bad_shapes() {
        for bad in [
            "",
            "ORD-2025123-123456",
            "ORD-20251231-12345",
            "INV-20251231-123456",
            "ORD-20251231-123456-1",
            "ORD-2025I231-123456",
        ] {
            assert_eq!(
                OrderNumber::parse(bad),
                Err(OrderNumberError::Malformed),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_parse_rejects_impossible_date() {
        assert_eq!(
            OrderNumber::parse("ORD-20250231-000001"),
            Err(OrderNumberError::InvalidDate)
        );
    }
}
