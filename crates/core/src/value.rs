use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::quantity::{Quantity, QuantityError};
use crate::ValueKind;

#[derive(Debug, thiserror::Error)]
pub enum ValueError {
    #[error("invalid timestamp {value:?} (expected RFC 3339): {source}")]
    Timestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    #[error(transparent)]
    Quantity(#[from] QuantityError),
}

/// Tagged property value. Values of different tags never order or match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ComparableValue {
    String(String),
    Timestamp(DateTime<Utc>),
    Quantity(Quantity),
}

impl ComparableValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            ComparableValue::String(_) => ValueKind::String,
            ComparableValue::Timestamp(_) => ValueKind::Timestamp,
            ComparableValue::Quantity(_) => ValueKind::Quantity,
        }
    }

    /// `None` when the tags differ.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (ComparableValue::String(a), ComparableValue::String(b)) => Some(a.cmp(b)),
            (ComparableValue::Timestamp(a), ComparableValue::Timestamp(b)) => Some(a.cmp(b)),
            (ComparableValue::Quantity(a), ComparableValue::Quantity(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Substring test for strings, equality for the other tags.
    pub fn contains(&self, needle: &Self) -> bool {
        match (self, needle) {
            (ComparableValue::String(hay), ComparableValue::String(n)) => hay.contains(n.as_str()),
            _ => self.compare(needle) == Some(Ordering::Equal),
        }
    }

    /// Parse a caller-supplied match value into the given tag.
    pub fn parse(kind: ValueKind, raw: &str) -> Result<Self, ValueError> {
        match kind {
            ValueKind::String => Ok(ComparableValue::String(raw.to_string())),
            ValueKind::Timestamp => DateTime::parse_from_rfc3339(raw.trim())
                .map(|dt| ComparableValue::Timestamp(dt.with_timezone(&Utc)))
                .map_err(|source| ValueError::Timestamp { value: raw.to_string(), source }),
            ValueKind::Quantity => Ok(ComparableValue::Quantity(Quantity::parse(raw)?)),
        }
    }
}

impl PartialOrd for ComparableValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { self.compare(other) }
}

impl fmt::Display for ComparableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparableValue::String(s) => f.write_str(s),
            ComparableValue::Timestamp(t) => f.write_str(&t.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ComparableValue::Quantity(q) => fmt::Display::fmt(q, f),
        }
    }
}

impl From<&str> for ComparableValue {
    fn from(s: &str) -> Self { ComparableValue::String(s.to_string()) }
}

impl From<String> for ComparableValue {
    fn from(s: String) -> Self { ComparableValue::String(s) }
}

impl From<DateTime<Utc>> for ComparableValue {
    fn from(t: DateTime<Utc>) -> Self { ComparableValue::Timestamp(t) }
}

impl From<Quantity> for ComparableValue {
    fn from(q: Quantity) -> Self { ComparableValue::Quantity(q) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> ComparableValue { ComparableValue::Timestamp(Utc.timestamp_opt(secs, 0).unwrap()) }

    #[test]
    fn mixed_tags_are_incomparable_and_never_match() {
        let s = ComparableValue::from("1");
        let n = ComparableValue::Quantity(Quantity::from(1i64));
        assert_eq!(s.compare(&n), None);
        assert!(!s.contains(&n));
        assert!(!n.contains(&s));
        assert!(s.partial_cmp(&n).is_none());
    }

    #[test]
    fn strings_match_by_substring() {
        let v = ComparableValue::from("FailedScheduling");
        assert!(v.contains(&"Failed".into()));
        assert!(v.contains(&"Scheduling".into()));
        assert!(!v.contains(&"failed".into()));
    }

    #[test]
    fn quantities_and_timestamps_match_by_equality() {
        let q = ComparableValue::Quantity(Quantity::parse("1000m").unwrap());
        assert!(q.contains(&ComparableValue::Quantity(Quantity::parse("1").unwrap())));
        assert!(!q.contains(&ComparableValue::Quantity(Quantity::parse("10").unwrap())));
        assert!(ts(5).contains(&ts(5)));
        assert!(!ts(5).contains(&ts(6)));
    }

    #[test]
    fn timestamps_order_by_instant_not_text() {
        let a = ComparableValue::parse(ValueKind::Timestamp, "2024-01-01T10:00:00+02:00").unwrap();
        let b = ComparableValue::parse(ValueKind::Timestamp, "2024-01-01T09:00:00Z").unwrap();
        assert_eq!(a.compare(&b), Some(Ordering::Less));
    }

    #[test]
    fn parse_reports_bad_input() {
        assert!(matches!(ComparableValue::parse(ValueKind::Timestamp, "yesterday"), Err(ValueError::Timestamp { .. })));
        assert!(matches!(ComparableValue::parse(ValueKind::Quantity, "lots"), Err(ValueError::Quantity(_))));
        assert_eq!(ComparableValue::parse(ValueKind::String, "x").unwrap(), "x".into());
    }
}
