//! Field coercion for RowPro CSV records
//!
//! Both sections of the export are positional: each record is a list of
//! comma-separated values whose meaning is fixed by its index. The tables
//! below give, per index, the field it maps to and how its text is converted.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};

/// Header line that introduces the summary record (prefix match)
pub const SUMMARY_HEADER: &str = "Date,TotalTime,TotalDistance,";

/// Header line that introduces the sample series (prefix match)
pub const SAMPLES_HEADER: &str = "Time,Distance,Pace,Watts,Cals,SPM,HR,DutyCycle,Rowfile_Id";

/// How a raw field is converted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Date and time of day
    Timestamp,
    /// Integer milliseconds, converted to fractional seconds
    Millis,
    /// Finite decimal number
    Float,
    /// Signed integer
    Int,
    /// Small unsigned integer (heart rate, stroke rate)
    Count,
    /// `True` or anything else
    Bool,
}

/// A converted field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Timestamp(DateTime<FixedOffset>),
    Float(f64),
    Int(i64),
    Count(u16),
    Bool(bool),
    Text(String),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_count(&self) -> Option<u16> {
        match self {
            FieldValue::Count(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            FieldValue::Timestamp(v) => Some(*v),
            _ => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            FieldValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

/// Outcome of coercing one raw field
#[derive(Debug, Clone, PartialEq)]
pub enum Coerced {
    /// Field missing or empty
    Absent,
    Value(FieldValue),
    /// Text present but not convertible
    Invalid,
}

/// One positional column: where it goes and how to read it
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec<K> {
    pub key: K,
    pub name: &'static str,
    /// `None` keeps the raw text
    pub kind: Option<FieldKind>,
}

const fn field<K>(key: K, name: &'static str, kind: Option<FieldKind>) -> FieldSpec<K> {
    FieldSpec { key, name, kind }
}

/// Columns of the summary record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryField {
    Date,
    TotalTime,
    TotalDistance,
    AvgPace,
    Unit,
    Origin,
    TotalCalories,
    DutyCycle,
    SessionType,
    Format,
    Slide,
    SessionId,
    RowfileId,
    AvgHeartRate,
}

/// Columns of a sample record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleField {
    Time,
    Distance,
    Pace,
    Watts,
    Calories,
    StrokeRate,
    HeartRate,
    DutyCycle,
    RowfileId,
}

pub const SUMMARY_FIELDS: [FieldSpec<SummaryField>; 14] = [
    field(SummaryField::Date, "date", Some(FieldKind::Timestamp)),
    field(SummaryField::TotalTime, "total_time", Some(FieldKind::Millis)),
    field(SummaryField::TotalDistance, "total_distance", Some(FieldKind::Float)),
    field(SummaryField::AvgPace, "avg_pace", Some(FieldKind::Float)),
    field(SummaryField::Unit, "unit", Some(FieldKind::Int)),
    field(SummaryField::Origin, "origin", Some(FieldKind::Int)),
    field(SummaryField::TotalCalories, "total_cals", Some(FieldKind::Float)),
    field(SummaryField::DutyCycle, "duty_cycle", Some(FieldKind::Float)),
    field(SummaryField::SessionType, "type", Some(FieldKind::Int)),
    field(SummaryField::Format, "format", None),
    field(SummaryField::Slide, "slide", Some(FieldKind::Bool)),
    field(SummaryField::SessionId, "session_id", Some(FieldKind::Float)),
    field(SummaryField::RowfileId, "rowfile_id", None),
    field(SummaryField::AvgHeartRate, "avg_hr", Some(FieldKind::Count)),
];

pub const SAMPLE_FIELDS: [FieldSpec<SampleField>; 9] = [
    field(SampleField::Time, "time", Some(FieldKind::Millis)),
    field(SampleField::Distance, "distance", Some(FieldKind::Float)),
    field(SampleField::Pace, "pace", Some(FieldKind::Float)),
    field(SampleField::Watts, "watts", Some(FieldKind::Float)),
    field(SampleField::Calories, "cals", Some(FieldKind::Float)),
    field(SampleField::StrokeRate, "spm", Some(FieldKind::Count)),
    field(SampleField::HeartRate, "hr", Some(FieldKind::Count)),
    field(SampleField::DutyCycle, "duty_cycle", Some(FieldKind::Float)),
    field(SampleField::RowfileId, "rowfile_id", None),
];

/// Naive timestamp layouts seen in exports, tried in order
const NAIVE_DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Converts raw field text into typed values
#[derive(Debug, Clone, Copy)]
pub struct FieldCoercer {
    /// Offset assumed for timestamps that carry none
    default_offset: FixedOffset,
}

impl Default for FieldCoercer {
    fn default() -> Self {
        Self::new(utc())
    }
}

impl FieldCoercer {
    pub fn new(default_offset: FixedOffset) -> Self {
        Self { default_offset }
    }

    /// Coerce the raw text of one column
    pub fn coerce(&self, kind: Option<FieldKind>, raw: Option<&str>) -> Coerced {
        let text = match raw.map(str::trim) {
            Some(text) if !text.is_empty() => text,
            _ => return Coerced::Absent,
        };

        let Some(kind) = kind else {
            return Coerced::Value(FieldValue::Text(text.to_string()));
        };

        let value = match kind {
            FieldKind::Timestamp => self.parse_timestamp(text).map(FieldValue::Timestamp),
            FieldKind::Millis => millis_to_seconds(text).map(FieldValue::Float),
            FieldKind::Float => parse_finite(text).map(FieldValue::Float),
            FieldKind::Int => text.parse::<i64>().ok().map(FieldValue::Int),
            FieldKind::Count => text.parse::<u16>().ok().map(FieldValue::Count),
            FieldKind::Bool => Some(FieldValue::Bool(text == "True")),
        };

        value.map_or(Coerced::Invalid, Coerced::Value)
    }

    /// Parse a session date, keeping any offset it carries
    pub fn parse_timestamp(&self, text: &str) -> Option<DateTime<FixedOffset>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Some(dt);
        }
        if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%:z") {
            return Some(dt);
        }

        let naive = NAIVE_DATETIME_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
            .or_else(|| {
                NaiveDate::parse_from_str(text, "%Y-%m-%d")
                    .ok()
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
            })?;

        self.default_offset.from_local_datetime(&naive).single()
    }
}

/// Largest accepted millisecond magnitude: one thousand years
pub const MAX_MILLIS: i64 = 1000 * 366 * 24 * 60 * 60 * 1000;

/// Integer milliseconds to fractional seconds
pub fn millis_to_seconds(text: &str) -> Option<f64> {
    text.parse::<i64>()
        .ok()
        .filter(|ms| (-MAX_MILLIS..=MAX_MILLIS).contains(ms))
        .map(|ms| ms as f64 / 1000.0)
}

fn parse_finite(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub(crate) fn utc() -> FixedOffset {
    Utc.fix()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn coerce(kind: Option<FieldKind>, raw: &str) -> Coerced {
        FieldCoercer::default().coerce(kind, Some(raw))
    }

    #[test]
    fn test_millis_to_seconds() {
        assert_eq!(
            coerce(Some(FieldKind::Millis), "1500"),
            Coerced::Value(FieldValue::Float(1.5))
        );
        assert_eq!(coerce(Some(FieldKind::Millis), "1500.5"), Coerced::Invalid);
    }

    #[test]
    fn test_millis_out_of_range() {
        assert_eq!(coerce(Some(FieldKind::Millis), "9000000000000000000"), Coerced::Invalid);
        assert_eq!(coerce(Some(FieldKind::Millis), "-9223372036854775808"), Coerced::Invalid);
        assert_eq!(
            coerce(Some(FieldKind::Millis), &MAX_MILLIS.to_string()),
            Coerced::Value(FieldValue::Float(MAX_MILLIS as f64 / 1000.0))
        );
    }

    #[test]
    fn test_empty_and_missing_are_absent() {
        let coercer = FieldCoercer::default();
        assert_eq!(coercer.coerce(Some(FieldKind::Float), None), Coerced::Absent);
        assert_eq!(coercer.coerce(Some(FieldKind::Float), Some("  ")), Coerced::Absent);
        assert_eq!(coercer.coerce(None, Some("")), Coerced::Absent);
    }

    #[test]
    fn test_raw_text_kept() {
        assert_eq!(
            coerce(None, " abc-123 "),
            Coerced::Value(FieldValue::Text("abc-123".to_string()))
        );
    }

    #[test]
    fn test_float_rejects_garbage_and_non_finite() {
        assert_eq!(coerce(Some(FieldKind::Float), "2.5"), Coerced::Value(FieldValue::Float(2.5)));
        assert_eq!(coerce(Some(FieldKind::Float), "abc"), Coerced::Invalid);
        assert_eq!(coerce(Some(FieldKind::Float), "NaN"), Coerced::Invalid);
        assert_eq!(coerce(Some(FieldKind::Float), "inf"), Coerced::Invalid);
    }

    #[test]
    fn test_count_range() {
        assert_eq!(coerce(Some(FieldKind::Count), "152"), Coerced::Value(FieldValue::Count(152)));
        assert_eq!(coerce(Some(FieldKind::Count), "-1"), Coerced::Invalid);
        assert_eq!(coerce(Some(FieldKind::Count), "24.0"), Coerced::Invalid);
    }

    #[test]
    fn test_bool_never_fails() {
        assert_eq!(coerce(Some(FieldKind::Bool), "True"), Coerced::Value(FieldValue::Bool(true)));
        assert_eq!(coerce(Some(FieldKind::Bool), "False"), Coerced::Value(FieldValue::Bool(false)));
        assert_eq!(coerce(Some(FieldKind::Bool), "yes"), Coerced::Value(FieldValue::Bool(false)));
    }

    #[test]
    fn test_timestamp_keeps_offset() {
        let dt = FieldCoercer::default()
            .parse_timestamp("2015-03-14T09:15:03+01:00")
            .unwrap();
        assert_eq!(dt.offset().local_minus_utc(), 3600);
        assert_eq!(dt.hour(), 9);
    }

    #[test]
    fn test_naive_timestamp_uses_default_offset() {
        let offset = FixedOffset::east_opt(-5 * 3600).unwrap();
        let coercer = FieldCoercer::new(offset);

        let dt = coercer.parse_timestamp("2015-03-14 09:15:03").unwrap();
        assert_eq!(dt.offset().local_minus_utc(), -5 * 3600);
        assert_eq!((dt.year(), dt.month(), dt.day()), (2015, 3, 14));

        let dt = coercer.parse_timestamp("14/03/2015 09:15").unwrap();
        assert_eq!((dt.day(), dt.minute()), (14, 15));

        assert!(coercer.parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_tables_match_headers() {
        assert_eq!(SAMPLE_FIELDS.len(), SAMPLES_HEADER.split(',').count());
        assert_eq!(SUMMARY_FIELDS[0].key, SummaryField::Date);
        assert_eq!(SAMPLE_FIELDS[8].key, SampleField::RowfileId);
    }
}
