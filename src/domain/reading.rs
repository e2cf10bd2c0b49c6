//! Glucose readings and the normalizer that turns raw caller records into a
//! time-ordered sequence.
//!
//! Raw records arrive with ISO-8601 timestamps as strings. Timestamps carrying an
//! offset are parsed as RFC 3339; naive timestamps (no offset) are taken as UTC,
//! which is what the upstream record store emits.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::DomainError;

/// Naive timestamp layouts accepted after RFC 3339 parsing fails.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// A glucose record as supplied by the caller, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawReading {
    /// Glucose concentration in mg/dL
    pub value: f64,

    /// ISO-8601 timestamp string
    pub timestamp: String,

    /// Time of the last meal (free text, informational only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meal_time: Option<String>,

    /// Time of the last exercise (free text, informational only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exercise_time: Option<String>,

    /// Reported symptoms (free text, informational only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symptoms: Option<String>,
}

impl RawReading {
    /// Create a raw reading with no context fields.
    #[must_use]
    pub fn new(value: f64, timestamp: impl Into<String>) -> Self {
        Self {
            value,
            timestamp: timestamp.into(),
            meal_time: None,
            exercise_time: None,
            symptoms: None,
        }
    }
}

/// A validated glucose reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Glucose concentration in mg/dL (always finite)
    pub value: f64,

    /// Absolute time of the measurement
    pub timestamp: DateTime<Utc>,
}

impl Reading {
    /// Create a validated reading.
    ///
    /// # Errors
    /// Returns `DomainError::MalformedRecord` if the value is not finite.
    pub fn new(value: f64, timestamp: DateTime<Utc>) -> Result<Self, DomainError> {
        if !value.is_finite() {
            return Err(DomainError::MalformedRecord(format!(
                "glucose value {value} is not a finite number"
            )));
        }
        Ok(Self { value, timestamp })
    }
}

impl TryFrom<&RawReading> for Reading {
    type Error = DomainError;

    fn try_from(raw: &RawReading) -> Result<Self, Self::Error> {
        let timestamp = parse_timestamp(&raw.timestamp)?;
        Self::new(raw.value, timestamp)
    }
}

/// Parse an ISO-8601 timestamp into UTC.
///
/// # Errors
/// Returns `DomainError::MalformedRecord` if no accepted layout matches.
pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>, DomainError> {
    let trimmed = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| {
            DomainError::MalformedRecord(format!("unparseable timestamp {trimmed:?}"))
        })
}

/// Validate and sort raw readings by timestamp, ascending.
///
/// The sort is stable, so readings sharing a timestamp keep their input order.
/// A single invalid record fails the whole batch; an empty input yields an
/// empty sequence.
///
/// # Errors
/// Returns `DomainError::MalformedRecord` naming the offending record index.
pub fn normalize(raw: &[RawReading]) -> Result<Vec<Reading>, DomainError> {
    let mut readings = raw
        .iter()
        .enumerate()
        .map(|(idx, r)| {
            Reading::try_from(r).map_err(|e| match e {
                DomainError::MalformedRecord(msg) => {
                    DomainError::MalformedRecord(format!("record #{idx}: {msg}"))
                }
                other => other,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    readings.sort_by_key(|r| r.timestamp);
    Ok(readings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_rfc3339_with_offset() {
        let ts = parse_timestamp("2024-05-01T12:00:00-03:00").expect("Should parse");
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 5, 1, 15, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_naive_as_utc() {
        let ts = parse_timestamp("2024-05-01T12:00:00.250000").expect("Should parse");
        assert_eq!(ts.timestamp_millis() % 1000, 250);
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + chrono::Duration::milliseconds(250));

        let spaced = parse_timestamp("2024-05-01 12:00:00").expect("Should parse");
        assert_eq!(spaced, Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(DomainError::MalformedRecord(_))
        ));
    }

    #[test]
    fn test_normalize_sorts_ascending() {
        let raw = vec![
            RawReading::new(120.0, "2024-05-01T12:10:00Z"),
            RawReading::new(100.0, "2024-05-01T12:00:00Z"),
            RawReading::new(110.0, "2024-05-01T12:05:00Z"),
        ];

        let readings = normalize(&raw).expect("Should normalize");
        let values: Vec<f64> = readings.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![100.0, 110.0, 120.0]);
    }

    #[test]
    fn test_normalize_is_stable_for_equal_timestamps() {
        let raw = vec![
            RawReading::new(1.0, "2024-05-01T12:00:00Z"),
            RawReading::new(2.0, "2024-05-01T12:00:00Z"),
        ];
        let readings = normalize(&raw).expect("Should normalize");
        assert!((readings[0].value - 1.0).abs() < f64::EPSILON);
        assert!((readings[1].value - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_normalize_empty_is_ok() {
        assert!(normalize(&[]).expect("Should normalize").is_empty());
    }

    #[test]
    fn test_normalize_fails_whole_batch() {
        let raw = vec![
            RawReading::new(100.0, "2024-05-01T12:00:00Z"),
            RawReading::new(110.0, "not a time"),
        ];
        let err = normalize(&raw).expect_err("Should fail");
        assert!(err.to_string().contains("record #1"));
    }

    #[test]
    fn test_non_finite_value_rejected() {
        let raw = vec![RawReading::new(f64::NAN, "2024-05-01T12:00:00Z")];
        assert!(matches!(normalize(&raw), Err(DomainError::MalformedRecord(_))));
    }

    #[test]
    fn test_context_fields_are_optional() {
        let json = r#"{"value": 98.5, "timestamp": "2024-05-01T12:00:00", "symptoms": "dizzy"}"#;
        let raw: RawReading = serde_json::from_str(json).expect("Should deserialize");
        assert_eq!(raw.symptoms.as_deref(), Some("dizzy"));
        assert!(raw.meal_time.is_none());
    }
}
