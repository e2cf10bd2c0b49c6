//! Short-horizon trend estimation.

use super::Reading;

/// Rate of change in mg/dL per minute between the two most recent readings.
///
/// Returns 0.0 when fewer than two readings exist or when the last two share a
/// timestamp. `readings` must already be normalized (time-ascending).
#[must_use]
pub fn rate_of_change(readings: &[Reading]) -> f64 {
    let [.., previous, latest] = readings else {
        return 0.0;
    };

    let delta = latest.timestamp - previous.timestamp;
    let minutes = match delta.num_nanoseconds() {
        Some(ns) => ns as f64 / 60_000_000_000.0,
        None => delta.num_milliseconds() as f64 / 60_000.0,
    };
    if minutes == 0.0 {
        return 0.0;
    }

    (latest.value - previous.value) / minutes
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn reading(value: f64, minute: i64) -> Reading {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        Reading::new(value, t0 + Duration::minutes(minute)).expect("valid reading")
    }

    #[test]
    fn test_short_history_is_neutral() {
        assert_eq!(rate_of_change(&[]), 0.0);
        assert_eq!(rate_of_change(&[reading(100.0, 0)]), 0.0);
    }

    #[test]
    fn test_uses_last_two_readings() {
        let readings = [reading(200.0, 0), reading(150.0, 10), reading(140.0, 15)];
        assert!((rate_of_change(&readings) + 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_delta_is_neutral() {
        let readings = [reading(100.0, 5), reading(130.0, 5)];
        assert_eq!(rate_of_change(&readings), 0.0);
    }

    #[test]
    fn test_fractional_minutes() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let readings = [
            Reading::new(100.0, t0).unwrap(),
            Reading::new(101.0, t0 + Duration::seconds(30)).unwrap(),
        ];
        assert!((rate_of_change(&readings) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_sub_millisecond_delta() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let readings = [
            Reading::new(100.0, t0).unwrap(),
            Reading::new(101.0, t0 + Duration::microseconds(500)).unwrap(),
        ];

        let rate = rate_of_change(&readings);
        assert!(rate > 0.0);
        // 1 mg/dL over 0.5 ms
        assert!((rate - 120_000.0).abs() < 1e-6);
    }
}
