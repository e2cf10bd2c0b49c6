//! Lag-feature construction for the forecasting model.
//!
//! A lag row at position `i` holds the values at `i-1, i-2, .., i-L`
//! (`lags[0]` is the most recent) and exists for `L <= i <= n-1`. Training
//! pairs each row with the value at `i`; inference reads the inputs of the last
//! row, `i = n-1`, so a forecast needs at least `L + 1` readings.

use super::Reading;

/// Default number of past values fed to the model.
pub const DEFAULT_LAG_DEPTH: usize = 3;

/// Predictor inputs for a single forecast.
#[derive(Debug, Clone, PartialEq)]
pub struct LagRow {
    /// Past values, most recent first
    pub lags: Vec<f64>,
}

/// A lag row paired with the value that followed it.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingRow {
    pub features: LagRow,
    pub target: f64,
}

fn lag_window(values: &[f64], end: usize, depth: usize) -> LagRow {
    LagRow {
        lags: values[end - depth..end].iter().rev().copied().collect(),
    }
}

/// Build every complete lag row that has a known target.
///
/// Returns an empty set when the history is not longer than `depth`.
#[must_use]
pub fn training_rows(readings: &[Reading], depth: usize) -> Vec<TrainingRow> {
    if depth == 0 || readings.len() <= depth {
        return Vec::new();
    }

    let values: Vec<f64> = readings.iter().map(|r| r.value).collect();
    (depth..values.len())
        .map(|i| TrainingRow {
            features: lag_window(&values, i, depth),
            target: values[i],
        })
        .collect()
}

/// The latest complete lag row (position `n-1`), if the history is longer
/// than `depth`.
#[must_use]
pub fn latest_row(readings: &[Reading], depth: usize) -> Option<LagRow> {
    if depth == 0 || readings.len() <= depth {
        return None;
    }

    let values: Vec<f64> = readings.iter().map(|r| r.value).collect();
    Some(lag_window(&values, values.len() - 1, depth))
}
