//! Scoring helpers for auxiliary signals: min-max scaling, a recency score
//! against the current time, and an exponential moving average.

use chrono::{DateTime, Utc};

use cr_types::{CrResult, RiskError};

fn min_of(reference: &[f64]) -> CrResult<f64> {
    reference
        .iter()
        .copied()
        .reduce(f64::min)
        .ok_or_else(|| RiskError::EmptyReferenceList.into())
}

/// Min-max scale `value` against `reference`.
pub fn normalize(value: f64, reference: &[f64]) -> CrResult<f64> {
    let min = min_of(reference)?;
    let max = reference.iter().copied().fold(min, f64::max);
    if max == min {
        return Err(RiskError::DegenerateRange { min, max }.into());
    }
    Ok((value - min) / (max - min))
}

/// Recency score of a unix timestamp (seconds) against `reference`, using the
/// current UTC time as the upper bound. Newer timestamps score closer to 0,
/// the oldest reference timestamp scores 1.
pub fn normalize_time(value: f64, reference: &[f64]) -> CrResult<f64> {
    normalize_time_at(value, reference, Utc::now())
}

/// [`normalize_time`] with an explicit "now".
pub fn normalize_time_at(value: f64, reference: &[f64], now: DateTime<Utc>) -> CrResult<f64> {
    let min = min_of(reference)?;
    let max = now.timestamp() as f64;
    if max == min {
        return Err(RiskError::DegenerateRange { min, max }.into());
    }
    Ok(1.0 - (value - min) / (max - min))
}

/// Exponential moving average over the first `range` values, returning the
/// last smoothed value. `k = 2 / (range + 1)`, seeded with `values[0]`.
pub fn ema(values: &[f64], range: usize) -> CrResult<f64> {
    if range == 0 || range > values.len() {
        return Err(RiskError::InvalidEmaRange {
            range,
            len: values.len(),
        }
        .into());
    }

    let k = 2.0 / (range as f64 + 1.0);
    Ok(values[1..range]
        .iter()
        .fold(values[0], |prev, &v| v * k + prev * (1.0 - k)))
}
