use serde::{Deserialize, Serialize};

use crate::error::ForecastError;
use crate::forecast::Method;

/// Minimum number of samples any method needs before it produces output.
/// Below this the simple trend forecast returns empty sequences.
pub const MIN_DATA_POINTS: usize = 3;

/// Sampling interval assumed when it cannot be detected from the data.
pub const DEFAULT_INTERVAL_SECONDS: f64 = 1.0;

/// Largest accepted magnitude for a timestamp, a temperature, or a horizon
/// span. Squared spreads of values within this bound stay finite.
pub const MAX_SAMPLE_MAGNITUDE: f64 = 1e12;

/// A single temperature series of (elapsed seconds, °C) samples.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub timestamps: Vec<f64>,
    pub values: Vec<f64>,
}

impl TimeSeries {
    /// Build a series from parallel sequences, rejecting mismatched lengths,
    /// non-finite samples and samples beyond [`MAX_SAMPLE_MAGNITUDE`].
    pub fn new(timestamps: Vec<f64>, values: Vec<f64>) -> Result<Self, ForecastError> {
        let series = TimeSeries { timestamps, values };
        series.validate()?;
        Ok(series)
    }

    /// Check the invariants `new` enforces on a series built by hand.
    pub fn validate(&self) -> Result<(), ForecastError> {
        if self.timestamps.len() != self.values.len() {
            return Err(ForecastError::LengthMismatch {
                timestamps: self.timestamps.len(),
                values: self.values.len(),
            });
        }
        for (i, (t, v)) in self.timestamps.iter().zip(self.values.iter()).enumerate() {
            if !t.is_finite() || !v.is_finite() {
                return Err(ForecastError::NonFiniteSample(i));
            }
            if t.abs() > MAX_SAMPLE_MAGNITUDE || v.abs() > MAX_SAMPLE_MAGNITUDE {
                return Err(ForecastError::SampleOutOfRange {
                    index: i,
                    bound: MAX_SAMPLE_MAGNITUDE,
                });
            }
        }
        Ok(())
    }

    /// Returns the number of samples.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the series has no samples.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the last timestamp, or None if empty.
    pub fn last_timestamp(&self) -> Option<f64> {
        self.timestamps.last().copied()
    }

    /// The last `n` samples (or all of them if the series is shorter).
    pub fn tail(&self, n: usize) -> TimeSeries {
        let start = self.len().saturating_sub(n);
        TimeSeries {
            timestamps: self.timestamps[start..].to_vec(),
            values: self.values[start..].to_vec(),
        }
    }

    /// Sampling interval of this series in seconds.
    pub fn interval(&self) -> f64 {
        detect_interval(&self.timestamps)
    }
}

/// How far ahead to forecast: `steps` points spaced `step_seconds` apart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Horizon {
    pub steps: usize,
    pub step_seconds: f64,
}

impl Horizon {
    pub fn new(steps: usize, step_seconds: f64) -> Self {
        Horizon {
            steps,
            step_seconds,
        }
    }

    /// Future offsets in seconds from the last sample: `k * step` for k = 1..=steps.
    pub fn offsets(&self) -> Vec<f64> {
        (1..=self.steps)
            .map(|k| k as f64 * self.step_seconds)
            .collect()
    }

    /// Future offsets expressed in units of the sampling interval.
    pub fn sample_offsets(&self, interval: f64) -> Vec<f64> {
        let interval = if interval > 0.0 {
            interval
        } else {
            DEFAULT_INTERVAL_SECONDS
        };
        self.offsets().into_iter().map(|o| o / interval).collect()
    }
}

/// The result of a forecasting operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    /// Method that actually produced the numbers (after any fallback).
    pub method: Method,
    /// Future timestamps in elapsed seconds.
    pub timestamps: Vec<f64>,
    /// Point forecasts.
    pub forecasts: Vec<f64>,
    /// Upper band.
    pub upper_bounds: Vec<f64>,
    /// Lower band.
    pub lower_bounds: Vec<f64>,
}

impl ForecastResult {
    /// Three empty sequences, returned when there is too little data.
    pub fn empty(method: Method) -> Self {
        ForecastResult {
            method,
            timestamps: Vec::new(),
            forecasts: Vec::new(),
            upper_bounds: Vec::new(),
            lower_bounds: Vec::new(),
        }
    }

    /// Build a result from point forecasts and symmetric half-widths.
    pub(crate) fn symmetric(
        method: Method,
        last_ts: f64,
        offsets: &[f64],
        forecasts: Vec<f64>,
        widths: &[f64],
    ) -> Self {
        let timestamps = offsets.iter().map(|o| last_ts + o).collect();
        let upper_bounds = forecasts
            .iter()
            .zip(widths.iter())
            .map(|(f, w)| f + w.abs())
            .collect();
        let lower_bounds = forecasts
            .iter()
            .zip(widths.iter())
            .map(|(f, w)| f - w.abs())
            .collect();
        ForecastResult {
            method,
            timestamps,
            forecasts,
            upper_bounds,
            lower_bounds,
        }
    }

    pub fn len(&self) -> usize {
        self.forecasts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forecasts.is_empty()
    }

    /// Index of the first step holding a NaN or infinite value, if any.
    pub fn first_non_finite(&self) -> Option<usize> {
        (0..self.forecasts.len()).find(|&i| {
            !self.forecasts[i].is_finite()
                || !self.upper_bounds[i].is_finite()
                || !self.lower_bounds[i].is_finite()
        })
    }
}

/// Detect the most common interval (in seconds) between consecutive timestamps.
/// Differences are compared at millisecond resolution. Returns 1 s if fewer
/// than 2 samples or no positive interval.
pub fn detect_interval(timestamps: &[f64]) -> f64 {
    if timestamps.len() < 2 {
        return DEFAULT_INTERVAL_SECONDS;
    }

    let mut diffs: Vec<i64> = timestamps
        .windows(2)
        .map(|w| ((w[1] - w[0]) * 1000.0).round() as i64)
        .filter(|&d| d > 0)
        .collect();
    if diffs.is_empty() {
        return DEFAULT_INTERVAL_SECONDS;
    }
    diffs.sort_unstable();

    // Mode of the sorted differences; ties keep the smaller interval
    let mut best_val = diffs[0];
    let mut best_count = 1usize;
    let mut current_val = diffs[0];
    let mut current_count = 1usize;

    for &d in &diffs[1..] {
        if d == current_val {
            current_count += 1;
        } else {
            if current_count > best_count {
                best_count = current_count;
                best_val = current_val;
            }
            current_val = d;
            current_count = 1;
        }
    }
    if current_count > best_count {
        best_val = current_val;
    }

    best_val as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_interval_one_second() {
        let ts = vec![0.0, 1.0, 2.0, 3.0, 4.0];
        assert_eq!(detect_interval(&ts), 1.0);
    }

    #[test]
    fn test_detect_interval_logger_jitter() {
        // The session logger sleeps 1.1 s; one slow write should not win
        let ts = vec![0.0, 1.1, 2.2, 3.3, 4.7, 5.8];
        assert!((detect_interval(&ts) - 1.1).abs() < 1e-9);
    }

    #[test]
    fn test_detect_interval_single_point() {
        assert_eq!(detect_interval(&[100.0]), 1.0);
    }

    #[test]
    fn test_detect_interval_empty() {
        assert_eq!(detect_interval(&[]), 1.0);
    }

    #[test]
    fn test_detect_interval_duplicates_only() {
        assert_eq!(detect_interval(&[5.0, 5.0, 5.0]), 1.0);
    }

    #[test]
    fn test_new_rejects_mismatch() {
        let err = TimeSeries::new(vec![0.0, 1.0], vec![20.0]).unwrap_err();
        assert!(matches!(err, ForecastError::LengthMismatch { .. }));
    }

    #[test]
    fn test_new_rejects_nan() {
        let err = TimeSeries::new(vec![0.0, 1.0], vec![20.0, f64::NAN]).unwrap_err();
        assert!(matches!(err, ForecastError::NonFiniteSample(1)));
    }

    #[test]
    fn test_new_rejects_huge_magnitudes() {
        let err = TimeSeries::new(vec![0.0, 1.0], vec![20.0, -1e307]).unwrap_err();
        assert!(matches!(err, ForecastError::SampleOutOfRange { index: 1, .. }));

        let err = TimeSeries::new(vec![0.0, 2e12], vec![20.0, 21.0]).unwrap_err();
        assert!(matches!(err, ForecastError::SampleOutOfRange { index: 1, .. }));

        assert!(TimeSeries::new(vec![0.0, 1.0], vec![1e11, -1e11]).is_ok());
    }

    #[test]
    fn test_validate_hand_built_series() {
        let series = TimeSeries {
            timestamps: vec![0.0, 1.0, 2.0],
            values: vec![1e307, -1e307, 1e307],
        };
        assert!(series.validate().is_err());
        assert!(TimeSeries::default().validate().is_ok());
    }

    #[test]
    fn test_tail_and_offsets() {
        let series = TimeSeries::new(vec![0.0, 1.0, 2.0], vec![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(series.tail(2).values, vec![2.0, 3.0]);
        assert_eq!(series.tail(10).len(), 3);

        let horizon = Horizon::new(3, 2.0);
        assert_eq!(horizon.offsets(), vec![2.0, 4.0, 6.0]);
        assert_eq!(horizon.sample_offsets(2.0), vec![1.0, 2.0, 3.0]);
    }
}
