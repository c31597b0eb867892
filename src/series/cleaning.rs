use crate::common::types::TimeSeries;

/// Sort a series by time (stable) and drop samples whose timestamp repeats,
/// keeping the first occurrence.
pub fn dedup_by_timestamp(series: TimeSeries) -> TimeSeries {
    let mut pairs: Vec<(f64, f64)> = series
        .timestamps
        .into_iter()
        .zip(series.values)
        .collect();
    pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    pairs.dedup_by(|later, earlier| later.0 == earlier.0);

    let (timestamps, values) = pairs.into_iter().unzip();
    TimeSeries { timestamps, values }
}

impl TimeSeries {
    /// Trailing rolling mean over `window` samples.
    ///
    /// The first `window - 1` samples have no full window and are dropped, so
    /// each output value stays aligned with the timestamp that closes its
    /// window. A window of 0 or 1 returns the series unchanged.
    pub fn rolling_mean(&self, window: usize) -> TimeSeries {
        if window <= 1 {
            return self.clone();
        }
        if self.len() < window {
            return TimeSeries::default();
        }

        let mut sum: f64 = self.values[..window].iter().sum();
        let mut values = Vec::with_capacity(self.len() - window + 1);
        values.push(sum / window as f64);
        for i in window..self.len() {
            sum += self.values[i] - self.values[i - window];
            values.push(sum / window as f64);
        }

        TimeSeries {
            timestamps: self.timestamps[window - 1..].to_vec(),
            values,
        }
    }
}

/// Centred rolling mean with edge padding.
///
/// The series is padded with `window / 2` copies of its first and last values
/// on each side, so the output has the same length as the input. Windows
/// smaller than 3, or longer than the data, return the input unchanged.
pub fn centered_rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    if window < 3 || values.len() < window {
        return values.to_vec();
    }

    let pad = window / 2;
    let first = values[0];
    let last = values[values.len() - 1];
    let padded: Vec<f64> = std::iter::repeat(first)
        .take(pad)
        .chain(values.iter().copied())
        .chain(std::iter::repeat(last).take(pad))
        .collect();

    padded
        .windows(window)
        .take(values.len())
        .map(|w| w.iter().sum::<f64>() / window as f64)
        .collect()
}
