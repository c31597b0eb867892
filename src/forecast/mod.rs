pub mod arima;
pub mod decay;
pub mod models;
pub mod params;
pub mod strategy;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::common::stats::{least_squares_line, std_dev, variance};
use crate::common::types::{ForecastResult, Horizon, TimeSeries};
use crate::error::{ForecastError, PitcastError};
use crate::series::dedup_by_timestamp;

use arima::Arima;
use decay::ExponentialDecay;
use models::{
    DoubleExponential, ExponentialSmoothing, HoltWinters, MovingAverage, Polynomial, SimpleTrend,
};
use params::{validate_horizon, ForecastParams, SelectionThresholds};
use strategy::FallbackChain;

/// Forecasting method. `Adaptive` picks one of the others from the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    #[default]
    Adaptive,
    SimpleTrend,
    Polynomial,
    ExponentialSmoothing,
    DoubleExponential,
    HoltWinters,
    ExponentialDecay,
    MovingAverage,
    Arima,
}

impl Method {
    pub const ALL: [Method; 9] = [
        Method::Adaptive,
        Method::SimpleTrend,
        Method::Polynomial,
        Method::ExponentialSmoothing,
        Method::DoubleExponential,
        Method::HoltWinters,
        Method::ExponentialDecay,
        Method::MovingAverage,
        Method::Arima,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Method::Adaptive => "adaptive",
            Method::SimpleTrend => "simple_trend",
            Method::Polynomial => "polynomial",
            Method::ExponentialSmoothing => "exponential_smoothing",
            Method::DoubleExponential => "double_exponential",
            Method::HoltWinters => "holt_winters",
            Method::ExponentialDecay => "exponential_decay",
            Method::MovingAverage => "moving_average",
            Method::Arima => "arima",
        }
    }

    /// One-line description for `pitcast methods`.
    pub fn describe(&self) -> &'static str {
        match self {
            Method::Adaptive => "choose a method from recent variance and trend strength",
            Method::SimpleTrend => "least squares line over the last 15 samples",
            Method::Polynomial => "cubic least squares fit over the last 50 samples",
            Method::ExponentialSmoothing => "smoothed level plus recent trend",
            Method::DoubleExponential => "Holt's linear smoothing of level and trend",
            Method::HoltWinters => "additive seasonal smoothing, 12-sample cycle",
            Method::ExponentialDecay => "Newton's-law approach to a fitted target temperature",
            Method::MovingAverage => "recency weighted mean of the last 12 samples",
            Method::Arima => "ARIMA(5,1,0) by conditional least squares",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Method {
    type Err = PitcastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        let method = match normalized.as_str() {
            "adaptive" | "auto" => Method::Adaptive,
            "simple_trend" | "linear" | "trend" => Method::SimpleTrend,
            "polynomial" | "poly" => Method::Polynomial,
            "exponential_smoothing" | "ses" => Method::ExponentialSmoothing,
            "double_exponential" | "holt" => Method::DoubleExponential,
            "holt_winters" => Method::HoltWinters,
            "exponential_decay" | "decay" => Method::ExponentialDecay,
            "moving_average" | "wma" => Method::MovingAverage,
            "arima" => Method::Arima,
            _ => {
                return Err(PitcastError::Unknown {
                    kind: "method",
                    value: s.to_string(),
                })
            }
        };
        Ok(method)
    }
}

/// Pick a concrete method from the recent window of `series`.
///
/// Short series use the simple trend. Otherwise a quiet window (low
/// variance) uses the weighted moving average, a strongly trending one
/// uses the exponential-decay fit, and everything else Holt's method.
pub fn select_method(series: &TimeSeries, thresholds: &SelectionThresholds) -> Method {
    if series.len() < thresholds.min_samples {
        return Method::SimpleTrend;
    }

    let recent = series.tail(thresholds.window);
    let var = variance(&recent.values);
    if var < thresholds.moving_average_variance {
        debug!(variance = var, "low variance: weighted moving average");
        return Method::MovingAverage;
    }

    let strength = trend_strength(&recent);
    if strength > thresholds.decay_trend_strength {
        debug!(trend_strength = strength, "strong trend: exponential decay");
        return Method::ExponentialDecay;
    }

    debug!(variance = var, trend_strength = strength, "double exponential");
    Method::DoubleExponential
}

/// |slope| × window duration ÷ window std, 0 when the window is flat.
fn trend_strength(window: &TimeSeries) -> f64 {
    let spread = std_dev(&window.values);
    if spread == 0.0 || window.len() < 2 {
        return 0.0;
    }
    let t0 = window.timestamps[0];
    let x: Vec<f64> = window.timestamps.iter().map(|t| t - t0).collect();
    let (slope, _) = least_squares_line(&x, &window.values);
    let duration = x[x.len() - 1];
    slope.abs() * duration / spread
}

/// Fallback chain for a concrete method. Every chain ends with the
/// simple trend.
pub fn chain_for(method: Method, params: &ForecastParams) -> FallbackChain {
    let chain = FallbackChain::new();
    let chain = match method {
        Method::Adaptive | Method::SimpleTrend => chain.then(SimpleTrend::default()),
        Method::MovingAverage => chain.then(MovingAverage::with_weights(params.weights)),
        Method::ExponentialDecay => chain
            .then(ExponentialDecay::default())
            .then(DoubleExponential::default()),
        Method::DoubleExponential => chain.then(DoubleExponential::default()),
        Method::Polynomial => chain.then(Polynomial::default()),
        Method::ExponentialSmoothing => chain.then(ExponentialSmoothing::default()),
        Method::HoltWinters => chain
            .then(HoltWinters::default())
            .then(DoubleExponential::default()),
        Method::Arima => chain
            .then(Arima::default())
            .then(DoubleExponential::default()),
    };
    chain.terminated()
}

/// Forecast `horizon` steps past the end of `series`.
///
/// Only input validation fails; once the inputs are valid every
/// method failure falls back along the chain, and fewer than 3 samples
/// yields three empty sequences.
pub fn forecast_temperature(
    series: &TimeSeries,
    horizon: Horizon,
    params: &ForecastParams,
) -> Result<ForecastResult, ForecastError> {
    series.validate()?;
    params.validate()?;
    validate_horizon(&horizon)?;

    let method = match params.method {
        Method::Adaptive => select_method(series, &params.thresholds),
        chosen => chosen,
    };
    let chain = chain_for(method, params);
    debug!(
        requested = %params.method,
        selected = %method,
        chain = ?chain.methods(),
        samples = series.len(),
        "forecasting"
    );

    Ok(chain.run(series, horizon))
}

/// Convenience entry point over raw sample slices with adaptive selection.
///
/// Samples are validated, sorted, and deduplicated by timestamp first.
pub fn forecast_samples(
    timestamps: &[f64],
    temperatures: &[f64],
    steps: usize,
    step_seconds: f64,
) -> Result<ForecastResult, ForecastError> {
    let series = TimeSeries::new(timestamps.to_vec(), temperatures.to_vec())?;
    let series = dedup_by_timestamp(series);
    forecast_temperature(
        &series,
        Horizon::new(steps, step_seconds),
        &ForecastParams::default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::params::RecencyWeights;

    fn make_series(values: Vec<f64>) -> TimeSeries {
        let timestamps = (0..values.len()).map(|i| i as f64).collect();
        TimeSeries { timestamps, values }
    }

    // ==================== Method parsing ====================

    #[test]
    fn test_method_round_trips_through_names() {
        for method in Method::ALL {
            assert_eq!(method.name().parse::<Method>().unwrap(), method);
        }
    }

    #[test]
    fn test_method_aliases() {
        assert_eq!("holt".parse::<Method>().unwrap(), Method::DoubleExponential);
        assert_eq!("Linear".parse::<Method>().unwrap(), Method::SimpleTrend);
        assert_eq!("moving-average".parse::<Method>().unwrap(), Method::MovingAverage);
        assert_eq!("decay".parse::<Method>().unwrap(), Method::ExponentialDecay);
    }

    #[test]
    fn test_method_unknown() {
        let err = "prophet".parse::<Method>().unwrap_err();
        assert!(err.to_string().contains("unknown method 'prophet'"), "Error: {}", err);
    }

    #[test]
    fn test_method_serde_snake_case() {
        let json = serde_json::to_string(&Method::ExponentialDecay).unwrap();
        assert_eq!(json, "\"exponential_decay\"");
    }

    // ==================== Selection ====================

    #[test]
    fn test_select_short_series_uses_simple_trend() {
        let series = make_series(vec![100.0, 130.0, 90.0, 150.0]);
        assert_eq!(
            select_method(&series, &SelectionThresholds::default()),
            Method::SimpleTrend
        );
    }

    #[test]
    fn test_select_quiet_window_uses_moving_average() {
        let values: Vec<f64> = (0..20).map(|i| 107.0 + 0.02 * (i % 3) as f64).collect();
        let series = make_series(values);
        assert_eq!(
            select_method(&series, &SelectionThresholds::default()),
            Method::MovingAverage
        );
    }

    #[test]
    fn test_select_strong_trend_uses_decay() {
        // Pure ramp: trend strength = slope * duration / std ≈ 3.2
        let values: Vec<f64> = (0..20).map(|i| 60.0 + 2.0 * i as f64).collect();
        let series = make_series(values);
        assert_eq!(
            select_method(&series, &SelectionThresholds::default()),
            Method::ExponentialDecay
        );
    }

    #[test]
    fn test_select_noisy_window_uses_double_exponential() {
        let values: Vec<f64> = (0..20)
            .map(|i| 100.0 + if i % 2 == 0 { 3.0 } else { -3.0 })
            .collect();
        let series = make_series(values);
        assert_eq!(
            select_method(&series, &SelectionThresholds::default()),
            Method::DoubleExponential
        );
    }

    #[test]
    fn test_thresholds_are_overridable() {
        let values: Vec<f64> = (0..20).map(|i| 100.0 + 0.3 * (i % 4) as f64).collect();
        let series = make_series(values);
        let default = select_method(&series, &SelectionThresholds::default());
        assert_eq!(default, Method::MovingAverage);

        let strict = SelectionThresholds {
            moving_average_variance: 0.01,
            ..Default::default()
        };
        assert_ne!(select_method(&series, &strict), Method::MovingAverage);
    }

    // ==================== Chains & dispatch ====================

    #[test]
    fn test_chains_end_with_simple_trend() {
        let params = ForecastParams::default();
        for method in Method::ALL {
            let methods = chain_for(method, &params).methods();
            assert_eq!(methods.last(), Some(&Method::SimpleTrend), "{}", method);
        }
        assert_eq!(
            chain_for(Method::ExponentialDecay, &params).methods(),
            vec![
                Method::ExponentialDecay,
                Method::DoubleExponential,
                Method::SimpleTrend
            ]
        );
    }

    #[test]
    fn test_forecast_ramp_example() {
        let series = make_series(vec![100.0, 101.0, 102.0, 103.0, 104.0, 105.0]);
        let params = ForecastParams::with_method(Method::SimpleTrend);
        let result = forecast_temperature(&series, Horizon::new(3, 1.0), &params).unwrap();
        assert_eq!(result.len(), 3);
        for (fc, expected) in result.forecasts.iter().zip([106.0, 107.0, 108.0]) {
            assert!((fc - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_forecast_too_short_is_empty() {
        let series = make_series(vec![100.0, 101.0]);
        for method in Method::ALL {
            let params = ForecastParams::with_method(method);
            let result = forecast_temperature(&series, Horizon::new(5, 1.0), &params).unwrap();
            assert!(result.is_empty(), "{}", method);
        }
    }

    #[test]
    fn test_explicit_method_falls_back() {
        // Holt-Winters needs 24 samples; 10 falls back to Holt
        let values: Vec<f64> = (0..10).map(|i| 50.0 + i as f64).collect();
        let series = make_series(values);
        let params = ForecastParams::with_method(Method::HoltWinters);
        let result = forecast_temperature(&series, Horizon::new(4, 1.0), &params).unwrap();
        assert_eq!(result.method, Method::DoubleExponential);
        assert_eq!(result.len(), 4);
    }

    #[test]
    fn test_every_method_produces_finite_bands() {
        let values: Vec<f64> = (0..60)
            .map(|i| {
                let t = i as f64;
                110.0 - 40.0 * (-t / 25.0).exp() + (t * 0.9).sin() * 0.3
            })
            .collect();
        let series = make_series(values);
        for method in Method::ALL {
            let params = ForecastParams::with_method(method);
            let result = forecast_temperature(&series, Horizon::new(30, 2.0), &params).unwrap();
            assert_eq!(result.len(), 30, "{}", method);
            assert!(result.first_non_finite().is_none(), "{}", method);
            for i in 0..result.len() {
                assert!(result.upper_bounds[i] >= result.forecasts[i], "{}", method);
                assert!(result.lower_bounds[i] <= result.forecasts[i], "{}", method);
            }
        }
    }

    #[test]
    fn test_invalid_params_reach_caller() {
        let series = make_series(vec![1.0, 2.0, 3.0]);
        let params = ForecastParams {
            weights: RecencyWeights::Exponential { decay: 0.0 },
            ..Default::default()
        };
        assert!(forecast_temperature(&series, Horizon::new(3, 1.0), &params).is_err());
        assert!(
            forecast_temperature(&series, Horizon::new(3, -1.0), &ForecastParams::default())
                .is_err()
        );
    }

    #[test]
    fn test_overflowing_samples_are_rejected() {
        let values: Vec<f64> = (0..6)
            .map(|i| if i % 2 == 0 { 1e307 } else { -1e307 })
            .collect();
        let series = make_series(values);
        let err = forecast_temperature(&series, Horizon::new(3, 1.0), &ForecastParams::default())
            .unwrap_err();
        assert!(matches!(err, ForecastError::SampleOutOfRange { index: 0, .. }), "Error: {}", err);
    }

    #[test]
    fn test_extreme_in_range_samples_fill_the_horizon() {
        let values: Vec<f64> = (0..6)
            .map(|i| if i % 2 == 0 { 1e12 } else { -1e12 })
            .collect();
        let series = make_series(values);
        for method in Method::ALL {
            let params = ForecastParams::with_method(method);
            let result = forecast_temperature(&series, Horizon::new(3, 1.0), &params).unwrap();
            assert_eq!(result.len(), 3, "{} ({})", method, result.method);
            assert!(result.first_non_finite().is_none(), "{}", method);
        }
    }

    #[test]
    fn test_forecast_samples_dedups_and_sorts() {
        let ts = [2.0, 0.0, 1.0, 1.0, 3.0, 4.0];
        let temps = [102.0, 100.0, 101.0, 500.0, 103.0, 104.0];
        let result = forecast_samples(&ts, &temps, 2, 1.0).unwrap();
        assert_eq!(result.timestamps, vec![5.0, 6.0]);
        assert!(result.forecasts[0] > 100.0 && result.forecasts[0] < 110.0);
    }

    #[test]
    fn test_forecast_samples_rejects_mismatch() {
        let err = forecast_samples(&[0.0, 1.0], &[1.0], 3, 1.0).unwrap_err();
        assert!(matches!(err, ForecastError::LengthMismatch { .. }));
    }
}
