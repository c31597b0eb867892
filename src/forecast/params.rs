use serde::{Deserialize, Serialize};

use crate::common::types::{Horizon, MAX_SAMPLE_MAGNITUDE};
use crate::error::ForecastError;

use super::Method;

/// Fewer samples than this and the adaptive selector goes straight to the
/// simple trend forecast.
pub const ADAPTIVE_MIN_SAMPLES: usize = 5;

/// Trailing samples the selector computes its statistics over.
pub const SELECTION_WINDOW: usize = 15;

/// Window variance below which the weighted moving average is chosen.
pub const MOVING_AVERAGE_MAX_VARIANCE: f64 = 0.5;

/// Trend strength above which the exponential-decay fit is chosen.
pub const DECAY_MIN_TREND_STRENGTH: f64 = 2.0;

/// Thresholds that drive adaptive method selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionThresholds {
    /// Minimum series length for selection; shorter series use simple trend.
    pub min_samples: usize,
    /// Number of trailing samples inspected.
    pub window: usize,
    /// `variance < moving_average_variance` selects the moving average.
    pub moving_average_variance: f64,
    /// `trend_strength > decay_trend_strength` selects the decay fit.
    pub decay_trend_strength: f64,
}

impl Default for SelectionThresholds {
    fn default() -> Self {
        SelectionThresholds {
            min_samples: ADAPTIVE_MIN_SAMPLES,
            window: SELECTION_WINDOW,
            moving_average_variance: MOVING_AVERAGE_MAX_VARIANCE,
            decay_trend_strength: DECAY_MIN_TREND_STRENGTH,
        }
    }
}

/// Recency weighting used by the weighted moving average.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecencyWeights {
    /// Weights 1, 2, ..., w.
    #[default]
    Linear,
    /// Weight `decay^(w - 1 - i)` for the i-th sample of the window.
    Exponential { decay: f64 },
}

/// Parameters for a forecast_temperature() call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastParams {
    pub method: Method,
    pub thresholds: SelectionThresholds,
    pub weights: RecencyWeights,
}

impl Default for ForecastParams {
    fn default() -> Self {
        ForecastParams {
            method: Method::Adaptive,
            thresholds: SelectionThresholds::default(),
            weights: RecencyWeights::default(),
        }
    }
}

impl ForecastParams {
    pub fn with_method(method: Method) -> Self {
        ForecastParams {
            method,
            ..Default::default()
        }
    }

    /// Validate thresholds and weights.
    pub fn validate(&self) -> Result<(), ForecastError> {
        let t = &self.thresholds;
        if t.window < 2 {
            return Err(invalid("thresholds.window", "must be at least 2"));
        }
        if !t.moving_average_variance.is_finite() || t.moving_average_variance < 0.0 {
            return Err(invalid(
                "thresholds.moving_average_variance",
                "must be a non-negative number",
            ));
        }
        if !t.decay_trend_strength.is_finite() || t.decay_trend_strength < 0.0 {
            return Err(invalid(
                "thresholds.decay_trend_strength",
                "must be a non-negative number",
            ));
        }
        if let RecencyWeights::Exponential { decay } = self.weights {
            if !(decay > 0.0 && decay <= 1.0) {
                return Err(invalid("weights.decay", "must be in (0, 1]"));
            }
        }
        Ok(())
    }
}

/// Validate a forecast horizon: the step must be a positive, finite number
/// of seconds and the whole horizon must stay within
/// [`MAX_SAMPLE_MAGNITUDE`] seconds. A horizon of zero steps is allowed and
/// yields empty output.
pub fn validate_horizon(horizon: &Horizon) -> Result<(), ForecastError> {
    if !horizon.step_seconds.is_finite() || horizon.step_seconds <= 0.0 {
        return Err(invalid(
            "step_seconds",
            &format!("must be positive, got {}", horizon.step_seconds),
        ));
    }
    let span = horizon.steps as f64 * horizon.step_seconds;
    if span > MAX_SAMPLE_MAGNITUDE {
        return Err(invalid(
            "horizon",
            &format!("spans {:e} s, limit is {:e} s", span, MAX_SAMPLE_MAGNITUDE),
        ));
    }
    Ok(())
}

fn invalid(name: &str, reason: &str) -> ForecastError {
    ForecastError::InvalidParameter {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}
