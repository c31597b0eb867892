use linregress::{FormulaRegressionBuilder, RegressionDataBuilder};

use crate::common::stats::{least_squares_line, mean, std_dev, variance};
use crate::common::types::{ForecastResult, Horizon, TimeSeries, MIN_DATA_POINTS};
use crate::error::ForecastError;

use super::params::RecencyWeights;
use super::strategy::ForecastStrategy;
use super::Method;

/// Most trailing samples any fit looks at.
pub const HISTORY_WINDOW: usize = 50;

/// Confidence multiplier used for the 95% polynomial band.
pub const Z_95: f64 = 1.96;

fn insufficient(method: Method, required: usize, actual: usize) -> ForecastError {
    ForecastError::InsufficientData {
        method,
        required,
        actual,
    }
}

fn last_timestamp(series: &TimeSeries, method: Method) -> Result<f64, ForecastError> {
    series
        .last_timestamp()
        .ok_or_else(|| insufficient(method, 1, 0))
}

// ==================== Simple trend ====================

/// Least squares line over the recent window, dampened in steady state.
///
/// The terminal method of every fallback chain: it needs no fitting library
/// and returns three empty sequences for fewer than 3 samples.
#[derive(Debug, Clone, Copy)]
pub struct SimpleTrend {
    pub window: usize,
    pub steady_variance: f64,
    pub steady_damping: f64,
    pub band_growth: f64,
}

impl Default for SimpleTrend {
    fn default() -> Self {
        SimpleTrend {
            window: 15,
            steady_variance: 1.0,
            steady_damping: 0.2,
            band_growth: 0.1,
        }
    }
}

impl ForecastStrategy for SimpleTrend {
    fn method(&self) -> Method {
        Method::SimpleTrend
    }

    fn min_samples(&self) -> usize {
        MIN_DATA_POINTS
    }

    fn forecast(
        &self,
        series: &TimeSeries,
        horizon: Horizon,
    ) -> Result<ForecastResult, ForecastError> {
        if series.len() < MIN_DATA_POINTS {
            return Ok(ForecastResult::empty(Method::SimpleTrend));
        }

        let recent = series.tail(self.window);
        let t0 = recent.timestamps[0];
        let x: Vec<f64> = recent.timestamps.iter().map(|t| t - t0).collect();

        let mut slope = if std_dev(&x) > 0.0 {
            least_squares_line(&x, &recent.values).0
        } else {
            0.0
        };
        if variance(&recent.values) < self.steady_variance {
            slope *= self.steady_damping;
        }

        let current = recent.values[recent.len() - 1];
        let offsets = horizon.offsets();
        let forecasts = offsets.iter().map(|o| current + slope * o).collect();

        let std_error = if recent.len() > 1 {
            std_dev(&recent.values)
        } else {
            1.0
        };
        let widths: Vec<f64> = offsets
            .iter()
            .map(|o| std_error * (1.0 + self.band_growth * (o / 60.0).sqrt()))
            .collect();

        Ok(ForecastResult::symmetric(
            Method::SimpleTrend,
            last_timestamp(series, Method::SimpleTrend)?,
            &offsets,
            forecasts,
            &widths,
        ))
    }
}

// ==================== Polynomial regression ====================

/// Degree-3 least squares polynomial over elapsed seconds.
///
/// The band is 1.96 × the degrees-of-freedom adjusted RMSE of the in-sample
/// residuals and stays constant over the horizon.
#[derive(Debug, Clone, Copy)]
pub struct Polynomial {
    pub degree: usize,
    pub window: usize,
}

impl Default for Polynomial {
    fn default() -> Self {
        Polynomial {
            degree: 3,
            window: HISTORY_WINDOW,
        }
    }
}

impl Polynomial {
    fn evaluate(params: &[f64], u: f64) -> f64 {
        // Horner form: params are [intercept, c1, c2, ...]
        params.iter().rev().fold(0.0, |acc, c| acc * u + c)
    }
}

impl ForecastStrategy for Polynomial {
    fn method(&self) -> Method {
        Method::Polynomial
    }

    fn min_samples(&self) -> usize {
        // One residual degree of freedom beyond the coefficients
        self.degree + 2
    }

    fn forecast(
        &self,
        series: &TimeSeries,
        horizon: Horizon,
    ) -> Result<ForecastResult, ForecastError> {
        let method = Method::Polynomial;
        let recent = series.tail(self.window);
        let n = recent.len();
        if n < self.min_samples() {
            return Err(insufficient(method, self.min_samples(), n));
        }

        // Rescale elapsed seconds to [0, 1] so the cubic terms stay well conditioned
        let t0 = recent.timestamps[0];
        let last_ts = recent.timestamps[n - 1];
        let span = last_ts - t0;
        if span <= 0.0 {
            return Err(ForecastError::fit(method, "window has no time span"));
        }
        let u: Vec<f64> = recent.timestamps.iter().map(|t| (t - t0) / span).collect();

        let mut data = vec![("Y".to_string(), recent.values.clone())];
        for power in 1..=self.degree {
            let column = u.iter().map(|ui| ui.powi(power as i32)).collect();
            data.push((format!("X{}", power), column));
        }
        let formula = format!(
            "Y ~ {}",
            (1..=self.degree)
                .map(|p| format!("X{}", p))
                .collect::<Vec<_>>()
                .join(" + ")
        );

        let regression_data = RegressionDataBuilder::new()
            .build_from(data)
            .map_err(|e| ForecastError::fit(method, format!("regression data: {}", e)))?;

        let model = FormulaRegressionBuilder::new()
            .data(&regression_data)
            .formula(formula.as_str())
            .fit()
            .map_err(|e| ForecastError::fit(method, format!("least squares: {}", e)))?;

        let params = model.parameters();
        if params.len() != self.degree + 1 {
            return Err(ForecastError::fit(
                method,
                format!("expected {} coefficients, got {}", self.degree + 1, params.len()),
            ));
        }

        // scale() is the residual variance SSR / (n - degree - 1)
        let width = Z_95 * model.scale().sqrt();

        let offsets = horizon.offsets();
        let forecasts = offsets
            .iter()
            .map(|o| Self::evaluate(params, (last_ts + o - t0) / span))
            .collect();
        let widths = vec![width; offsets.len()];

        Ok(ForecastResult::symmetric(
            method, last_ts, &offsets, forecasts, &widths,
        ))
    }
}

// ==================== Exponential smoothing ====================

/// Single exponential smoothing of the level over the whole series plus a
/// trend taken from the recent window.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialSmoothing {
    pub alpha: f64,
    pub trend_window: usize,
    pub steady_std: f64,
    pub steady_damping: f64,
    pub band_window: usize,
    pub band_growth: f64,
}

impl Default for ExponentialSmoothing {
    fn default() -> Self {
        ExponentialSmoothing {
            alpha: 0.3,
            trend_window: 10,
            steady_std: 1.0,
            steady_damping: 0.3,
            band_window: 15,
            band_growth: 0.1,
        }
    }
}

impl ForecastStrategy for ExponentialSmoothing {
    fn method(&self) -> Method {
        Method::ExponentialSmoothing
    }

    fn min_samples(&self) -> usize {
        MIN_DATA_POINTS
    }

    fn forecast(
        &self,
        series: &TimeSeries,
        horizon: Horizon,
    ) -> Result<ForecastResult, ForecastError> {
        let method = Method::ExponentialSmoothing;
        let history = series;
        if history.len() < self.min_samples() {
            return Err(insufficient(method, self.min_samples(), history.len()));
        }
        let values = &history.values;

        let level = values[1..]
            .iter()
            .fold(values[0], |s, &y| self.alpha * y + (1.0 - self.alpha) * s);

        let recent = &values[values.len().saturating_sub(self.trend_window)..];
        let mut trend = (recent[recent.len() - 1] - recent[0]) / (recent.len() - 1) as f64;
        if std_dev(recent) < self.steady_std {
            trend *= self.steady_damping;
        }

        let band_std = std_dev(&values[values.len().saturating_sub(self.band_window)..]);
        let steps = horizon.sample_offsets(history.interval());
        let forecasts = steps.iter().map(|m| level + trend * m).collect();
        let widths: Vec<f64> = steps
            .iter()
            .map(|m| band_std * (1.0 + self.band_growth * m.sqrt()))
            .collect();

        Ok(ForecastResult::symmetric(
            method,
            last_timestamp(history, method)?,
            &horizon.offsets(),
            forecasts,
            &widths,
        ))
    }
}

// ==================== Double exponential (Holt) ====================

/// Holt's linear method: smoothed level and trend with fixed constants.
#[derive(Debug, Clone, Copy)]
pub struct DoubleExponential {
    pub alpha: f64,
    pub beta: f64,
    pub window: usize,
}

impl Default for DoubleExponential {
    fn default() -> Self {
        DoubleExponential {
            alpha: 0.4,
            beta: 0.2,
            window: HISTORY_WINDOW,
        }
    }
}

/// Root mean square of one-step-ahead errors, 0.0 when there are none.
fn rms(errors: &[f64]) -> f64 {
    if errors.is_empty() {
        return 0.0;
    }
    (errors.iter().map(|e| e * e).sum::<f64>() / errors.len() as f64).sqrt()
}

impl ForecastStrategy for DoubleExponential {
    fn method(&self) -> Method {
        Method::DoubleExponential
    }

    fn min_samples(&self) -> usize {
        4
    }

    fn forecast(
        &self,
        series: &TimeSeries,
        horizon: Horizon,
    ) -> Result<ForecastResult, ForecastError> {
        let method = Method::DoubleExponential;
        let history = series.tail(self.window);
        if history.len() < self.min_samples() {
            return Err(insufficient(method, self.min_samples(), history.len()));
        }
        let y = &history.values;

        let mut level = y[0];
        let mut trend = y[1] - y[0];
        let mut errors = Vec::with_capacity(y.len() - 1);
        for &obs in &y[1..] {
            errors.push(obs - (level + trend));
            let new_level = self.alpha * obs + (1.0 - self.alpha) * (level + trend);
            trend = self.beta * (new_level - level) + (1.0 - self.beta) * trend;
            level = new_level;
        }
        let sigma = rms(&errors);

        let steps = horizon.sample_offsets(history.interval());
        let forecasts = steps.iter().map(|m| level + trend * m).collect();
        let widths: Vec<f64> = steps.iter().map(|m| sigma * m.sqrt()).collect();

        Ok(ForecastResult::symmetric(
            method,
            last_timestamp(&history, method)?,
            &horizon.offsets(),
            forecasts,
            &widths,
        ))
    }
}

// ==================== Holt-Winters (additive seasonal) ====================

/// Additive Holt-Winters with a fixed cycle length. Never picked by the
/// adaptive selector; available when asked for by name.
#[derive(Debug, Clone, Copy)]
pub struct HoltWinters {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub period: usize,
}

impl Default for HoltWinters {
    fn default() -> Self {
        HoltWinters {
            alpha: 0.4,
            beta: 0.2,
            gamma: 0.3,
            period: 12,
        }
    }
}

impl ForecastStrategy for HoltWinters {
    fn method(&self) -> Method {
        Method::HoltWinters
    }

    fn min_samples(&self) -> usize {
        2 * self.period
    }

    fn forecast(
        &self,
        series: &TimeSeries,
        horizon: Horizon,
    ) -> Result<ForecastResult, ForecastError> {
        let method = Method::HoltWinters;
        let period = self.period;
        if period < 2 {
            return Err(ForecastError::fit(method, "period must be at least 2"));
        }
        let history = series.tail(HISTORY_WINDOW.max(2 * period));
        let n = history.len();
        if n < self.min_samples() {
            return Err(insufficient(method, self.min_samples(), n));
        }
        let y = &history.values;

        let first_mean = mean(&y[..period]);
        let second_mean = mean(&y[period..2 * period]);
        let mut level = first_mean;
        let mut trend = (second_mean - first_mean) / period as f64;
        let mut seasonal: Vec<f64> = y[..period].iter().map(|v| v - first_mean).collect();

        let mut errors = Vec::with_capacity(n - period);
        for (t, &obs) in y.iter().enumerate().skip(period) {
            let s = seasonal[t % period];
            errors.push(obs - (level + trend + s));
            let new_level = self.alpha * (obs - s) + (1.0 - self.alpha) * (level + trend);
            trend = self.beta * (new_level - level) + (1.0 - self.beta) * trend;
            seasonal[t % period] = self.gamma * (obs - new_level) + (1.0 - self.gamma) * s;
            level = new_level;
        }
        let sigma = rms(&errors);

        let steps = horizon.sample_offsets(history.interval());
        let forecasts = steps
            .iter()
            .map(|&m| {
                let ahead = (m.round() as usize).max(1);
                level + trend * m + seasonal[(n + ahead - 1) % period]
            })
            .collect();
        let widths: Vec<f64> = steps.iter().map(|m| sigma * m.sqrt()).collect();

        Ok(ForecastResult::symmetric(
            method,
            last_timestamp(&history, method)?,
            &horizon.offsets(),
            forecasts,
            &widths,
        ))
    }
}

// ==================== Weighted moving average ====================

/// Largest window the weighted moving average accepts.
pub const MAX_MOVING_AVERAGE_WINDOW: usize = 20;

/// Recency-weighted mean of the recent window plus a half-window trend.
#[derive(Debug, Clone, Copy)]
pub struct MovingAverage {
    pub window: usize,
    pub weights: RecencyWeights,
    pub steady_std: f64,
    pub steady_damping: f64,
}

impl Default for MovingAverage {
    fn default() -> Self {
        MovingAverage {
            window: 12,
            weights: RecencyWeights::Linear,
            steady_std: 1.5,
            steady_damping: 0.2,
        }
    }
}

impl MovingAverage {
    pub fn with_weights(weights: RecencyWeights) -> Self {
        MovingAverage {
            weights,
            ..Default::default()
        }
    }

    fn weights_for(&self, w: usize) -> Vec<f64> {
        match self.weights {
            RecencyWeights::Linear => (1..=w).map(|i| i as f64).collect(),
            RecencyWeights::Exponential { decay } => {
                (0..w).map(|i| decay.powi((w - 1 - i) as i32)).collect()
            }
        }
    }
}

impl ForecastStrategy for MovingAverage {
    fn method(&self) -> Method {
        Method::MovingAverage
    }

    fn min_samples(&self) -> usize {
        MIN_DATA_POINTS
    }

    fn forecast(
        &self,
        series: &TimeSeries,
        horizon: Horizon,
    ) -> Result<ForecastResult, ForecastError> {
        let method = Method::MovingAverage;
        if series.len() < self.min_samples() {
            return Err(insufficient(method, self.min_samples(), series.len()));
        }

        let window = self.window.clamp(1, MAX_MOVING_AVERAGE_WINDOW);
        let recent = series.tail(window);
        let values = &recent.values;
        let w = values.len();

        let weights = self.weights_for(w);
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return Err(ForecastError::fit(method, "weights sum to zero"));
        }
        let current = values
            .iter()
            .zip(weights.iter())
            .map(|(v, wt)| v * wt)
            .sum::<f64>()
            / total;

        let spread = std_dev(values);
        let mut trend = 0.0;
        if w >= 6 {
            let half = w / 2;
            let early = mean(&values[..half]);
            let late = mean(&values[half..]);
            trend = (late - early) / half as f64;
            if spread < self.steady_std {
                trend *= self.steady_damping;
            }
        }

        let steps = horizon.sample_offsets(recent.interval());
        let forecasts = steps.iter().map(|m| current + trend * m).collect();
        let widths: Vec<f64> = steps.iter().map(|m| spread * (0.8 + 0.1 * m)).collect();

        Ok(ForecastResult::symmetric(
            method,
            last_timestamp(&recent, method)?,
            &horizon.offsets(),
            forecasts,
            &widths,
        ))
    }
}
