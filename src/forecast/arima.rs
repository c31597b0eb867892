use nalgebra::{DMatrix, DVector};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::common::types::{ForecastResult, Horizon, TimeSeries};
use crate::error::ForecastError;

use super::models::HISTORY_WINDOW;
use super::strategy::ForecastStrategy;
use super::Method;

const SINGULAR_EPS: f64 = 1e-10;

/// Fitted AR coefficients on the differenced series.
#[derive(Debug, Clone, PartialEq)]
struct ArFit {
    intercept: f64,
    /// φ1..φp, φ1 multiplying the most recent difference
    phi: Vec<f64>,
    sigma2: f64,
}

fn difference(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Least squares AR(p) with intercept: rows `[1, d[t-1], ..., d[t-p]] -> d[t]`.
fn fit_ar(diffs: &[f64], p: usize) -> Result<ArFit, ForecastError> {
    let method = Method::Arima;
    let rows = diffs.len().saturating_sub(p);
    if rows <= p + 1 {
        return Err(ForecastError::fit(
            method,
            format!("{} regression rows for {} coefficients", rows, p + 1),
        ));
    }

    let design = DMatrix::from_fn(rows, p + 1, |r, c| {
        if c == 0 {
            1.0
        } else {
            diffs[p + r - c]
        }
    });
    let target = DVector::from_iterator(rows, diffs[p..].iter().copied());

    let svd = design.clone().svd(true, true);
    if svd.rank(SINGULAR_EPS) < p + 1 {
        return Err(ForecastError::fit(method, "singular design matrix"));
    }
    let beta = svd
        .solve(&target, SINGULAR_EPS)
        .map_err(|e| ForecastError::fit(method, e))?;

    let residuals = &target - &design * &beta;
    let sse = residuals.norm_squared();
    let sigma2 = sse / (rows - p - 1) as f64;

    Ok(ArFit {
        intercept: beta[0],
        phi: beta.iter().skip(1).copied().collect(),
        sigma2,
    })
}

/// ψ-weights ψ0..ψ(h-1) of the integrated process.
///
/// With d = 1 the AR polynomial of the levels has order p + 1:
/// φ*1 = 1 + φ1, φ*j = φj - φ(j-1), φ*(p+1) = -φp.
fn psi_weights(phi: &[f64], h: usize) -> Vec<f64> {
    let p = phi.len();
    let mut star = vec![0.0; p + 1];
    for j in 0..=p {
        let current = if j < p { phi[j] } else { 0.0 };
        let previous = if j == 0 { -1.0 } else { phi[j - 1] };
        star[j] = current - previous;
    }

    let mut psi = Vec::with_capacity(h);
    for j in 0..h {
        if j == 0 {
            psi.push(1.0);
            continue;
        }
        let value: f64 = (1..=j.min(p + 1))
            .map(|i| star[i - 1] * psi[j - i])
            .sum();
        psi.push(value);
    }
    psi
}

/// ARIMA(p, 1, 0) with a fixed AR order, fitted by conditional least squares
/// on the first differences. The band uses the ψ-weights of the integrated
/// model, so it widens with the horizon.
#[derive(Debug, Clone, Copy)]
pub struct Arima {
    pub p: usize,
    pub window: usize,
    pub confidence: f64,
}

impl Default for Arima {
    fn default() -> Self {
        Arima {
            p: 5,
            window: HISTORY_WINDOW,
            confidence: 0.95,
        }
    }
}

impl ForecastStrategy for Arima {
    fn method(&self) -> Method {
        Method::Arima
    }

    fn min_samples(&self) -> usize {
        // p lags + intercept + residual degrees of freedom on the differences
        3 * self.p + 1
    }

    fn forecast(
        &self,
        series: &TimeSeries,
        horizon: Horizon,
    ) -> Result<ForecastResult, ForecastError> {
        let method = Method::Arima;
        let recent = series.tail(self.window);
        let n = recent.len();
        if n < self.min_samples() {
            return Err(ForecastError::InsufficientData {
                method,
                required: self.min_samples(),
                actual: n,
            });
        }

        let diffs = difference(&recent.values);
        let fit = fit_ar(&diffs, self.p)?;

        let steps = horizon.sample_offsets(recent.interval());
        let ahead: Vec<usize> = steps
            .iter()
            .map(|m| (m.round() as usize).max(1))
            .collect();
        let max_ahead = ahead.iter().copied().max().unwrap_or(0);

        // Recursive forecasts of the differences, then integrate
        let mut history = diffs.clone();
        let mut levels = Vec::with_capacity(max_ahead);
        let mut level = recent.values[n - 1];
        for _ in 0..max_ahead {
            let len = history.len();
            let next = fit.intercept
                + fit
                    .phi
                    .iter()
                    .enumerate()
                    .map(|(i, phi)| phi * history[len - 1 - i])
                    .sum::<f64>();
            history.push(next);
            level += next;
            levels.push(level);
        }

        let normal = Normal::new(0.0, 1.0)
            .map_err(|e| ForecastError::fit(method, format!("normal distribution: {}", e)))?;
        let z = normal.inverse_cdf(0.5 + self.confidence / 2.0);
        let sigma = fit.sigma2.sqrt();
        let psi = psi_weights(&fit.phi, max_ahead);
        let mut cumulative = Vec::with_capacity(max_ahead);
        let mut total = 0.0;
        for w in &psi {
            total += w * w;
            cumulative.push(total);
        }

        let forecasts = ahead.iter().map(|&h| levels[h - 1]).collect();
        let widths: Vec<f64> = ahead
            .iter()
            .map(|&h| z * sigma * cumulative[h - 1].sqrt())
            .collect();

        Ok(ForecastResult::symmetric(
            method,
            recent.timestamps[n - 1],
            &horizon.offsets(),
            forecasts,
            &widths,
        ))
    }
}
