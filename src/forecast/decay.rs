use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use nalgebra::{Dyn, OMatrix, OVector, Owned, Vector3, U3};
use tracing::debug;

use crate::common::stats::std_dev;
use crate::common::types::{ForecastResult, Horizon, TimeSeries};
use crate::error::ForecastError;

use super::models::HISTORY_WINDOW;
use super::strategy::ForecastStrategy;
use super::Method;

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn logit(p: f64) -> f64 {
    let p = p.clamp(0.01, 0.99);
    (p / (1.0 - p)).ln()
}

/// Box constraints on the target and the time constant.
#[derive(Debug, Clone, Copy)]
struct Bounds {
    lo: f64,
    hi: f64,
    ln_tau_min: f64,
    ln_tau_max: f64,
}

impl Bounds {
    fn for_window(values: &[f64], duration: f64) -> Self {
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let pad = (10.0 * (max - min)).max(10.0);
        Bounds {
            lo: min - pad,
            hi: max + pad,
            ln_tau_min: 0.0,
            ln_tau_max: (100.0 * duration).max(2.0).ln(),
        }
    }

    fn target(&self, a: f64) -> f64 {
        self.lo + (self.hi - self.lo) * sigmoid(a)
    }

    fn tau(&self, b: f64) -> f64 {
        (self.ln_tau_min + (self.ln_tau_max - self.ln_tau_min) * sigmoid(b)).exp()
    }
}

/// Unconstrained parameter vector `[T0, a, b]`:
///
///   T∞ = lo + (hi - lo) · σ(a)
///   τ  = exp(ln τmin + (ln τmax - ln τmin) · σ(b))
///
/// so the target stays inside a padded range around the observed data and
/// the time constant stays positive.
struct DecayProblem {
    params: Vector3<f64>,
    bounds: Bounds,
    /// Seconds since the first sample of the window
    t: Vec<f64>,
    y: Vec<f64>,
}

impl DecayProblem {
    fn predict(&self, t: f64) -> f64 {
        let t0 = self.params[0];
        let target = self.bounds.target(self.params[1]);
        let tau = self.bounds.tau(self.params[2]);
        target + (t0 - target) * (-t / tau).exp()
    }
}

impl LeastSquaresProblem<f64, Dyn, U3> for DecayProblem {
    type ParameterStorage = Owned<f64, U3>;
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, U3>;

    fn set_params(&mut self, p: &Vector3<f64>) {
        self.params.copy_from(p);
    }

    fn params(&self) -> Vector3<f64> {
        self.params
    }

    fn residuals(&self) -> Option<OVector<f64, Dyn>> {
        let mut residuals = OVector::<f64, Dyn>::zeros(self.t.len());
        for i in 0..self.t.len() {
            residuals[i] = self.y[i] - self.predict(self.t[i]);
        }
        Some(residuals)
    }

    fn jacobian(&self) -> Option<OMatrix<f64, Dyn, U3>> {
        let t0 = self.params[0];
        let sa = sigmoid(self.params[1]);
        let sb = sigmoid(self.params[2]);
        let target = self.bounds.target(self.params[1]);
        let tau = self.bounds.tau(self.params[2]);
        let dtarget_da = (self.bounds.hi - self.bounds.lo) * sa * (1.0 - sa);
        let dlntau_db = (self.bounds.ln_tau_max - self.bounds.ln_tau_min) * sb * (1.0 - sb);

        let mut jac = OMatrix::<f64, Dyn, U3>::zeros(self.t.len());
        for i in 0..self.t.len() {
            let t = self.t[i];
            let e = (-t / tau).exp();
            // r = y - f, so each column is -∂f/∂p
            jac[(i, 0)] = -e;
            jac[(i, 1)] = -(1.0 - e) * dtarget_da;
            // ∂f/∂τ · ∂τ/∂b = (T0 - T∞) e t / τ² · τ · ∂lnτ/∂b
            jac[(i, 2)] = -(t0 - target) * e * t / tau * dlntau_db;
        }
        Some(jac)
    }
}

/// Newton's-law approach to a fitted target temperature:
/// `T(t) = T∞ + (T0 - T∞) · exp(-t / τ)`, fitted by Levenberg-Marquardt.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialDecay {
    pub window: usize,
    /// Reject fits whose residual std exceeds this share of the data's std.
    pub max_residual_ratio: f64,
    pub band_growth: f64,
}

impl Default for ExponentialDecay {
    fn default() -> Self {
        ExponentialDecay {
            window: HISTORY_WINDOW,
            max_residual_ratio: 0.8,
            band_growth: 0.1,
        }
    }
}

impl ForecastStrategy for ExponentialDecay {
    fn method(&self) -> Method {
        Method::ExponentialDecay
    }

    fn min_samples(&self) -> usize {
        10
    }

    fn forecast(
        &self,
        series: &TimeSeries,
        horizon: Horizon,
    ) -> Result<ForecastResult, ForecastError> {
        let method = Method::ExponentialDecay;
        let recent = series.tail(self.window);
        let n = recent.len();
        if n < self.min_samples() {
            return Err(ForecastError::InsufficientData {
                method,
                required: self.min_samples(),
                actual: n,
            });
        }

        let start = recent.timestamps[0];
        let last_ts = recent.timestamps[n - 1];
        let duration = last_ts - start;
        if duration <= 0.0 {
            return Err(ForecastError::fit(method, "window has no time span"));
        }
        let t: Vec<f64> = recent.timestamps.iter().map(|ts| ts - start).collect();
        let y = recent.values.clone();
        let bounds = Bounds::for_window(&y, duration);

        // Initial guesses: start where the data starts, head as far again as
        // the window has already moved, time constant half the window
        let first = y[0];
        let last = y[n - 1];
        let target_guess = (last + (last - first)).clamp(bounds.lo, bounds.hi);
        let tau_guess = (duration / 2.0).max(1.0);
        let a0 = logit((target_guess - bounds.lo) / (bounds.hi - bounds.lo));
        let b0 = logit(
            (tau_guess.ln() - bounds.ln_tau_min) / (bounds.ln_tau_max - bounds.ln_tau_min),
        );

        let problem = DecayProblem {
            params: Vector3::new(first, a0, b0),
            bounds,
            t,
            y,
        };

        let (fitted, report) = LevenbergMarquardt::new().minimize(problem);
        if !report.termination.was_successful() {
            return Err(ForecastError::fit(
                method,
                format!("did not converge: {:?}", report.termination),
            ));
        }

        let residuals = fitted
            .residuals()
            .ok_or_else(|| ForecastError::fit(method, "residuals unavailable"))?;
        let residual_std = std_dev(residuals.as_slice());
        let spread = std_dev(&fitted.y);
        if !residual_std.is_finite() || residual_std > self.max_residual_ratio * spread {
            return Err(ForecastError::fit(
                method,
                format!(
                    "poor fit: residual std {:.3} vs data std {:.3}",
                    residual_std, spread
                ),
            ));
        }

        debug!(
            t0 = fitted.params[0],
            target = bounds.target(fitted.params[1]),
            tau = bounds.tau(fitted.params[2]),
            residual_std,
            "exponential decay fit"
        );

        let offsets = horizon.offsets();
        let forecasts = offsets
            .iter()
            .map(|o| fitted.predict(duration + o))
            .collect();
        let widths: Vec<f64> = offsets
            .iter()
            .map(|o| residual_std * (1.0 + self.band_growth * (o / 60.0).sqrt()))
            .collect();

        Ok(ForecastResult::symmetric(
            method, last_ts, &offsets, forecasts, &widths,
        ))
    }
}
