use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, warn};

use crate::common::types::{ForecastResult, Horizon, TimeSeries};
use crate::error::ForecastError;

use super::models::SimpleTrend;
use super::Method;

/// A single forecasting method.
pub trait ForecastStrategy {
    /// Which method this strategy implements.
    fn method(&self) -> Method;

    /// Samples needed before `forecast` can succeed.
    fn min_samples(&self) -> usize;

    /// Produce `horizon.steps` forecasts with symmetric bands.
    fn forecast(&self, series: &TimeSeries, horizon: Horizon)
        -> Result<ForecastResult, ForecastError>;
}

/// Strategies tried in order until one succeeds.
///
/// Strategies below their minimum sample count are skipped. Errors, panics
/// from the numeric libraries, and results holding NaN/Inf all fall through
/// to the next strategy.
#[derive(Default)]
pub struct FallbackChain {
    strategies: Vec<Box<dyn ForecastStrategy>>,
}

impl FallbackChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a strategy to the end of the chain.
    pub fn then<S: ForecastStrategy + 'static>(mut self, strategy: S) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Make sure the chain ends with the simple trend forecast.
    pub fn terminated(self) -> Self {
        match self.strategies.last() {
            Some(last) if last.method() == Method::SimpleTrend => self,
            _ => self.then(SimpleTrend::default()),
        }
    }

    /// Methods in the order they will be tried.
    pub fn methods(&self) -> Vec<Method> {
        self.strategies.iter().map(|s| s.method()).collect()
    }

    /// Run the chain. Never fails: when every strategy is skipped or fails
    /// the result is three empty sequences.
    pub fn run(&self, series: &TimeSeries, horizon: Horizon) -> ForecastResult {
        for strategy in &self.strategies {
            let method = strategy.method();

            if series.len() < strategy.min_samples() {
                debug!(
                    %method,
                    samples = series.len(),
                    required = strategy.min_samples(),
                    "skipping method: insufficient data"
                );
                continue;
            }

            let outcome = catch_unwind(AssertUnwindSafe(|| strategy.forecast(series, horizon)));

            match outcome {
                Ok(Ok(result)) => match result.first_non_finite() {
                    None => {
                        debug!(%method, steps = result.len(), "forecast produced");
                        return result;
                    }
                    Some(step) => {
                        let err = ForecastError::NonFiniteOutput { method, step };
                        warn!(error = %err, "falling back");
                    }
                },
                Ok(Err(err)) => {
                    warn!(error = %err, "falling back");
                }
                Err(_) => {
                    warn!(%method, "method panicked during fitting, falling back");
                }
            }
        }

        ForecastResult::empty(Method::SimpleTrend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl ForecastStrategy for Failing {
        fn method(&self) -> Method {
            Method::Polynomial
        }
        fn min_samples(&self) -> usize {
            0
        }
        fn forecast(&self, _: &TimeSeries, _: Horizon) -> Result<ForecastResult, ForecastError> {
            Err(ForecastError::fit(Method::Polynomial, "singular matrix"))
        }
    }

    struct Panicking;

    impl ForecastStrategy for Panicking {
        fn method(&self) -> Method {
            Method::Arima
        }
        fn min_samples(&self) -> usize {
            0
        }
        fn forecast(&self, _: &TimeSeries, _: Horizon) -> Result<ForecastResult, ForecastError> {
            panic!("matrix dimensions mismatch")
        }
    }

    struct NotANumber;

    impl ForecastStrategy for NotANumber {
        fn method(&self) -> Method {
            Method::ExponentialDecay
        }
        fn min_samples(&self) -> usize {
            0
        }
        fn forecast(&self, _: &TimeSeries, h: Horizon) -> Result<ForecastResult, ForecastError> {
            let offsets = h.offsets();
            let nan = vec![f64::NAN; h.steps];
            Ok(ForecastResult::symmetric(
                Method::ExponentialDecay,
                0.0,
                &offsets,
                nan.clone(),
                &nan,
            ))
        }
    }

    fn ramp(n: usize) -> TimeSeries {
        TimeSeries {
            timestamps: (0..n).map(|i| i as f64).collect(),
            values: (0..n).map(|i| 100.0 + i as f64).collect(),
        }
    }

    #[test]
    fn test_terminated_appends_simple_trend_once() {
        let chain = FallbackChain::new().then(Failing).terminated().terminated();
        assert_eq!(chain.methods(), vec![Method::Polynomial, Method::SimpleTrend]);
    }

    #[test]
    fn test_errors_fall_through() {
        let chain = FallbackChain::new().then(Failing).terminated();
        let result = chain.run(&ramp(6), Horizon::new(3, 1.0));
        assert_eq!(result.method, Method::SimpleTrend);
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn test_panics_fall_through() {
        let chain = FallbackChain::new().then(Panicking).terminated();
        let result = chain.run(&ramp(6), Horizon::new(3, 1.0));
        assert_eq!(result.method, Method::SimpleTrend);
    }

    #[test]
    fn test_non_finite_results_fall_through() {
        let chain = FallbackChain::new().then(NotANumber).terminated();
        let result = chain.run(&ramp(6), Horizon::new(4, 1.0));
        assert_eq!(result.method, Method::SimpleTrend);
        assert!(result.first_non_finite().is_none());
    }

    #[test]
    fn test_exhausted_chain_is_empty() {
        let chain = FallbackChain::new().terminated();
        let result = chain.run(&ramp(2), Horizon::new(3, 1.0));
        assert!(result.is_empty());
        assert!(result.upper_bounds.is_empty());
        assert!(result.lower_bounds.is_empty());
    }
}
