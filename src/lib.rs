//! Short-horizon temperature forecasting for BBQ smoker and meat probes.
//!
//! The core entry point is [`forecast_temperature`]: give it a
//! [`TimeSeries`] of (elapsed seconds, °C) samples and a [`Horizon`], and
//! it returns point forecasts with symmetric confidence bands. Method
//! failures fall back along a chain that ends at the simple trend, so a
//! valid call always produces a result.

pub mod common;
pub mod config;
pub mod error;
pub mod forecast;
pub mod series;

pub use common::grouping::{Probe, ProbeForecastRow, ProbeSeries};
pub use common::types::{ForecastResult, Horizon, TimeSeries};
pub use config::PitcastConfig;
pub use error::{ForecastError, PitcastError, Result};
pub use forecast::params::ForecastParams;
pub use forecast::{forecast_samples, forecast_temperature, select_method, Method};
