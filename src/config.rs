//! Configuration file support for pitcast.
//!
//! Every section and field is optional; missing values take the defaults
//! below. Command-line flags override whatever the file sets.
//!
//! # Example TOML configuration:
//! ```toml
//! [session]
//! dir = "./temperature"
//!
//! [forecast]
//! method = "adaptive"
//! past_minutes = 10
//! forecast_minutes = 10
//! step_seconds = 1.0
//! rolling_window = 9
//! weights = { exponential = { decay = 0.8 } }
//!
//! [thresholds]
//! moving_average_variance = 0.5
//! decay_trend_strength = 2.0
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::common::types::{detect_interval, Horizon};
use crate::error::Result;
use crate::forecast::params::{ForecastParams, RecencyWeights, SelectionThresholds};
use crate::forecast::Method;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PitcastConfig {
    pub session: SessionConfig,
    pub forecast: ForecastConfig,
    pub thresholds: SelectionThresholds,
}

/// Where session logs are read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Directory holding the `YYYYMMDD*.csv` session files
    pub dir: PathBuf,

    /// A single log file; takes precedence over `dir` when set
    pub log: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./temperature"),
            log: None,
        }
    }
}

/// Forecast window and method settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub method: Method,

    /// Minutes of history fed to the forecast
    pub past_minutes: f64,

    /// Minutes to forecast ahead
    pub forecast_minutes: f64,

    /// Seconds between forecast points
    pub step_seconds: f64,

    /// Trailing rolling-mean window applied before forecasting (samples)
    pub rolling_window: usize,

    /// Recency weighting for the moving average
    pub weights: RecencyWeights,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            method: Method::Adaptive,
            past_minutes: 10.0,
            forecast_minutes: 10.0,
            step_seconds: 1.0,
            rolling_window: 9,
            weights: RecencyWeights::Linear,
        }
    }
}

impl ForecastConfig {
    /// Horizon covering `forecast_minutes` in `step_seconds` steps.
    pub fn horizon(&self) -> Horizon {
        let steps = if self.step_seconds > 0.0 && self.forecast_minutes > 0.0 {
            (self.forecast_minutes * 60.0 / self.step_seconds).round() as usize
        } else {
            0
        };
        Horizon::new(steps, self.step_seconds)
    }

    /// How many trailing samples make up `past_minutes` of history at the
    /// sampling interval of `timestamps`.
    pub fn history_samples(&self, timestamps: &[f64]) -> usize {
        let interval = detect_interval(timestamps);
        ((self.past_minutes.max(0.0) * 60.0) / interval).ceil() as usize
    }
}

impl PitcastConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Forecast parameters for the core.
    pub fn to_params(&self) -> ForecastParams {
        ForecastParams {
            method: self.forecast.method,
            thresholds: self.thresholds,
            weights: self.forecast.weights,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_is_default() {
        let config = PitcastConfig::from_toml("").unwrap();
        assert_eq!(config, PitcastConfig::default());
        assert_eq!(config.forecast.rolling_window, 9);
        assert_eq!(config.session.dir, PathBuf::from("./temperature"));
    }

    #[test]
    fn test_partial_sections() {
        let toml = r#"
[forecast]
method = "moving_average"
forecast_minutes = 2
weights = { exponential = { decay = 0.8 } }

[thresholds]
decay_trend_strength = 3.5
"#;
        let config = PitcastConfig::from_toml(toml).unwrap();
        assert_eq!(config.forecast.method, Method::MovingAverage);
        assert_eq!(config.forecast.past_minutes, 10.0);
        assert_eq!(
            config.forecast.weights,
            RecencyWeights::Exponential { decay: 0.8 }
        );

        let params = config.to_params();
        assert_eq!(params.thresholds.decay_trend_strength, 3.5);
        assert_eq!(params.thresholds.moving_average_variance, 0.5);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_unknown_method_is_error() {
        let err = PitcastConfig::from_toml("[forecast]\nmethod = \"prophet\"").unwrap_err();
        assert!(err.to_string().starts_with("config:"), "Error: {}", err);
    }

    #[test]
    fn test_horizon_and_history() {
        let forecast = ForecastConfig {
            forecast_minutes: 2.0,
            step_seconds: 5.0,
            past_minutes: 1.0,
            ..Default::default()
        };
        let horizon = forecast.horizon();
        assert_eq!(horizon.steps, 24);
        assert_eq!(horizon.step_seconds, 5.0);

        let timestamps: Vec<f64> = (0..100).map(|i| i as f64 * 2.0).collect();
        assert_eq!(forecast.history_samples(&timestamps), 30);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[session]\ndir = \"/var/log/smoker\"").unwrap();
        let config = PitcastConfig::load(file.path()).unwrap();
        assert_eq!(config.session.dir, PathBuf::from("/var/log/smoker"));
        assert!(config.session.log.is_none());
    }
}
