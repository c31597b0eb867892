use thiserror::Error;

use crate::forecast::Method;

/// Errors raised by the forecasting core.
///
/// Individual methods return these; the fallback chain catches them and
/// moves on to the next method, so callers of the dispatcher only see the
/// validation variants.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("need at least {required} samples for {method}, got {actual}")]
    InsufficientData {
        method: Method,
        required: usize,
        actual: usize,
    },

    #[error("{method} fit failed: {reason}")]
    FitFailed { method: Method, reason: String },

    #[error("{method} produced a non-finite value at step {step}")]
    NonFiniteOutput { method: Method, step: usize },

    #[error("timestamps and temperatures differ in length ({timestamps} vs {values})")]
    LengthMismatch { timestamps: usize, values: usize },

    #[error("non-finite sample at index {0}")]
    NonFiniteSample(usize),

    #[error("sample at index {index} exceeds magnitude {bound:e}")]
    SampleOutOfRange { index: usize, bound: f64 },

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },
}

impl ForecastError {
    pub(crate) fn fit(method: Method, reason: impl Into<String>) -> Self {
        ForecastError::FitFailed {
            method,
            reason: reason.into(),
        }
    }
}

/// Errors raised around the forecasting core: reading session logs,
/// loading configuration, parsing CLI input.
#[derive(Debug, Error)]
pub enum PitcastError {
    #[error(transparent)]
    Forecast(#[from] ForecastError),

    #[error("duckdb: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no session files matching '{prefix}*.csv' in {dir}")]
    NoSessionFiles { dir: String, prefix: String },

    #[error("no valid readings in {0}")]
    NoReadings(String),

    #[error("unknown {kind} '{value}'")]
    Unknown { kind: &'static str, value: String },
}

pub type Result<T, E = PitcastError> = std::result::Result<T, E>;
