use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::types::{ForecastResult, TimeSeries};
use crate::error::PitcastError;

/// The two independently tracked temperature series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Probe {
    Smoker,
    Meat,
}

impl Probe {
    pub const ALL: [Probe; 2] = [Probe::Smoker, Probe::Meat];

    /// Column name of this probe in the session CSV files.
    pub fn column(&self) -> &'static str {
        match self {
            Probe::Smoker => "smoker_temp",
            Probe::Meat => "meat_temp",
        }
    }
}

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Probe::Smoker => write!(f, "smoker"),
            Probe::Meat => write!(f, "meat"),
        }
    }
}

impl FromStr for Probe {
    type Err = PitcastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "smoker" | "smoker_temp" => Ok(Probe::Smoker),
            "meat" | "meat_temp" => Ok(Probe::Meat),
            _ => Err(PitcastError::Unknown {
                kind: "probe",
                value: s.to_string(),
            }),
        }
    }
}

/// A time series associated with a specific probe.
#[derive(Debug, Clone)]
pub struct ProbeSeries {
    pub probe: Probe,
    pub series: TimeSeries,
}

/// A single output row of a per-probe forecast.
///
/// Flat struct so the CLI can emit one JSON object per future step.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeForecastRow {
    pub probe: Probe,
    /// Future timestamp in elapsed seconds.
    pub timestamp: f64,
    /// Wall-clock label for the future timestamp.
    pub label: String,
    pub forecast: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

impl ProbeForecastRow {
    /// Flatten a forecast into rows, pairing each step with its label.
    pub fn from_result(probe: Probe, result: &ForecastResult, labels: &[String]) -> Vec<Self> {
        (0..result.len())
            .map(|i| ProbeForecastRow {
                probe,
                timestamp: result.timestamps[i],
                label: labels.get(i).cloned().unwrap_or_default(),
                forecast: result.forecasts[i],
                lower_bound: result.lower_bounds[i],
                upper_bound: result.upper_bounds[i],
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::Method;

    #[test]
    fn test_probe_parse() {
        assert_eq!("Smoker".parse::<Probe>().unwrap(), Probe::Smoker);
        assert_eq!("meat_temp".parse::<Probe>().unwrap(), Probe::Meat);
        assert!("ambient".parse::<Probe>().is_err());
    }

    #[test]
    fn test_rows_from_result() {
        let result = ForecastResult::symmetric(
            Method::SimpleTrend,
            10.0,
            &[1.0, 2.0],
            vec![50.0, 51.0],
            &[1.0, 1.5],
        );
        let labels = vec!["00:00:11.000".to_string()];
        let rows = ProbeForecastRow::from_result(Probe::Meat, &result, &labels);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].label, "00:00:11.000");
        assert_eq!(rows[1].label, "");
        assert_eq!(rows[1].timestamp, 12.0);
        assert_eq!(rows[1].upper_bound, 52.5);
        assert_eq!(rows[1].lower_bound, 49.5);
    }
}
