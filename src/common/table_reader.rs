use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, NaiveTime};
use duckdb::Connection;
use tracing::{debug, warn};

use super::grouping::{Probe, ProbeSeries};
use super::types::TimeSeries;
use crate::error::{PitcastError, Result};
use crate::series::cleaning::dedup_by_timestamp;

/// One logged row: time of day plus both probe temperatures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub time: NaiveTime,
    pub smoker: f64,
    pub meat: f64,
}

/// All readings of one or more session files, ordered by time.
#[derive(Debug, Clone)]
pub struct SessionLog {
    /// Earliest reading; elapsed seconds are measured from here.
    pub start: NaiveTime,
    pub readings: Vec<Reading>,
}

impl SessionLog {
    fn from_readings(mut readings: Vec<Reading>) -> Option<Self> {
        readings.sort_by_key(|r| r.time);
        let start = readings.first()?.time;
        Some(SessionLog { start, readings })
    }

    /// Seconds since `start` for every reading.
    pub fn elapsed_seconds(&self) -> Vec<f64> {
        self.readings
            .iter()
            .map(|r| {
                let delta = r.time.signed_duration_since(self.start);
                delta.num_microseconds().unwrap_or(0) as f64 / 1e6
            })
            .collect()
    }

    /// The deduplicated series of one probe.
    pub fn probe_series(&self, probe: Probe) -> ProbeSeries {
        let values = self
            .readings
            .iter()
            .map(|r| match probe {
                Probe::Smoker => r.smoker,
                Probe::Meat => r.meat,
            })
            .collect();
        let series = dedup_by_timestamp(TimeSeries {
            timestamps: self.elapsed_seconds(),
            values,
        });
        ProbeSeries { probe, series }
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

/// List a day's session files: `<dir>/<date_prefix>*.csv`, sorted by name.
pub fn session_files(dir: &Path, date_prefix: &str) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(date_prefix) && n.ends_with(".csv"))
                .unwrap_or(false)
        })
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(PitcastError::NoSessionFiles {
            dir: dir.display().to_string(),
            prefix: date_prefix.to_string(),
        });
    }
    Ok(files)
}

/// Read and concatenate session files through DuckDB's CSV reader.
///
/// Files carry no header; each row is `time,smoker_temp,meat_temp`. Rows
/// with NULL or NaN temperatures, or a time that cannot be parsed, are
/// skipped.
pub fn read_session_files(files: &[PathBuf]) -> Result<SessionLog> {
    let description = files
        .iter()
        .map(|f| f.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    if files.is_empty() {
        return Err(PitcastError::NoReadings(description));
    }

    let file_list = files
        .iter()
        .map(|f| format!("'{}'", escape_literal(&f.to_string_lossy())))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!(
        "SELECT \"datetime\", \"{smoker}\", \"{meat}\" FROM read_csv([{files}], \
         header = false, delim = ',', ignore_errors = true, \
         columns = {{'datetime': 'VARCHAR', '{smoker}': 'DOUBLE', '{meat}': 'DOUBLE'}})",
        smoker = Probe::Smoker.column(),
        meat = Probe::Meat.column(),
        files = file_list,
    );
    debug!(%sql, "reading session files");

    let conn = Connection::open_in_memory()?;
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, Option<String>>(0)?,
            row.get::<_, Option<f64>>(1)?,
            row.get::<_, Option<f64>>(2)?,
        ))
    })?;

    let mut readings = Vec::new();
    let mut skipped = 0usize;
    for row in rows {
        let (raw_time, smoker, meat) = row?;

        let (Some(raw_time), Some(smoker), Some(meat)) = (raw_time, smoker, meat) else {
            skipped += 1;
            continue;
        };
        if smoker.is_nan() || meat.is_nan() {
            skipped += 1;
            continue;
        }
        let Some(time) = parse_time(&raw_time) else {
            warn!(value = %raw_time, "skipping row with unparsable time");
            skipped += 1;
            continue;
        };

        readings.push(Reading { time, smoker, meat });
    }

    if skipped > 0 {
        warn!(skipped, "skipped malformed session rows");
    }

    SessionLog::from_readings(readings).ok_or(PitcastError::NoReadings(description))
}

/// Read every session file of one day from `dir`.
pub fn read_day(dir: &Path, date_prefix: &str) -> Result<SessionLog> {
    let files = session_files(dir, date_prefix)?;
    debug!(count = files.len(), "found session files");
    read_session_files(&files)
}

/// Parse a logged time of day. The logger writes Python `time` values,
/// which drop the fraction when it is zero; full datetimes are accepted too.
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
                .ok()
                .map(|dt| dt.time())
        })
}

/// Escape a SQL string literal by doubling any internal single quotes.
fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}
