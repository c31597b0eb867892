use std::fs;
use std::path::Path;

use pitcast::common::table_reader::{read_day, read_session_files, session_files};
use pitcast::series::future_labels;
use pitcast::{forecast_temperature, ForecastParams, Horizon, PitcastError, Probe};
use tempfile::TempDir;

fn write(dir: &Path, name: &str, body: &str) {
    fs::write(dir.join(name), body).unwrap();
}

fn session_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "20240601_1.csv",
        "10:00:00.000000,100.0,30.0\n10:00:01.100000,101.0,30.5\n10:00:02.200000,102.0,31.0\n",
    );
    write(
        dir.path(),
        "20240601_2.csv",
        "10:00:03.300000,103.0,31.5\n10:00:04.400000,104.0,32.0\n10:00:05.500000,105.0,32.5\n",
    );
    write(dir.path(), "20240531_1.csv", "09:00:00,500.0,500.0\n");
    write(dir.path(), "20240601_notes.txt", "not a session\n");
    dir
}

#[test]
fn lists_only_the_days_csv_files() {
    let dir = session_dir();
    let files = session_files(dir.path(), "20240601").unwrap();
    let names: Vec<String> = files
        .iter()
        .map(|f| f.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["20240601_1.csv", "20240601_2.csv"]);
}

#[test]
fn reads_and_concatenates_a_day() {
    let dir = session_dir();
    let log = read_day(dir.path(), "20240601").unwrap();
    assert_eq!(log.len(), 6);
    assert_eq!(log.start.format("%H:%M:%S").to_string(), "10:00:00");

    let smoker = log.probe_series(Probe::Smoker);
    assert_eq!(smoker.series.values, vec![100.0, 101.0, 102.0, 103.0, 104.0, 105.0]);
    assert!((smoker.series.timestamps[5] - 5.5).abs() < 1e-9);

    let meat = log.probe_series(Probe::Meat);
    assert_eq!(meat.series.values[0], 30.0);
    assert_eq!(meat.series.values[5], 32.5);
}

#[test]
fn skips_malformed_rows() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "20240602.csv",
        "10:00:00,100.0,30.0\n\
         10:00:01,,30.1\n\
         garbage,101.0,30.2\n\
         10:00:02,nan,30.3\n\
         10:00:03,102.0,abc\n\
         10:00:04,103.0,30.5\n",
    );
    let log = read_day(dir.path(), "20240602").unwrap();
    let smoker = log.probe_series(Probe::Smoker);
    assert_eq!(smoker.series.values, vec![100.0, 103.0]);
    assert_eq!(smoker.series.timestamps, vec![0.0, 4.0]);
}

#[test]
fn missing_day_is_an_error() {
    let dir = session_dir();
    let err = read_day(dir.path(), "20991231").unwrap_err();
    assert!(matches!(err, PitcastError::NoSessionFiles { .. }), "Error: {}", err);
}

#[test]
fn file_without_valid_rows_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "20240603.csv", "garbage,1.0,2.0\n");
    let err = read_session_files(&[dir.path().join("20240603.csv")]).unwrap_err();
    assert!(matches!(err, PitcastError::NoReadings(_)), "Error: {}", err);
}

#[test]
fn session_to_labelled_forecast() {
    let dir = session_dir();
    let log = read_day(dir.path(), "20240601").unwrap();
    let series = log.probe_series(Probe::Smoker).series;

    let result =
        forecast_temperature(&series, Horizon::new(3, 1.0), &ForecastParams::default()).unwrap();
    assert_eq!(result.len(), 3);
    assert!(result.forecasts[0] > 105.0);

    let labels = future_labels(log.start, &result.timestamps);
    assert_eq!(labels, vec!["10:00:06.500", "10:00:07.500", "10:00:08.500"]);
}
