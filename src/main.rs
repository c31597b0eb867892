//! # pitcast
//!
//! Command-line front end: read a cook's session logs, smooth them, and
//! print per-probe forecasts as JSON.

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Local;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use pitcast::common::table_reader::{self, SessionLog};
use pitcast::series::{centered_rolling_mean, future_labels};
use pitcast::{
    forecast_temperature, Method, PitcastConfig, Probe, ProbeForecastRow, Result, TimeSeries,
};

#[derive(Parser)]
#[command(name = "pitcast")]
#[command(about = "Smoker and meat temperature forecasting", long_about = None)]
struct Cli {
    /// Log debug output to stderr (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Forecast probe temperatures from session logs
    Forecast(ForecastArgs),

    /// List the available forecasting methods
    Methods,
}

#[derive(clap::Args)]
struct ForecastArgs {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the session CSV files
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Session date prefix (YYYYMMDD), today by default
    #[arg(long)]
    date: Option<String>,

    /// Read a single log file instead of a day's sessions
    #[arg(long)]
    log: Option<PathBuf>,

    /// Probe to forecast (smoker, meat, both)
    #[arg(short, long, default_value = "both")]
    probe: String,

    /// Forecasting method (see `pitcast methods`)
    #[arg(short, long)]
    method: Option<String>,

    /// Minutes of history fed to the forecast
    #[arg(long)]
    past_minutes: Option<f64>,

    /// Minutes to forecast ahead
    #[arg(long)]
    forecast_minutes: Option<f64>,

    /// Trailing rolling-mean window in samples
    #[arg(long)]
    rolling_window: Option<usize>,

    /// Seconds between forecast points
    #[arg(long)]
    step: Option<f64>,

    /// Smooth with a centred, edge-padded window instead of a trailing one
    #[arg(long)]
    centered: bool,
}

#[derive(Serialize)]
struct ProbeReport {
    probe: Probe,
    method: Method,
    history_samples: usize,
    forecast: Vec<ProbeForecastRow>,
}

#[derive(Serialize)]
struct Report {
    session_start: String,
    readings: usize,
    requested_method: Method,
    probes: Vec<ProbeReport>,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &ForecastArgs) -> Result<PitcastConfig> {
    let mut config = match &args.config {
        Some(path) => PitcastConfig::load(path)?,
        None => PitcastConfig::default(),
    };

    if let Some(dir) = &args.dir {
        config.session.dir = dir.clone();
    }
    if let Some(log) = &args.log {
        config.session.log = Some(log.clone());
    }
    if let Some(method) = &args.method {
        config.forecast.method = method.parse()?;
    }
    if let Some(minutes) = args.past_minutes {
        config.forecast.past_minutes = minutes;
    }
    if let Some(minutes) = args.forecast_minutes {
        config.forecast.forecast_minutes = minutes;
    }
    if let Some(window) = args.rolling_window {
        config.forecast.rolling_window = window;
    }
    if let Some(step) = args.step {
        config.forecast.step_seconds = step;
    }
    Ok(config)
}

fn probes(raw: &str) -> Result<Vec<Probe>> {
    if raw.eq_ignore_ascii_case("both") {
        Ok(Probe::ALL.to_vec())
    } else {
        Ok(vec![raw.parse()?])
    }
}

fn read_log(config: &PitcastConfig, date: &str) -> Result<SessionLog> {
    match &config.session.log {
        Some(path) => table_reader::read_session_files(std::slice::from_ref(path)),
        None => table_reader::read_day(&config.session.dir, date),
    }
}

fn smooth(series: &TimeSeries, window: usize, centered: bool) -> TimeSeries {
    if centered {
        TimeSeries {
            timestamps: series.timestamps.clone(),
            values: centered_rolling_mean(&series.values, window),
        }
    } else {
        series.rolling_mean(window)
    }
}

fn run_forecast(args: ForecastArgs) -> Result<Report> {
    let config = load_config(&args)?;
    let date = args
        .date
        .clone()
        .unwrap_or_else(|| Local::now().format("%Y%m%d").to_string());
    let params = config.to_params();
    let horizon = config.forecast.horizon();

    let log = read_log(&config, &date)?;
    info!(readings = log.len(), start = %log.start, "session loaded");

    let mut reports = Vec::new();
    for probe in probes(&args.probe)? {
        let raw = log.probe_series(probe).series;
        let smoothed = smooth(&raw, config.forecast.rolling_window, args.centered);
        let keep = config.forecast.history_samples(&smoothed.timestamps);
        let history = smoothed.tail(keep);
        debug!(%probe, raw = raw.len(), history = history.len(), "prepared series");

        let result = forecast_temperature(&history, horizon, &params)?;
        let labels = future_labels(log.start, &result.timestamps);
        reports.push(ProbeReport {
            probe,
            method: result.method,
            history_samples: history.len(),
            forecast: ProbeForecastRow::from_result(probe, &result, &labels),
        });
    }

    Ok(Report {
        session_start: log.start.format("%H:%M:%S%.3f").to_string(),
        readings: log.len(),
        requested_method: params.method,
        probes: reports,
    })
}

fn list_methods() {
    for method in Method::ALL {
        println!("{:<22} {}", method.name(), method.describe());
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Methods => {
            list_methods();
            ExitCode::SUCCESS
        }
        Commands::Forecast(args) => {
            let outcome = run_forecast(args)
                .and_then(|report| Ok(serde_json::to_string_pretty(&report)?));
            match outcome {
                Ok(json) => {
                    println!("{}", json);
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("pitcast: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
    }
}
