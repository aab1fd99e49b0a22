//! End-to-end steps shared by the CLI commands.
//!
//! fetch (Earth Engine) → forecast → chart. Each step is usable on its own so
//! `replay` can start from a saved series instead of a live fetch.

use std::path::Path;

use thiserror::Error;

use crate::aoi::Area;
use crate::analysis;
use crate::chart::{self, ChartOptions};
use crate::config::{ChartConfig, Config, ConfigError};
use crate::ingest::earth_engine::EarthEngineClient;
use crate::logging::{self, DataSource};
use crate::model::{AoiError, ChartError, EeError, ForecastError, ForecastOutcome, RviSeries};
use crate::replay::ReplayError;
use crate::verify::VerificationReport;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Aoi(#[from] AoiError),
    #[error(transparent)]
    EarthEngine(#[from] EeError),
    #[error(transparent)]
    Forecast(#[from] ForecastError),
    #[error(transparent)]
    Chart(#[from] ChartError),
    #[error(transparent)]
    Replay(#[from] ReplayError),
    #[error("verification failed for {failed} of {total} areas")]
    VerificationFailed { failed: usize, total: usize },
}

impl From<&ChartConfig> for ChartOptions {
    fn from(config: &ChartConfig) -> Self {
        ChartOptions {
            title: config.title.clone(),
            width: config.width,
            height: config.height,
            ..ChartOptions::default()
        }
    }
}

/// Queries the per-scene RVI series for an area.
pub fn fetch_series(client: &EarthEngineClient, area: &Area, config: &Config) -> Result<RviSeries, EeError> {
    logging::info(
        DataSource::EarthEngine,
        Some(&area.name),
        &format!(
            "Querying Sentinel-1 RVI {} to {} ({} pass)",
            config.query.start_date,
            config.query.end_date,
            config.query.orbit_pass.as_str()
        ),
    );

    let series = client.fetch_rvi_series(area, &config.query).map_err(|e| {
        logging::log_ee_failure(&area.name, "RVI fetch", &e);
        e
    })?;

    let usable = series.valid_points().len();
    logging::log_fetch_summary(&area.name, series.len(), usable);
    if usable < 2 {
        logging::warn(
            DataSource::EarthEngine,
            Some(&area.name),
            "Too few usable scenes to fit a forecast; widen the date range or check the AOI",
        );
    }
    Ok(series)
}

/// Forecasts a series and writes the HTML report.
pub fn forecast_and_render(
    series: &RviSeries,
    config: &Config,
    output: &Path,
) -> Result<ForecastOutcome, AppError> {
    let outcome = analysis::forecast_series(series, &config.forecast)?;

    let html = chart::render_html(&outcome, series, &ChartOptions::from(&config.chart))?;
    chart::write_report(output, &html)?;
    logging::info(
        DataSource::Chart,
        Some(&series.area),
        &format!("Report written to {}", output.display()),
    );

    Ok(outcome)
}

/// Fails when any area could not be verified, so `verify` can gate scripts.
pub fn require_verified(report: &VerificationReport) -> Result<(), AppError> {
    if report.summary.failed > 0 {
        return Err(AppError::VerificationFailed {
            failed: report.summary.failed,
            total: report.summary.total,
        });
    }
    Ok(())
}
