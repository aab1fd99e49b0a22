/// Core data types for the RVI forecasting service.
///
/// This module defines the shared domain model imported by all other modules:
/// the observed `(ds, y)` table, forecast rows, and the error types for each
/// stage of the pipeline. It contains no I/O.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Sentinel-1 query constants
// ---------------------------------------------------------------------------

/// Earth Engine asset id of the Sentinel-1 ground range detected collection.
pub const S1_COLLECTION: &str = "COPERNICUS/S1_GRD";

/// Interferometric Wide swath, the default land acquisition mode.
pub const INSTRUMENT_MODE_IW: &str = "IW";

/// Co-polarised band.
pub const BAND_VV: &str = "VV";

/// Cross-polarised band. The RVI image keeps this band name after the
/// arithmetic, so the region reduction result is read back under this key.
pub const BAND_VH: &str = "VH";

/// Date format passed to `Date.format` on the server (Joda pattern).
pub const EE_DATE_FORMAT: &str = "YYYY-MM-dd";

/// The same format as understood by chrono when parsing results.
pub const DS_FORMAT: &str = "%Y-%m-%d";

// ---------------------------------------------------------------------------
// Observation types
// ---------------------------------------------------------------------------

/// Mean RVI over the area of interest for one Sentinel-1 scene.
///
/// `y` is `None` when the region reduction produced no value, typically
/// because every pixel in the AOI was masked for that acquisition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RviObservation {
    pub ds: NaiveDate,
    pub y: Option<f64>,
}

/// The observed time series for one area, sorted ascending by date.
///
/// Several scenes can share a date (adjacent frames of the same pass), so
/// dates are not unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RviSeries {
    pub area: String,
    pub observations: Vec<RviObservation>,
}

impl RviSeries {
    /// Builds a series from unordered records. The sort is stable so scenes
    /// sharing a date keep the order the service returned them in.
    pub fn from_records(area: impl Into<String>, mut observations: Vec<RviObservation>) -> Self {
        observations.sort_by_key(|o| o.ds);
        Self {
            area: area.into(),
            observations,
        }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Rows with an observed value, as `(date, value)` pairs.
    pub fn valid_points(&self) -> Vec<(NaiveDate, f64)> {
        self.observations
            .iter()
            .filter_map(|o| o.y.filter(|v| v.is_finite()).map(|v| (o.ds, v)))
            .collect()
    }

    /// First and last observation dates, if any.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.observations.first()?.ds;
        let last = self.observations.last()?.ds;
        Some((first, last))
    }

    /// Appends a row, keeping the series sorted.
    pub fn push(&mut self, observation: RviObservation) {
        let idx = self.observations.partition_point(|o| o.ds <= observation.ds);
        self.observations.insert(idx, observation);
    }
}

// ---------------------------------------------------------------------------
// Forecast types
// ---------------------------------------------------------------------------

/// One row of model output, for either a history date or a future date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub ds: NaiveDate,
    pub trend: f64,
    pub yearly: f64,
    pub weekly: f64,
    pub daily: f64,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
}

/// Everything produced by one forecasting pass.
#[derive(Debug, Clone)]
pub struct ForecastOutcome {
    /// Model output over history dates followed by the future horizon.
    pub forecast: Vec<ForecastPoint>,
    /// The observed series with the final forecasted value appended.
    pub extended: RviSeries,
    /// `yhat` of the last forecast row.
    pub final_value: f64,
    /// Date of the last forecast row.
    pub final_date: NaiveDate,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised while interpreting an area-of-interest description.
#[derive(Debug, Error, PartialEq)]
pub enum AoiError {
    #[error("GeoJSON is missing '{0}'")]
    MissingField(&'static str),
    #[error("unsupported geometry type '{0}', expected Polygon")]
    UnsupportedGeometry(String),
    #[error("invalid coordinates: {0}")]
    InvalidCoordinates(String),
    #[error("unknown area '{0}'")]
    UnknownArea(String),
    #[error("no area selected: pass --aoi or --area, or add an [[area]] entry to the config")]
    NoAreaSelected,
    #[error("failed to read area file {path}: {reason}")]
    Io { path: String, reason: String },
}

/// Errors that can arise when querying the Earth Engine REST API.
#[derive(Debug, Error)]
pub enum EeError {
    /// Non-2xx HTTP response from the service.
    #[error("HTTP error: {status}: {message}")]
    Http { status: u16, message: String },
    /// Transport-level failure (DNS, TLS, timeout, ...).
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The response body could not be interpreted.
    #[error("Parse error: {0}")]
    Parse(String),
    /// No project or access token was configured.
    #[error("Missing credentials: {0}")]
    MissingCredentials(&'static str),
}

/// Errors from fitting or evaluating the forecast model.
#[derive(Debug, Error, PartialEq)]
pub enum ForecastError {
    #[error("insufficient data: need at least {required} observations, got {actual}")]
    InsufficientData { required: usize, actual: usize },
    #[error("history spans a single date; cannot scale time")]
    ZeroTimeSpan,
    #[error("numerical error: {0}")]
    Numerical(String),
    #[error("model has not been fitted")]
    NotFitted,
}

/// Errors from rendering or writing the chart.
#[derive(Debug, Error)]
pub enum ChartError {
    #[error("nothing to plot")]
    NoData,
    #[error("render error: {0}")]
    Render(String),
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(date: &str, y: Option<f64>) -> RviObservation {
        RviObservation {
            ds: NaiveDate::parse_from_str(date, DS_FORMAT).unwrap(),
            y,
        }
    }

    #[test]
    fn test_from_records_sorts_by_date() {
        let series = RviSeries::from_records(
            "paddy",
            vec![
                obs("2022-03-10", Some(0.4)),
                obs("2022-01-05", Some(0.3)),
                obs("2022-02-01", None),
            ],
        );
        let dates: Vec<_> = series.observations.iter().map(|o| o.ds.to_string()).collect();
        assert_eq!(dates, ["2022-01-05", "2022-02-01", "2022-03-10"]);
    }

    #[test]
    fn test_from_records_keeps_duplicate_dates_in_input_order() {
        let series = RviSeries::from_records(
            "paddy",
            vec![
                obs("2022-01-05", Some(0.1)),
                obs("2022-01-01", Some(0.9)),
                obs("2022-01-05", Some(0.2)),
            ],
        );
        assert_eq!(series.len(), 3);
        assert_eq!(series.observations[1].y, Some(0.1));
        assert_eq!(series.observations[2].y, Some(0.2));
    }

    #[test]
    fn test_valid_points_skips_missing_and_non_finite_values() {
        let series = RviSeries::from_records(
            "paddy",
            vec![
                obs("2022-01-01", Some(0.5)),
                obs("2022-01-13", None),
                obs("2022-01-25", Some(f64::NAN)),
            ],
        );
        assert_eq!(series.valid_points().len(), 1);
    }

    #[test]
    fn test_push_keeps_series_sorted() {
        let mut series = RviSeries::from_records(
            "paddy",
            vec![obs("2022-01-01", Some(0.5)), obs("2022-03-01", Some(0.6))],
        );
        series.push(obs("2022-02-01", Some(0.7)));
        series.push(obs("2023-01-01", Some(0.8)));
        let (first, last) = series.date_range().unwrap();
        assert_eq!(first.to_string(), "2022-01-01");
        assert_eq!(last.to_string(), "2023-01-01");
        assert_eq!(series.observations[1].y, Some(0.7));
    }

    #[test]
    fn test_error_messages_carry_context() {
        let err = EeError::Http {
            status: 403,
            message: "Permission denied".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP error: 403: Permission denied");

        let err = ForecastError::InsufficientData { required: 2, actual: 1 };
        assert!(err.to_string().contains("at least 2"));
    }
}
