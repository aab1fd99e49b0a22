/// Offline replay of previously fetched series
///
/// A fetched `RviSeries` can be saved as JSON and later forecast again
/// without Earth Engine credentials, e.g. to try different model settings
/// or to work on the chart while the service is unavailable.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::model::RviSeries;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to access series file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid series file {path}: {source}")]
    Format {
        path: String,
        source: serde_json::Error,
    },
}

/// Writes the series as pretty-printed JSON, creating parent directories.
pub fn save_series(path: &Path, series: &RviSeries) -> Result<(), ReplayError> {
    let io_err = |source| ReplayError::Io {
        path: path.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let json = serde_json::to_string_pretty(series).map_err(|source| ReplayError::Format {
        path: path.display().to_string(),
        source,
    })?;
    fs::write(path, json).map_err(io_err)
}

/// Reads a series written by `save_series`. Rows are re-sorted in case the
/// file was edited by hand.
pub fn load_series(path: &Path) -> Result<RviSeries, ReplayError> {
    let text = fs::read_to_string(path).map_err(|source| ReplayError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let series: RviSeries = serde_json::from_str(&text).map_err(|source| ReplayError::Format {
        path: path.display().to_string(),
        source,
    })?;
    Ok(RviSeries::from_records(series.area, series.observations))
}
