/// Configuration loading for the RVI forecasting service.
///
/// Settings come from, in increasing precedence: built-in defaults, the TOML
/// config file, environment variables (a `.env` file is loaded first if
/// present), and finally command-line flags applied by the binary.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;

use crate::aoi::AreaConfig;
use crate::model::DS_FORMAT;

pub const DEFAULT_CONFIG_PATH: &str = "./rvi_forecast.toml";
pub const DEFAULT_EE_ENDPOINT: &str = "https://earthengine.googleapis.com";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EarthEngineConfig {
    pub endpoint: String,
    pub project: Option<String>,
    /// Never written in the file; taken from `EE_ACCESS_TOKEN`.
    #[serde(skip)]
    pub access_token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for EarthEngineConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_EE_ENDPOINT.to_string(),
            project: None,
            access_token: None,
            timeout_secs: 120,
        }
    }
}

/// Sentinel-1 orbit direction filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrbitPass {
    Ascending,
    Descending,
}

impl OrbitPass {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrbitPass::Ascending => "ASCENDING",
            OrbitPass::Descending => "DESCENDING",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub start_date: NaiveDate,
    /// Exclusive upper bound.
    pub end_date: NaiveDate,
    pub orbit_pass: OrbitPass,
    /// Region reduction scale in metres.
    pub scale: f64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            start_date: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            orbit_pass: OrbitPass::Ascending,
            scale: 10.0,
        }
    }
}

/// Tri-state switch for a seasonal component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Toggle {
    Explicit(bool),
    Named(AutoKeyword),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoKeyword {
    Auto,
}

impl Toggle {
    pub const AUTO: Toggle = Toggle::Named(AutoKeyword::Auto);

    /// Resolves the switch, falling back to `auto` when not explicit.
    pub fn resolve(self, auto: bool) -> bool {
        match self {
            Toggle::Explicit(on) => on,
            Toggle::Named(AutoKeyword::Auto) => auto,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Number of daily steps forecast past the last observation.
    pub periods: u32,
    pub yearly_seasonality: Toggle,
    pub weekly_seasonality: Toggle,
    pub daily_seasonality: Toggle,
    pub n_changepoints: usize,
    pub changepoint_range: f64,
    pub changepoint_prior_scale: f64,
    pub seasonality_prior_scale: f64,
    pub interval_width: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            periods: 365,
            yearly_seasonality: Toggle::Explicit(true),
            weekly_seasonality: Toggle::AUTO,
            daily_seasonality: Toggle::Explicit(true),
            n_changepoints: 25,
            changepoint_range: 0.8,
            changepoint_prior_scale: 0.05,
            seasonality_prior_scale: 10.0,
            interval_width: 0.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub output: PathBuf,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            title: "RVI forecast".to_string(),
            width: 1000,
            height: 560,
            output: PathBuf::from("rvi_forecast.html"),
        }
    }
}

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub earth_engine: EarthEngineConfig,
    pub query: QueryConfig,
    pub forecast: ForecastConfig,
    pub chart: ChartConfig,
    #[serde(rename = "area")]
    pub areas: Vec<AreaConfig>,
    /// Directory relative paths in the file are resolved against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Config {
    /// Parses config text. Does not consult the environment.
    pub fn from_toml_str(text: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a config file. A missing file at the default location yields
    /// the defaults; a missing file that was asked for explicitly is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };

        let mut config = match std::fs::read_to_string(&path) {
            Ok(text) => Self::from_toml_str(&text, &path.display().to_string())?,
            Err(e) if !explicit && e.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })
            }
        };

        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        dotenv::dotenv().ok();
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Applies `EE_PROJECT`, `EE_ACCESS_TOKEN` and `EE_ENDPOINT` overrides.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(project) = non_empty("EE_PROJECT") {
            self.earth_engine.project = Some(project);
        }
        if let Some(token) = non_empty("EE_ACCESS_TOKEN") {
            self.earth_engine.access_token = Some(token.trim().to_string());
        }
        if let Some(endpoint) = non_empty("EE_ENDPOINT") {
            self.earth_engine.endpoint = endpoint;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.query.start_date >= self.query.end_date {
            return Err(ConfigError::Invalid {
                field: "query.end_date",
                reason: format!(
                    "{} is not after start_date {}",
                    self.query.end_date.format(DS_FORMAT),
                    self.query.start_date.format(DS_FORMAT)
                ),
            });
        }
        if self.query.scale <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "query.scale",
                reason: "must be positive".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.forecast.changepoint_range) {
            return Err(ConfigError::Invalid {
                field: "forecast.changepoint_range",
                reason: "must be within [0, 1]".to_string(),
            });
        }
        if !(self.forecast.interval_width > 0.0 && self.forecast.interval_width < 1.0) {
            return Err(ConfigError::Invalid {
                field: "forecast.interval_width",
                reason: "must be within (0, 1)".to_string(),
            });
        }
        if self.forecast.changepoint_prior_scale <= 0.0 || self.forecast.seasonality_prior_scale <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "forecast.*_prior_scale",
                reason: "prior scales must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Parses a `YYYY-MM-DD` command-line date.
pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, DS_FORMAT).map_err(|e| format!("'{}': {}", s, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_script() {
        let config = Config::default();
        assert_eq!(config.forecast.periods, 365);
        assert_eq!(config.forecast.yearly_seasonality, Toggle::Explicit(true));
        assert_eq!(config.forecast.daily_seasonality, Toggle::Explicit(true));
        assert_eq!(config.forecast.weekly_seasonality, Toggle::AUTO);
        assert_eq!(config.query.orbit_pass, OrbitPass::Ascending);
        assert_eq!(config.query.scale, 10.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults_for_missing_fields() {
        let text = r#"
            [earth_engine]
            project = "rice-monitoring"

            [query]
            start_date = "2020-06-01"
            end_date = "2023-06-01"
            orbit_pass = "DESCENDING"

            [forecast]
            periods = 180
            weekly_seasonality = false
            daily_seasonality = "auto"

            [[area]]
            name = "paddy"
            coordinates = [[[126.80, 35.10], [126.82, 35.10], [126.82, 35.12], [126.80, 35.10]]]
        "#;
        let config = Config::from_toml_str(text, "inline").expect("valid config");
        assert_eq!(config.earth_engine.project.as_deref(), Some("rice-monitoring"));
        assert_eq!(config.earth_engine.endpoint, DEFAULT_EE_ENDPOINT);
        assert_eq!(config.query.orbit_pass, OrbitPass::Descending);
        assert_eq!(config.query.scale, 10.0);
        assert_eq!(config.forecast.periods, 180);
        assert_eq!(config.forecast.weekly_seasonality, Toggle::Explicit(false));
        assert_eq!(config.forecast.daily_seasonality, Toggle::AUTO);
        assert_eq!(config.forecast.n_changepoints, 25);
        assert_eq!(config.areas.len(), 1);
        assert_eq!(config.areas[0].name, "paddy");
    }

    #[test]
    fn test_reversed_date_range_is_rejected() {
        let text = r#"
            [query]
            start_date = "2023-01-01"
            end_date = "2022-01-01"
        "#;
        assert!(matches!(
            Config::from_toml_str(text, "inline"),
            Err(ConfigError::Invalid { field: "query.end_date", .. })
        ));
    }

    #[test]
    fn test_bad_interval_width_is_rejected() {
        let text = "[forecast]\ninterval_width = 1.5\n";
        assert!(matches!(
            Config::from_toml_str(text, "inline"),
            Err(ConfigError::Invalid { field: "forecast.interval_width", .. })
        ));
    }

    #[test]
    fn test_unknown_orbit_pass_fails_to_parse() {
        let text = "[query]\norbit_pass = \"SIDEWAYS\"\n";
        assert!(matches!(
            Config::from_toml_str(text, "inline"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = Config::default();
        config.earth_engine.project = Some("from-file".to_string());
        config.apply_env(|key| match key {
            "EE_PROJECT" => Some("from-env".to_string()),
            "EE_ACCESS_TOKEN" => Some("  ya29.token\n".to_string()),
            "EE_ENDPOINT" => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.earth_engine.project.as_deref(), Some("from-env"));
        assert_eq!(config.earth_engine.access_token.as_deref(), Some("ya29.token"));
        assert_eq!(config.earth_engine.endpoint, DEFAULT_EE_ENDPOINT);
    }

    #[test]
    fn test_toggle_resolution() {
        assert!(Toggle::Explicit(true).resolve(false));
        assert!(!Toggle::Explicit(false).resolve(true));
        assert!(Toggle::AUTO.resolve(true));
        assert!(!Toggle::AUTO.resolve(false));
    }

    #[test]
    fn test_parse_date() {
        assert!(parse_date("2023-02-28").is_ok());
        assert!(parse_date("2023-02-30").is_err());
    }
}
