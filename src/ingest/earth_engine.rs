/// Earth Engine REST API client
///
/// Evaluates expression graphs with the `value:compute` method and turns the
/// resulting FeatureCollection into an `RviSeries`.
///
/// API Documentation: https://developers.google.com/earth-engine/reference/rest
/// Compute endpoint:  POST /v1/projects/{project}/value:compute

use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::aoi::Area;
use crate::config::{EarthEngineConfig, QueryConfig};
use crate::ingest::expression::{self, Expression};
use crate::model::{DS_FORMAT, EeError, RviObservation, RviSeries};

// ============================================================================
// API Request/Response Structures
// ============================================================================

#[derive(Debug, Serialize)]
struct ComputeValueRequest<'a> {
    expression: &'a Expression,
}

#[derive(Debug, Deserialize)]
struct ComputeValueResponse {
    result: serde_json::Value,
}

/// Google API error envelope.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// FeatureCollection as returned by `value:compute`.
#[derive(Debug, Deserialize)]
pub struct FeatureCollection {
    #[serde(default)]
    pub features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub properties: RviProperties,
}

#[derive(Debug, Default, Deserialize)]
pub struct RviProperties {
    pub ds: Option<String>,
    pub y: Option<f64>,
}

// ============================================================================
// Client
// ============================================================================

/// Blocking client bound to one cloud project and access token.
pub struct EarthEngineClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    project: String,
    access_token: String,
}

impl EarthEngineClient {
    pub fn new(config: &EarthEngineConfig) -> Result<Self, EeError> {
        let project = config
            .project
            .clone()
            .ok_or(EeError::MissingCredentials("EE_PROJECT is not set"))?;
        let access_token = config
            .access_token
            .clone()
            .ok_or(EeError::MissingCredentials("EE_ACCESS_TOKEN is not set"))?;

        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            project,
            access_token,
        })
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn compute_url(&self) -> String {
        compute_url(&self.endpoint, &self.project)
    }

    /// Evaluates an expression and returns the raw `result` value.
    pub fn compute_value(&self, expression: &Expression) -> Result<serde_json::Value, EeError> {
        let response = self
            .http
            .post(self.compute_url())
            .bearer_auth(&self.access_token)
            .header("Accept", "application/json")
            .json(&ComputeValueRequest { expression })
            .send()?;

        let status = response.status();
        let body = response.text()?;

        if !status.is_success() {
            return Err(EeError::Http {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let parsed: ComputeValueResponse =
            serde_json::from_str(&body).map_err(|e| EeError::Parse(e.to_string()))?;
        Ok(parsed.result)
    }

    /// Fetches the per-scene mean RVI over an area.
    pub fn fetch_rvi_series(&self, area: &Area, query: &QueryConfig) -> Result<RviSeries, EeError> {
        let expression = expression::rvi_time_series(&area.polygon, query);
        let result = self.compute_value(&expression)?;
        parse_feature_collection(&area.name, result)
    }

    /// Counts the scenes an RVI query would cover, without reducing them.
    pub fn count_scenes(&self, area: &Area, query: &QueryConfig) -> Result<u64, EeError> {
        let expression = expression::scene_count(&area.polygon, query);
        let result = self.compute_value(&expression)?;
        result
            .as_u64()
            .ok_or_else(|| EeError::Parse(format!("expected scene count, got {}", result)))
    }
}

pub fn compute_url(endpoint: &str, project: &str) -> String {
    format!(
        "{}/v1/projects/{}/value:compute",
        endpoint.trim_end_matches('/'),
        project
    )
}

/// Pulls a readable message out of an error body, falling back to the raw
/// text when it is not the usual JSON envelope.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(envelope) => match envelope.error.status {
            Some(status) => format!("{} ({})", envelope.error.message, status),
            None => envelope.error.message,
        },
        Err(_) => body.chars().take(200).collect(),
    }
}

// ============================================================================
// Response Parsing
// ============================================================================

/// Converts a FeatureCollection of `{ds, y}` features into a sorted series.
///
/// Features without a `ds` are skipped; a missing or null `y` is kept as a
/// gap so the caller can see how many scenes had no usable pixels.
pub fn parse_feature_collection(
    area: &str,
    result: serde_json::Value,
) -> Result<RviSeries, EeError> {
    let collection: FeatureCollection =
        serde_json::from_value(result).map_err(|e| EeError::Parse(e.to_string()))?;

    let mut observations = Vec::with_capacity(collection.features.len());
    for feature in collection.features {
        let Some(ds) = feature.properties.ds else {
            continue;
        };
        let ds = NaiveDate::parse_from_str(&ds, DS_FORMAT).map_err(|e| {
            EeError::Parse(format!(
                "bad date '{}' in feature {}: {}",
                ds,
                feature.id.as_deref().unwrap_or("?"),
                e
            ))
        })?;
        observations.push(RviObservation {
            ds,
            y: feature.properties.y,
        });
    }

    Ok(RviSeries::from_records(area, observations))
}

// ============================================================================
// Tests
// ============================================================================
