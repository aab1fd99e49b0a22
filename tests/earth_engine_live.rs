/// Live tests against the Earth Engine REST API
///
/// Tests verify:
/// 1. The configured project and token are accepted
/// 2. A small AOI returns Sentinel-1 scenes for a known-good period
/// 3. The RVI series parses into dated rows with plausible values
///
/// Prerequisites:
/// - EE_PROJECT and EE_ACCESS_TOKEN set in the environment or .env
///   (e.g. EE_ACCESS_TOKEN=$(gcloud auth print-access-token))
/// - Internet access to earthengine.googleapis.com
///
/// Run with: cargo test --test earth_engine_live -- --ignored --test-threads=1

use chrono::NaiveDate;
use rvi_forecast::aoi::{Area, Polygon};
use rvi_forecast::config::{Config, OrbitPass, QueryConfig};
use rvi_forecast::ingest::earth_engine::EarthEngineClient;
use rvi_forecast::model::EeError;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn live_client() -> EarthEngineClient {
    let config = Config::load(None).expect("config loads");
    EarthEngineClient::new(&config.earth_engine).expect("EE_PROJECT and EE_ACCESS_TOKEN must be set")
}

/// Farmland near Chennai, covered by descending IW passes.
fn test_area() -> Area {
    let polygon = Polygon::new(vec![vec![
        [80.10, 13.00],
        [80.14, 13.00],
        [80.14, 13.04],
        [80.10, 13.04],
        [80.10, 13.00],
    ]])
    .unwrap();
    Area::new("chennai_test", polygon)
}

fn short_query() -> QueryConfig {
    QueryConfig {
        start_date: NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2022, 3, 1).unwrap(),
        orbit_pass: OrbitPass::Descending,
        ..QueryConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
#[ignore]
fn test_scene_count_for_known_area() {
    let client = live_client();
    let count = client.count_scenes(&test_area(), &short_query()).expect("scene count");
    println!("✓ {} scenes between 2022-01-01 and 2022-03-01", count);
    assert!(count > 0, "expected Sentinel-1 coverage for the test area");
}

#[test]
#[ignore]
fn test_rvi_series_has_plausible_values() {
    let client = live_client();
    let query = short_query();
    let series = client.fetch_rvi_series(&test_area(), &query).expect("RVI series");

    assert!(!series.is_empty());
    for obs in &series.observations {
        assert!(obs.ds >= query.start_date && obs.ds < query.end_date);
    }
    for (_, y) in series.valid_points() {
        assert!((0.0..=4.0).contains(&y), "RVI {} outside [0, 4]", y);
    }
    println!("✓ {} rows, {} with a value", series.len(), series.valid_points().len());
}

#[test]
#[ignore]
fn test_bad_token_is_rejected_with_http_error() {
    let mut config = Config::load(None).expect("config loads");
    config.earth_engine.access_token = Some("invalid-token".to_string());
    if config.earth_engine.project.is_none() {
        config.earth_engine.project = Some("rvi-forecast-test".to_string());
    }
    let client = EarthEngineClient::new(&config.earth_engine).unwrap();

    match client.count_scenes(&test_area(), &short_query()) {
        Err(EeError::Http { status, .. }) => assert!(status == 401 || status == 403),
        other => panic!("expected HTTP auth error, got {:?}", other.map(|_| ())),
    }
}
