//! Data Source Verification Module
//!
//! Checks configured credentials and areas against the live Earth Engine
//! service: is the project reachable with the given token, and does each
//! area have Sentinel-1 scenes matching the query?
//!
//! Use this before a long run to catch credential or coverage problems.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::aoi::Area;
use crate::config::QueryConfig;
use crate::ingest::earth_engine::EarthEngineClient;
use crate::logging;

// ============================================================================
// Verification Results
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub timestamp: String,
    pub project: String,
    pub area_results: Vec<AreaVerification>,
    pub summary: VerificationSummary,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationSummary {
    pub total: usize,
    pub working: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AreaVerification {
    pub name: String,
    pub status: VerificationStatus,
    pub service_reachable: bool,
    pub scene_count: u64,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum VerificationStatus {
    Success,
    PartialSuccess,
    Failed,
}

impl AreaVerification {
    /// Classifies the outcome of a scene-count query.
    pub fn from_count(name: &str, count: Result<u64, String>) -> Self {
        match count {
            Ok(n) => Self {
                name: name.to_string(),
                status: if n > 0 {
                    VerificationStatus::Success
                } else {
                    VerificationStatus::PartialSuccess
                },
                service_reachable: true,
                scene_count: n,
                error_message: if n > 0 {
                    None
                } else {
                    Some("No Sentinel-1 scenes match the query".to_string())
                },
            },
            Err(e) => Self {
                name: name.to_string(),
                status: VerificationStatus::Failed,
                service_reachable: false,
                scene_count: 0,
                error_message: Some(e),
            },
        }
    }
}

// ============================================================================
// Earth Engine Verification
// ============================================================================

pub fn verify_area(client: &EarthEngineClient, area: &Area, query: &QueryConfig) -> AreaVerification {
    let count = client.count_scenes(area, query).map_err(|e| {
        logging::log_ee_failure(&area.name, "Scene count", &e);
        e.to_string()
    });
    AreaVerification::from_count(&area.name, count)
}

// ============================================================================
// Full Verification Runner
// ============================================================================

pub fn run_verification(
    client: &EarthEngineClient,
    areas: &[Area],
    query: &QueryConfig,
) -> VerificationReport {
    let mut report = VerificationReport {
        timestamp: Utc::now().to_rfc3339(),
        project: client.project().to_string(),
        area_results: Vec::new(),
        summary: VerificationSummary::default(),
    };

    println!("🔍 Verifying areas against project {}...", report.project);
    for area in areas {
        print!("  {} ... ", area.name);
        let result = verify_area(client, area, query);

        match result.status {
            VerificationStatus::Success => {
                println!("✓ OK ({} scenes)", result.scene_count);
            }
            VerificationStatus::PartialSuccess => {
                println!("⚠ Reachable but no scenes");
            }
            VerificationStatus::Failed => {
                println!("✗ FAILED: {}", result.error_message.as_deref().unwrap_or("Unknown"));
            }
        }

        report.area_results.push(result);
    }

    report.summary = summarize(&report.area_results);
    report
}

pub fn summarize(results: &[AreaVerification]) -> VerificationSummary {
    let failed = results
        .iter()
        .filter(|r| r.status == VerificationStatus::Failed)
        .count();
    VerificationSummary {
        total: results.len(),
        working: results.len() - failed,
        failed,
    }
}

pub fn print_summary(report: &VerificationReport) {
    println!("\n═══════════════════════════════════════════════════════════");
    println!("📊 VERIFICATION SUMMARY");
    println!("═══════════════════════════════════════════════════════════");
    println!();
    println!(
        "Areas:    {}/{} working  ({} failed)",
        report.summary.working, report.summary.total, report.summary.failed
    );
    let scenes: u64 = report.area_results.iter().map(|r| r.scene_count).sum();
    println!("Scenes:   {} matching the query", scenes);
    println!("═══════════════════════════════════════════════════════════");
}
