//! Sentinel-1 radar vegetation index (RVI) forecasting.
//!
//! Fetches per-scene mean RVI over an area of interest from Google Earth
//! Engine, fits an additive trend + seasonality model to the resulting
//! `(ds, y)` table, and renders the forecast as an HTML chart.

pub mod analysis;
pub mod aoi;
pub mod chart;
pub mod config;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod replay;
pub mod verify;
