/// Remote data ingestion for the RVI forecasting service.
///
/// Submodules:
/// - `expression`: typed Earth Engine expression graphs for the Sentinel-1 RVI query.
/// - `earth_engine`: REST client that evaluates them and parses the results.

pub mod earth_engine;
pub mod expression;
