/// Forecasting for the RVI service.
///
/// Submodules:
/// - `seasonality`: Fourier terms and the auto-enable rules for each period.
/// - `prophet`: the trend + seasonality model itself.
///
/// `forecast_series` is the single entry point the binary uses: fit on the
/// observed table, predict over history plus the configured horizon, and
/// append the final forecasted value to the table.

pub mod prophet;
pub mod seasonality;

use crate::config::ForecastConfig;
use crate::logging::{self, DataSource};
use crate::model::{ForecastError, ForecastOutcome, RviObservation, RviSeries};

pub use prophet::Prophet;

pub fn forecast_series(
    series: &RviSeries,
    config: &ForecastConfig,
) -> Result<ForecastOutcome, ForecastError> {
    let mut model = Prophet::new(config.clone());
    model.fit(series)?;
    logging::debug(
        DataSource::Model,
        Some(&series.area),
        &format!(
            "Fitted with {} changepoints and seasonalities {:?}",
            model.changepoints().map_or(0, <[f64]>::len),
            model
                .seasonalities()
                .unwrap_or_default()
                .iter()
                .map(|s| s.component)
                .collect::<Vec<_>>()
        ),
    );

    let future = model.make_future_dates(config.periods)?;
    let forecast = model.predict(&future)?;

    let last = forecast.last().ok_or(ForecastError::NotFitted)?;
    let final_value = last.yhat;
    let final_date = last.ds;

    logging::info(
        DataSource::Model,
        Some(&series.area),
        &format!("Forecasted mean RVI for the next period: {}", final_value),
    );

    let mut extended = series.clone();
    extended.push(RviObservation {
        ds: final_date,
        y: Some(final_value),
    });

    Ok(ForecastOutcome {
        forecast,
        extended,
        final_value,
        final_date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn series() -> RviSeries {
        let start = NaiveDate::from_ymd_opt(2021, 1, 3).unwrap();
        RviSeries::from_records(
            "paddy",
            (0..80)
                .map(|i| RviObservation {
                    ds: start + Duration::days(12 * i),
                    y: Some(0.45 + 0.15 * (i as f64 * 12.0 / 365.25 * std::f64::consts::TAU).sin()),
                })
                .collect(),
        )
    }

    #[test]
    fn test_forecast_series_appends_final_value() {
        let series = series();
        let config = ForecastConfig {
            periods: 90,
            ..ForecastConfig::default()
        };
        let outcome = forecast_series(&series, &config).expect("forecast");

        assert_eq!(outcome.forecast.len(), series.len() + 90);
        assert_eq!(outcome.extended.len(), series.len() + 1);

        let appended = outcome.extended.observations.last().unwrap();
        assert_eq!(appended.ds, outcome.final_date);
        assert_eq!(appended.y, Some(outcome.final_value));
        assert_eq!(
            outcome.final_date,
            series.date_range().unwrap().1 + Duration::days(90)
        );
    }

    #[test]
    fn test_forecast_series_propagates_fit_errors() {
        let empty = RviSeries::from_records("paddy", Vec::new());
        assert!(matches!(
            forecast_series(&empty, &ForecastConfig::default()),
            Err(ForecastError::InsufficientData { actual: 0, .. })
        ));
    }
}
