//! Fourier seasonality terms.

use std::f64::consts::PI;

use chrono::NaiveDate;

use crate::config::ForecastConfig;

/// The seasonal components the model knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeasonalComponent {
    Yearly,
    Weekly,
    Daily,
}

/// A periodic component expressed as a truncated Fourier series.
#[derive(Debug, Clone, PartialEq)]
pub struct Seasonality {
    pub component: SeasonalComponent,
    /// Period in days.
    pub period: f64,
    pub fourier_order: usize,
}

impl Seasonality {
    pub fn yearly() -> Self {
        Self {
            component: SeasonalComponent::Yearly,
            period: 365.25,
            fourier_order: 10,
        }
    }

    pub fn weekly() -> Self {
        Self {
            component: SeasonalComponent::Weekly,
            period: 7.0,
            fourier_order: 3,
        }
    }

    pub fn daily() -> Self {
        Self {
            component: SeasonalComponent::Daily,
            period: 1.0,
            fourier_order: 4,
        }
    }

    /// Number of design-matrix columns this component contributes.
    pub fn width(&self) -> usize {
        2 * self.fourier_order
    }

    /// `[sin(2πk·d/P), cos(2πk·d/P)]` for k = 1..=order.
    pub fn features(&self, days: f64) -> Vec<f64> {
        (1..=self.fourier_order)
            .flat_map(|k| {
                let x = 2.0 * PI * k as f64 * days / self.period;
                [x.sin(), x.cos()]
            })
            .collect()
    }
}

/// Days since the Unix epoch, the time base for all seasonal terms.
pub fn epoch_days(ds: NaiveDate) -> f64 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    (ds - epoch).num_days() as f64
}

/// Smallest gap in days between consecutive distinct dates, or `None` for
/// fewer than two distinct dates. `dates` must be sorted.
pub fn min_spacing_days(dates: &[NaiveDate]) -> Option<i64> {
    dates
        .windows(2)
        .map(|w| (w[1] - w[0]).num_days())
        .filter(|gap| *gap > 0)
        .min()
}

/// Resolves the configured switches into the list of active components.
///
/// Automatic rules: yearly needs two years of history; weekly needs two weeks
/// of history sampled more often than weekly; daily needs sub-daily
/// sampling, which date-only observations never have.
pub fn active_seasonalities(config: &ForecastConfig, dates: &[NaiveDate]) -> Vec<Seasonality> {
    let span = match (dates.first(), dates.last()) {
        (Some(first), Some(last)) => (*last - *first).num_days(),
        _ => 0,
    };
    let spacing = min_spacing_days(dates).unwrap_or(i64::MAX);

    let mut active = Vec::new();
    if config.yearly_seasonality.resolve(span >= 730) {
        active.push(Seasonality::yearly());
    }
    if config.weekly_seasonality.resolve(span >= 14 && spacing < 7) {
        active.push(Seasonality::weekly());
    }
    if config.daily_seasonality.resolve(span >= 2 && spacing < 1) {
        active.push(Seasonality::daily());
    }
    active
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Toggle;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_feature_width_and_ordering() {
        let weekly = Seasonality::weekly();
        let f = weekly.features(0.0);
        assert_eq!(f.len(), weekly.width());
        // sin terms vanish at the origin, cos terms are one.
        for pair in f.chunks(2) {
            assert!(pair[0].abs() < 1e-12);
            assert!((pair[1] - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_features_are_periodic() {
        let yearly = Seasonality::yearly();
        let a = yearly.features(100.0);
        let b = yearly.features(100.0 + 365.25);
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-9);
        }
    }

    #[test]
    fn test_epoch_days() {
        assert_eq!(epoch_days(date("1970-01-01")), 0.0);
        assert_eq!(epoch_days(date("1970-02-01")), 31.0);
    }

    #[test]
    fn test_min_spacing_ignores_duplicates() {
        let dates = [date("2022-01-01"), date("2022-01-01"), date("2022-01-13"), date("2022-01-19")];
        assert_eq!(min_spacing_days(&dates), Some(6));
        assert_eq!(min_spacing_days(&dates[..2]), None);
    }

    #[test]
    fn test_auto_rules_for_sentinel_revisit_cadence() {
        let config = ForecastConfig {
            yearly_seasonality: Toggle::AUTO,
            weekly_seasonality: Toggle::AUTO,
            daily_seasonality: Toggle::AUTO,
            ..ForecastConfig::default()
        };
        // Three years at a 12-day revisit: yearly only.
        let dates: Vec<_> = (0..90).map(|i| date("2020-01-01") + chrono::Duration::days(12 * i)).collect();
        let active = active_seasonalities(&config, &dates);
        assert_eq!(active, vec![Seasonality::yearly()]);

        // Two months of 6-day revisit: weekly only.
        let dates: Vec<_> = (0..10).map(|i| date("2020-01-01") + chrono::Duration::days(6 * i)).collect();
        let active = active_seasonalities(&config, &dates);
        assert_eq!(active, vec![Seasonality::weekly()]);
    }

    #[test]
    fn test_explicit_switches_override_auto_rules() {
        let config = ForecastConfig::default(); // yearly + daily forced on
        let dates = [date("2022-01-01"), date("2022-02-01")];
        let components: Vec<_> = active_seasonalities(&config, &dates)
            .into_iter()
            .map(|s| s.component)
            .collect();
        assert_eq!(components, vec![SeasonalComponent::Yearly, SeasonalComponent::Daily]);
    }
}
