//! Additive trend + seasonality forecasting model.
//!
//! y(t) = trend(t) + Σ seasonal(t) + ε
//!
//! The trend is piecewise linear with potential changepoints spread over
//! the early part of the history:
//!
//!   trend(t) = k·t + m + Σ_j δ_j · max(0, t − s_j)
//!
//! Seasonal components are truncated Fourier series (see `seasonality`).
//! Parameters get the usual priors (normal on k, m and the seasonal
//! coefficients, Laplace on the changepoint deltas); the fit is the MAP
//! estimate under a Gaussian approximation of those priors, which reduces
//! to ridge-penalised least squares solved with a Cholesky factorisation.
//!
//! Time is scaled so the history spans t ∈ [0, 1] and values are divided by
//! max |y| before fitting; predictions are mapped back to original units.

use chrono::{Duration, NaiveDate};
use nalgebra::{DMatrix, DVector};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::analysis::seasonality::{self, SeasonalComponent, Seasonality};
use crate::config::ForecastConfig;
use crate::model::{ForecastError, ForecastPoint, RviSeries};

/// Prior standard deviation of the base growth rate and offset.
const TREND_PRIOR_SCALE: f64 = 5.0;

/// Fixed-point iterations used to re-estimate the noise level.
const NOISE_ITERATIONS: usize = 5;

/// Lower bound on the (scaled) noise variance so penalties never vanish.
const MIN_NOISE_VARIANCE: f64 = 1e-4;

/// Unfitted model plus, after `fit`, its parameters.
#[derive(Debug, Clone)]
pub struct Prophet {
    config: ForecastConfig,
    fitted: Option<FittedModel>,
}

#[derive(Debug, Clone)]
struct FittedModel {
    start: NaiveDate,
    span_days: f64,
    y_scale: f64,
    changepoints: Vec<f64>,
    seasonalities: Vec<Seasonality>,
    /// `[k, m, δ_1..δ_S, seasonal coefficients...]`
    beta: DVector<f64>,
    /// Residual standard deviation in scaled units.
    sigma: f64,
    /// Distinct history dates, ascending.
    history_dates: Vec<NaiveDate>,
}

impl Prophet {
    pub fn new(config: ForecastConfig) -> Self {
        Self {
            config,
            fitted: None,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Changepoint locations in scaled time, once fitted.
    pub fn changepoints(&self) -> Option<&[f64]> {
        self.fitted.as_ref().map(|f| f.changepoints.as_slice())
    }

    /// Active seasonal components, once fitted.
    pub fn seasonalities(&self) -> Option<&[Seasonality]> {
        self.fitted.as_ref().map(|f| f.seasonalities.as_slice())
    }

    /// Fits the model to the observed rows of `series`, ignoring gaps.
    pub fn fit(&mut self, series: &RviSeries) -> Result<(), ForecastError> {
        let points = series.valid_points();
        if points.len() < 2 {
            return Err(ForecastError::InsufficientData {
                required: 2,
                actual: points.len(),
            });
        }

        let start = points[0].0;
        let end = points[points.len() - 1].0;
        let span_days = (end - start).num_days() as f64;
        if span_days <= 0.0 {
            return Err(ForecastError::ZeroTimeSpan);
        }

        let y_scale = points
            .iter()
            .map(|(_, y)| y.abs())
            .fold(0.0_f64, f64::max);
        let y_scale = if y_scale > 0.0 { y_scale } else { 1.0 };

        let mut history_dates: Vec<NaiveDate> = points.iter().map(|(d, _)| *d).collect();
        history_dates.dedup();

        let t: Vec<f64> = points
            .iter()
            .map(|(d, _)| (*d - start).num_days() as f64 / span_days)
            .collect();
        let y = DVector::from_iterator(points.len(), points.iter().map(|(_, v)| v / y_scale));

        let changepoints = changepoint_times(&t, self.config.n_changepoints, self.config.changepoint_range);
        let seasonalities = seasonality::active_seasonalities(&self.config, &history_dates);

        let rows: Vec<Vec<f64>> = points
            .iter()
            .zip(&t)
            .map(|((d, _), &ti)| design_row(ti, seasonality::epoch_days(*d), &changepoints, &seasonalities))
            .collect();
        let p = rows[0].len();
        let x = DMatrix::from_fn(rows.len(), p, |i, j| rows[i][j]);

        let prior_variances = self.prior_variances(changepoints.len(), &seasonalities);

        let xt = x.transpose();
        let xtx = &xt * &x;
        let xty = &xt * &y;

        let mut noise_variance = 0.25;
        let mut beta = DVector::zeros(p);
        for _ in 0..NOISE_ITERATIONS {
            let penalty = DVector::from_iterator(p, prior_variances.iter().map(|v| noise_variance / v));
            let a = &xtx + DMatrix::from_diagonal(&penalty);
            beta = a
                .cholesky()
                .ok_or_else(|| ForecastError::Numerical("normal equations are not positive definite".to_string()))?
                .solve(&xty);

            let residuals = &y - &x * &beta;
            noise_variance = (residuals.dot(&residuals) / points.len() as f64).max(MIN_NOISE_VARIANCE);
        }

        if beta.iter().any(|b| !b.is_finite()) {
            return Err(ForecastError::Numerical("non-finite coefficients".to_string()));
        }

        self.fitted = Some(FittedModel {
            start,
            span_days,
            y_scale,
            changepoints,
            seasonalities,
            beta,
            sigma: noise_variance.sqrt(),
            history_dates,
        });
        Ok(())
    }

    /// Prior variance of each coefficient, in design-column order.
    fn prior_variances(&self, n_changepoints: usize, seasonalities: &[Seasonality]) -> Vec<f64> {
        let trend = TREND_PRIOR_SCALE.powi(2);
        // Laplace(0, b) has variance 2b².
        let delta = 2.0 * self.config.changepoint_prior_scale.powi(2);
        let seasonal = self.config.seasonality_prior_scale.powi(2);
        let seasonal_width: usize = seasonalities.iter().map(Seasonality::width).sum();

        let mut v = vec![trend, trend];
        v.extend(std::iter::repeat(delta).take(n_changepoints));
        v.extend(std::iter::repeat(seasonal).take(seasonal_width));
        v
    }

    /// Distinct history dates followed by `periods` daily steps past the
    /// last one.
    pub fn make_future_dates(&self, periods: u32) -> Result<Vec<NaiveDate>, ForecastError> {
        let fitted = self.fitted.as_ref().ok_or(ForecastError::NotFitted)?;
        let mut dates = fitted.history_dates.clone();
        let last = *dates.last().ok_or(ForecastError::NotFitted)?;
        // Every step is in range once the last one is.
        last.checked_add_signed(Duration::days(i64::from(periods)))
            .ok_or_else(|| {
                ForecastError::Numerical(format!("forecast horizon of {} days is past the supported date range", periods))
            })?;
        dates.extend((1..=i64::from(periods)).map(|i| last + Duration::days(i)));
        Ok(dates)
    }

    /// Evaluates the model and its uncertainty interval at each date.
    pub fn predict(&self, dates: &[NaiveDate]) -> Result<Vec<ForecastPoint>, ForecastError> {
        let fitted = self.fitted.as_ref().ok_or(ForecastError::NotFitted)?;

        let z = Normal::new(0.0, 1.0)
            .map_err(|e| ForecastError::Numerical(e.to_string()))?
            .inverse_cdf(0.5 + self.config.interval_width / 2.0);

        let n_cp = fitted.changepoints.len();
        let deltas = fitted.beta.rows(2, n_cp);
        let mean_abs_delta = if n_cp > 0 {
            deltas.iter().map(|d| d.abs()).sum::<f64>() / n_cp as f64
        } else {
            0.0
        };

        let points = dates
            .iter()
            .map(|&ds| {
                let t = (ds - fitted.start).num_days() as f64 / fitted.span_days;
                let days = seasonality::epoch_days(ds);

                let trend = fitted.trend_at(t);
                let mut offset = 2 + n_cp;
                let (mut yearly, mut weekly, mut daily) = (0.0, 0.0, 0.0);
                for s in &fitted.seasonalities {
                    let width = s.width();
                    let value: f64 = s
                        .features(days)
                        .iter()
                        .zip(fitted.beta.rows(offset, width).iter())
                        .map(|(f, b)| f * b)
                        .sum();
                    match s.component {
                        SeasonalComponent::Yearly => yearly = value,
                        SeasonalComponent::Weekly => weekly = value,
                        SeasonalComponent::Daily => daily = value,
                    }
                    offset += width;
                }

                // Future changepoints arrive at the historical rate with
                // Laplace(0, mean |δ|) magnitudes; their effect on the trend
                // has variance S·2b²·h³/3 at horizon h.
                let h = (t - 1.0).max(0.0);
                let trend_variance = n_cp as f64 * 2.0 * mean_abs_delta.powi(2) * h.powi(3) / 3.0;
                let half_width = z * (fitted.sigma.powi(2) + trend_variance).sqrt();

                let yhat = trend + yearly + weekly + daily;
                let scale = fitted.y_scale;
                ForecastPoint {
                    ds,
                    trend: trend * scale,
                    yearly: yearly * scale,
                    weekly: weekly * scale,
                    daily: daily * scale,
                    yhat: yhat * scale,
                    yhat_lower: (yhat - half_width) * scale,
                    yhat_upper: (yhat + half_width) * scale,
                }
            })
            .collect();

        Ok(points)
    }
}

impl FittedModel {
    fn trend_at(&self, t: f64) -> f64 {
        let k = self.beta[0];
        let m = self.beta[1];
        let bends: f64 = self
            .changepoints
            .iter()
            .zip(self.beta.rows(2, self.changepoints.len()).iter())
            .map(|(s, delta)| delta * (t - s).max(0.0))
            .sum();
        k * t + m + bends
    }
}

/// One design-matrix row: `[t, 1, hinge terms..., Fourier terms...]`.
fn design_row(t: f64, days: f64, changepoints: &[f64], seasonalities: &[Seasonality]) -> Vec<f64> {
    let mut row = Vec::with_capacity(2 + changepoints.len() + seasonalities.iter().map(Seasonality::width).sum::<usize>());
    row.push(t);
    row.push(1.0);
    row.extend(changepoints.iter().map(|s| (t - s).max(0.0)));
    for s in seasonalities {
        row.extend(s.features(days));
    }
    row
}

/// Places up to `n_changepoints` changepoints at evenly spaced rows within
/// the first `range` fraction of the (sorted, scaled) history times.
///
/// Short histories get fewer changepoints: at most one less than the number
/// of rows in the eligible range.
pub fn changepoint_times(t: &[f64], n_changepoints: usize, range: f64) -> Vec<f64> {
    let hist_size = (t.len() as f64 * range).floor() as usize;
    let n = n_changepoints.min(hist_size.saturating_sub(1));
    if n == 0 {
        return Vec::new();
    }
    let last = (hist_size - 1) as f64;
    (1..=n)
        .map(|i| {
            let idx = (i as f64 * last / n as f64).round() as usize;
            t[idx]
        })
        .collect()
}
