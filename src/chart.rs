//! Forecast chart rendering.
//!
//! The figure is drawn with plotters' SVG backend: the forecast as a line,
//! its uncertainty interval as a translucent band, and the observations as
//! red points. `render_html` embeds that SVG in a standalone dashboard page.

use std::path::Path;

use chrono::{Duration, NaiveDate};
use plotters::prelude::*;

use crate::analysis::seasonality::epoch_days;
use crate::model::{ChartError, DS_FORMAT, ForecastOutcome, ForecastPoint, RviSeries};

const FORECAST_COLOR: RGBColor = RGBColor(31, 119, 180);
const OBSERVED_COLOR: RGBColor = RGBColor(214, 39, 40);

#[derive(Debug, Clone)]
pub struct ChartOptions {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub y_label: String,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            title: "RVI forecast".to_string(),
            width: 1000,
            height: 560,
            y_label: "RVI".to_string(),
        }
    }
}

fn render_err<E: std::fmt::Display>(e: E) -> ChartError {
    ChartError::Render(e.to_string())
}

fn date_label(x: &f64) -> String {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    (epoch + Duration::days(x.round() as i64))
        .format(DS_FORMAT)
        .to_string()
}

/// Draws the forecast and observations as an SVG document.
pub fn render_svg(
    forecast: &[ForecastPoint],
    observed: &RviSeries,
    options: &ChartOptions,
) -> Result<String, ChartError> {
    if forecast.is_empty() {
        return Err(ChartError::NoData);
    }

    let observed_points: Vec<(f64, f64)> = observed
        .valid_points()
        .into_iter()
        .map(|(ds, y)| (epoch_days(ds), y))
        .collect();

    let xs = forecast
        .iter()
        .map(|p| epoch_days(p.ds))
        .chain(observed_points.iter().map(|(x, _)| *x));
    let (x_min, x_max) = xs.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| {
        (lo.min(x), hi.max(x))
    });

    let ys = forecast
        .iter()
        .flat_map(|p| [p.yhat_lower, p.yhat_upper])
        .chain(observed_points.iter().map(|(_, y)| *y));
    let (y_min, y_max) = ys.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), y| {
        (lo.min(y), hi.max(y))
    });

    // Pad so single-date or flat series still get a usable range.
    let x_pad = ((x_max - x_min) * 0.02).max(1.0);
    let y_pad = ((y_max - y_min) * 0.05).max(0.01);

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height)).into_drawing_area();
        root.fill(&WHITE).map_err(render_err)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&options.title, ("sans-serif", 26))
            .margin(20)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(
                (x_min - x_pad)..(x_max + x_pad),
                (y_min - y_pad)..(y_max + y_pad),
            )
            .map_err(render_err)?;

        chart
            .configure_mesh()
            .x_desc("ds")
            .y_desc(&options.y_label)
            .x_labels(8)
            .x_label_formatter(&date_label)
            .draw()
            .map_err(render_err)?;

        let band: Vec<(f64, f64)> = forecast
            .iter()
            .map(|p| (epoch_days(p.ds), p.yhat_upper))
            .chain(forecast.iter().rev().map(|p| (epoch_days(p.ds), p.yhat_lower)))
            .collect();
        chart
            .draw_series(std::iter::once(Polygon::new(band, FORECAST_COLOR.mix(0.2).filled())))
            .map_err(render_err)?;

        chart
            .draw_series(LineSeries::new(
                forecast.iter().map(|p| (epoch_days(p.ds), p.yhat)),
                FORECAST_COLOR.stroke_width(2),
            ))
            .map_err(render_err)?
            .label("forecast")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], FORECAST_COLOR.stroke_width(2)));

        chart
            .draw_series(
                observed_points
                    .iter()
                    .map(|&(x, y)| Circle::new((x, y), 3, OBSERVED_COLOR.filled())),
            )
            .map_err(render_err)?
            .label("observed")
            .legend(|(x, y)| Circle::new((x + 10, y), 3, OBSERVED_COLOR.filled()));

        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(render_err)?;

        root.present().map_err(render_err)?;
    }

    Ok(svg)
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Wraps the chart in a standalone HTML page with a short summary.
pub fn render_html(
    outcome: &ForecastOutcome,
    observed: &RviSeries,
    options: &ChartOptions,
) -> Result<String, ChartError> {
    let svg = render_svg(&outcome.forecast, observed, options)?;

    let range = observed
        .date_range()
        .map(|(a, b)| format!("{} to {}", a.format(DS_FORMAT), b.format(DS_FORMAT)))
        .unwrap_or_else(|| "-".to_string());
    let usable = observed.valid_points().len();

    Ok(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: sans-serif; margin: 2em; color: #222; }}
table {{ border-collapse: collapse; margin-top: 1em; }}
td {{ padding: 0.25em 1em 0.25em 0; }}
</style>
</head>
<body>
<h1>{title}</h1>
<div class="chart">
{svg}
</div>
<table>
<tr><td>Area</td><td>{area}</td></tr>
<tr><td>Observed</td><td>{range}</td></tr>
<tr><td>Scenes</td><td>{total} ({usable} with a value)</td></tr>
<tr><td>Forecast for {final_date}</td><td>{final_value:.4}</td></tr>
</table>
</body>
</html>
"#,
        title = escape_html(&options.title),
        svg = svg,
        area = escape_html(&observed.area),
        range = range,
        total = observed.len(),
        usable = usable,
        final_date = outcome.final_date.format(DS_FORMAT),
        final_value = outcome.final_value,
    ))
}

pub fn write_report(path: &Path, html: &str) -> Result<(), ChartError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RviObservation;

    fn point(ds: NaiveDate, yhat: f64) -> ForecastPoint {
        ForecastPoint {
            ds,
            trend: yhat,
            yearly: 0.0,
            weekly: 0.0,
            daily: 0.0,
            yhat,
            yhat_lower: yhat - 0.05,
            yhat_upper: yhat + 0.05,
        }
    }

    fn fixture() -> (Vec<ForecastPoint>, RviSeries) {
        let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        let forecast = (0..40)
            .map(|i| point(start + Duration::days(i * 12), 0.4 + 0.002 * i as f64))
            .collect();
        let observed = RviSeries::from_records(
            "paddy <north>",
            (0..30)
                .map(|i| RviObservation {
                    ds: start + Duration::days(i * 12),
                    y: if i == 5 { None } else { Some(0.41 + 0.002 * i as f64) },
                })
                .collect(),
        );
        (forecast, observed)
    }

    #[test]
    fn test_render_svg_draws_line_band_and_points() {
        let (forecast, observed) = fixture();
        let svg = render_svg(&forecast, &observed, &ChartOptions::default()).expect("render");
        assert!(svg.contains("<svg"));
        assert!(svg.contains("<polyline"), "forecast line missing");
        assert!(svg.contains("<polygon"), "interval band missing");
        // One circle per usable observation plus the legend marker.
        assert_eq!(svg.matches("<circle").count(), 29 + 1);
        assert!(svg.contains("RVI forecast"));
    }

    #[test]
    fn test_render_svg_rejects_empty_forecast() {
        let (_, observed) = fixture();
        assert!(matches!(
            render_svg(&[], &observed, &ChartOptions::default()),
            Err(ChartError::NoData)
        ));
    }

    #[test]
    fn test_render_html_embeds_chart_and_summary() {
        let (forecast, observed) = fixture();
        let last = forecast.last().unwrap().clone();
        let outcome = ForecastOutcome {
            forecast,
            extended: observed.clone(),
            final_value: last.yhat,
            final_date: last.ds,
        };
        let html = render_html(&outcome, &observed, &ChartOptions::default()).unwrap();
        assert!(html.contains("<svg"));
        assert!(html.contains("paddy &lt;north&gt;"));
        assert!(html.contains("30 (29 with a value)"));
        assert!(html.contains(&format!("{:.4}", last.yhat)));
    }

    #[test]
    fn test_date_label_formats_epoch_days() {
        assert_eq!(date_label(&0.0), "1970-01-01");
        assert_eq!(date_label(&31.2), "1970-02-01");
    }
}
