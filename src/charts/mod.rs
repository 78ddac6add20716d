//! SVG chart rendering. Every renderer is read-only over its input and
//! returns the finished document as a string for inline embedding.

use crate::error::AppError;
use crate::features::FeatureTable;
use crate::forecast::ProjectionRow;
use anyhow::{bail, Result};
use chrono::{Duration, NaiveDate};
use plotters::prelude::*;
use serde::Serialize;

const SIZE: (u32, u32) = (960, 420);
const CLOSE_COLOR: RGBColor = RGBColor(0, 128, 0);
const SMA_COLOR: RGBColor = RGBColor(30, 144, 255);
const CHANGE_COLOR: RGBColor = RGBColor(70, 70, 160);
const PREDICT_COLOR: RGBColor = RGBColor(255, 140, 0);
const UP_COLOR: RGBColor = RGBColor(0, 160, 0);
const DOWN_COLOR: RGBColor = RGBColor(210, 30, 30);

#[derive(Debug, Clone, Serialize)]
pub struct Chart {
    pub title: String,
    pub svg: String,
}

// ── Public renderers ──────────────────────────────────────────────────────────

/// Close and SMA over the full range.
pub fn close_and_sma(table: &FeatureTable, title: &str) -> Result<Chart, AppError> {
    wrap(title, draw_close_and_sma(table, title))
}

/// Daily % change over the most recent `tail` rows.
pub fn daily_change(table: &FeatureTable, tail: usize, title: &str) -> Result<Chart, AppError> {
    wrap(title, draw_daily_change(&table.change_tail(tail), title))
}

/// Candlesticks over the full range; up days green, down days red.
pub fn candlestick(table: &FeatureTable, title: &str) -> Result<Chart, AppError> {
    wrap(title, draw_candlestick(table, title))
}

/// Close and Predict over the combined historical + forecast range.
pub fn actual_vs_predicted(rows: &[ProjectionRow], title: &str) -> Result<Chart, AppError> {
    wrap(title, draw_projection(rows, title))
}

fn wrap(title: &str, svg: Result<String>) -> Result<Chart, AppError> {
    svg.map(|svg| Chart {
        title: title.to_string(),
        svg,
    })
    .map_err(|e| AppError::render(title, format!("{:#}", e)))
}

// ── Ranges ────────────────────────────────────────────────────────────────────

/// Date span padded to at least one day so the axis is never empty.
fn date_range(dates: impl Iterator<Item = NaiveDate>) -> Result<(NaiveDate, NaiveDate)> {
    let mut bounds: Option<(NaiveDate, NaiveDate)> = None;
    for d in dates {
        bounds = Some(match bounds {
            None => (d, d),
            Some((lo, hi)) => (lo.min(d), hi.max(d)),
        });
    }
    let Some((lo, hi)) = bounds else {
        bail!("no data points");
    };
    Ok(if lo == hi { (lo, hi + Duration::days(1)) } else { (lo, hi) })
}

/// Value span with 5% headroom on both sides.
fn value_range(values: impl Iterator<Item = f64>) -> Result<(f64, f64)> {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !lo.is_finite() || !hi.is_finite() {
        bail!("no finite values");
    }
    let pad = ((hi - lo) * 0.05).max(hi.abs() * 1e-3).max(1e-6);
    Ok((lo - pad, hi + pad))
}

// ── Drawing ───────────────────────────────────────────────────────────────────

fn draw_close_and_sma(table: &FeatureTable, title: &str) -> Result<String> {
    let points = table.close_with_sma();
    let (x0, x1) = date_range(points.iter().map(|p| p.0))?;
    let (y0, y1) = value_range(points.iter().flat_map(|p| [Some(p.1), p.2]).flatten())?;

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, SIZE).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 22))
            .margin(12)
            .x_label_area_size(36)
            .y_label_area_size(56)
            .build_cartesian_2d(x0..x1, y0..y1)?;

        chart.configure_mesh().x_labels(8).y_labels(8).draw()?;

        chart
            .draw_series(LineSeries::new(points.iter().map(|p| (p.0, p.1)), &CLOSE_COLOR))?
            .label("Close")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &CLOSE_COLOR));

        chart
            .draw_series(LineSeries::new(
                points.iter().filter_map(|p| p.2.map(|sma| (p.0, sma))),
                &SMA_COLOR,
            ))?
            .label(format!("SMA {}", table.sma_window))
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &SMA_COLOR));

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.85))
            .border_style(&BLACK)
            .draw()?;

        root.present()?;
    }
    Ok(svg)
}

fn draw_daily_change(points: &[(NaiveDate, f64)], title: &str) -> Result<String> {
    let (x0, x1) = date_range(points.iter().map(|p| p.0))?;
    let (y0, y1) = value_range(points.iter().map(|p| p.1).chain([0.0]))?;

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, SIZE).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 22))
            .margin(12)
            .x_label_area_size(36)
            .y_label_area_size(56)
            .build_cartesian_2d(x0..x1, y0..y1)?;

        chart.configure_mesh().x_labels(8).y_labels(8).draw()?;

        chart.draw_series(LineSeries::new(
            [(x0, 0.0), (x1, 0.0)],
            BLACK.mix(0.3),
        ))?;

        chart.draw_series(LineSeries::new(points.iter().copied(), &CHANGE_COLOR))?;

        root.present()?;
    }
    Ok(svg)
}

fn draw_candlestick(table: &FeatureTable, title: &str) -> Result<String> {
    let bars = table.bars();
    let (x0, x1) = date_range(bars.iter().map(|b| b.date))?;
    let (y0, y1) = value_range(bars.iter().flat_map(|b| [b.low, b.high]))?;
    let body_width = (800 / bars.len().max(1)).clamp(1, 12) as u32;

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, SIZE).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 22))
            .margin(12)
            .x_label_area_size(36)
            .y_label_area_size(56)
            .build_cartesian_2d(x0..x1, y0..y1)?;

        chart.configure_mesh().x_labels(8).y_labels(8).draw()?;

        chart.draw_series(bars.iter().map(|b| {
            CandleStick::new(
                b.date,
                b.open,
                b.high,
                b.low,
                b.close,
                UP_COLOR.filled(),
                DOWN_COLOR.filled(),
                body_width,
            )
        }))?;

        root.present()?;
    }
    Ok(svg)
}

fn draw_projection(rows: &[ProjectionRow], title: &str) -> Result<String> {
    let (x0, x1) = date_range(rows.iter().map(|r| r.date))?;
    let (y0, y1) = value_range(rows.iter().flat_map(|r| [r.close, r.predict]).flatten())?;

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, SIZE).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 22))
            .margin(12)
            .x_label_area_size(36)
            .y_label_area_size(56)
            .build_cartesian_2d(x0..x1, y0..y1)?;

        chart.configure_mesh().x_labels(8).y_labels(8).draw()?;

        chart
            .draw_series(LineSeries::new(
                rows.iter().filter_map(|r| r.close.map(|c| (r.date, c))),
                &CLOSE_COLOR,
            ))?
            .label("Close")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &CLOSE_COLOR));

        chart
            .draw_series(LineSeries::new(
                rows.iter().filter_map(|r| r.predict.map(|p| (r.date, p))),
                &PREDICT_COLOR,
            ))?
            .label("Predict")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &PREDICT_COLOR));

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.85))
            .border_style(&BLACK)
            .draw()?;

        root.present()?;
    }
    Ok(svg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features;
    use crate::models::{PriceBar, PriceSeries};

    fn table(n: usize) -> FeatureTable {
        let start = NaiveDate::from_ymd_opt(2021, 1, 4).unwrap();
        let bars = (0..n)
            .map(|i| {
                let c = 50.0 + (i as f64 * 0.2).sin() * 5.0;
                let open = if i % 2 == 0 { c - 1.0 } else { c + 1.0 };
                PriceBar {
                    date: start + Duration::days(i as i64),
                    open,
                    high: c + 2.0,
                    low: c - 2.0,
                    close: c,
                    adj_close: c,
                    volume: 1.0,
                }
            })
            .collect();
        features::build(&PriceSeries::new("TEST", bars), 14)
    }

    #[test]
    fn test_descriptive_charts_render_svg() {
        let t = table(60);
        for chart in [
            close_and_sma(&t, "Close and SMA").unwrap(),
            daily_change(&t, 100, "Daily change").unwrap(),
            candlestick(&t, "Candlestick").unwrap(),
        ] {
            assert!(chart.svg.contains("<svg"), "{}", chart.title);
            assert!(chart.svg.contains("</svg>"), "{}", chart.title);
        }
    }

    #[test]
    fn test_candlestick_uses_up_and_down_colors() {
        let chart = candlestick(&table(10), "Candlestick").unwrap();
        let svg = chart.svg.to_uppercase();
        assert!(svg.contains("#00A000"));
        assert!(svg.contains("#D21E1E"));
    }

    #[test]
    fn test_single_row_still_renders() {
        let t = table(1);
        assert!(close_and_sma(&t, "Close").is_ok());
        assert!(candlestick(&t, "Candles").is_ok());
    }

    #[test]
    fn test_empty_series_is_render_error() {
        let t = table(0);
        let err = close_and_sma(&t, "Close and SMA").unwrap_err();
        assert!(matches!(err, AppError::Render { .. }));
    }

    #[test]
    fn test_projection_chart() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let rows = vec![
            ProjectionRow { date: d, close: Some(10.0), predict: None },
            ProjectionRow { date: d + Duration::days(1), close: Some(11.0), predict: None },
            ProjectionRow { date: d + Duration::days(2), close: None, predict: Some(12.0) },
        ];
        let chart = actual_vs_predicted(&rows, "Actual vs predicted").unwrap();
        assert!(chart.svg.to_uppercase().contains("#FF8C00"));
    }
}
