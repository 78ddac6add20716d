//! Derived indicator columns over a fetched price series.
//!
//! `build()` is a pure function: it copies the bars and appends the SMA and
//! daily change columns without reordering or dropping rows, so building
//! twice from the same series yields identical values.

use crate::models::{PriceBar, PriceSeries};
use chrono::NaiveDate;
use serde::Serialize;

/// Price series plus the indicator columns, all of equal length.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureTable {
    pub series: PriceSeries,
    /// Trailing mean of Close; `None` for the first `window - 1` rows.
    pub sma: Vec<Option<f64>>,
    /// Intraday move (Close − Open) / Open × 100; `None` when Open is zero.
    pub change: Vec<Option<f64>>,
    pub sma_window: usize,
}

pub fn build(series: &PriceSeries, sma_window: usize) -> FeatureTable {
    let closes = series.closes();
    FeatureTable {
        series: series.clone(),
        sma: simple_moving_average(&closes, sma_window),
        change: series.bars.iter().map(intraday_change_pct).collect(),
        sma_window,
    }
}

/// Trailing arithmetic mean over `window` rows.
pub fn simple_moving_average(values: &[f64], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }
    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                None
            } else {
                let slice = &values[i + 1 - window..=i];
                Some(slice.iter().sum::<f64>() / window as f64)
            }
        })
        .collect()
}

pub fn intraday_change_pct(bar: &PriceBar) -> Option<f64> {
    if bar.open == 0.0 || !bar.open.is_finite() {
        return None;
    }
    Some((bar.close - bar.open) / bar.open * 100.0)
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.series.bars
    }

    /// The most recent `n` defined change values, in date order.
    pub fn change_tail(&self, n: usize) -> Vec<(NaiveDate, f64)> {
        let start = self.len().saturating_sub(n);
        self.series.bars[start..]
            .iter()
            .zip(&self.change[start..])
            .filter_map(|(bar, change)| change.map(|c| (bar.date, c)))
            .collect()
    }

    /// (date, close, sma) triples for the close/SMA chart.
    pub fn close_with_sma(&self) -> Vec<(NaiveDate, f64, Option<f64>)> {
        self.series
            .bars
            .iter()
            .zip(&self.sma)
            .map(|(bar, sma)| (bar.date, bar.close, *sma))
            .collect()
    }
}
