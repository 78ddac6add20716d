//! Offline market-data source: one provider-format CSV per symbol.

use crate::error::AppError;
use crate::models::{CompanyProfile, PriceSeries, RawCsvRow};
use crate::source::cleaner::csv_row_to_bar;
use crate::source::MarketDataSource;
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Reads `<dir>/<SYMBOL>.csv` laid out as the provider's download:
/// Date, Open, High, Low, Close, Adj Close, Volume
pub struct CsvSource {
    dir: PathBuf,
}

impl CsvSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", symbol))
    }
}

/// Parse every usable row of a provider CSV. Unparseable rows are skipped.
pub fn load_csv(path: &Path, symbol: &str) -> Result<PriceSeries> {
    debug!("Loading {} from {:?}", symbol, path);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut bars = Vec::new();

    for (i, result) in reader.records().enumerate() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!("Row {} in {:?}: {}", i + 1, path, e);
                continue;
            }
        };

        let raw = RawCsvRow {
            date: record.get(0).map(|s| s.to_string()),
            open: record.get(1).map(|s| s.to_string()),
            high: record.get(2).map(|s| s.to_string()),
            low: record.get(3).map(|s| s.to_string()),
            close: record.get(4).map(|s| s.to_string()),
            adj_close: record.get(5).map(|s| s.to_string()),
            volume: record.get(6).map(|s| s.to_string()),
        };

        match csv_row_to_bar(symbol, &raw) {
            Some(bar) => bars.push(bar),
            None => debug!("Row {} in {:?}: incomplete, skipped", i + 1, path),
        }
    }

    let series = PriceSeries::new(symbol, bars);
    info!("{}: {} bars loaded", symbol, series.len());
    Ok(series)
}

#[async_trait]
impl MarketDataSource for CsvSource {
    async fn resolve_profile(&self, symbol: &str) -> Result<CompanyProfile, AppError> {
        let path = self.path_for(symbol);
        if !path.is_file() {
            return Err(AppError::resolve(
                symbol,
                format!("no data file at {}", path.display()),
            ));
        }

        Ok(CompanyProfile {
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            currency: None,
            exchange: None,
        })
    }

    async fn fetch_daily_history(
        &self,
        symbol: &str,
        start: NaiveDate,
    ) -> Result<PriceSeries, AppError> {
        let path = self.path_for(symbol);
        let series =
            load_csv(&path, symbol).map_err(|e| AppError::fetch(symbol, format!("{:#}", e)))?;

        let bars: Vec<_> = series.bars.into_iter().filter(|b| b.date >= start).collect();
        if bars.is_empty() {
            return Err(AppError::fetch(
                symbol,
                format!("no rows on or after {} in {}", start, path.display()),
            ));
        }

        Ok(PriceSeries::new(symbol, bars))
    }
}
