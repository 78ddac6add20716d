use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ── Ticker ────────────────────────────────────────────────────────────────────

/// Resolved metadata for a ticker. Looked up once per run, never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompanyProfile {
    pub symbol: String,
    pub name: String,
    pub currency: Option<String>,
    pub exchange: Option<String>,
}

// ── Daily bar ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: f64,
    pub volume: f64,
}

// ── Price series ──────────────────────────────────────────────────────────────

/// Daily bars for one symbol, ascending by date, one bar per date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceSeries {
    pub symbol: String,
    pub bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Sorts by date and drops duplicate dates, keeping the later row.
    pub fn new(symbol: impl Into<String>, mut bars: Vec<PriceBar>) -> Self {
        bars.sort_by_key(|b| b.date);
        let mut deduped: Vec<PriceBar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match deduped.last_mut() {
                Some(last) if last.date == bar.date => *last = bar,
                _ => deduped.push(bar),
            }
        }
        Self {
            symbol: symbol.into(),
            bars: deduped,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }
}

// ── Raw CSV rows ──────────────────────────────────────────────────────────────

/// Provider download CSV: Date, Open, High, Low, Close, Adj Close, Volume
#[derive(Debug, Clone, Default)]
pub struct RawCsvRow {
    pub date: Option<String>,
    pub open: Option<String>,
    pub high: Option<String>,
    pub low: Option<String>,
    pub close: Option<String>,
    pub adj_close: Option<String>,
    pub volume: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(date: &str, close: f64) -> PriceBar {
        PriceBar {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            adj_close: close,
            volume: 0.0,
        }
    }

    #[test]
    fn test_series_sorted_and_deduped() {
        let series = PriceSeries::new(
            "AAPL",
            vec![
                bar("2021-01-05", 3.0),
                bar("2021-01-04", 1.0),
                bar("2021-01-05", 4.0),
            ],
        );
        assert_eq!(series.len(), 2);
        assert_eq!(series.closes(), vec![1.0, 4.0]);
        assert_eq!(
            series.last_date(),
            NaiveDate::from_ymd_opt(2021, 1, 5)
        );
    }
}
