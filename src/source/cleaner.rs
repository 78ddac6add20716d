use crate::models::{PriceBar, RawCsvRow};
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, warn};

use super::yahoo::ChartResult;

// ── Parsers ───────────────────────────────────────────────────────────────────

/// Parse price: strip thousands separators and currency noise.
/// "1,234.56" → 1234.56 | "null" → None
pub fn parse_price(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("null") || s == "N/A" || s == "-" {
        return None;
    }
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-' || *c == 'e' || *c == 'E')
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse an ISO `YYYY-MM-DD` date as written by the provider download.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

/// Ticker input is case-insensitive; everything downstream sees uppercase.
pub fn normalise_symbol(s: &str) -> String {
    s.trim().to_uppercase()
}

// ── CSV row → PriceBar ────────────────────────────────────────────────────────

pub fn csv_row_to_bar(symbol: &str, row: &RawCsvRow) -> Option<PriceBar> {
    let date = parse_date(row.date.as_deref()?)?;

    let open = parse_price(row.open.as_deref()?)?;
    let high = parse_price(row.high.as_deref()?)?;
    let low = parse_price(row.low.as_deref()?)?;
    let close = parse_price(row.close.as_deref()?)?;

    if close <= 0.0 {
        warn!("Invalid close {} for {} on {}", close, symbol, date);
        return None;
    }

    Some(PriceBar {
        date,
        open,
        high,
        low,
        close,
        adj_close: row
            .adj_close
            .as_deref()
            .and_then(parse_price)
            .unwrap_or(close),
        volume: row.volume.as_deref().and_then(parse_price).unwrap_or(0.0),
    })
}

// ── Chart payload → PriceBar ──────────────────────────────────────────────────

/// Zip the parallel timestamp/quote arrays into bars. Rows with a null price
/// are dropped; a missing adjusted close falls back to the close.
pub fn chart_to_bars(result: &ChartResult) -> Vec<PriceBar> {
    let Some(quote) = result.indicators.quote.first() else {
        return Vec::new();
    };
    let adj = result.indicators.adjclose.first().map(|a| &a.adjclose);
    let offset = result.meta.gmtoffset;

    let mut bars = Vec::with_capacity(result.timestamp.len());
    let mut skipped = 0usize;

    for (i, &ts) in result.timestamp.iter().enumerate() {
        let at = |v: &Vec<Option<f64>>| v.get(i).copied().flatten();

        let (Some(open), Some(high), Some(low), Some(close)) =
            (at(&quote.open), at(&quote.high), at(&quote.low), at(&quote.close))
        else {
            skipped += 1;
            continue;
        };

        // Bars are stamped at the exchange open; shift to exchange-local time
        let Some(date) = DateTime::<Utc>::from_timestamp(ts + offset, 0).map(|dt| dt.date_naive())
        else {
            skipped += 1;
            continue;
        };

        bars.push(PriceBar {
            date,
            open,
            high,
            low,
            close,
            adj_close: adj.and_then(at).unwrap_or(close),
            volume: at(&quote.volume).unwrap_or(0.0),
        });
    }

    if skipped > 0 {
        debug!("{}: skipped {} rows with null prices", result.meta.symbol, skipped);
    }

    bars
}

// ── Tests ─────────────────────────────────────────────────────────────────────
