//! Live source backed by the provider's public chart endpoint.
//!
//! One endpoint serves both lookups:
//!   `/v8/finance/chart/{SYMBOL}?range=5d&interval=1d`           → meta (display name)
//!   `/v8/finance/chart/{SYMBOL}?period1=..&period2=..&interval=1d` → daily bars

use crate::config::ProviderConfig;
use crate::error::AppError;
use crate::models::{CompanyProfile, PriceSeries};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use super::cleaner::chart_to_bars;
use super::http_client::{HttpClient, HttpResponse};
use super::MarketDataSource;

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChartEnvelope {
    pub chart: ChartBody,
}

#[derive(Debug, Deserialize)]
pub struct ChartBody {
    pub result: Option<Vec<ChartResult>>,
    pub error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
pub struct ChartError {
    pub code: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct ChartResult {
    pub meta: ChartMeta,
    #[serde(default)]
    pub timestamp: Vec<i64>,
    #[serde(default)]
    pub indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMeta {
    pub symbol: String,
    pub long_name: Option<String>,
    pub short_name: Option<String>,
    pub currency: Option<String>,
    pub exchange_name: Option<String>,
    /// Seconds east of UTC for the listing exchange.
    #[serde(default)]
    pub gmtoffset: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct Indicators {
    #[serde(default)]
    pub quote: Vec<Quote>,
    #[serde(default)]
    pub adjclose: Vec<AdjClose>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Quote {
    #[serde(default)]
    pub open: Vec<Option<f64>>,
    #[serde(default)]
    pub high: Vec<Option<f64>>,
    #[serde(default)]
    pub low: Vec<Option<f64>>,
    #[serde(default)]
    pub close: Vec<Option<f64>>,
    #[serde(default)]
    pub volume: Vec<Option<f64>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdjClose {
    #[serde(default)]
    pub adjclose: Vec<Option<f64>>,
}

/// Decode a chart response body, surfacing the provider's own error
/// description when it sends one.
pub fn parse_chart(body: &str) -> Result<ChartResult> {
    let envelope: ChartEnvelope =
        serde_json::from_str(body).context("Malformed chart response")?;

    if let Some(err) = envelope.chart.error {
        bail!("{}: {}", err.code, err.description);
    }

    envelope
        .chart
        .result
        .and_then(|mut r| if r.is_empty() { None } else { Some(r.swap_remove(0)) })
        .ok_or_else(|| anyhow!("Chart response has no result"))
}

impl ChartMeta {
    /// Long name, falling back to the short name.
    pub fn display_name(&self) -> Option<&str> {
        self.long_name
            .as_deref()
            .or(self.short_name.as_deref())
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }
}

// ── Source ────────────────────────────────────────────────────────────────────

pub struct YahooSource {
    client: HttpClient,
    base_url: Url,
}

impl YahooSource {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("Invalid provider base URL {:?}", config.base_url))?;
        Ok(Self {
            client: HttpClient::new(config)?,
            base_url,
        })
    }

    /// `{base}/v8/finance/chart/{symbol}?interval=1d&<params>`
    pub fn chart_url(&self, symbol: &str, params: &[(&str, String)]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("Provider base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol]);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("interval", "1d");
            for (k, v) in params {
                query.append_pair(k, v);
            }
        }
        Ok(url)
    }

    async fn fetch(&self, symbol: &str, params: &[(&str, String)]) -> Result<HttpResponse> {
        let url = self.chart_url(symbol, params)?;
        self.client.get_text(&url).await
    }
}

/// Decode a chart response of any status. Unknown symbols come back as 404
/// with a `chart.error` body, which is surfaced as the error text.
pub fn chart_from_response(resp: &HttpResponse) -> Result<ChartResult> {
    if !resp.status.is_success() {
        return match parse_chart(&resp.body) {
            Err(e) => Err(e.context(format!("HTTP {}", resp.status))),
            Ok(_) => Err(anyhow!("HTTP {}", resp.status)),
        };
    }
    parse_chart(&resp.body)
}

/// Name lookup response → profile. Every failure is a resolve failure.
pub fn profile_from_response(
    symbol: &str,
    resp: &HttpResponse,
) -> Result<CompanyProfile, AppError> {
    let chart =
        chart_from_response(resp).map_err(|e| AppError::resolve(symbol, format!("{:#}", e)))?;

    let name = chart
        .meta
        .display_name()
        .ok_or_else(|| AppError::resolve(symbol, "metadata has no display name"))?
        .to_string();

    Ok(CompanyProfile {
        symbol: symbol.to_string(),
        name,
        currency: chart.meta.currency,
        exchange: chart.meta.exchange_name,
    })
}

/// History response → series of bars dated on or after `start`.
pub fn series_from_response(
    symbol: &str,
    start: NaiveDate,
    resp: &HttpResponse,
) -> Result<PriceSeries, AppError> {
    let chart =
        chart_from_response(resp).map_err(|e| AppError::fetch(symbol, format!("{:#}", e)))?;

    let bars: Vec<_> = chart_to_bars(&chart)
        .into_iter()
        .filter(|b| b.date >= start)
        .collect();

    if bars.is_empty() {
        return Err(AppError::fetch(symbol, "provider returned no daily bars"));
    }

    Ok(PriceSeries::new(symbol, bars))
}

#[async_trait]
impl MarketDataSource for YahooSource {
    async fn resolve_profile(&self, symbol: &str) -> Result<CompanyProfile, AppError> {
        let resp = self
            .fetch(symbol, &[("range", "5d".to_string())])
            .await
            .map_err(|e| AppError::resolve(symbol, format!("{:#}", e)))?;

        let profile = profile_from_response(symbol, &resp)?;
        info!("{} → {}", symbol, profile.name);
        Ok(profile)
    }

    async fn fetch_daily_history(
        &self,
        symbol: &str,
        start: NaiveDate,
    ) -> Result<PriceSeries, AppError> {
        let period1 = start
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp())
            .ok_or_else(|| AppError::fetch(symbol, "invalid start date"))?;
        let period2 = Utc::now().timestamp();

        let resp = self
            .fetch(
                symbol,
                &[
                    ("period1", period1.to_string()),
                    ("period2", period2.to_string()),
                    ("events", "div,split".to_string()),
                ],
            )
            .await
            .map_err(|e| AppError::fetch(symbol, format!("{:#}", e)))?;

        let series = series_from_response(symbol, start, &resp)?;
        debug!(
            "{}: {} bars ({:?} → {:?})",
            symbol,
            series.len(),
            series.bars.first().map(|b| b.date),
            series.last_date()
        );
        Ok(series)
    }
}
