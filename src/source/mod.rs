pub mod cleaner;
pub mod http_client;
pub mod yahoo;

use crate::error::AppError;
use crate::models::{CompanyProfile, PriceSeries};
use async_trait::async_trait;
use chrono::NaiveDate;

pub use self::yahoo::YahooSource;

// ── Source trait ──────────────────────────────────────────────────────────────

/// Swappable market-data source abstraction.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Symbol → display name lookup. Fails for unknown symbols.
    async fn resolve_profile(&self, symbol: &str) -> Result<CompanyProfile, AppError>;

    /// Daily bars from `start` through today, ascending.
    async fn fetch_daily_history(
        &self,
        symbol: &str,
        start: NaiveDate,
    ) -> Result<PriceSeries, AppError>;
}
