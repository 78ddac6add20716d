//! Pipeline orchestrator: ties source → features → charts → forecast together.
//!
//! ## Stages
//!
//! `run()`: one page load
//!   1. Normalise the ticker and resolve the company name
//!   2. Fetch daily bars from the configured start date
//!   3. Build SMA / change columns
//!   4. Render the three descriptive charts
//!   5. Only when `predict` is set: fit the model and chart the forecast
//!
//! Nothing is cached between calls; every call fetches afresh.

use crate::charts;
use crate::config::AnalysisConfig;
use crate::error::AppError;
use crate::features::{self, FeatureTable};
use crate::forecast::{self, ForecastOutcome};
use crate::models::CompanyProfile;
use crate::report::{self, ForecastView, PageRequest, Report};
use crate::source::cleaner::normalise_symbol;
use crate::source::MarketDataSource;
use crate::utils::Timer;
use std::sync::Arc;
use tracing::{info, warn};

pub struct Pipeline {
    config: AnalysisConfig,
    source: Arc<dyn MarketDataSource>,
}

impl Pipeline {
    pub fn new(config: AnalysisConfig, source: Arc<dyn MarketDataSource>) -> Self {
        Self { config, source }
    }

    /// Resolve, fetch and build indicator columns.
    pub async fn load(&self, raw_ticker: &str) -> Result<(CompanyProfile, FeatureTable), AppError> {
        let symbol = normalise_symbol(raw_ticker);
        if symbol.is_empty() {
            return Err(AppError::resolve(raw_ticker, "empty ticker symbol"));
        }

        let profile = {
            let _t = Timer::start(format!("resolve {}", symbol));
            self.source.resolve_profile(&symbol).await?
        };

        let series = {
            let _t = Timer::start(format!("fetch {}", symbol));
            self.source
                .fetch_daily_history(&symbol, self.config.start_date)
                .await?
        };
        if series.is_empty() {
            return Err(AppError::fetch(&symbol, "source returned an empty series"));
        }
        info!("{}: {} daily bars since {}", symbol, series.len(), self.config.start_date);

        Ok((profile, features::build(&series, self.config.sma_window)))
    }

    /// Fit and score the model on an already-built table.
    pub fn forecast(&self, table: &FeatureTable) -> Result<ForecastOutcome, AppError> {
        let _t = Timer::start(format!("forecast {}", table.series.symbol));
        forecast::run(table, &self.config)
    }

    /// One full page load.
    pub async fn run(&self, request: &PageRequest) -> Result<Report, AppError> {
        let (profile, table) = self.load(&request.ticker).await?;

        let charts = {
            let _t = Timer::start("render charts");
            vec![
                charts::close_and_sma(
                    &table,
                    &report::heading_sma(&profile, self.config.sma_window),
                )?,
                charts::daily_change(
                    &table,
                    self.config.change_tail,
                    &report::heading_change(&profile),
                )?,
                charts::candlestick(&table, &report::heading_candles(&profile))?,
            ]
        };

        let forecast = if request.predict {
            Some(self.forecast_view(&profile, &table)?)
        } else {
            None
        };

        Ok(Report {
            start_date: self.config.start_date,
            total_rows: table.len(),
            history: report::history_rows(&table, report::HISTORY_TABLE_ROWS),
            charts,
            forecast,
            profile,
        })
    }

    /// Data and model problems stay inside the forecast section so the
    /// descriptive charts survive; a chart failure still fails the page.
    fn forecast_view(
        &self,
        profile: &CompanyProfile,
        table: &FeatureTable,
    ) -> Result<ForecastView, AppError> {
        match self.forecast(table) {
            Ok(outcome) => {
                let rows = forecast::projection(table, &outcome);
                let chart = charts::actual_vs_predicted(&rows, &report::heading_forecast(profile))?;
                Ok(ForecastView::Ready { outcome, chart })
            }
            Err(e @ (AppError::InsufficientData { .. } | AppError::Model(_))) => {
                warn!("{}: forecast rejected: {}", table.series.symbol, e);
                Ok(ForecastView::Rejected {
                    message: e.user_message(),
                })
            }
            Err(e) => Err(e),
        }
    }
}
