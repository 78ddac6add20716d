use anyhow::{ensure, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

/// Market-data provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Window sizes and model parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_start_date")]
    pub start_date: NaiveDate,

    #[serde(default = "default_sma_window")]
    pub sma_window: usize,

    /// Number of most recent rows shown on the daily change chart.
    #[serde(default = "default_change_tail")]
    pub change_tail: usize,

    /// Rows the label is shifted by, and number of forecast days.
    #[serde(default = "default_horizon")]
    pub horizon: usize,

    #[serde(default = "default_test_ratio")]
    pub test_ratio: f64,

    #[serde(default = "default_min_training_rows")]
    pub min_training_rows: usize,

    /// Fixed seed for the train/test split. Unset means a fresh split every run.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Page output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportConfig {
    #[serde(default = "default_ticker")]
    pub default_ticker: String,

    #[serde(default = "default_out_path")]
    pub out_path: PathBuf,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_base_url() -> String {
    "https://query1.finance.yahoo.com".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; stock-forecast/0.1)".to_string()
}
fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 1, 1).unwrap_or_default()
}
fn default_sma_window() -> usize {
    14
}
fn default_change_tail() -> usize {
    100
}
fn default_horizon() -> usize {
    30
}
fn default_test_ratio() -> f64 {
    0.2
}
fn default_min_training_rows() -> usize {
    10
}
fn default_ticker() -> String {
    "AAPL".to_string()
}
fn default_out_path() -> PathBuf {
    PathBuf::from("report.html")
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            start_date: default_start_date(),
            sma_window: default_sma_window(),
            change_tail: default_change_tail(),
            horizon: default_horizon(),
            test_ratio: default_test_ratio(),
            min_training_rows: default_min_training_rows(),
            seed: None,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            default_ticker: default_ticker(),
            out_path: default_out_path(),
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::Environment::with_prefix("STOCKCAST")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .context("Failed to read configuration sources")?;

        let cfg: Self = cfg.try_deserialize().context("Invalid configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values the forecast step cannot work with.
    pub fn validate(&self) -> Result<()> {
        let a = &self.analysis;
        ensure!(
            a.test_ratio > 0.0 && a.test_ratio < 1.0,
            "analysis.test_ratio must be between 0 and 1 (exclusive), got {}",
            a.test_ratio
        );
        ensure!(a.horizon > 0, "analysis.horizon must be at least 1");
        ensure!(a.sma_window > 0, "analysis.sma_window must be at least 1");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_page_constants() {
        let cfg = AppConfig::default();
        assert_eq!(
            cfg.analysis.start_date,
            NaiveDate::from_ymd_opt(2021, 1, 1).unwrap()
        );
        assert_eq!(cfg.analysis.sma_window, 14);
        assert_eq!(cfg.analysis.change_tail, 100);
        assert_eq!(cfg.analysis.horizon, 30);
        assert_eq!(cfg.analysis.test_ratio, 0.2);
        assert!(cfg.analysis.seed.is_none());
        assert_eq!(cfg.report.default_ticker, "AAPL");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let cfg: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(
                "[analysis]\nhorizon = 5\nseed = 7\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(cfg.analysis.horizon, 5);
        assert_eq!(cfg.analysis.seed, Some(7));
        assert_eq!(cfg.analysis.sma_window, 14);
        assert_eq!(cfg.provider.timeout_secs, 30);
    }

    #[test]
    fn test_validate_test_ratio_bounds() {
        assert!(AppConfig::default().validate().is_ok());

        for ratio in [0.0, 1.0, -0.2, 1.5, f64::NAN] {
            let mut cfg = AppConfig::default();
            cfg.analysis.test_ratio = ratio;
            let err = cfg.validate().unwrap_err();
            assert!(err.to_string().contains("test_ratio"), "ratio {}", ratio);
        }

        let mut cfg = AppConfig::default();
        cfg.analysis.horizon = 0;
        assert!(cfg.validate().is_err());
    }
}
