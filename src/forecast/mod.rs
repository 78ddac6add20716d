//! Forecast step: label construction, scaling, split, OLS fit, scoring and
//! the 30-day projection.
//!
//! Order of operations:
//!   1. label = Close shifted back `horizon` rows
//!   2. feature matrix = every column except SMA/label, standardized over
//!      ALL rows (the last `horizon` rows included)
//!   3. prediction input = last `horizon` standardized rows
//!   4. training data = remaining rows and their labels
//!   5. random train/test split, fit, R² on the test split
//!   6. predict `horizon` values, dated one calendar day apart
//!
//! Scaling statistics include the rows later used only as prediction input.
//! That leak is kept on purpose so results stay comparable with the page
//! this tool replaces.

pub mod dataset;
pub mod regression;

use crate::config::AnalysisConfig;
use crate::error::AppError;
use crate::features::FeatureTable;
use crate::utils::round_to;
use chrono::{Duration, NaiveDate};
use ndarray::{s, Array1};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, info};

use self::dataset::{feature_matrix, label_column, standardize, train_test_split};
use self::regression::LinearRegression;

// ── Confidence ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    /// Thresholds on the raw R² score: > 0.75 high, > 0.5 medium, else low.
    pub fn from_score(score: f64) -> Self {
        if score > 0.75 {
            Self::High
        } else if score > 0.5 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

// ── Outcome ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastOutcome {
    /// Raw R² on the held-out split.
    pub score: f64,
    /// `score` as a percentage rounded to one decimal.
    pub accuracy_pct: f64,
    pub confidence: Confidence,
    pub predictions: Vec<ForecastPoint>,
    pub train_rows: usize,
    pub test_rows: usize,
}

/// One row of the actual-vs-predicted chart. Historical rows carry only
/// `close`, appended forecast rows carry only `predict`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProjectionRow {
    pub date: NaiveDate,
    pub close: Option<f64>,
    pub predict: Option<f64>,
}

/// R² is meaningless on fewer held-out rows than this.
const MIN_TEST_ROWS: usize = 2;

/// Rows needed before a forecast is attempted.
pub fn required_rows(cfg: &AnalysisConfig) -> usize {
    cfg.horizon + cfg.min_training_rows.max(2)
}

/// `n` dates one calendar day apart, starting the day after `last`.
/// Weekends and holidays are not skipped.
pub fn future_dates(last: NaiveDate, n: usize) -> Vec<NaiveDate> {
    (1..=n as i64).map(|d| last + Duration::days(d)).collect()
}

// ── Run ───────────────────────────────────────────────────────────────────────

pub fn run(table: &FeatureTable, cfg: &AnalysisConfig) -> Result<ForecastOutcome, AppError> {
    let n = table.len();
    let horizon = cfg.horizon;
    let need = required_rows(cfg);
    if n < need {
        return Err(AppError::InsufficientData { have: n, need });
    }

    let labels = label_column(&table.series.closes(), horizon);

    let scaled = standardize(&feature_matrix(table)?);
    let history = n - horizon;
    let predict_data = scaled.slice(s![history.., ..]).to_owned();
    let x = scaled.slice(s![..history, ..]).to_owned();
    let y: Array1<f64> = labels[..history]
        .iter()
        .map(|l| l.ok_or_else(|| AppError::Model("label missing inside training window".into())))
        .collect::<Result<_, _>>()?;

    let mut rng = match cfg.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let split = train_test_split(&x, &y, cfg.test_ratio, &mut rng);
    if split.y_test.len() < MIN_TEST_ROWS {
        return Err(AppError::Model(format!(
            "test split has {} rows with test ratio {}, at least {} required",
            split.y_test.len(),
            cfg.test_ratio,
            MIN_TEST_ROWS
        )));
    }
    debug!(
        "{}: {} training rows, {} test rows, {} prediction rows",
        table.series.symbol,
        split.y_train.len(),
        split.y_test.len(),
        predict_data.nrows()
    );

    let mut model = LinearRegression::new();
    model
        .fit(&split.x_train, &split.y_train)
        .map_err(|e| AppError::Model(e.to_string()))?;

    let score = model
        .score(&split.x_test, &split.y_test)
        .map_err(|e| AppError::Model(e.to_string()))?;
    let confidence = Confidence::from_score(score);

    let predicted = model
        .predict(&predict_data)
        .map_err(|e| AppError::Model(e.to_string()))?;

    let last = table
        .series
        .last_date()
        .ok_or(AppError::InsufficientData { have: 0, need })?;
    let predictions = future_dates(last, predicted.len())
        .into_iter()
        .zip(predicted.iter())
        .map(|(date, &value)| ForecastPoint { date, value })
        .collect();

    let outcome = ForecastOutcome {
        score,
        accuracy_pct: round_to(score * 100.0, 1),
        confidence,
        predictions,
        train_rows: split.y_train.len(),
        test_rows: split.y_test.len(),
    };

    info!(
        "{}: R² {:.1}% ({} confidence)",
        table.series.symbol,
        outcome.accuracy_pct,
        confidence.label()
    );

    Ok(outcome)
}

/// Historical closes followed by one appended row per prediction.
pub fn projection(table: &FeatureTable, outcome: &ForecastOutcome) -> Vec<ProjectionRow> {
    table
        .bars()
        .iter()
        .map(|bar| ProjectionRow {
            date: bar.date,
            close: Some(bar.close),
            predict: None,
        })
        .chain(outcome.predictions.iter().map(|p| ProjectionRow {
            date: p.date,
            close: None,
            predict: Some(p.value),
        }))
        .collect()
}
