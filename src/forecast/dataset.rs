use crate::error::AppError;
use crate::features::FeatureTable;
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::Rng;

/// Every table column except SMA and the label, in table order.
pub const FEATURE_COLUMNS: [&str; 7] = ["High", "Low", "Open", "Close", "Adj Close", "Volume", "change"];

/// Close shifted back `horizon` rows: row i holds Close at row i + horizon.
pub fn label_column(closes: &[f64], horizon: usize) -> Vec<Option<f64>> {
    (0..closes.len())
        .map(|i| closes.get(i + horizon).copied())
        .collect()
}

/// Raw (unscaled) feature matrix, one row per bar.
pub fn feature_matrix(table: &FeatureTable) -> Result<Array2<f64>, AppError> {
    let mut flat = Vec::with_capacity(table.len() * FEATURE_COLUMNS.len());

    for (bar, change) in table.bars().iter().zip(&table.change) {
        let change = change.ok_or_else(|| {
            AppError::Model(format!("daily change undefined on {} (zero open)", bar.date))
        })?;
        let row = [bar.high, bar.low, bar.open, bar.close, bar.adj_close, bar.volume, change];
        if let Some(pos) = row.iter().position(|v| !v.is_finite()) {
            return Err(AppError::Model(format!(
                "non-finite {} on {}",
                FEATURE_COLUMNS[pos], bar.date
            )));
        }
        flat.extend_from_slice(&row);
    }

    Array2::from_shape_vec((table.len(), FEATURE_COLUMNS.len()), flat)
        .map_err(|e| AppError::Model(e.to_string()))
}

/// Column-wise zero mean / unit variance using the population standard
/// deviation over every row. Constant columns are only centred.
pub fn standardize(x: &Array2<f64>) -> Array2<f64> {
    let Some(means) = x.mean_axis(Axis(0)) else {
        return x.clone();
    };
    let scales = x
        .std_axis(Axis(0), 0.0)
        .mapv(|s| if s > 1e-12 { s } else { 1.0 });

    (x - &means) / &scales
}

/// Train/test partition of a supervised dataset.
#[derive(Debug, Clone)]
pub struct Split {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Array1<f64>,
    pub y_test: Array1<f64>,
}

/// Number of test rows for `n` samples: ceil(ratio · n).
pub fn test_size(n: usize, test_ratio: f64) -> usize {
    ((test_ratio * n as f64).ceil() as usize).min(n)
}

/// Random permutation split; the first `n - test` shuffled rows train.
pub fn train_test_split<R: Rng + ?Sized>(
    x: &Array2<f64>,
    y: &Array1<f64>,
    test_ratio: f64,
    rng: &mut R,
) -> Split {
    let n = x.nrows();
    let n_test = test_size(n, test_ratio);

    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    let (train_idx, test_idx) = indices.split_at(n - n_test);

    Split {
        x_train: x.select(Axis(0), train_idx),
        x_test: x.select(Axis(0), test_idx),
        y_train: y.select(Axis(0), train_idx),
        y_test: y.select(Axis(0), test_idx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features;
    use crate::models::{PriceBar, PriceSeries};
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn table(n: usize) -> FeatureTable {
        let start = NaiveDate::from_ymd_opt(2021, 1, 4).unwrap();
        let bars = (0..n)
            .map(|i| {
                let c = 100.0 + i as f64 + (i as f64 * 0.7).sin() * 3.0;
                PriceBar {
                    date: start + chrono::Duration::days(i as i64),
                    open: c - 0.5,
                    high: c + 1.5,
                    low: c - 1.5,
                    close: c,
                    adj_close: c * 0.98,
                    volume: 1_000_000.0 + (i as f64 * 1.3).cos() * 50_000.0,
                }
            })
            .collect();
        features::build(&PriceSeries::new("TEST", bars), 14)
    }

    #[test]
    fn test_label_shift() {
        let closes: Vec<f64> = (0..40).map(|i| i as f64).collect();
        let labels = label_column(&closes, 30);
        assert_eq!(labels.len(), 40);
        assert_eq!(labels[0], Some(30.0));
        assert_eq!(labels[9], Some(39.0));
        assert!(labels[10..].iter().all(|l| l.is_none()));
    }

    #[test]
    fn test_label_shift_short_series() {
        let labels = label_column(&[1.0, 2.0], 30);
        assert_eq!(labels, vec![None, None]);
    }

    #[test]
    fn test_feature_matrix_drops_sma() {
        let t = table(20);
        let x = feature_matrix(&t).unwrap();
        assert_eq!(x.dim(), (20, 7));
        assert_eq!(x[[3, 3]], t.bars()[3].close);
        assert_eq!(x[[3, 6]], t.change[3].unwrap());
    }

    #[test]
    fn test_feature_matrix_rejects_zero_open() {
        let mut t = table(20);
        t.change[5] = None;
        assert!(matches!(feature_matrix(&t), Err(AppError::Model(_))));
    }

    #[test]
    fn test_standardized_moments() {
        let x = feature_matrix(&table(120)).unwrap();
        let z = standardize(&x);
        for col in z.columns() {
            assert!(col.mean().unwrap().abs() < 1e-9);
            assert!((col.std(0.0) - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_standardize_constant_column() {
        let x = Array2::from_shape_fn((5, 2), |(i, j)| if j == 0 { 3.0 } else { i as f64 });
        let z = standardize(&x);
        assert!(z.column(0).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_split_sizes() {
        assert_eq!(test_size(10, 0.2), 2);
        assert_eq!(test_size(100, 0.2), 20);
        assert_eq!(test_size(11, 0.2), 3);

        let x = Array2::from_shape_fn((10, 2), |(i, j)| (i * 2 + j) as f64);
        let y = Array1::from_iter((0..10).map(|i| i as f64));
        let split = train_test_split(&x, &y, 0.2, &mut StdRng::seed_from_u64(1));
        assert_eq!(split.x_train.nrows(), 8);
        assert_eq!(split.x_test.nrows(), 2);
        assert_eq!(split.y_train.len(), 8);
        assert_eq!(split.y_test.len(), 2);
    }

    #[test]
    fn test_split_keeps_rows_paired() {
        let x = Array2::from_shape_fn((25, 1), |(i, _)| i as f64);
        let y = Array1::from_iter((0..25).map(|i| i as f64 * 10.0));
        let split = train_test_split(&x, &y, 0.2, &mut StdRng::seed_from_u64(9));
        for (row, label) in split.x_train.rows().into_iter().zip(split.y_train.iter()) {
            assert_eq!(row[0] * 10.0, *label);
        }
        let mut all: Vec<f64> = split.y_train.iter().chain(split.y_test.iter()).copied().collect();
        all.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(all, y.to_vec());
    }

    #[test]
    fn test_split_deterministic_under_seed() {
        let x = Array2::from_shape_fn((50, 1), |(i, _)| i as f64);
        let y = Array1::from_iter((0..50).map(|i| i as f64));
        let a = train_test_split(&x, &y, 0.2, &mut StdRng::seed_from_u64(42));
        let b = train_test_split(&x, &y, 0.2, &mut StdRng::seed_from_u64(42));
        assert_eq!(a.y_test, b.y_test);
    }
}
