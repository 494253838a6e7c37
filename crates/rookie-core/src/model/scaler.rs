// Per-column standardization of the numeric features.

use serde::{Deserialize, Serialize};

use crate::features::{FeatureFrame, NUM_NUMERIC};
use crate::model::ModelError;

/// Standard deviations below this are treated as zero.
const SCALE_EPSILON: f64 = 1e-12;

/// Mean and scale for the selected numeric contract columns, fitted once.
///
/// Uses the population standard deviation (N denominator). A constant
/// column gets scale 1.0 so it transforms to zero rather than NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    /// Positions in the numeric contract, in output order.
    pub columns: Vec<usize>,
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(frame: &FeatureFrame, columns: &[usize]) -> Result<Self, ModelError> {
        if frame.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        let n = frame.len() as f64;
        let mut mean = Vec::with_capacity(columns.len());
        let mut scale = Vec::with_capacity(columns.len());
        for &col in columns {
            let m = frame.numeric_column(col).sum::<f64>() / n;
            let var = frame.numeric_column(col).map(|v| (v - m).powi(2)).sum::<f64>() / n;
            let sd = var.sqrt();
            mean.push(m);
            scale.push(if sd < SCALE_EPSILON { 1.0 } else { sd });
        }
        Ok(Self {
            columns: columns.to_vec(),
            mean,
            scale,
        })
    }

    /// Append the scaled values of the selected columns of `numeric` to `out`.
    pub fn transform_into(&self, numeric: &[f64; NUM_NUMERIC], out: &mut Vec<f64>) {
        out.extend(
            self.columns
                .iter()
                .zip(self.mean.iter().zip(&self.scale))
                .map(|(&col, (m, s))| (numeric[col] - m) / s),
        );
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureRow;

    fn all_columns() -> Vec<usize> {
        (0..NUM_NUMERIC).collect()
    }

    fn frame(values: &[(f64, f64)]) -> FeatureFrame {
        values
            .iter()
            .map(|&(a, b)| {
                let mut numeric = [7.0; NUM_NUMERIC];
                numeric[0] = a;
                numeric[1] = b;
                FeatureRow {
                    categorical: Default::default(),
                    numeric,
                }
            })
            .collect::<Vec<_>>()
            .into()
    }

    #[test]
    fn fit_uses_population_stats() {
        let scaler = StandardScaler::fit(&frame(&[(1.0, 10.0), (3.0, 10.0)]), &all_columns()).unwrap();
        assert!((scaler.mean[0] - 2.0).abs() < 1e-12);
        assert!((scaler.scale[0] - 1.0).abs() < 1e-12);
        assert!((scaler.mean[1] - 10.0).abs() < 1e-12);
    }

    #[test]
    fn constant_column_scales_to_zero() {
        let scaler = StandardScaler::fit(&frame(&[(1.0, 5.0), (2.0, 5.0), (3.0, 5.0)]), &all_columns()).unwrap();
        assert_eq!(scaler.scale[1], 1.0);
        assert_eq!(scaler.scale[2], 1.0);

        let mut out = Vec::new();
        let mut row = [7.0; NUM_NUMERIC];
        row[1] = 5.0;
        scaler.transform_into(&row, &mut out);
        assert_eq!(out.len(), NUM_NUMERIC);
        assert_eq!(out[1], 0.0);
        assert_eq!(out[2], 0.0);
    }

    #[test]
    fn transformed_training_column_has_zero_mean_unit_variance() {
        let f = frame(&[(1.0, 0.0), (2.0, 0.0), (6.0, 0.0), (11.0, 0.0)]);
        let scaler = StandardScaler::fit(&f, &all_columns()).unwrap();
        let col: Vec<f64> = f
            .rows
            .iter()
            .map(|r| {
                let mut out = Vec::new();
                scaler.transform_into(&r.numeric, &mut out);
                out[0]
            })
            .collect();
        let mean = col.iter().sum::<f64>() / 4.0;
        let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 4.0;
        assert!(mean.abs() < 1e-12);
        assert!((var - 1.0).abs() < 1e-12);
    }

    #[test]
    fn only_selected_columns_are_emitted() {
        let f = frame(&[(1.0, 10.0), (3.0, 30.0)]);
        let scaler = StandardScaler::fit(&f, &[1, 0]).unwrap();
        assert_eq!(scaler.n_features(), 2);

        let mut out = Vec::new();
        scaler.transform_into(&f.rows[0].numeric, &mut out);
        assert_eq!(out, vec![-1.0, -1.0]);
    }

    #[test]
    fn empty_frame_is_rejected() {
        let err = StandardScaler::fit(&FeatureFrame::default(), &all_columns()).unwrap_err();
        assert!(matches!(err, ModelError::EmptyTrainingSet));
    }
}
