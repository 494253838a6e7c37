// Regression model: preprocessing, bootstrap tree ensemble, cross-validation.

pub mod cv;
pub mod encoder;
pub mod forest;
pub mod pipeline;
pub mod scaler;
pub mod tree;

pub use cv::{cross_validate, r2_score, CvReport};
pub use forest::{ForestParams, RandomForestRegressor};
pub use pipeline::{build_pipeline, FittedPipeline, Pipeline};

use crate::features::FeatureFrame;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("cannot fit on an empty training set")]
    EmptyTrainingSet,

    #[error("feature rows ({rows}) and targets ({targets}) differ in length")]
    LengthMismatch { rows: usize, targets: usize },

    #[error("model expects {expected} transformed features, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("{samples} samples cannot be split into {folds} folds")]
    TooFewSamples { samples: usize, folds: usize },

    #[error("`{0}` is not a numeric feature column")]
    UnknownColumn(String),
}

// ---------------------------------------------------------------------------
// Prediction seam
// ---------------------------------------------------------------------------

/// Anything that turns contract-shaped rows into fantasy point predictions.
///
/// Implemented by the fitted pipeline; the prediction service only sees this
/// trait so tests can swap in a fixed-output double.
pub trait FantasyModel: Send + Sync {
    fn predict(&self, frame: &FeatureFrame) -> Result<Vec<f64>, ModelError>;
}

// ---------------------------------------------------------------------------
// Dense matrix
// ---------------------------------------------------------------------------

/// Row-major dense matrix of transformed features.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    n_cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn with_capacity(n_rows: usize, n_cols: usize) -> Self {
        Self {
            n_cols,
            data: Vec::with_capacity(n_rows * n_cols),
        }
    }

    #[cfg(test)]
    pub(crate) fn from_rows(rows: &[Vec<f64>]) -> Result<Self, ModelError> {
        let n_cols = rows.first().map_or(0, Vec::len);
        let mut m = Self::with_capacity(rows.len(), n_cols);
        for row in rows {
            m.push_row(row)?;
        }
        Ok(m)
    }

    pub fn push_row(&mut self, row: &[f64]) -> Result<(), ModelError> {
        if row.len() != self.n_cols {
            return Err(ModelError::ShapeMismatch {
                expected: self.n_cols,
                actual: row.len(),
            });
        }
        self.data.extend_from_slice(row);
        Ok(())
    }

    pub fn n_rows(&self) -> usize {
        if self.n_cols == 0 {
            0
        } else {
            self.data.len() / self.n_cols
        }
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.n_cols + col]
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.n_cols..(row + 1) * self.n_cols]
    }
}
