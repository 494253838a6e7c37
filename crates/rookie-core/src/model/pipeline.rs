// Transform-then-regress pipeline: scaler + one-hot encoder + forest.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::features::{FeatureFrame, FeatureRow, CATEGORICAL_COLUMNS, NUMERIC_COLUMNS};
use crate::model::encoder::OneHotEncoder;
use crate::model::forest::{ForestParams, RandomForestRegressor};
use crate::model::scaler::StandardScaler;
use crate::model::{FantasyModel, Matrix, ModelError};

/// An unfitted pipeline: which numeric columns to scale and how to grow
/// the forest. Every categorical contract column is always encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    numeric_slots: Vec<usize>,
    pub forest: ForestParams,
}

/// Build a pipeline scaling `numeric_columns`. Numeric contract columns not
/// listed are left out of the model.
pub fn build_pipeline(numeric_columns: &[&str], forest: ForestParams) -> Result<Pipeline, ModelError> {
    let numeric_slots = numeric_columns
        .iter()
        .map(|name| {
            NUMERIC_COLUMNS
                .iter()
                .position(|c| c == name)
                .ok_or_else(|| ModelError::UnknownColumn(name.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Pipeline {
        numeric_slots,
        forest,
    })
}

impl Pipeline {
    pub fn numeric_columns(&self) -> Vec<&'static str> {
        self.numeric_slots.iter().map(|&i| NUMERIC_COLUMNS[i]).collect()
    }

    /// Fit the preprocessing statistics and the forest on `frame` / `target`.
    pub fn fit(&self, frame: &FeatureFrame, target: &[f64]) -> Result<FittedPipeline, ModelError> {
        if frame.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        if frame.len() != target.len() {
            return Err(ModelError::LengthMismatch {
                rows: frame.len(),
                targets: target.len(),
            });
        }

        let scaler = StandardScaler::fit(frame, &self.numeric_slots)?;
        let encoder = OneHotEncoder::fit(frame)?;
        debug!(
            "Encoding {} scaled columns plus indicators: {}",
            scaler.n_features(),
            encoder.feature_names(&CATEGORICAL_COLUMNS).join(", ")
        );
        let x = transform(&scaler, &encoder, frame)?;
        let forest = RandomForestRegressor::fit(&x, target, self.forest)?;

        Ok(FittedPipeline {
            scaler,
            encoder,
            forest,
        })
    }
}

/// Fitted preprocessing statistics plus the fitted forest. Immutable after
/// fit; every prediction reuses the stored statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPipeline {
    pub scaler: StandardScaler,
    pub encoder: OneHotEncoder,
    pub forest: RandomForestRegressor,
}

impl FittedPipeline {
    /// Width of the transformed feature vector.
    pub fn n_features(&self) -> usize {
        self.scaler.n_features() + self.encoder.n_features()
    }

    pub fn transform(&self, frame: &FeatureFrame) -> Result<Matrix, ModelError> {
        transform(&self.scaler, &self.encoder, frame)
    }

    pub fn predict_row(&self, row: &FeatureRow) -> Result<f64, ModelError> {
        let mut buf = Vec::with_capacity(self.n_features());
        self.scaler.transform_into(&row.numeric, &mut buf);
        self.encoder.transform_into(&row.categorical, &mut buf);
        self.forest.predict_row(&buf)
    }
}

impl FantasyModel for FittedPipeline {
    fn predict(&self, frame: &FeatureFrame) -> Result<Vec<f64>, ModelError> {
        frame.rows.iter().map(|row| self.predict_row(row)).collect()
    }
}

fn transform(
    scaler: &StandardScaler,
    encoder: &OneHotEncoder,
    frame: &FeatureFrame,
) -> Result<Matrix, ModelError> {
    let width = scaler.n_features() + encoder.n_features();
    let mut x = Matrix::with_capacity(frame.len(), width);
    let mut buf = Vec::with_capacity(width);
    for row in &frame.rows {
        buf.clear();
        scaler.transform_into(&row.numeric, &mut buf);
        encoder.transform_into(&row.categorical, &mut buf);
        x.push_row(&buf)?;
    }
    Ok(x)
}
