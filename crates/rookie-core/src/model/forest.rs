// Bootstrap-aggregated regression trees.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::tree::RegressionTree;
use crate::model::{Matrix, ModelError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    pub params: ForestParams,
    pub n_features: usize,
    pub trees: Vec<RegressionTree>,
}

impl RandomForestRegressor {
    /// Fit `params.n_estimators` trees, each on its own bootstrap resample.
    ///
    /// Per-tree seeds are drawn from the master seed before any tree is
    /// built, so the parallel build yields the same forest on every run.
    pub fn fit(x: &Matrix, y: &[f64], params: ForestParams) -> Result<Self, ModelError> {
        let n_rows = x.n_rows();
        if n_rows == 0 {
            return Err(ModelError::EmptyTrainingSet);
        }
        if n_rows != y.len() {
            return Err(ModelError::LengthMismatch {
                rows: n_rows,
                targets: y.len(),
            });
        }

        let mut master = StdRng::seed_from_u64(params.seed);
        let tree_seeds: Vec<u64> = (0..params.n_estimators).map(|_| master.gen()).collect();

        let trees: Vec<RegressionTree> = tree_seeds
            .par_iter()
            .map(|&seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                let bootstrap: Vec<usize> = (0..n_rows).map(|_| rng.gen_range(0..n_rows)).collect();
                RegressionTree::fit(x, y, bootstrap)
            })
            .collect();

        debug!(
            "Fitted {} trees on {} rows x {} features (max depth {}, {} leaves)",
            trees.len(),
            n_rows,
            x.n_cols(),
            trees.iter().map(RegressionTree::depth).max().unwrap_or(0),
            trees.iter().map(RegressionTree::n_leaves).sum::<usize>()
        );

        Ok(Self {
            params,
            n_features: x.n_cols(),
            trees,
        })
    }

    /// Mean of every tree's prediction for one transformed row.
    pub fn predict_row(&self, row: &[f64]) -> Result<f64, ModelError> {
        if row.len() != self.n_features {
            return Err(ModelError::ShapeMismatch {
                expected: self.n_features,
                actual: row.len(),
            });
        }
        if self.trees.is_empty() {
            return Ok(0.0);
        }
        let sum: f64 = self.trees.iter().map(|t| t.predict_row(row)).sum();
        Ok(sum / self.trees.len() as f64)
    }

    pub fn predict(&self, x: &Matrix) -> Result<Vec<f64>, ModelError> {
        (0..x.n_rows()).map(|i| self.predict_row(x.row(i))).collect()
    }

    /// True when every tree is structurally sound and only splits on
    /// features the forest was fitted on.
    pub fn is_consistent(&self) -> bool {
        self.trees.iter().all(|t| t.is_well_formed(self.n_features))
    }
}
