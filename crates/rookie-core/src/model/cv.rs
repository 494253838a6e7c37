// K-fold cross-validation with R^2 scoring.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::features::FeatureFrame;
use crate::model::pipeline::Pipeline;
use crate::model::{FantasyModel, ModelError};

/// Per-fold R^2 scores with their mean and population standard deviation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvReport {
    pub scores: Vec<f64>,
    pub mean: f64,
    pub std: f64,
}

impl CvReport {
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n = scores.len().max(1) as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let std = (scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n).sqrt();
        Self { scores, mean, std }
    }
}

/// Coefficient of determination.
///
/// A constant `y_true` scores 1.0 on a perfect fit and 0.0 otherwise.
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let n = y_true.len() as f64;
    let mean = y_true.iter().sum::<f64>() / n;
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Contiguous, unshuffled folds. The first `n % k` folds get one extra row.
/// Returns `(train, test)` index pairs.
pub fn kfold_indices(n: usize, k: usize) -> Result<Vec<(Vec<usize>, Vec<usize>)>, ModelError> {
    if k < 2 || n < k {
        return Err(ModelError::TooFewSamples {
            samples: n,
            folds: k,
        });
    }
    let base = n / k;
    let extra = n % k;
    let mut folds = Vec::with_capacity(k);
    let mut start = 0;
    for fold in 0..k {
        let size = base + usize::from(fold < extra);
        let end = start + size;
        let test: Vec<usize> = (start..end).collect();
        let train: Vec<usize> = (0..start).chain(end..n).collect();
        folds.push((train, test));
        start = end;
    }
    Ok(folds)
}

/// Fit a fresh copy of `pipeline` on each training split and score it on
/// the held-out fold. Purely diagnostic; nothing fitted here is kept.
pub fn cross_validate(
    pipeline: &Pipeline,
    frame: &FeatureFrame,
    target: &[f64],
    folds: usize,
) -> Result<CvReport, ModelError> {
    if frame.len() != target.len() {
        return Err(ModelError::LengthMismatch {
            rows: frame.len(),
            targets: target.len(),
        });
    }

    let mut scores = Vec::with_capacity(folds);
    for (fold, (train, test)) in kfold_indices(frame.len(), folds)?.into_iter().enumerate() {
        let train_y: Vec<f64> = train.iter().map(|&i| target[i]).collect();
        let test_y: Vec<f64> = test.iter().map(|&i| target[i]).collect();

        let fitted = pipeline.fit(&frame.select(&train), &train_y)?;
        let predicted = fitted.predict(&frame.select(&test))?;
        let score = r2_score(&test_y, &predicted);
        info!("CV fold {}/{}: R2 = {:.4} ({} held out)", fold + 1, folds, score, test.len());
        scores.push(score);
    }

    Ok(CvReport::from_scores(scores))
}
