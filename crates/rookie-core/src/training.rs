// Offline training run: prepare data, cross-validate, fit on everything, save.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::artifact::{ArtifactError, ModelArtifact};
use crate::config::TrainingConfig;
use crate::dataset::{load_and_prepare, DatasetError};
use crate::features::{CATEGORICAL_COLUMNS, NUMERIC_COLUMNS};
use crate::model::{build_pipeline, cross_validate, CvReport, ForestParams, ModelError};

#[derive(Debug, thiserror::Error)]
pub enum TrainError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("failed to write progress output: {0}")]
    Output(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub n_samples: usize,
    pub cv: CvReport,
    pub model_path: PathBuf,
}

/// Train on the CSV at `dataset` and write the artifact to `model_path`.
///
/// Progress lines and the CV summary go to `out` (stdout for the binary).
/// The cross-validation pass only reports; the saved model is refitted on
/// every row.
pub fn train_and_save(
    dataset: &Path,
    model_path: &Path,
    config: &TrainingConfig,
    out: &mut impl Write,
) -> Result<TrainingSummary, TrainError> {
    writeln!(out, "Loading data from {}...", dataset.display())?;
    let data = load_and_prepare(dataset, &config.target)?;

    writeln!(
        out,
        "Features: {} numeric, {} categorical",
        NUMERIC_COLUMNS.len(),
        CATEGORICAL_COLUMNS.len()
    )?;
    writeln!(out, "Samples: {}", data.len())?;

    let params = ForestParams {
        n_estimators: config.n_estimators,
        seed: config.seed,
    };
    let pipeline = build_pipeline(&NUMERIC_COLUMNS, params)?;

    writeln!(out, "\nRunning {}-fold cross-validation...", config.cv_folds)?;
    let cv = cross_validate(&pipeline, &data.features, &data.target, config.cv_folds)?;
    writeln!(out, "CV R2: {:.3} +/- {:.3}", cv.mean, cv.std)?;
    info!("Cross-validation R2 scores: {:?}", cv.scores);

    writeln!(out, "\nTraining on full dataset...")?;
    let fitted = pipeline.fit(&data.features, &data.target)?;

    let artifact = ModelArtifact::new(fitted, &config.target, data.len(), Some(cv.clone()));
    artifact.save(model_path)?;
    writeln!(out, "Model saved to {}", model_path.display())?;

    Ok(TrainingSummary {
        n_samples: data.len(),
        cv,
        model_path: model_path.to_path_buf(),
    })
}
