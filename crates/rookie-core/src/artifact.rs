// Trained model artifact: fitted pipeline plus the contract it was fitted on.
//
// Stored as JSON. serde_json is built with `float_roundtrip`, so every
// scaler statistic, threshold and leaf value reads back bit-for-bit.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::features::{FeatureFrame, CATEGORICAL_COLUMNS, NUMERIC_COLUMNS};
use crate::model::{CvReport, FantasyModel, FittedPipeline, ModelError};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("model artifact not found at {path}")]
    NotFound { path: PathBuf },

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to (de)serialize {path}: {source}")]
    Serde {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("artifact format version {found} is not supported (expected {})", FORMAT_VERSION)]
    UnsupportedVersion { found: u32 },

    #[error("artifact feature columns do not match this build: {0}")]
    ContractMismatch(String),

    #[error("artifact is internally inconsistent: {0}")]
    Corrupt(String),
}

/// Everything the prediction service needs, written once by training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub trained_at: String,
    pub target: String,
    pub categorical_columns: Vec<String>,
    pub numeric_columns: Vec<String>,
    pub n_samples: usize,
    #[serde(default)]
    pub cv: Option<CvReport>,
    pub pipeline: FittedPipeline,
}

impl ModelArtifact {
    pub fn new(pipeline: FittedPipeline, target: &str, n_samples: usize, cv: Option<CvReport>) -> Self {
        let numeric_columns = pipeline
            .scaler
            .columns
            .iter()
            .map(|&i| NUMERIC_COLUMNS[i].to_string())
            .collect();
        Self {
            format_version: FORMAT_VERSION,
            trained_at: chrono::Utc::now().to_rfc3339(),
            target: target.to_string(),
            categorical_columns: CATEGORICAL_COLUMNS.iter().map(|c| c.to_string()).collect(),
            numeric_columns,
            n_samples,
            cv,
            pipeline,
        }
    }

    /// Write to `path`, creating the parent directory if needed.
    pub fn save(&self, path: &Path) -> Result<(), ArtifactError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ArtifactError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let file = File::create(path).map_err(|e| ArtifactError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self).map_err(|e| ArtifactError::Serde {
            path: path.to_path_buf(),
            source: e,
        })?;
        writer.flush().map_err(|e| ArtifactError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        info!(
            "Saved model artifact to {} ({} trees)",
            path.display(),
            self.pipeline.forest.trees.len()
        );
        Ok(())
    }

    /// Read and validate an artifact. A missing file is reported as
    /// [`ArtifactError::NotFound`] so callers can treat it as "no model".
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ArtifactError::NotFound {
                path: path.to_path_buf(),
            },
            _ => ArtifactError::Io {
                path: path.to_path_buf(),
                source: e,
            },
        })?;
        let artifact: ModelArtifact =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| ArtifactError::Serde {
                path: path.to_path_buf(),
                source: e,
            })?;
        artifact.validate()?;
        Ok(artifact)
    }

    fn validate(&self) -> Result<(), ArtifactError> {
        if self.format_version != FORMAT_VERSION {
            return Err(ArtifactError::UnsupportedVersion {
                found: self.format_version,
            });
        }
        if self.categorical_columns != CATEGORICAL_COLUMNS {
            return Err(ArtifactError::ContractMismatch(format!(
                "categorical columns {:?}, expected {:?}",
                self.categorical_columns, CATEGORICAL_COLUMNS
            )));
        }

        let scaler = &self.pipeline.scaler;
        let stored: Vec<&str> = self.numeric_columns.iter().map(String::as_str).collect();
        let expected: Vec<&str> = scaler
            .columns
            .iter()
            .map(|&i| NUMERIC_COLUMNS.get(i).copied().unwrap_or("<out of range>"))
            .collect();
        if stored != expected || stored.iter().any(|c| !NUMERIC_COLUMNS.contains(c)) {
            return Err(ArtifactError::ContractMismatch(format!(
                "numeric columns {stored:?} do not match scaler columns {expected:?}"
            )));
        }

        if scaler.mean.len() != scaler.columns.len() || scaler.scale.len() != scaler.columns.len() {
            return Err(ArtifactError::Corrupt("scaler statistics length".into()));
        }
        if self.pipeline.encoder.categories.len() != CATEGORICAL_COLUMNS.len() {
            return Err(ArtifactError::Corrupt("encoder vocabulary count".into()));
        }
        let forest = &self.pipeline.forest;
        if forest.n_features != self.pipeline.n_features() {
            return Err(ArtifactError::Corrupt(format!(
                "forest expects {} features, preprocessing yields {}",
                forest.n_features,
                self.pipeline.n_features()
            )));
        }
        if !forest.is_consistent() {
            return Err(ArtifactError::Corrupt("forest contains a malformed tree".into()));
        }
        Ok(())
    }
}

impl FantasyModel for ModelArtifact {
    fn predict(&self, frame: &FeatureFrame) -> Result<Vec<f64>, ModelError> {
        self.pipeline.predict(frame)
    }
}
