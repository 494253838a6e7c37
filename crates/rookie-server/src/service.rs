// Prediction service: owns the (optional) loaded model for the process lifetime.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use rookie_core::artifact::{ArtifactError, ModelArtifact};
use rookie_core::features::FeatureFrame;
use rookie_core::model::{FantasyModel, ModelError};

use crate::schema::{PredictionRequest, PredictionResult};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Model not found at {path}. Run 'cargo run --bin train' first.")]
    ModelUnavailable { path: String },

    #[error("inference failed: {0}")]
    Inference(#[from] ModelError),

    #[error("model produced a non-finite prediction for '{player_name}'")]
    NonFinite { player_name: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub model_loaded: bool,
}

/// Constructed once at startup and shared read-only by every request.
///
/// The model is immutable after construction, so concurrent predictions
/// need no locking.
pub struct PredictionService {
    model: Option<Arc<dyn FantasyModel>>,
    model_path: PathBuf,
}

impl PredictionService {
    pub fn new(model: Option<Arc<dyn FantasyModel>>, model_path: impl Into<PathBuf>) -> Self {
        Self {
            model,
            model_path: model_path.into(),
        }
    }

    /// Try to load the artifact at `model_path`. Any failure leaves the
    /// service running without a model so health checks still answer.
    pub fn load(model_path: &Path) -> Self {
        let model: Option<Arc<dyn FantasyModel>> = match ModelArtifact::load(model_path) {
            Ok(artifact) => {
                info!(
                    "Loaded model from {} (trained {}, {} samples, {} trees)",
                    model_path.display(),
                    artifact.trained_at,
                    artifact.n_samples,
                    artifact.pipeline.forest.trees.len()
                );
                Some(Arc::new(artifact))
            }
            Err(ArtifactError::NotFound { path }) => {
                warn!("No model at {}; predictions unavailable until trained", path.display());
                None
            }
            Err(e) => {
                warn!("Failed to load model: {e}; predictions unavailable");
                None
            }
        };
        Self::new(model, model_path)
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn health(&self) -> Health {
        Health {
            status: "ok",
            model_loaded: self.model.is_some(),
        }
    }

    fn model(&self) -> Result<&dyn FantasyModel, ServiceError> {
        self.model
            .as_deref()
            .ok_or_else(|| ServiceError::ModelUnavailable {
                path: self.model_path.display().to_string(),
            })
    }

    pub fn predict_one(&self, request: &PredictionRequest) -> Result<PredictionResult, ServiceError> {
        let mut results = self.predict_batch(std::slice::from_ref(request))?;
        results.pop().ok_or(ServiceError::Inference(ModelError::ShapeMismatch {
            expected: 1,
            actual: 0,
        }))
    }

    /// Predict every request in one model call; output order matches input.
    pub fn predict_batch(
        &self,
        requests: &[PredictionRequest],
    ) -> Result<Vec<PredictionResult>, ServiceError> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        let model = self.model()?;

        let frame = FeatureFrame::new(requests.iter().map(|r| r.row.clone()).collect());
        let raw = model.predict(&frame)?;
        if raw.len() != requests.len() {
            return Err(ModelError::ShapeMismatch {
                expected: requests.len(),
                actual: raw.len(),
            }
            .into());
        }

        requests
            .iter()
            .zip(raw)
            .map(|(req, value)| {
                if !value.is_finite() {
                    return Err(ServiceError::NonFinite {
                        player_name: req.player_name.clone(),
                    });
                }
                Ok(PredictionResult {
                    player_name: req.player_name.clone(),
                    position: req.position().to_string(),
                    predicted_fantasy_points: round2(value),
                })
            })
            .collect()
    }
}

/// Round to 2 decimals, half to even, on the exact binary value of `value`.
///
/// Scaling by 100 in floating point first would round twice: 2.675 is
/// stored as 2.67499999..., yet `2.675 * 100.0` is exactly 267.5.
fn round2(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let bits = value.to_bits();
    let negative = bits >> 63 == 1;
    let biased_exp = ((bits >> 52) & 0x7ff) as i64;
    let fraction = bits & ((1u64 << 52) - 1);
    // value = mantissa * 2^exp
    let (mantissa, exp) = if biased_exp == 0 {
        (fraction, -1074)
    } else {
        (fraction | (1u64 << 52), biased_exp - 1075)
    };

    if exp >= 0 {
        // Already an integer.
        return value;
    }

    let scaled = u128::from(mantissa) * 100;
    let cents: u128 = if exp < -100 {
        0
    } else {
        let shift = (-exp) as u32;
        let floor = scaled >> shift;
        let rem = scaled & ((1u128 << shift) - 1);
        let half = 1u128 << (shift - 1);
        if rem > half || (rem == half && floor % 2 == 1) {
            floor + 1
        } else {
            floor
        }
    };

    let rounded = cents as f64 / 100.0;
    if negative {
        -rounded
    } else {
        rounded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rookie_core::features::{FeatureRow, NUM_NUMERIC};

    /// Returns C_season / 10 plus a fixed offset, so each row predicts differently.
    struct SeasonModel {
        offset: f64,
    }

    impl FantasyModel for SeasonModel {
        fn predict(&self, frame: &FeatureFrame) -> Result<Vec<f64>, ModelError> {
            Ok(frame
                .rows
                .iter()
                .map(|r| r.numeric[0] / 10.0 + self.offset)
                .collect())
        }
    }

    fn request(name: &str, season: f64) -> PredictionRequest {
        let mut numeric = [0.0; NUM_NUMERIC];
        numeric[0] = season;
        PredictionRequest {
            player_name: name.into(),
            row: FeatureRow {
                categorical: ["WR".into(), "NE".into(), "SEC".into(), "LSU".into()],
                numeric,
            },
        }
    }

    fn service(offset: f64) -> PredictionService {
        PredictionService::new(Some(Arc::new(SeasonModel { offset })), "models/model.json")
    }

    #[test]
    fn health_reports_model_state() {
        assert!(service(0.0).health().model_loaded);
        let empty = PredictionService::new(None, "models/model.json");
        assert_eq!(
            empty.health(),
            Health {
                status: "ok",
                model_loaded: false
            }
        );
    }

    #[test]
    fn predict_one_rounds_to_cents() {
        let result = service(0.123456).predict_one(&request("Tet McMillan", 2024.0)).unwrap();
        assert_eq!(result.player_name, "Tet McMillan");
        assert_eq!(result.position, "WR");
        assert_eq!(result.predicted_fantasy_points, 202.52);
    }

    #[test]
    fn batch_preserves_order_and_length() {
        let reqs: Vec<_> = (0..5).map(|i| request(&format!("p{i}"), 2000.0 + i as f64)).collect();
        let results = service(0.0).predict_batch(&reqs).unwrap();
        assert_eq!(results.len(), 5);
        for (i, r) in results.iter().enumerate() {
            assert_eq!(r.player_name, format!("p{i}"));
            assert_eq!(r.predicted_fantasy_points, round2(200.0 + i as f64 / 10.0));
        }
    }

    #[test]
    fn missing_model_names_path_and_remedy() {
        let svc = PredictionService::new(None, "models/model.json");
        let err = svc.predict_one(&request("x", 2020.0)).unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, ServiceError::ModelUnavailable { .. }));
        assert!(msg.contains("models/model.json"));
        assert!(msg.contains("cargo run --bin train"));

        assert!(svc.predict_batch(&[request("x", 2020.0)]).is_err());
        assert_eq!(svc.predict_batch(&[]).unwrap(), Vec::new());
    }

    #[test]
    fn rounding_is_half_even_on_the_stored_value() {
        assert_eq!(round2(0.125), 0.12);
        assert_eq!(round2(0.375), 0.38);
        assert_eq!(round2(-0.125), -0.12);
        assert_eq!(round2(2.675), 2.67);
        assert_eq!(round2(1.005), 1.0);
        assert_eq!(round2(202.523456), 202.52);
        assert_eq!(round2(99.999), 100.0);
        assert_eq!(round2(1e20), 1e20);
        assert_eq!(round2(1e-300), 0.0);
    }

    #[test]
    fn non_finite_output_is_an_error() {
        let err = service(f64::NAN).predict_one(&request("y", 2020.0)).unwrap_err();
        assert!(matches!(err, ServiceError::NonFinite { .. }));
    }

    #[test]
    fn load_without_artifact_keeps_running() {
        let svc = PredictionService::load(Path::new("definitely/missing/model.json"));
        assert!(!svc.health().model_loaded);
        assert_eq!(svc.model_path(), Path::new("definitely/missing/model.json"));
    }
}
