// One-hot encoding of the categorical features with the first level dropped.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::features::{FeatureFrame, NUM_CATEGORICAL};
use crate::model::ModelError;

/// Sorted vocabulary per categorical contract column.
///
/// Each column expands into one indicator per level except the first
/// (sorted) level. The dropped level and any value not seen during fit both
/// encode as all zeros, so inference never fails on an unseen team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    pub categories: Vec<Vec<String>>,
}

impl OneHotEncoder {
    pub fn fit(frame: &FeatureFrame) -> Result<Self, ModelError> {
        if frame.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        let categories = (0..NUM_CATEGORICAL)
            .map(|col| {
                frame
                    .categorical_column(col)
                    .collect::<BTreeSet<&str>>()
                    .into_iter()
                    .map(str::to_string)
                    .collect()
            })
            .collect();
        Ok(Self { categories })
    }

    /// Number of indicator columns produced.
    pub fn n_features(&self) -> usize {
        self.categories.iter().map(|c| c.len().saturating_sub(1)).sum()
    }

    /// Append the indicator columns for `categorical` to `out`.
    pub fn transform_into(&self, categorical: &[String; NUM_CATEGORICAL], out: &mut Vec<f64>) {
        for (value, levels) in categorical.iter().zip(&self.categories) {
            let width = levels.len().saturating_sub(1);
            let start = out.len();
            out.resize(start + width, 0.0);
            if let Ok(pos) = levels.binary_search_by(|l| l.as_str().cmp(value)) {
                if pos > 0 {
                    out[start + pos - 1] = 1.0;
                }
            }
        }
    }

    /// Output column names (`<column>_<level>`), mainly for diagnostics.
    pub fn feature_names(&self, columns: &[&str]) -> Vec<String> {
        columns
            .iter()
            .zip(&self.categories)
            .flat_map(|(col, levels)| levels.iter().skip(1).map(move |l| format!("{col}_{l}")))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{FeatureRow, CATEGORICAL_COLUMNS, NUM_NUMERIC};

    fn row(pos: &str, team: &str) -> FeatureRow {
        FeatureRow {
            categorical: [pos.into(), team.into(), "SEC".into(), "Alabama".into()],
            numeric: [0.0; NUM_NUMERIC],
        }
    }

    fn encode(enc: &OneHotEncoder, r: &FeatureRow) -> Vec<f64> {
        let mut out = Vec::new();
        enc.transform_into(&r.categorical, &mut out);
        out
    }

    fn fitted() -> OneHotEncoder {
        let frame: FeatureFrame = vec![row("WR", "NYJ"), row("QB", "TEN"), row("RB", "NYJ"), row("TE", "ATL")].into();
        OneHotEncoder::fit(&frame).unwrap()
    }

    #[test]
    fn vocabulary_is_sorted_and_deduplicated() {
        let enc = fitted();
        assert_eq!(enc.categories[0], vec!["QB", "RB", "TE", "WR"]);
        assert_eq!(enc.categories[1], vec!["ATL", "NYJ", "TEN"]);
        assert_eq!(enc.categories[2], vec!["SEC"]);
    }

    #[test]
    fn first_level_is_dropped() {
        let enc = fitted();
        // 3 positions + 2 teams + 0 + 0
        assert_eq!(enc.n_features(), 5);
        assert_eq!(
            enc.feature_names(&CATEGORICAL_COLUMNS),
            vec!["position_RB", "position_TE", "position_WR", "team_NYJ", "team_TEN"]
        );
        assert_eq!(encode(&enc, &row("QB", "ATL")), vec![0.0; 5]);
        assert_eq!(encode(&enc, &row("WR", "TEN")), vec![0.0, 0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn unseen_values_encode_as_zeros() {
        let enc = fitted();
        let out = encode(&enc, &row("K", "LV"));
        assert_eq!(out, vec![0.0; 5]);

        let mut r = row("RB", "LV");
        r.categorical[3] = "Never Heard Of It".into();
        assert_eq!(encode(&enc, &r), vec![1.0, 0.0, 0.0, 0.0, 0.0]);
    }
}
