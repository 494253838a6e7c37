// Historical dataset loading and leakage filtering.
//
// The master CSV joins final college-season stats with the player's rookie
// NFL results. Only the college/context columns and the single target
// survive; every other rookie-result column and the identifier columns are
// dropped before the data reaches the pipeline.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use tracing::{info, warn};

use crate::features::{
    numeric_default, FeatureFrame, FeatureRow, CATEGORICAL_COLUMNS, IDENTIFIER_COLUMNS,
    NUMERIC_COLUMNS, NUM_CATEGORICAL, NUM_NUMERIC, ROOKIE_RESULT_PREFIX,
};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Feature matrix and target vector ready for training.
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub features: FeatureFrame,
    pub target: Vec<f64>,
}

impl PreparedData {
    pub fn len(&self) -> usize {
        self.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }
}

/// Which header positions feed which contract slot, plus what was dropped.
#[derive(Debug, Clone)]
pub struct ColumnPlan {
    pub categorical: [usize; NUM_CATEGORICAL],
    pub numeric: [usize; NUM_NUMERIC],
    pub target: usize,
    /// Rookie-result columns other than the target.
    pub dropped_results: Vec<String>,
    /// Identifier / draft metadata columns.
    pub dropped_identifiers: Vec<String>,
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("dataset is missing expected columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("dataset has columns outside the feature contract: {}", .0.join(", "))]
    UnexpectedColumns(Vec<String>),

    #[error("dataset produced zero usable rows")]
    Empty,
}

// ---------------------------------------------------------------------------
// Column selection
// ---------------------------------------------------------------------------

/// Work out which columns to keep from the CSV header.
///
/// Kept: every column not carrying a rookie result, plus `target`. The
/// identifier columns are then removed; they must all be present. What is
/// left besides the target must be exactly the feature contract.
pub fn plan_columns(headers: &[&str], target: &str) -> Result<ColumnPlan, DatasetError> {
    let mut dropped_results = Vec::new();
    let mut retained: Vec<(usize, &str)> = Vec::new();
    for (i, name) in headers.iter().enumerate() {
        let name = name.trim();
        if name.starts_with(ROOKIE_RESULT_PREFIX) && name != target {
            dropped_results.push(name.to_string());
        } else {
            retained.push((i, name));
        }
    }

    let mut missing: Vec<String> = IDENTIFIER_COLUMNS
        .iter()
        .filter(|id| !retained.iter().any(|(_, n)| n == *id))
        .map(|id| id.to_string())
        .collect();

    let dropped_identifiers: Vec<String> = IDENTIFIER_COLUMNS
        .iter()
        .filter(|id| retained.iter().any(|(_, n)| n == *id))
        .map(|id| id.to_string())
        .collect();
    retained.retain(|(_, n)| !IDENTIFIER_COLUMNS.contains(n));

    let by_name: HashMap<&str, usize> = retained.iter().map(|(i, n)| (*n, *i)).collect();

    let target_idx = by_name.get(target).copied();
    if target_idx.is_none() {
        missing.push(target.to_string());
    }

    let mut categorical = [0usize; NUM_CATEGORICAL];
    for (slot, col) in CATEGORICAL_COLUMNS.iter().enumerate() {
        match by_name.get(col) {
            Some(&i) => categorical[slot] = i,
            None => missing.push(col.to_string()),
        }
    }
    let mut numeric = [0usize; NUM_NUMERIC];
    for (slot, col) in NUMERIC_COLUMNS.iter().enumerate() {
        match by_name.get(col) {
            Some(&i) => numeric[slot] = i,
            None => missing.push(col.to_string()),
        }
    }

    if !missing.is_empty() {
        return Err(DatasetError::MissingColumns(missing));
    }

    let unexpected: Vec<String> = retained
        .iter()
        .map(|(_, n)| *n)
        .filter(|n| {
            *n != target && !CATEGORICAL_COLUMNS.contains(n) && !NUMERIC_COLUMNS.contains(n)
        })
        .map(str::to_string)
        .collect();
    if !unexpected.is_empty() {
        return Err(DatasetError::UnexpectedColumns(unexpected));
    }

    Ok(ColumnPlan {
        categorical,
        numeric,
        // Checked above: a missing target returns early.
        target: target_idx.unwrap_or_default(),
        dropped_results,
        dropped_identifiers,
    })
}

// ---------------------------------------------------------------------------
// Row parsing
// ---------------------------------------------------------------------------

fn parse_row(record: &csv::StringRecord, plan: &ColumnPlan, line: u64) -> Option<(FeatureRow, f64)> {
    let target_raw = record.get(plan.target).unwrap_or("").trim();
    let target = match target_raw.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => {
            warn!("skipping row {line}: target value '{target_raw}' is not a finite number");
            return None;
        }
    };

    let categorical: [String; NUM_CATEGORICAL] =
        std::array::from_fn(|slot| record.get(plan.categorical[slot]).unwrap_or("").trim().to_string());

    let mut numeric = [0.0; NUM_NUMERIC];
    for (slot, col) in NUMERIC_COLUMNS.iter().enumerate() {
        let raw = record.get(plan.numeric[slot]).unwrap_or("").trim();
        let value = if raw.is_empty() {
            match numeric_default(col) {
                Some(v) => v,
                None => {
                    warn!("skipping row {line}: {col} is empty");
                    return None;
                }
            }
        } else {
            match raw.parse::<f64>() {
                Ok(v) if v.is_finite() => v,
                _ => {
                    warn!("skipping row {line}: {col} value '{raw}' is not a finite number");
                    return None;
                }
            }
        };
        numeric[slot] = value;
    }

    Some((FeatureRow { categorical, numeric }, target))
}

// ---------------------------------------------------------------------------
// Loaders
// ---------------------------------------------------------------------------

fn prepare_from_reader<R: Read>(
    rdr: R,
    source: &str,
    target: &str,
) -> Result<PreparedData, DatasetError> {
    let mut reader = csv::Reader::from_reader(rdr);
    let headers = reader
        .headers()
        .map_err(|e| DatasetError::Csv {
            path: source.to_string(),
            source: e,
        })?
        .clone();
    let header_names: Vec<&str> = headers.iter().collect();
    let plan = plan_columns(&header_names, target)?;

    let mut rows = Vec::new();
    let mut targets = Vec::new();
    let mut skipped = 0usize;
    for (i, result) in reader.records().enumerate() {
        // Header is line 1.
        let line = i as u64 + 2;
        match result {
            Ok(record) => match parse_row(&record, &plan, line) {
                Some((row, y)) => {
                    rows.push(row);
                    targets.push(y);
                }
                None => skipped += 1,
            },
            Err(e) => {
                warn!("skipping malformed row {line}: {e}");
                skipped += 1;
            }
        }
    }

    if rows.is_empty() {
        return Err(DatasetError::Empty);
    }

    info!(
        "Prepared {} rows from {source} ({} skipped, {} rookie-result and {} identifier columns dropped)",
        rows.len(),
        skipped,
        plan.dropped_results.len(),
        plan.dropped_identifiers.len()
    );

    Ok(PreparedData {
        features: FeatureFrame::new(rows),
        target: targets,
    })
}

/// Load the master CSV at `path` and split it into features and `target`.
pub fn load_and_prepare(path: &Path, target: &str) -> Result<PreparedData, DatasetError> {
    let file = std::fs::File::open(path).map_err(|e| DatasetError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    prepare_from_reader(file, &path.display().to_string(), target)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{all_feature_columns, TARGET_COLUMN};

    const IDS: &str = "player_name,player_id_x,player_id_y,draft_year,draft_round,draft_pick_overall,age_on_draft_day";
    const IDS_ROW: &str = "Cam Ward,1,1,2025,1,1,22.6";

    fn feature_header() -> String {
        all_feature_columns().collect::<Vec<_>>().join(",")
    }

    fn qb_features(season: &str, strength: &str) -> String {
        format!(
            "QB,TEN,ACC,Miami (FL),{season},36,4313,7,3,152,0,0,0,2,493,328,66.5,8.7,89,1.7,25,0,0,4,{strength}"
        )
    }

    fn csv_with(rows: &[String]) -> String {
        let mut out = format!("{IDS},{},R_games,{TARGET_COLUMN},R_passing_YDS\n", feature_header());
        for r in rows {
            out.push_str(r);
            out.push('\n');
        }
        out
    }

    #[test]
    fn plan_keeps_contract_and_target_only() {
        let text = csv_with(&[]);
        let header_line = text.lines().next().unwrap();
        let headers: Vec<&str> = header_line.split(',').collect();

        let plan = plan_columns(&headers, TARGET_COLUMN).unwrap();
        assert_eq!(plan.dropped_results, vec!["R_games", "R_passing_YDS"]);
        assert_eq!(plan.dropped_identifiers.len(), IDENTIFIER_COLUMNS.len());
        assert_eq!(headers[plan.target], TARGET_COLUMN);
        let kept: Vec<&str> = plan
            .categorical
            .iter()
            .chain(plan.numeric.iter())
            .map(|&i| headers[i])
            .collect();
        assert_eq!(kept, all_feature_columns().collect::<Vec<_>>());
    }

    #[test]
    fn parses_rows_in_contract_order() {
        let text = csv_with(&[format!("{IDS_ROW},{},14,231.4,3800", qb_features("2024", "8.0"))]);

        let data = prepare_from_reader(text.as_bytes(), "test", TARGET_COLUMN).unwrap();
        assert_eq!(data.len(), 1);
        assert!((data.target[0] - 231.4).abs() < f64::EPSILON);
        let row = &data.features.rows[0];
        assert_eq!(row.categorical_value("position"), Some("QB"));
        assert_eq!(row.categorical_value("C_team"), Some("Miami (FL)"));
        assert_eq!(row.numeric_value("C_season"), Some(2024.0));
        assert_eq!(row.numeric_value("C_passing_YDS"), Some(4313.0));
        assert_eq!(row.numeric_value("C_conference_strength"), Some(8.0));
    }

    #[test]
    fn quoted_team_names_with_commas() {
        let mut text = csv_with(&[]);
        text.push_str(&format!(
            "{IDS_ROW},QB,TEN,ACC,\"Miami, FL\",2024,36,4313,7,3,152,0,0,0,2,493,328,66.5,8.7,89,1.7,25,0,0,4,8.0,14,231.4,3800\n"
        ));

        let data = prepare_from_reader(text.as_bytes(), "test", TARGET_COLUMN).unwrap();
        assert_eq!(data.features.rows[0].categorical_value("C_team"), Some("Miami, FL"));
    }

    #[test]
    fn empty_stat_cells_take_defaults() {
        let text = csv_with(&[format!("{IDS_ROW},{},14,100.0,0", qb_features("2024", ""))
            .replace(",36,4313,", ",,4313,")]);

        let data = prepare_from_reader(text.as_bytes(), "test", TARGET_COLUMN).unwrap();
        let row = &data.features.rows[0];
        assert_eq!(row.numeric_value("C_passing_TD"), Some(0.0));
        assert_eq!(row.numeric_value("C_conference_strength"), Some(5.0));
    }

    #[test]
    fn bad_rows_are_skipped() {
        let text = csv_with(&[
            format!("{IDS_ROW},{},14,100.0,0", qb_features("2024", "8.0")),
            format!("{IDS_ROW},{},14,,0", qb_features("2023", "8.0")),
            format!("{IDS_ROW},{},14,80.0,0", qb_features("", "8.0")),
            format!("{IDS_ROW},{},14,80.0,0", qb_features("twenty", "8.0")),
            format!("{IDS_ROW},{},14,NaN,0", qb_features("2022", "8.0")),
            format!("{IDS_ROW},{},14,55.5,0", qb_features("2021", "7.0")),
        ]);

        let data = prepare_from_reader(text.as_bytes(), "test", TARGET_COLUMN).unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data.target, vec![100.0, 55.5]);
        assert_eq!(data.features.rows[1].numeric_value("C_season"), Some(2021.0));
    }

    #[test]
    fn missing_identifier_column_is_fatal() {
        let text = csv_with(&[]).replacen("age_on_draft_day,", "", 1);

        let err = prepare_from_reader(text.as_bytes(), "test", TARGET_COLUMN).unwrap_err();
        match err {
            DatasetError::MissingColumns(cols) => assert_eq!(cols, vec!["age_on_draft_day"]),
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn missing_feature_and_target_columns_are_fatal() {
        let text = csv_with(&[])
            .replacen(",C_rushing_LONG", "", 1)
            .replacen(&format!(",{TARGET_COLUMN}"), "", 1);

        let err = prepare_from_reader(text.as_bytes(), "test", TARGET_COLUMN).unwrap_err();
        match err {
            DatasetError::MissingColumns(cols) => {
                assert!(cols.contains(&TARGET_COLUMN.to_string()));
                assert!(cols.contains(&"C_rushing_LONG".to_string()));
            }
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn extra_college_column_is_rejected() {
        let text = csv_with(&[]).replacen("R_games", "C_kicking_FG", 1);

        let err = prepare_from_reader(text.as_bytes(), "test", TARGET_COLUMN).unwrap_err();
        match err {
            DatasetError::UnexpectedColumns(cols) => assert_eq!(cols, vec!["C_kicking_FG"]),
            other => panic!("expected UnexpectedColumns, got {other:?}"),
        }
    }

    #[test]
    fn header_only_is_empty() {
        let text = csv_with(&[]);
        let err = prepare_from_reader(text.as_bytes(), "test", TARGET_COLUMN).unwrap_err();
        assert!(matches!(err, DatasetError::Empty));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_and_prepare(Path::new("does/not/exist.csv"), TARGET_COLUMN).unwrap_err();
        assert!(matches!(err, DatasetError::Io { .. }));
        assert!(err.to_string().contains("does/not/exist.csv"));
    }
}
