// Feature contract shared by training and serving.
//
// The fitted pipeline maps columns to weights by position, so both sides
// must build rows from these constants and nothing else.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Column names
// ---------------------------------------------------------------------------

pub const NUM_CATEGORICAL: usize = 4;
pub const NUM_NUMERIC: usize = 21;

pub const CATEGORICAL_COLUMNS: [&str; NUM_CATEGORICAL] =
    ["position", "team", "C_conference", "C_team"];

pub const NUMERIC_COLUMNS: [&str; NUM_NUMERIC] = [
    "C_season",
    "C_passing_TD",
    "C_passing_YDS",
    "C_passing_INT",
    "C_rushing_TD",
    "C_rushing_YDS",
    "C_receiving_REC",
    "C_receiving_TD",
    "C_receiving_YDS",
    "C_fumbles_LOST",
    "C_passing_ATT",
    "C_passing_COMPLETIONS",
    "C_passing_PCT",
    "C_passing_YPA",
    "C_rushing_CAR",
    "C_rushing_YPC",
    "C_rushing_LONG",
    "C_receiving_YPR",
    "C_receiving_LONG",
    "C_fumbles_FUM",
    "C_conference_strength",
];

/// Half-PPR + TE premium fantasy points from the rookie season.
pub const TARGET_COLUMN: &str = "R_fantasy_points_halfppr_tep";

/// Columns carrying rookie-season results start with this prefix. All of
/// them except [`TARGET_COLUMN`] are dropped before training.
pub const ROOKIE_RESULT_PREFIX: &str = "R_";

/// Identifier and draft metadata columns that never reach the regressor.
pub const IDENTIFIER_COLUMNS: [&str; 7] = [
    "player_name",
    "player_id_x",
    "player_id_y",
    "draft_year",
    "draft_round",
    "draft_pick_overall",
    "age_on_draft_day",
];

/// Conference strength is on a 0-10 scale; unknown means mid-table.
pub const DEFAULT_CONFERENCE_STRENGTH: f64 = 5.0;

/// Every feature column in the order the model expects: categorical first,
/// then numeric.
pub fn all_feature_columns() -> impl Iterator<Item = &'static str> {
    CATEGORICAL_COLUMNS
        .iter()
        .chain(NUMERIC_COLUMNS.iter())
        .copied()
}

/// Default used when a numeric stat is omitted from a request or left empty
/// in the dataset. `C_season` has no default and must always be supplied.
pub fn numeric_default(column: &str) -> Option<f64> {
    match column {
        "C_season" => None,
        "C_conference_strength" => Some(DEFAULT_CONFERENCE_STRENGTH),
        _ => Some(0.0),
    }
}

// ---------------------------------------------------------------------------
// Rows and frames
// ---------------------------------------------------------------------------

/// One player-season in contract order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub categorical: [String; NUM_CATEGORICAL],
    pub numeric: [f64; NUM_NUMERIC],
}

impl FeatureRow {
    /// Look up a numeric value by column name.
    pub fn numeric_value(&self, column: &str) -> Option<f64> {
        NUMERIC_COLUMNS
            .iter()
            .position(|c| *c == column)
            .map(|i| self.numeric[i])
    }

    /// Look up a categorical value by column name.
    pub fn categorical_value(&self, column: &str) -> Option<&str> {
        CATEGORICAL_COLUMNS
            .iter()
            .position(|c| *c == column)
            .map(|i| self.categorical[i].as_str())
    }
}

/// A table of feature rows, the unit the pipeline fits on and predicts for.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureFrame {
    pub rows: Vec<FeatureRow>,
}

impl FeatureFrame {
    pub fn new(rows: Vec<FeatureRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Build a new frame from the rows at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> FeatureFrame {
        FeatureFrame {
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }

    /// All values of the categorical column at `col`.
    pub fn categorical_column(&self, col: usize) -> impl Iterator<Item = &str> {
        self.rows.iter().map(move |r| r.categorical[col].as_str())
    }

    /// All values of the numeric column at `col`.
    pub fn numeric_column(&self, col: usize) -> impl Iterator<Item = f64> + '_ {
        self.rows.iter().map(move |r| r.numeric[col])
    }
}

impl From<Vec<FeatureRow>> for FeatureFrame {
    fn from(rows: Vec<FeatureRow>) -> Self {
        Self::new(rows)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
