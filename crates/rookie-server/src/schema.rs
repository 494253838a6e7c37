// Request/response shapes and request validation.
//
// Request bodies are decoded as loose JSON and checked field by field so a
// bad request reports every offending field at once, each with its location
// (`["body", "C_season"]`, or `["body", 2, "C_team"]` inside a batch).

use serde::Serialize;
use serde_json::{Map, Value};

use rookie_core::features::{
    numeric_default, FeatureRow, CATEGORICAL_COLUMNS, NUMERIC_COLUMNS, NUM_CATEGORICAL, NUM_NUMERIC,
};

// ---------------------------------------------------------------------------
// Validated request / response
// ---------------------------------------------------------------------------

/// A fully-defaulted prediction request.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRequest {
    pub player_name: String,
    pub row: FeatureRow,
}

impl PredictionRequest {
    pub fn position(&self) -> &str {
        &self.row.categorical[0]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub player_name: String,
    pub position: String,
    pub predicted_fantasy_points: f64,
}

// ---------------------------------------------------------------------------
// Validation errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub loc: Vec<Value>,
    pub msg: String,
}

impl FieldError {
    fn new(index: Option<usize>, field: Option<&str>, msg: impl Into<String>) -> Self {
        let mut loc = vec![Value::from("body")];
        if let Some(i) = index {
            loc.push(Value::from(i));
        }
        if let Some(f) = field {
            loc.push(Value::from(f));
        }
        Self {
            loc,
            msg: msg.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("request validation failed on {} field(s)", .errors.len())]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

fn required_string(
    obj: &Map<String, Value>,
    field: &str,
    index: Option<usize>,
    errors: &mut Vec<FieldError>,
) -> String {
    match obj.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(_) => {
            errors.push(FieldError::new(index, Some(field), "Input should be a valid string"));
            String::new()
        }
        None => {
            errors.push(FieldError::new(index, Some(field), "Field required"));
            String::new()
        }
    }
}

fn numeric_field(
    obj: &Map<String, Value>,
    field: &str,
    index: Option<usize>,
    errors: &mut Vec<FieldError>,
) -> f64 {
    match obj.get(field) {
        Some(Value::Number(n)) => match n.as_f64() {
            Some(v) if v.is_finite() => v,
            _ => {
                errors.push(FieldError::new(index, Some(field), "Input should be a finite number"));
                0.0
            }
        },
        // Numeric strings such as "2024" or " 36.5 " are accepted.
        Some(Value::String(s)) => match s.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => v,
            _ => {
                errors.push(FieldError::new(index, Some(field), "Input should be a valid number"));
                0.0
            }
        },
        Some(_) => {
            errors.push(FieldError::new(index, Some(field), "Input should be a valid number"));
            0.0
        }
        None => match numeric_default(field) {
            Some(v) => v,
            None => {
                errors.push(FieldError::new(index, Some(field), "Field required"));
                0.0
            }
        },
    }
}

fn parse_object(value: &Value, index: Option<usize>, errors: &mut Vec<FieldError>) -> Option<PredictionRequest> {
    let Some(obj) = value.as_object() else {
        errors.push(FieldError::new(index, None, "Input should be a valid object"));
        return None;
    };

    let before = errors.len();
    let player_name = required_string(obj, "player_name", index, errors);
    let categorical: [String; NUM_CATEGORICAL] =
        std::array::from_fn(|i| required_string(obj, CATEGORICAL_COLUMNS[i], index, errors));
    let mut numeric = [0.0; NUM_NUMERIC];
    for (slot, col) in NUMERIC_COLUMNS.iter().enumerate() {
        numeric[slot] = numeric_field(obj, col, index, errors);
    }

    (errors.len() == before).then(|| PredictionRequest {
        player_name,
        row: FeatureRow { categorical, numeric },
    })
}

/// Validate a single-record body.
pub fn parse_request(value: &Value) -> Result<PredictionRequest, ValidationError> {
    let mut errors = Vec::new();
    match parse_object(value, None, &mut errors) {
        Some(req) if errors.is_empty() => Ok(req),
        _ => Err(ValidationError { errors }),
    }
}

/// Validate a batch body. Every item is checked; any failure rejects the
/// whole batch.
pub fn parse_batch(value: &Value) -> Result<Vec<PredictionRequest>, ValidationError> {
    let Some(items) = value.as_array() else {
        return Err(ValidationError {
            errors: vec![FieldError::new(None, None, "Input should be a valid list")],
        });
    };

    let mut errors = Vec::new();
    let mut requests = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        if let Some(req) = parse_object(item, Some(i), &mut errors) {
            requests.push(req);
        }
    }

    if errors.is_empty() {
        Ok(requests)
    } else {
        Err(ValidationError { errors })
    }
}
