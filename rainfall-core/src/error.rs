use serde_json::{Value, json};
use thiserror::Error;

/// What went wrong with a single input field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldErrorKind {
    /// Body was not valid JSON.
    JsonInvalid,
    /// Body was valid JSON but not an object.
    NotAnObject,
    Missing,
    /// Not a number, a numeric string or a boolean.
    NotANumber,
    /// A string that does not parse as a number.
    NotParsable,
    GreaterThan(f64),
    GreaterThanEqual(f64),
    LessThanEqual(f64),
}

impl FieldErrorKind {
    /// Machine-readable error type, compatible with the schema-validation
    /// error bodies clients of `/predict` already parse.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldErrorKind::JsonInvalid => "json_invalid",
            FieldErrorKind::NotAnObject => "model_attributes_type",
            FieldErrorKind::Missing => "missing",
            FieldErrorKind::NotANumber => "float_type",
            FieldErrorKind::NotParsable => "float_parsing",
            FieldErrorKind::GreaterThan(_) => "greater_than",
            FieldErrorKind::GreaterThanEqual(_) => "greater_than_equal",
            FieldErrorKind::LessThanEqual(_) => "less_than_equal",
        }
    }

    pub fn message(&self) -> String {
        match self {
            FieldErrorKind::JsonInvalid => "JSON decode error".to_string(),
            FieldErrorKind::NotAnObject => {
                "Input should be a valid dictionary or object to extract fields from".to_string()
            }
            FieldErrorKind::Missing => "Field required".to_string(),
            FieldErrorKind::NotANumber => "Input should be a valid number".to_string(),
            FieldErrorKind::NotParsable => {
                "Input should be a valid number, unable to parse string as a number".to_string()
            }
            FieldErrorKind::GreaterThan(limit) => format!("Input should be greater than {limit}"),
            FieldErrorKind::GreaterThanEqual(limit) => {
                format!("Input should be greater than or equal to {limit}")
            }
            FieldErrorKind::LessThanEqual(limit) => {
                format!("Input should be less than or equal to {limit}")
            }
        }
    }
}

/// One entry of a validation failure.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub kind: FieldErrorKind,
    /// Location of the offending value, e.g. `["body", "humidity"]`.
    pub loc: Vec<String>,
    pub message: String,
    /// The offending value as received (the whole body for `Missing`).
    pub input: Value,
}

impl FieldError {
    pub fn new(kind: FieldErrorKind, loc: Vec<String>, input: Value) -> Self {
        Self {
            kind,
            loc,
            message: kind.message(),
            input,
        }
    }

    pub fn body_field(kind: FieldErrorKind, field: &str, input: Value) -> Self {
        Self::new(kind, vec!["body".to_string(), field.to_string()], input)
    }

    /// Name of the offending field, if the error is attached to one.
    pub fn field(&self) -> Option<&str> {
        self.loc.get(1).map(String::as_str)
    }
}

/// Input rejected at the boundary. Always carries at least one entry.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid input: {}", summary(.errors))]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn single(error: FieldError) -> Self {
        Self {
            errors: vec![error],
        }
    }

    pub fn fields(&self) -> Vec<&str> {
        self.errors.iter().filter_map(FieldError::field).collect()
    }

    /// Client-facing body: `{"detail": [{"type", "loc", "msg", "input"}, ...]}`.
    pub fn to_detail(&self) -> Value {
        let detail: Vec<Value> = self
            .errors
            .iter()
            .map(|e| {
                json!({
                    "type": e.kind.as_str(),
                    "loc": e.loc,
                    "msg": e.message,
                    "input": e.input,
                })
            })
            .collect();

        json!({ "detail": detail })
    }
}

fn summary(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.loc.join("."), e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Failure inside the classifier call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    #[error("feature index {index} out of range for {len} features")]
    FeatureIndexOutOfRange { index: usize, len: usize },

    #[error("malformed tree {tree}: {reason}")]
    MalformedTree { tree: usize, reason: String },

    #[error("classifier produced a non-finite score")]
    NonFinite,

    #[error("classifier has no class at index {0}")]
    UnknownClass(usize),
}

/// Everything `PredictionService::predict` can fail with.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("inference failed: {0}")]
    Inference(#[from] InferenceError),
}
