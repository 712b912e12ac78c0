use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{FieldError, FieldErrorKind, ValidationError};

/// Weather measurements accepted by `POST /predict`.
///
/// Field names are the wire names; `temparature` is spelled that way on
/// purpose and existing clients depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RainfallInput {
    /// Atmospheric pressure, strictly positive.
    pub pressure: f64,
    /// Temperature in Celsius.
    pub temparature: f64,
    /// Relative humidity in percent, 0..=100.
    pub humidity: f64,
    /// Cloud cover percentage.
    pub cloud: f64,
    /// Hours of sunshine during the day, non-negative.
    pub sunshine: f64,
    /// Wind direction in degrees (0 = North).
    pub winddirection: f64,
    /// Wind speed in km/h.
    pub windspeed: f64,
    pub max_temp: f64,
    pub min_temp: f64,
}

#[derive(Debug, Clone, Copy)]
struct FieldRule {
    name: &'static str,
    gt: Option<f64>,
    ge: Option<f64>,
    le: Option<f64>,
}

impl FieldRule {
    const fn any(name: &'static str) -> Self {
        Self {
            name,
            gt: None,
            ge: None,
            le: None,
        }
    }

    /// NaN fails every bound it is compared against.
    fn check(&self, value: f64) -> Option<FieldErrorKind> {
        let above = |limit: f64| value.partial_cmp(&limit) == Some(Ordering::Greater);
        let below = |limit: f64| value.partial_cmp(&limit) == Some(Ordering::Less);
        let equal = |limit: f64| value.partial_cmp(&limit) == Some(Ordering::Equal);

        match (self.gt, self.ge, self.le) {
            (Some(limit), _, _) if !above(limit) => Some(FieldErrorKind::GreaterThan(limit)),
            (_, Some(limit), _) if !(above(limit) || equal(limit)) => {
                Some(FieldErrorKind::GreaterThanEqual(limit))
            }
            (_, _, Some(limit)) if !(below(limit) || equal(limit)) => {
                Some(FieldErrorKind::LessThanEqual(limit))
            }
            _ => None,
        }
    }
}

/// Schema order. Errors are reported in this order.
const RULES: [FieldRule; 9] = [
    FieldRule {
        gt: Some(0.0),
        ..FieldRule::any("pressure")
    },
    FieldRule::any("temparature"),
    FieldRule {
        ge: Some(0.0),
        le: Some(100.0),
        ..FieldRule::any("humidity")
    },
    FieldRule::any("cloud"),
    FieldRule {
        ge: Some(0.0),
        ..FieldRule::any("sunshine")
    },
    FieldRule::any("winddirection"),
    FieldRule::any("windspeed"),
    FieldRule::any("max_temp"),
    FieldRule::any("min_temp"),
];

impl RainfallInput {
    /// Parse and validate a request body, reporting every offending field.
    pub fn from_json(body: &Value) -> Result<Self, ValidationError> {
        let Some(object) = body.as_object() else {
            return Err(ValidationError::single(FieldError::new(
                FieldErrorKind::NotAnObject,
                vec!["body".to_string()],
                body.clone(),
            )));
        };

        let mut values = [0.0_f64; 9];
        let mut errors = Vec::new();

        for (slot, rule) in values.iter_mut().zip(RULES.iter()) {
            match read_number(object, rule.name) {
                Ok(value) => {
                    *slot = value;
                    if let Some(kind) = rule.check(value) {
                        errors.push(FieldError::body_field(kind, rule.name, object[rule.name].clone()));
                    }
                }
                Err(kind) => {
                    let input = match kind {
                        FieldErrorKind::Missing => body.clone(),
                        _ => object[rule.name].clone(),
                    };
                    errors.push(FieldError::body_field(kind, rule.name, input));
                }
            }
        }

        if !errors.is_empty() {
            return Err(ValidationError { errors });
        }

        let [
            pressure,
            temparature,
            humidity,
            cloud,
            sunshine,
            winddirection,
            windspeed,
            max_temp,
            min_temp,
        ] = values;

        Ok(Self {
            pressure,
            temparature,
            humidity,
            cloud,
            sunshine,
            winddirection,
            windspeed,
            max_temp,
            min_temp,
        })
    }

    /// Range checks only, for records built in code rather than parsed.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let errors: Vec<FieldError> = RULES
            .iter()
            .zip(self.values())
            .filter_map(|(rule, value)| {
                rule.check(value)
                    .map(|kind| FieldError::body_field(kind, rule.name, Value::from(value)))
            })
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { errors })
        }
    }

    fn values(&self) -> [f64; 9] {
        [
            self.pressure,
            self.temparature,
            self.humidity,
            self.cloud,
            self.sunshine,
            self.winddirection,
            self.windspeed,
            self.max_temp,
            self.min_temp,
        ]
    }
}

/// Decode a raw request body. An empty body counts as a missing body.
pub fn parse_body(bytes: &[u8]) -> Result<Value, ValidationError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ValidationError::single(FieldError::new(
            FieldErrorKind::Missing,
            vec!["body".to_string()],
            Value::Null,
        )));
    }

    serde_json::from_slice(bytes).map_err(|err| {
        ValidationError::single(FieldError::new(
            FieldErrorKind::JsonInvalid,
            vec!["body".to_string()],
            Value::String(err.to_string()),
        ))
    })
}

/// Lax float coercion: JSON numbers, numeric strings (surrounding whitespace
/// allowed) and booleans as 0/1. `null`, arrays and objects are rejected.
fn read_number(object: &Map<String, Value>, name: &str) -> Result<f64, FieldErrorKind> {
    match object.get(name) {
        None => Err(FieldErrorKind::Missing),
        Some(Value::Number(n)) => n.as_f64().ok_or(FieldErrorKind::NotANumber),
        Some(Value::String(s)) => s.trim().parse().map_err(|_| FieldErrorKind::NotParsable),
        Some(Value::Bool(b)) => Ok(if *b { 1.0 } else { 0.0 }),
        Some(_) => Err(FieldErrorKind::NotANumber),
    }
}

/// Names of the classifier inputs, in the order the model was trained on.
pub const FEATURE_NAMES: [&str; 8] = [
    "pressure",
    "temparature",
    "humidity",
    "cloud",
    "sunshine",
    "winddirection",
    "windspeed",
    "temp_range",
];

/// The row handed to the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureVector {
    pub pressure: f64,
    pub temparature: f64,
    pub humidity: f64,
    pub cloud: f64,
    pub sunshine: f64,
    pub winddirection: f64,
    pub windspeed: f64,
    pub temp_range: f64,
}

impl FeatureVector {
    /// Values in `FEATURE_NAMES` order.
    pub fn to_array(&self) -> [f64; 8] {
        [
            self.pressure,
            self.temparature,
            self.humidity,
            self.cloud,
            self.sunshine,
            self.winddirection,
            self.windspeed,
            self.temp_range,
        ]
    }
}

/// Build the classifier row. `temp_range` may be negative when
/// `min_temp > max_temp`; nothing is enforced on it.
pub fn derive_features(input: &RainfallInput) -> FeatureVector {
    FeatureVector {
        pressure: input.pressure,
        temparature: input.temparature,
        humidity: input.humidity,
        cloud: input.cloud,
        sunshine: input.sunshine,
        winddirection: input.winddirection,
        windspeed: input.windspeed,
        temp_range: input.max_temp - input.min_temp,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prediction {
    Rain,
    NoRain,
}

impl Prediction {
    /// Only class `1` means rain. Every other class label, expected or not,
    /// maps to `NoRain`.
    pub fn from_class(class: i64) -> Self {
        if class == 1 {
            Prediction::Rain
        } else {
            Prediction::NoRain
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Prediction::Rain => "Rain",
            Prediction::NoRain => "No Rain",
        }
    }
}

impl std::fmt::Display for Prediction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Success body of `POST /predict`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub prediction: String,
}

impl From<Prediction> for PredictionResponse {
    fn from(p: Prediction) -> Self {
        Self {
            prediction: p.as_str().to_string(),
        }
    }
}
