//! Core library for the rainfall prediction service.
//!
//! This crate defines:
//! - The request schema, its validation and the derived feature row
//! - The `Classifier` abstraction and loaders for on-disk model artifacts
//! - `PredictionService`, which ties the two together
//! - Configuration handling
//!
//! It is used by `rainfall-server`, but carries no HTTP or runtime dependency
//! of its own.

pub mod classifier;
pub mod config;
pub mod error;
pub mod model;
pub mod service;

pub use classifier::{Classifier, ClassifierKind, load_classifier};
pub use config::{Config, LoggingConfig, ModelConfig, ServerConfig};
pub use error::{FieldError, FieldErrorKind, InferenceError, PredictError, ValidationError};
pub use model::{
    FEATURE_NAMES, FeatureVector, Prediction, PredictionResponse, RainfallInput, derive_features,
    parse_body,
};
pub use service::PredictionService;
