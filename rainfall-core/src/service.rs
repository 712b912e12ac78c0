use std::{path::Path, sync::Arc};

use anyhow::Result;
use serde_json::Value;

use crate::{
    classifier::{Classifier, load_classifier},
    error::PredictError,
    model::{Prediction, RainfallInput, derive_features, parse_body},
};

/// Immutable prediction service: built once at startup, shared by every
/// request through an `Arc`.
#[derive(Debug, Clone)]
pub struct PredictionService {
    classifier: Arc<dyn Classifier>,
}

impl PredictionService {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self { classifier }
    }

    /// Load the classifier artifact and wrap it. Any failure here is fatal
    /// for the caller: no request may be served without a classifier.
    pub fn from_model_path(path: &Path) -> Result<Self> {
        Ok(Self::new(load_classifier(path)?))
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    /// Validate, derive `temp_range`, classify, label.
    pub fn predict(&self, input: &RainfallInput) -> Result<Prediction, PredictError> {
        input.validate()?;
        self.classify(input)
    }

    /// Same as [`predict`](Self::predict) for a raw JSON body.
    pub fn predict_json(&self, body: &Value) -> Result<Prediction, PredictError> {
        let input = RainfallInput::from_json(body)?;
        self.classify(&input)
    }

    /// Entry point for raw request bodies.
    pub fn predict_body(&self, bytes: &[u8]) -> Result<Prediction, PredictError> {
        let body = parse_body(bytes)?;
        self.predict_json(&body)
    }

    fn classify(&self, input: &RainfallInput) -> Result<Prediction, PredictError> {
        let features = derive_features(input);
        let class = self.classifier.predict_one(&features)?;
        Ok(Prediction::from_class(class))
    }
}
