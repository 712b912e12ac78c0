use anyhow::{Result, bail};
use serde::Deserialize;

use crate::{
    FeatureVector,
    classifier::{Classifier, ClassifierKind, check_binary_classes},
    error::InferenceError,
    model::FEATURE_NAMES,
};

/// Binary logistic regression exported as `coef_`, `intercept_` and `classes_`.
#[derive(Debug, Clone, Deserialize)]
pub struct LogisticRegression {
    classes: Vec<i64>,
    coefficients: Vec<f64>,
    intercept: f64,
}

impl LogisticRegression {
    pub fn new(classes: [i64; 2], coefficients: [f64; 8], intercept: f64) -> Self {
        Self {
            classes: classes.to_vec(),
            coefficients: coefficients.to_vec(),
            intercept,
        }
    }

    pub(crate) fn check(&self) -> Result<()> {
        check_binary_classes(&self.classes)?;

        if self.coefficients.len() != FEATURE_NAMES.len() {
            bail!(
                "Expected {} coefficients, got {}",
                FEATURE_NAMES.len(),
                self.coefficients.len()
            );
        }
        Ok(())
    }

    /// Signed distance to the separating hyperplane.
    pub fn decision_function(&self, features: &FeatureVector) -> f64 {
        self.coefficients
            .iter()
            .zip(features.to_array())
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.intercept
    }
}

impl Classifier for LogisticRegression {
    fn kind(&self) -> ClassifierKind {
        ClassifierKind::LogisticRegression
    }

    fn predict_one(&self, features: &FeatureVector) -> Result<i64, InferenceError> {
        let score = self.decision_function(features);
        if !score.is_finite() {
            return Err(InferenceError::NonFinite);
        }

        let index = usize::from(score > 0.0);
        self.classes
            .get(index)
            .copied()
            .ok_or(InferenceError::UnknownClass(index))
    }
}
