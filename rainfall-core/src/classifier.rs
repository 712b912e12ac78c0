use crate::{
    FeatureVector,
    classifier::{forest::RandomForest, logistic::LogisticRegression},
    error::InferenceError,
    model::FEATURE_NAMES,
};
use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use std::{convert::TryFrom, fmt::Debug, fs, path::Path, sync::Arc};

pub mod forest;
pub mod logistic;

/// A pre-trained binary model, consulted one row at a time.
///
/// Implementations are immutable once loaded and shared across requests.
pub trait Classifier: Send + Sync + Debug {
    fn kind(&self) -> ClassifierKind;

    /// Class label for a single row.
    fn predict_one(&self, features: &FeatureVector) -> Result<i64, InferenceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassifierKind {
    LogisticRegression,
    RandomForest,
}

impl ClassifierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassifierKind::LogisticRegression => "logistic_regression",
            ClassifierKind::RandomForest => "random_forest",
        }
    }

    pub const fn all() -> &'static [ClassifierKind] {
        &[ClassifierKind::LogisticRegression, ClassifierKind::RandomForest]
    }
}

impl std::fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ClassifierKind {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "logistic_regression" => Ok(ClassifierKind::LogisticRegression),
            "random_forest" => Ok(ClassifierKind::RandomForest),
            _ => Err(anyhow!(
                "Unknown classifier type '{value}'. Supported types: logistic_regression, random_forest."
            )),
        }
    }
}

/// On-disk model artifact.
///
/// ```json
/// { "feature_names": ["pressure", ...],
///   "model": { "type": "logistic_regression", ... } }
/// ```
#[derive(Debug, Deserialize)]
struct Artifact {
    feature_names: Vec<String>,
    model: serde_json::Value,
}

/// Load the classifier artifact at `path`.
///
/// Fails when the file is missing or unreadable, is not a valid artifact, was
/// trained on different features (or the same features in another order), or
/// is internally inconsistent.
pub fn load_classifier(path: &Path) -> Result<Arc<dyn Classifier>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read model artifact: {}", path.display()))?;

    let classifier = parse_classifier(&contents)
        .with_context(|| format!("Failed to load model artifact: {}", path.display()))?;

    tracing::info!(
        path = %path.display(),
        kind = %classifier.kind(),
        "loaded classifier"
    );

    Ok(classifier)
}

/// Parse an artifact already read into memory.
pub fn parse_classifier(contents: &str) -> Result<Arc<dyn Classifier>> {
    let artifact: Artifact =
        serde_json::from_str(contents).context("Model artifact is not valid JSON")?;

    check_feature_names(&artifact.feature_names)?;

    let kind = artifact
        .model
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or_else(|| anyhow!("Model artifact has no \"model.type\""))
        .and_then(ClassifierKind::try_from)?;

    let boxed: Arc<dyn Classifier> = match kind {
        ClassifierKind::LogisticRegression => {
            let model: LogisticRegression = serde_json::from_value(artifact.model)
                .context("Invalid logistic_regression model")?;
            model.check()?;
            Arc::new(model)
        }
        ClassifierKind::RandomForest => {
            let model: RandomForest = serde_json::from_value(artifact.model)
                .context("Invalid random_forest model")?;
            model.check()?;
            Arc::new(model)
        }
    };

    Ok(boxed)
}

fn check_feature_names(names: &[String]) -> Result<()> {
    let matches = names.len() == FEATURE_NAMES.len()
        && names.iter().zip(FEATURE_NAMES).all(|(a, b)| a.as_str() == b);

    if !matches {
        bail!(
            "Model was trained on features {:?}, expected {:?}",
            names,
            FEATURE_NAMES
        );
    }
    Ok(())
}

/// Both supported models carry a class list the way scikit-learn does.
fn check_binary_classes(classes: &[i64]) -> Result<()> {
    if classes.len() != 2 {
        bail!(
            "Expected a binary classifier with 2 classes, got {}",
            classes.len()
        );
    }
    Ok(())
}
