use anyhow::{Result, bail};
use serde::Deserialize;

use crate::{
    FeatureVector,
    classifier::{Classifier, ClassifierKind, check_binary_classes},
    error::InferenceError,
    model::FEATURE_NAMES,
};

/// A tree node: either a split on one feature or a leaf holding per-class
/// weights (sample counts or probabilities, normalised at prediction time).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        leaf: Vec<f64>,
    },
}

/// Nodes are stored flat, root first; children are indices into `nodes`.
#[derive(Debug, Clone, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    /// Leaf weights for `row`. Goes left when `row[feature] <= threshold`.
    fn leaf_for(&self, tree: usize, row: &[f64]) -> Result<&[f64], InferenceError> {
        let mut index = 0;

        // A well-formed tree reaches a leaf in fewer steps than it has nodes.
        for _ in 0..=self.nodes.len() {
            let node = self.nodes.get(index).ok_or_else(|| InferenceError::MalformedTree {
                tree,
                reason: format!("node index {index} out of range"),
            })?;

            match node {
                Node::Leaf { leaf } => return Ok(leaf.as_slice()),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let value = row.get(*feature).ok_or(InferenceError::FeatureIndexOutOfRange {
                        index: *feature,
                        len: row.len(),
                    })?;
                    index = if *value <= *threshold { *left } else { *right };
                }
            }
        }

        Err(InferenceError::MalformedTree {
            tree,
            reason: "cycle detected".to_string(),
        })
    }
}

/// Majority-probability forest, as exported from a scikit-learn
/// `RandomForestClassifier`.
#[derive(Debug, Clone, Deserialize)]
pub struct RandomForest {
    classes: Vec<i64>,
    trees: Vec<Tree>,
}

impl RandomForest {
    pub fn new(classes: [i64; 2], trees: Vec<Tree>) -> Self {
        Self {
            classes: classes.to_vec(),
            trees,
        }
    }

    pub(crate) fn check(&self) -> Result<()> {
        check_binary_classes(&self.classes)?;

        if self.trees.is_empty() {
            bail!("Forest has no trees");
        }

        for (t, tree) in self.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                bail!("Tree {t} has no nodes");
            }
            for (n, node) in tree.nodes.iter().enumerate() {
                match node {
                    Node::Split {
                        feature,
                        left,
                        right,
                        ..
                    } => {
                        if *feature >= FEATURE_NAMES.len() {
                            bail!("Tree {t} node {n} splits on unknown feature {feature}");
                        }
                        // Children always follow their parent in pre-order storage.
                        for child in [left, right] {
                            if *child <= n || *child >= tree.nodes.len() {
                                bail!("Tree {t} node {n} has invalid child {child}");
                            }
                        }
                    }
                    Node::Leaf { leaf } => {
                        if leaf.len() != self.classes.len() {
                            bail!(
                                "Tree {t} node {n} has {} leaf values for {} classes",
                                leaf.len(),
                                self.classes.len()
                            );
                        }
                        if leaf.iter().any(|w| !w.is_finite() || *w < 0.0) {
                            bail!("Tree {t} node {n} has a negative or non-finite leaf value");
                        }
                        if leaf.iter().sum::<f64>() <= 0.0 {
                            bail!("Tree {t} node {n} has an all-zero leaf");
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Mean class probabilities over all trees.
    pub fn predict_proba(&self, features: &FeatureVector) -> Result<Vec<f64>, InferenceError> {
        let row = features.to_array();
        let mut proba = vec![0.0; self.classes.len()];

        for (t, tree) in self.trees.iter().enumerate() {
            let leaf = tree.leaf_for(t, &row)?;
            if leaf.len() != proba.len() {
                return Err(InferenceError::MalformedTree {
                    tree: t,
                    reason: format!("leaf has {} values", leaf.len()),
                });
            }

            let total: f64 = leaf.iter().sum();
            if total > 0.0 {
                for (p, w) in proba.iter_mut().zip(leaf) {
                    *p += w / total;
                }
            }
        }

        let n = self.trees.len() as f64;
        for p in &mut proba {
            *p /= n;
        }

        if proba.iter().any(|p| !p.is_finite()) {
            return Err(InferenceError::NonFinite);
        }
        Ok(proba)
    }
}

impl Classifier for RandomForest {
    fn kind(&self) -> ClassifierKind {
        ClassifierKind::RandomForest
    }

    fn predict_one(&self, features: &FeatureVector) -> Result<i64, InferenceError> {
        let proba = self.predict_proba(features)?;

        // First maximum wins ties.
        let mut best = 0;
        for (i, p) in proba.iter().enumerate() {
            if *p > proba[best] {
                best = i;
            }
        }

        self.classes
            .get(best)
            .copied()
            .ok_or(InferenceError::UnknownClass(best))
    }
}
