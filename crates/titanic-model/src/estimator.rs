//! Binary classifiers that can be persisted inside a [`ClassifierPipeline`].
//!
//! Both estimators produce `P(class = 1)` for a dense feature vector whose
//! layout is fixed by the pipeline's feature schema.
//!
//! [`ClassifierPipeline`]: crate::ClassifierPipeline

use serde::{Deserialize, Serialize};
use titanic_core::{Result, TitanicError};

/// A fitted estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Estimator {
    LogisticRegression(LogisticRegression),
    RandomForest(RandomForest),
}

impl Estimator {
    /// Probability of the positive class.
    pub fn positive_probability(&self, features: &[f64]) -> f64 {
        match self {
            Self::LogisticRegression(model) => model.positive_probability(features),
            Self::RandomForest(model) => model.positive_probability(features),
        }
    }

    /// Check the estimator against the number of input features.
    pub fn validate(&self, width: usize) -> Result<()> {
        match self {
            Self::LogisticRegression(model) => model.validate(width),
            Self::RandomForest(model) => model.validate(width),
        }
    }
}

// ---------------------------------------------------------------------------
// Logistic regression
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub weights: Vec<f64>,
    pub intercept: f64,
}

impl LogisticRegression {
    pub fn new(weights: Vec<f64>, intercept: f64) -> Self {
        Self { weights, intercept }
    }

    pub fn positive_probability(&self, features: &[f64]) -> f64 {
        let score: f64 = self
            .weights
            .iter()
            .zip(features)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.intercept;
        sigmoid(score)
    }

    fn validate(&self, width: usize) -> Result<()> {
        if self.weights.len() != width {
            return Err(TitanicError::Load(format!(
                "logistic regression has {} weights for {} features",
                self.weights.len(),
                width
            )));
        }
        if !self.intercept.is_finite() || self.weights.iter().any(|w| !w.is_finite()) {
            return Err(TitanicError::Load(
                "logistic regression has non-finite coefficients".to_string(),
            ));
        }
        Ok(())
    }
}

/// Numerically stable logistic function.
pub fn sigmoid(value: f64) -> f64 {
    if value >= 0.0 {
        let z = (-value).exp();
        1.0 / (1.0 + z)
    } else {
        let z = value.exp();
        z / (1.0 + z)
    }
}

// ---------------------------------------------------------------------------
// Decision trees & random forest
// ---------------------------------------------------------------------------

/// A tree node. Children always have a larger index than their parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeNode {
    /// Go `left` when `features[feature] <= threshold`, else `right`.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Terminal node holding `P(class = 1)`.
    Leaf { probability: f64 },
}

/// A binary decision tree stored as a flat node array rooted at index 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    pub fn positive_probability(&self, features: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let value = features.get(*feature).copied().unwrap_or(f64::NAN);
                    // NaN compares false and takes the right branch.
                    idx = if value <= *threshold { *left } else { *right };
                }
                Some(TreeNode::Leaf { probability }) => return *probability,
                // Unreachable for validated trees.
                None => return 0.5,
            }
        }
    }

    fn validate(&self, width: usize) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(TitanicError::Load("decision tree has no nodes".to_string()));
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= width {
                        return Err(TitanicError::Load(format!(
                            "tree node {idx} splits on feature {feature} of {width}"
                        )));
                    }
                    if threshold.is_nan() {
                        return Err(TitanicError::Load(format!(
                            "tree node {idx} has a NaN threshold"
                        )));
                    }
                    for child in [*left, *right] {
                        if child <= idx || child >= self.nodes.len() {
                            return Err(TitanicError::Load(format!(
                                "tree node {idx} has invalid child {child}"
                            )));
                        }
                    }
                }
                TreeNode::Leaf { probability } => {
                    if !(0.0..=1.0).contains(probability) {
                        return Err(TitanicError::Load(format!(
                            "tree leaf {idx} has probability {probability} outside [0, 1]"
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Bagged trees; the forest probability is the mean of the tree probabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    pub trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn positive_probability(&self, features: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.5;
        }
        let total: f64 = self
            .trees
            .iter()
            .map(|t| t.positive_probability(features))
            .sum();
        total / self.trees.len() as f64
    }

    fn validate(&self, width: usize) -> Result<()> {
        if self.trees.is_empty() {
            return Err(TitanicError::Load("random forest has no trees".to_string()));
        }
        self.trees.iter().try_for_each(|t| t.validate(width))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump(feature: usize, threshold: f64, low: f64, high: f64) -> DecisionTree {
        DecisionTree {
            nodes: vec![
                TreeNode::Split {
                    feature,
                    threshold,
                    left: 1,
                    right: 2,
                },
                TreeNode::Leaf { probability: low },
                TreeNode::Leaf { probability: high },
            ],
        }
    }

    #[test]
    fn test_sigmoid_is_symmetric_and_stable() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-12);
        assert!((sigmoid(2.0) + sigmoid(-2.0) - 1.0).abs() < 1e-12);
        assert!(sigmoid(1000.0) <= 1.0);
        assert!(sigmoid(-1000.0) >= 0.0);
    }

    #[test]
    fn test_logistic_probability() {
        let model = LogisticRegression::new(vec![1.0, -1.0], 0.0);
        assert!((model.positive_probability(&[1.0, 1.0]) - 0.5).abs() < 1e-12);
        assert!(model.positive_probability(&[3.0, 0.0]) > 0.9);
        assert!(model.positive_probability(&[0.0, 3.0]) < 0.1);
    }

    #[test]
    fn test_logistic_validate_width() {
        let model = Estimator::LogisticRegression(LogisticRegression::new(vec![1.0], 0.0));
        assert!(model.validate(1).is_ok());
        assert!(matches!(model.validate(2), Err(TitanicError::Load(_))));
    }

    #[test]
    fn test_tree_routes_on_threshold() {
        let tree = stump(0, 0.5, 0.2, 0.9);
        assert_eq!(tree.positive_probability(&[0.5]), 0.2);
        assert_eq!(tree.positive_probability(&[0.6]), 0.9);
    }

    #[test]
    fn test_forest_averages_trees() {
        let forest = RandomForest {
            trees: vec![stump(0, 0.5, 0.0, 1.0), stump(1, 0.5, 0.0, 0.5)],
        };
        assert!((forest.positive_probability(&[1.0, 1.0]) - 0.75).abs() < 1e-12);
        assert!((forest.positive_probability(&[0.0, 0.0]) - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_tree_validation_rejects_bad_structure() {
        let backwards = DecisionTree {
            nodes: vec![
                TreeNode::Leaf { probability: 0.4 },
                TreeNode::Split {
                    feature: 0,
                    threshold: 1.0,
                    left: 0,
                    right: 0,
                },
            ],
        };
        assert!(backwards.validate(1).is_err());
        assert!(stump(3, 0.5, 0.1, 0.2).validate(2).is_err());
        assert!(stump(0, 0.5, 0.1, 1.5).validate(1).is_err());
        assert!(RandomForest { trees: vec![] }.validate(1).is_err());
    }

    #[test]
    fn test_estimator_json_is_tagged() {
        let est = Estimator::RandomForest(RandomForest {
            trees: vec![stump(0, 0.5, 0.1, 0.9)],
        });
        let json = serde_json::to_value(&est).unwrap();
        assert_eq!(json["kind"], "random_forest");
        assert_eq!(json["trees"][0]["nodes"][0]["type"], "split");
        assert_eq!(json["trees"][0]["nodes"][1]["type"], "leaf");
        let back: Estimator = serde_json::from_value(json).unwrap();
        assert_eq!(back, est);
    }
}
