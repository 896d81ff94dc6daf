//! Classifier artifacts and model lifecycle for the Titanic survival service.
//!
//! A [`ClassifierPipeline`] is the persisted, trained model: metadata, the
//! ordered feature schema it was fitted on, and an [`Estimator`]. The
//! [`ModelManager`] keeps the active pipeline behind an atomic slot so it can
//! be replaced at runtime while predictions continue.

pub mod artifact;
pub mod estimator;
pub mod manager;

pub use artifact::{ArtifactMetadata, ClassifierPipeline, FeatureTable, ARTIFACT_FORMAT_VERSION};
pub use estimator::{DecisionTree, Estimator, LogisticRegression, RandomForest, TreeNode};
pub use manager::{LoadedModel, ModelManager, ModelSource};
