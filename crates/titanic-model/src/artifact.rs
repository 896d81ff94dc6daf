//! The persisted classifier artifact.

use serde::{Deserialize, Serialize};
use titanic_core::{EncodedRow, FeatureSchema, Result, TitanicError, PASSENGER_ID_FIELD};

use crate::estimator::Estimator;

/// Current version of the [`ClassifierPipeline`] artifact format.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

fn default_format_version() -> u32 {
    ARTIFACT_FORMAT_VERSION
}

/// Descriptive metadata stored with a trained model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub model_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trained_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A trained classification pipeline: the feature schema it expects plus the
/// fitted estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierPipeline {
    #[serde(default = "default_format_version")]
    pub format_version: u32,
    pub metadata: ArtifactMetadata,
    pub schema: FeatureSchema,
    pub estimator: Estimator,
}

impl ClassifierPipeline {
    /// Deserialize and validate an artifact.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let pipeline: Self = serde_json::from_slice(bytes)
            .map_err(|e| TitanicError::Load(format!("invalid classifier artifact: {e}")))?;
        pipeline.validate()?;
        Ok(pipeline)
    }

    pub fn validate(&self) -> Result<()> {
        if self.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(TitanicError::Load(format!(
                "unsupported classifier format version {} (expected {})",
                self.format_version, ARTIFACT_FORMAT_VERSION
            )));
        }
        if self.schema.is_empty() {
            return Err(TitanicError::Load(
                "classifier schema lists no features".to_string(),
            ));
        }
        if let Some(dup) = self.schema.first_duplicate() {
            return Err(TitanicError::Load(format!(
                "classifier schema lists feature {dup} twice"
            )));
        }
        self.estimator.validate(self.schema.len())
    }

    pub fn model_version(&self) -> &str {
        &self.metadata.model_version
    }

    /// Class labels for every row: `1` iff `P(class = 1) > 0.5`.
    pub fn predict(&self, table: &FeatureTable) -> Result<Vec<u8>> {
        Ok(self
            .positive_probabilities(table)?
            .into_iter()
            .map(|p| u8::from(p > 0.5))
            .collect())
    }

    /// Class probabilities `[P(0), P(1)]` for every row.
    pub fn predict_proba(&self, table: &FeatureTable) -> Result<Vec<Vec<f64>>> {
        Ok(self
            .positive_probabilities(table)?
            .into_iter()
            .map(|p| vec![1.0 - p, p])
            .collect())
    }

    fn positive_probabilities(&self, table: &FeatureTable) -> Result<Vec<f64>> {
        self.check_schema(table)?;
        table
            .rows
            .iter()
            .map(|row| {
                let p = self.estimator.positive_probability(row);
                if p.is_finite() {
                    Ok(p)
                } else {
                    Err(TitanicError::Processing(format!(
                        "estimator produced non-finite probability {p}"
                    )))
                }
            })
            .collect()
    }

    fn check_schema(&self, table: &FeatureTable) -> Result<()> {
        let expected = &self.schema.names;
        if table.columns.len() != expected.len() {
            return Err(TitanicError::SchemaMismatch(format!(
                "expected {} features, found {}",
                expected.len(),
                table.columns.len()
            )));
        }
        if let Some((idx, (want, got))) = expected
            .iter()
            .zip(&table.columns)
            .enumerate()
            .find(|(_, (want, got))| want != got)
        {
            return Err(TitanicError::SchemaMismatch(format!(
                "column {idx}: expected {want}, found {got}"
            )));
        }
        if let Some(row) = table.rows.iter().find(|r| r.len() != table.columns.len()) {
            return Err(TitanicError::SchemaMismatch(format!(
                "row has {} values for {} columns",
                row.len(),
                table.columns.len()
            )));
        }
        Ok(())
    }
}

/// A dense, column-labelled batch of feature rows.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl FeatureTable {
    /// One-row table from an encoded row. Identifier columns are dropped.
    pub fn from_row(row: &EncodedRow) -> Self {
        let (columns, values): (Vec<String>, Vec<f64>) = row
            .features
            .iter()
            .filter(|(name, _)| name != PASSENGER_ID_FIELD)
            .map(|(name, value)| (name.clone(), *value))
            .unzip();
        Self {
            columns,
            rows: vec![values],
        }
    }
}
