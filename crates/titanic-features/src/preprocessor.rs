//! Record preprocessing with a persisted encoding pipeline.
//!
//! [`Preprocessor`] pairs an [`EncodingPipeline`] with the ordered output
//! feature names, and turns raw passenger records into [`EncodedRow`]s ready
//! for the classifier.

use std::path::Path;

use titanic_core::{EncodedRow, FeatureSchema, PassengerRecord, Result, TitanicError};
use tracing::{debug, warn};

use crate::encoding::EncodingPipeline;
use crate::engineer::engineer;

/// Applies feature engineering and encoding to passenger records.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    pipeline: EncodingPipeline,
    feature_names: Vec<String>,
}

impl Preprocessor {
    /// Wrap an already loaded pipeline and derive its output feature names.
    pub fn new(pipeline: EncodingPipeline) -> Self {
        let feature_names = resolve_feature_names(&pipeline);
        Self {
            pipeline,
            feature_names,
        }
    }

    /// Load the encoding pipeline artifact at `path`.
    ///
    /// # Errors
    ///
    /// [`TitanicError::NotFound`] if `path` does not exist, [`TitanicError::Load`]
    /// if it cannot be read or deserialized.
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TitanicError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let bytes = std::fs::read(path)
            .map_err(|e| TitanicError::Load(format!("failed to read {}: {e}", path.display())))?;
        let pipeline = EncodingPipeline::from_slice(&bytes)?;
        debug!(path = %path.display(), "Encoding pipeline loaded");
        Ok(Self::new(pipeline))
    }

    pub fn pipeline(&self) -> &EncodingPipeline {
        &self.pipeline
    }

    /// Ordered output feature names.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Engineer and encode a single record.
    pub fn process(&self, record: &PassengerRecord) -> Result<EncodedRow> {
        let mut rows = self.process_batch(std::slice::from_ref(record))?;
        rows.pop()
            .ok_or_else(|| TitanicError::Processing("encoder produced no rows".to_string()))
    }

    /// Engineer and encode a batch; batch statistics are shared by all records.
    pub fn process_batch(&self, records: &[PassengerRecord]) -> Result<Vec<EncodedRow>> {
        engineer(records)
            .iter()
            .map(|enriched| {
                let values = self.pipeline.transform(enriched)?;
                if values.len() != self.feature_names.len() {
                    return Err(TitanicError::Processing(format!(
                        "encoder produced {} values for {} feature names",
                        values.len(),
                        self.feature_names.len()
                    )));
                }
                let features = self.feature_names.iter().cloned().zip(values).collect();
                Ok(EncodedRow::new(Some(enriched.passenger_id), features))
            })
            .collect()
    }
}

/// Pick the output feature names for `pipeline`.
///
/// A persisted schema wins when it matches the encoder width and has no
/// duplicates. Without one, names are derived from the encoder definition.
/// Anything inconsistent falls back to positional names.
fn resolve_feature_names(pipeline: &EncodingPipeline) -> Vec<String> {
    let width = pipeline.output_width();
    let candidate = match &pipeline.feature_schema {
        Some(schema) => schema.clone(),
        None => FeatureSchema::new(pipeline.derived_feature_names()),
    };

    if candidate.len() != width {
        warn!(
            expected = width,
            found = candidate.len(),
            "Feature schema does not match encoder width, using positional names"
        );
        return FeatureSchema::positional(width).names;
    }
    if let Some(dup) = candidate.first_duplicate() {
        warn!(name = dup, "Duplicate feature name, using positional names");
        return FeatureSchema::positional(width).names;
    }
    candidate.names
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn passenger(id: i64, ticket: &str) -> PassengerRecord {
        PassengerRecord {
            passenger_id: id,
            pclass: 1,
            name: "Smith, Mr. John".to_string(),
            sex: "male".to_string(),
            age: Some(22.0),
            sib_sp: 0,
            parch: 0,
            ticket: ticket.to_string(),
            fare: Some(7.25),
            cabin: None,
            embarked: Some("S".to_string()),
        }
    }

    #[test]
    fn test_process_reattaches_passenger_id() {
        let pre = Preprocessor::new(EncodingPipeline::standard());
        let row = pre.process(&passenger(42, "A/5 21171")).unwrap();
        assert_eq!(row.passenger_id, Some(42));
        assert_eq!(row.len(), pre.feature_names().len());
        assert_eq!(row.get("Pclass"), Some(1.0));
        assert_eq!(row.get("Ticket_Group_Size"), Some(1.0));
        assert_eq!(row.get("Deck_Unknown"), Some(1.0));
    }

    #[test]
    fn test_process_batch_shares_ticket_groups() {
        let pre = Preprocessor::new(EncodingPipeline::standard());
        let rows = pre
            .process_batch(&[
                passenger(1, "A/5 21171"),
                passenger(2, "A/5 21171"),
                passenger(3, "113803"),
            ])
            .unwrap();
        assert_eq!(rows[0].get("Ticket_Group_Size"), Some(2.0));
        assert_eq!(rows[1].get("Ticket_Group_Size"), Some(2.0));
        assert_eq!(rows[2].get("Ticket_Group_Size"), Some(1.0));
        assert_eq!(rows[2].get("Ticket_Prefix_Numeric"), Some(1.0));
    }

    #[test]
    fn test_persisted_schema_is_used() {
        let mut pipeline = EncodingPipeline::standard();
        let names: Vec<String> = (0..pipeline.output_width()).map(|i| format!("f{i}")).collect();
        pipeline.feature_schema = Some(FeatureSchema::new(names.clone()));
        let pre = Preprocessor::new(pipeline);
        assert_eq!(pre.feature_names(), names.as_slice());
    }

    #[test]
    fn test_inconsistent_schema_falls_back_to_positional() {
        let mut pipeline = EncodingPipeline::standard();
        pipeline.feature_schema = Some(FeatureSchema::new(vec!["only_one".to_string()]));
        let width = pipeline.output_width();
        let pre = Preprocessor::new(pipeline);
        assert_eq!(pre.feature_names().len(), width);
        assert_eq!(pre.feature_names()[0], "feature_0");
    }

    #[test]
    fn test_duplicate_derived_names_fall_back_to_positional() {
        let mut pipeline = EncodingPipeline::standard();
        // Pclass listed twice in the passthrough block collides with itself.
        pipeline.passthrough.push(crate::encoding::OrdinalColumn::Pclass);
        let pre = Preprocessor::new(pipeline);
        assert!(pre.feature_names().iter().all(|n| n.starts_with("feature_")));
        // Encoding still works with positional names.
        let row = pre.process(&passenger(1, "1")).unwrap();
        assert_eq!(row.len(), pre.feature_names().len());
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = Preprocessor::from_path(Path::new("/nonexistent/pipeline.json")).unwrap_err();
        assert!(matches!(err, TitanicError::NotFound { .. }));
    }

    #[test]
    fn test_from_path_corrupt_file() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(b"{\"format_version\": 1").unwrap();
        let err = Preprocessor::from_path(f.path()).unwrap_err();
        assert!(matches!(err, TitanicError::Load(_)));
    }

    #[test]
    fn test_from_path_round_trip() {
        let pipeline = EncodingPipeline::standard();
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(&serde_json::to_vec(&pipeline).unwrap()).unwrap();
        let pre = Preprocessor::from_path(f.path()).unwrap();
        assert_eq!(pre.pipeline(), &pipeline);
        assert_eq!(pre.feature_names(), pipeline.derived_feature_names().as_slice());
    }
}
