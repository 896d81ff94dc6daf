//! The persisted feature encoding pipeline.
//!
//! An [`EncodingPipeline`] is the fitted column transformer that turns an
//! [`EnrichedRecord`] into the numeric vector a classifier consumes. The output
//! is laid out as three consecutive blocks:
//!
//! 1. one-hot expansions of categorical columns (`Deck_C`, `Embarked_S`, ...)
//! 2. passthrough ordinal columns (`Pclass`, `Sex`, `Alone`, ...)
//! 3. numeric columns (`Family_Size`, `Cabin_Count`, `Ticket_Group_Size`, `Age`, `Fare`)
//!
//! The artifact is stored as JSON and may carry an explicit [`FeatureSchema`]
//! naming the output columns.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use titanic_core::{EnrichedRecord, FeatureSchema, Result, TitanicError};

/// Artifact format version understood by this build.
pub const ENCODING_FORMAT_VERSION: u32 = 1;

/// Categorical columns that can be one-hot encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CategoricalColumn {
    #[serde(rename = "Title_Mapped")]
    Title,
    Deck,
    #[serde(rename = "Ticket_Prefix")]
    TicketPrefix,
    #[serde(rename = "Age_Group")]
    AgeGroup,
    #[serde(rename = "Fare_Group")]
    FareGroup,
    Embarked,
}

impl CategoricalColumn {
    pub fn name(self) -> &'static str {
        match self {
            Self::Title => "Title_Mapped",
            Self::Deck => "Deck",
            Self::TicketPrefix => "Ticket_Prefix",
            Self::AgeGroup => "Age_Group",
            Self::FareGroup => "Fare_Group",
            Self::Embarked => "Embarked",
        }
    }

    /// Category value of this column for `record`, if any.
    fn value(self, record: &EnrichedRecord) -> Option<String> {
        match self {
            Self::Title => Some(record.title_mapped.to_string()),
            Self::Deck => Some(record.deck.clone()),
            Self::TicketPrefix => Some(record.ticket_prefix.clone()),
            Self::AgeGroup => record.age_group.map(|g| g.to_string()),
            Self::FareGroup => Some(record.fare_group.to_string()),
            Self::Embarked => record.embarked.clone(),
        }
    }
}

/// Columns already numeric that pass through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrdinalColumn {
    Pclass,
    Sex,
    Alone,
    SibSp,
    Parch,
}

impl OrdinalColumn {
    pub fn name(self) -> &'static str {
        match self {
            Self::Pclass => "Pclass",
            Self::Sex => "Sex",
            Self::Alone => "Alone",
            Self::SibSp => "SibSp",
            Self::Parch => "Parch",
        }
    }

    fn value(self, record: &EnrichedRecord) -> f64 {
        match self {
            Self::Pclass => record.pclass as f64,
            Self::Sex => f64::from(record.sex),
            Self::Alone => f64::from(record.alone),
            Self::SibSp => f64::from(record.sib_sp),
            Self::Parch => f64::from(record.parch),
        }
    }
}

/// Numeric columns. The standard pipeline emits them in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NumericColumn {
    #[serde(rename = "Family_Size")]
    FamilySize,
    #[serde(rename = "Cabin_Count")]
    CabinCount,
    #[serde(rename = "Ticket_Group_Size")]
    TicketGroupSize,
    Age,
    Fare,
}

impl NumericColumn {
    pub fn name(self) -> &'static str {
        match self {
            Self::FamilySize => "Family_Size",
            Self::CabinCount => "Cabin_Count",
            Self::TicketGroupSize => "Ticket_Group_Size",
            Self::Age => "Age",
            Self::Fare => "Fare",
        }
    }

    fn value(self, record: &EnrichedRecord) -> Option<f64> {
        match self {
            Self::FamilySize => Some(record.family_size as f64),
            Self::CabinCount => Some(record.cabin_count as f64),
            Self::TicketGroupSize => Some(record.ticket_group_size as f64),
            Self::Age => record.age,
            Self::Fare => record.fare,
        }
    }
}

/// What to do with a category the encoder was not fitted on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleUnknown {
    /// Emit an all-zero block.
    #[default]
    Ignore,
    /// Fail with a processing error.
    Error,
}

/// Fitted categories of one one-hot encoded column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotColumn {
    pub column: CategoricalColumn,
    pub categories: Vec<String>,
}

/// One-hot block of the column transformer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    pub columns: Vec<OneHotColumn>,
    #[serde(default)]
    pub handle_unknown: HandleUnknown,
}

/// Imputation and standardisation for a numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericEncoder {
    pub column: NumericColumn,
    /// Value used when the input is missing.
    pub fill_value: f64,
    #[serde(default)]
    pub mean: f64,
    #[serde(default = "default_scale")]
    pub scale: f64,
}

fn default_scale() -> f64 {
    1.0
}

impl NumericEncoder {
    /// Identity transform with a fill value.
    pub fn passthrough(column: NumericColumn, fill_value: f64) -> Self {
        Self {
            column,
            fill_value,
            mean: 0.0,
            scale: 1.0,
        }
    }
}

/// A fitted encoding pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingPipeline {
    pub format_version: u32,
    pub one_hot: OneHotEncoder,
    #[serde(default)]
    pub passthrough: Vec<OrdinalColumn>,
    pub numeric: Vec<NumericEncoder>,
    /// Explicit output schema persisted alongside the encoder, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_schema: Option<FeatureSchema>,
}

impl EncodingPipeline {
    /// The built-in Titanic encoder.
    ///
    /// Categories follow the sorted order a fitted one-hot encoder produces;
    /// numeric fill values are the training-set medians.
    pub fn standard() -> Self {
        fn cats(values: &[&str]) -> Vec<String> {
            values.iter().map(|v| v.to_string()).collect()
        }

        Self {
            format_version: ENCODING_FORMAT_VERSION,
            one_hot: OneHotEncoder {
                columns: vec![
                    OneHotColumn {
                        column: CategoricalColumn::Title,
                        categories: cats(&["Master", "Miss", "Mr", "Mrs", "Rare"]),
                    },
                    OneHotColumn {
                        column: CategoricalColumn::Deck,
                        categories: cats(&["A", "B", "C", "D", "E", "F", "G", "T", "Unknown"]),
                    },
                    OneHotColumn {
                        column: CategoricalColumn::TicketPrefix,
                        categories: cats(&[
                            "A", "C", "CA", "F", "FCC", "LINE", "Numeric", "P", "PC", "PP", "S",
                            "SC", "SO", "SOC", "SOTON", "STON", "SW", "W", "WE",
                        ]),
                    },
                    OneHotColumn {
                        column: CategoricalColumn::AgeGroup,
                        categories: cats(&["Adult", "Child", "Elderly", "Teenager", "Young"]),
                    },
                    OneHotColumn {
                        column: CategoricalColumn::FareGroup,
                        categories: cats(&["High", "Low", "Medium", "Unknown", "Very_High"]),
                    },
                    OneHotColumn {
                        column: CategoricalColumn::Embarked,
                        categories: cats(&["C", "Q", "S"]),
                    },
                ],
                handle_unknown: HandleUnknown::Ignore,
            },
            passthrough: vec![
                OrdinalColumn::Pclass,
                OrdinalColumn::Sex,
                OrdinalColumn::Alone,
                OrdinalColumn::SibSp,
                OrdinalColumn::Parch,
            ],
            numeric: vec![
                NumericEncoder::passthrough(NumericColumn::FamilySize, 0.0),
                NumericEncoder::passthrough(NumericColumn::CabinCount, 0.0),
                NumericEncoder::passthrough(NumericColumn::TicketGroupSize, 1.0),
                NumericEncoder::passthrough(NumericColumn::Age, 28.0),
                NumericEncoder::passthrough(NumericColumn::Fare, 14.4542),
            ],
            feature_schema: None,
        }
    }

    /// Parse and validate a pipeline from its JSON serialization.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let pipeline: Self = serde_json::from_slice(bytes)
            .map_err(|e| TitanicError::Load(format!("invalid encoding pipeline: {e}")))?;
        pipeline.validate()?;
        Ok(pipeline)
    }

    /// Check that the artifact is internally consistent.
    pub fn validate(&self) -> Result<()> {
        if self.format_version != ENCODING_FORMAT_VERSION {
            return Err(TitanicError::Load(format!(
                "unsupported encoding pipeline format version {} (expected {})",
                self.format_version, ENCODING_FORMAT_VERSION
            )));
        }
        for col in &self.one_hot.columns {
            if col.categories.is_empty() {
                return Err(TitanicError::Load(format!(
                    "one-hot column {} has no categories",
                    col.column.name()
                )));
            }
            let mut seen = HashSet::new();
            if let Some(dup) = col.categories.iter().find(|c| !seen.insert(c.as_str())) {
                return Err(TitanicError::Load(format!(
                    "one-hot column {} lists category {dup} twice",
                    col.column.name()
                )));
            }
        }
        for num in &self.numeric {
            if !num.scale.is_finite() || num.scale == 0.0 {
                return Err(TitanicError::Load(format!(
                    "numeric column {} has invalid scale {}",
                    num.column.name(),
                    num.scale
                )));
            }
            if !num.fill_value.is_finite() || !num.mean.is_finite() {
                return Err(TitanicError::Load(format!(
                    "numeric column {} has a non-finite fill value or mean",
                    num.column.name()
                )));
            }
        }
        Ok(())
    }

    /// Number of output columns.
    pub fn output_width(&self) -> usize {
        let one_hot: usize = self.one_hot.columns.iter().map(|c| c.categories.len()).sum();
        one_hot + self.passthrough.len() + self.numeric.len()
    }

    /// Output names derived from the encoder definition.
    pub fn derived_feature_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.output_width());
        for col in &self.one_hot.columns {
            for cat in &col.categories {
                names.push(format!("{}_{}", col.column.name(), cat));
            }
        }
        names.extend(self.passthrough.iter().map(|c| c.name().to_string()));
        names.extend(self.numeric.iter().map(|n| n.column.name().to_string()));
        names
    }

    /// Encode one enriched record into a numeric vector of [`Self::output_width`].
    pub fn transform(&self, record: &EnrichedRecord) -> Result<Vec<f64>> {
        let mut out = Vec::with_capacity(self.output_width());

        for col in &self.one_hot.columns {
            let value = col.column.value(record);
            let hit = value
                .as_deref()
                .and_then(|v| col.categories.iter().position(|c| c == v));
            if hit.is_none() && self.one_hot.handle_unknown == HandleUnknown::Error {
                return Err(TitanicError::Processing(format!(
                    "unknown category {:?} for column {}",
                    value.unwrap_or_default(),
                    col.column.name()
                )));
            }
            out.extend((0..col.categories.len()).map(|i| if Some(i) == hit { 1.0 } else { 0.0 }));
        }

        out.extend(self.passthrough.iter().map(|c| c.value(record)));

        for num in &self.numeric {
            let raw = num
                .column
                .value(record)
                .filter(|v| !v.is_nan())
                .unwrap_or(num.fill_value);
            let scaled = (raw - num.mean) / num.scale;
            if !scaled.is_finite() {
                return Err(TitanicError::Processing(format!(
                    "non-finite value for column {}",
                    num.column.name()
                )));
            }
            out.push(scaled);
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engineer::engineer_one;
    use titanic_core::PassengerRecord;

    fn enriched(cabin: Option<&str>, embarked: Option<&str>) -> EnrichedRecord {
        engineer_one(&PassengerRecord {
            passenger_id: 1,
            pclass: 3,
            name: "Braund, Mr. Owen Harris".to_string(),
            sex: "male".to_string(),
            age: Some(22.0),
            sib_sp: 1,
            parch: 0,
            ticket: "A/5 21171".to_string(),
            fare: Some(7.25),
            cabin: cabin.map(str::to_string),
            embarked: embarked.map(str::to_string),
        })
    }

    #[test]
    fn test_standard_pipeline_is_valid() {
        let pipeline = EncodingPipeline::standard();
        pipeline.validate().unwrap();
        assert_eq!(pipeline.output_width(), 5 + 9 + 19 + 5 + 5 + 3 + 5 + 5);
        assert_eq!(
            pipeline.derived_feature_names().len(),
            pipeline.output_width()
        );
    }

    #[test]
    fn test_derived_names_follow_block_order() {
        let names = EncodingPipeline::standard().derived_feature_names();
        assert_eq!(names[0], "Title_Mapped_Master");
        assert!(names.contains(&"Deck_Unknown".to_string()));
        assert!(names.contains(&"Fare_Group_Very_High".to_string()));
        let tail: Vec<&str> = names[names.len() - 10..].iter().map(String::as_str).collect();
        assert_eq!(
            tail,
            vec![
                "Pclass",
                "Sex",
                "Alone",
                "SibSp",
                "Parch",
                "Family_Size",
                "Cabin_Count",
                "Ticket_Group_Size",
                "Age",
                "Fare"
            ]
        );
    }

    #[test]
    fn test_transform_sets_one_hot_positions() {
        let pipeline = EncodingPipeline::standard();
        let names = pipeline.derived_feature_names();
        let values = pipeline.transform(&enriched(None, Some("S"))).unwrap();
        assert_eq!(values.len(), names.len());

        let value_of = |name: &str| values[names.iter().position(|n| n == name).unwrap()];
        assert_eq!(value_of("Title_Mapped_Mr"), 1.0);
        assert_eq!(value_of("Title_Mapped_Miss"), 0.0);
        assert_eq!(value_of("Deck_Unknown"), 1.0);
        assert_eq!(value_of("Ticket_Prefix_A"), 1.0);
        assert_eq!(value_of("Age_Group_Young"), 1.0);
        assert_eq!(value_of("Fare_Group_Low"), 1.0);
        assert_eq!(value_of("Embarked_S"), 1.0);
        assert_eq!(value_of("Pclass"), 3.0);
        assert_eq!(value_of("Sex"), 1.0);
        assert_eq!(value_of("Alone"), 0.0);
        assert_eq!(value_of("SibSp"), 1.0);
        assert_eq!(value_of("Parch"), 0.0);
        assert_eq!(value_of("Family_Size"), 1.0);
        assert_eq!(value_of("Age"), 22.0);
        assert_eq!(value_of("Fare"), 7.25);
    }

    #[test]
    fn test_unknown_category_ignored_by_default() {
        let pipeline = EncodingPipeline::standard();
        let values = pipeline.transform(&enriched(Some("Z99"), None)).unwrap();
        let names = pipeline.derived_feature_names();
        let deck_sum: f64 = names
            .iter()
            .zip(&values)
            .filter(|(n, _)| n.starts_with("Deck_"))
            .map(|(_, v)| v)
            .sum();
        assert_eq!(deck_sum, 0.0);
    }

    #[test]
    fn test_unknown_category_errors_when_configured() {
        let mut pipeline = EncodingPipeline::standard();
        pipeline.one_hot.handle_unknown = HandleUnknown::Error;
        let err = pipeline.transform(&enriched(Some("Z99"), Some("S"))).unwrap_err();
        assert!(matches!(err, TitanicError::Processing(_)));
        assert!(err.to_string().contains("Deck"));
    }

    #[test]
    fn test_numeric_fill_and_scale() {
        let mut pipeline = EncodingPipeline::standard();
        pipeline.numeric = vec![NumericEncoder {
            column: NumericColumn::Fare,
            fill_value: 14.0,
            mean: 10.0,
            scale: 2.0,
        }];
        let mut record = enriched(None, Some("S"));
        record.fare = None;
        let values = pipeline.transform(&record).unwrap();
        assert_eq!(*values.last().unwrap(), 2.0);
    }

    #[test]
    fn test_from_slice_rejects_zero_scale() {
        let mut pipeline = EncodingPipeline::standard();
        pipeline.numeric[0].scale = 0.0;
        let bytes = serde_json::to_vec(&pipeline).unwrap();
        let err = EncodingPipeline::from_slice(&bytes).unwrap_err();
        assert!(matches!(err, TitanicError::Load(_)));
    }

    #[test]
    fn test_from_slice_rejects_duplicate_categories() {
        let mut pipeline = EncodingPipeline::standard();
        pipeline.one_hot.columns[0].categories.push("Mr".to_string());
        let bytes = serde_json::to_vec(&pipeline).unwrap();
        assert!(EncodingPipeline::from_slice(&bytes).is_err());
    }

    #[test]
    fn test_from_slice_rejects_unknown_version() {
        let mut pipeline = EncodingPipeline::standard();
        pipeline.format_version = 99;
        let bytes = serde_json::to_vec(&pipeline).unwrap();
        let err = EncodingPipeline::from_slice(&bytes).unwrap_err();
        assert!(err.to_string().contains("format version 99"));
    }

    #[test]
    fn test_from_slice_rejects_garbage() {
        let err = EncodingPipeline::from_slice(b"not json").unwrap_err();
        assert!(matches!(err, TitanicError::Load(_)));
    }

    #[test]
    fn test_json_uses_column_names() {
        let json = serde_json::to_value(EncodingPipeline::standard()).unwrap();
        assert_eq!(json["one_hot"]["columns"][0]["column"], "Title_Mapped");
        assert_eq!(json["numeric"][0]["column"], "Family_Size");
        assert_eq!(json["one_hot"]["handle_unknown"], "ignore");
        assert!(json.get("feature_schema").is_none());
    }
}
