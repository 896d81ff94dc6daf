//! Core types, configuration, and errors for the Titanic survival service.
//!
//! This crate holds the data structures shared by the feature engineering,
//! model management, and HTTP layers: raw and enriched passenger records,
//! encoded feature rows, the persisted feature schema descriptor, prediction
//! results, service configuration, and the common error type.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Passenger records
// ---------------------------------------------------------------------------

/// Wire name of the passenger identifier field.
pub const PASSENGER_ID_FIELD: &str = "PassengerId";

/// A raw passenger record as received from a client or a dataset row.
///
/// Field names on the wire follow the Kaggle dataset columns
/// (`PassengerId`, `Pclass`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassengerRecord {
    /// Passenger identifier.
    #[serde(rename = "PassengerId")]
    pub passenger_id: i64,
    /// Ticket class tier (1, 2 or 3).
    #[serde(rename = "Pclass")]
    pub pclass: i64,
    /// Full name, e.g. `"Braund, Mr. Owen Harris"`.
    #[serde(rename = "Name")]
    pub name: String,
    /// Sex as free text (`"male"` / `"female"`).
    #[serde(rename = "Sex")]
    pub sex: String,
    /// Age in years, if known.
    #[serde(rename = "Age", default)]
    pub age: Option<f64>,
    /// Number of siblings and spouses aboard.
    #[serde(rename = "SibSp")]
    pub sib_sp: u32,
    /// Number of parents and children aboard.
    #[serde(rename = "Parch")]
    pub parch: u32,
    /// Ticket number string.
    #[serde(rename = "Ticket")]
    pub ticket: String,
    /// Fare paid, if known.
    #[serde(rename = "Fare", default)]
    pub fare: Option<f64>,
    /// Cabin string, possibly listing several cabins (`"C23 C25 C27"`).
    #[serde(rename = "Cabin", default)]
    pub cabin: Option<String>,
    /// Embarkation port code (`C`, `Q`, `S`).
    #[serde(rename = "Embarked", default)]
    pub embarked: Option<String>,
}

// ---------------------------------------------------------------------------
// Derived categories
// ---------------------------------------------------------------------------

/// Normalised honorific extracted from the passenger name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Title {
    Mr,
    Miss,
    Mrs,
    Master,
    Rare,
}

impl Title {
    /// Category label used by the encoder.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mr => "Mr",
            Self::Miss => "Miss",
            Self::Mrs => "Mrs",
            Self::Master => "Master",
            Self::Rare => "Rare",
        }
    }
}

/// Age band. Bins are lower-exclusive and upper-inclusive:
/// `(0,12] (12,18] (18,35] (35,60] (60,100]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgeGroup {
    Child,
    Teenager,
    Young,
    Adult,
    Elderly,
}

impl AgeGroup {
    /// Category label used by the encoder.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Child => "Child",
            Self::Teenager => "Teenager",
            Self::Young => "Young",
            Self::Adult => "Adult",
            Self::Elderly => "Elderly",
        }
    }
}

/// Fare band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FareGroup {
    Low,
    Medium,
    High,
    #[serde(rename = "Very_High")]
    VeryHigh,
    Unknown,
}

impl FareGroup {
    /// Category label used by the encoder.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::VeryHigh => "Very_High",
            Self::Unknown => "Unknown",
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_as_str!(Title, AgeGroup, FareGroup);

/// Sentinel deck used when a passenger has no cabin.
pub const UNKNOWN_DECK: &str = "Unknown";

/// Sentinel ticket prefix used when a ticket has no leading letters.
pub const NUMERIC_TICKET_PREFIX: &str = "Numeric";

/// A passenger record enriched with derived features.
///
/// Every derived field is a pure function of the source record, except
/// `ticket_group_size`, `age` and `embarked` which depend on the batch the
/// record was engineered with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedRecord {
    pub passenger_id: i64,
    pub pclass: i64,
    pub name: String,
    /// Age after batch-median imputation. `None` only when the whole batch
    /// lacked an age.
    pub age: Option<f64>,
    pub sib_sp: u32,
    pub parch: u32,
    pub ticket: String,
    pub fare: Option<f64>,
    pub cabin: Option<String>,
    /// Embarkation port after batch-mode imputation.
    pub embarked: Option<String>,
    /// Raw title word preceding a period in the name, or empty.
    pub title: String,
    pub title_mapped: Title,
    /// `1` for male, `0` otherwise.
    pub sex: u8,
    pub deck: String,
    pub cabin_count: usize,
    pub ticket_prefix: String,
    pub age_group: Option<AgeGroup>,
    pub fare_group: FareGroup,
    /// `parch + sib_sp`; the sum of two `u32` counts always fits in `u64`.
    pub family_size: u64,
    /// `1` iff `family_size == 0`.
    pub alone: u8,
    pub ticket_group_size: usize,
}

// ---------------------------------------------------------------------------
// Encoded rows & feature schema
// ---------------------------------------------------------------------------

/// A fully encoded feature row: feature name to value, in encoder order,
/// with the passenger identifier carried alongside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedRow {
    pub passenger_id: Option<i64>,
    pub features: Vec<(String, f64)>,
}

impl EncodedRow {
    pub fn new(passenger_id: Option<i64>, features: Vec<(String, f64)>) -> Self {
        Self {
            passenger_id,
            features,
        }
    }

    /// Look up a feature value by name.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.features
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    /// Feature names in row order.
    pub fn names(&self) -> Vec<&str> {
        self.features.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Current version of the [`FeatureSchema`] descriptor.
pub const FEATURE_SCHEMA_VERSION: u32 = 1;

/// Versioned, ordered list of feature names a pipeline produces or expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    #[serde(default = "default_schema_version")]
    pub version: u32,
    pub names: Vec<String>,
}

fn default_schema_version() -> u32 {
    FEATURE_SCHEMA_VERSION
}

impl FeatureSchema {
    pub fn new(names: Vec<String>) -> Self {
        Self {
            version: FEATURE_SCHEMA_VERSION,
            names,
        }
    }

    /// Generic positional names `feature_0 .. feature_{width-1}`.
    pub fn positional(width: usize) -> Self {
        Self::new((0..width).map(|i| format!("feature_{i}")).collect())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Returns the first duplicated name, if any.
    pub fn first_duplicate(&self) -> Option<&str> {
        let mut seen = std::collections::HashSet::new();
        self.names
            .iter()
            .find(|n| !seen.insert(n.as_str()))
            .map(|n| n.as_str())
    }
}

// ---------------------------------------------------------------------------
// Prediction results
// ---------------------------------------------------------------------------

/// Outcome of a single classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Identifier passed through untouched from the encoded row.
    pub passenger_id: Option<i64>,
    /// Predicted class (`0` = did not survive, `1` = survived).
    pub label: u8,
    /// Probability per class, indexed by class label.
    pub probabilities: Vec<f64>,
}

// ---------------------------------------------------------------------------
// Configuration types
// ---------------------------------------------------------------------------

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Address and port to bind the HTTP server to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Default location of the classifier pipeline artifact.
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,
    /// Location of the feature encoding pipeline artifact.
    #[serde(default = "default_pipeline_path")]
    pub pipeline_path: PathBuf,
    /// Maximum accepted body size for model uploads.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_model_path() -> PathBuf {
    PathBuf::from("model/classifier.json")
}

fn default_pipeline_path() -> PathBuf {
    PathBuf::from("model/pipeline.json")
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            model_path: default_model_path(),
            pipeline_path: default_pipeline_path(),
            max_upload_bytes: default_max_upload_bytes(),
            history: HistoryConfig::default(),
            logging: LoggingConfig::default(),
            shutdown: ShutdownConfig::default(),
        }
    }
}

/// Prediction history configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Number of most recent entries exposed by `GET /history`.
    #[serde(default = "default_view_limit")]
    pub view_limit: usize,
}

fn default_view_limit() -> usize {
    100
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            view_limit: default_view_limit(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format: `text` (human-readable) or `json` (structured).
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Graceful shutdown configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// Seconds to wait for in-flight requests after a shutdown signal.
    #[serde(default = "default_shutdown_timeout")]
    pub timeout_seconds: u64,
}

fn default_shutdown_timeout() -> u64 {
    30
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_shutdown_timeout(),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Core error types.
#[derive(thiserror::Error, Debug)]
pub enum TitanicError {
    /// An artifact location does not exist.
    #[error("Artifact not found: {}", path.display())]
    NotFound {
        /// The missing path.
        path: PathBuf,
    },

    /// Deserialization failed or the artifact is corrupt / incompatible.
    #[error("Load error: {0}")]
    Load(String),

    /// Prediction attempted before any successful load.
    #[error("Model not loaded")]
    NotLoaded,

    /// Encoded row shape or names disagree with the pipeline's schema.
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Feature engineering or encoding failed on unexpected input.
    #[error("Processing error: {0}")]
    Processing(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience alias for `std::result::Result<T, TitanicError>`.
pub type Result<T> = std::result::Result<T, TitanicError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn canonical_json() -> serde_json::Value {
        serde_json::json!({
            "PassengerId": 1,
            "Pclass": 3,
            "Name": "Braund, Mr. Owen Harris",
            "Sex": "male",
            "Age": 22,
            "SibSp": 1,
            "Parch": 0,
            "Ticket": "A/5 21171",
            "Fare": 7.25,
            "Cabin": null,
            "Embarked": "S"
        })
    }

    #[test]
    fn test_passenger_record_uses_dataset_field_names() {
        let record: PassengerRecord = serde_json::from_value(canonical_json()).unwrap();
        assert_eq!(record.passenger_id, 1);
        assert_eq!(record.pclass, 3);
        assert_eq!(record.age, Some(22.0));
        assert_eq!(record.sib_sp, 1);
        assert!(record.cabin.is_none());
        assert_eq!(record.embarked.as_deref(), Some("S"));

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["PassengerId"], 1);
        assert_eq!(back["Ticket"], "A/5 21171");
    }

    #[test]
    fn test_passenger_record_optional_fields_may_be_omitted() {
        let record: PassengerRecord = serde_json::from_value(serde_json::json!({
            "PassengerId": 7,
            "Pclass": 1,
            "Name": "Doe, Miss. Jane",
            "Sex": "female",
            "SibSp": 0,
            "Parch": 0,
            "Ticket": "113803"
        }))
        .unwrap();
        assert!(record.age.is_none());
        assert!(record.fare.is_none());
        assert!(record.embarked.is_none());
    }

    #[test]
    fn test_fare_group_label() {
        assert_eq!(FareGroup::VeryHigh.as_str(), "Very_High");
        assert_eq!(
            serde_json::to_string(&FareGroup::VeryHigh).unwrap(),
            "\"Very_High\""
        );
        assert_eq!(AgeGroup::Teenager.to_string(), "Teenager");
        assert_eq!(Title::Master.to_string(), "Master");
    }

    #[test]
    fn test_encoded_row_lookup() {
        let row = EncodedRow::new(
            Some(3),
            vec![("Age".to_string(), 22.0), ("Fare".to_string(), 7.25)],
        );
        assert_eq!(row.get("Fare"), Some(7.25));
        assert_eq!(row.get("Deck_C"), None);
        assert_eq!(row.names(), vec!["Age", "Fare"]);
        assert_eq!(row.len(), 2);
    }

    #[test]
    fn test_positional_schema() {
        let schema = FeatureSchema::positional(3);
        assert_eq!(schema.names, vec!["feature_0", "feature_1", "feature_2"]);
        assert_eq!(schema.version, FEATURE_SCHEMA_VERSION);
        assert!(schema.first_duplicate().is_none());
    }

    #[test]
    fn test_schema_duplicate_detection() {
        let schema = FeatureSchema::new(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(schema.first_duplicate(), Some("a"));
    }

    #[test]
    fn test_schema_version_defaults_when_absent() {
        let schema: FeatureSchema = serde_json::from_str(r#"{"names":["x"]}"#).unwrap();
        assert_eq!(schema.version, FEATURE_SCHEMA_VERSION);
    }

    #[test]
    fn test_service_config_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.listen_addr, "0.0.0.0:8000");
        assert_eq!(config.model_path, PathBuf::from("model/classifier.json"));
        assert_eq!(config.pipeline_path, PathBuf::from("model/pipeline.json"));
        assert_eq!(config.history.view_limit, 100);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "text");
        assert_eq!(config.shutdown.timeout_seconds, 30);
    }

    #[test]
    fn test_service_config_partial_yaml_fills_defaults() {
        let yaml = r#"
listen_addr: "127.0.0.1:9000"
logging:
  format: json
"#;
        let config: ServiceConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:9000");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_error_messages() {
        let err = TitanicError::NotFound {
            path: PathBuf::from("/tmp/missing.json"),
        };
        assert_eq!(err.to_string(), "Artifact not found: /tmp/missing.json");
        assert_eq!(TitanicError::NotLoaded.to_string(), "Model not loaded");
    }
}
