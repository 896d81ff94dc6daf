//! Feature engineering and encoding for Titanic passenger records.
//!
//! - [`engineer`] derives titles, decks, bands and batch statistics
//! - [`encoding`] holds the persisted column transformer artifact
//! - [`preprocessor`] runs both and yields named feature rows

pub mod encoding;
pub mod engineer;
pub mod preprocessor;

pub use encoding::{
    CategoricalColumn, EncodingPipeline, HandleUnknown, NumericColumn, NumericEncoder,
    OneHotColumn, OneHotEncoder, OrdinalColumn, ENCODING_FORMAT_VERSION,
};
pub use engineer::{engineer, engineer_one};
pub use preprocessor::Preprocessor;
