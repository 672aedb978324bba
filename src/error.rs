use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum AtlasError {
    #[error("failed to read source {location}: {message}")]
    Fetch { location: String, message: String },

    #[error("source {location} returned status {status}")]
    FetchStatus { location: String, status: u16 },

    #[error("{0}")]
    Validation(String),

    #[error("dataset {dataset} has no column '{column}'")]
    MissingColumn { dataset: String, column: String },

    #[error("unexpected data shape: {0}")]
    UnexpectedShape(String),

    #[error("unknown dataset: {0}")]
    UnknownDataset(String),

    #[error("missing config file epi-atlas.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(Utf8PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),
}

impl AtlasError {
    pub fn fetch(location: &str, message: impl ToString) -> Self {
        AtlasError::Fetch {
            location: location.to_string(),
            message: message.to_string(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, AtlasError::Validation(_))
    }
}
