//! Error types shared by the loader, aligner and prediction adapter

use crate::models::loader::LoadDiagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the advisor core.
///
/// Probability and variance estimates are advisory and never produce one of
/// these; they come back as `None` instead.
#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("model artifact not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("could not deserialize {}:\n{diagnostic}", path.display())]
    DeserializationFailed {
        path: PathBuf,
        diagnostic: LoadDiagnostic,
    },

    #[error("feature schema unknown: no model declares feature names and no reference dataset is loaded")]
    SchemaUnknown,

    #[error("model is not loaded")]
    NullModel,

    #[error("prediction failed: {0}")]
    PredictionFailed(String),

    #[error("columns {sources:?} all rename to '{target}'")]
    AmbiguousRename { target: String, sources: Vec<String> },

    #[error("invalid value for {field}: {message}")]
    InvalidField { field: String, message: String },

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for advisor operations
pub type AdvisorResult<T> = Result<T, AdvisorError>;

impl AdvisorError {
    /// Shorthand for a `PredictionFailed` built from anything displayable.
    pub fn prediction(message: impl std::fmt::Display) -> Self {
        AdvisorError::PredictionFailed(message.to_string())
    }

    /// Last non-empty line of the message, for compact status displays.
    pub fn summary(&self) -> String {
        let full = self.to_string();
        full.lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or(full.as_str())
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_takes_last_line() {
        let err = AdvisorError::PredictionFailed("first\nsecond\n\n".to_string());
        assert_eq!(err.summary(), "second");
    }

    #[test]
    fn test_not_found_message() {
        let err = AdvisorError::NotFound(PathBuf::from("models/missing.json"));
        assert_eq!(err.to_string(), "model artifact not found: models/missing.json");
    }
}
