//! Error types for data retrieval and preprocessing.
//!
//! Errors are serializable so they can be written into run reports next to
//! the artifacts they relate to.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the processing crate.
#[derive(Error, Debug)]
pub enum ProcessingError {
    /// Column was not found in the dataset.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// Two columns share the same name.
    #[error("Duplicate column name '{0}'")]
    DuplicateColumn(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No valid values found in a column for computation.
    #[error("No valid values found in column '{0}'")]
    NoValidValues(String),

    /// Values that the requested operation cannot handle.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// The dataset could not be read locally nor retrieved remotely.
    #[error("Data unavailable at '{location}': {reason}")]
    DataUnavailable { location: String, reason: String },

    /// A transform was requested before the transformer was fitted.
    #[error("{0} has not been fitted")]
    NotFitted(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error (only with "http" feature).
    #[cfg(feature = "http")]
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ProcessingError>,
    },
}

impl ProcessingError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ProcessingError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get a stable error code for reports and exit messages.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::DuplicateColumn(_) => "DUPLICATE_COLUMN",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::NoValidValues(_) => "NO_VALID_VALUES",
            Self::InvalidData(_) => "INVALID_DATA",
            Self::DataUnavailable { .. } => "DATA_UNAVAILABLE",
            Self::NotFitted(_) => "NOT_FITTED",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            #[cfg(feature = "http")]
            Self::HttpRequest(_) => "HTTP_REQUEST_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error means the dataset could not be obtained.
    pub fn is_data_unavailable(&self) -> bool {
        match self {
            Self::DataUnavailable { .. } => true,
            #[cfg(feature = "http")]
            Self::HttpRequest(_) => true,
            Self::WithContext { source, .. } => source.is_data_unavailable(),
            _ => false,
        }
    }

    /// Check if this error was raised by a transform on an unfitted transformer.
    pub fn is_not_fitted(&self) -> bool {
        match self {
            Self::NotFitted(_) => true,
            Self::WithContext { source, .. } => source.is_not_fitted(),
            _ => false,
        }
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for ProcessingError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("ProcessingError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for processing operations.
pub type Result<T> = std::result::Result<T, ProcessingError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| ProcessingError::Polars(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(
            ProcessingError::NotFitted("ColumnTransformer".to_string()).error_code(),
            "NOT_FITTED"
        );
        assert_eq!(
            ProcessingError::ColumnNotFound("test".to_string()).error_code(),
            "COLUMN_NOT_FOUND"
        );
    }

    #[test]
    fn test_is_data_unavailable() {
        let error = ProcessingError::DataUnavailable {
            location: "data/housing.csv".to_string(),
            reason: "connection refused".to_string(),
        };
        assert!(error.is_data_unavailable());
        assert!(error.with_context("Loading housing data").is_data_unavailable());
        assert!(!ProcessingError::InvalidData("bad".to_string()).is_data_unavailable());
    }

    #[test]
    fn test_is_not_fitted() {
        assert!(ProcessingError::NotFitted("scaler".to_string()).is_not_fitted());
        assert!(!ProcessingError::NoValidValues("age".to_string()).is_not_fitted());
    }

    #[test]
    fn test_error_serialization() {
        let error = ProcessingError::ColumnNotFound("median_income".to_string());
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("COLUMN_NOT_FOUND"));
        assert!(json.contains("median_income"));
    }

    #[test]
    fn test_with_context() {
        let error =
            ProcessingError::ColumnNotFound("test".to_string()).with_context("During transform");
        assert!(error.to_string().contains("During transform"));
        assert_eq!(error.error_code(), "COLUMN_NOT_FOUND");
    }
}
