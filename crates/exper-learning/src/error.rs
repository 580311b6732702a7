//! Error types for the exper-learning crate.
//!
//! This module defines [`ExperimentError`], the main error type used
//! throughout the crate. All public API functions return
//! `Result<T, ExperimentError>`.
//!
//! # Error Handling
//!
//! Errors fall into three groups:
//! - **Configuration**: raised before any work starts (bad sweep, unknown
//!   metric, wrong model count for a comparison).
//! - **Data**: raised by the processing crate while loading, splitting or
//!   transforming, wrapped in [`ExperimentError::Processing`].
//! - **Fit**: raised by an estimator that cannot be trained on the data it
//!   was given.
//!
//! # Example
//!
//! ```
//! use exper_learning::{ExperimentConfig, ExperimentError};
//!
//! fn configure() -> Result<ExperimentConfig, ExperimentError> {
//!     // Errors are automatically propagated with ?
//!     let config = ExperimentConfig::builder()
//!         .param_range(vec![1.0, 2.0, 3.0])
//!         .build()?;
//!     Ok(config)
//! }
//! # configure().unwrap();
//! ```

use exper_processing::ProcessingError;
use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for exper-learning operations.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ExperimentError {
    /// Invalid configuration provided to an experiment or model.
    ///
    /// Check the error message for details on which value is invalid
    /// and what values are accepted.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Loading, splitting or preprocessing the data failed.
    #[error(transparent)]
    Processing(#[from] ProcessingError),

    /// An estimator could not be trained.
    ///
    /// Common causes:
    /// - The feature matrix contains non-finite values
    /// - Training diverged (loss became NaN or infinite)
    /// - Too few rows for the requested validation scheme
    #[error("Fit failed for {model}: {reason}")]
    Fit {
        /// Name of the model that failed.
        model: String,
        /// What went wrong.
        reason: String,
    },

    /// `predict` was called on a model that has never been fitted.
    #[error("Model '{0}' has not been fitted")]
    NotFitted(String),

    /// Input data does not match what an operation expects.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O error during artifact persistence.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ExperimentError>,
    },
}

impl ExperimentError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ExperimentError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Shorthand for a [`Fit`](Self::Fit) error.
    pub fn fit(model: impl Into<String>, reason: impl Into<String>) -> Self {
        ExperimentError::Fit {
            model: model.into(),
            reason: reason.into(),
        }
    }

    /// Get a stable error code for reports and exit messages.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Processing(source) => source.error_code(),
            Self::Fit { .. } => "FIT_ERROR",
            Self::NotFitted(_) => "NOT_FITTED",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error was raised by configuration validation.
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::Configuration(_) => true,
            Self::WithContext { source, .. } => source.is_configuration(),
            _ => false,
        }
    }

    /// Check if this error means the dataset could not be obtained.
    pub fn is_data_unavailable(&self) -> bool {
        match self {
            Self::Processing(source) => source.is_data_unavailable(),
            Self::WithContext { source, .. } => source.is_data_unavailable(),
            _ => false,
        }
    }

    /// Check if this error came from an estimator fit.
    pub fn is_fit(&self) -> bool {
        match self {
            Self::Fit { .. } => true,
            Self::WithContext { source, .. } => source.is_fit(),
            _ => false,
        }
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for ExperimentError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("ExperimentError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for experiment operations.
pub type Result<T> = std::result::Result<T, ExperimentError>;

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(
            ExperimentError::Configuration("x".to_string()).error_code(),
            "CONFIGURATION_ERROR"
        );
        assert_eq!(ExperimentError::fit("LinearModel", "diverged").error_code(), "FIT_ERROR");
    }

    #[test]
    fn test_processing_errors_keep_their_code() {
        let error: ExperimentError = ProcessingError::DataUnavailable {
            location: "housing.csv".to_string(),
            reason: "offline".to_string(),
        }
        .into();
        assert_eq!(error.error_code(), "DATA_UNAVAILABLE");
        assert!(error.is_data_unavailable());
        assert!(error.to_string().contains("offline"));
    }

    #[test]
    fn test_classification_helpers() {
        assert!(ExperimentError::Configuration("x".to_string()).is_configuration());
        assert!(ExperimentError::fit("m", "r").with_context("training").is_fit());
        assert!(!ExperimentError::NotFitted("m".to_string()).is_fit());
    }

    #[test]
    fn test_error_serialization() {
        let error = ExperimentError::NotFitted("NeuralNetwork".to_string());
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("NOT_FITTED"));
        assert!(json.contains("NeuralNetwork"));
    }

    #[test]
    fn test_with_context() {
        let error = ExperimentError::Configuration("bad".to_string()).with_context("Building");
        assert!(error.to_string().contains("Building"));
        assert_eq!(error.error_code(), "CONFIGURATION_ERROR");
    }
}
