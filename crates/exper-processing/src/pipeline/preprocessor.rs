//! The preprocessing contract used by experiments.

use super::builder::ColumnTransformer;
use super::executor::FittedColumnTransformer;
use crate::dataset::Dataset;
use crate::error::{ProcessingError, Result};
use tracing::debug;

/// Fit/transform feature preparation.
///
/// `fit` learns all state from the data it is given (the training split) and
/// `transform` applies that frozen state to any dataset with the same input
/// columns. A failed `fit` leaves the preprocessor unfitted.
pub trait Preprocessor: Send {
    /// Learn transformation state from `data`, replacing any previous state.
    fn fit(&mut self, data: &Dataset) -> Result<()>;

    /// Apply the fitted state to `data`.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessingError::NotFitted`] if [`fit`](Self::fit) has not succeeded.
    fn transform(&self, data: &Dataset) -> Result<Dataset>;

    fn is_fitted(&self) -> bool;

    /// Names of the transformed feature columns, once fitted.
    fn feature_names_out(&self) -> Option<Vec<String>>;

    /// Serializable snapshot of the fitted state, once fitted.
    fn fitted_state(&self) -> Option<Result<serde_json::Value>>;

    /// Fit on `data`, then return it transformed (or untouched when `transform` is false).
    fn preprocess(&mut self, data: Dataset, transform: bool) -> Result<Dataset> {
        self.fit(&data)?;
        if transform {
            self.transform(&data)
        } else {
            Ok(data)
        }
    }
}

impl Preprocessor for ColumnTransformer {
    fn fit(&mut self, data: &Dataset) -> Result<()> {
        self.state = None;
        let fitted = FittedColumnTransformer::fit(&self.specs, self.remainder, data, &self.span)?;
        self.state = Some(fitted);
        Ok(())
    }

    fn transform(&self, data: &Dataset) -> Result<Dataset> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| ProcessingError::NotFitted("ColumnTransformer".to_string()))?;
        let transformed = state.transform(data)?;
        debug!(
            parent: &self.span,
            rows = transformed.height(),
            columns = transformed.width(),
            "Data transformed"
        );
        Ok(transformed)
    }

    fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    fn feature_names_out(&self) -> Option<Vec<String>> {
        self.state.as_ref().map(|s| s.feature_names().to_vec())
    }

    fn fitted_state(&self) -> Option<Result<serde_json::Value>> {
        self.state
            .as_ref()
            .map(|s| serde_json::to_value(s).map_err(ProcessingError::from))
    }
}
