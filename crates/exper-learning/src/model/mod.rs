//! Trainable estimators behind a uniform sweep contract.
//!
//! Every [`Model`] is fitted by sweeping one hyperparameter across a range
//! and recording a train and a test error per metric at each sweep value.
//! How the test error is measured is family-specific:
//!
//! - [`LinearModel`]: k-fold cross-validation (unshuffled folds)
//! - [`NeuralNetwork`]: a single shuffled held-out validation split
//!
//! Either way the recorded [`Metrics`] hold one entry per sweep value, in
//! sweep order, as positive error magnitudes.

mod linear;
mod neural;
pub mod validation;

pub use linear::{ElasticNet, ElasticNetParams, LinearModel};
pub use neural::{Mlp, MlpParams, NeuralNetwork};

use crate::error::{ExperimentError, Result};
use crate::metrics::Metric;
use crate::types::{Metrics, Sweep};
use ndarray::{Array1, ArrayView1, ArrayView2};

/// A regression estimator that can be swept over one hyperparameter.
///
/// Implementations must be transactional: when [`fit`](Self::fit) fails,
/// the recorded metrics, sweep and fitted estimator from the previous
/// successful fit are left untouched.
pub trait Model: Send {
    /// Display name, used as the key in experiment metrics.
    fn name(&self) -> &str;

    /// Whether `param_name` (or one of its aliases) can be swept.
    fn supports_param(&self, param_name: &str) -> bool;

    /// Sweep `param_name` over `param_range`, recording every metric.
    ///
    /// Inputs are shared with other models and are only read.
    fn fit(
        &mut self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        param_range: &[f64],
        param_name: &str,
        eval_metrics: &[Metric],
    ) -> Result<()>;

    /// Predict with the estimator left by the last successful fit.
    ///
    /// # Errors
    ///
    /// [`ExperimentError::NotFitted`] if no fit has completed.
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>>;

    fn is_fitted(&self) -> bool;

    /// Curves recorded by the last successful fit (empty before).
    fn metrics(&self) -> &Metrics;

    /// Hyperparameter and range of the last successful fit.
    fn sweep(&self) -> Option<&Sweep>;

    /// Serializable snapshot of the fitted estimator and its curves.
    fn to_artifact(&self) -> Result<serde_json::Value>;

    /// Use `folds` cross-validation folds. Models validated another way ignore it.
    fn set_cv_folds(&mut self, _folds: usize) {}
}

/// Check shapes and values shared by every model's `fit`.
pub(crate) fn check_training_inputs(
    model: &str,
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, f64>,
    param_range: &[f64],
    eval_metrics: &[Metric],
) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(ExperimentError::InvalidInput(format!(
            "{}: feature matrix has {} rows but target has {} values",
            model,
            x.nrows(),
            y.len()
        )));
    }
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(ExperimentError::InvalidInput(format!(
            "{}: cannot fit on an empty {}x{} feature matrix",
            model,
            x.nrows(),
            x.ncols()
        )));
    }
    if param_range.is_empty() {
        return Err(ExperimentError::Configuration(format!(
            "{}: param_range must contain at least one value",
            model
        )));
    }
    if eval_metrics.is_empty() {
        return Err(ExperimentError::Configuration(format!(
            "{}: at least one evaluation metric is required",
            model
        )));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(ExperimentError::fit(
            model,
            "training data contains missing or non-finite values",
        ));
    }
    Ok(())
}

/// Check the feature matrix passed to `predict` against the fitted width.
pub(crate) fn check_prediction_inputs(
    model: &str,
    x: ArrayView2<'_, f64>,
    n_features: usize,
) -> Result<()> {
    if x.ncols() != n_features {
        return Err(ExperimentError::InvalidInput(format!(
            "{}: fitted on {} features, got {}",
            model,
            n_features,
            x.ncols()
        )));
    }
    Ok(())
}

/// Largest count a sweep value may ask for.
pub(crate) const MAX_COUNT: usize = 1_000_000;

/// Interpret a sweep value as a positive count (iterations, epochs, batch size).
pub(crate) fn as_count(param: &str, value: f64) -> Result<usize> {
    if value < 1.0 || value.fract() != 0.0 || !value.is_finite() {
        return Err(ExperimentError::Configuration(format!(
            "{} must be a positive integer, got {}",
            param, value
        )));
    }
    if value > MAX_COUNT as f64 {
        return Err(ExperimentError::InvalidInput(format!(
            "{} of {} exceeds the limit of {}",
            param, value, MAX_COUNT
        )));
    }
    Ok(value as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_check_training_inputs() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let y = array![1.0, 2.0];
        assert!(check_training_inputs("m", x.view(), y.view(), &[1.0], &[Metric::Mse]).is_ok());

        let short = array![1.0];
        let err = check_training_inputs("m", x.view(), short.view(), &[1.0], &[Metric::Mse])
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_INPUT");

        let err = check_training_inputs("m", x.view(), y.view(), &[], &[Metric::Mse]).unwrap_err();
        assert!(err.is_configuration());

        let nan = array![[1.0, f64::NAN], [3.0, 4.0]];
        let err =
            check_training_inputs("m", nan.view(), y.view(), &[1.0], &[Metric::Mse]).unwrap_err();
        assert!(err.is_fit());
    }

    #[test]
    fn test_as_count() {
        assert_eq!(as_count("iterations", 3.0).unwrap(), 3);
        assert!(as_count("iterations", 0.0).is_err());
        assert!(as_count("iterations", 2.5).is_err());
        assert!(as_count("batch_size", f64::NAN).is_err());

        assert_eq!(as_count("epochs", MAX_COUNT as f64).unwrap(), MAX_COUNT);
        let err = as_count("epochs", 1e30).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_INPUT");
    }
}
