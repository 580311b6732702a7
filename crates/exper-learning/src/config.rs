//! Configuration types for a model-comparison experiment.
//!
//! This module provides [`ExperimentConfig`] and its builder, plus the
//! [`DataSource`] describing where the dataset lives.
//!
//! # Example
//!
//! ```
//! use exper_learning::ExperimentConfig;
//!
//! let config = ExperimentConfig::builder()
//!     .name("LR vs NN")
//!     .param_name("iterations")
//!     .param_range((1..=10).map(f64::from).collect())
//!     .eval_metrics(["mse", "rmse", "mae"])
//!     .test_size(0.3)
//!     .build()
//!     .expect("valid config");
//! assert_eq!(config.param_range.len(), 10);
//! ```

use crate::error::{ExperimentError, Result};
use crate::metrics::Metric;
use exper_processing::handler::{HOUSING_DATA_URL, HOUSING_TARGET};
use exper_processing::{ProcessingError, StratificationConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where the experiment's dataset is cached and retrieved from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSource {
    /// Local cache file. Read directly when it exists.
    pub path: PathBuf,
    /// Remote resource fetched when the cache is missing.
    pub url: String,
    /// Always re-fetch, even when the cache exists.
    pub force_retrieve: bool,
}

impl Default for DataSource {
    fn default() -> Self {
        Self {
            path: PathBuf::from("artifacts/data/california_census.csv"),
            url: HOUSING_DATA_URL.to_string(),
            force_retrieve: false,
        }
    }
}

/// Configuration for an [`Experiment`](crate::Experiment).
///
/// This is the whole configuration surface of an experiment. It is plain
/// data: the CLI may deserialize it from JSON, but the library never reads
/// files or environment variables on its own.
///
/// # Validation
///
/// [`build()`](ExperimentConfigBuilder::build) and [`validate()`](Self::validate)
/// check the following:
/// - `test_size` and `significance_level` are in `(0.0, 1.0)`
/// - `param_name` is non-empty and `param_range` is non-empty and finite
/// - `eval_metrics` is non-empty, known and free of duplicates
/// - the stratification edges are strictly increasing (at least 2)
/// - `cv_folds` is at least 2
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Experiment name (default: "LR vs NN Experiment").
    pub name: String,

    /// Free-form description recorded with the artifacts.
    pub description: String,

    /// Name of the target column (default: "median_house_value").
    pub target_column: String,

    /// Dataset location.
    pub data: DataSource,

    /// Hyperparameter swept by every model (default: "iterations").
    ///
    /// Each model translates the generic name to its own native parameter.
    pub param_name: String,

    /// Values of the swept hyperparameter, in sweep order (default: 1..=99).
    ///
    /// A single value is enough to run, but hypothesis testing needs at least two.
    pub param_range: Vec<f64>,

    /// Metric names, canonical or aliased (default: rmse, mse, mae).
    pub eval_metrics: Vec<String>,

    /// Fraction of rows held out for testing (default: 0.3).
    pub test_size: f64,

    /// Binning used to stratify the split (default: California income bins).
    pub stratification: StratificationConfig,

    /// Seed for the split (default: 42).
    pub random_seed: u64,

    /// Significance level of the hypothesis test (default: 0.05).
    pub significance_level: f64,

    /// Assume equal variances (Student) instead of Welch's test (default: false).
    pub equal_var: bool,

    /// Model favoured by the alternative hypothesis.
    ///
    /// If `None`, the first model of the experiment is used.
    pub favoured_model: Option<String>,

    /// Cross-validation folds for models that use them (default: 5).
    ///
    /// Applied to every model when the experiment is built.
    pub cv_folds: usize,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            name: "LR vs NN Experiment".to_string(),
            description: "Compare a linear model against a neural network on California housing"
                .to_string(),
            target_column: HOUSING_TARGET.to_string(),
            data: DataSource::default(),
            param_name: "iterations".to_string(),
            param_range: (1..=99).map(f64::from).collect(),
            eval_metrics: vec!["rmse".to_string(), "mse".to_string(), "mae".to_string()],
            test_size: 0.3,
            stratification: StratificationConfig::california_income(),
            random_seed: 42,
            significance_level: 0.05,
            equal_var: false,
            favoured_model: None,
            cv_folds: 5,
        }
    }
}

impl ExperimentConfig {
    /// Create a new builder for `ExperimentConfig`.
    #[must_use]
    pub fn builder() -> ExperimentConfigBuilder {
        ExperimentConfigBuilder::default()
    }

    /// Check every constraint listed on the type.
    ///
    /// Configurations built with the builder are already valid; call this on
    /// configurations that were deserialized or edited in place.
    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(ExperimentError::Configuration(format!(
                "test_size must be between 0.0 and 1.0 (exclusive), got {}",
                self.test_size
            )));
        }

        if !(self.significance_level > 0.0 && self.significance_level < 1.0) {
            return Err(ExperimentError::Configuration(format!(
                "significance_level must be between 0.0 and 1.0 (exclusive), got {}",
                self.significance_level
            )));
        }

        if self.target_column.trim().is_empty() {
            return Err(ExperimentError::Configuration(
                "target_column must not be empty".to_string(),
            ));
        }

        if self.param_name.trim().is_empty() {
            return Err(ExperimentError::Configuration(
                "param_name must not be empty".to_string(),
            ));
        }

        if self.param_range.is_empty() {
            return Err(ExperimentError::Configuration(
                "param_range must contain at least one value".to_string(),
            ));
        }

        if let Some(value) = self.param_range.iter().find(|v| !v.is_finite()) {
            return Err(ExperimentError::Configuration(format!(
                "param_range values must be finite, got {}",
                value
            )));
        }

        self.parsed_metrics()?;

        self.stratification.validate().map_err(|e| match e {
            ProcessingError::InvalidConfig(message) => ExperimentError::Configuration(message),
            other => ExperimentError::Configuration(other.to_string()),
        })?;

        if self.cv_folds < 2 {
            return Err(ExperimentError::Configuration(format!(
                "cv_folds must be at least 2, got {}",
                self.cv_folds
            )));
        }

        if let Some(name) = &self.favoured_model
            && name.trim().is_empty()
        {
            return Err(ExperimentError::Configuration(
                "favoured_model must not be empty when set".to_string(),
            ));
        }

        Ok(())
    }

    /// Evaluation metrics resolved to the shared vocabulary, in configured order.
    pub fn parsed_metrics(&self) -> Result<Vec<Metric>> {
        Metric::parse_all(&self.eval_metrics)
    }
}

/// Builder for [`ExperimentConfig`].
///
/// Created via [`ExperimentConfig::builder()`]. All setters return `self` to
/// allow method chaining; nothing is checked until [`build()`](Self::build).
#[derive(Debug, Clone, Default)]
pub struct ExperimentConfigBuilder {
    config: ExperimentConfig,
}

impl ExperimentConfigBuilder {
    /// Start from an existing configuration, e.g. one loaded from JSON.
    #[must_use]
    pub fn from_config(config: ExperimentConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.config.description = description.into();
        self
    }

    /// Set the target column name.
    #[must_use]
    pub fn target_column(mut self, column: impl Into<String>) -> Self {
        self.config.target_column = column.into();
        self
    }

    /// Set the local cache path of the dataset.
    #[must_use]
    pub fn data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data.path = path.into();
        self
    }

    /// Set the URL the dataset is retrieved from.
    #[must_use]
    pub fn data_url(mut self, url: impl Into<String>) -> Self {
        self.config.data.url = url.into();
        self
    }

    /// Always re-fetch the dataset (default: false).
    #[must_use]
    pub fn force_retrieve(mut self, force: bool) -> Self {
        self.config.data.force_retrieve = force;
        self
    }

    /// Set the swept hyperparameter name (default: "iterations").
    #[must_use]
    pub fn param_name(mut self, name: impl Into<String>) -> Self {
        self.config.param_name = name.into();
        self
    }

    /// Set the sweep values.
    ///
    /// # Panics
    ///
    /// Does not panic, but [`build()`](Self::build) will return an error if
    /// `range` is empty or contains non-finite values.
    #[must_use]
    pub fn param_range(mut self, range: Vec<f64>) -> Self {
        self.config.param_range = range;
        self
    }

    /// Set the evaluation metrics by name.
    #[must_use]
    pub fn eval_metrics<I, S>(mut self, metrics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.eval_metrics = metrics.into_iter().map(Into::into).collect();
        self
    }

    /// Set the test size fraction (default: 0.3).
    ///
    /// # Panics
    ///
    /// Does not panic, but [`build()`](Self::build) will return an error if
    /// `size <= 0.0` or `size >= 1.0`.
    #[must_use]
    pub fn test_size(mut self, size: f64) -> Self {
        self.config.test_size = size;
        self
    }

    /// Set the binning used to stratify the split.
    #[must_use]
    pub fn stratification(mut self, stratification: StratificationConfig) -> Self {
        self.config.stratification = stratification;
        self
    }

    /// Set the random seed for the split (default: 42).
    #[must_use]
    pub fn random_seed(mut self, seed: u64) -> Self {
        self.config.random_seed = seed;
        self
    }

    /// Set the significance level of the hypothesis test (default: 0.05).
    #[must_use]
    pub fn significance_level(mut self, alpha: f64) -> Self {
        self.config.significance_level = alpha;
        self
    }

    /// Use Student's equal-variance t-test instead of Welch's (default: false).
    #[must_use]
    pub fn equal_var(mut self, equal_var: bool) -> Self {
        self.config.equal_var = equal_var;
        self
    }

    /// Name the model favoured by the alternative hypothesis.
    #[must_use]
    pub fn favoured_model(mut self, name: impl Into<String>) -> Self {
        self.config.favoured_model = Some(name.into());
        self
    }

    /// Set the number of cross-validation folds (default: 5).
    #[must_use]
    pub fn cv_folds(mut self, folds: usize) -> Self {
        self.config.cv_folds = folds;
        self
    }

    /// Build the configuration, validating all settings.
    ///
    /// # Errors
    ///
    /// Returns [`ExperimentError::Configuration`] if any constraint listed on
    /// [`ExperimentConfig`] is violated.
    pub fn build(self) -> Result<ExperimentConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ExperimentConfig::default();
        assert_eq!(config.target_column, "median_house_value");
        assert_eq!(config.param_name, "iterations");
        assert_eq!(config.param_range.len(), 99);
        assert_eq!(config.param_range[0], 1.0);
        assert_eq!(config.test_size, 0.3);
        assert_eq!(config.significance_level, 0.05);
        assert_eq!(config.cv_folds, 5);
        assert!(!config.equal_var);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = ExperimentConfig::builder()
            .name("small")
            .param_range(vec![1.0, 2.0])
            .eval_metrics(["mae"])
            .favoured_model("NeuralNetwork")
            .build()
            .unwrap();
        assert_eq!(config.name, "small");
        assert_eq!(config.parsed_metrics().unwrap(), vec![Metric::Mae]);
        assert_eq!(config.favoured_model.as_deref(), Some("NeuralNetwork"));
    }

    #[test]
    fn test_invalid_test_size() {
        for size in [0.0, 1.0, -0.5, f64::NAN] {
            let err = ExperimentConfig::builder().test_size(size).build().unwrap_err();
            assert!(err.is_configuration());
            assert!(err.to_string().contains("test_size"));
        }
    }

    #[test]
    fn test_invalid_significance_level() {
        let result = ExperimentConfig::builder().significance_level(1.5).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_sweep() {
        assert!(ExperimentConfig::builder().param_range(vec![]).build().is_err());
        assert!(
            ExperimentConfig::builder()
                .param_range(vec![1.0, f64::INFINITY])
                .build()
                .is_err()
        );
        assert!(ExperimentConfig::builder().param_name(" ").build().is_err());
    }

    #[test]
    fn test_invalid_metrics() {
        let err = ExperimentConfig::builder()
            .eval_metrics(["rmse", "accuracy"])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("accuracy"));
        assert!(
            ExperimentConfig::builder()
                .eval_metrics(Vec::<String>::new())
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_invalid_stratification() {
        let stratification = StratificationConfig {
            column: "median_income".to_string(),
            edges: vec![3.0, 1.0],
            unbounded_upper: false,
        };
        let err = ExperimentConfig::builder()
            .stratification(stratification)
            .build()
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("increasing"));
    }

    #[test]
    fn test_invalid_cv_folds() {
        assert!(ExperimentConfig::builder().cv_folds(1).build().is_err());
    }

    #[test]
    fn test_deserialize_partial_json_uses_defaults() {
        let config: ExperimentConfig =
            serde_json::from_str(r#"{"param_range": [1, 5, 10], "data": {"force_retrieve": true}}"#)
                .unwrap();
        assert_eq!(config.param_range, vec![1.0, 5.0, 10.0]);
        assert!(config.data.force_retrieve);
        assert_eq!(config.data.url, HOUSING_DATA_URL);
        assert_eq!(config.stratification, StratificationConfig::california_income());
        assert!(config.validate().is_ok());
    }
}
