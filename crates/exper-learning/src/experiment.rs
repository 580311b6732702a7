//! The experiment orchestrator.
//!
//! An [`Experiment`] wires a [`DataHandler`], a [`Preprocessor`] and a list
//! of [`Model`]s together, runs the whole pipeline, and then serves
//! read-only projections of the recorded validation curves: the aggregated
//! [`metrics`](Experiment::metrics), a two-model
//! [`hypothesis test`](Experiment::hypothesis_testing), and plot-ready
//! [`curves`](Experiment::visualize_results).
//!
//! # Example
//!
//! ```rust,ignore
//! use exper_learning::{Experiment, ExperimentConfig, LinearModel, NeuralNetwork};
//! use exper_processing::handler::{ApiHandler, HttpFetcher, HOUSING_TARGET};
//! use exper_processing::ColumnTransformer;
//!
//! let mut experiment = Experiment::builder()
//!     .config(ExperimentConfig::default())
//!     .data_handler(ApiHandler::new(HttpFetcher::new()?, HOUSING_TARGET))
//!     .preprocessor(ColumnTransformer::california())
//!     .model(LinearModel::new())
//!     .model(NeuralNetwork::new())
//!     .on_progress(|update| println!("{}", update.message))
//!     .build()?;
//!
//! experiment.run()?;
//! let report = experiment.hypothesis_testing()?;
//! ```

use crate::config::ExperimentConfig;
use crate::error::{ExperimentError, Result};
use crate::metrics::Metric;
use crate::model::Model;
use crate::progress::{ClosureProgressReporter, ExperimentStage, ProgressReporter, ProgressUpdate};
use crate::stats::ttest_ind;
use crate::steps::{self, FeatureSet, run_step};
use crate::types::{
    CurveKind, ExperimentMetrics, HypothesisReport, MetricPlot, MetricTest, PlotSeries,
};
use exper_processing::{DataHandler, Preprocessor, SplitSummary};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::time::Instant;
use tracing::{Span, error, info, info_span, warn};

/// Lifecycle of an [`Experiment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentState {
    /// Built, or the last run failed.
    #[default]
    Created,
    /// The last [`run`](Experiment::run) succeeded.
    RunComplete,
}

/// Holdout error of every model on the preprocessed test split.
pub type HoldoutScores = BTreeMap<String, BTreeMap<Metric, f64>>;

/// Transformed test split kept after a run.
#[derive(Debug, Clone)]
struct Holdout {
    x: Array2<f64>,
    y: Array1<f64>,
}

/// A configured comparison of models on one dataset.
///
/// Created via [`Experiment::builder()`]. The experiment exclusively owns
/// its models, preprocessor and data handler.
pub struct Experiment {
    config: ExperimentConfig,
    eval_metrics: Vec<Metric>,
    data_handler: Box<dyn DataHandler>,
    preprocessor: Box<dyn Preprocessor>,
    models: Vec<Box<dyn Model>>,
    progress: Option<Box<dyn ProgressReporter>>,
    span: Span,
    state: ExperimentState,
    split_summary: Option<SplitSummary>,
    feature_names: Vec<String>,
    holdout: Option<Holdout>,
}

static_assertions::assert_impl_all!(Experiment: Send);

impl std::fmt::Debug for Experiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Experiment")
            .field("name", &self.config.name)
            .field("state", &self.state)
            .field("models", &self.model_names())
            .field("eval_metrics", &self.eval_metrics)
            .finish_non_exhaustive()
    }
}

impl Experiment {
    /// Create a new builder for `Experiment`.
    #[must_use]
    pub fn builder() -> ExperimentBuilder {
        ExperimentBuilder::default()
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn state(&self) -> ExperimentState {
        self.state
    }

    /// Evaluation metrics in configured order.
    pub fn eval_metrics(&self) -> &[Metric] {
        &self.eval_metrics
    }

    pub fn models(&self) -> &[Box<dyn Model>] {
        &self.models
    }

    pub fn model_names(&self) -> Vec<String> {
        self.models.iter().map(|m| m.name().to_string()).collect()
    }

    pub fn preprocessor(&self) -> &dyn Preprocessor {
        self.preprocessor.as_ref()
    }

    /// Row counts and stratum shares of the last split.
    pub fn split_summary(&self) -> Option<&SplitSummary> {
        self.split_summary.as_ref()
    }

    /// Feature names produced by the preprocessor in the last run.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Run the full pipeline: load, split, preprocess, train every model.
    ///
    /// Re-running repeats everything and overwrites every model's metrics.
    /// If a model fails, the error is returned unchanged, the experiment
    /// returns to [`ExperimentState::Created`], and models fitted earlier in
    /// the same run keep their new metrics.
    pub fn run(&mut self) -> Result<()> {
        let started = Instant::now();
        info!(
            parent: &self.span,
            name = %self.config.name,
            models = self.models.len(),
            sweep = self.config.param_range.len(),
            "Experiment started"
        );
        self.state = ExperimentState::Created;
        self.report(ProgressUpdate::new(
            ExperimentStage::Initializing,
            format!("Starting {}", self.config.name),
        ));

        match self.run_internal() {
            Ok(()) => {
                self.state = ExperimentState::RunComplete;
                info!(
                    parent: &self.span,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Experiment finished"
                );
                self.report(ProgressUpdate::complete("Experiment complete"));
                Ok(())
            }
            Err(e) => {
                error!(parent: &self.span, code = e.error_code(), error = %e, "Experiment failed");
                self.report(ProgressUpdate::failed(e.to_string()));
                Err(e)
            }
        }
    }

    fn run_internal(&mut self) -> Result<()> {
        self.report(ProgressUpdate::new(ExperimentStage::Loading, "Loading dataset"));
        let raw = run_step("load", &self.span, (), |()| {
            steps::load(self.data_handler.as_ref(), &self.config)
        })?;
        info!(
            parent: &self.span,
            rows = raw.dataset.height(),
            columns = raw.dataset.width(),
            "Dataset loaded"
        );

        self.report(ProgressUpdate::new(ExperimentStage::Splitting, "Splitting data"));
        let split = run_step("split", &self.span, raw, |raw| steps::split(raw, &self.config))?;
        info!(
            parent: &self.span,
            train_rows = split.summary.train_rows,
            test_rows = split.summary.test_rows,
            max_share_deviation = split.summary.max_share_deviation(),
            "Stratified split"
        );
        self.split_summary = Some(split.summary.clone());

        self.report(ProgressUpdate::new(
            ExperimentStage::Preprocessing,
            "Fitting preprocessor on training rows",
        ));
        let preprocessor = self.preprocessor.as_mut();
        let features = run_step("preprocess", &self.span, split, |split| {
            steps::preprocess(split, preprocessor)
        })?;
        info!(
            parent: &self.span,
            features = features.feature_names.len(),
            "Features prepared"
        );

        let progress = self.progress.as_deref();
        let models = &mut self.models;
        let config = &self.config;
        let eval_metrics = &self.eval_metrics;
        run_step("train", &self.span, &features, |features| {
            steps::train(features, models, config, eval_metrics, |name, done, total| {
                if let Some(reporter) = progress {
                    reporter.report(ProgressUpdate::training(name, done, total));
                }
            })
        })?;

        let FeatureSet {
            feature_names,
            x_test,
            y_test,
            ..
        } = features;
        self.feature_names = feature_names;
        self.holdout = Some(Holdout { x: x_test, y: y_test });
        Ok(())
    }

    fn report(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress {
            reporter.report(update);
        }
    }

    /// Metric name → model name → train/test curves.
    ///
    /// Metric names are canonical (`mse`, `rmse`, `mae`) even when the
    /// configuration used an alias. Models without a recorded curve for a
    /// metric (e.g. before any run) are omitted.
    pub fn metrics(&self) -> ExperimentMetrics {
        let mut out = ExperimentMetrics::new();
        for metric in &self.eval_metrics {
            let per_model = out.entry(metric.as_str().to_string()).or_default();
            for model in &self.models {
                if let Some(curve) = model.metrics().curve(*metric) {
                    per_model.insert(model.name().to_string(), curve);
                }
            }
        }
        out
    }

    /// Compare the two models' test-error curves, one t-test per metric.
    ///
    /// The alternative favours the configured `favoured_model` (or the first
    /// model): its scores are greater, i.e. its errors lower.
    ///
    /// # Errors
    ///
    /// [`ExperimentError::Configuration`] if the experiment does not have
    /// exactly two models, has not completed a run, or swept fewer than two
    /// values.
    pub fn hypothesis_testing(&self) -> Result<HypothesisReport> {
        if self.models.len() != 2 {
            return Err(ExperimentError::Configuration(format!(
                "hypothesis testing compares exactly two models, experiment has {}",
                self.models.len()
            )));
        }
        if self.state != ExperimentState::RunComplete {
            return Err(ExperimentError::Configuration(
                "hypothesis testing needs a completed run".to_string(),
            ));
        }
        if self.config.param_range.len() < 2 {
            return Err(ExperimentError::Configuration(format!(
                "hypothesis testing needs at least 2 sweep values, param_range has {}",
                self.config.param_range.len()
            )));
        }

        let (a, b) = match &self.config.favoured_model {
            Some(name) if name.as_str() == self.models[1].name() => (&self.models[1], &self.models[0]),
            _ => (&self.models[0], &self.models[1]),
        };
        let alpha = self.config.significance_level;

        let mut tests = Vec::with_capacity(self.eval_metrics.len());
        for &metric in &self.eval_metrics {
            let curve = |model: &dyn Model| {
                model.metrics().curve(metric).ok_or_else(|| {
                    ExperimentError::InvalidInput(format!(
                        "model '{}' has no {} curve",
                        model.name(),
                        metric
                    ))
                })
            };
            let errors_a = curve(a.as_ref())?.test;
            let errors_b = curve(b.as_ref())?.test;

            // Scores are negated errors, so "A scores greater" is B's errors minus A's.
            let t = ttest_ind(&errors_b, &errors_a, self.config.equal_var)?;
            let test = MetricTest {
                metric,
                model_a: a.name().to_string(),
                model_b: b.name().to_string(),
                mean_a: t.mean_b,
                mean_b: t.mean_a,
                statistic: t.statistic,
                df: t.df,
                p_value: t.p_value,
                p_value_greater: t.p_value_greater,
                rejects_null: t.p_value < alpha,
                favours_alternative: t.p_value_greater < alpha,
            };
            info!(
                parent: &self.span,
                metric = %metric,
                statistic = test.statistic,
                p_value = test.p_value,
                rejects_null = test.rejects_null,
                "Hypothesis test"
            );
            tests.push(test);
        }

        Ok(HypothesisReport {
            alpha,
            equal_var: self.config.equal_var,
            tests,
        })
    }

    /// Plot-ready validation curves: one plot per metric with a train and
    /// a test line per model, over the sweep values.
    pub fn visualize_results(&self) -> Vec<MetricPlot> {
        self.eval_metrics
            .iter()
            .map(|&metric| {
                let mut series = Vec::with_capacity(self.models.len() * 2);
                for model in &self.models {
                    if let Some(curve) = model.metrics().curve(metric) {
                        series.push(PlotSeries {
                            model: model.name().to_string(),
                            kind: CurveKind::Train,
                            values: curve.train,
                        });
                        series.push(PlotSeries {
                            model: model.name().to_string(),
                            kind: CurveKind::Test,
                            values: curve.test,
                        });
                    }
                }
                MetricPlot {
                    metric,
                    x_label: self.config.param_name.clone(),
                    x: self.config.param_range.clone(),
                    series,
                }
            })
            .collect()
    }

    /// Error of every fitted model on the preprocessed test split.
    ///
    /// # Errors
    ///
    /// [`ExperimentError::Configuration`] before a completed run.
    pub fn holdout_scores(&self) -> Result<HoldoutScores> {
        let holdout = match (&self.holdout, self.state) {
            (Some(holdout), ExperimentState::RunComplete) => holdout,
            _ => {
                return Err(ExperimentError::Configuration(
                    "holdout scores need a completed run".to_string(),
                ));
            }
        };

        let mut scores = HoldoutScores::new();
        for model in &self.models {
            let predictions = model.predict(holdout.x.view())?;
            let per_metric = self
                .eval_metrics
                .iter()
                .map(|&m| (m, m.error(holdout.y.view(), predictions.view())))
                .collect();
            scores.insert(model.name().to_string(), per_metric);
        }
        Ok(scores)
    }
}

/// Builder for [`Experiment`].
///
/// # Required Configuration
///
/// - [`data_handler()`](Self::data_handler)
/// - [`preprocessor()`](Self::preprocessor)
/// - at least one [`model()`](Self::model)
///
/// # Optional Configuration
///
/// - [`config()`](Self::config): defaults to [`ExperimentConfig::default()`]
/// - [`on_progress()`](Self::on_progress) / [`progress_reporter()`](Self::progress_reporter)
/// - [`span()`](Self::span): parent span for the experiment's events
#[derive(Default)]
pub struct ExperimentBuilder {
    config: Option<ExperimentConfig>,
    data_handler: Option<Box<dyn DataHandler>>,
    preprocessor: Option<Box<dyn Preprocessor>>,
    models: Vec<Box<dyn Model>>,
    progress: Option<Box<dyn ProgressReporter>>,
    span: Option<Span>,
}

impl std::fmt::Debug for ExperimentBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExperimentBuilder")
            .field("config", &self.config)
            .field("data_handler", &self.data_handler.as_ref().map(|_| "<handler>"))
            .field("preprocessor", &self.preprocessor.as_ref().map(|_| "<preprocessor>"))
            .field(
                "models",
                &self.models.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .field("progress", &self.progress.as_ref().map(|_| "<reporter>"))
            .finish()
    }
}

impl ExperimentBuilder {
    #[must_use]
    pub fn config(mut self, config: ExperimentConfig) -> Self {
        self.config = Some(config);
        self
    }

    #[must_use]
    pub fn data_handler(mut self, handler: impl DataHandler + 'static) -> Self {
        self.data_handler = Some(Box::new(handler));
        self
    }

    #[must_use]
    pub fn preprocessor(mut self, preprocessor: impl Preprocessor + 'static) -> Self {
        self.preprocessor = Some(Box::new(preprocessor));
        self
    }

    /// Add a model. Models are trained and reported in insertion order.
    #[must_use]
    pub fn model(mut self, model: impl Model + 'static) -> Self {
        self.models.push(Box::new(model));
        self
    }

    #[must_use]
    pub fn boxed_model(mut self, model: Box<dyn Model>) -> Self {
        self.models.push(model);
        self
    }

    /// Report progress through a closure.
    #[must_use]
    pub fn on_progress<F>(self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter(ClosureProgressReporter::new(callback))
    }

    #[must_use]
    pub fn progress_reporter(mut self, reporter: impl ProgressReporter + 'static) -> Self {
        self.progress = Some(Box::new(reporter));
        self
    }

    #[must_use]
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Validate everything that can be checked without data and build.
    ///
    /// # Errors
    ///
    /// [`ExperimentError::Configuration`] if the configuration is invalid, a
    /// required component is missing, model names repeat, a model cannot
    /// sweep the configured hyperparameter, or `favoured_model` names no model.
    pub fn build(self) -> Result<Experiment> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let eval_metrics = config.parsed_metrics()?;

        let data_handler = self.data_handler.ok_or_else(|| {
            ExperimentError::Configuration("a data handler is required".to_string())
        })?;
        let preprocessor = self.preprocessor.ok_or_else(|| {
            ExperimentError::Configuration("a preprocessor is required".to_string())
        })?;
        if self.models.is_empty() {
            return Err(ExperimentError::Configuration(
                "at least one model is required".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for model in &self.models {
            if !names.insert(model.name()) {
                return Err(ExperimentError::Configuration(format!(
                    "model name '{}' is used more than once",
                    model.name()
                )));
            }
            if !model.supports_param(&config.param_name) {
                return Err(ExperimentError::Configuration(format!(
                    "model '{}' cannot sweep '{}'",
                    model.name(),
                    config.param_name
                )));
            }
        }
        if let Some(favoured) = &config.favoured_model
            && !names.contains(favoured.as_str())
        {
            return Err(ExperimentError::Configuration(format!(
                "favoured model '{}' is not part of the experiment",
                favoured
            )));
        }
        let span = self
            .span
            .unwrap_or_else(|| info_span!("experiment", name = %config.name));
        if self.models.len() != 2 {
            warn!(
                parent: &span,
                models = self.models.len(),
                "Hypothesis testing needs exactly two models"
            );
        }

        let mut models = self.models;
        for model in &mut models {
            model.set_cv_folds(config.cv_folds);
        }

        Ok(Experiment {
            config,
            eval_metrics,
            data_handler,
            preprocessor,
            models,
            progress: self.progress,
            span,
            state: ExperimentState::Created,
            split_summary: None,
            feature_names: Vec::new(),
            holdout: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Metrics, Sweep};
    use exper_processing::{ApiHandler, ColumnTransformer, MemoryFetcher};
    use ndarray::{ArrayView1, ArrayView2};
    use std::sync::{Arc, Mutex};

    const HOUSING: &str = include_str!("../../exper-processing/tests/fixtures/housing_sample.csv");

    /// Records a fixed error level, jittered per sweep position.
    struct StubModel {
        name: String,
        level: f64,
        fail: bool,
        metrics: Metrics,
        sweep: Option<Sweep>,
    }

    impl StubModel {
        fn new(name: &str, level: f64) -> Self {
            Self {
                name: name.to_string(),
                level,
                fail: false,
                metrics: Metrics::default(),
                sweep: None,
            }
        }

        fn failing(name: &str) -> Self {
            Self {
                fail: true,
                ..Self::new(name, 0.0)
            }
        }
    }

    impl Model for StubModel {
        fn name(&self) -> &str {
            &self.name
        }

        fn supports_param(&self, param_name: &str) -> bool {
            param_name == "iterations"
        }

        fn fit(
            &mut self,
            _x: ArrayView2<'_, f64>,
            _y: ArrayView1<'_, f64>,
            param_range: &[f64],
            param_name: &str,
            eval_metrics: &[Metric],
        ) -> Result<()> {
            if self.fail {
                return Err(ExperimentError::fit(&self.name, "diverged"));
            }
            let mut metrics = Metrics::new(eval_metrics);
            for (i, _) in param_range.iter().enumerate() {
                let jitter = (i % 3) as f64 * 0.1;
                for &m in eval_metrics {
                    metrics.push(m, self.level, self.level + jitter);
                }
            }
            self.metrics = metrics;
            self.sweep = Some(Sweep {
                param_name: param_name.to_string(),
                param_range: param_range.to_vec(),
            });
            Ok(())
        }

        fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
            if self.sweep.is_none() {
                return Err(ExperimentError::NotFitted(self.name.clone()));
            }
            Ok(Array1::zeros(x.nrows()))
        }

        fn is_fitted(&self) -> bool {
            self.sweep.is_some()
        }

        fn metrics(&self) -> &Metrics {
            &self.metrics
        }

        fn sweep(&self) -> Option<&Sweep> {
            self.sweep.as_ref()
        }

        fn to_artifact(&self) -> Result<serde_json::Value> {
            Ok(serde_json::json!({ "name": self.name }))
        }
    }

    fn config(dir: &std::path::Path) -> ExperimentConfig {
        ExperimentConfig::builder()
            .data_path(dir.join("housing.csv"))
            .data_url("mem://housing.csv")
            .param_range(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
            .build()
            .unwrap()
    }

    fn handler() -> ApiHandler<MemoryFetcher> {
        ApiHandler::new(
            MemoryFetcher::new().with_resource("mem://housing.csv", HOUSING),
            "median_house_value",
        )
    }

    fn two_models(dir: &std::path::Path) -> ExperimentBuilder {
        Experiment::builder()
            .config(config(dir))
            .data_handler(handler())
            .preprocessor(ColumnTransformer::california())
            .model(StubModel::new("good", 1.0))
            .model(StubModel::new("bad", 5.0))
    }

    #[test]
    fn test_build_requires_components() {
        let err = Experiment::builder()
            .preprocessor(ColumnTransformer::california())
            .model(StubModel::new("a", 1.0))
            .build()
            .unwrap_err();
        assert!(err.is_configuration());

        let err = Experiment::builder()
            .data_handler(handler())
            .preprocessor(ColumnTransformer::california())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("at least one model"));
    }

    #[test]
    fn test_build_rejects_duplicate_names_and_unknown_params() {
        let dir = tempfile::tempdir().unwrap();
        let err = Experiment::builder()
            .config(config(dir.path()))
            .data_handler(handler())
            .preprocessor(ColumnTransformer::california())
            .model(StubModel::new("same", 1.0))
            .model(StubModel::new("same", 2.0))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("more than once"));

        let mut cfg = config(dir.path());
        cfg.param_name = "depth".to_string();
        let err = Experiment::builder()
            .config(cfg)
            .data_handler(handler())
            .preprocessor(ColumnTransformer::california())
            .model(StubModel::new("a", 1.0))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("cannot sweep 'depth'"));
    }

    #[test]
    fn test_build_rejects_unknown_favoured_model() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.favoured_model = Some("missing".to_string());
        let err = two_models(dir.path()).config(cfg).build().unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_run_collects_metrics_per_model() {
        let dir = tempfile::tempdir().unwrap();
        let mut experiment = two_models(dir.path()).build().unwrap();
        assert_eq!(experiment.state(), ExperimentState::Created);
        assert!(experiment.metrics()["rmse"].is_empty());

        experiment.run().unwrap();
        assert_eq!(experiment.state(), ExperimentState::RunComplete);

        let metrics = experiment.metrics();
        assert_eq!(
            metrics.keys().collect::<Vec<_>>(),
            vec!["mae", "mse", "rmse"]
        );
        for per_model in metrics.values() {
            assert_eq!(per_model.len(), 2);
            for curve in per_model.values() {
                assert_eq!(curve.train.len(), 6);
                assert_eq!(curve.test.len(), 6);
            }
        }

        let summary = experiment.split_summary().unwrap();
        assert_eq!(summary.train_rows + summary.test_rows, 240);
        assert!(experiment.feature_names().iter().any(|n| n.starts_with("ocean_proximity")));
        assert!(experiment.preprocessor().is_fitted());
    }

    #[test]
    fn test_hypothesis_testing_favours_lower_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut experiment = two_models(dir.path()).build().unwrap();
        experiment.run().unwrap();

        let report = experiment.hypothesis_testing().unwrap();
        assert_eq!(report.tests.len(), 3);
        assert!(!report.equal_var);
        let rmse = report.get(Metric::Rmse).unwrap();
        assert_eq!(rmse.model_a, "good");
        assert_eq!(rmse.model_b, "bad");
        assert!(rmse.mean_a < rmse.mean_b);
        assert!(rmse.statistic > 0.0);
        assert!(rmse.rejects_null);
        assert!(rmse.favours_alternative);
        assert!(report.all_reject());
    }

    #[test]
    fn test_hypothesis_testing_respects_favoured_model() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.favoured_model = Some("bad".to_string());
        let mut experiment = two_models(dir.path()).config(cfg).build().unwrap();
        experiment.run().unwrap();

        let report = experiment.hypothesis_testing().unwrap();
        for test in &report.tests {
            assert_eq!(test.model_a, "bad");
            assert!(test.statistic < 0.0);
            assert!(test.rejects_null);
            assert!(!test.favours_alternative);
            assert!((0.0..=1.0).contains(&test.p_value));
            assert!((0.0..=1.0).contains(&test.p_value_greater));
        }
    }

    #[test]
    fn test_hypothesis_testing_preconditions() {
        let dir = tempfile::tempdir().unwrap();
        let experiment = two_models(dir.path()).build().unwrap();
        let err = experiment.hypothesis_testing().unwrap_err();
        assert!(err.to_string().contains("completed run"));

        let mut single = Experiment::builder()
            .config(config(dir.path()))
            .data_handler(handler())
            .preprocessor(ColumnTransformer::california())
            .model(StubModel::new("only", 1.0))
            .build()
            .unwrap();
        single.run().unwrap();
        let err = single.hypothesis_testing().unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("exactly two"));
    }

    #[test]
    fn test_hypothesis_testing_needs_two_sweep_values() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.param_range = vec![1.0];
        let mut experiment = two_models(dir.path()).config(cfg).build().unwrap();
        experiment.run().unwrap();

        let err = experiment.hypothesis_testing().unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("at least 2 sweep values"));
    }

    #[test]
    fn test_build_applies_configured_cv_folds() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.cv_folds = 3;
        let experiment = two_models(dir.path())
            .config(cfg)
            .model(crate::model::LinearModel::new().with_cv_folds(10))
            .build()
            .unwrap();

        let linear = experiment.models()[2].to_artifact().unwrap();
        assert_eq!(linear["cv_folds"], 3);
    }

    /// Records the level and enclosing span name of every event.
    #[derive(Clone, Default)]
    struct EventLog(Arc<Mutex<Vec<(tracing::Level, Option<String>)>>>);

    impl<S> tracing_subscriber::Layer<S> for EventLog
    where
        S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            let span = ctx.event_span(event).map(|s| s.name().to_string());
            self.0.lock().unwrap().push((*event.metadata().level(), span));
        }
    }

    #[test]
    fn test_model_count_warning_belongs_to_experiment_span() {
        use tracing_subscriber::layer::SubscriberExt;

        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::default();
        let subscriber = tracing_subscriber::registry().with(log.clone());
        tracing::subscriber::with_default(subscriber, || {
            Experiment::builder()
                .config(config(dir.path()))
                .data_handler(handler())
                .preprocessor(ColumnTransformer::california())
                .model(StubModel::new("only", 1.0))
                .build()
                .unwrap();
        });

        let events = log.0.lock().unwrap();
        let warnings: Vec<_> = events
            .iter()
            .filter(|(level, _)| *level == tracing::Level::WARN)
            .collect();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].1.as_deref(), Some("experiment"));
    }

    #[test]
    fn test_failed_model_propagates_and_resets_state() {
        let dir = tempfile::tempdir().unwrap();
        let stages = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&stages);
        let mut experiment = Experiment::builder()
            .config(config(dir.path()))
            .data_handler(handler())
            .preprocessor(ColumnTransformer::california())
            .model(StubModel::new("first", 1.0))
            .model(StubModel::failing("second"))
            .on_progress(move |u| sink.lock().unwrap().push(u.stage))
            .build()
            .unwrap();

        let err = experiment.run().unwrap_err();
        assert!(err.is_fit());
        assert_eq!(experiment.state(), ExperimentState::Created);
        // Models fitted before the failure keep their curves.
        assert_eq!(experiment.models()[0].metrics().len(), 6);
        assert!(experiment.models()[1].metrics().is_empty());
        assert_eq!(
            stages.lock().unwrap().last().copied(),
            Some(ExperimentStage::Failed)
        );
    }

    #[test]
    fn test_progress_stages_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let updates = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&updates);
        let mut experiment = two_models(dir.path())
            .on_progress(move |u| sink.lock().unwrap().push(u))
            .build()
            .unwrap();
        experiment.run().unwrap();

        let updates = updates.lock().unwrap();
        let mut stages: Vec<ExperimentStage> = updates.iter().map(|u| u.stage).collect();
        stages.dedup();
        assert_eq!(
            stages,
            vec![
                ExperimentStage::Initializing,
                ExperimentStage::Loading,
                ExperimentStage::Splitting,
                ExperimentStage::Preprocessing,
                ExperimentStage::Training,
                ExperimentStage::Complete,
            ]
        );
        assert!(updates.windows(2).all(|w| w[0].progress <= w[1].progress));
        assert!(updates.iter().any(|u| u.models_completed == Some((2, 2))));
    }

    #[test]
    fn test_visualize_results() {
        let dir = tempfile::tempdir().unwrap();
        let mut experiment = two_models(dir.path()).build().unwrap();
        experiment.run().unwrap();

        let plots = experiment.visualize_results();
        assert_eq!(plots.len(), 3);
        assert_eq!(plots[0].metric, Metric::Rmse);
        assert_eq!(plots[0].x_label, "iterations");
        assert_eq!(plots[0].x.len(), 6);
        assert_eq!(plots[0].series.len(), 4);
        assert_eq!(plots[0].series[0].kind, CurveKind::Train);
        assert_eq!(plots[0].series[1].kind, CurveKind::Test);
    }

    #[test]
    fn test_holdout_scores() {
        let dir = tempfile::tempdir().unwrap();
        let mut experiment = two_models(dir.path()).build().unwrap();
        assert!(experiment.holdout_scores().is_err());

        experiment.run().unwrap();
        let scores = experiment.holdout_scores().unwrap();
        assert_eq!(scores.len(), 2);
        // Zero predictions against positive house values.
        assert!(scores["good"][&Metric::Mae] > 0.0);
    }

    #[test]
    fn test_rerun_overwrites_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let mut experiment = two_models(dir.path()).build().unwrap();
        experiment.run().unwrap();
        let first = experiment.metrics();
        experiment.run().unwrap();
        assert_eq!(experiment.metrics(), first);
        assert_eq!(experiment.models()[0].metrics().len(), 6);
    }
}
