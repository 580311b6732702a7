//! exper-learning: hyperparameter sweeps and model comparison for
//! regression experiments.
//!
//! This crate trains regression models over a swept hyperparameter, records
//! train and validation error curves for every model, and compares two model
//! families with a per-metric two-sample t-test. Data loading, splitting and
//! preprocessing come from [`exper_processing`].
//!
//! # Features
//!
//! - **Validation curves**: every [`Model`] sweeps one hyperparameter and
//!   records a train and a test error per metric at each value
//! - **Two model families**: an elastic-net [`LinearModel`] validated by
//!   k-fold, and a feed-forward [`NeuralNetwork`] validated on a held-out split
//! - **Hypothesis testing**: Welch (or Student) t-tests on the test-error curves
//! - **Artifacts**: metrics, reports, plots and fitted state as JSON
//! - **Progress Reporting**: stage and per-model callbacks
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use exper_learning::{Experiment, ExperimentConfig, LinearModel, NeuralNetwork};
//! use exper_processing::{ApiHandler, ColumnTransformer, HttpFetcher};
//!
//! let config = ExperimentConfig::builder()
//!     .param_range((1..=20).map(f64::from).collect())
//!     .build()?;
//!
//! let mut experiment = Experiment::builder()
//!     .config(config)
//!     .data_handler(ApiHandler::new(HttpFetcher::new()?, "median_house_value"))
//!     .preprocessor(ColumnTransformer::california())
//!     .model(LinearModel::new())
//!     .model(NeuralNetwork::new())
//!     .on_progress(|u| println!("{:.0}% - {}", u.progress * 100.0, u.message))
//!     .build()?;
//!
//! experiment.run()?;
//!
//! for test in experiment.hypothesis_testing()?.tests {
//!     println!("{}: t = {:.3}, p = {:.4}", test.metric, test.statistic, test.p_value);
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            Experiment                            │
//! │                                                                  │
//! │  load ──► split ──► preprocess ──► train (every Model, in order) │
//! │   │         │            │                    │                  │
//! │  RawData  SplitData   FeatureSet           Metrics               │
//! └──────────────────────────────────┬───────────────────────────────┘
//!                                    │
//!          metrics() / hypothesis_testing() / visualize_results()
//!                                    │
//!                                    ▼
//!                              ArtifactStore
//! ```
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, ExperimentError>`]:
//!
//! - [`ExperimentError::Configuration`] - invalid configuration or wrong model count
//! - [`ExperimentError::Processing`] - the dataset could not be loaded or transformed
//! - [`ExperimentError::Fit`] - an estimator could not be trained
//! - [`ExperimentError::NotFitted`] - prediction before a successful fit
//!
//! See [`ExperimentError`] for the complete list.
//!
//! # Modules
//!
//! - [`model`] - the [`Model`] trait, estimators and validation splits
//! - [`steps`] - the explicit steps a run is composed of
//! - [`stats`] - two-sample t-tests
//! - [`artifacts`] - JSON persistence

pub mod artifacts;
mod config;
mod error;
mod experiment;
mod metrics;
pub mod model;
mod progress;
pub mod stats;
pub mod steps;
mod types;

// Re-export public API
//
// Configuration types
pub use config::{DataSource, ExperimentConfig, ExperimentConfigBuilder};
// Error types
pub use error::{ExperimentError, Result, ResultExt};
// Orchestrator
pub use experiment::{Experiment, ExperimentBuilder, ExperimentState, HoldoutScores};
// Metric vocabulary
pub use metrics::Metric;
// Models
pub use model::{ElasticNetParams, LinearModel, MlpParams, Model, NeuralNetwork};
// Progress reporting types
pub use progress::{
    ClosureProgressReporter, ExperimentStage, ParseExperimentStageError, ProgressReporter,
    ProgressUpdate,
};
// Result and metrics types
pub use types::{
    CurveKind, CurvePair, ExperimentMetrics, HypothesisReport, MetricPlot, MetricTest, Metrics,
    PlotSeries, Sweep,
};
// Artifacts
pub use artifacts::{ArtifactStore, RunManifest};
