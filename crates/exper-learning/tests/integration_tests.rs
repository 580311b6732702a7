//! Integration tests for the experiment orchestrator.
//!
//! These run the California housing comparison end to end with the real
//! linear and neural models, on the fixture shared with exper-processing and
//! with an in-memory fetcher standing in for the download.

use exper_learning::{
    ArtifactStore, ElasticNetParams, Experiment, ExperimentConfig, ExperimentMetrics,
    ExperimentState, HypothesisReport, LinearModel, Metric, MlpParams, Model, NeuralNetwork,
    RunManifest,
};
use exper_processing::handler::{ApiHandler, HOUSING_TARGET, MemoryFetcher};
use exper_processing::ColumnTransformer;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

// ============================================================================
// Helper Functions
// ============================================================================

const HOUSING_URL: &str = "mem://datasets/housing/housing.csv";

fn housing_bytes() -> Vec<u8> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../exper-processing/tests/fixtures/housing_sample.csv");
    fs::read(path).expect("Failed to read fixture")
}

fn handler() -> ApiHandler<MemoryFetcher> {
    ApiHandler::new(
        MemoryFetcher::new().with_resource(HOUSING_URL, housing_bytes()),
        HOUSING_TARGET,
    )
}

fn config(dir: &Path, range: Vec<f64>) -> ExperimentConfig {
    ExperimentConfig::builder()
        .data_path(dir.join("housing.csv"))
        .data_url(HOUSING_URL)
        .param_range(range)
        .cv_folds(3)
        .build()
        .expect("valid config")
}

fn small_network() -> NeuralNetwork {
    NeuralNetwork::with_params(MlpParams {
        hidden_layers: vec![8],
        hidden_l2: vec![0.001],
        dropout: 0.0,
        learning_rate: 0.01,
        epochs: 3,
        ..MlpParams::default()
    })
}

fn lr_vs_nn(dir: &Path, range: Vec<f64>) -> Experiment {
    let config = config(dir, range);
    Experiment::builder()
        .data_handler(handler())
        .preprocessor(ColumnTransformer::california())
        .model(LinearModel::new().with_cv_folds(config.cv_folds))
        .model(small_network())
        .config(config)
        .build()
        .expect("valid experiment")
}

fn assert_curves(metrics: &ExperimentMetrics, models: &[&str], len: usize) {
    assert_eq!(metrics.len(), 3);
    for per_model in metrics.values() {
        assert_eq!(per_model.keys().map(String::as_str).collect::<Vec<_>>(), {
            let mut sorted = models.to_vec();
            sorted.sort_unstable();
            sorted
        });
        for curve in per_model.values() {
            assert_eq!(curve.train.len(), len);
            assert_eq!(curve.test.len(), len);
            assert!(curve.train.iter().chain(&curve.test).all(|v| v.is_finite() && *v >= 0.0));
        }
    }
}

// ============================================================================
// End-to-End Runs
// ============================================================================

#[test]
fn test_lr_vs_nn_end_to_end() {
    let dir = tempdir().unwrap();
    let mut experiment = lr_vs_nn(dir.path(), vec![1.0, 2.0, 3.0, 4.0]);
    experiment.run().unwrap();

    assert_eq!(experiment.state(), ExperimentState::RunComplete);
    assert_curves(&experiment.metrics(), &["LinearModel", "NeuralNetwork"], 4);

    let split = experiment.split_summary().unwrap();
    assert_eq!(split.test_rows, 72);
    assert_eq!(split.train_rows, 168);

    for model in experiment.models() {
        assert!(model.is_fitted());
        assert_eq!(model.sweep().unwrap().param_range, vec![1.0, 2.0, 3.0, 4.0]);
    }

    let holdout = experiment.holdout_scores().unwrap();
    for scores in holdout.values() {
        let mse = scores[&Metric::Mse];
        let rmse = scores[&Metric::Rmse];
        assert!((rmse - mse.sqrt()).abs() < 1e-6 * rmse.max(1.0));
        assert!(scores[&Metric::Mae] <= rmse + 1e-9);
    }
}

#[test]
fn test_rmse_curve_is_root_of_mse_curve_for_neural_network() {
    let dir = tempdir().unwrap();
    let mut experiment = lr_vs_nn(dir.path(), vec![1.0, 2.0]);
    experiment.run().unwrap();

    let metrics = experiment.metrics();
    let mse = &metrics["mse"]["NeuralNetwork"];
    let rmse = &metrics["rmse"]["NeuralNetwork"];
    for (m, r) in mse.test.iter().zip(&rmse.test) {
        assert!((r - m.sqrt()).abs() <= 1e-6 * r.max(1.0));
    }
}

#[test]
fn test_runs_are_reproducible() {
    let dir = tempdir().unwrap();
    let mut first = lr_vs_nn(dir.path(), vec![1.0, 3.0]);
    let mut second = lr_vs_nn(dir.path(), vec![1.0, 3.0]);
    first.run().unwrap();
    second.run().unwrap();

    assert_eq!(first.metrics(), second.metrics());
    assert_eq!(first.feature_names(), second.feature_names());
}

#[test]
fn test_hypothesis_report_is_well_formed() {
    let dir = tempdir().unwrap();
    let mut experiment = lr_vs_nn(dir.path(), vec![1.0, 2.0, 3.0]);
    experiment.run().unwrap();

    let report = experiment.hypothesis_testing().unwrap();
    assert_eq!(report.alpha, 0.05);
    assert_eq!(
        report.tests.iter().map(|t| t.metric).collect::<Vec<_>>(),
        vec![Metric::Rmse, Metric::Mse, Metric::Mae]
    );
    for test in &report.tests {
        assert_eq!(test.model_a, "LinearModel");
        assert_eq!(test.model_b, "NeuralNetwork");
        assert!((0.0..=1.0).contains(&test.p_value));
        assert!((0.0..=1.0).contains(&test.p_value_greater));
        assert_eq!(test.rejects_null, test.p_value < report.alpha);
        assert_eq!(test.favours_alternative, test.p_value_greater < report.alpha);
        // The alternative favours the model with the lower mean error.
        if test.statistic > 0.0 {
            assert!(test.mean_a < test.mean_b);
        }
    }
}

#[test]
fn test_sweeping_alpha() {
    let dir = tempdir().unwrap();
    let config = ExperimentConfig::builder()
        .data_path(dir.path().join("housing.csv"))
        .data_url(HOUSING_URL)
        .param_name("alpha")
        .param_range(vec![0.1, 1.0, 100.0])
        .eval_metrics(["neg_mean_absolute_error"])
        .cv_folds(3)
        .build()
        .unwrap();
    let mut experiment = Experiment::builder()
        .config(config)
        .data_handler(handler())
        .preprocessor(ColumnTransformer::california())
        .model(LinearModel::new().with_cv_folds(3))
        .build()
        .unwrap();
    experiment.run().unwrap();

    let metrics = experiment.metrics();
    assert_eq!(metrics.keys().collect::<Vec<_>>(), vec!["mae"]);
    let curve = &metrics["mae"]["LinearModel"];
    assert_eq!(curve.test.len(), 3);
    let sweep = experiment.models()[0].sweep().unwrap();
    assert_eq!(sweep.param_name, "alpha");
    assert_eq!(sweep.param_range, vec![0.1, 1.0, 100.0]);
}

// ============================================================================
// Preconditions
// ============================================================================

#[test]
fn test_three_models_cannot_be_hypothesis_tested() {
    let dir = tempdir().unwrap();
    let config = config(dir.path(), vec![1.0, 2.0]);
    let ridge = ElasticNetParams {
        l1_ratio: 0.0,
        ..ElasticNetParams::default()
    };
    let mut experiment = Experiment::builder()
        .config(config)
        .data_handler(handler())
        .preprocessor(ColumnTransformer::california())
        .model(LinearModel::new().with_name("Lasso").with_cv_folds(3))
        .model(LinearModel::with_params(ridge).with_name("Ridge").with_cv_folds(3))
        .model(small_network())
        .build()
        .unwrap();
    experiment.run().unwrap();

    assert_curves(&experiment.metrics(), &["Lasso", "Ridge", "NeuralNetwork"], 2);
    let err = experiment.hypothesis_testing().unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn test_missing_dataset_fails_the_run() {
    let dir = tempdir().unwrap();
    let mut experiment = Experiment::builder()
        .config(config(dir.path(), vec![1.0]))
        .data_handler(ApiHandler::new(MemoryFetcher::new(), HOUSING_TARGET))
        .preprocessor(ColumnTransformer::california())
        .model(LinearModel::new())
        .model(small_network())
        .build()
        .unwrap();

    let err = experiment.run().unwrap_err();
    assert!(err.is_data_unavailable());
    assert_eq!(experiment.state(), ExperimentState::Created);
    assert!(experiment.models().iter().all(|m| !m.is_fitted()));
    assert!(experiment.hypothesis_testing().is_err());
}

#[test]
fn test_invalid_sweep_is_rejected_before_loading() {
    let dir = tempdir().unwrap();
    let err = ExperimentConfig::builder()
        .data_path(dir.path().join("housing.csv"))
        .param_range(Vec::new())
        .build()
        .unwrap_err();
    assert!(err.is_configuration());
    assert!(!dir.path().join("housing.csv").exists());
}

// ============================================================================
// Artifacts
// ============================================================================

#[test]
fn test_saved_artifacts_load_back() {
    let dir = tempdir().unwrap();
    let mut experiment = lr_vs_nn(dir.path(), vec![1.0, 2.0]);
    experiment.run().unwrap();
    let report = experiment.hypothesis_testing().unwrap();

    let store = ArtifactStore::new(dir.path().join("run"));
    let manifest = store.save_experiment(&experiment, Some(&report)).unwrap();
    assert_eq!(manifest.models, vec!["LinearModel", "NeuralNetwork"]);
    for name in &manifest.artifacts {
        assert!(store.exists(name), "missing artifact {}", name);
    }
    assert!(manifest.artifacts.contains(&"preprocessor".to_string()));
    assert!(manifest.artifacts.contains(&"model_linearmodel".to_string()));

    let loaded: RunManifest = store.load("manifest").unwrap();
    assert_eq!(loaded.artifacts, manifest.artifacts);

    let metrics: ExperimentMetrics = store.load("metrics").unwrap();
    assert_eq!(metrics.keys().collect::<Vec<_>>(), vec!["mae", "mse", "rmse"]);
    assert_eq!(metrics["rmse"]["LinearModel"].test.len(), 2);

    let saved_report: HypothesisReport = store.load("hypothesis").unwrap();
    assert_eq!(saved_report.tests.len(), report.tests.len());

    let config: ExperimentConfig = store.load("config").unwrap();
    assert_eq!(&config, experiment.config());
}

#[test]
fn test_unfinished_experiment_cannot_be_saved() {
    let dir = tempdir().unwrap();
    let experiment = lr_vs_nn(dir.path(), vec![1.0]);
    let store = ArtifactStore::new(dir.path().join("run"));
    let err = store.save_experiment(&experiment, None).unwrap_err();
    assert!(err.is_configuration());
    assert!(!store.root().exists());
}
