//! Explicit experiment steps over typed artifact bundles.
//!
//! A run is the composition `load -> split -> preprocess -> train`. Each
//! step is a plain function from one bundle to the next, and
//! [`run_step`] wraps any of them with start/finish logging and timing.

use crate::config::ExperimentConfig;
use crate::error::{ExperimentError, Result};
use crate::metrics::Metric;
use crate::model::Model;
use exper_processing::{
    DataHandler, Dataset, Preprocessor, SplitSummary, StratificationKey, stratified_split,
};
use ndarray::{Array1, Array2};
use std::time::Instant;
use tracing::{Span, error, info};

/// Output of [`load`].
#[derive(Debug, Clone)]
pub struct RawData {
    pub dataset: Dataset,
}

/// Output of [`split`].
#[derive(Debug, Clone)]
pub struct SplitData {
    pub train: Dataset,
    pub test: Dataset,
    pub summary: SplitSummary,
}

/// Output of [`preprocess`]: dense features for both splits.
#[derive(Debug, Clone)]
pub struct FeatureSet {
    pub feature_names: Vec<String>,
    pub x_train: Array2<f64>,
    pub y_train: Array1<f64>,
    pub x_test: Array2<f64>,
    pub y_test: Array1<f64>,
}

/// Run `step` on `input`, logging its start, finish and elapsed time.
///
/// Errors are logged and returned unchanged.
pub fn run_step<I, O, F>(name: &str, span: &Span, input: I, step: F) -> Result<O>
where
    F: FnOnce(I) -> Result<O>,
{
    info!(parent: span, step = name, "Step started");
    let started = Instant::now();
    let result = step(input);
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match &result {
        Ok(_) => info!(parent: span, step = name, elapsed_ms, "Step finished"),
        Err(e) => error!(parent: span, step = name, elapsed_ms, error = %e, "Step failed"),
    }
    result
}

/// Load the configured dataset and make sure it is labelled with the
/// configured target column.
pub fn load(handler: &dyn DataHandler, config: &ExperimentConfig) -> Result<RawData> {
    let dataset = handler.load_data(&config.data.path, &config.data.url)?;
    let dataset = if dataset.target() == Some(config.target_column.as_str()) {
        dataset
    } else {
        Dataset::new(dataset.into_frame(), config.target_column.as_str())?
    };
    Ok(RawData { dataset })
}

/// Stratified train/test split on the configured binning.
///
/// The stratification key lives only inside this step.
pub fn split(raw: RawData, config: &ExperimentConfig) -> Result<SplitData> {
    let key = StratificationKey::from_dataset(&raw.dataset, &config.stratification)?;
    let split = stratified_split(&raw.dataset, &key, config.test_size, config.random_seed)?;
    Ok(SplitData {
        train: split.train,
        test: split.test,
        summary: split.summary,
    })
}

/// Fit `preprocessor` on the training split only, then transform both.
pub fn preprocess(data: SplitData, preprocessor: &mut dyn Preprocessor) -> Result<FeatureSet> {
    let train = preprocessor.preprocess(data.train, true)?;
    let test = preprocessor.transform(&data.test)?;

    let feature_names = train.feature_names();
    if test.feature_names() != feature_names {
        return Err(ExperimentError::InvalidInput(
            "preprocessed train and test splits have different feature columns".to_string(),
        ));
    }

    Ok(FeatureSet {
        feature_names,
        x_train: train.feature_matrix()?,
        y_train: train.target_values()?,
        x_test: test.feature_matrix()?,
        y_test: test.target_values()?,
    })
}

/// Sweep every model over the shared training features, in order.
///
/// `on_model(name, completed, total)` is called before each model and once
/// more when all are done. The first failure aborts the step; models
/// already fitted keep their new metrics.
pub fn train<F>(
    features: &FeatureSet,
    models: &mut [Box<dyn Model>],
    config: &ExperimentConfig,
    eval_metrics: &[Metric],
    mut on_model: F,
) -> Result<()>
where
    F: FnMut(&str, usize, usize),
{
    let total = models.len();
    for (i, model) in models.iter_mut().enumerate() {
        on_model(model.name(), i, total);
        model.fit(
            features.x_train.view(),
            features.y_train.view(),
            &config.param_range,
            &config.param_name,
            eval_metrics,
        )?;
    }
    if let Some(last) = models.last() {
        on_model(last.name(), total, total);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use exper_processing::{MemoryFetcher, ApiHandler};

    fn csv(rows: usize) -> String {
        let mut body = String::from("median_income,x,median_house_value\n");
        for i in 0..rows {
            let income = 0.5 + (i % 8) as f64;
            body.push_str(&format!("{},{},{}\n", income, i, i * 10));
        }
        body
    }

    fn config(dir: &std::path::Path) -> ExperimentConfig {
        ExperimentConfig::builder()
            .data_path(dir.join("data.csv"))
            .data_url("mem://data.csv")
            .param_range(vec![1.0])
            .build()
            .unwrap()
    }

    #[test]
    fn test_run_step_passes_values_and_errors_through() {
        let span = Span::none();
        let out = run_step("double", &span, 21, |x| Ok(x * 2)).unwrap();
        assert_eq!(out, 42);

        let err = run_step("fail", &span, (), |_| -> Result<()> {
            Err(ExperimentError::Configuration("nope".to_string()))
        })
        .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_load_and_split() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let handler = ApiHandler::new(
            MemoryFetcher::new().with_resource("mem://data.csv", csv(100)),
            "median_house_value",
        );

        let raw = load(&handler, &config).unwrap();
        assert_eq!(raw.dataset.height(), 100);
        assert_eq!(raw.dataset.target(), Some("median_house_value"));

        let split = split(raw, &config).unwrap();
        assert_eq!(split.summary.test_rows, 30);
        assert_eq!(split.train.height(), 70);
        assert!(split.train.has_column("median_income"));
    }

    #[test]
    fn test_load_relabels_with_configured_target() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let handler = ApiHandler::new(
            MemoryFetcher::new().with_resource("mem://data.csv", csv(10)),
            "x",
        );
        let raw = load(&handler, &config).unwrap();
        assert_eq!(raw.dataset.target(), Some("median_house_value"));
    }

    #[test]
    fn test_load_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let handler = ApiHandler::new(MemoryFetcher::new(), "median_house_value");
        let err = load(&handler, &config).unwrap_err();
        assert!(err.is_data_unavailable());
    }
}
