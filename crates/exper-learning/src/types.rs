//! Common types used throughout the exper-learning crate.
//!
//! # Overview
//!
//! - [`Metrics`]: per-metric train/test curves recorded by a model's sweep
//! - [`Sweep`]: the hyperparameter name and values a model was swept over
//! - [`CurvePair`]: one metric's train and test curves for one model
//! - [`HypothesisReport`] / [`MetricTest`]: results of comparing two models
//! - [`MetricPlot`] / [`PlotSeries`]: plot-ready validation curves

use crate::metrics::Metric;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Validation curves recorded by a model's sweep.
///
/// `train[m][i]` and `test[m][i]` are the errors for metric `m` at the
/// `i`-th sweep value. Values are positive error magnitudes (lower is
/// better) and every curve has exactly one entry per sweep value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Errors on the data the estimator was trained on.
    pub train: BTreeMap<Metric, Vec<f64>>,
    /// Errors on held-out data (validation folds or a validation split).
    pub test: BTreeMap<Metric, Vec<f64>>,
}

impl Metrics {
    /// Empty curves for each of `metrics`.
    pub fn new(metrics: &[Metric]) -> Self {
        let empty = || -> BTreeMap<Metric, Vec<f64>> {
            metrics.iter().map(|&m| (m, Vec::new())).collect()
        };
        Self {
            train: empty(),
            test: empty(),
        }
    }

    /// Append one sweep position for `metric`.
    pub fn push(&mut self, metric: Metric, train: f64, test: f64) {
        self.train.entry(metric).or_default().push(train);
        self.test.entry(metric).or_default().push(test);
    }

    /// Metrics with recorded curves.
    pub fn metrics(&self) -> Vec<Metric> {
        self.train.keys().copied().collect()
    }

    /// Number of sweep positions recorded (0 before any fit).
    pub fn len(&self) -> usize {
        self.train.values().map(Vec::len).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Train and test curves for `metric`.
    pub fn curve(&self, metric: Metric) -> Option<CurvePair> {
        Some(CurvePair {
            train: self.train.get(&metric)?.clone(),
            test: self.test.get(&metric)?.clone(),
        })
    }
}

/// One metric's train and test curves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurvePair {
    pub train: Vec<f64>,
    pub test: Vec<f64>,
}

/// Metric name → model name → curves, as collected after a run.
pub type ExperimentMetrics = BTreeMap<String, BTreeMap<String, CurvePair>>;

/// The hyperparameter a model was swept over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sweep {
    /// Hyperparameter name as requested (before alias translation).
    pub param_name: String,
    /// Values in sweep order.
    pub param_range: Vec<f64>,
}

/// Outcome of one per-metric two-sample t-test.
///
/// The null hypothesis is that both models' test-error curves have the same
/// mean. The alternative favours `model_a`: its scores (negated errors) are
/// greater than `model_b`'s, i.e. its mean test error is lower.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricTest {
    pub metric: Metric,
    pub model_a: String,
    pub model_b: String,
    /// Mean test error of `model_a`.
    pub mean_a: f64,
    /// Mean test error of `model_b`.
    pub mean_b: f64,
    /// t statistic of the score difference (`mean_b - mean_a` in error
    /// units), positive when `model_a` has the lower error.
    pub statistic: f64,
    /// Degrees of freedom (Welch-Satterthwaite unless equal variances are assumed).
    pub df: f64,
    /// Two-sided p-value.
    pub p_value: f64,
    /// One-sided p-value for the alternative favouring `model_a`.
    pub p_value_greater: f64,
    /// `p_value < alpha`.
    pub rejects_null: bool,
    /// `p_value_greater < alpha`: the one-sided test favours `model_a`.
    pub favours_alternative: bool,
}

/// Results of [`Experiment::hypothesis_testing`](crate::Experiment::hypothesis_testing).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypothesisReport {
    /// Significance level.
    pub alpha: f64,
    /// Whether equal variances were assumed (Student) or not (Welch).
    pub equal_var: bool,
    /// One entry per evaluation metric, in configuration order.
    pub tests: Vec<MetricTest>,
}

impl HypothesisReport {
    pub fn get(&self, metric: Metric) -> Option<&MetricTest> {
        self.tests.iter().find(|t| t.metric == metric)
    }

    /// True when every metric rejects the null hypothesis.
    pub fn all_reject(&self) -> bool {
        !self.tests.is_empty() && self.tests.iter().all(|t| t.rejects_null)
    }
}

/// Which side of the data a curve was measured on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurveKind {
    Train,
    Test,
}

/// One line on a validation-curve plot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotSeries {
    pub model: String,
    pub kind: CurveKind,
    pub values: Vec<f64>,
}

/// Plot-ready validation curves for one metric across all models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPlot {
    pub metric: Metric,
    /// Label for the x axis (the swept hyperparameter).
    pub x_label: String,
    /// Sweep values, the x coordinates of every series.
    pub x: Vec<f64>,
    pub series: Vec<PlotSeries>,
}
