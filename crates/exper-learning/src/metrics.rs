//! Regression error metrics.
//!
//! Every model speaks the same three-metric vocabulary. Scorers follow the
//! greater-is-better convention (negated errors), while everything stored
//! in [`Metrics`](crate::Metrics) is a positive error magnitude.

use crate::error::{ExperimentError, Result};
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A regression error metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Mean squared error.
    Mse,
    /// Root mean squared error.
    Rmse,
    /// Mean absolute error.
    Mae,
}

impl Metric {
    /// All supported metrics.
    pub const ALL: [Metric; 3] = [Metric::Mse, Metric::Rmse, Metric::Mae];

    /// Canonical short name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Mse => "mse",
            Metric::Rmse => "rmse",
            Metric::Mae => "mae",
        }
    }

    /// Greater-is-better scorer name, as used by cross-validation tooling.
    #[must_use]
    pub fn scorer_name(&self) -> &'static str {
        match self {
            Metric::Mse => "neg_mean_squared_error",
            Metric::Rmse => "neg_root_mean_squared_error",
            Metric::Mae => "neg_mean_absolute_error",
        }
    }

    /// Resolve a metric from its canonical name or a known alias.
    ///
    /// Accepted (case-insensitive): `mse`, `mean_squared_error`,
    /// `neg_mean_squared_error`, and the analogous forms for `rmse` and `mae`.
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mse" | "mean_squared_error" | "neg_mean_squared_error" => Ok(Metric::Mse),
            "rmse" | "root_mean_squared_error" | "neg_root_mean_squared_error" => Ok(Metric::Rmse),
            "mae" | "mean_absolute_error" | "neg_mean_absolute_error" => Ok(Metric::Mae),
            other => Err(ExperimentError::Configuration(format!(
                "unknown metric '{}'. Valid values are: mse, rmse, mae",
                other
            ))),
        }
    }

    /// Resolve a list of metric names, rejecting duplicates.
    pub fn parse_all<S: AsRef<str>>(names: &[S]) -> Result<Vec<Metric>> {
        if names.is_empty() {
            return Err(ExperimentError::Configuration(
                "at least one evaluation metric is required".to_string(),
            ));
        }
        let mut metrics = Vec::with_capacity(names.len());
        for name in names {
            let metric = Metric::parse(name.as_ref())?;
            if metrics.contains(&metric) {
                return Err(ExperimentError::Configuration(format!(
                    "metric '{}' requested more than once",
                    metric
                )));
            }
            metrics.push(metric);
        }
        Ok(metrics)
    }

    /// Error magnitude between targets and predictions (lower is better).
    pub fn error(&self, y_true: ArrayView1<'_, f64>, y_pred: ArrayView1<'_, f64>) -> f64 {
        let n = y_true.len().max(1) as f64;
        match self {
            Metric::Mse => squared_error_sum(y_true, y_pred) / n,
            Metric::Rmse => (squared_error_sum(y_true, y_pred) / n).sqrt(),
            Metric::Mae => {
                y_true
                    .iter()
                    .zip(y_pred.iter())
                    .map(|(t, p)| (t - p).abs())
                    .sum::<f64>()
                    / n
            }
        }
    }

    /// Greater-is-better score: the negated error.
    pub fn score(&self, y_true: ArrayView1<'_, f64>, y_pred: ArrayView1<'_, f64>) -> f64 {
        -self.error(y_true, y_pred)
    }
}

fn squared_error_sum(y_true: ArrayView1<'_, f64>, y_pred: ArrayView1<'_, f64>) -> f64 {
    y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum()
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = ExperimentError;

    fn from_str(s: &str) -> Result<Self> {
        Metric::parse(s)
    }
}
