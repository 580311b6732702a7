//! Elastic-net linear regression with k-fold validation curves.

use super::validation::{self, Fold};
use super::{Model, as_count, check_prediction_inputs, check_training_inputs};
use crate::error::{ExperimentError, Result};
use crate::metrics::Metric;
use crate::types::{Metrics, Sweep};
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use tracing::{Span, debug, info, info_span};

/// Hyperparameters of [`ElasticNet`].
///
/// The objective is
/// `1/(2n) ||y - Xw - b||² + alpha * l1_ratio * ||w||₁ + alpha * (1 - l1_ratio) / 2 * ||w||²`,
/// so `l1_ratio = 1.0` is the lasso and `l1_ratio = 0.0` is ridge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElasticNetParams {
    /// Overall regularization strength (default: 1.0).
    pub alpha: f64,
    /// Share of the L1 penalty, in `[0, 1]` (default: 1.0).
    pub l1_ratio: f64,
    /// Maximum coordinate-descent passes (default: 1000).
    pub max_iter: usize,
    /// Stop when the largest coefficient update is below `tol` times the
    /// largest coefficient (default: 1e-4).
    pub tol: f64,
    /// Fit an unpenalized intercept (default: true).
    pub fit_intercept: bool,
}

impl Default for ElasticNetParams {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            l1_ratio: 1.0,
            max_iter: 1000,
            tol: 1e-4,
            fit_intercept: true,
        }
    }
}

impl ElasticNetParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.alpha >= 0.0 && self.alpha.is_finite()) {
            return Err(ExperimentError::Configuration(format!(
                "alpha must be a non-negative number, got {}",
                self.alpha
            )));
        }
        if !(0.0..=1.0).contains(&self.l1_ratio) {
            return Err(ExperimentError::Configuration(format!(
                "l1_ratio must be in [0, 1], got {}",
                self.l1_ratio
            )));
        }
        if self.max_iter == 0 {
            return Err(ExperimentError::Configuration(
                "max_iter must be at least 1".to_string(),
            ));
        }
        if !(self.tol > 0.0 && self.tol.is_finite()) {
            return Err(ExperimentError::Configuration(format!(
                "tol must be positive, got {}",
                self.tol
            )));
        }
        Ok(())
    }
}

/// A fitted elastic-net regressor (coordinate descent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElasticNet {
    params: ElasticNetParams,
    coefficients: Array1<f64>,
    intercept: f64,
    n_iter: usize,
    converged: bool,
}

impl ElasticNet {
    /// Fit with `params`.
    pub fn fit(
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        params: ElasticNetParams,
    ) -> Result<Self> {
        let mut path = Self::fit_path(x, y, params, &[params.max_iter])?;
        path.pop().ok_or_else(|| {
            ExperimentError::fit("ElasticNet", "coordinate descent produced no estimate")
        })
    }

    /// Fit once and snapshot the estimate after each of `checkpoints` passes.
    ///
    /// `checkpoints` must be strictly increasing. The snapshot at `k` is
    /// identical to a fresh fit with `max_iter = k`, because coordinate
    /// descent is deterministic and stops early only on convergence.
    pub fn fit_path(
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        params: ElasticNetParams,
        checkpoints: &[usize],
    ) -> Result<Vec<Self>> {
        params.validate()?;
        if checkpoints.first().is_none_or(|&first| first == 0)
            || checkpoints.windows(2).any(|w| w[0] >= w[1])
        {
            return Err(ExperimentError::InvalidInput(
                "checkpoints must be positive and strictly increasing".to_string(),
            ));
        }
        if x.nrows() != y.len() || x.nrows() == 0 {
            return Err(ExperimentError::InvalidInput(format!(
                "cannot fit {} targets on {} rows",
                y.len(),
                x.nrows()
            )));
        }

        let n_features = x.ncols();
        let n = x.nrows() as f64;
        let (x_mean, y_mean) = if params.fit_intercept {
            (
                x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(n_features)),
                y.mean().unwrap_or(0.0),
            )
        } else {
            (Array1::zeros(n_features), 0.0)
        };
        let xc = &x - &x_mean.view().insert_axis(Axis(0));
        let mut residual = &y - y_mean;

        let col_norms: Vec<f64> = xc.columns().into_iter().map(|c| c.dot(&c)).collect();
        let l1 = params.alpha * params.l1_ratio * n;
        let l2 = params.alpha * (1.0 - params.l1_ratio) * n;

        let mut w = Array1::<f64>::zeros(n_features);
        let mut snapshots = Vec::with_capacity(checkpoints.len());
        let mut next = 0;
        let mut n_iter = 0;
        let mut converged = false;
        let last = checkpoints[checkpoints.len() - 1];

        let snapshot = |w: &Array1<f64>, max_iter: usize, n_iter: usize, converged: bool| Self {
            params: ElasticNetParams { max_iter, ..params },
            coefficients: w.clone(),
            intercept: y_mean - x_mean.dot(w),
            n_iter,
            converged,
        };

        while n_iter < last {
            n_iter += 1;
            let mut max_delta = 0.0f64;
            let mut max_weight = 0.0f64;
            for j in 0..n_features {
                let norm = col_norms[j];
                if norm == 0.0 {
                    continue;
                }
                let column = xc.column(j);
                let old = w[j];
                let rho = column.dot(&residual) + norm * old;
                let new = soft_threshold(rho, l1) / (norm + l2);
                if new != old {
                    residual.scaled_add(old - new, &column);
                    w[j] = new;
                }
                max_delta = max_delta.max((new - old).abs());
                max_weight = max_weight.max(new.abs());
            }

            if w.iter().any(|v| !v.is_finite()) {
                return Err(ExperimentError::fit(
                    "ElasticNet",
                    format!("coefficients became non-finite after {} passes", n_iter),
                ));
            }
            converged = max_weight == 0.0 || max_delta <= params.tol * max_weight;

            if checkpoints[next] == n_iter {
                snapshots.push(snapshot(&w, n_iter, n_iter, converged));
                next += 1;
            }
            if converged {
                break;
            }
        }

        // Checkpoints past convergence see the converged estimate.
        while next < checkpoints.len() {
            snapshots.push(snapshot(&w, checkpoints[next], n_iter, converged));
            next += 1;
        }
        Ok(snapshots)
    }

    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Array1<f64> {
        x.dot(&self.coefficients) + self.intercept
    }

    pub fn params(&self) -> &ElasticNetParams {
        &self.params
    }

    pub fn coefficients(&self) -> &Array1<f64> {
        &self.coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Coordinate-descent passes actually run.
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    pub fn converged(&self) -> bool {
        self.converged
    }
}

fn soft_threshold(value: f64, threshold: f64) -> f64 {
    if value > threshold {
        value - threshold
    } else if value < -threshold {
        value + threshold
    } else {
        0.0
    }
}

/// Hyperparameters a [`LinearModel`] can sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinearParam {
    MaxIter,
    Alpha,
    L1Ratio,
    Tol,
}

impl LinearParam {
    fn resolve(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "iterations" | "max_iter" => Some(Self::MaxIter),
            "alpha" => Some(Self::Alpha),
            "l1_ratio" => Some(Self::L1Ratio),
            "tol" => Some(Self::Tol),
            _ => None,
        }
    }

    fn apply(self, base: ElasticNetParams, value: f64) -> Result<ElasticNetParams> {
        let params = match self {
            Self::MaxIter => ElasticNetParams {
                max_iter: as_count("max_iter", value)?,
                ..base
            },
            Self::Alpha => ElasticNetParams { alpha: value, ..base },
            Self::L1Ratio => ElasticNetParams {
                l1_ratio: value,
                ..base
            },
            Self::Tol => ElasticNetParams { tol: value, ..base },
        };
        params.validate()?;
        Ok(params)
    }
}

/// Elastic-net model whose validation curve is measured by k-fold CV.
///
/// At each sweep value the estimator is trained on every k-1 fold union
/// and scored on the held-out fold; the recorded train and test errors
/// are fold means. Folds are contiguous and unshuffled. After the sweep the
/// estimator is refit on all rows at the last sweep value for
/// [`predict`](Model::predict).
///
/// Hitting the iteration limit before convergence is expected while
/// sweeping `iterations` and is only logged at `debug`.
#[derive(Debug)]
pub struct LinearModel {
    name: String,
    params: ElasticNetParams,
    cv_folds: usize,
    span: Span,
    metrics: Metrics,
    sweep: Option<Sweep>,
    estimator: Option<ElasticNet>,
}

impl Default for LinearModel {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearModel {
    /// A lasso (`alpha = 1.0`, `l1_ratio = 1.0`) with 5-fold validation.
    pub fn new() -> Self {
        Self::with_params(ElasticNetParams::default())
    }

    pub fn with_params(params: ElasticNetParams) -> Self {
        Self {
            name: "LinearModel".to_string(),
            params,
            cv_folds: 5,
            span: info_span!("model", name = "LinearModel"),
            metrics: Metrics::default(),
            sweep: None,
            estimator: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn params(&self) -> &ElasticNetParams {
        &self.params
    }

    pub fn cv_folds(&self) -> usize {
        self.cv_folds
    }

    /// The estimator refit on all rows, once fitted.
    pub fn estimator(&self) -> Option<&ElasticNet> {
        self.estimator.as_ref()
    }

    /// One estimator per sweep setting, trained on the same rows.
    fn fit_sweep(
        &self,
        param: LinearParam,
        settings: &[ElasticNetParams],
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
    ) -> Result<Vec<ElasticNet>> {
        if param != LinearParam::MaxIter {
            return settings.iter().map(|&p| ElasticNet::fit(x, y, p)).collect();
        }

        let mut checkpoints: Vec<usize> = settings.iter().map(|p| p.max_iter).collect();
        checkpoints.sort_unstable();
        checkpoints.dedup();
        let path = ElasticNet::fit_path(x, y, self.params, &checkpoints)?;
        settings
            .iter()
            .map(|p| {
                checkpoints
                    .binary_search(&p.max_iter)
                    .map(|i| path[i].clone())
                    .map_err(|_| {
                        ExperimentError::fit(&self.name, "missing checkpoint on the iteration path")
                    })
            })
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    fn score_fold(
        &self,
        fold: &Fold,
        param: LinearParam,
        settings: &[ElasticNetParams],
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        eval_metrics: &[Metric],
        sums: &mut [Vec<(f64, f64)>],
    ) -> Result<()> {
        let (x_train, y_train, x_test, y_test) = fold.select(x, y);
        let estimators = self.fit_sweep(param, settings, x_train.view(), y_train.view())?;
        for (position, estimator) in estimators.iter().enumerate() {
            if !estimator.converged() {
                debug!(
                    parent: &self.span,
                    max_iter = estimator.params().max_iter,
                    "Coordinate descent did not converge"
                );
            }
            let train_pred = estimator.predict(x_train.view());
            let test_pred = estimator.predict(x_test.view());
            for (m, metric) in eval_metrics.iter().enumerate() {
                let train = metric.score(y_train.view(), train_pred.view());
                let test = metric.score(y_test.view(), test_pred.view());
                if !train.is_finite() || !test.is_finite() {
                    return Err(ExperimentError::fit(
                        &self.name,
                        format!("{} is not finite at sweep position {}", metric, position),
                    ));
                }
                sums[position][m].0 += train;
                sums[position][m].1 += test;
            }
        }
        Ok(())
    }
}

impl Model for LinearModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_param(&self, param_name: &str) -> bool {
        LinearParam::resolve(param_name).is_some()
    }

    fn fit(
        &mut self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        param_range: &[f64],
        param_name: &str,
        eval_metrics: &[Metric],
    ) -> Result<()> {
        check_training_inputs(&self.name, x, y, param_range, eval_metrics)?;
        let param = LinearParam::resolve(param_name).ok_or_else(|| {
            ExperimentError::Configuration(format!(
                "{} cannot sweep '{}'. Valid values are: iterations, max_iter, alpha, l1_ratio, tol",
                self.name, param_name
            ))
        })?;
        let settings = param_range
            .iter()
            .map(|&value| param.apply(self.params, value))
            .collect::<Result<Vec<_>>>()?;
        let folds = validation::kfold(x.nrows(), self.cv_folds)?;

        info!(
            parent: &self.span,
            param = param_name,
            values = param_range.len(),
            folds = folds.len(),
            "Computing validation curve"
        );

        // Greater-is-better score sums per sweep position and metric.
        let mut sums = vec![vec![(0.0, 0.0); eval_metrics.len()]; settings.len()];
        for (k, fold) in folds.iter().enumerate() {
            self.score_fold(fold, param, &settings, x, y, eval_metrics, &mut sums)?;
            debug!(parent: &self.span, fold = k + 1, of = folds.len(), "Fold scored");
        }

        let n_folds = folds.len() as f64;
        let mut metrics = Metrics::new(eval_metrics);
        for position_sums in &sums {
            for (&metric, &(train, test)) in eval_metrics.iter().zip(position_sums) {
                metrics.push(metric, -(train / n_folds), -(test / n_folds));
            }
        }

        let last = settings[settings.len() - 1];
        let estimator = ElasticNet::fit(x, y, last)?;
        info!(
            parent: &self.span,
            n_iter = estimator.n_iter(),
            converged = estimator.converged(),
            "Final estimator refit on all rows"
        );

        self.metrics = metrics;
        self.sweep = Some(Sweep {
            param_name: param_name.to_string(),
            param_range: param_range.to_vec(),
        });
        self.estimator = Some(estimator);
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        let estimator = self
            .estimator
            .as_ref()
            .ok_or_else(|| ExperimentError::NotFitted(self.name.clone()))?;
        check_prediction_inputs(&self.name, x, estimator.coefficients().len())?;
        Ok(estimator.predict(x))
    }

    fn is_fitted(&self) -> bool {
        self.estimator.is_some()
    }

    fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    fn sweep(&self) -> Option<&Sweep> {
        self.sweep.as_ref()
    }

    fn to_artifact(&self) -> Result<serde_json::Value> {
        #[derive(Serialize)]
        struct Artifact<'a> {
            name: &'a str,
            family: &'static str,
            cv_folds: usize,
            params: &'a ElasticNetParams,
            estimator: Option<&'a ElasticNet>,
            sweep: Option<&'a Sweep>,
            metrics: &'a Metrics,
        }

        Ok(serde_json::to_value(Artifact {
            name: &self.name,
            family: "elastic_net",
            cv_folds: self.cv_folds,
            params: &self.params,
            estimator: self.estimator.as_ref(),
            sweep: self.sweep.as_ref(),
            metrics: &self.metrics,
        })?)
    }

    fn set_cv_folds(&mut self, folds: usize) {
        self.cv_folds = folds;
    }
}
