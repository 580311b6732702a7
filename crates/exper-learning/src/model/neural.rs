//! Feed-forward neural regressor with dropout and L2 regularization.

use super::validation;
use super::{Model, as_count, check_prediction_inputs, check_training_inputs};
use crate::error::{ExperimentError, Result};
use crate::metrics::Metric;
use crate::types::{Metrics, Sweep};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, Zip};
use rand::seq::SliceRandom;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{Span, debug, info, info_span};

/// Hyperparameters of [`Mlp`] training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlpParams {
    /// Units per hidden layer (default: 100, 1000, 100).
    pub hidden_layers: Vec<usize>,
    /// L2 penalty per hidden layer (default: 0.01, 0.1, 0.01).
    pub hidden_l2: Vec<f64>,
    /// L2 penalty on the output layer (default: 0.01).
    pub output_l2: f64,
    /// Dropout rate after every hidden layer (default: 0.3).
    pub dropout: f64,
    /// Adam learning rate (default: 0.001).
    pub learning_rate: f64,
    /// Mini-batch size (default: 32).
    pub batch_size: usize,
    /// Epochs when sweeping anything other than epochs (default: 20).
    pub epochs: usize,
    /// Fraction of rows held out for validation (default: 0.3).
    pub validation_split: f64,
    /// Seed for the validation split, weight init, shuffling and dropout (default: 42).
    pub seed: u64,
}

impl Default for MlpParams {
    fn default() -> Self {
        Self {
            hidden_layers: vec![100, 1000, 100],
            hidden_l2: vec![0.01, 0.1, 0.01],
            output_l2: 0.01,
            dropout: 0.3,
            learning_rate: 0.001,
            batch_size: 32,
            epochs: 20,
            validation_split: 0.3,
            seed: 42,
        }
    }
}

impl MlpParams {
    pub fn validate(&self) -> Result<()> {
        if self.hidden_layers.is_empty() || self.hidden_layers.contains(&0) {
            return Err(ExperimentError::Configuration(
                "hidden_layers must list at least one layer of at least one unit".to_string(),
            ));
        }
        if self.hidden_l2.len() != self.hidden_layers.len() {
            return Err(ExperimentError::Configuration(format!(
                "hidden_l2 has {} entries for {} hidden layers",
                self.hidden_l2.len(),
                self.hidden_layers.len()
            )));
        }
        if self
            .hidden_l2
            .iter()
            .chain(std::iter::once(&self.output_l2))
            .any(|l2| !(*l2 >= 0.0 && l2.is_finite()))
        {
            return Err(ExperimentError::Configuration(
                "L2 penalties must be non-negative".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(ExperimentError::Configuration(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(ExperimentError::Configuration(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.batch_size == 0 || self.epochs == 0 {
            return Err(ExperimentError::Configuration(
                "batch_size and epochs must be at least 1".to_string(),
            ));
        }
        if !(self.validation_split > 0.0 && self.validation_split < 1.0) {
            return Err(ExperimentError::Configuration(format!(
                "validation_split must be in (0, 1), got {}",
                self.validation_split
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Dense {
    /// `(inputs, units)`
    weights: Array2<f64>,
    bias: Array1<f64>,
    l2: f64,
}

impl Dense {
    /// Glorot-uniform weights, zero bias.
    fn glorot(inputs: usize, units: usize, l2: f64, rng: &mut StdRng) -> Self {
        let limit = (6.0 / (inputs + units) as f64).sqrt();
        Self {
            weights: Array2::from_shape_fn((inputs, units), |_| rng.gen_range(-limit..limit)),
            bias: Array1::zeros(units),
            l2,
        }
    }

    fn forward(&self, input: ArrayView2<'_, f64>) -> Array2<f64> {
        input.dot(&self.weights) + &self.bias
    }
}

/// A trained multi-layer perceptron (ReLU hidden layers, linear output).
///
/// Targets are standardized for training; [`predict`](Self::predict)
/// returns values in the original units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mlp {
    layers: Vec<Dense>,
    target_mean: f64,
    target_scale: f64,
    epochs_trained: usize,
}

impl Mlp {
    fn new(
        n_inputs: usize,
        params: &MlpParams,
        target_mean: f64,
        target_scale: f64,
        rng: &mut StdRng,
    ) -> Self {
        let mut layers = Vec::with_capacity(params.hidden_layers.len() + 1);
        let mut inputs = n_inputs;
        for (&units, &l2) in params.hidden_layers.iter().zip(&params.hidden_l2) {
            layers.push(Dense::glorot(inputs, units, l2, rng));
            inputs = units;
        }
        layers.push(Dense::glorot(inputs, 1, params.output_l2, rng));
        Self {
            layers,
            target_mean,
            target_scale,
            epochs_trained: 0,
        }
    }

    /// Inference-mode forward pass (no dropout).
    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Array1<f64> {
        let last = self.layers.len() - 1;
        let mut activation = x.to_owned();
        for (i, layer) in self.layers.iter().enumerate() {
            let z = layer.forward(activation.view());
            activation = if i < last { z.mapv(relu) } else { z };
        }
        activation
            .column(0)
            .mapv(|v| v * self.target_scale + self.target_mean)
    }

    pub fn n_inputs(&self) -> usize {
        self.layers[0].weights.nrows()
    }

    /// Units per layer, output layer included.
    pub fn layer_sizes(&self) -> Vec<usize> {
        self.layers.iter().map(|l| l.weights.ncols()).collect()
    }

    pub fn epochs_trained(&self) -> usize {
        self.epochs_trained
    }

    fn penalty(&self) -> f64 {
        self.layers
            .iter()
            .filter(|l| l.l2 > 0.0)
            .map(|l| l.l2 * l.weights.iter().map(|w| w * w).sum::<f64>())
            .sum()
    }

    /// One Adam step on a mini-batch; returns the regularized loss.
    fn train_batch(
        &mut self,
        adam: &mut Adam,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        dropout: f64,
        rng: &mut StdRng,
    ) -> f64 {
        let n_layers = self.layers.len();
        let keep = 1.0 - dropout;

        let mut activations = Vec::with_capacity(n_layers);
        let mut pre_activations = Vec::with_capacity(n_layers - 1);
        let mut masks = Vec::with_capacity(n_layers - 1);
        activations.push(x.to_owned());
        for (i, layer) in self.layers[..n_layers - 1].iter().enumerate() {
            let z = layer.forward(activations[i].view());
            let mut a = z.mapv(relu);
            let mask = if dropout > 0.0 {
                let mask = Array2::from_shape_fn(a.raw_dim(), |_| {
                    if rng.r#gen::<f64>() < keep { 1.0 / keep } else { 0.0 }
                });
                a *= &mask;
                Some(mask)
            } else {
                None
            };
            pre_activations.push(z);
            masks.push(mask);
            activations.push(a);
        }

        let output = self.layers[n_layers - 1].forward(activations[n_layers - 1].view());
        let residual = &output.column(0) - &y;
        let batch = y.len() as f64;
        let loss = residual.iter().map(|r| r * r).sum::<f64>() / batch + self.penalty();

        let mut delta = (residual * (2.0 / batch)).insert_axis(Axis(1));
        let mut grad_w = Vec::with_capacity(n_layers);
        let mut grad_b = Vec::with_capacity(n_layers);
        for l in (0..n_layers).rev() {
            let layer = &self.layers[l];
            let mut gw = activations[l].t().dot(&delta);
            if layer.l2 > 0.0 {
                gw.scaled_add(2.0 * layer.l2, &layer.weights);
            }
            grad_b.push(delta.sum_axis(Axis(0)));
            grad_w.push(gw);
            if l > 0 {
                let mut back = delta.dot(&layer.weights.t());
                if let Some(mask) = &masks[l - 1] {
                    back *= mask;
                }
                Zip::from(&mut back)
                    .and(&pre_activations[l - 1])
                    .for_each(|d, &z| {
                        if z <= 0.0 {
                            *d = 0.0;
                        }
                    });
                delta = back;
            }
        }
        grad_w.reverse();
        grad_b.reverse();
        adam.step(self, &grad_w, &grad_b);
        loss
    }
}

fn relu(v: f64) -> f64 {
    v.max(0.0)
}

/// Adam optimizer state, one moment pair per parameter tensor.
struct Adam {
    learning_rate: f64,
    t: i32,
    m_w: Vec<Array2<f64>>,
    v_w: Vec<Array2<f64>>,
    m_b: Vec<Array1<f64>>,
    v_b: Vec<Array1<f64>>,
}

impl Adam {
    const BETA1: f64 = 0.9;
    const BETA2: f64 = 0.999;
    const EPSILON: f64 = 1e-7;

    fn new(network: &Mlp, learning_rate: f64) -> Self {
        let m_w: Vec<Array2<f64>> = network
            .layers
            .iter()
            .map(|l| Array2::zeros(l.weights.raw_dim()))
            .collect();
        let m_b: Vec<Array1<f64>> = network
            .layers
            .iter()
            .map(|l| Array1::zeros(l.bias.raw_dim()))
            .collect();
        Self {
            learning_rate,
            t: 0,
            v_w: m_w.clone(),
            v_b: m_b.clone(),
            m_w,
            m_b,
        }
    }

    fn step(&mut self, network: &mut Mlp, grad_w: &[Array2<f64>], grad_b: &[Array1<f64>]) {
        self.t += 1;
        let lr = self.learning_rate;
        let c1 = 1.0 - Self::BETA1.powi(self.t);
        let c2 = 1.0 - Self::BETA2.powi(self.t);
        let update = move |p: &mut f64, &g: &f64, m: &mut f64, v: &mut f64| {
            *m = Self::BETA1 * *m + (1.0 - Self::BETA1) * g;
            *v = Self::BETA2 * *v + (1.0 - Self::BETA2) * g * g;
            *p -= lr * (*m / c1) / ((*v / c2).sqrt() + Self::EPSILON);
        };
        for (l, layer) in network.layers.iter_mut().enumerate() {
            Zip::from(&mut layer.weights)
                .and(&grad_w[l])
                .and(&mut self.m_w[l])
                .and(&mut self.v_w[l])
                .for_each(update);
            Zip::from(&mut layer.bias)
                .and(&grad_b[l])
                .and(&mut self.m_b[l])
                .and(&mut self.v_b[l])
                .for_each(update);
        }
    }
}

/// Hyperparameters a [`NeuralNetwork`] can sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NeuralParam {
    Epochs,
    LearningRate,
    Dropout,
    BatchSize,
}

impl NeuralParam {
    fn resolve(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "iterations" | "epochs" => Some(Self::Epochs),
            "learning_rate" => Some(Self::LearningRate),
            "dropout" => Some(Self::Dropout),
            "batch_size" => Some(Self::BatchSize),
            _ => None,
        }
    }

    fn apply(self, base: &MlpParams, value: f64) -> Result<MlpParams> {
        let mut params = base.clone();
        match self {
            Self::Epochs => params.epochs = as_count("epochs", value)?,
            Self::LearningRate => params.learning_rate = value,
            Self::Dropout => params.dropout = value,
            Self::BatchSize => params.batch_size = as_count("batch_size", value)?,
        }
        params.validate()?;
        Ok(params)
    }
}

/// Neural regressor whose validation curve comes from a held-out split.
///
/// A shuffled `validation_split` share of the rows (seeded) is held out;
/// the network trains on the rest and both sides are scored in inference
/// mode. Sweeping `iterations`/`epochs` trains a single network up to the
/// largest requested epoch and records metrics at each requested epoch.
/// Any other hyperparameter trains a fresh network per value for
/// [`MlpParams::epochs`] epochs. [`predict`](Model::predict) uses the
/// network from the last training run: the longest-trained one for an
/// epoch sweep, otherwise the one for the last sweep value.
#[derive(Debug)]
pub struct NeuralNetwork {
    name: String,
    params: MlpParams,
    span: Span,
    metrics: Metrics,
    sweep: Option<Sweep>,
    network: Option<Mlp>,
}

impl Default for NeuralNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl NeuralNetwork {
    pub fn new() -> Self {
        Self::with_params(MlpParams::default())
    }

    pub fn with_params(params: MlpParams) -> Self {
        Self {
            name: "NeuralNetwork".to_string(),
            params,
            span: info_span!("model", name = "NeuralNetwork"),
            metrics: Metrics::default(),
            sweep: None,
            network: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn params(&self) -> &MlpParams {
        &self.params
    }

    pub fn network(&self) -> Option<&Mlp> {
        self.network.as_ref()
    }

    /// Train a fresh network for `epochs`, calling `on_epoch` after each.
    fn train<F>(
        &self,
        params: &MlpParams,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        epochs: usize,
        mut on_epoch: F,
    ) -> Result<Mlp>
    where
        F: FnMut(usize, &Mlp) -> Result<()>,
    {
        let mut rng = StdRng::seed_from_u64(params.seed);
        let mean = y.mean().unwrap_or(0.0);
        let std = y.std(0.0);
        let scale = if std > 0.0 && std.is_finite() { std } else { 1.0 };
        let y_scaled = y.mapv(|v| (v - mean) / scale);

        let mut network = Mlp::new(x.ncols(), params, mean, scale, &mut rng);
        let mut adam = Adam::new(&network, params.learning_rate);
        let mut order: Vec<usize> = (0..x.nrows()).collect();

        for epoch in 1..=epochs {
            order.shuffle(&mut rng);
            let mut loss_sum = 0.0;
            let mut batches = 0usize;
            for batch in order.chunks(params.batch_size) {
                let xb = x.select(Axis(0), batch);
                let yb = y_scaled.select(Axis(0), batch);
                let loss =
                    network.train_batch(&mut adam, xb.view(), yb.view(), params.dropout, &mut rng);
                if !loss.is_finite() {
                    return Err(ExperimentError::fit(
                        &self.name,
                        format!("training loss diverged at epoch {}", epoch),
                    ));
                }
                loss_sum += loss;
                batches += 1;
            }
            network.epochs_trained = epoch;
            debug!(
                parent: &self.span,
                epoch,
                loss = loss_sum / batches.max(1) as f64,
                "Epoch finished"
            );
            on_epoch(epoch, &network)?;
        }
        Ok(network)
    }
}

/// Train/validation errors of `network` for every metric, in order.
fn evaluate(
    model: &str,
    network: &Mlp,
    train: (ArrayView2<'_, f64>, ArrayView1<'_, f64>),
    validation: (ArrayView2<'_, f64>, ArrayView1<'_, f64>),
    eval_metrics: &[Metric],
) -> Result<Vec<(f64, f64)>> {
    let train_pred = network.predict(train.0);
    let val_pred = network.predict(validation.0);
    eval_metrics
        .iter()
        .map(|metric| {
            let scores = (
                metric.error(train.1, train_pred.view()),
                metric.error(validation.1, val_pred.view()),
            );
            if scores.0.is_finite() && scores.1.is_finite() {
                Ok(scores)
            } else {
                Err(ExperimentError::fit(
                    model,
                    format!("{} is not finite after {} epochs", metric, network.epochs_trained),
                ))
            }
        })
        .collect()
}

impl Model for NeuralNetwork {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_param(&self, param_name: &str) -> bool {
        NeuralParam::resolve(param_name).is_some()
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
        self.params.validate()?;
        let param = NeuralParam::resolve(param_name).ok_or_else(|| {
            ExperimentError::Configuration(format!(
                "{} cannot sweep '{}'. Valid values are: iterations, epochs, learning_rate, dropout, batch_size",
                self.name, param_name
            ))
        })?;
        let settings = param_range
            .iter()
            .map(|&value| param.apply(&self.params, value))
            .collect::<Result<Vec<_>>>()?;

        let fold = validation::holdout(x.nrows(), self.params.validation_split, self.params.seed)?;
        let (x_train, y_train, x_val, y_val) = fold.select(x, y);
        let train = (x_train.view(), y_train.view());
        let val = (x_val.view(), y_val.view());

        info!(
            parent: &self.span,
            param = param_name,
            values = param_range.len(),
            train_rows = fold.train.len(),
            validation_rows = fold.test.len(),
            "Computing validation curve"
        );

        let mut metrics = Metrics::new(eval_metrics);
        let network = if param == NeuralParam::Epochs {
            let max_epochs = settings.iter().map(|p| p.epochs).max().unwrap_or(1);
            let requested: Vec<usize> = settings.iter().map(|p| p.epochs).collect();
            let mut at_epoch: BTreeMap<usize, Vec<(f64, f64)>> = BTreeMap::new();
            let network = self.train(&self.params, train.0, train.1, max_epochs, |epoch, net| {
                if requested.contains(&epoch) {
                    at_epoch.insert(epoch, evaluate(&self.name, net, train, val, eval_metrics)?);
                }
                Ok(())
            })?;
            for epochs in &requested {
                let scores = at_epoch.get(epochs).ok_or_else(|| {
                    ExperimentError::fit(&self.name, format!("no scores recorded at epoch {}", epochs))
                })?;
                for (&metric, &(train_err, val_err)) in eval_metrics.iter().zip(scores) {
                    metrics.push(metric, train_err, val_err);
                }
            }
            network
        } else {
            let mut last = None;
            for (position, params) in settings.iter().enumerate() {
                let network = self.train(params, train.0, train.1, params.epochs, |_, _| Ok(()))?;
                let scores = evaluate(&self.name, &network, train, val, eval_metrics)?;
                for (&metric, &(train_err, val_err)) in eval_metrics.iter().zip(&scores) {
                    metrics.push(metric, train_err, val_err);
                }
                debug!(parent: &self.span, position, value = param_range[position], "Sweep value trained");
                last = Some(network);
            }
            last.ok_or_else(|| ExperimentError::fit(&self.name, "no network was trained"))?
        };

        info!(
            parent: &self.span,
            epochs = network.epochs_trained(),
            "Neural network trained"
        );
        self.metrics = metrics;
        self.sweep = Some(Sweep {
            param_name: param_name.to_string(),
            param_range: param_range.to_vec(),
        });
        self.network = Some(network);
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        let network = self
            .network
            .as_ref()
            .ok_or_else(|| ExperimentError::NotFitted(self.name.clone()))?;
        check_prediction_inputs(&self.name, x, network.n_inputs())?;
        Ok(network.predict(x))
    }

    fn is_fitted(&self) -> bool {
        self.network.is_some()
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
            params: &'a MlpParams,
            network: Option<&'a Mlp>,
            sweep: Option<&'a Sweep>,
            metrics: &'a Metrics,
        }

        Ok(serde_json::to_value(Artifact {
            name: &self.name,
            family: "mlp",
            params: &self.params,
            network: self.network.as_ref(),
            sweep: self.sweep.as_ref(),
            metrics: &self.metrics,
        })?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn small_params() -> MlpParams {
        MlpParams {
            hidden_layers: vec![16],
            hidden_l2: vec![0.0],
            dropout: 0.0,
            learning_rate: 0.01,
            batch_size: 16,
            epochs: 5,
            ..MlpParams::default()
        }
    }

    fn data(n: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 2), |(i, j)| {
            let t = i as f64;
            if j == 0 { (t * 0.37).sin() } else { (t * 0.11).cos() }
        });
        let y = x.column(0).mapv(|v| 30.0 * v) - x.column(1).mapv(|v| 20.0 * v) + 100.0;
        (x, y)
    }

    #[test]
    fn test_default_params_match_reference_architecture() {
        let params = MlpParams::default();
        assert_eq!(params.hidden_layers, vec![100, 1000, 100]);
        assert_eq!(params.hidden_l2, vec![0.01, 0.1, 0.01]);
        assert_eq!(params.output_l2, 0.01);
        assert_eq!(params.dropout, 0.3);
        assert_eq!(params.validation_split, 0.3);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_invalid_params() {
        let mismatched = MlpParams {
            hidden_l2: vec![0.01],
            ..MlpParams::default()
        };
        assert!(mismatched.validate().is_err());

        let dropout = MlpParams {
            dropout: 1.0,
            ..MlpParams::default()
        };
        assert!(dropout.validate().unwrap_err().is_configuration());
    }

    #[test]
    fn test_layer_sizes() {
        let mut rng = StdRng::seed_from_u64(0);
        let network = Mlp::new(4, &MlpParams::default(), 0.0, 1.0, &mut rng);
        assert_eq!(network.n_inputs(), 4);
        assert_eq!(network.layer_sizes(), vec![100, 1000, 100, 1]);
    }

    #[test]
    fn test_param_aliases() {
        let model = NeuralNetwork::new();
        assert!(model.supports_param("iterations"));
        assert!(model.supports_param("epochs"));
        assert!(model.supports_param("learning_rate"));
        assert!(!model.supports_param("alpha"));
    }

    #[test]
    fn test_epoch_sweep_records_every_requested_epoch() {
        let (x, y) = data(200);
        let mut model = NeuralNetwork::with_params(small_params());
        let range: Vec<f64> = (1..=30).map(f64::from).collect();
        let metrics = [Metric::Rmse, Metric::Mae];
        model.fit(x.view(), y.view(), &range, "iterations", &metrics).unwrap();

        let rmse = model.metrics().curve(Metric::Rmse).unwrap();
        assert_eq!(rmse.train.len(), 30);
        assert_eq!(rmse.test.len(), 30);
        assert!(rmse.train.iter().chain(&rmse.test).all(|&v| v >= 0.0));
        assert!(rmse.test[29] < rmse.test[0]);
        assert_eq!(model.network().unwrap().epochs_trained(), 30);
    }

    #[test]
    fn test_epoch_snapshot_matches_shorter_training() {
        let (x, y) = data(120);
        let mut swept = NeuralNetwork::with_params(small_params());
        swept.fit(x.view(), y.view(), &[3.0, 1.0], "epochs", &[Metric::Mse]).unwrap();

        let mut single = NeuralNetwork::with_params(small_params());
        single.fit(x.view(), y.view(), &[1.0], "epochs", &[Metric::Mse]).unwrap();

        let swept_curve = swept.metrics().curve(Metric::Mse).unwrap();
        let single_curve = single.metrics().curve(Metric::Mse).unwrap();
        assert_eq!(swept_curve.test[1], single_curve.test[0]);
    }

    #[test]
    fn test_learning_rate_sweep_trains_per_value() {
        let (x, y) = data(100);
        let mut model = NeuralNetwork::with_params(small_params());
        model
            .fit(x.view(), y.view(), &[0.001, 0.01], "learning_rate", &[Metric::Mae])
            .unwrap();
        assert_eq!(model.metrics().len(), 2);
        assert_eq!(model.network().unwrap().epochs_trained(), 5);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (x, y) = data(80);
        let params = MlpParams {
            dropout: 0.3,
            ..small_params()
        };
        let mut a = NeuralNetwork::with_params(params.clone());
        let mut b = NeuralNetwork::with_params(params);
        a.fit(x.view(), y.view(), &[2.0], "epochs", &[Metric::Mse]).unwrap();
        b.fit(x.view(), y.view(), &[2.0], "epochs", &[Metric::Mse]).unwrap();
        assert_eq!(a.metrics(), b.metrics());
        assert_eq!(
            a.predict(x.view()).unwrap(),
            b.predict(x.view()).unwrap()
        );
    }

    #[test]
    fn test_divergence_is_a_fit_error() {
        let (x, y) = data(60);
        let params = MlpParams {
            learning_rate: 1e300,
            ..small_params()
        };
        let mut model = NeuralNetwork::with_params(params);
        let err = model
            .fit(x.view(), y.view(), &[5.0], "epochs", &[Metric::Mse])
            .unwrap_err();
        assert!(err.is_fit());
        assert!(!model.is_fitted());
    }

    #[test]
    fn test_predict_before_fit() {
        let model = NeuralNetwork::new();
        let err = model.predict(array![[1.0]].view()).unwrap_err();
        assert_eq!(err.error_code(), "NOT_FITTED");
    }

    #[test]
    fn test_invalid_sweep_value_fails_before_training() {
        let (x, y) = data(40);
        let mut model = NeuralNetwork::with_params(small_params());
        let err = model
            .fit(x.view(), y.view(), &[0.5, 1.5], "dropout", &[Metric::Mse])
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(model.metrics().is_empty());
    }
}
