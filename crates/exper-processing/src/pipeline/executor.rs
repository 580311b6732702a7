//! Fitting and applying a column transformer.

use super::builder::{ColumnSelection, REMAINDER_NAME, Remainder, TransformerSpec};
use crate::dataset::Dataset;
use crate::error::{ProcessingError, Result, ResultExt};
use crate::imputers::{MedianImputer, MostFrequentImputer};
use crate::transform::{ClusterSimilarity, OneHotEncoder, StandardScaler};
use crate::utils::DtypeCategory;
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{Span, debug, info, warn};

/// A sub-transform with its learned state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FittedStep {
    Ratio {
        name: String,
        numerator: String,
        denominator: String,
        imputer: MedianImputer,
        scaler: StandardScaler,
    },
    Log {
        name: String,
        columns: Vec<String>,
        imputer: MedianImputer,
        scaler: StandardScaler,
    },
    ClusterSimilarity {
        name: String,
        columns: Vec<String>,
        imputer: MedianImputer,
        similarity: ClusterSimilarity,
    },
    OneHot {
        name: String,
        columns: Vec<String>,
        imputer: MostFrequentImputer,
        encoder: OneHotEncoder,
    },
    Remainder {
        columns: Vec<String>,
        imputer: MedianImputer,
        scaler: StandardScaler,
    },
}

impl FittedStep {
    fn fit(spec: &TransformerSpec, data: &Dataset, categorical: &[String]) -> Result<Self> {
        let step = match spec {
            TransformerSpec::Ratio {
                name,
                numerator,
                denominator,
            } => {
                let inputs = vec![numerator.clone(), denominator.clone()];
                let raw = read_numeric(data, &inputs)?;
                let imputer = MedianImputer::fit(&inputs, &raw)?;
                let filled = imputer.transform(&raw)?;
                let ratio = divide(&filled[0], &filled[1], denominator)?;
                let scaler = StandardScaler::fit(&[ratio])?;
                FittedStep::Ratio {
                    name: name.clone(),
                    numerator: numerator.clone(),
                    denominator: denominator.clone(),
                    imputer,
                    scaler,
                }
            }
            TransformerSpec::Log { name, columns } => {
                let raw = read_numeric(data, columns)?;
                let imputer = MedianImputer::fit(columns, &raw)?;
                let logged = log_columns(imputer.transform(&raw)?, columns)?;
                let scaler = StandardScaler::fit(&logged)?;
                FittedStep::Log {
                    name: name.clone(),
                    columns: columns.clone(),
                    imputer,
                    scaler,
                }
            }
            TransformerSpec::ClusterSimilarity {
                name,
                columns,
                n_clusters,
                gamma,
                random_state,
            } => {
                let raw = read_numeric(data, columns)?;
                let imputer = MedianImputer::fit(columns, &raw)?;
                let matrix = to_matrix(&imputer.transform(&raw)?, data.height());
                let mut similarity = ClusterSimilarity::new(*n_clusters, *gamma, *random_state);
                similarity.fit(matrix.view())?;
                FittedStep::ClusterSimilarity {
                    name: name.clone(),
                    columns: columns.clone(),
                    imputer,
                    similarity,
                }
            }
            TransformerSpec::OneHot { name, columns } => {
                let columns = match columns {
                    ColumnSelection::Named(columns) => columns.clone(),
                    ColumnSelection::AllCategorical => categorical.to_vec(),
                };
                let raw = read_strings(data, &columns)?;
                let imputer = MostFrequentImputer::fit(&columns, &raw)?;
                let encoder = OneHotEncoder::fit(&columns, &imputer.transform(&raw)?)?;
                FittedStep::OneHot {
                    name: name.clone(),
                    columns,
                    imputer,
                    encoder,
                }
            }
        };
        Ok(step)
    }

    fn fit_remainder(columns: Vec<String>, data: &Dataset) -> Result<Self> {
        let raw = read_numeric(data, &columns)?;
        let imputer = MedianImputer::fit(&columns, &raw)?;
        let scaler = StandardScaler::fit(&imputer.transform(&raw)?)?;
        Ok(FittedStep::Remainder {
            columns,
            imputer,
            scaler,
        })
    }

    fn prefix(&self) -> &str {
        match self {
            Self::Ratio { name, .. }
            | Self::Log { name, .. }
            | Self::ClusterSimilarity { name, .. }
            | Self::OneHot { name, .. } => name,
            Self::Remainder { .. } => REMAINDER_NAME,
        }
    }

    /// Output names without the `<step>__` prefix.
    fn raw_output_names(&self) -> Vec<String> {
        match self {
            Self::Ratio { .. } => vec!["ratio".to_string()],
            Self::Log { columns, .. } | Self::Remainder { columns, .. } => columns.clone(),
            Self::ClusterSimilarity { similarity, .. } => similarity.output_names(),
            Self::OneHot { encoder, .. } => encoder.output_names(),
        }
    }

    /// Fully qualified output column names.
    pub fn output_names(&self) -> Vec<String> {
        let prefix = self.prefix();
        self.raw_output_names()
            .into_iter()
            .map(|output| format!("{}__{}", prefix, output))
            .collect()
    }

    /// Input columns this step reads.
    pub fn input_columns(&self) -> Vec<String> {
        match self {
            Self::Ratio {
                numerator,
                denominator,
                ..
            } => vec![numerator.clone(), denominator.clone()],
            Self::Log { columns, .. }
            | Self::ClusterSimilarity { columns, .. }
            | Self::OneHot { columns, .. }
            | Self::Remainder { columns, .. } => columns.clone(),
        }
    }

    /// Apply the frozen state to `data`, returning one vector per output column.
    fn apply(&self, data: &Dataset) -> Result<Vec<Vec<f64>>> {
        match self {
            Self::Ratio {
                numerator,
                denominator,
                imputer,
                scaler,
                ..
            } => {
                let inputs = [numerator.clone(), denominator.clone()];
                let filled = imputer.transform(&read_numeric(data, &inputs)?)?;
                let ratio = divide(&filled[0], &filled[1], denominator)?;
                scaler.transform(vec![ratio])
            }
            Self::Log {
                columns,
                imputer,
                scaler,
                ..
            } => {
                let filled = imputer.transform(&read_numeric(data, columns)?)?;
                scaler.transform(log_columns(filled, columns)?)
            }
            Self::ClusterSimilarity {
                columns,
                imputer,
                similarity,
                ..
            } => {
                let filled = imputer.transform(&read_numeric(data, columns)?)?;
                let similarities = similarity.transform(to_matrix(&filled, data.height()).view())?;
                Ok(similarities
                    .columns()
                    .into_iter()
                    .map(|column| column.to_vec())
                    .collect())
            }
            Self::OneHot {
                columns,
                imputer,
                encoder,
                ..
            } => {
                let filled = imputer.transform(&read_strings(data, columns)?)?;
                encoder.transform(&filled)
            }
            Self::Remainder {
                columns,
                imputer,
                scaler,
            } => scaler.transform(imputer.transform(&read_numeric(data, columns)?)?),
        }
    }
}

/// Learned state of a [`ColumnTransformer`](super::ColumnTransformer).
///
/// Immutable once fitted; serializable so it can be persisted with the
/// models that consume its output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedColumnTransformer {
    steps: Vec<FittedStep>,
    target: Option<String>,
    feature_names: Vec<String>,
    dropped: Vec<String>,
}

impl FittedColumnTransformer {
    pub(crate) fn fit(
        specs: &[TransformerSpec],
        remainder: Remainder,
        data: &Dataset,
        span: &Span,
    ) -> Result<Self> {
        let target = data.target().map(str::to_string);
        let features = data.feature_names();

        for spec in specs {
            for input in spec.named_inputs() {
                if Some(input) == target.as_deref() {
                    return Err(ProcessingError::InvalidConfig(format!(
                        "step '{}' reads the target column '{}'",
                        spec.name(),
                        input
                    )));
                }
                if !data.has_column(input) {
                    return Err(ProcessingError::ColumnNotFound(input.to_string()));
                }
            }
        }

        let mut categorical = Vec::new();
        for name in &features {
            if data.column_category(name)? == DtypeCategory::String {
                categorical.push(name.clone());
            }
        }

        let mut steps = Vec::with_capacity(specs.len() + 1);
        for spec in specs {
            let step = FittedStep::fit(spec, data, &categorical)
                .context(format!("fitting step '{}'", spec.name()))?;
            debug!(parent: span, step = spec.name(), outputs = step.output_names().len(), "Step fitted");
            steps.push(step);
        }

        let referenced: HashSet<String> = steps.iter().flat_map(|s| s.input_columns()).collect();
        let mut remainder_columns = Vec::new();
        let mut dropped = Vec::new();
        for name in features.into_iter().filter(|n| !referenced.contains(n)) {
            match (remainder, data.column_category(&name)?) {
                (Remainder::Scale, DtypeCategory::Numeric) => remainder_columns.push(name),
                _ => dropped.push(name),
            }
        }
        if !dropped.is_empty() {
            warn!(parent: span, columns = ?dropped, "Columns not used by any step are dropped");
        }
        if !remainder_columns.is_empty() {
            steps.push(
                FittedStep::fit_remainder(remainder_columns, data).context("fitting remainder")?,
            );
        }

        let feature_names: Vec<String> = steps.iter().flat_map(|s| s.output_names()).collect();
        let mut unique = HashSet::new();
        for name in &feature_names {
            if !unique.insert(name.as_str()) || Some(name.as_str()) == target.as_deref() {
                return Err(ProcessingError::DuplicateColumn(name.clone()));
            }
        }

        info!(
            parent: span,
            rows = data.height(),
            steps = steps.len(),
            features_out = feature_names.len(),
            "Preprocessor fitted"
        );

        Ok(Self {
            steps,
            target,
            feature_names,
            dropped,
        })
    }

    /// Apply every fitted step to `data`.
    ///
    /// The output keeps the row count, holds the derived feature columns in
    /// step order and carries the target column through unchanged when
    /// `data` has one.
    pub fn transform(&self, data: &Dataset) -> Result<Dataset> {
        let mut columns: Vec<Column> = Vec::with_capacity(self.feature_names.len() + 1);
        for step in &self.steps {
            let outputs = step
                .apply(data)
                .context(format!("transforming step '{}'", step.prefix()))?;
            for (name, values) in step.output_names().into_iter().zip(outputs) {
                columns.push(Column::new(name.into(), values));
            }
        }

        match data.target() {
            Some(target) => {
                let target_column = data
                    .frame()
                    .column(target)
                    .map_err(|_| ProcessingError::ColumnNotFound(target.to_string()))?
                    .clone();
                columns.push(target_column);
                let frame = DataFrame::new(columns)?;
                Dataset::new(frame, target)
            }
            None => Ok(Dataset::unlabeled(DataFrame::new(columns)?)),
        }
    }

    /// Output feature names in column order.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Target column seen at fit time.
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Feature columns that no step used.
    pub fn dropped_columns(&self) -> &[String] {
        &self.dropped
    }

    pub fn steps(&self) -> &[FittedStep] {
        &self.steps
    }
}

fn read_numeric(data: &Dataset, columns: &[String]) -> Result<Vec<Vec<Option<f64>>>> {
    columns.iter().map(|c| data.numeric_column(c)).collect()
}

fn read_strings(data: &Dataset, columns: &[String]) -> Result<Vec<Vec<Option<String>>>> {
    columns.iter().map(|c| data.string_column(c)).collect()
}

fn divide(numerator: &[f64], denominator: &[f64], denominator_name: &str) -> Result<Vec<f64>> {
    numerator
        .iter()
        .zip(denominator)
        .enumerate()
        .map(|(row, (&n, &d))| {
            if d == 0.0 {
                Err(ProcessingError::InvalidData(format!(
                    "'{}' is zero at row {}",
                    denominator_name, row
                )))
            } else {
                Ok(n / d)
            }
        })
        .collect()
}

fn log_columns(columns: Vec<Vec<f64>>, names: &[String]) -> Result<Vec<Vec<f64>>> {
    columns
        .into_iter()
        .zip(names)
        .map(|(values, name)| {
            values
                .into_iter()
                .enumerate()
                .map(|(row, v)| {
                    if v > 0.0 {
                        Ok(v.ln())
                    } else {
                        Err(ProcessingError::InvalidData(format!(
                            "log of non-positive value {} in '{}' at row {}",
                            v, name, row
                        )))
                    }
                })
                .collect()
        })
        .collect()
}

fn to_matrix(columns: &[Vec<f64>], rows: usize) -> Array2<f64> {
    Array2::from_shape_fn((rows, columns.len()), |(i, j)| columns[j][i])
}
