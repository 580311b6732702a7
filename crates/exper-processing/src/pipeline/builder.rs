//! Column transformer definition and builder.
//!
//! A [`ColumnTransformer`] is an ordered list of named sub-transforms, each
//! reading a set of input columns, plus a policy for every numeric column no
//! sub-transform references (the remainder). Output columns are named
//! `<step>__<output>`, e.g. `log__population` or `remainder__housing_median_age`.

use super::executor::FittedColumnTransformer;
use crate::error::{ProcessingError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{Span, info_span};

/// Prefix reserved for remainder outputs.
pub const REMAINDER_NAME: &str = "remainder";

/// Columns a sub-transform reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnSelection {
    /// An explicit list of columns.
    Named(Vec<String>),
    /// Every string-typed feature column, resolved at fit time.
    AllCategorical,
}

/// One named sub-transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformerSpec {
    /// Median-impute both inputs, divide, then standardize. Emits `<name>__ratio`.
    Ratio {
        name: String,
        numerator: String,
        denominator: String,
    },
    /// Median-impute, take the natural log, then standardize. Emits `<name>__<column>`.
    Log { name: String, columns: Vec<String> },
    /// Median-impute, then RBF similarity to k-means centres.
    /// Emits `<name>__cluster_<i>_similarity`.
    ClusterSimilarity {
        name: String,
        columns: Vec<String>,
        n_clusters: usize,
        gamma: f64,
        random_state: u64,
    },
    /// Most-frequent impute, then one-hot encode. Emits `<name>__<column>_<category>`.
    OneHot {
        name: String,
        columns: ColumnSelection,
    },
}

impl TransformerSpec {
    pub fn name(&self) -> &str {
        match self {
            Self::Ratio { name, .. }
            | Self::Log { name, .. }
            | Self::ClusterSimilarity { name, .. }
            | Self::OneHot { name, .. } => name,
        }
    }

    /// Explicitly named input columns. Empty for [`ColumnSelection::AllCategorical`].
    pub fn named_inputs(&self) -> Vec<&str> {
        match self {
            Self::Ratio {
                numerator,
                denominator,
                ..
            } => vec![numerator.as_str(), denominator.as_str()],
            Self::Log { columns, .. } | Self::ClusterSimilarity { columns, .. } => {
                columns.iter().map(String::as_str).collect()
            }
            Self::OneHot { columns, .. } => match columns {
                ColumnSelection::Named(columns) => columns.iter().map(String::as_str).collect(),
                ColumnSelection::AllCategorical => Vec::new(),
            },
        }
    }

    fn validate(&self) -> Result<()> {
        let name = self.name();
        if name.trim().is_empty() {
            return Err(ProcessingError::InvalidConfig(
                "transformer step names must not be empty".to_string(),
            ));
        }
        if name == REMAINDER_NAME {
            return Err(ProcessingError::InvalidConfig(format!(
                "'{}' is reserved for the remainder step",
                REMAINDER_NAME
            )));
        }
        match self {
            Self::Log { columns, .. } | Self::ClusterSimilarity { columns, .. }
                if columns.is_empty() =>
            {
                Err(ProcessingError::InvalidConfig(format!(
                    "step '{}' has no input columns",
                    name
                )))
            }
            Self::OneHot {
                columns: ColumnSelection::Named(columns),
                ..
            } if columns.is_empty() => Err(ProcessingError::InvalidConfig(format!(
                "step '{}' has no input columns",
                name
            ))),
            Self::ClusterSimilarity {
                n_clusters, gamma, ..
            } => {
                if *n_clusters == 0 {
                    return Err(ProcessingError::InvalidConfig(format!(
                        "step '{}' needs at least one cluster",
                        name
                    )));
                }
                if !(gamma.is_finite() && *gamma > 0.0) {
                    return Err(ProcessingError::InvalidConfig(format!(
                        "step '{}' needs a positive gamma, got {}",
                        name, gamma
                    )));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// What happens to numeric feature columns no step references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Remainder {
    /// Median-impute and standardize, emitting `remainder__<column>`.
    #[default]
    Scale,
    /// Leave them out of the output.
    Drop,
}

/// Column-wise preprocessing with fit/transform semantics.
///
/// # Example
///
/// ```rust,ignore
/// use exper_processing::{ColumnTransformer, Preprocessor, TransformerSpec};
///
/// let mut preprocessor = ColumnTransformer::builder()
///     .step(TransformerSpec::Log {
///         name: "log".into(),
///         columns: vec!["population".into()],
///     })
///     .build()?;
///
/// let features = preprocessor.preprocess(train, true)?;
/// let test_features = preprocessor.transform(&test)?;
/// ```
#[derive(Debug)]
pub struct ColumnTransformer {
    pub(super) specs: Vec<TransformerSpec>,
    pub(super) remainder: Remainder,
    pub(super) state: Option<FittedColumnTransformer>,
    pub(super) span: Span,
}

// Experiments move their preprocessor across threads
static_assertions::assert_impl_all!(ColumnTransformer: Send, Sync);

impl ColumnTransformer {
    /// Create a new builder.
    pub fn builder() -> ColumnTransformerBuilder {
        ColumnTransformerBuilder::default()
    }

    /// The California housing preprocessing: three standardized ratios, log
    /// transforms of the heavy-tailed counts and income, geospatial cluster
    /// similarity, one-hot categories and a standardized remainder.
    pub fn california() -> Self {
        let names = |cols: &[&str]| cols.iter().map(|c| c.to_string()).collect::<Vec<_>>();
        let ratio = |name: &str, numerator: &str, denominator: &str| TransformerSpec::Ratio {
            name: name.to_string(),
            numerator: numerator.to_string(),
            denominator: denominator.to_string(),
        };

        Self {
            specs: vec![
                ratio("bedrooms", "total_bedrooms", "total_rooms"),
                ratio("rooms_per_house", "total_rooms", "households"),
                ratio("people_per_house", "population", "households"),
                TransformerSpec::Log {
                    name: "log".to_string(),
                    columns: names(&[
                        "total_bedrooms",
                        "total_rooms",
                        "population",
                        "households",
                        "median_income",
                    ]),
                },
                TransformerSpec::ClusterSimilarity {
                    name: "geospatial".to_string(),
                    columns: names(&["latitude", "longitude"]),
                    n_clusters: 10,
                    gamma: 1.0,
                    random_state: 42,
                },
                TransformerSpec::OneHot {
                    name: "cat".to_string(),
                    columns: ColumnSelection::AllCategorical,
                },
            ],
            remainder: Remainder::Scale,
            state: None,
            span: info_span!("preprocessor", kind = "column_transformer"),
        }
    }

    pub fn specs(&self) -> &[TransformerSpec] {
        &self.specs
    }

    pub fn remainder(&self) -> Remainder {
        self.remainder
    }

    /// Fitted state, available after a successful fit.
    pub fn fitted(&self) -> Option<&FittedColumnTransformer> {
        self.state.as_ref()
    }
}

/// Builder for [`ColumnTransformer`].
///
/// `build()` validates step definitions up front: step names must be
/// non-empty, unique and not `remainder`, and every step needs inputs.
#[derive(Debug, Default)]
pub struct ColumnTransformerBuilder {
    specs: Vec<TransformerSpec>,
    remainder: Option<Remainder>,
    span: Option<Span>,
}

impl ColumnTransformerBuilder {
    /// Append a sub-transform. Steps are applied and emitted in insertion order.
    pub fn step(mut self, spec: TransformerSpec) -> Self {
        self.specs.push(spec);
        self
    }

    pub fn steps(mut self, specs: impl IntoIterator<Item = TransformerSpec>) -> Self {
        self.specs.extend(specs);
        self
    }

    pub fn remainder(mut self, remainder: Remainder) -> Self {
        self.remainder = Some(remainder);
        self
    }

    /// Log under `span` instead of a fresh `preprocessor` span.
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn build(self) -> Result<ColumnTransformer> {
        let mut seen = HashSet::new();
        for spec in &self.specs {
            spec.validate()?;
            if !seen.insert(spec.name()) {
                return Err(ProcessingError::InvalidConfig(format!(
                    "duplicate step name '{}'",
                    spec.name()
                )));
            }
        }

        Ok(ColumnTransformer {
            specs: self.specs,
            remainder: self.remainder.unwrap_or_default(),
            state: None,
            span: self
                .span
                .unwrap_or_else(|| info_span!("preprocessor", kind = "column_transformer")),
        })
    }
}
