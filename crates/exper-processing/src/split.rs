//! Stratified train/test splitting.
//!
//! A continuous column is binned into a [`StratificationKey`] and the data is
//! split so that every stratum appears in the test set in (nearly) the same
//! proportion as in the full dataset. The key is derived on the fly and never
//! added to the data, so it cannot leak into the features.

use crate::dataset::Dataset;
use crate::error::{ProcessingError, Result};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label for values that fall outside every bin or are missing.
pub const OUT_OF_RANGE_STRATUM: u32 = 0;

/// How to bin a column into strata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StratificationConfig {
    /// Column to bin.
    pub column: String,
    /// Strictly increasing bin edges. Bins are right-closed: `(e[i], e[i+1]]`.
    pub edges: Vec<f64>,
    /// Add a final bin `(e[last], +inf)`.
    pub unbounded_upper: bool,
}

impl StratificationConfig {
    /// Median-income bins used for the California housing data.
    pub fn california_income() -> Self {
        Self {
            column: "median_income".to_string(),
            edges: vec![0.0, 1.5, 3.0, 5.0, 6.0],
            unbounded_upper: true,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.column.trim().is_empty() {
            return Err(ProcessingError::InvalidConfig(
                "stratification column must not be empty".to_string(),
            ));
        }
        if self.edges.len() < 2 {
            return Err(ProcessingError::InvalidConfig(format!(
                "at least 2 stratification edges are required, got {}",
                self.edges.len()
            )));
        }
        if self.edges.iter().any(|e| !e.is_finite()) {
            return Err(ProcessingError::InvalidConfig(
                "stratification edges must be finite".to_string(),
            ));
        }
        if self.edges.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ProcessingError::InvalidConfig(
                "stratification edges must be strictly increasing".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of proper bins (excluding the out-of-range stratum).
    pub fn n_bins(&self) -> usize {
        self.edges.len() - 1 + usize::from(self.unbounded_upper)
    }
}

/// Per-row stratum labels. Bins are labelled `1..=k`, out-of-range rows `0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StratificationKey {
    labels: Vec<u32>,
}

impl StratificationKey {
    /// Bin `values` by `edges`.
    ///
    /// A value `v` belongs to bin `i` (1-based) when `e[i-1] < v <= e[i]`.
    /// With `unbounded_upper`, values above the last edge form bin `k`.
    pub fn from_bins(values: &[Option<f64>], edges: &[f64], unbounded_upper: bool) -> Self {
        let labels = values
            .iter()
            .map(|value| match value {
                Some(v) if !v.is_nan() => bin_of(*v, edges, unbounded_upper),
                _ => OUT_OF_RANGE_STRATUM,
            })
            .collect();
        Self { labels }
    }

    /// Bin the configured column of `data`.
    pub fn from_dataset(data: &Dataset, config: &StratificationConfig) -> Result<Self> {
        config.validate()?;
        let values = data.numeric_column(&config.column)?;
        Ok(Self::from_bins(&values, &config.edges, config.unbounded_upper))
    }

    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Share of rows in each stratum.
    pub fn proportions(&self) -> BTreeMap<u32, f64> {
        shares(self.labels.iter().copied())
    }

    fn strata(&self) -> BTreeMap<u32, Vec<usize>> {
        let mut strata: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        for (row, &label) in self.labels.iter().enumerate() {
            strata.entry(label).or_default().push(row);
        }
        strata
    }
}

fn bin_of(v: f64, edges: &[f64], unbounded_upper: bool) -> u32 {
    let last = edges.len() - 1;
    if v <= edges[0] {
        return OUT_OF_RANGE_STRATUM;
    }
    for i in 1..edges.len() {
        if v <= edges[i] {
            return i as u32;
        }
    }
    if unbounded_upper {
        (last + 1) as u32
    } else {
        OUT_OF_RANGE_STRATUM
    }
}

fn shares(labels: impl Iterator<Item = u32>) -> BTreeMap<u32, f64> {
    let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
    let mut total = 0usize;
    for label in labels {
        *counts.entry(label).or_default() += 1;
        total += 1;
    }
    counts
        .into_iter()
        .map(|(label, count)| (label, count as f64 / total.max(1) as f64))
        .collect()
}

/// Row counts and stratum shares of a split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitSummary {
    pub train_rows: usize,
    pub test_rows: usize,
    pub seed: u64,
    /// Stratum shares in the full dataset.
    pub population_shares: BTreeMap<u32, f64>,
    /// Stratum shares in the test split.
    pub test_shares: BTreeMap<u32, f64>,
}

impl SplitSummary {
    /// Largest absolute difference between population and test shares.
    pub fn max_share_deviation(&self) -> f64 {
        self.population_shares
            .iter()
            .map(|(label, &share)| {
                let test = self.test_shares.get(label).copied().unwrap_or(0.0);
                (share - test).abs()
            })
            .fold(0.0, f64::max)
    }
}

/// Result of [`stratified_split`].
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub train: Dataset,
    pub test: Dataset,
    pub summary: SplitSummary,
}

/// Split `data` into train and test sets, preserving stratum proportions.
///
/// The test set has `ceil(n * test_size)` rows, clamped so both sides are
/// non-empty. Each stratum contributes its proportional quota, with the
/// rounding remainder handed out by largest fractional part. Rows are drawn
/// with a `StdRng` seeded from `seed`, so equal inputs give equal splits.
pub fn stratified_split(
    data: &Dataset,
    key: &StratificationKey,
    test_size: f64,
    seed: u64,
) -> Result<TrainTestSplit> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(ProcessingError::InvalidConfig(format!(
            "test_size must be in (0, 1), got {}",
            test_size
        )));
    }
    let n = data.height();
    if key.len() != n {
        return Err(ProcessingError::InvalidData(format!(
            "stratification key has {} labels for {} rows",
            key.len(),
            n
        )));
    }
    if n < 2 {
        return Err(ProcessingError::InvalidData(format!(
            "cannot split a dataset of {} rows",
            n
        )));
    }

    let n_test = ((n as f64 * test_size).ceil() as usize).clamp(1, n - 1);
    let strata = key.strata();
    let quotas = allocate(&strata, n, n_test);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train_idx = Vec::with_capacity(n - n_test);
    let mut test_idx = Vec::with_capacity(n_test);
    for (label, rows) in &strata {
        let mut rows = rows.clone();
        rows.shuffle(&mut rng);
        let quota = quotas.get(label).copied().unwrap_or(0);
        test_idx.extend_from_slice(&rows[..quota]);
        train_idx.extend_from_slice(&rows[quota..]);
    }
    train_idx.shuffle(&mut rng);
    test_idx.shuffle(&mut rng);

    let summary = SplitSummary {
        train_rows: train_idx.len(),
        test_rows: test_idx.len(),
        seed,
        population_shares: key.proportions(),
        test_shares: shares(test_idx.iter().map(|&i| key.labels()[i])),
    };

    Ok(TrainTestSplit {
        train: data.take_rows(&train_idx)?,
        test: data.take_rows(&test_idx)?,
        summary,
    })
}

/// Largest-remainder allocation of `n_test` rows across strata.
fn allocate(strata: &BTreeMap<u32, Vec<usize>>, n: usize, n_test: usize) -> BTreeMap<u32, usize> {
    let mut quotas = BTreeMap::new();
    let mut fractions = Vec::with_capacity(strata.len());
    let mut assigned = 0usize;

    for (&label, rows) in strata {
        let exact = rows.len() as f64 * n_test as f64 / n as f64;
        let base = (exact.floor() as usize).min(rows.len());
        quotas.insert(label, base);
        assigned += base;
        fractions.push((label, exact - base as f64, rows.len()));
    }

    // Largest fractional part first, then larger stratum, then lower label
    fractions.sort_by(|a, b| {
        b.1.total_cmp(&a.1)
            .then_with(|| b.2.cmp(&a.2))
            .then_with(|| a.0.cmp(&b.0))
    });

    let mut remaining = n_test.saturating_sub(assigned);
    while remaining > 0 {
        let before = remaining;
        for &(label, _, size) in &fractions {
            if remaining == 0 {
                break;
            }
            if let Some(quota) = quotas.get_mut(&label)
                && *quota < size
            {
                *quota += 1;
                remaining -= 1;
            }
        }
        if remaining == before {
            break;
        }
    }
    quotas
}
