//! Row partitions used to measure held-out error.

use crate::error::{ExperimentError, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand::rngs::StdRng;

/// Row indices of one train/validation partition.
#[derive(Debug, Clone, PartialEq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl Fold {
    /// Materialize the partition.
    pub fn select(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
    ) -> (Array2<f64>, Array1<f64>, Array2<f64>, Array1<f64>) {
        (
            x.select(Axis(0), &self.train),
            y.select(Axis(0), &self.train),
            x.select(Axis(0), &self.test),
            y.select(Axis(0), &self.test),
        )
    }
}

/// Contiguous, unshuffled k-fold partitions.
///
/// The first `n % k` folds hold one extra row, so fold sizes differ by at
/// most one.
pub fn kfold(n_rows: usize, k: usize) -> Result<Vec<Fold>> {
    if k < 2 {
        return Err(ExperimentError::Configuration(format!(
            "k-fold needs at least 2 folds, got {}",
            k
        )));
    }
    if n_rows < k {
        return Err(ExperimentError::InvalidInput(format!(
            "cannot split {} rows into {} folds",
            n_rows, k
        )));
    }

    let base = n_rows / k;
    let extra = n_rows % k;
    let mut folds = Vec::with_capacity(k);
    let mut start = 0;
    for i in 0..k {
        let size = base + usize::from(i < extra);
        let end = start + size;
        folds.push(Fold {
            train: (0..start).chain(end..n_rows).collect(),
            test: (start..end).collect(),
        });
        start = end;
    }
    Ok(folds)
}

/// A shuffled single split with `ceil(n * fraction)` validation rows.
pub fn holdout(n_rows: usize, fraction: f64, seed: u64) -> Result<Fold> {
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(ExperimentError::Configuration(format!(
            "validation fraction must be in (0, 1), got {}",
            fraction
        )));
    }
    if n_rows < 2 {
        return Err(ExperimentError::InvalidInput(format!(
            "cannot hold out validation rows from {} rows",
            n_rows
        )));
    }

    let n_test = ((n_rows as f64 * fraction).ceil() as usize).clamp(1, n_rows - 1);
    let mut rows: Vec<usize> = (0..n_rows).collect();
    rows.shuffle(&mut StdRng::seed_from_u64(seed));
    let test = rows.split_off(n_rows - n_test);
    Ok(Fold { train: rows, test })
}
