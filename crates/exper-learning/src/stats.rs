//! Two-sample t-tests.

use crate::error::{ExperimentError, Result};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Result of [`ttest_ind`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TTest {
    pub mean_a: f64,
    pub mean_b: f64,
    /// t statistic of `mean_a - mean_b`.
    pub statistic: f64,
    pub df: f64,
    /// Two-sided p-value.
    pub p_value: f64,
    /// One-sided p-value for the alternative `mean_a > mean_b`.
    pub p_value_greater: f64,
}

/// Independent two-sample t-test.
///
/// Uses Welch's unequal-variance test unless `equal_var` is set, in which
/// case the pooled-variance Student test is used. When both samples have
/// zero variance the statistic is 0 with p = 1 for equal means, and
/// ±infinity with p = 0 otherwise.
pub fn ttest_ind(a: &[f64], b: &[f64], equal_var: bool) -> Result<TTest> {
    for (label, sample) in [("first", a), ("second", b)] {
        if sample.len() < 2 {
            return Err(ExperimentError::InvalidInput(format!(
                "t-test needs at least 2 observations per sample, the {} has {}",
                label,
                sample.len()
            )));
        }
        if sample.iter().any(|v| !v.is_finite()) {
            return Err(ExperimentError::InvalidInput(format!(
                "t-test {} sample contains non-finite values",
                label
            )));
        }
    }

    let (na, nb) = (a.len() as f64, b.len() as f64);
    let (mean_a, var_a) = mean_and_variance(a);
    let (mean_b, var_b) = mean_and_variance(b);
    let diff = mean_a - mean_b;

    let (se, df) = if equal_var {
        let pooled = ((na - 1.0) * var_a + (nb - 1.0) * var_b) / (na + nb - 2.0);
        ((pooled * (1.0 / na + 1.0 / nb)).sqrt(), na + nb - 2.0)
    } else {
        let qa = var_a / na;
        let qb = var_b / nb;
        let se2 = qa + qb;
        let df = se2 * se2 / (qa * qa / (na - 1.0) + qb * qb / (nb - 1.0));
        (se2.sqrt(), df)
    };

    if se == 0.0 {
        let (statistic, p_value, p_value_greater) = if diff == 0.0 {
            (0.0, 1.0, 1.0)
        } else if diff > 0.0 {
            (f64::INFINITY, 0.0, 0.0)
        } else {
            (f64::NEG_INFINITY, 0.0, 1.0)
        };
        return Ok(TTest {
            mean_a,
            mean_b,
            statistic,
            df: na + nb - 2.0,
            p_value,
            p_value_greater,
        });
    }

    let statistic = diff / se;
    let dist = StudentsT::new(0.0, 1.0, df).map_err(|e| {
        ExperimentError::InvalidInput(format!("invalid t distribution (df = {}): {}", df, e))
    })?;
    let p_value = (2.0 * (1.0 - dist.cdf(statistic.abs()))).clamp(0.0, 1.0);
    let p_value_greater = (1.0 - dist.cdf(statistic)).clamp(0.0, 1.0);

    Ok(TTest {
        mean_a,
        mean_b,
        statistic,
        df,
        p_value,
        p_value_greater,
    })
}

/// Mean and unbiased (n - 1) variance.
fn mean_and_variance(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, variance)
}
