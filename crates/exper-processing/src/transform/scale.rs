//! Standardization to zero mean and unit variance.

use crate::error::{ProcessingError, Result};
use crate::utils::mean_and_std;
use serde::{Deserialize, Serialize};

/// Scale below which a column is treated as constant.
const MIN_SCALE: f64 = 1e-12;

/// Per-column standard scaler using the population standard deviation.
///
/// Constant columns get a scale of 1 so they map to zero instead of NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(columns: &[Vec<f64>]) -> Result<Self> {
        let mut means = Vec::with_capacity(columns.len());
        let mut scales = Vec::with_capacity(columns.len());
        for values in columns {
            let (mean, std) = mean_and_std(values).ok_or_else(|| {
                ProcessingError::InvalidData("cannot fit a scaler on an empty column".to_string())
            })?;
            if !mean.is_finite() || !std.is_finite() {
                return Err(ProcessingError::InvalidData(
                    "cannot fit a scaler on non-finite values".to_string(),
                ));
            }
            means.push(mean);
            scales.push(if std < MIN_SCALE { 1.0 } else { std });
        }
        Ok(Self { means, scales })
    }

    pub fn transform(&self, columns: Vec<Vec<f64>>) -> Result<Vec<Vec<f64>>> {
        if columns.len() != self.means.len() {
            return Err(ProcessingError::InvalidData(format!(
                "scaler fitted on {} columns but received {}",
                self.means.len(),
                columns.len()
            )));
        }
        Ok(columns
            .into_iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(values, (&mean, &scale))| {
                values.into_iter().map(|v| (v - mean) / scale).collect()
            })
            .collect())
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn scales(&self) -> &[f64] {
        &self.scales
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standardizes_training_columns() {
        let columns = vec![vec![1.0, 2.0, 3.0, 4.0]];
        let scaler = StandardScaler::fit(&columns).unwrap();
        let scaled = scaler.transform(columns).unwrap();

        let mean: f64 = scaled[0].iter().sum::<f64>() / 4.0;
        let var: f64 = scaled[0].iter().map(|v| v * v).sum::<f64>() / 4.0;
        assert!(mean.abs() < 1e-12);
        assert!((var - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_column_maps_to_zero() {
        let scaler = StandardScaler::fit(&[vec![5.0, 5.0, 5.0]]).unwrap();
        assert_eq!(scaler.scales(), &[1.0]);
        assert_eq!(scaler.transform(vec![vec![5.0, 6.0]]).unwrap(), vec![vec![0.0, 1.0]]);
    }

    #[test]
    fn test_uses_training_statistics_on_new_data() {
        let scaler = StandardScaler::fit(&[vec![0.0, 10.0]]).unwrap();
        assert_eq!(scaler.means(), &[5.0]);
        assert_eq!(scaler.transform(vec![vec![15.0]]).unwrap(), vec![vec![2.0]]);
    }

    #[test]
    fn test_rejects_empty_column() {
        assert!(StandardScaler::fit(&[vec![]]).is_err());
    }
}
