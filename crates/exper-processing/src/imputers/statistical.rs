//! Statistical imputation.
//!
//! Fitted imputers learn one fill value per column from training data and
//! apply the same values to every later transform.

use crate::error::{ProcessingError, Result};
use crate::utils::{fill_numeric_nulls, fill_string_nulls, median, string_mode};
use serde::{Deserialize, Serialize};

/// Fills missing numeric values with the per-column training median.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedianImputer {
    columns: Vec<String>,
    medians: Vec<f64>,
}

impl MedianImputer {
    /// Learn the median of each column. `names` label the columns for errors.
    pub fn fit(names: &[String], columns: &[Vec<Option<f64>>]) -> Result<Self> {
        let medians = names
            .iter()
            .zip(columns)
            .map(|(name, values)| {
                median(values).ok_or_else(|| ProcessingError::NoValidValues(name.clone()))
            })
            .collect::<Result<Vec<f64>>>()?;

        Ok(Self {
            columns: names.to_vec(),
            medians,
        })
    }

    /// Fill the gaps in `columns`, which must be ordered as at fit time.
    pub fn transform(&self, columns: &[Vec<Option<f64>>]) -> Result<Vec<Vec<f64>>> {
        if columns.len() != self.medians.len() {
            return Err(ProcessingError::InvalidData(format!(
                "median imputer fitted on {} columns but received {}",
                self.medians.len(),
                columns.len()
            )));
        }
        Ok(columns
            .iter()
            .zip(&self.medians)
            .map(|(values, &fill)| fill_numeric_nulls(values, fill))
            .collect())
    }

    pub fn medians(&self) -> &[f64] {
        &self.medians
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

/// Fills missing categorical values with the per-column training mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MostFrequentImputer {
    columns: Vec<String>,
    modes: Vec<String>,
}

impl MostFrequentImputer {
    pub fn fit(names: &[String], columns: &[Vec<Option<String>>]) -> Result<Self> {
        let modes = names
            .iter()
            .zip(columns)
            .map(|(name, values)| {
                string_mode(values).ok_or_else(|| ProcessingError::NoValidValues(name.clone()))
            })
            .collect::<Result<Vec<String>>>()?;

        Ok(Self {
            columns: names.to_vec(),
            modes,
        })
    }

    pub fn transform(&self, columns: &[Vec<Option<String>>]) -> Result<Vec<Vec<String>>> {
        if columns.len() != self.modes.len() {
            return Err(ProcessingError::InvalidData(format!(
                "most-frequent imputer fitted on {} columns but received {}",
                self.modes.len(),
                columns.len()
            )));
        }
        Ok(columns
            .iter()
            .zip(&self.modes)
            .map(|(values, fill)| fill_string_nulls(values, fill))
            .collect())
    }

    pub fn modes(&self) -> &[String] {
        &self.modes
    }
}
