//! Tabular dataset with a designated target column.
//!
//! [`Dataset`] wraps a Polars [`DataFrame`] and remembers which column is the
//! regression target. Everything downstream of loading (splitting,
//! preprocessing, model fitting) works on a `Dataset` so that the target is
//! never confused with a feature.

use crate::error::{ProcessingError, Result};
use crate::utils::{DtypeCategory, get_dtype_category};
use ndarray::{Array1, Array2};
use polars::prelude::*;

/// A table of uniquely named columns plus an optional target column name.
#[derive(Debug, Clone)]
pub struct Dataset {
    frame: DataFrame,
    target: Option<String>,
}

impl Dataset {
    /// Wrap a frame, designating `target` as the label column.
    ///
    /// Fails with [`ProcessingError::ColumnNotFound`] if the frame has no such column.
    pub fn new(frame: DataFrame, target: impl Into<String>) -> Result<Self> {
        let target = target.into();
        if frame.get_column_index(&target).is_none() {
            return Err(ProcessingError::ColumnNotFound(target));
        }
        Ok(Self {
            frame,
            target: Some(target),
        })
    }

    /// Wrap a frame that has no label column (e.g. data to predict on).
    pub fn unlabeled(frame: DataFrame) -> Self {
        Self {
            frame,
            target: None,
        }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    /// Name of the target column, if any.
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.frame.height()
    }

    /// Number of columns, target included.
    pub fn width(&self) -> usize {
        self.frame.width()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect()
    }

    /// Column names excluding the target, in frame order.
    pub fn feature_names(&self) -> Vec<String> {
        self.column_names()
            .into_iter()
            .filter(|name| Some(name.as_str()) != self.target())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.frame.get_column_index(name).is_some()
    }

    /// Dtype category of a column.
    pub fn column_category(&self, name: &str) -> Result<DtypeCategory> {
        let column = self.column(name)?;
        Ok(get_dtype_category(column.dtype()))
    }

    /// Read a numeric column as `f64` values. Nulls stay `None`.
    pub fn numeric_column(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let column = self.column(name)?;
        if get_dtype_category(column.dtype()) != DtypeCategory::Numeric {
            return Err(ProcessingError::InvalidData(format!(
                "column '{}' has dtype {} but a numeric column is required",
                name,
                column.dtype()
            )));
        }
        let series = column.as_materialized_series().cast(&DataType::Float64)?;
        Ok(series.f64()?.into_iter().collect())
    }

    /// Read any column as strings. Nulls stay `None`.
    pub fn string_column(&self, name: &str) -> Result<Vec<Option<String>>> {
        let column = self.column(name)?;
        let series = column.as_materialized_series().cast(&DataType::String)?;
        Ok(series
            .str()?
            .into_iter()
            .map(|value| value.map(str::to_string))
            .collect())
    }

    /// Target values as a dense vector.
    ///
    /// Fails if the dataset is unlabeled or the target has missing values.
    pub fn target_values(&self) -> Result<Array1<f64>> {
        let target = self.target.as_deref().ok_or_else(|| {
            ProcessingError::InvalidData("dataset has no target column".to_string())
        })?;
        let values = self.numeric_column(target)?;
        values
            .into_iter()
            .enumerate()
            .map(|(row, value)| match value {
                Some(v) if v.is_finite() => Ok(v),
                _ => Err(ProcessingError::InvalidData(format!(
                    "target '{}' is missing or non-finite at row {}",
                    target, row
                ))),
            })
            .collect::<Result<Vec<f64>>>()
            .map(Array1::from)
    }

    /// Dense row-major feature matrix over [`Self::feature_names`].
    ///
    /// Every feature column must be numeric and complete, which holds for the
    /// output of a fitted preprocessor.
    pub fn feature_matrix(&self) -> Result<Array2<f64>> {
        let names = self.feature_names();
        let mut matrix = Array2::<f64>::zeros((self.height(), names.len()));
        for (j, name) in names.iter().enumerate() {
            let values = self.numeric_column(name)?;
            for (i, value) in values.into_iter().enumerate() {
                matrix[[i, j]] = match value {
                    Some(v) if v.is_finite() => v,
                    _ => {
                        return Err(ProcessingError::InvalidData(format!(
                            "feature '{}' is missing or non-finite at row {}",
                            name, i
                        )));
                    }
                };
            }
        }
        Ok(matrix)
    }

    /// Rows at `indices`, in the given order.
    pub fn take_rows(&self, indices: &[usize]) -> Result<Self> {
        let height = self.height();
        if let Some(&bad) = indices.iter().find(|&&i| i >= height) {
            return Err(ProcessingError::InvalidData(format!(
                "row index {} out of bounds for dataset of {} rows",
                bad, height
            )));
        }
        let idx = IdxCa::from_vec(
            "idx".into(),
            indices.iter().map(|&i| i as IdxSize).collect(),
        );
        Ok(Self {
            frame: self.frame.take(&idx)?,
            target: self.target.clone(),
        })
    }

    /// Copy of the dataset with `name` added (or replaced) as a float column.
    pub fn with_column(&self, name: &str, values: Vec<Option<f64>>) -> Result<Self> {
        if values.len() != self.height() {
            return Err(ProcessingError::InvalidData(format!(
                "column '{}' has {} values but the dataset has {} rows",
                name,
                values.len(),
                self.height()
            )));
        }
        let mut frame = self.frame.clone();
        frame.with_column(Column::new(name.into(), values))?;
        Ok(Self {
            frame,
            target: self.target.clone(),
        })
    }

    /// Copy of the dataset without `name`. The target cannot be dropped.
    pub fn drop_column(&self, name: &str) -> Result<Self> {
        if Some(name) == self.target() {
            return Err(ProcessingError::InvalidData(format!(
                "cannot drop target column '{}'",
                name
            )));
        }
        let frame = self
            .frame
            .drop(name)
            .map_err(|_| ProcessingError::ColumnNotFound(name.to_string()))?;
        Ok(Self {
            frame,
            target: self.target.clone(),
        })
    }

    fn column(&self, name: &str) -> Result<&Column> {
        self.frame
            .column(name)
            .map_err(|_| ProcessingError::ColumnNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn housing_frame() -> DataFrame {
        df![
            "median_income" => [1.2, 3.4, 5.6],
            "ocean_proximity" => ["INLAND", "NEAR BAY", "INLAND"],
            "median_house_value" => [100_000.0, 200_000.0, 300_000.0],
        ]
        .unwrap()
    }

    #[test]
    fn test_new_requires_target_column() {
        let err = Dataset::new(housing_frame(), "price").unwrap_err();
        assert_eq!(err.error_code(), "COLUMN_NOT_FOUND");
    }

    #[test]
    fn test_feature_names_exclude_target() {
        let data = Dataset::new(housing_frame(), "median_house_value").unwrap();
        assert_eq!(data.width(), 3);
        assert_eq!(
            data.feature_names(),
            vec!["median_income".to_string(), "ocean_proximity".to_string()]
        );
    }

    #[test]
    fn test_numeric_column_rejects_strings() {
        let data = Dataset::new(housing_frame(), "median_house_value").unwrap();
        assert!(data.numeric_column("median_income").is_ok());
        let err = data.numeric_column("ocean_proximity").unwrap_err();
        assert_eq!(err.error_code(), "INVALID_DATA");
    }

    #[test]
    fn test_take_rows_keeps_order() {
        let data = Dataset::new(housing_frame(), "median_house_value").unwrap();
        let subset = data.take_rows(&[2, 0]).unwrap();
        assert_eq!(
            subset.target_values().unwrap().to_vec(),
            vec![300_000.0, 100_000.0]
        );
        assert!(data.take_rows(&[3]).is_err());
    }

    #[test]
    fn test_target_values_rejects_nulls() {
        let frame = df![
            "x" => [1.0, 2.0],
            "y" => [Some(1.0), None],
        ]
        .unwrap();
        let data = Dataset::new(frame, "y").unwrap();
        assert!(data.target_values().is_err());
    }

    #[test]
    fn test_feature_matrix_layout() {
        let frame = df![
            "a" => [1.0, 2.0],
            "y" => [0.0, 0.0],
            "b" => [3i64, 4],
        ]
        .unwrap();
        let data = Dataset::new(frame, "y").unwrap();
        let matrix = data.feature_matrix().unwrap();
        assert_eq!(matrix.shape(), &[2, 2]);
        assert_eq!(matrix[[1, 0]], 2.0);
        assert_eq!(matrix[[0, 1]], 3.0);
    }

    #[test]
    fn test_with_and_drop_column() {
        let data = Dataset::new(housing_frame(), "median_house_value").unwrap();
        let extended = data
            .with_column("income_cat", vec![Some(1.0), Some(3.0), Some(4.0)])
            .unwrap();
        assert!(extended.has_column("income_cat"));
        let dropped = extended.drop_column("income_cat").unwrap();
        assert!(!dropped.has_column("income_cat"));
        assert!(dropped.drop_column("median_house_value").is_err());
    }
}
