//! One-hot encoding of categorical columns.

use crate::error::{ProcessingError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One indicator column per (column, training category) pair.
///
/// Categories are sorted, so the output layout depends only on the set of
/// values seen at fit time. Categories unseen at fit time encode as all zeros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    columns: Vec<String>,
    categories: Vec<Vec<String>>,
}

impl OneHotEncoder {
    pub fn fit(names: &[String], columns: &[Vec<String>]) -> Result<Self> {
        if names.len() != columns.len() {
            return Err(ProcessingError::InvalidData(format!(
                "{} column names given for {} columns",
                names.len(),
                columns.len()
            )));
        }
        let categories = columns
            .iter()
            .map(|values| {
                values
                    .iter()
                    .cloned()
                    .collect::<BTreeSet<String>>()
                    .into_iter()
                    .collect()
            })
            .collect();

        Ok(Self {
            columns: names.to_vec(),
            categories,
        })
    }

    pub fn transform(&self, columns: &[Vec<String>]) -> Result<Vec<Vec<f64>>> {
        if columns.len() != self.categories.len() {
            return Err(ProcessingError::InvalidData(format!(
                "one-hot encoder fitted on {} columns but received {}",
                self.categories.len(),
                columns.len()
            )));
        }

        let mut output = Vec::with_capacity(self.output_names().len());
        for (values, categories) in columns.iter().zip(&self.categories) {
            for category in categories {
                output.push(
                    values
                        .iter()
                        .map(|v| if v == category { 1.0 } else { 0.0 })
                        .collect(),
                );
            }
        }
        Ok(output)
    }

    /// Output column names, `{column}_{category}`.
    pub fn output_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .zip(&self.categories)
            .flat_map(|(column, categories)| {
                categories
                    .iter()
                    .map(move |category| format!("{}_{}", column, category))
            })
            .collect()
    }

    pub fn categories(&self) -> &[Vec<String>] {
        &self.categories
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_sorted_categories_and_names() {
        let encoder = OneHotEncoder::fit(
            &strings(&["ocean_proximity"]),
            &[strings(&["NEAR BAY", "INLAND", "NEAR BAY"])],
        )
        .unwrap();
        assert_eq!(
            encoder.output_names(),
            strings(&["ocean_proximity_INLAND", "ocean_proximity_NEAR BAY"])
        );

        let out = encoder
            .transform(&[strings(&["INLAND", "NEAR BAY"])])
            .unwrap();
        assert_eq!(out, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_unknown_category_is_all_zeros() {
        let encoder =
            OneHotEncoder::fit(&strings(&["c"]), &[strings(&["a", "b"])]).unwrap();
        let out = encoder.transform(&[strings(&["ISLAND"])]).unwrap();
        assert_eq!(out, vec![vec![0.0], vec![0.0]]);
    }

    #[test]
    fn test_column_count_mismatch() {
        let encoder = OneHotEncoder::fit(&strings(&["c"]), &[strings(&["a"])]).unwrap();
        assert!(encoder.transform(&[]).is_err());
    }
}
