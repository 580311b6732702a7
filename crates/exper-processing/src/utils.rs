//! Shared utilities for the processing crate.
//!
//! Column dtype classification and the small set of order statistics the
//! fitted transformers need.

use polars::prelude::*;
use std::collections::HashMap;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Category of a data type for preprocessing purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtypeCategory {
    /// Integer or floating point numbers
    Numeric,
    /// Boolean type
    Boolean,
    /// String/text type
    String,
    /// Other/unknown types
    Other,
}

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Get the category of a DataType.
pub fn get_dtype_category(dtype: &DataType) -> DtypeCategory {
    if is_numeric_dtype(dtype) {
        DtypeCategory::Numeric
    } else if matches!(dtype, DataType::Boolean) {
        DtypeCategory::Boolean
    } else if matches!(dtype, DataType::String | DataType::Categorical(_, _)) {
        DtypeCategory::String
    } else {
        DtypeCategory::Other
    }
}

// =============================================================================
// Statistics Utilities
// =============================================================================

/// Median of the non-null values, averaging the two middle values for even counts.
pub fn median(values: &[Option<f64>]) -> Option<f64> {
    let mut present: Vec<f64> = values.iter().flatten().copied().filter(|v| !v.is_nan()).collect();
    if present.is_empty() {
        return None;
    }
    present.sort_by(|a, b| a.total_cmp(b));
    let mid = present.len() / 2;
    if present.len() % 2 == 0 {
        Some((present[mid - 1] + present[mid]) / 2.0)
    } else {
        Some(present[mid])
    }
}

/// Mean and population standard deviation of a slice.
pub fn mean_and_std(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some((mean, variance.sqrt()))
}

/// Most frequent non-null value. Ties resolve to the lexicographically smallest value.
pub fn string_mode(values: &[Option<String>]) -> Option<String> {
    let mut value_counts: HashMap<&str, usize> = HashMap::new();
    for val in values.iter().flatten() {
        *value_counts.entry(val.as_str()).or_insert(0) += 1;
    }

    value_counts
        .into_iter()
        .max_by(|(a_val, a_count), (b_val, b_count)| {
            a_count.cmp(b_count).then_with(|| b_val.cmp(a_val))
        })
        .map(|(val, _)| val.to_string())
}

/// Replace missing numeric values with `fill_value`.
pub fn fill_numeric_nulls(values: &[Option<f64>], fill_value: f64) -> Vec<f64> {
    values
        .iter()
        .map(|v| match v {
            Some(x) if !x.is_nan() => *x,
            _ => fill_value,
        })
        .collect()
}

/// Replace missing string values with `fill_value`.
pub fn fill_string_nulls(values: &[Option<String>], fill_value: &str) -> Vec<String> {
    values
        .iter()
        .map(|v| v.clone().unwrap_or_else(|| fill_value.to_string()))
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
