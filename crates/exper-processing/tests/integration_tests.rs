//! Integration tests for data acquisition, splitting and preprocessing.
//!
//! These tests run the California housing preparation end to end on a small
//! fixture that mirrors the real extract's schema, including missing values.

use exper_processing::handler::{ApiHandler, HOUSING_TARGET, MemoryFetcher, read_csv};
use exper_processing::{
    ColumnTransformer, DataHandler, Dataset, Preprocessor, StratificationConfig,
    StratificationKey, stratified_split,
};
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

// ============================================================================
// Helper Functions
// ============================================================================

const HOUSING_URL: &str = "mem://datasets/housing/housing.csv";

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn housing_bytes() -> Vec<u8> {
    fs::read(fixtures_path().join("housing_sample.csv")).expect("Failed to read fixture")
}

fn load_housing() -> Dataset {
    let frame = read_csv(&fixtures_path().join("housing_sample.csv")).expect("Failed to read CSV");
    Dataset::new(frame, HOUSING_TARGET).expect("Fixture has no target column")
}

// ============================================================================
// Data Acquisition
// ============================================================================

#[test]
fn test_fetched_and_cached_loads_are_identical() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("artifacts/data/housing.csv");
    let handler = ApiHandler::new(
        MemoryFetcher::new().with_resource(HOUSING_URL, housing_bytes()),
        HOUSING_TARGET,
    );

    let fetched = handler.load_data(&path, HOUSING_URL).unwrap();
    let cached = handler.load_data(&path, HOUSING_URL).unwrap();

    assert_eq!(handler.fetcher().request_count(), 1);
    assert_eq!(fetched.height(), 240);
    assert!(fetched.frame().equals_missing(cached.frame()));
    assert!(fetched.frame().equals_missing(load_housing().frame()));
}

#[test]
fn test_malformed_resource_is_data_unavailable() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("housing.csv");
    let handler = ApiHandler::new(
        MemoryFetcher::new().with_resource(HOUSING_URL, vec![0xff, 0xfe, 0x00, b'"', b'\n']),
        HOUSING_TARGET,
    );

    let err = handler.load_data(&path, HOUSING_URL).unwrap_err();
    assert!(err.is_data_unavailable());
    assert!(!path.exists());
}

// ============================================================================
// Stratified Split
// ============================================================================

#[test]
fn test_income_strata_are_preserved() {
    let data = load_housing();
    let key =
        StratificationKey::from_dataset(&data, &StratificationConfig::california_income()).unwrap();
    let split = stratified_split(&data, &key, 0.3, 42).unwrap();

    assert_eq!(split.summary.test_rows, 72);
    assert_eq!(split.summary.train_rows, 168);
    assert!(split.summary.max_share_deviation() <= 1.0 / 72.0 + 1e-12);
    // The key never becomes a column
    assert_eq!(split.train.width(), data.width());
}

// ============================================================================
// California Preprocessing
// ============================================================================

fn prepared() -> (Dataset, Dataset, ColumnTransformer) {
    let data = load_housing();
    let key =
        StratificationKey::from_dataset(&data, &StratificationConfig::california_income()).unwrap();
    let split = stratified_split(&data, &key, 0.3, 42).unwrap();

    let mut preprocessor = ColumnTransformer::california();
    let train = preprocessor.preprocess(split.train, true).unwrap();
    let test = preprocessor.transform(&split.test).unwrap();
    (train, test, preprocessor)
}

#[test]
fn test_california_feature_layout() {
    let (train, test, preprocessor) = prepared();
    let names = preprocessor.feature_names_out().unwrap();

    // 3 ratios + 5 logs + 10 clusters + 4 categories + 1 remainder
    assert_eq!(names.len(), 23);
    assert_eq!(names[0], "bedrooms__ratio");
    assert!(names.contains(&"log__median_income".to_string()));
    assert!(names.contains(&"geospatial__cluster_9_similarity".to_string()));
    assert!(names.contains(&"cat__ocean_proximity_INLAND".to_string()));
    // Latitude and longitude feed the geospatial step, so only the age remains
    assert_eq!(names.last().unwrap(), "remainder__housing_median_age");

    assert_eq!(train.feature_names(), names);
    assert_eq!(test.feature_names(), names);
}

#[test]
fn test_california_output_is_dense() {
    let (train, test, _) = prepared();
    let x_train = train.feature_matrix().unwrap();
    let x_test = test.feature_matrix().unwrap();

    assert_eq!(x_train.nrows(), 168);
    assert_eq!(x_test.nrows(), 72);
    assert!(x_train.iter().chain(x_test.iter()).all(|v| v.is_finite()));
}

#[test]
fn test_california_preprocessing_is_deterministic() {
    let (a, _, _) = prepared();
    let (b, _, _) = prepared();
    assert!(a.frame().equals(b.frame()));
}

#[test]
fn test_repeated_transform_with_one_fit_is_identical() {
    let data = load_housing();
    let key =
        StratificationKey::from_dataset(&data, &StratificationConfig::california_income()).unwrap();
    let split = stratified_split(&data, &key, 0.3, 42).unwrap();

    let mut preprocessor = ColumnTransformer::california();
    preprocessor.fit(&split.train).unwrap();
    let state_before = preprocessor.fitted_state().unwrap().unwrap();

    let first = preprocessor.transform(&split.test).unwrap();
    let second = preprocessor.transform(&split.test).unwrap();

    assert!(first.frame().equals_missing(second.frame()));
    assert_eq!(first.feature_names(), second.feature_names());
    assert_eq!(preprocessor.fitted_state().unwrap().unwrap(), state_before);
}

#[test]
fn test_fit_state_comes_from_training_rows_only() {
    let data = load_housing();
    let key =
        StratificationKey::from_dataset(&data, &StratificationConfig::california_income()).unwrap();
    let split = stratified_split(&data, &key, 0.3, 42).unwrap();

    let mut on_train = ColumnTransformer::california();
    on_train.fit(&split.train).unwrap();
    let mut on_all = ColumnTransformer::california();
    on_all.fit(&data).unwrap();

    let a = on_train.transform(&split.test).unwrap();
    let b = on_all.transform(&split.test).unwrap();
    assert!(!a.frame().equals(b.frame()));
}
