//! Data preparation for regression experiments.
//!
//! A high-performance data preparation library built with Rust and Polars.
//!
//! # Overview
//!
//! - **Acquisition**: [`DataHandler`] loads a cached CSV or retrieves it
//!   through a [`ResourceFetcher`] (HTTP by default) and caches it.
//! - **Splitting**: [`stratified_split`] draws a seeded train/test split that
//!   preserves the proportions of a binned column.
//! - **Preprocessing**: [`ColumnTransformer`] implements [`Preprocessor`]
//!   with imputation, ratios, log transforms, geospatial cluster similarity,
//!   one-hot encoding and standardization, fitted on training data only.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use exper_processing::handler::{ApiHandler, HttpFetcher, HOUSING_DATA_URL, HOUSING_TARGET};
//! use exper_processing::{
//!     ColumnTransformer, DataHandler, Preprocessor, StratificationConfig, StratificationKey,
//!     stratified_split,
//! };
//! use std::path::Path;
//!
//! let handler = ApiHandler::new(HttpFetcher::new()?, HOUSING_TARGET);
//! let data = handler.load_data(Path::new("data/housing.csv"), HOUSING_DATA_URL)?;
//!
//! let key = StratificationKey::from_dataset(&data, &StratificationConfig::california_income())?;
//! let split = stratified_split(&data, &key, 0.3, 42)?;
//!
//! let mut preprocessor = ColumnTransformer::california();
//! let train = preprocessor.preprocess(split.train, true)?;
//! let test = preprocessor.transform(&split.test)?;
//! ```

pub mod dataset;
pub mod error;
pub mod handler;
pub mod imputers;
pub mod pipeline;
pub mod split;
pub mod transform;
pub mod utils;

// Re-exports for convenient access
pub use dataset::Dataset;
pub use error::{ProcessingError, Result as ProcessingResult, ResultExt};
pub use handler::{ApiHandler, DataHandler, MemoryFetcher, ResourceFetcher};
#[cfg(feature = "http")]
pub use handler::HttpFetcher;
pub use imputers::{MedianImputer, MostFrequentImputer};
pub use pipeline::{
    ColumnSelection, ColumnTransformer, ColumnTransformerBuilder, FittedColumnTransformer,
    Preprocessor, Remainder, TransformerSpec,
};
pub use split::{
    SplitSummary, StratificationConfig, StratificationKey, TrainTestSplit, stratified_split,
};
pub use transform::{ClusterSimilarity, KMeans, OneHotEncoder, StandardScaler};
pub use utils::{DtypeCategory, get_dtype_category, is_numeric_dtype};
