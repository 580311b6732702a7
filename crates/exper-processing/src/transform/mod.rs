//! Fitted column transformers.
//!
//! Every transformer here follows the same shape: a `fit` constructor that
//! learns its state from training columns and a `transform` method that
//! applies that frozen state to any later columns. They operate on
//! column-major `Vec<Vec<_>>` data and know nothing about frames; the
//! [`ColumnTransformer`](crate::pipeline::ColumnTransformer) wires them to
//! named dataset columns.

mod cluster;
mod encode;
mod scale;

pub use cluster::{ClusterSimilarity, KMeans};
pub use encode::OneHotEncoder;
pub use scale::StandardScaler;
