//! Data acquisition.
//!
//! A [`DataHandler`] turns a local path plus a remote URL into a loaded
//! [`Dataset`](crate::Dataset). The bundled [`ApiHandler`] reads the local
//! file when it exists and otherwise retrieves the resource through a
//! [`ResourceFetcher`], caching it at the local path first.
//!
//! # Feature Flag
//!
//! [`HttpFetcher`] requires the `http` feature (enabled by default). The
//! [`ResourceFetcher`] trait is always available so tests and offline
//! deployments can supply their own transport.
//!
//! ```toml
//! # Disable HTTP retrieval for offline builds
//! exper-processing = { version = "0.1", default-features = false }
//! ```

mod api;
mod fetcher;
#[cfg(feature = "http")]
mod http;

pub use api::{ApiHandler, DataHandler, read_csv};
pub use fetcher::{MemoryFetcher, ResourceFetcher};
#[cfg(feature = "http")]
pub use http::{HttpFetcher, HttpFetcherConfig};

/// Public copy of the California census housing extract.
pub const HOUSING_DATA_URL: &str =
    "https://raw.githubusercontent.com/ageron/handson-ml2/master/datasets/housing/housing.csv";

/// Regression target of the California housing data.
pub const HOUSING_TARGET: &str = "median_house_value";
