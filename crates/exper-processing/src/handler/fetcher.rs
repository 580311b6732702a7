//! Transport abstraction for remote datasets.

use crate::error::{ProcessingError, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Retrieves the raw bytes behind a URL.
///
/// Implementations must be `Send + Sync` so a handler can be moved into
/// whatever thread drives the experiment.
pub trait ResourceFetcher: Send + Sync {
    /// Fetch the complete resource at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessingError::DataUnavailable`] when the resource cannot
    /// be reached or the server answers with a non-success status.
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;

    /// Transport name for logging.
    fn name(&self) -> &str;
}

/// Serves resources from memory. Useful for tests and offline runs.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    resources: HashMap<String, Vec<u8>>,
    requests: AtomicUsize,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `body` as the content of `url`.
    pub fn with_resource(mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.resources.insert(url.into(), body.into());
        self
    }

    /// Number of fetches attempted so far, successful or not.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl ResourceFetcher for MemoryFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.resources
            .get(url)
            .cloned()
            .ok_or_else(|| ProcessingError::DataUnavailable {
                location: url.to_string(),
                reason: "no such resource".to_string(),
            })
    }

    fn name(&self) -> &str {
        "memory"
    }
}
