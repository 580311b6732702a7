//! Local-first dataset loading with remote fallback.

use super::fetcher::ResourceFetcher;
use crate::dataset::Dataset;
use crate::error::{ProcessingError, Result};
use polars::prelude::*;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{Span, debug, info, info_span, warn};

/// Loads a labelled dataset from a local path, retrieving it from `url` when needed.
pub trait DataHandler: Send {
    /// Load the dataset cached at `file_path`, fetching it from `url` first if required.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessingError::DataUnavailable`] when neither a readable
    /// local file nor a reachable, well-formed remote resource exists.
    fn load_data(&self, file_path: &Path, url: &str) -> Result<Dataset>;
}

/// The default [`DataHandler`].
///
/// Reads `file_path` when it exists. Otherwise (or when `force_retrieve` is
/// set) the resource at `url` is fetched, written to `file_path` (creating
/// parent directories) and then read back, so subsequent loads hit the cache.
///
/// The cache file only appears once the whole body has been written. A
/// retrieved file that cannot be parsed or lacks the target column is
/// removed again and reported as [`ProcessingError::DataUnavailable`].
pub struct ApiHandler<F> {
    fetcher: F,
    target: String,
    force_retrieve: bool,
    span: Span,
}

impl<F: ResourceFetcher> ApiHandler<F> {
    /// Create a handler that labels loaded data with `target`.
    pub fn new(fetcher: F, target: impl Into<String>) -> Self {
        let target = target.into();
        let span = info_span!("data_handler", fetcher = fetcher.name(), target = %target);
        Self {
            fetcher,
            target,
            force_retrieve: false,
            span,
        }
    }

    /// Always re-fetch the remote resource, overwriting any cached copy.
    pub fn force_retrieve(mut self, force: bool) -> Self {
        self.force_retrieve = force;
        self
    }

    /// Attach an externally created span (e.g. a child of the experiment span).
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    fn retrieve(&self, file_path: &Path, url: &str) -> Result<()> {
        if url.trim().is_empty() {
            return Err(ProcessingError::DataUnavailable {
                location: file_path.display().to_string(),
                reason: "file does not exist and no URL was given".to_string(),
            });
        }

        info!(parent: &self.span, url, path = %file_path.display(), "Retrieving dataset");
        let body = self.fetcher.fetch(url)?;

        let dir = match file_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;
        let mut staged = NamedTempFile::new_in(dir)?;
        staged.write_all(&body)?;
        staged.as_file().sync_all()?;
        staged.persist(file_path).map_err(|e| e.error)?;
        debug!(parent: &self.span, bytes = body.len(), "Dataset cached");
        Ok(())
    }

    fn read(&self, file_path: &Path) -> Result<Dataset> {
        let frame = read_csv(file_path)?;
        info!(
            parent: &self.span,
            rows = frame.height(),
            columns = frame.width(),
            "Dataset loaded"
        );
        Dataset::new(frame, &self.target)
    }
}

impl<F: ResourceFetcher> DataHandler for ApiHandler<F> {
    fn load_data(&self, file_path: &Path, url: &str) -> Result<Dataset> {
        if !self.force_retrieve && file_path.exists() {
            debug!(parent: &self.span, path = %file_path.display(), "Using cached dataset");
            return self.read(file_path);
        }

        self.retrieve(file_path, url)?;
        self.read(file_path).map_err(|e| {
            warn!(parent: &self.span, url, error = %e, "Discarding unusable download");
            if let Err(remove) = fs::remove_file(file_path) {
                warn!(parent: &self.span, error = %remove, "Could not remove cached file");
            }
            match e {
                unavailable @ ProcessingError::DataUnavailable { .. } => unavailable,
                other => ProcessingError::DataUnavailable {
                    location: url.to_string(),
                    reason: other.to_string(),
                },
            }
        })
    }
}

/// Read a headered CSV file into a frame.
///
/// Parse failures are reported as [`ProcessingError::DataUnavailable`] since
/// a malformed file is as unusable as a missing one.
pub fn read_csv(path: &Path) -> Result<DataFrame> {
    CsvReadOptions::default()
        .with_infer_schema_length(Some(10_000))
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .map_err(|e| ProcessingError::DataUnavailable {
            location: path.display().to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::MemoryFetcher;
    use tempfile::tempdir;

    const URL: &str = "mem://housing.csv";
    const CSV: &str = "median_income,median_house_value\n1.5,100000\n3.2,250000\n";

    #[test]
    fn test_fetches_and_caches_when_missing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/data/housing.csv");
        let handler = ApiHandler::new(
            MemoryFetcher::new().with_resource(URL, CSV),
            "median_house_value",
        );

        let first = handler.load_data(&path, URL).unwrap();
        assert!(path.exists());
        let second = handler.load_data(&path, URL).unwrap();

        assert_eq!(handler.fetcher().request_count(), 1);
        assert_eq!(first.height(), 2);
        assert!(first.frame().equals(second.frame()));
    }

    #[test]
    fn test_force_retrieve_refetches() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("housing.csv");
        fs::write(&path, "median_income,median_house_value\n9.9,1\n").unwrap();

        let handler = ApiHandler::new(
            MemoryFetcher::new().with_resource(URL, CSV),
            "median_house_value",
        )
        .force_retrieve(true);

        let data = handler.load_data(&path, URL).unwrap();
        assert_eq!(handler.fetcher().request_count(), 1);
        assert_eq!(data.height(), 2);
    }

    #[test]
    fn test_missing_file_and_unreachable_url() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("housing.csv");
        let handler = ApiHandler::new(MemoryFetcher::new(), "median_house_value");

        let err = handler.load_data(&path, URL).unwrap_err();
        assert!(err.is_data_unavailable());
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_file_and_empty_url() {
        let dir = tempdir().unwrap();
        let handler = ApiHandler::new(MemoryFetcher::new(), "median_house_value");
        let err = handler.load_data(&dir.path().join("x.csv"), "").unwrap_err();
        assert!(err.is_data_unavailable());
        assert_eq!(handler.fetcher().request_count(), 0);
    }

    #[test]
    fn test_download_without_target_is_not_cached() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("housing.csv");
        let handler = ApiHandler::new(
            MemoryFetcher::new().with_resource(URL, "a,b\n1,2\n"),
            "median_house_value",
        );

        let err = handler.load_data(&path, URL).unwrap_err();
        assert!(err.is_data_unavailable());
        assert!(!path.exists());

        // The next load fetches again instead of reusing a broken cache.
        handler.load_data(&path, URL).unwrap_err();
        assert_eq!(handler.fetcher().request_count(), 2);
    }

    #[test]
    fn test_cached_file_without_target_column() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("housing.csv");
        fs::write(&path, CSV).unwrap();
        let handler = ApiHandler::new(MemoryFetcher::new(), "price");

        let err = handler.load_data(&path, URL).unwrap_err();
        assert_eq!(err.error_code(), "COLUMN_NOT_FOUND");
        assert!(path.exists());
        assert_eq!(handler.fetcher().request_count(), 0);
    }

    #[test]
    fn test_cache_write_leaves_no_staging_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("housing.csv");
        let handler = ApiHandler::new(
            MemoryFetcher::new().with_resource(URL, CSV),
            "median_house_value",
        );
        handler.load_data(&path, URL).unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("housing.csv")]);
        assert_eq!(fs::read_to_string(&path).unwrap(), CSV);
    }
}
