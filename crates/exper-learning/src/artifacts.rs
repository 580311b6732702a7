//! JSON persistence for experiment outputs.
//!
//! An [`ArtifactStore`] is a directory of pretty-printed JSON files, one per
//! artifact. [`ArtifactStore::save_experiment`] writes everything a finished
//! [`Experiment`] produced plus a [`RunManifest`] listing the files.
//!
//! ```text
//! artifacts/lr_vs_nn_experiment_20260101_120000/
//! ├── manifest.json
//! ├── config.json
//! ├── metrics.json
//! ├── plots.json
//! ├── hypothesis.json        (two-model experiments only)
//! ├── holdout.json
//! ├── preprocessor.json
//! └── model_<name>.json      (one per model)
//! ```

use crate::error::{ExperimentError, Result, ResultExt};
use crate::experiment::{Experiment, ExperimentState};
use crate::types::HypothesisReport;
use chrono::{DateTime, Local, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Index of the files written for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub experiment: String,
    pub created_at: DateTime<Utc>,
    pub models: Vec<String>,
    /// Artifact names (without the `.json` extension).
    pub artifacts: Vec<String>,
}

/// A directory of named JSON artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// A store in a fresh `<name>_<YYYYmmdd_HHMMSS>` directory under `parent`.
    pub fn timestamped(parent: impl AsRef<Path>, name: &str) -> Self {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        Self::new(parent.as_ref().join(format!("{}_{}", slug(name), timestamp)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the artifact called `name`.
    pub fn path(&self, name: &str) -> Result<PathBuf> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
            && !name.starts_with('.');
        if !valid {
            return Err(ExperimentError::InvalidInput(format!(
                "invalid artifact name '{}'",
                name
            )));
        }
        Ok(self.root.join(format!("{}.json", name)))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).is_ok_and(|p| p.is_file())
    }

    /// Write `value` as pretty JSON, creating the directory if needed.
    pub fn save<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<PathBuf> {
        let path = self.path(name)?;
        fs::create_dir_all(&self.root)
            .map_err(ExperimentError::from)
            .context(format!("creating {}", self.root.display()))?;
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&path, json)
            .map_err(ExperimentError::from)
            .context(format!("writing {}", path.display()))?;
        debug!(artifact = name, path = %path.display(), "Artifact saved");
        Ok(path)
    }

    pub fn load<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let path = self.path(name)?;
        let json = fs::read_to_string(&path)
            .map_err(ExperimentError::from)
            .context(format!("reading {}", path.display()))?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Persist the outputs of a completed run.
    ///
    /// # Errors
    ///
    /// [`ExperimentError::Configuration`] if the experiment has not completed
    /// a run, plus any I/O or serialization failure.
    pub fn save_experiment(
        &self,
        experiment: &Experiment,
        report: Option<&HypothesisReport>,
    ) -> Result<RunManifest> {
        if experiment.state() != ExperimentState::RunComplete {
            return Err(ExperimentError::Configuration(
                "only a completed run can be saved".to_string(),
            ));
        }

        let mut artifacts = Vec::new();
        let mut save = |name: String, value: serde_json::Value| -> Result<()> {
            self.save(&name, &value)?;
            artifacts.push(name);
            Ok(())
        };

        save("config".to_string(), serde_json::to_value(experiment.config())?)?;
        save("metrics".to_string(), serde_json::to_value(experiment.metrics())?)?;
        save("plots".to_string(), serde_json::to_value(experiment.visualize_results())?)?;
        if let Some(report) = report {
            save("hypothesis".to_string(), serde_json::to_value(report)?)?;
        }
        save("holdout".to_string(), holdout_json(experiment)?)?;
        if let Some(state) = experiment.preprocessor().fitted_state() {
            save("preprocessor".to_string(), state?)?;
        }
        for model in experiment.models() {
            save(format!("model_{}", slug(model.name())), model.to_artifact()?)?;
        }

        let manifest = RunManifest {
            experiment: experiment.config().name.clone(),
            created_at: Utc::now(),
            models: experiment.model_names(),
            artifacts,
        };
        self.save("manifest", &manifest)?;
        info!(
            path = %self.root.display(),
            artifacts = manifest.artifacts.len(),
            "Experiment artifacts saved"
        );
        Ok(manifest)
    }
}

/// Lowercase, filesystem-safe version of a display name.
fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "artifact".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Holdout scores keyed by canonical metric name.
fn holdout_json(experiment: &Experiment) -> Result<serde_json::Value> {
    let scores: BTreeMap<String, BTreeMap<&str, f64>> = experiment
        .holdout_scores()?
        .into_iter()
        .map(|(model, per_metric)| {
            let per_metric = per_metric.into_iter().map(|(m, v)| (m.as_str(), v)).collect();
            (model, per_metric)
        })
        .collect();
    Ok(serde_json::to_value(scores)?)
}
