//! Progress reporting for experiment runs.
//!
//! This module defines [`ExperimentStage`], [`ProgressUpdate`] and the
//! [`ProgressReporter`] trait through which an [`Experiment`](crate::Experiment)
//! reports where it is.
//!
//! # Example
//!
//! ```no_run
//! use exper_learning::{ExperimentStage, ProgressUpdate};
//!
//! let on_progress = |update: ProgressUpdate| {
//!     println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     if update.stage == ExperimentStage::Training {
//!         if let Some((done, total)) = update.models_completed {
//!             println!("  Models: {}/{}", done, total);
//!         }
//!     }
//! };
//! # on_progress(ProgressUpdate::complete("done"));
//! ```

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The current stage of an experiment run.
///
/// A run progresses through these stages in order:
///
/// 1. [`Initializing`](Self::Initializing)
/// 2. [`Loading`](Self::Loading) - reading or retrieving the dataset
/// 3. [`Splitting`](Self::Splitting) - stratified train/test split
/// 4. [`Preprocessing`](Self::Preprocessing) - fitting the preprocessor on the training rows
/// 5. [`Training`](Self::Training) - sweeping every model
/// 6. [`Complete`](Self::Complete)
///
/// Terminal states: [`Complete`](Self::Complete), [`Failed`](Self::Failed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ExperimentStage {
    #[default]
    Initializing,
    Loading,
    Splitting,
    Preprocessing,
    Training,
    Complete,
    Failed,
}

impl ExperimentStage {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Loading => "loading",
            Self::Splitting => "splitting",
            Self::Preprocessing => "preprocessing",
            Self::Training => "training",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }

    /// Human-readable name for status lines.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Initializing => "Initializing",
            Self::Loading => "Loading Dataset",
            Self::Splitting => "Splitting Data",
            Self::Preprocessing => "Preprocessing Features",
            Self::Training => "Training Models",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
        }
    }

    /// Share of the overall run spent in this stage.
    #[must_use]
    pub fn weight(&self) -> f64 {
        match self {
            Self::Initializing => 0.01,
            Self::Loading => 0.04,
            Self::Splitting => 0.02,
            Self::Preprocessing => 0.08,
            Self::Training => 0.85,
            Self::Complete | Self::Failed => 0.0,
        }
    }

    /// Overall progress when this stage starts.
    #[must_use]
    pub fn base_progress(&self) -> f64 {
        match self {
            Self::Initializing => 0.0,
            Self::Loading => 0.01,
            Self::Splitting => 0.05,
            Self::Preprocessing => 0.07,
            Self::Training => 0.15,
            Self::Complete => 1.0,
            Self::Failed => 0.0,
        }
    }

    /// Returns `true` for [`Complete`](Self::Complete) and [`Failed`](Self::Failed).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// Error type for parsing an [`ExperimentStage`] from a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseExperimentStageError {
    invalid_value: String,
}

impl ParseExperimentStageError {
    /// Returns the invalid value that caused the parse error.
    #[must_use]
    pub fn invalid_value(&self) -> &str {
        &self.invalid_value
    }
}

impl std::fmt::Display for ParseExperimentStageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid experiment stage: '{}'. Valid values are: initializing, loading, \
             splitting, preprocessing, training, complete, failed",
            self.invalid_value
        )
    }
}

impl std::error::Error for ParseExperimentStageError {}

impl FromStr for ExperimentStage {
    type Err = ParseExperimentStageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initializing" => Ok(Self::Initializing),
            "loading" => Ok(Self::Loading),
            "splitting" => Ok(Self::Splitting),
            "preprocessing" => Ok(Self::Preprocessing),
            "training" => Ok(Self::Training),
            "complete" => Ok(Self::Complete),
            "failed" => Ok(Self::Failed),
            _ => Err(ParseExperimentStageError {
                invalid_value: s.to_string(),
            }),
        }
    }
}

/// A progress update from an experiment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: ExperimentStage,

    /// Overall progress from 0.0 to 1.0.
    pub progress: f64,

    /// Human-readable status message.
    pub message: String,

    /// Model currently being trained, during [`Training`](ExperimentStage::Training).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_model: Option<String>,

    /// `(completed, total)` models, during [`Training`](ExperimentStage::Training).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models_completed: Option<(usize, usize)>,
}

impl Default for ProgressUpdate {
    fn default() -> Self {
        Self {
            stage: ExperimentStage::default(),
            progress: 0.0,
            message: String::new(),
            current_model: None,
            models_completed: None,
        }
    }
}

impl ProgressUpdate {
    /// An update at the start of `stage`.
    pub fn new(stage: ExperimentStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            progress: stage.base_progress(),
            message: message.into(),
            ..Self::default()
        }
    }

    /// A training update: `completed` of `total` models are done and
    /// `model` is next (or was the last one finished).
    pub fn training(model: impl Into<String>, completed: usize, total: usize) -> Self {
        let stage = ExperimentStage::Training;
        let fraction = if total > 0 {
            completed as f64 / total as f64
        } else {
            0.0
        };
        let model = model.into();
        Self {
            stage,
            progress: (stage.base_progress() + stage.weight() * fraction).clamp(0.0, 1.0),
            message: format!("Training {} ({}/{})", model, completed, total),
            current_model: Some(model),
            models_completed: Some((completed, total)),
        }
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self::new(ExperimentStage::Complete, message)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(ExperimentStage::Failed, message)
    }
}

/// Receives progress updates during [`Experiment::run`](crate::Experiment::run).
///
/// Implementations must be `Send + Sync`; they are called synchronously
/// from the run and should return quickly.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// Wrapper that implements [`ProgressReporter`] using a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}
