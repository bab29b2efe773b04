//! Pipeline error types.

use crate::step::StepName;
use thiserror::Error;

/// Errors that can occur while running a pipeline.
///
/// Every layer (step, stage, pipeline) hands the originating value back up
/// unchanged, so the variant the caller sees is the one the failing step
/// produced.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PipelineError {
    /// A step reported a failure.
    #[error("Step failed: {step_name}, details: {details}")]
    StepError {
        /// The name of the step that failed.
        step_name: StepName,
        /// Details about the failure.
        details: String,
    },

    /// An ad-hoc failure raised by a stage or step action.
    #[error("{0}")]
    Failed(String),

    /// A step panicked while running on a worker.
    #[error("Step '{step_name}' panicked: {details}")]
    Panicked {
        /// The name of the step that panicked.
        step_name: StepName,
        /// The panic payload, when it was a string.
        details: String,
    },

    /// A stage panicked outside of any step.
    #[error("Stage '{stage_name}' panicked: {details}")]
    StagePanicked {
        /// The name of the stage that panicked.
        stage_name: String,
        /// The panic payload, when it was a string.
        details: String,
    },

    /// A stage or pipeline was configured with invalid settings.
    #[error("Invalid pipeline configuration: {0}")]
    Configuration(String),
}

impl PipelineError {
    /// Creates a [`PipelineError::Failed`] from any message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Creates a [`PipelineError::StepError`] for the named step.
    pub fn step(step_name: impl Into<StepName>, details: impl Into<String>) -> Self {
        Self::StepError {
            step_name: step_name.into(),
            details: details.into(),
        }
    }

    /// Returns the step this error is attributed to, if any.
    pub fn step_name(&self) -> Option<&StepName> {
        match self {
            Self::StepError { step_name, .. } | Self::Panicked { step_name, .. } => {
                Some(step_name)
            }
            _ => None,
        }
    }
}

/// A specialized `Result` type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
