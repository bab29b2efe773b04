//! Stage trait and stage configuration.

use crate::context::Context;
use crate::error::PipelineError;
use crate::logger::SharedLogger;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};

/// Default bound on concurrently running steps in parallel mode.
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// How a stage runs its steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One step at a time, in declaration order.
    #[default]
    Sequential,
    /// All steps submitted at once to a bounded worker pool.
    Parallel,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Sequential => write!(f, "sequential"),
            ExecutionMode::Parallel => write!(f, "parallel"),
        }
    }
}

/// Configuration for a multi-step stage.
///
/// # Examples
///
/// ```
/// use pipelining_core::{ExecutionMode, StageConfig};
///
/// let config = StageConfig {
///     mode: ExecutionMode::Parallel,
///     max_workers: 2,
///     ..StageConfig::default()
/// };
/// assert!(config.validate().is_ok());
/// assert!(!config.cancel_on_failure);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    /// Sequential or parallel execution. Default: sequential.
    pub mode: ExecutionMode,
    /// Maximum number of steps running at once in parallel mode. Default: 4.
    pub max_workers: usize,
    /// Abort still-running sibling steps once one step fails. Default: false,
    /// which lets every submitted step run to completion before the failure
    /// is returned.
    pub cancel_on_failure: bool,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Sequential,
            max_workers: DEFAULT_MAX_WORKERS,
            cancel_on_failure: false,
        }
    }
}

impl StageConfig {
    /// Checks that the configuration can be executed.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.max_workers == 0 {
            return Err(PipelineError::Configuration(
                "max_workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// A named unit of pipeline work.
///
/// Stages are immutable once assembled except for the logger, which the
/// pipeline injects through [`Stage::set_logger`] before calling
/// [`Stage::run`].
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the stage name used in log records.
    fn name(&self) -> &str;

    /// Replaces the logger this stage reports through.
    fn set_logger(&mut self, logger: SharedLogger);

    /// Runs the stage against the shared context.
    ///
    /// Any error is returned to the pipeline unchanged.
    async fn run(&self, ctx: &Context) -> Result<(), PipelineError>;
}
