//! Logger capability injected into stages.

use crate::error::PipelineError;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{error, info};

/// Sink for the progress and failure records a pipeline emits.
///
/// A pipeline hands its logger to every stage before running it; stages
/// route all of their records through that reference.
pub trait Logger: Send + Sync + Debug {
    /// Records a progress message.
    fn info(&self, message: &str);

    /// Records a failure together with the error that caused it.
    fn error(&self, message: &str, error: &PipelineError);
}

/// Shared handle to a [`Logger`].
pub type SharedLogger = Arc<dyn Logger>;

/// Logger that forwards records as `tracing` events.
///
/// Every event carries a `pipeline` field naming the emitter. Installing a
/// subscriber is left to the application.
#[derive(Debug, Clone)]
pub struct TracingLogger {
    pipeline: String,
}

impl TracingLogger {
    /// Creates a logger that tags events with the given pipeline name.
    pub fn new(pipeline: impl Into<String>) -> Self {
        Self {
            pipeline: pipeline.into(),
        }
    }

    /// Returns the pipeline name attached to events.
    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }

    /// Wraps the logger in a [`SharedLogger`].
    pub fn shared(self) -> SharedLogger {
        Arc::new(self)
    }
}

impl Default for TracingLogger {
    fn default() -> Self {
        Self::new("pipeline")
    }
}

impl Logger for TracingLogger {
    fn info(&self, message: &str) {
        info!(pipeline = %self.pipeline, "{}", message);
    }

    fn error(&self, message: &str, err: &PipelineError) {
        error!(pipeline = %self.pipeline, error = %err, "{}", message);
    }
}
