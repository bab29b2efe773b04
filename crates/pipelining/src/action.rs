//! Single-action stage.

use async_trait::async_trait;
use pipelining_core::{Context, PipelineError, SharedLogger, Stage, TracingLogger};
use std::fmt;
use std::future::Future;

/// A stage that runs one async closure against the context.
///
/// The start and successful end of the action are reported through the
/// injected logger; failures are returned unchanged for the pipeline to log.
///
/// # Examples
///
/// ```
/// use pipelining::ActionStage;
/// use pipelining_core::Stage;
///
/// let stage = ActionStage::new("load", |ctx| async move {
///     ctx.insert("rows", 42usize);
///     Ok(())
/// });
/// assert_eq!(stage.name(), "load");
/// ```
pub struct ActionStage<F> {
    name: String,
    action: F,
    logger: SharedLogger,
}

impl<F, Fut> ActionStage<F>
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), PipelineError>> + Send + 'static,
{
    /// Creates a stage that runs `action` each time the stage runs.
    pub fn new(name: impl Into<String>, action: F) -> Self {
        Self {
            name: name.into(),
            action,
            logger: TracingLogger::default().shared(),
        }
    }
}

impl<F> ActionStage<F> {
    /// Returns the logger currently injected into this stage.
    pub fn logger(&self) -> &SharedLogger {
        &self.logger
    }
}

impl<F> fmt::Debug for ActionStage<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionStage")
            .field("name", &self.name)
            .field("logger", &self.logger)
            .finish()
    }
}

#[async_trait]
impl<F, Fut> Stage for ActionStage<F>
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), PipelineError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn set_logger(&mut self, logger: SharedLogger) {
        self.logger = logger;
    }

    async fn run(&self, ctx: &Context) -> Result<(), PipelineError> {
        self.logger.info(&format!("\tRunning action: {}", self.name));
        (self.action)(ctx.clone()).await?;
        self.logger
            .info(&format!("\tAction '{}' completed successfully!", self.name));
        Ok(())
    }
}
