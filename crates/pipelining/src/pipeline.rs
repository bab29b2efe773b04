//! Pipeline driver that runs stages in order.

use crate::step_fn::panic_details;
use futures::FutureExt;
use pipelining_core::{Context, PipelineError, SharedLogger, Stage, TracingLogger};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

/// Lifecycle of a pipeline's most recent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    /// No run has started yet.
    #[default]
    Idle,
    /// A run is in progress.
    Running,
    /// The last run finished every stage.
    Completed,
    /// The last run stopped at a failing stage.
    Failed,
}

/// An ordered list of stages run against one shared [`Context`].
///
/// Stages run strictly one after another. The first stage error stops the
/// run and is returned to the caller unchanged; later stages never start.
pub struct Pipeline {
    name: String,
    stages: Vec<Box<dyn Stage>>,
    logger: SharedLogger,
    state: PipelineState,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("stages", &self.stage_names().collect::<Vec<_>>())
            .field("state", &self.state)
            .finish()
    }
}

impl Pipeline {
    /// Creates a pipeline that logs through a [`TracingLogger`] tagged with
    /// its name.
    pub fn new(stages: Vec<Box<dyn Stage>>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            logger: TracingLogger::new(name.clone()).shared(),
            name,
            stages,
            state: PipelineState::Idle,
        }
    }

    /// Creates a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Returns the pipeline name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the stage names in run order.
    pub fn stage_names(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(|s| s.name())
    }

    /// Returns the number of stages.
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Returns the state of the most recent run.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Runs every stage against a fresh, empty context.
    pub async fn run(&mut self) -> Result<Context, PipelineError> {
        self.run_with(Context::new()).await
    }

    /// Runs every stage against `ctx` and hands the same context back.
    pub async fn run_with(&mut self, ctx: Context) -> Result<Context, PipelineError> {
        self.state = PipelineState::Running;
        let started = Instant::now();
        self.logger.info(&format!(
            "Running pipeline '{}' with {} stage(s).",
            self.name,
            self.stages.len()
        ));

        for stage in &mut self.stages {
            stage.set_logger(Arc::clone(&self.logger));
            let stage_name = stage.name().to_string();
            self.logger.info(&format!("Starting stage: {}", stage_name));

            if let Err(e) = run_stage_guarded(&**stage, &ctx).await {
                self.logger.error(
                    &format!("Pipeline '{}' failed at stage '{}'", self.name, stage_name),
                    &e,
                );
                self.state = PipelineState::Failed;
                return Err(e);
            }

            self.logger.info(&format!("Finished stage: {}", stage_name));
        }

        self.state = PipelineState::Completed;
        self.logger.info(&format!(
            "Pipeline '{}' completed in {}ms.",
            self.name,
            started.elapsed().as_millis()
        ));
        Ok(ctx)
    }
}

/// Runs a stage, turning a panic inside it into [`PipelineError::StagePanicked`].
async fn run_stage_guarded(stage: &dyn Stage, ctx: &Context) -> Result<(), PipelineError> {
    match AssertUnwindSafe(stage.run(ctx)).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(PipelineError::StagePanicked {
            stage_name: stage.name().to_string(),
            details: panic_details(payload.as_ref()),
        }),
    }
}

/// Builder for constructing [`Pipeline`] instances.
#[derive(Default)]
pub struct PipelineBuilder {
    name: Option<String>,
    stages: Vec<Box<dyn Stage>>,
    logger: Option<SharedLogger>,
}

impl PipelineBuilder {
    /// Creates a new empty pipeline builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the pipeline name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Appends a stage.
    pub fn stage<S: Stage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Appends an already boxed stage.
    pub fn boxed_stage(mut self, stage: Box<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Replaces the logger injected into every stage.
    pub fn logger(mut self, logger: SharedLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Builds the pipeline.
    pub fn build(self) -> Result<Pipeline, PipelineError> {
        let name = self.name.ok_or_else(|| {
            PipelineError::Configuration("Pipeline name must be specified".to_string())
        })?;
        if name.trim().is_empty() {
            return Err(PipelineError::Configuration(
                "Pipeline name must not be empty".to_string(),
            ));
        }

        let mut pipeline = Pipeline::new(self.stages, name);
        if let Some(logger) = self.logger {
            pipeline.logger = logger;
        }
        Ok(pipeline)
    }
}
