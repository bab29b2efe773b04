//! Stage composed of multiple steps.

use crate::step_fn::execute_guarded;
use async_trait::async_trait;
use pipelining_core::{
    Context, ExecutionMode, PipelineError, SharedLogger, Stage, StageConfig, Step, TracingLogger,
};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

/// A stage that runs an ordered list of steps, one at a time or on a bounded
/// worker pool.
///
/// In sequential mode steps run in declaration order and the first failure
/// stops the stage. In parallel mode every step is submitted up front, at
/// most `max_workers` of them run at once, and completions are handled in
/// the order they finish. The first failure observed is the stage's result.
pub struct MultiStepStage {
    name: String,
    steps: Vec<Arc<dyn Step>>,
    config: StageConfig,
    logger: SharedLogger,
}

impl fmt::Debug for MultiStepStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiStepStage")
            .field("name", &self.name)
            .field(
                "steps",
                &self.steps.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .field("config", &self.config)
            .finish()
    }
}

impl MultiStepStage {
    /// Creates a sequential stage with the default configuration.
    pub fn new(name: impl Into<String>, steps: Vec<Arc<dyn Step>>) -> Self {
        Self {
            name: name.into(),
            steps,
            config: StageConfig::default(),
            logger: TracingLogger::default().shared(),
        }
    }

    /// Creates a parallel stage bounded by `max_workers`.
    pub fn parallel(
        name: impl Into<String>,
        steps: Vec<Arc<dyn Step>>,
        max_workers: usize,
    ) -> Result<Self, PipelineError> {
        Self::builder(name)
            .steps(steps)
            .parallel(true)
            .max_workers(max_workers)
            .build()
    }

    /// Creates a new stage builder.
    pub fn builder(name: impl Into<String>) -> MultiStepStageBuilder {
        MultiStepStageBuilder::new(name)
    }

    /// Returns the stage configuration.
    pub fn config(&self) -> &StageConfig {
        &self.config
    }

    /// Returns the number of steps.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    async fn run_sequential(&self, ctx: &Context) -> Result<(), PipelineError> {
        for step in &self.steps {
            let step_name = step.name();
            self.logger.info(&format!("\tRunning step: {}", step_name));

            if let Err(e) = execute_guarded(step.as_ref(), ctx).await {
                self.logger.error(&format!("Error in step {}", step_name), &e);
                return Err(e);
            }

            self.logger
                .info(&format!("\tStep '{}' completed successfully!", step_name));
        }
        Ok(())
    }

    async fn run_parallel(&self, ctx: &Context) -> Result<(), PipelineError> {
        let permits = self.config.max_workers.clamp(1, Semaphore::MAX_PERMITS);
        let workers = Arc::new(Semaphore::new(permits));
        let mut tasks = JoinSet::new();

        for step in &self.steps {
            let step = Arc::clone(step);
            let ctx = ctx.clone();
            let workers = Arc::clone(&workers);
            tasks.spawn(async move {
                let step_name = step.name();
                let result = match workers.acquire_owned().await {
                    Ok(_permit) => execute_guarded(step.as_ref(), &ctx).await,
                    Err(_) => Err(PipelineError::msg(format!(
                        "Worker pool closed before step '{}' could start",
                        step_name
                    ))),
                };
                (step_name, result)
            });
        }

        let mut failure = None;
        while let Some(joined) = tasks.join_next().await {
            let (step_name, result) = match joined {
                Ok(outcome) => outcome,
                Err(e) if e.is_cancelled() => continue,
                Err(e) => {
                    // Panics are caught inside the task, so this is a runtime fault.
                    let err = PipelineError::msg(format!("Step task failed: {}", e));
                    self.logger.error("Error in step task", &err);
                    if failure.is_none() {
                        failure = Some(err);
                    }
                    continue;
                }
            };

            if failure.is_some() {
                match result {
                    Ok(()) => {
                        debug!(stage = %self.name, step = %step_name, "step finished after stage failure")
                    }
                    Err(e) => {
                        debug!(stage = %self.name, step = %step_name, error = %e, "additional step failure")
                    }
                }
                continue;
            }

            match result {
                Ok(()) => self
                    .logger
                    .info(&format!("\tStep '{}' completed successfully!", step_name)),
                Err(e) => {
                    self.logger.error(&format!("Error in step {}", step_name), &e);
                    if self.config.cancel_on_failure {
                        tasks.abort_all();
                    }
                    failure = Some(e);
                }
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Stage for MultiStepStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_logger(&mut self, logger: SharedLogger) {
        self.logger = logger;
    }

    async fn run(&self, ctx: &Context) -> Result<(), PipelineError> {
        self.logger.info(&format!(
            "Running {} in {} mode with {} step(s).",
            self.name,
            self.config.mode,
            self.steps.len()
        ));

        match self.config.mode {
            ExecutionMode::Sequential => self.run_sequential(ctx).await,
            ExecutionMode::Parallel => self.run_parallel(ctx).await,
        }
    }
}

/// Builder for constructing [`MultiStepStage`] instances.
pub struct MultiStepStageBuilder {
    name: String,
    steps: Vec<Arc<dyn Step>>,
    config: StageConfig,
}

impl MultiStepStageBuilder {
    /// Creates a builder for a stage with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            config: StageConfig::default(),
        }
    }

    /// Appends a step.
    pub fn step<S: Step + 'static>(mut self, step: S) -> Self {
        self.steps.push(Arc::new(step));
        self
    }

    /// Appends already shared steps.
    pub fn steps(mut self, steps: impl IntoIterator<Item = Arc<dyn Step>>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// Selects parallel (`true`) or sequential (`false`) execution.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.config.mode = if parallel {
            ExecutionMode::Parallel
        } else {
            ExecutionMode::Sequential
        };
        self
    }

    /// Sets the worker limit used in parallel mode.
    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.config.max_workers = max_workers;
        self
    }

    /// Aborts still-running steps once one step fails.
    pub fn cancel_on_failure(mut self, cancel: bool) -> Self {
        self.config.cancel_on_failure = cancel;
        self
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: StageConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the stage.
    pub fn build(self) -> Result<MultiStepStage, PipelineError> {
        self.config.validate()?;
        Ok(MultiStepStage {
            name: self.name,
            steps: self.steps,
            config: self.config,
            logger: TracingLogger::default().shared(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FnStep;
    use pipelining_core::Logger;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct RecordingLogger {
        lines: Mutex<Vec<String>>,
    }

    impl RecordingLogger {
        fn lines(&self) -> Vec<String> {
            self.lines.lock().map(|l| l.clone()).unwrap_or_default()
        }
    }

    impl Logger for RecordingLogger {
        fn info(&self, message: &str) {
            if let Ok(mut lines) = self.lines.lock() {
                lines.push(format!("INFO {}", message));
            }
        }

        fn error(&self, message: &str, error: &PipelineError) {
            if let Ok(mut lines) = self.lines.lock() {
                lines.push(format!("ERROR {}: {}", message, error));
            }
        }
    }

    type Ready = futures::future::Ready<Result<(), PipelineError>>;

    fn push_step(name: &'static str) -> FnStep<impl Fn(Context) -> Ready + Send + Sync> {
        FnStep::new(name, move |ctx: Context| {
            ctx.get_or_insert_with("order", Vec::<&'static str>::new, |order| {
                order.push(name)
            });
            futures::future::ready(Ok(()))
        })
    }

    #[tokio::test]
    async fn test_sequential_runs_in_declaration_order() {
        let mut stage = MultiStepStage::builder("seq")
            .step(push_step("a"))
            .step(push_step("b"))
            .step(push_step("c"))
            .build()
            .expect("valid stage");
        let logger = Arc::new(RecordingLogger::default());
        stage.set_logger(logger.clone());

        let ctx = Context::new();
        stage.run(&ctx).await.expect("stage succeeds");

        assert_eq!(ctx.get::<Vec<&str>>("order"), Some(vec!["a", "b", "c"]));
        assert_eq!(
            logger.lines(),
            vec![
                "INFO Running seq in sequential mode with 3 step(s).",
                "INFO \tRunning step: a",
                "INFO \tStep 'a' completed successfully!",
                "INFO \tRunning step: b",
                "INFO \tStep 'b' completed successfully!",
                "INFO \tRunning step: c",
                "INFO \tStep 'c' completed successfully!",
            ]
        );
    }

    #[tokio::test]
    async fn test_sequential_failure_skips_remaining_steps() {
        let mut stage = MultiStepStage::builder("seq")
            .step(push_step("a"))
            .step(FnStep::new("b", |_ctx: Context| async move {
                Err(PipelineError::step("b", "bad input"))
            }))
            .step(push_step("c"))
            .build()
            .expect("valid stage");
        let logger = Arc::new(RecordingLogger::default());
        stage.set_logger(logger.clone());

        let ctx = Context::new();
        let err = stage.run(&ctx).await.expect_err("stage fails");

        assert_eq!(err.to_string(), "Step failed: b, details: bad input");
        assert_eq!(ctx.get::<Vec<&str>>("order"), Some(vec!["a"]));
        assert_eq!(
            logger.lines().last().map(String::as_str),
            Some("ERROR Error in step b: Step failed: b, details: bad input")
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_runs_every_step() {
        let mut builder = MultiStepStage::builder("par").parallel(true).max_workers(3);
        for i in 0..10u32 {
            builder = builder.step(FnStep::new(
                format!("step_{}", i),
                move |ctx: Context| async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    ctx.insert(format!("done_{}", i), i);
                    Ok(())
                },
            ));
        }
        let stage = builder.build().expect("valid stage");

        let ctx = Context::new();
        stage.run(&ctx).await.expect("stage succeeds");

        for i in 0..10u32 {
            assert_eq!(ctx.get::<u32>(&format!("done_{}", i)), Some(i));
        }
    }

    #[tokio::test]
    async fn test_parallel_logs_in_completion_order() {
        let slow = FnStep::new("slow", |_ctx: Context| async move {
            tokio::time::sleep(Duration::from_millis(80)).await;
            Ok(())
        });
        let fast = FnStep::new("fast", |_ctx: Context| async move { Ok(()) });
        let mut stage = MultiStepStage::builder("par")
            .step(slow)
            .step(fast)
            .parallel(true)
            .build()
            .expect("valid stage");
        let logger = Arc::new(RecordingLogger::default());
        stage.set_logger(logger.clone());

        stage.run(&Context::new()).await.expect("stage succeeds");

        assert_eq!(
            logger.lines(),
            vec![
                "INFO Running par in parallel mode with 2 step(s).",
                "INFO \tStep 'fast' completed successfully!",
                "INFO \tStep 'slow' completed successfully!",
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_returns_first_failure_in_completion_order() {
        let late = FnStep::new("late", |_ctx: Context| async move {
            tokio::time::sleep(Duration::from_millis(80)).await;
            Err(PipelineError::step("late", "slow failure"))
        });
        let early = FnStep::new("early", |_ctx: Context| async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Err(PipelineError::step("early", "fast failure"))
        });
        let mut stage = MultiStepStage::builder("par")
            .step(late)
            .step(early)
            .parallel(true)
            .max_workers(2)
            .build()
            .expect("valid stage");
        let logger = Arc::new(RecordingLogger::default());
        stage.set_logger(logger.clone());

        let err = stage.run(&Context::new()).await.expect_err("stage fails");

        assert_eq!(err.step_name().map(|n| n.as_str()), Some("early"));
        assert_eq!(
            logger.lines(),
            vec![
                "INFO Running par in parallel mode with 2 step(s).",
                "ERROR Error in step early: Step failed: early, details: fast failure",
            ]
        );
    }

    #[tokio::test]
    async fn test_parallel_panic_is_attributed_to_step() {
        let stage = MultiStepStage::builder("par")
            .step(FnStep::new("explode", |_ctx: Context| async move {
                if Context::new().is_empty() {
                    panic!("kaboom");
                }
                Ok(())
            }))
            .parallel(true)
            .build()
            .expect("valid stage");

        let err = stage.run(&Context::new()).await.expect_err("stage fails");

        assert_eq!(err.step_name().map(|n| n.as_str()), Some("explode"));
        assert!(matches!(err, PipelineError::Panicked { .. }));
    }

    #[tokio::test]
    async fn test_empty_stage_succeeds() {
        let mut stage = MultiStepStage::parallel("empty", Vec::new(), 2).expect("valid stage");
        let logger = Arc::new(RecordingLogger::default());
        stage.set_logger(logger.clone());

        assert!(stage.run(&Context::new()).await.is_ok());
        assert_eq!(stage.step_count(), 0);
        assert_eq!(
            logger.lines(),
            vec!["INFO Running empty in parallel mode with 0 step(s)."]
        );
    }

    #[test]
    fn test_builder_validation() {
        let result = MultiStepStage::builder("bad").parallel(true).max_workers(0).build();
        assert!(matches!(result, Err(PipelineError::Configuration(_))));
    }

    #[test]
    fn test_new_uses_default_config() {
        let step: Arc<dyn Step> = Arc::new(push_step("a"));
        let stage = MultiStepStage::new("plain", vec![step]);
        assert_eq!(stage.config(), &StageConfig::default());
        assert_eq!(stage.name(), "plain");
        assert!(format!("{:?}", stage).contains("StepName(\"a\")"));
    }
}
