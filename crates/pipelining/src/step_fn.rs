//! Closure adapters for [`Step`].

use async_trait::async_trait;
use futures::FutureExt;
use pipelining_core::{Context, PipelineError, Step, StepName};
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// A step built from an async closure and an explicit name.
///
/// The closure receives a clone of the context handle, so it can move it
/// into the returned future.
///
/// # Examples
///
/// ```
/// use pipelining::FnStep;
/// use pipelining_core::Step;
///
/// let step = FnStep::new("fetch", |ctx| async move {
///     ctx.insert("fetched", true);
///     Ok(())
/// });
/// assert_eq!(step.name(), "fetch");
/// ```
pub struct FnStep<F> {
    name: StepName,
    f: F,
}

impl<F, Fut> FnStep<F>
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), PipelineError>> + Send + 'static,
{
    /// Creates a named step from an async closure.
    pub fn new(name: impl Into<StepName>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> fmt::Debug for FnStep<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStep").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F, Fut> Step for FnStep<F>
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), PipelineError>> + Send + 'static,
{
    async fn execute(&self, ctx: &Context) -> Result<(), PipelineError> {
        (self.f)(ctx.clone()).await
    }

    fn name(&self) -> StepName {
        self.name.clone()
    }
}

/// A step built from a synchronous closure.
///
/// The closure runs on tokio's blocking thread pool, so CPU-bound or
/// blocking I/O work does not stall the async workers.
pub struct BlockingStep<F> {
    name: StepName,
    f: Arc<F>,
}

impl<F> BlockingStep<F>
where
    F: Fn(&Context) -> Result<(), PipelineError> + Send + Sync + 'static,
{
    /// Creates a named step from a blocking closure.
    pub fn new(name: impl Into<StepName>, f: F) -> Self {
        Self {
            name: name.into(),
            f: Arc::new(f),
        }
    }
}

impl<F> fmt::Debug for BlockingStep<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingStep")
            .field("name", &self.name)
            .finish()
    }
}

#[async_trait]
impl<F> Step for BlockingStep<F>
where
    F: Fn(&Context) -> Result<(), PipelineError> + Send + Sync + 'static,
{
    async fn execute(&self, ctx: &Context) -> Result<(), PipelineError> {
        let f = Arc::clone(&self.f);
        let ctx = ctx.clone();
        match tokio::task::spawn_blocking(move || f(&ctx)).await {
            Ok(result) => result,
            Err(err) if err.is_panic() => Err(PipelineError::Panicked {
                step_name: self.name.clone(),
                details: panic_details(err.into_panic().as_ref()),
            }),
            Err(err) => Err(PipelineError::msg(format!(
                "Step '{}' was cancelled: {}",
                self.name, err
            ))),
        }
    }

    fn name(&self) -> StepName {
        self.name.clone()
    }
}

/// Runs a step, turning a panic inside it into [`PipelineError::Panicked`].
pub(crate) async fn execute_guarded(step: &dyn Step, ctx: &Context) -> Result<(), PipelineError> {
    match AssertUnwindSafe(step.execute(ctx)).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(PipelineError::Panicked {
            step_name: step.name(),
            details: panic_details(payload.as_ref()),
        }),
    }
}

pub(crate) fn panic_details(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
