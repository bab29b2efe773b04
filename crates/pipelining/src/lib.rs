//! A minimal in-process pipeline executor.
//!
//! A [`Pipeline`] runs an ordered list of named stages against one shared
//! [`Context`], stopping at the first failure. A [`MultiStepStage`] runs its
//! steps either sequentially or on a bounded worker pool.
//!
//! # Example
//!
//! ```rust,no_run
//! use pipelining::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), PipelineError> {
//!     let extract = MultiStepStage::builder("extract")
//!         .step(FnStep::new("users", |ctx| async move {
//!             ctx.insert("users", vec!["ada".to_string(), "grace".to_string()]);
//!             Ok(())
//!         }))
//!         .step(FnStep::new("orders", |ctx| async move {
//!             ctx.insert("orders", 12u32);
//!             Ok(())
//!         }))
//!         .parallel(true)
//!         .max_workers(2)
//!         .build()?;
//!
//!     let report = ActionStage::new("report", |ctx| async move {
//!         let users = ctx.get::<Vec<String>>("users").unwrap_or_default();
//!         ctx.insert("summary", format!("{} users", users.len()));
//!         Ok(())
//!     });
//!
//!     let mut pipeline = Pipeline::builder()
//!         .name("etl")
//!         .stage(extract)
//!         .stage(report)
//!         .logger(Arc::new(TracingLogger::new("etl")))
//!         .build()?;
//!
//!     let ctx = pipeline.run().await?;
//!     assert_eq!(ctx.get::<String>("summary").as_deref(), Some("2 users"));
//!     Ok(())
//! }
//! ```

mod action;
mod multistep;
mod pipeline;
mod step_fn;

// Re-export core types
pub use pipelining_core::*;

pub use action::ActionStage;
pub use multistep::{MultiStepStage, MultiStepStageBuilder};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineState};
pub use step_fn::{BlockingStep, FnStep};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        ActionStage, BlockingStep, Context, ContextKey, ExecutionMode, FnStep, Logger,
        MultiStepStage, Pipeline, PipelineError, PipelineState, SharedLogger, Stage, StageConfig,
        Step, StepName, TracingLogger,
    };
}
