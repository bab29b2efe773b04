//! Core traits and types for the pipelining stage executor.
//!
//! This crate provides the contracts shared by every pipeline without any
//! runtime dependency. Library authors should depend on this crate to
//! implement custom steps and stages.
//!
//! # Core Types
//!
//! - [`Context`] - Shared heterogeneous store threaded through a run
//! - [`Step`] - One unit of work inside a multi-step stage
//! - [`Stage`] - A named unit of pipeline work
//! - [`StageConfig`] - Execution mode and worker limit for a stage
//! - [`Logger`] - Sink injected into stages, with a `tracing` default
//! - [`PipelineError`] - Error type returned unchanged through every layer

mod context;
mod error;
mod logger;
mod stage;
mod step;

pub use context::{Context, ContextKey};
pub use error::{PipelineError, Result};
pub use logger::{Logger, SharedLogger, TracingLogger};
pub use stage::{ExecutionMode, Stage, StageConfig, DEFAULT_MAX_WORKERS};
pub use step::{Step, StepName};
