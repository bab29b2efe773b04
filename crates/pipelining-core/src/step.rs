//! Step trait and related types.

use crate::context::Context;
use crate::error::PipelineError;
use async_trait::async_trait;
use std::fmt::{self, Debug};

/// Type-safe step name wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StepName(String);

impl StepName {
    /// Creates a new StepName.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the step name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StepName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StepName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for StepName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for StepName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<&str> for StepName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// One unit of work inside a multi-step stage.
///
/// A step's only effect is what it writes to the shared [`Context`], or the
/// error it returns. Steps are reused across runs, so they should keep no
/// per-run state of their own.
///
/// # Examples
///
/// ```
/// use pipelining_core::{Context, PipelineError, Step, StepName};
/// use async_trait::async_trait;
///
/// #[derive(Debug)]
/// struct Normalize;
///
/// #[async_trait]
/// impl Step for Normalize {
///     async fn execute(&self, ctx: &Context) -> Result<(), PipelineError> {
///         ctx.insert("normalized", true);
///         Ok(())
///     }
///
///     fn name(&self) -> StepName {
///         StepName::new("normalize")
///     }
/// }
/// ```
#[async_trait]
pub trait Step: Send + Sync + Debug {
    /// Runs the step against the shared context.
    async fn execute(&self, ctx: &Context) -> Result<(), PipelineError>;

    /// Returns the identifier used for this step in log records.
    fn name(&self) -> StepName;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct MarkStep;

    #[async_trait]
    impl Step for MarkStep {
        async fn execute(&self, ctx: &Context) -> Result<(), PipelineError> {
            ctx.insert("marked", "yes".to_string());
            Ok(())
        }

        fn name(&self) -> StepName {
            StepName::new("mark")
        }
    }

    #[test]
    fn test_step_execution() {
        let step = MarkStep;
        let ctx = Context::new();

        let result = tokio_test::block_on(step.execute(&ctx));
        assert!(result.is_ok());
        assert_eq!(ctx.get::<String>("marked").as_deref(), Some("yes"));
    }

    #[test]
    fn test_step_name() {
        assert_eq!(MarkStep.name(), StepName::new("mark"));
        assert_eq!(MarkStep.name(), "mark");
        let name: StepName = String::from("mark").into();
        assert_eq!(name.as_str(), "mark");
    }
}
