//! Error types for the pipeline
//!
//! A failed step is terminal for its pipeline. The failure record keeps
//! the step that broke, why, and every queued step that was abandoned.

use crate::step::{StepName, StepSeq};
use std::sync::Arc;
use std::time::Duration;

/// Why a step failed
#[derive(Debug, thiserror::Error)]
pub enum FailureCause<E> {
    /// The step action returned an error
    #[error(transparent)]
    Step(E),

    /// The step exceeded the configured deadline
    #[error("step timed out after {after:?}")]
    TimedOut {
        /// Deadline that elapsed
        after: Duration,
    },

    /// The step action panicked
    #[error("step panicked: {0}")]
    Panicked(String),
}

impl<E> FailureCause<E> {
    /// Get the step error, if the action itself returned one
    #[inline]
    #[must_use]
    pub fn step_error(&self) -> Option<&E> {
        match self {
            Self::Step(e) => Some(e),
            _ => None,
        }
    }
}

/// Record of the step that moved a pipeline to `Failed`
#[derive(Debug, thiserror::Error)]
#[error("step '{step}' (#{seq}) failed: {cause}")]
pub struct StepFailure<E>
where
    E: std::error::Error + 'static,
{
    /// Name of the failed step
    pub step: StepName,
    /// Submission position of the failed step
    pub seq: StepSeq,
    /// Failure cause
    #[source]
    pub cause: FailureCause<E>,
    /// Steps that were queued behind it and never executed
    pub abandoned: Vec<StepName>,
}

/// Pipeline errors surfaced to callers
#[derive(Debug, thiserror::Error)]
pub enum PipelineError<E>
where
    E: std::error::Error + 'static,
{
    /// A step failed; the pipeline is terminal
    #[error(transparent)]
    Failed(Arc<StepFailure<E>>),

    /// Intake was closed by shutdown
    #[error("pipeline stopped")]
    Stopped,
}

impl<E> PipelineError<E>
where
    E: std::error::Error + 'static,
{
    /// Get the failure record, if a step failed
    #[inline]
    #[must_use]
    pub fn failure(&self) -> Option<&StepFailure<E>> {
        match self {
            Self::Failed(failure) => Some(failure),
            Self::Stopped => None,
        }
    }
}

impl<E> Clone for PipelineError<E>
where
    E: std::error::Error + 'static,
{
    fn clone(&self) -> Self {
        match self {
            Self::Failed(failure) => Self::Failed(Arc::clone(failure)),
            Self::Stopped => Self::Stopped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("engine exploded")]
    struct TestError;

    #[test]
    fn failure_display_names_step() {
        let failure = StepFailure {
            step: StepName::from("fry"),
            seq: 3,
            cause: FailureCause::Step(TestError),
            abandoned: vec![StepName::from("save")],
        };
        let msg = failure.to_string();
        assert!(msg.contains("fry"));
        assert!(msg.contains("#3"));
        assert!(msg.contains("engine exploded"));
    }

    #[test]
    fn pipeline_error_exposes_failure() {
        let err: PipelineError<TestError> = PipelineError::Failed(Arc::new(StepFailure {
            step: StepName::from("load"),
            seq: 0,
            cause: FailureCause::TimedOut {
                after: Duration::from_secs(1),
            },
            abandoned: Vec::new(),
        }));

        let failure = err.clone().failure().map(|f| f.seq);
        assert_eq!(failure, Some(0));
        assert!(err.failure().unwrap().cause.step_error().is_none());
        assert!(PipelineError::<TestError>::Stopped.failure().is_none());
    }
}
