//! Events broadcast by a running pipeline

use crate::error::StepFailure;
use crate::step::{StepName, StepSeq};
use std::sync::Arc;
use std::time::Duration;

/// Lifecycle events observable through `Pipeline::subscribe`
#[derive(Debug)]
pub enum PipelineEvent<E>
where
    E: std::error::Error + 'static,
{
    /// A step was dequeued and its action invoked
    StepStarted {
        /// Submission position
        seq: StepSeq,
        /// Step name
        name: StepName,
    },
    /// A step completed successfully
    StepFinished {
        /// Submission position
        seq: StepSeq,
        /// Step name
        name: StepName,
        /// Time spent in the action
        elapsed: Duration,
    },
    /// The queue went from busy to fully idle (drained signal)
    Drained {
        /// Steps completed so far
        completed: u64,
    },
    /// A step failed; the pipeline is terminal
    Failed(Arc<StepFailure<E>>),
}

impl<E> PipelineEvent<E>
where
    E: std::error::Error + 'static,
{
    /// Check if this is the drained signal
    #[inline]
    #[must_use]
    pub fn is_drained(&self) -> bool {
        matches!(self, Self::Drained { .. })
    }
}

impl<E> Clone for PipelineEvent<E>
where
    E: std::error::Error + 'static,
{
    fn clone(&self) -> Self {
        match self {
            Self::StepStarted { seq, name } => Self::StepStarted {
                seq: *seq,
                name: name.clone(),
            },
            Self::StepFinished { seq, name, elapsed } => Self::StepFinished {
                seq: *seq,
                name: name.clone(),
                elapsed: *elapsed,
            },
            Self::Drained { completed } => Self::Drained {
                completed: *completed,
            },
            Self::Failed(failure) => Self::Failed(Arc::clone(failure)),
        }
    }
}
