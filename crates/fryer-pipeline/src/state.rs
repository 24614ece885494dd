//! Pipeline state machine
//!
//! State is derived from the status fields rather than stored, so the
//! consumer and `enqueue` only ever update counters under one lock.

use crate::error::StepFailure;
use crate::step::StepName;
use std::sync::Arc;

/// Execution state of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    /// No step running; the queue may or may not hold steps
    Idle,
    /// A step is executing; intake still accepted
    Draining,
    /// Dequeue blocked by `pause()`; intake still accepted
    Paused,
    /// A step failed; nothing will execute again
    Failed,
}

impl PipelineState {
    /// Check if the state is terminal
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

/// Point-in-time view of a pipeline
#[derive(Debug)]
pub struct PipelineStatus<E>
where
    E: std::error::Error + 'static,
{
    /// Steps accepted by `enqueue` so far
    pub submitted: u64,
    /// Steps enqueued but not yet started
    pub pending: usize,
    /// Step currently executing
    pub running: Option<StepName>,
    /// Steps completed successfully
    pub completed: u64,
    /// Number of busy → idle transitions so far
    pub drains: u64,
    /// Whether dequeue is paused
    pub paused: bool,
    /// Whether intake has been closed (shutdown or drop)
    pub closed: bool,
    /// Failure record once the pipeline is terminal
    pub failure: Option<Arc<StepFailure<E>>>,
}

impl<E> PipelineStatus<E>
where
    E: std::error::Error + 'static,
{
    /// Derive the current state
    #[must_use]
    pub fn state(&self) -> PipelineState {
        if self.failure.is_some() {
            PipelineState::Failed
        } else if self.running.is_some() {
            PipelineState::Draining
        } else if self.paused {
            PipelineState::Paused
        } else {
            PipelineState::Idle
        }
    }

    /// Nothing pending and nothing running (or terminal)
    #[inline]
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.failure.is_some() || (self.running.is_none() && self.pending == 0)
    }
}

impl<E> Default for PipelineStatus<E>
where
    E: std::error::Error + 'static,
{
    fn default() -> Self {
        Self {
            submitted: 0,
            pending: 0,
            running: None,
            completed: 0,
            drains: 0,
            paused: false,
            closed: false,
            failure: None,
        }
    }
}

impl<E> Clone for PipelineStatus<E>
where
    E: std::error::Error + 'static,
{
    fn clone(&self) -> Self {
        Self {
            submitted: self.submitted,
            pending: self.pending,
            running: self.running.clone(),
            completed: self.completed,
            drains: self.drains,
            paused: self.paused,
            closed: self.closed,
            failure: self.failure.clone(),
        }
    }
}

/// Summary returned once a pipeline has gone idle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// Steps completed successfully over the pipeline's lifetime
    pub completed: u64,
    /// Number of busy → idle transitions so far
    pub drains: u64,
}
