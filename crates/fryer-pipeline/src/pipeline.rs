//! The pipeline: one consumer task per pipeline instance
//!
//! # Execution model
//!
//! ```text
//! enqueue ──► [ unbounded FIFO ] ──► consumer task ──► step action(ctx) ──► ctx'
//!                                        ▲                                   │
//!                                        └──────── completion re-arms ───────┘
//! ```
//!
//! - `enqueue` is a pure append and never waits
//! - the consumer pops the head step only after the previous action has
//!   completed, so at most one action runs at a time
//! - a failed action moves the pipeline to `Failed`; every queued step is
//!   abandoned and reported in the failure record

use crate::error::{FailureCause, PipelineError, StepFailure};
use crate::event::PipelineEvent;
use crate::state::{DrainReport, PipelineState, PipelineStatus};
use crate::step::{Action, Step, StepName, StepSeq};
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::Instrument;
use ulid::Ulid;

/// Unique pipeline identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PipelineId(pub Ulid);

impl PipelineId {
    /// Generate new pipeline ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for PipelineId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PipelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pipeline options
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Deadline for a single step action (none by default)
    pub step_timeout: Option<Duration>,
    /// Capacity of the event broadcast buffer
    pub event_capacity: usize,
    /// Label attached to the consumer's tracing span
    pub label: Option<String>,
}

impl PipelineOptions {
    /// Create default options
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With a per-step deadline
    #[inline]
    #[must_use]
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }

    /// With a tracing label
    #[inline]
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// With event buffer capacity
    #[inline]
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            step_timeout: None,
            event_capacity: 64,
            label: None,
        }
    }
}

struct Queued<C, E> {
    seq: StepSeq,
    step: Step<C, E>,
}

struct Shared<E>
where
    E: std::error::Error + 'static,
{
    status: watch::Sender<PipelineStatus<E>>,
    events: broadcast::Sender<PipelineEvent<E>>,
}

/// Ordered, single-consumer step queue bound to one context
///
/// Must be created inside a Tokio runtime.
pub struct Pipeline<C, E>
where
    E: std::error::Error + 'static,
{
    id: PipelineId,
    intake: mpsc::UnboundedSender<Queued<C, E>>,
    shared: Arc<Shared<E>>,
    consumer: Option<JoinHandle<Result<C, PipelineError<E>>>>,
}

impl<C, E> Pipeline<C, E>
where
    C: Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    /// Start a pipeline owning `context`
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn spawn(context: C, options: PipelineOptions) -> Self {
        let id = PipelineId::new();
        let (intake, queue) = mpsc::unbounded_channel();
        let (status, _) = watch::channel(PipelineStatus::default());
        let (events, _) = broadcast::channel(options.event_capacity.max(1));
        let shared = Arc::new(Shared { status, events });

        let span = tracing::info_span!(
            "pipeline",
            id = %id,
            label = options.label.as_deref().unwrap_or_default(),
        );
        let consumer = tokio::spawn(
            consume(context, queue, Arc::clone(&shared), options.step_timeout).instrument(span),
        );

        Self {
            id,
            intake,
            shared,
            consumer: Some(consumer),
        }
    }

    /// Append a step to the tail of the queue
    ///
    /// Never blocks. Returns the step's submission position.
    ///
    /// # Errors
    /// - `PipelineError::Failed` once a step has failed
    /// - `PipelineError::Stopped` if the consumer is gone
    pub fn enqueue(&self, step: Step<C, E>) -> Result<StepSeq, PipelineError<E>> {
        let mut outcome = Err(PipelineError::Stopped);

        // Sequence assignment and send happen under the status lock so
        // submission order always equals channel order.
        self.shared.status.send_if_modified(|status| {
            if let Some(failure) = &status.failure {
                outcome = Err(PipelineError::Failed(Arc::clone(failure)));
                return false;
            }

            let seq = status.submitted;
            let name = step.name().clone();
            if self.intake.send(Queued { seq, step }).is_err() {
                return false;
            }

            tracing::trace!(pipeline = %self.id, seq, step = %name, "step enqueued");
            status.submitted += 1;
            status.pending += 1;
            outcome = Ok(seq);
            true
        });

        outcome
    }

    /// Stop dequeuing after the current step (intake continues)
    pub fn pause(&self) {
        let changed = self.shared.status.send_if_modified(|status| {
            let was_paused = status.paused;
            status.paused = true;
            !was_paused
        });
        if changed {
            tracing::debug!(pipeline = %self.id, "pipeline paused");
        }
    }

    /// Resume dequeuing
    pub fn resume(&self) {
        let changed = self.shared.status.send_if_modified(|status| {
            let was_paused = status.paused;
            status.paused = false;
            was_paused
        });
        if changed {
            tracing::debug!(pipeline = %self.id, "pipeline resumed");
        }
    }

    /// Wait until nothing is pending or running
    ///
    /// Resolves immediately if the pipeline is already idle. A paused
    /// pipeline with pending steps does not resolve until resumed.
    ///
    /// # Errors
    /// `PipelineError::Failed` if a step failed before the queue drained
    pub async fn wait_idle(&self) -> Result<DrainReport, PipelineError<E>> {
        let mut status = self.shared.status.subscribe();
        let settled = status
            .wait_for(PipelineStatus::is_settled)
            .await
            .map_err(|_| PipelineError::Stopped)?;

        match &settled.failure {
            Some(failure) => Err(PipelineError::Failed(Arc::clone(failure))),
            None => Ok(DrainReport {
                completed: settled.completed,
                drains: settled.drains,
            }),
        }
    }

    /// Close intake, run whatever is still queued, and return the context
    ///
    /// A paused pipeline is released first.
    ///
    /// # Errors
    /// - `PipelineError::Failed` if a step failed
    /// - `PipelineError::Stopped` if the consumer task was lost
    pub async fn shutdown(mut self) -> Result<C, PipelineError<E>> {
        let id = self.id;
        let consumer = self.consumer.take();
        // Dropping closes intake and releases the pause gate
        drop(self);

        let Some(consumer) = consumer else {
            return Err(PipelineError::Stopped);
        };
        match consumer.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(pipeline = %id, "pipeline consumer lost: {e}");
                Err(PipelineError::Stopped)
            }
        }
    }
}

impl<C, E> Pipeline<C, E>
where
    E: std::error::Error + 'static,
{
    /// Get pipeline ID
    #[inline]
    #[must_use]
    pub fn id(&self) -> PipelineId {
        self.id
    }

    /// Snapshot of the current status
    #[must_use]
    pub fn status(&self) -> PipelineStatus<E> {
        self.shared.status.borrow().clone()
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.shared.status.borrow().state()
    }

    /// Subscribe to lifecycle events
    ///
    /// Only events sent after subscribing are received. Use `wait_idle`
    /// to observe a drain that may already have happened.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent<E>> {
        self.shared.events.subscribe()
    }
}

/// Dropping a pipeline closes intake. Steps already queued still run,
/// even when paused, and the consumer then exits with the context.
impl<C, E> Drop for Pipeline<C, E>
where
    E: std::error::Error + 'static,
{
    fn drop(&mut self) {
        self.shared.status.send_if_modified(|status| {
            let was_closed = status.closed;
            status.closed = true;
            !was_closed
        });
        tracing::debug!(pipeline = %self.id, "pipeline intake closed");
    }
}

impl<C, E> fmt::Debug for Pipeline<C, E>
where
    E: std::error::Error + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self.shared.status.borrow();
        f.debug_struct("Pipeline")
            .field("id", &self.id)
            .field("state", &status.state())
            .field("pending", &status.pending)
            .field("completed", &status.completed)
            .finish()
    }
}

/// Consumer loop (runs in its own tokio task)
async fn consume<C, E>(
    mut ctx: C,
    mut queue: mpsc::UnboundedReceiver<Queued<C, E>>,
    shared: Arc<Shared<E>>,
    step_timeout: Option<Duration>,
) -> Result<C, PipelineError<E>>
where
    C: Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let mut watcher = shared.status.subscribe();

    while let Some(Queued { seq, step }) = queue.recv().await {
        let (name, action) = step.into_parts();

        // Pause gate: only dequeue/execution is blocked, never intake
        loop {
            let started = shared.status.send_if_modified(|status| {
                if status.paused && !status.closed {
                    return false;
                }
                status.pending = status.pending.saturating_sub(1);
                status.running = Some(name.clone());
                true
            });
            if started {
                break;
            }
            // Sender lives in `shared`, so this cannot error
            let _ = watcher
                .wait_for(|status| !status.paused || status.closed)
                .await;
        }

        tracing::debug!(seq, step = %name, "step started");
        let _ = shared.events.send(PipelineEvent::StepStarted {
            seq,
            name: name.clone(),
        });
        let started_at = Instant::now();

        match run_action(action, ctx, step_timeout).await {
            Ok(next) => {
                ctx = next;
                let elapsed = started_at.elapsed();

                let mut drained = None;
                shared.status.send_modify(|status| {
                    status.running = None;
                    status.completed += 1;
                    if status.pending == 0 {
                        status.drains += 1;
                        drained = Some(status.completed);
                    }
                });

                tracing::debug!(
                    seq,
                    step = %name,
                    elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                    "step finished"
                );
                let _ = shared.events.send(PipelineEvent::StepFinished {
                    seq,
                    name,
                    elapsed,
                });

                if let Some(completed) = drained {
                    tracing::info!(completed, "pipeline drained");
                    let _ = shared.events.send(PipelineEvent::Drained { completed });
                }
            }
            Err(cause) => {
                let mut discarded = Vec::new();
                let mut record = None;

                // Closing, draining and publishing the failure under the
                // status lock means no enqueue can slip between them.
                shared.status.send_modify(|status| {
                    queue.close();
                    while let Ok(queued) = queue.try_recv() {
                        discarded.push(queued);
                    }

                    let failure = Arc::new(StepFailure {
                        step: name,
                        seq,
                        cause,
                        abandoned: discarded.iter().map(|q| q.step.name().clone()).collect(),
                    });
                    status.running = None;
                    status.pending = 0;
                    status.failure = Some(Arc::clone(&failure));
                    record = Some(failure);
                });
                drop(discarded);

                return Err(match record {
                    Some(failure) => {
                        tracing::error!(
                            seq = failure.seq,
                            step = %failure.step,
                            abandoned = failure.abandoned.len(),
                            "pipeline failed: {}",
                            failure.cause
                        );
                        let _ = shared.events.send(PipelineEvent::Failed(Arc::clone(&failure)));
                        PipelineError::Failed(failure)
                    }
                    None => PipelineError::Stopped,
                });
            }
        }
    }

    tracing::debug!("pipeline consumer finished");
    Ok(ctx)
}

/// Run one action to completion, converting timeouts and panics
async fn run_action<C, E>(
    action: Action<C, E>,
    ctx: C,
    step_timeout: Option<Duration>,
) -> Result<C, FailureCause<E>>
where
    C: Send + 'static,
    E: Send + 'static,
{
    let guarded = AssertUnwindSafe(async move { action(ctx).await }).catch_unwind();

    let joined = match step_timeout {
        Some(after) => tokio::time::timeout(after, guarded)
            .await
            .map_err(|_| FailureCause::TimedOut { after })?,
        None => guarded.await,
    };

    match joined {
        Ok(Ok(ctx)) => Ok(ctx),
        Ok(Err(e)) => Err(FailureCause::Step(e)),
        Err(panic) => Err(FailureCause::Panicked(panic_message(panic.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("step error: {0}")]
    struct TestError(&'static str);

    type TestPipeline = Pipeline<Vec<u32>, TestError>;

    fn push(n: u32) -> Step<Vec<u32>, TestError> {
        Step::sync(format!("push-{n}"), move |mut v: Vec<u32>| {
            v.push(n);
            Ok(v)
        })
    }

    #[tokio::test]
    async fn enqueue_returns_sequence_numbers() {
        let pipeline = TestPipeline::spawn(Vec::new(), PipelineOptions::default());
        assert_eq!(pipeline.enqueue(push(1)).unwrap(), 0);
        assert_eq!(pipeline.enqueue(push(2)).unwrap(), 1);

        let out = pipeline.shutdown().await.unwrap();
        assert_eq!(out, vec![1, 2]);
    }

    #[tokio::test]
    async fn wait_idle_on_fresh_pipeline_resolves() {
        let pipeline = TestPipeline::spawn(Vec::new(), PipelineOptions::default());
        let report = pipeline.wait_idle().await.unwrap();
        assert_eq!(report.completed, 0);
        assert_eq!(report.drains, 0);
        assert_eq!(pipeline.state(), PipelineState::Idle);
    }

    #[tokio::test]
    async fn pause_holds_execution_but_accepts_intake() {
        let pipeline = TestPipeline::spawn(Vec::new(), PipelineOptions::default());
        pipeline.pause();
        pipeline.enqueue(push(1)).unwrap();
        pipeline.enqueue(push(2)).unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        let status = pipeline.status();
        assert_eq!(status.state(), PipelineState::Paused);
        assert_eq!(status.completed, 0);
        assert_eq!(status.pending, 2);

        pipeline.resume();
        let report = pipeline.wait_idle().await.unwrap();
        assert_eq!(report.completed, 2);
    }

    #[tokio::test]
    async fn shutdown_resumes_paused_pipeline() {
        let pipeline = TestPipeline::spawn(Vec::new(), PipelineOptions::default());
        pipeline.pause();
        pipeline.enqueue(push(9)).unwrap();
        assert_eq!(pipeline.shutdown().await.unwrap(), vec![9]);
    }

    #[tokio::test]
    async fn timeout_fails_pipeline() {
        let pipeline = TestPipeline::spawn(
            Vec::new(),
            PipelineOptions::default().with_step_timeout(Duration::from_millis(10)),
        );
        pipeline
            .enqueue(Step::new("slow", |v: Vec<u32>| async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(v)
            }))
            .unwrap();
        pipeline.enqueue(push(1)).unwrap();

        let err = pipeline.wait_idle().await.unwrap_err();
        let failure = err.failure().unwrap();
        assert!(matches!(failure.cause, FailureCause::TimedOut { .. }));
        assert_eq!(failure.abandoned, vec![StepName::from("push-1".to_string())]);
    }

    #[tokio::test]
    async fn panicking_step_fails_pipeline() {
        let pipeline = TestPipeline::spawn(Vec::new(), PipelineOptions::default());
        pipeline
            .enqueue(Step::sync("explode", |_v: Vec<u32>| -> Result<Vec<u32>, TestError> {
                panic!("kaboom")
            }))
            .unwrap();

        let err = pipeline.wait_idle().await.unwrap_err();
        match &err.failure().unwrap().cause {
            FailureCause::Panicked(msg) => assert_eq!(msg, "kaboom"),
            other => panic!("unexpected cause: {other:?}"),
        }
    }

    #[tokio::test]
    async fn enqueue_after_failure_is_rejected() {
        let pipeline = TestPipeline::spawn(Vec::new(), PipelineOptions::default());
        pipeline
            .enqueue(Step::sync("fail", |_v: Vec<u32>| Err(TestError("nope"))))
            .unwrap();
        assert!(pipeline.wait_idle().await.is_err());

        let rejected = pipeline.enqueue(push(1));
        assert!(matches!(rejected, Err(PipelineError::Failed(_))));
        assert_eq!(pipeline.state(), PipelineState::Failed);

        let shutdown = pipeline.shutdown().await;
        assert!(matches!(shutdown, Err(PipelineError::Failed(_))));
    }

    #[tokio::test]
    async fn dropping_paused_pipeline_releases_consumer() {
        let ctx = Arc::new(());
        let pipeline =
            Pipeline::<Arc<()>, TestError>::spawn(Arc::clone(&ctx), PipelineOptions::default());
        pipeline.pause();
        pipeline
            .enqueue(Step::sync("noop", |c: Arc<()>| Ok(c)))
            .unwrap();
        drop(pipeline);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(Arc::strong_count(&ctx), 1);
    }

    #[tokio::test]
    async fn dropping_idle_pipeline_releases_consumer() {
        let ctx = Arc::new(());
        let pipeline =
            Pipeline::<Arc<()>, TestError>::spawn(Arc::clone(&ctx), PipelineOptions::default());
        drop(pipeline);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(Arc::strong_count(&ctx), 1);
    }

    #[test]
    fn options_builder() {
        let options = PipelineOptions::new()
            .with_step_timeout(Duration::from_secs(3))
            .with_label("cat.jpg")
            .with_event_capacity(8);
        assert_eq!(options.step_timeout, Some(Duration::from_secs(3)));
        assert_eq!(options.label.as_deref(), Some("cat.jpg"));
        assert_eq!(options.event_capacity, 8);
    }
}
