//! Steps: named units of work queued onto a pipeline
//!
//! A step owns the pipeline context for the duration of its action:
//! the context moves into the action and comes back out on success.

use futures::future::BoxFuture;
use std::borrow::Cow;
use std::fmt;
use std::future::Future;

/// Position of a step in its pipeline's submission order (0-based)
pub type StepSeq = u64;

/// Tag identifying the kind of operation a step performs
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StepName(Cow<'static, str>);

impl StepName {
    /// Create a step name
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Get the name as a string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for StepName {
    fn from(value: &'static str) -> Self {
        Self(Cow::Borrowed(value))
    }
}

impl From<String> for StepName {
    fn from(value: String) -> Self {
        Self(Cow::Owned(value))
    }
}

pub(crate) type Action<C, E> = Box<dyn FnOnce(C) -> BoxFuture<'static, Result<C, E>> + Send>;

/// A queued unit of work
///
/// Created at enqueue time and consumed by execution. Never retried.
pub struct Step<C, E> {
    name: StepName,
    action: Action<C, E>,
}

impl<C, E> Step<C, E>
where
    C: Send + 'static,
    E: Send + 'static,
{
    /// Create a step from an async action
    ///
    /// The action receives the context by value and must hand it back
    /// on success. Returning an error fails the pipeline.
    pub fn new<F, Fut>(name: impl Into<StepName>, action: F) -> Self
    where
        F: FnOnce(C) -> Fut + Send + 'static,
        Fut: Future<Output = Result<C, E>> + Send + 'static,
    {
        Self {
            name: name.into(),
            action: Box::new(move |ctx| Box::pin(action(ctx))),
        }
    }

    /// Create a step from a synchronous closure
    pub fn sync<F>(name: impl Into<StepName>, action: F) -> Self
    where
        F: FnOnce(C) -> Result<C, E> + Send + 'static,
    {
        Self::new(name, move |ctx| futures::future::ready(action(ctx)))
    }
}

impl<C, E> Step<C, E> {
    /// Step name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &StepName {
        &self.name
    }

    pub(crate) fn into_parts(self) -> (StepName, Action<C, E>) {
        (self.name, self.action)
    }
}

impl<C, E> fmt::Debug for Step<C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step").field("name", &self.name).finish_non_exhaustive()
    }
}
