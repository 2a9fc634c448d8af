//! Units of work accepted by the dispatcher.
//!
//! A [`Unit`] wraps either a synchronous callable or one that returns a
//! future. Both are normalized into a single boxed future so the dispatcher
//! drives every unit through the same completion path.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::BoxError;

type Job<T> = Box<dyn FnOnce() -> BoxFuture<'static, Result<T, BoxError>> + Send>;

/// One submitted piece of work, reduced to a single eventual value-or-error.
///
/// Ownership moves into the dispatcher on submission; a unit is started at
/// most once.
pub struct Unit<T> {
    label: Option<String>,
    job: Job<T>,
}

impl<T: Send + 'static> Unit<T> {
    /// Wrap a synchronous callable. The callable is invoked on the worker
    /// task, not at construction or submission.
    pub fn immediate<F, E>(f: F) -> Self
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        Self {
            label: None,
            job: Box::new(move || async move { f().map_err(Into::<BoxError>::into) }.boxed()),
        }
    }

    /// Wrap a callable that produces a future.
    pub fn deferred<F, Fut, E>(f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        Self {
            label: None,
            job: Box::new(move || async move { f().await.map_err(Into::<BoxError>::into) }.boxed()),
        }
    }

    /// Attach a human-readable label used in logs and failure reports.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Turn the unit into its eventual outcome. Panics inside the callable
    /// or its future are reported as failures.
    pub(crate) fn start(self) -> BoxFuture<'static, Result<T, BoxError>> {
        let job = self.job;
        async move {
            match AssertUnwindSafe(async move { job().await })
                .catch_unwind()
                .await
            {
                Ok(outcome) => outcome,
                Err(payload) => Err(format!("unit panicked: {}", panic_message(&*payload)).into()),
            }
        }
        .boxed()
    }
}

impl<T> Unit<T> {
    /// The unit's label, if one has been assigned.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Assign the default `unit-<seq>` label when none was given.
    pub(crate) fn labeled_or(mut self, seq: u64) -> Self {
        if self.label.is_none() {
            self.label = Some(format!("unit-{seq}"));
        }
        self
    }
}

impl<T> fmt::Debug for Unit<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unit").field("label", &self.label).finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
