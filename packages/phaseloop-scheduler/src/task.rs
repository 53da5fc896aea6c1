use std::fmt;
use std::future::Future;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::BoxError;
use crate::queue::Keyed;

/// Priority key of a task. Lower runs sooner.
pub type TaskKey = u64;

/// The three queues a task can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// At most one per loop iteration.
    Immediate,
    /// Drained to exhaustion every iteration.
    Background,
    /// Drained only when the frame gate is open.
    Frame,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Immediate, Phase::Background, Phase::Frame];

    pub fn index(self) -> usize {
        match self {
            Phase::Immediate => 0,
            Phase::Background => 1,
            Phase::Frame => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Immediate => "immediate",
            Phase::Background => "background",
            Phase::Frame => "frame",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work. Sync closures and futures both end up here; the loop
/// always awaits the result.
pub struct Action {
    run: Box<dyn FnOnce() -> BoxFuture<'static, Result<(), BoxError>> + Send>,
}

impl Action {
    /// Wraps an async closure.
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self {
            run: Box::new(move || f().boxed()),
        }
    }

    /// Wraps a synchronous closure.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: FnOnce() -> Result<(), BoxError> + Send + 'static,
    {
        Self {
            run: Box::new(move || futures::future::ready(f()).boxed()),
        }
    }

    /// Wraps an infallible synchronous closure.
    pub fn infallible<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::from_fn(move || {
            f();
            Ok(())
        })
    }

    pub(crate) async fn execute(self) -> Result<(), BoxError> {
        (self.run)().await
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Action(..)")
    }
}

/// An action paired with its priority key. Immutable once built.
#[derive(Debug)]
pub struct Task {
    action: Action,
    key: TaskKey,
}

impl Task {
    pub fn new(action: Action, key: TaskKey) -> Self {
        Self { action, key }
    }

    pub fn key(&self) -> TaskKey {
        self.key
    }

    pub fn into_action(self) -> Action {
        self.action
    }
}

impl Keyed for Task {
    type Key = TaskKey;

    fn key(&self) -> TaskKey {
        self.key
    }
}
