//! Scheduler error types.

use thiserror::Error;

use crate::queue::QueueError;
use crate::task::{Phase, TaskKey};

/// Error type returned by task actions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = SchedulerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("{phase} queue is full (capacity {capacity})")]
    CapacityExceeded { phase: Phase, capacity: usize },

    /// Pop or peek on an empty queue. The loop never pops without checking
    /// first, so seeing this out of `run()` means the loop itself is broken.
    #[error("queue is empty")]
    EmptyQueue,

    #[error("invalid delay: {0}ms")]
    InvalidDelay(i64),

    #[error("invalid delay range: min {min}ms > max {max}ms")]
    InvalidRange { min: u64, max: u64 },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("{phase} task (key {key}) failed: {source}")]
    TaskFailed {
        phase: Phase,
        key: TaskKey,
        #[source]
        source: BoxError,
    },

    #[error("delayed enqueue was aborted before landing")]
    EnqueueAborted,

    #[error("delayed enqueue requires a running Tokio runtime")]
    NoRuntime,

    #[error("scheduler is already running")]
    AlreadyRunning,
}

impl SchedulerError {
    pub(crate) fn from_queue(phase: Phase, err: QueueError) -> Self {
        match err {
            QueueError::CapacityExceeded { capacity } => {
                SchedulerError::CapacityExceeded { phase, capacity }
            }
            QueueError::EmptyQueue => SchedulerError::EmptyQueue,
        }
    }
}
