//! Observable scheduler events.
//!
//! The loop reports what it does through an [`EventSink`] instead of writing
//! to a global console, so callers decide where the narration goes.

use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::task::{Phase, TaskKey};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SchedulerEvent {
    LoopStarted,
    TaskStarted { phase: Phase, key: TaskKey },
    TaskCompleted { phase: Phase, key: TaskKey },
    TaskFailed { phase: Phase, key: TaskKey, message: String },
    /// Fired once per gate opening, after the frame queue drains.
    Repaint { frame_tasks: usize },
    LoopCompleted { executed: u64 },
}

pub trait EventSink: Send + Sync {
    fn notify(&self, event: &SchedulerEvent);
}

/// Default sink: forwards every event to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn notify(&self, event: &SchedulerEvent) {
        match event {
            SchedulerEvent::LoopStarted => tracing::info!("Event loop started"),
            SchedulerEvent::TaskStarted { phase, key } => {
                tracing::debug!(%phase, key, "Task started")
            }
            SchedulerEvent::TaskCompleted { phase, key } => {
                tracing::debug!(%phase, key, "Task completed")
            }
            SchedulerEvent::TaskFailed {
                phase,
                key,
                message,
            } => tracing::error!(%phase, key, error = %message, "Task failed"),
            SchedulerEvent::Repaint { frame_tasks } => {
                tracing::info!(frame_tasks, "Repaint")
            }
            SchedulerEvent::LoopCompleted { executed } => {
                tracing::info!(executed, "Event loop completed")
            }
        }
    }
}

/// Keeps every event in memory. Clones share the same log.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<SchedulerEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SchedulerEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Keys of completed tasks, in completion order.
    pub fn completed(&self) -> Vec<(Phase, TaskKey)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SchedulerEvent::TaskCompleted { phase, key } => Some((phase, key)),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn notify(&self, event: &SchedulerEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
