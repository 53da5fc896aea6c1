//! Phased cooperative task scheduler.
//!
//! Work is routed to one of three bounded min-heaps (immediate, background,
//! frame) and drained by [`Scheduler::run`]: one immediate task per
//! iteration, every background task, then the frame queue whenever the
//! ~16 ms gate is open, followed by a repaint notification.

pub mod config;
pub mod error;
pub mod gate;
pub mod producer;
pub mod queue;
pub mod scheduler;
pub mod sink;
pub mod task;

pub use config::SchedulerConfig;
pub use error::{BoxError, Result, SchedulerError};
pub use gate::{FRAME_INTERVAL, PhaseGate};
pub use producer::{DemoProducer, PlannedTask};
pub use queue::{Keyed, PriorityQueue, QueueError};
pub use scheduler::{EnqueueHandle, RunStats, Scheduler, SchedulerBuilder};
pub use sink::{EventSink, RecordingSink, SchedulerEvent, TracingSink};
pub use task::{Action, Phase, Task, TaskKey};
