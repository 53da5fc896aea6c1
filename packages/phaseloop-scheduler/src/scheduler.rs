use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::SchedulerConfig;
use crate::error::{Result, SchedulerError};
use crate::gate::PhaseGate;
use crate::queue::PriorityQueue;
use crate::sink::{EventSink, SchedulerEvent, TracingSink};
use crate::task::{Action, Phase, Task};

/// Counters returned by a completed [`Scheduler::run`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub immediate: u64,
    pub background: u64,
    pub frame: u64,
    pub repaints: u64,
}

impl RunStats {
    pub fn executed(&self) -> u64 {
        self.immediate + self.background + self.frame
    }

    fn record(&mut self, phase: Phase) {
        match phase {
            Phase::Immediate => self.immediate += 1,
            Phase::Background => self.background += 1,
            Phase::Frame => self.frame += 1,
        }
    }
}

/// Everything the loop and the landing timers both touch. Kept behind a
/// single lock so "queue empty" and "nothing in flight" are read together.
struct State {
    queues: [PriorityQueue<Task>; 3],
    in_flight: [usize; 3],
    gate: PhaseGate,
}

impl State {
    fn visible(&self) -> usize {
        self.queues.iter().map(PriorityQueue::len).sum()
    }

    fn pending(&self) -> usize {
        self.in_flight.iter().sum()
    }
}

struct Shared {
    state: Mutex<State>,
    landed: Notify,
    running: AtomicBool,
    config: SchedulerConfig,
    sink: Arc<dyn EventSink>,
}

pub struct SchedulerBuilder {
    config: SchedulerConfig,
    sink: Arc<dyn EventSink>,
    gate: Option<PhaseGate>,
}

impl SchedulerBuilder {
    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    /// Start from a specific gate instead of one opened at build time.
    pub fn gate(mut self, gate: PhaseGate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn build(self) -> Result<Scheduler> {
        self.config.validate()?;
        let config = self.config;
        let gate = self
            .gate
            .unwrap_or_else(|| PhaseGate::new(config.frame_interval()));
        let queues = Phase::ALL.map(|phase| PriorityQueue::with_capacity(config.capacity(phase)));

        Ok(Scheduler {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    queues,
                    in_flight: [0; 3],
                    gate,
                }),
                landed: Notify::new(),
                running: AtomicBool::new(false),
                config,
                sink: self.sink,
            }),
        })
    }
}

/// Phased task scheduler.
///
/// Cloning is cheap and every clone drives the same queues, so task actions
/// can capture a clone to enqueue follow-up work.
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
}

impl Scheduler {
    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder {
            config: SchedulerConfig::default(),
            sink: Arc::new(TracingSink),
            gate: None,
        }
    }

    pub fn new(config: SchedulerConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }

    pub fn enqueue_immediate(&self, action: Action, delay_ms: i64) -> Result<EnqueueHandle> {
        self.enqueue(Phase::Immediate, action, delay_ms)
    }

    pub fn enqueue_background(&self, action: Action, delay_ms: i64) -> Result<EnqueueHandle> {
        self.enqueue(Phase::Background, action, delay_ms)
    }

    pub fn enqueue_frame(&self, action: Action, delay_ms: i64) -> Result<EnqueueHandle> {
        self.enqueue(Phase::Frame, action, delay_ms)
    }

    /// Schedules `action` to land in the `phase` queue after `delay_ms`.
    ///
    /// The delay doubles as the task's priority key. A zero delay lands
    /// before this returns, so a full queue is reported right here; anything
    /// longer lands from a timer task on the current Tokio runtime and
    /// reports through the handle. Awaiting the handle waits for the
    /// landing, not for the action to run.
    pub fn enqueue(&self, phase: Phase, action: Action, delay_ms: i64) -> Result<EnqueueHandle> {
        if delay_ms < 0 {
            return Err(SchedulerError::InvalidDelay(delay_ms));
        }
        let key = delay_ms as u64;
        let task = Task::new(action, key);

        if key == 0 {
            self.land(phase, task)?;
            return Ok(EnqueueHandle::landed());
        }

        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;
        self.lock().in_flight[phase.index()] += 1;

        let guard = InFlight {
            scheduler: self.clone(),
            phase,
            armed: true,
        };
        let handle = runtime.spawn(async move {
            tokio::time::sleep(Duration::from_millis(key)).await;
            guard.land(task)
        });
        Ok(EnqueueHandle::pending(handle))
    }

    /// Tasks currently visible in `phase`'s queue.
    pub fn len(&self, phase: Phase) -> usize {
        self.lock().queues[phase.index()].len()
    }

    /// Delayed enqueues for `phase` that have not landed yet.
    pub fn pending(&self, phase: Phase) -> usize {
        self.lock().in_flight[phase.index()]
    }

    pub fn is_idle(&self) -> bool {
        let state = self.lock();
        state.visible() == 0 && state.pending() == 0
    }

    pub fn last_gate_time(&self) -> Instant {
        self.lock().gate.last_open()
    }

    /// Drains all three queues under the phase policy until they are empty.
    ///
    /// Per iteration: one immediate task, then background until empty, then
    /// (if the gate is open) frame until empty followed by a repaint. The
    /// first failing action aborts the run and is returned as
    /// [`SchedulerError::TaskFailed`]; the remaining tasks stay queued.
    pub async fn run(&self) -> Result<RunStats> {
        if self.shared.running.swap(true, Ordering::AcqRel) {
            return Err(SchedulerError::AlreadyRunning);
        }
        let _running = RunningGuard(&self.shared.running);
        self.drain().await
    }

    async fn drain(&self) -> Result<RunStats> {
        let mut stats = RunStats::default();
        self.emit(SchedulerEvent::LoopStarted);

        loop {
            let mut progressed = false;

            if let Some(task) = self.take(Phase::Immediate)? {
                self.execute(Phase::Immediate, task, &mut stats).await?;
                progressed = true;
            }

            // Re-checked after every task so work enqueued by a background
            // task runs in this same phase.
            while let Some(task) = self.take(Phase::Background)? {
                self.execute(Phase::Background, task, &mut stats).await?;
                progressed = true;
            }

            if self.gate_open() {
                let mut frame_tasks = 0;
                while let Some(task) = self.take(Phase::Frame)? {
                    self.execute(Phase::Frame, task, &mut stats).await?;
                    frame_tasks += 1;
                }
                self.close_gate();
                stats.repaints += 1;
                self.emit(SchedulerEvent::Repaint { frame_tasks });
                progressed |= frame_tasks > 0;
            }

            let (visible, pending, next_open) = {
                let state = self.lock();
                (state.visible(), state.pending(), state.gate.next_open())
            };

            if visible == 0 {
                if pending == 0 || !self.shared.config.await_in_flight {
                    break;
                }
                tracing::trace!(pending, "Queues empty, waiting for in-flight enqueues");
                self.shared.landed.notified().await;
            } else if progressed {
                tokio::task::yield_now().await;
            } else {
                // Only frame work is left and the gate is shut.
                tokio::select! {
                    _ = tokio::time::sleep_until(next_open) => {}
                    _ = self.shared.landed.notified() => {}
                }
            }
        }

        self.emit(SchedulerEvent::LoopCompleted {
            executed: stats.executed(),
        });
        Ok(stats)
    }

    async fn execute(&self, phase: Phase, task: Task, stats: &mut RunStats) -> Result<()> {
        let key = task.key();
        self.emit(SchedulerEvent::TaskStarted { phase, key });

        match task.into_action().execute().await {
            Ok(()) => {
                stats.record(phase);
                self.emit(SchedulerEvent::TaskCompleted { phase, key });
                Ok(())
            }
            Err(source) => {
                self.emit(SchedulerEvent::TaskFailed {
                    phase,
                    key,
                    message: source.to_string(),
                });
                Err(SchedulerError::TaskFailed { phase, key, source })
            }
        }
    }

    fn take(&self, phase: Phase) -> Result<Option<Task>> {
        let mut state = self.lock();
        let queue = &mut state.queues[phase.index()];
        if queue.is_empty() {
            return Ok(None);
        }
        queue
            .pop()
            .map(Some)
            .map_err(|err| SchedulerError::from_queue(phase, err))
    }

    fn land(&self, phase: Phase, task: Task) -> Result<()> {
        let result = self.lock().queues[phase.index()]
            .push(task)
            .map_err(|err| SchedulerError::from_queue(phase, err));
        self.shared.landed.notify_one();
        result
    }

    fn gate_open(&self) -> bool {
        self.lock().gate.is_open(Instant::now())
    }

    fn close_gate(&self) {
        self.lock().gate.close(Instant::now());
    }

    fn emit(&self, event: SchedulerEvent) {
        self.shared.sink.notify(&event);
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the running flag even when the `run()` future is dropped early.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Tracks one delayed enqueue. Dropping it without landing (the timer task
/// was cancelled) still releases the in-flight slot.
struct InFlight {
    scheduler: Scheduler,
    phase: Phase,
    armed: bool,
}

impl InFlight {
    fn land(mut self, task: Task) -> Result<()> {
        let idx = self.phase.index();
        let result = {
            let mut state = self.scheduler.lock();
            state.in_flight[idx] -= 1;
            state.queues[idx].push(task)
        };
        self.armed = false;
        self.scheduler.shared.landed.notify_one();

        result.map_err(|err| {
            tracing::warn!(phase = %self.phase, error = %err, "Delayed enqueue dropped");
            SchedulerError::from_queue(self.phase, err)
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.armed {
            self.scheduler.lock().in_flight[self.phase.index()] -= 1;
            self.scheduler.shared.landed.notify_one();
        }
    }
}

/// Completes once a task from [`Scheduler::enqueue`] has landed in its queue.
///
/// Dropping the handle does not cancel the enqueue.
#[derive(Debug)]
#[must_use = "a delayed enqueue reports capacity failures through its handle"]
pub struct EnqueueHandle {
    inner: HandleInner,
}

#[derive(Debug)]
enum HandleInner {
    Landed,
    Pending(JoinHandle<Result<()>>),
}

impl EnqueueHandle {
    fn landed() -> Self {
        Self {
            inner: HandleInner::Landed,
        }
    }

    fn pending(handle: JoinHandle<Result<()>>) -> Self {
        Self {
            inner: HandleInner::Pending(handle),
        }
    }

    pub fn is_landed(&self) -> bool {
        match &self.inner {
            HandleInner::Landed => true,
            HandleInner::Pending(handle) => handle.is_finished(),
        }
    }
}

impl Future for EnqueueHandle {
    type Output = Result<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().inner {
            HandleInner::Landed => Poll::Ready(Ok(())),
            HandleInner::Pending(handle) => Pin::new(handle)
                .poll(cx)
                .map(|joined| joined.unwrap_or_else(|_| Err(SchedulerError::EnqueueAborted))),
        }
    }
}
