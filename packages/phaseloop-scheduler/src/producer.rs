//! Randomized workload generator used by the demo binary and benches.

use std::time::Duration;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;

use crate::error::{Result, SchedulerError};
use crate::scheduler::{EnqueueHandle, Scheduler};
use crate::task::{Action, Phase};

/// One generated enqueue request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlannedTask {
    pub id: usize,
    pub phase: Phase,
    pub delay_ms: u64,
}

#[derive(Debug, Clone)]
pub struct DemoProducer {
    quantity: usize,
    min_delay_ms: u64,
    max_delay_ms: u64,
    work: Duration,
}

impl DemoProducer {
    pub fn new(quantity: usize, min_delay_ms: u64, max_delay_ms: u64) -> Result<Self> {
        if min_delay_ms > max_delay_ms {
            return Err(SchedulerError::InvalidRange {
                min: min_delay_ms,
                max: max_delay_ms,
            });
        }
        Ok(Self {
            quantity,
            min_delay_ms,
            max_delay_ms,
            work: Duration::from_millis(1),
        })
    }

    /// How long each generated action sleeps when run.
    pub fn with_work(mut self, work: Duration) -> Self {
        self.work = work;
        self
    }

    pub fn plan(&self, rng: &mut impl Rng) -> Vec<PlannedTask> {
        (0..self.quantity)
            .map(|id| PlannedTask {
                id,
                phase: Phase::ALL[rng.gen_range(0..Phase::ALL.len())],
                delay_ms: rng.gen_range(self.min_delay_ms..=self.max_delay_ms),
            })
            .collect()
    }

    pub fn plan_seeded(&self, seed: u64) -> Vec<PlannedTask> {
        self.plan(&mut StdRng::seed_from_u64(seed))
    }

    /// Enqueues every planned task into `scheduler`. Nothing is enqueued if
    /// any delay does not fit the scheduler's delay type. A zero-delay task
    /// that finds its queue full stops the enqueue with that error.
    pub fn spawn_into(
        &self,
        scheduler: &Scheduler,
        plan: &[PlannedTask],
    ) -> Result<Vec<EnqueueHandle>> {
        let delays = plan
            .iter()
            .map(|planned| {
                i64::try_from(planned.delay_ms)
                    .map_err(|_| SchedulerError::InvalidDelay(i64::MAX))
            })
            .collect::<Result<Vec<_>>>()?;

        plan.iter()
            .zip(delays)
            .map(|(planned, delay)| {
                let PlannedTask { id, phase, .. } = *planned;
                let work = self.work;
                let action = Action::from_async(move || async move {
                    tracing::debug!(id, %phase, "Demo task working");
                    tokio::time::sleep(work).await;
                    Ok(())
                });
                scheduler.enqueue(phase, action, delay)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverted_range_rejected() {
        let err = DemoProducer::new(10, 800, 100).unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::InvalidRange { min: 800, max: 100 }
        ));
    }

    #[test]
    fn test_plan_respects_range_and_quantity() {
        let producer = DemoProducer::new(50, 100, 800).unwrap();
        let plan = producer.plan_seeded(7);

        assert_eq!(plan.len(), 50);
        assert!(plan.iter().all(|p| (100..=800).contains(&p.delay_ms)));
        assert_eq!(plan, producer.plan_seeded(7));
    }

    #[test]
    fn test_degenerate_range() {
        let producer = DemoProducer::new(5, 42, 42).unwrap();
        assert!(producer.plan_seeded(1).iter().all(|p| p.delay_ms == 42));
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_queue_fails_spawn() {
        let config = crate::SchedulerConfig::default().with_capacity(1);
        let scheduler = Scheduler::new(config).unwrap();
        // Four tasks over three single-slot queues: one phase must overflow.
        let producer = DemoProducer::new(4, 0, 0).unwrap();
        let plan = producer.plan_seeded(11);

        let err = producer.spawn_into(&scheduler, &plan).unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::CapacityExceeded { capacity: 1, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_plan_runs_to_completion() {
        let scheduler = Scheduler::new(Default::default()).unwrap();
        let producer = DemoProducer::new(12, 0, 40).unwrap();
        let plan = producer.plan_seeded(3);

        let handles = producer.spawn_into(&scheduler, &plan).unwrap();
        assert_eq!(handles.len(), 12);

        let stats = scheduler.run().await.unwrap();
        assert_eq!(stats.executed(), 12);
        assert!(scheduler.is_idle());
    }
}
