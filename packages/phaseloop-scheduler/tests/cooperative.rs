use phaseloop_scheduler::{
    Action, Phase, RecordingSink, Scheduler, SchedulerConfig, SchedulerError, SchedulerEvent,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_scheduler_idle_states() {
    let scheduler = Scheduler::new(Default::default()).unwrap();

    // Initially idle
    assert!(scheduler.is_idle());
    assert_eq!(scheduler.run().await.unwrap().executed(), 0);

    scheduler
        .enqueue_immediate(Action::infallible(|| {}), 0)
        .unwrap()
        .await
        .unwrap();
    assert!(!scheduler.is_idle());

    // Run drains everything, so the scheduler is idle again afterwards.
    let stats = scheduler.run().await.unwrap();
    assert_eq!(stats.immediate, 1);
    assert!(scheduler.is_idle());
}

#[tokio::test(start_paused = true)]
async fn test_suspending_tasks_run_serially() {
    let scheduler = Scheduler::new(Default::default()).unwrap();
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    for (phase, delay) in [
        (Phase::Immediate, 0),
        (Phase::Immediate, 3),
        (Phase::Background, 1),
        (Phase::Background, 0),
        (Phase::Frame, 2),
    ] {
        let active = active.clone();
        let peak = peak.clone();
        let action = Action::from_async(move || async move {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            active.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        });
        let _ = scheduler.enqueue(phase, action, delay).unwrap();
    }

    let stats = scheduler.run().await.unwrap();

    assert_eq!(stats.executed(), 5);
    assert_eq!(peak.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_run_waits_for_in_flight_enqueues() {
    let scheduler = Scheduler::new(Default::default()).unwrap();
    let counter = Arc::new(AtomicUsize::new(0));

    let c = counter.clone();
    let _ = scheduler
        .enqueue_background(
            Action::infallible(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
            100,
        )
        .unwrap();

    // Nothing is visible yet, but the landing is tracked.
    assert_eq!(scheduler.len(Phase::Background), 0);
    assert_eq!(scheduler.pending(Phase::Background), 1);

    let stats = scheduler.run().await.unwrap();
    assert_eq!(stats.background, 1);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_run_can_ignore_in_flight_enqueues() {
    let config = SchedulerConfig {
        await_in_flight: false,
        ..Default::default()
    };
    let scheduler = Scheduler::new(config).unwrap();

    let handle = scheduler
        .enqueue_background(Action::infallible(|| {}), 100)
        .unwrap();

    let stats = scheduler.run().await.unwrap();
    assert_eq!(stats.executed(), 0);
    assert_eq!(scheduler.pending(Phase::Background), 1);

    // The late landing is still delivered and picked up by the next run.
    handle.await.unwrap();
    assert_eq!(scheduler.run().await.unwrap().background, 1);
}

#[tokio::test(start_paused = true)]
async fn test_failing_task_stops_run() {
    let sink = RecordingSink::new();
    let scheduler = Scheduler::builder().sink(sink.clone()).build().unwrap();
    let ran_after = Arc::new(AtomicUsize::new(0));

    scheduler
        .enqueue_background(Action::from_fn(|| Err("disk on fire".into())), 0)
        .unwrap()
        .await
        .unwrap();
    for delay in [1, 2] {
        let ran_after = ran_after.clone();
        scheduler
            .enqueue_background(
                Action::infallible(move || {
                    ran_after.fetch_add(1, Ordering::SeqCst);
                }),
                delay,
            )
            .unwrap()
            .await
            .unwrap();
    }

    let err = scheduler.run().await.unwrap_err();

    match err {
        SchedulerError::TaskFailed { phase, key, source } => {
            assert_eq!(phase, Phase::Background);
            assert_eq!(key, 0);
            assert_eq!(source.to_string(), "disk on fire");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(ran_after.load(Ordering::SeqCst), 0);
    assert_eq!(scheduler.len(Phase::Background), 2);
    assert!(sink.events().iter().any(|e| matches!(
        e,
        SchedulerEvent::TaskFailed { message, .. } if message == "disk on fire"
    )));
    assert!(
        !sink
            .events()
            .iter()
            .any(|e| matches!(e, SchedulerEvent::LoopCompleted { .. }))
    );
}

#[tokio::test(start_paused = true)]
async fn test_capacity_exceeded_on_enqueue() {
    let config = SchedulerConfig::default().with_capacity(2);
    let scheduler = Scheduler::new(config).unwrap();

    for _ in 0..2 {
        scheduler
            .enqueue_immediate(Action::infallible(|| {}), 0)
            .unwrap()
            .await
            .unwrap();
    }
    let err = scheduler
        .enqueue_immediate(Action::infallible(|| {}), 0)
        .unwrap_err();

    assert!(matches!(
        err,
        SchedulerError::CapacityExceeded {
            phase: Phase::Immediate,
            capacity: 2
        }
    ));
    assert_eq!(scheduler.len(Phase::Immediate), 2);
}
