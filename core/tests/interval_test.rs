use chrono::{TimeDelta, Utc};
use fleetsched::adapter::MemoryAdapter;
use fleetsched::hooks::{ErrorEvent, ErrorHook, ErrorKind, ExecutedEvent, ExecutedHook};
use fleetsched::scheduler::Scheduler;
use fleetsched::task::TaskBody;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Default)]
struct RecordingHooks {
    executions: Arc<Mutex<Vec<(String, i64)>>>,
    errors: Arc<Mutex<Vec<ErrorEvent>>>,
}

impl ExecutedHook for RecordingHooks {
    fn on_executed(&self, uid: &str, event: ExecutedEvent) {
        self.executions
            .lock()
            .unwrap()
            .push((uid.to_string(), event.timestamp));
    }
}

impl ErrorHook for RecordingHooks {
    fn on_error(&self, event: ErrorEvent) {
        self.errors.lock().unwrap().push(event);
    }
}

fn fast_scheduler(adapter: Arc<MemoryAdapter>, hooks: RecordingHooks) -> Scheduler {
    Scheduler::builder()
        .adapter(adapter)
        .on_executed(hooks.clone())
        .on_error(hooks)
        .min_revolving_delay(16)
        .max_revolving_delay(64)
        .build()
}

#[tokio::test(flavor = "multi_thread")]
async fn solo_interval_cadence() {
    let adapter = MemoryAdapter::new("interval-solo");
    let hooks = RecordingHooks::default();
    let scheduler = fast_scheduler(adapter.clone(), hooks.clone());

    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    scheduler
        .set_interval(
            TaskBody::callback(move |done| {
                counter.fetch_add(1, Ordering::SeqCst);
                done.signal();
            }),
            500,
            "t1",
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(3300)).await;
    scheduler.destroy().await;

    let count = fired.load(Ordering::SeqCst);
    assert!(
        (4..=7).contains(&count),
        "expected 4..=7 beats in 3.3s, got {count}"
    );

    let executions = hooks.executions.lock().unwrap();
    assert!(executions.iter().all(|(uid, _)| uid == "t1"));
    for pair in executions.windows(2) {
        let gap = pair[1].1 - pair[0].1;
        assert!(
            (380..=950).contains(&gap),
            "beat interval out of range: {gap} ms"
        );
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn next_run_override_stretches_cadence() {
    let adapter = MemoryAdapter::new("interval-override");
    let hooks = RecordingHooks::default();
    let scheduler = fast_scheduler(adapter.clone(), hooks.clone());

    scheduler
        .set_interval(
            TaskBody::callback(move |done| {
                done.signal_at(Utc::now() + TimeDelta::milliseconds(900));
            }),
            250,
            "cron1",
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(2800)).await;
    scheduler.destroy().await;

    let executions = hooks.executions.lock().unwrap();
    assert!(
        (2..=4).contains(&executions.len()),
        "override cadence fired {} times",
        executions.len()
    );
    for pair in executions.windows(2) {
        let gap = pair[1].1 - pair[0].1;
        assert!(gap >= 700, "override was ignored, beat after {gap} ms");
    }
}

#[tokio::test]
async fn rescheduling_same_uid_updates_delay_in_place() {
    let adapter = MemoryAdapter::new("interval-reschedule");
    let scheduler = Scheduler::builder().adapter(adapter.clone()).build();

    let first = scheduler
        .set_interval(TaskBody::callback(|done| done.signal()), 400, "r1")
        .await
        .unwrap();
    let second = scheduler
        .set_interval(TaskBody::callback(|done| done.signal()), 900, "r1")
        .await
        .unwrap();
    scheduler.destroy().await;

    assert_eq!(first, second);
    assert_eq!(adapter.task_count(), 1);
    let record = adapter.task(&first).unwrap();
    assert_eq!(record.delay, 900);
    assert!(record.is_interval);
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_body_keeps_beating() {
    let adapter = MemoryAdapter::new("interval-failing");
    let hooks = RecordingHooks::default();
    let scheduler = fast_scheduler(adapter.clone(), hooks.clone());

    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    scheduler
        .set_interval(
            TaskBody::callback(move |done| {
                counter.fetch_add(1, Ordering::SeqCst);
                done.fail(Arc::new("deliberate failure"));
            }),
            300,
            "flaky",
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(1700)).await;
    scheduler.destroy().await;

    let count = fired.load(Ordering::SeqCst);
    assert!(count >= 2, "a failing beat stopped the cadence, got {count}");

    let errors = hooks.errors.lock().unwrap();
    let body_errors = errors
        .iter()
        .filter(|event| event.kind == ErrorKind::Body)
        .count();
    assert!(body_errors >= 2, "expected repeated body reports");
    assert!(
        errors
            .iter()
            .filter(|event| event.kind == ErrorKind::Body)
            .all(|event| event.uid.as_deref() == Some("flakysetInterval"))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn future_bodies_resolve_on_settlement() {
    let adapter = MemoryAdapter::new("interval-future");
    let hooks = RecordingHooks::default();
    let scheduler = fast_scheduler(adapter.clone(), hooks.clone());

    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    scheduler
        .set_interval(
            TaskBody::future(move |_done| {
                let counter = counter.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
            400,
            "async-beat",
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(1900)).await;
    scheduler.destroy().await;

    let count = fired.load(Ordering::SeqCst);
    assert!(
        (2..=5).contains(&count),
        "future-shaped body fired {count} times"
    );
    assert!(hooks.errors.lock().unwrap().is_empty());
}
