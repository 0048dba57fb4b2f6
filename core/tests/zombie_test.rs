use chrono::Utc;
use fleetsched::adapter::MemoryAdapter;
use fleetsched::scheduler::Scheduler;
use fleetsched::task::TaskBody;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A body that never resolves simulates an executor that crashed or forgot
/// its completion signal. The record it leaves behind must come due again
/// once the zombie window has passed.
#[tokio::test(flavor = "multi_thread")]
async fn unresolved_interval_is_reclaimed_after_zombie_window() {
    let adapter = MemoryAdapter::new("zombie-interval");
    let scheduler = Scheduler::builder()
        .adapter(adapter.clone())
        .zombie_time(2000)
        .min_revolving_delay(16)
        .max_revolving_delay(64)
        .build();

    let entries: Arc<Mutex<Vec<i64>>> = Arc::new(Mutex::new(Vec::new()));
    let log = entries.clone();
    scheduler
        .set_interval(
            TaskBody::callback(move |_done| {
                log.lock().unwrap().push(Utc::now().timestamp_millis());
                // deliberately neither signal nor fail
            }),
            300,
            "z1",
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(5000)).await;
    scheduler.destroy().await;

    let entries = entries.lock().unwrap();
    assert!(
        entries.len() >= 2,
        "zombie was never reclaimed, {} entries",
        entries.len()
    );
    let gap = entries[1] - entries[0];
    assert!(
        (1900..=2700).contains(&gap),
        "reclaim happened after {gap} ms, expected about the zombie window"
    );
}

/// One-shots are removed from storage before their body runs, so a body that
/// never resolves cannot fire twice. Only a crash before the remove step is
/// retried, and that path leaves the record untouched.
#[tokio::test(flavor = "multi_thread")]
async fn unresolved_one_shot_runs_once_and_is_gone() {
    let adapter = MemoryAdapter::new("zombie-oneshot");
    let scheduler = Scheduler::builder()
        .adapter(adapter.clone())
        .zombie_time(500)
        .min_revolving_delay(16)
        .max_revolving_delay(64)
        .build();

    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    let key = scheduler
        .set_timeout(
            TaskBody::callback(move |_done| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
            100,
            "silent",
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(2000)).await;
    scheduler.destroy().await;

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(adapter.task(&key).is_none());
}
