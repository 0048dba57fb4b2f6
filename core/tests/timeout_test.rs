use fleetsched::adapter::MemoryAdapter;
use fleetsched::scheduler::Scheduler;
use fleetsched::task::TaskBody;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn fast_scheduler(adapter: Arc<MemoryAdapter>) -> Scheduler {
    Scheduler::builder()
        .adapter(adapter)
        .min_revolving_delay(16)
        .max_revolving_delay(64)
        .build()
}

fn counting_body(fired: &Arc<AtomicUsize>) -> TaskBody {
    let counter = fired.clone();
    TaskBody::callback(move |done| {
        counter.fetch_add(1, Ordering::SeqCst);
        done.signal();
    })
}

#[tokio::test(flavor = "multi_thread")]
async fn one_shot_fires_exactly_once_and_leaves_no_record() {
    let adapter = MemoryAdapter::new("timeout-oneshot");
    let scheduler = fast_scheduler(adapter.clone());

    let fired = Arc::new(AtomicUsize::new(0));
    let key = scheduler
        .set_timeout(counting_body(&fired), 200, "o1")
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(1500)).await;
    scheduler.destroy().await;

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(adapter.task(&key).is_none());
    assert_eq!(adapter.task_count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn zero_delay_fires_on_the_next_revolution() {
    let adapter = MemoryAdapter::new("timeout-zero");
    let scheduler = fast_scheduler(adapter.clone());

    let fired = Arc::new(AtomicUsize::new(0));
    scheduler
        .set_timeout(counting_body(&fired), 0, "zero")
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(600)).await;
    scheduler.destroy().await;

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(adapter.task_count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn immediate_fires_once() {
    let adapter = MemoryAdapter::new("timeout-immediate");
    let scheduler = fast_scheduler(adapter.clone());

    let fired = Arc::new(AtomicUsize::new(0));
    let key = scheduler
        .set_immediate(counting_body(&fired), "now-task")
        .await
        .unwrap();
    assert!(key.ends_with("setImmediate"));

    tokio::time::sleep(Duration::from_millis(600)).await;
    scheduler.destroy().await;

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(adapter.task_count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn cancel_during_wait_prevents_execution() {
    let adapter = MemoryAdapter::new("timeout-cancel");
    let scheduler = fast_scheduler(adapter.clone());

    let fired = Arc::new(AtomicUsize::new(0));
    let key = scheduler
        .set_timeout(counting_body(&fired), 2000, "c1")
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(scheduler.clear_timeout(&key).await.unwrap());

    tokio::time::sleep(Duration::from_millis(2200)).await;
    scheduler.destroy().await;

    assert_eq!(fired.load(Ordering::SeqCst), 0);
    assert!(adapter.task(&key).is_none());
    assert_eq!(adapter.task_count(), 0);
}

#[tokio::test]
async fn schedule_then_cancel_restores_storage() {
    let adapter = MemoryAdapter::new("timeout-roundtrip");
    let scheduler = Scheduler::builder().adapter(adapter.clone()).build();

    assert_eq!(adapter.task_count(), 0);
    let key = scheduler
        .set_timeout(TaskBody::callback(|done| done.signal()), 60_000, "rt")
        .await
        .unwrap();
    assert_eq!(adapter.task_count(), 1);

    assert!(scheduler.clear_timeout(&key).await.unwrap());
    assert_eq!(adapter.task_count(), 0);
    scheduler.destroy().await;
}

#[tokio::test]
async fn clearing_an_unknown_key_reports_nothing_removed() {
    let adapter = MemoryAdapter::new("timeout-unknown");
    let scheduler = Scheduler::builder().adapter(adapter.clone()).build();

    assert!(!scheduler.clear_timeout("neversetTimeout").await.unwrap());
    scheduler.destroy().await;
}
