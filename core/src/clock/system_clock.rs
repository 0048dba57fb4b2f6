use crate::clock::SchedulerClock;
use async_trait::async_trait;
use chrono::Utc;
use std::fmt::Debug;
use std::time::Duration;

#[allow(unused_imports)]
use crate::clock::VirtualClock;

/// [`SystemClock`] is an implementation of the [`SchedulerClock`] trait, it is the
/// default option for scheduling, unlike [`VirtualClock`], it moves forward no
/// matter what and cannot be advanced at any arbitrary point (due to its design)
///
/// # See
/// - [`VirtualClock`]
/// - [`SchedulerClock`]
pub struct SystemClock;

impl Debug for SystemClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SystemClock").field(&Utc::now()).finish()
    }
}

#[async_trait]
impl SchedulerClock for SystemClock {
    async fn now(&self) -> i64 {
        Utc::now().timestamp_millis()
    }

    async fn idle_to(&self, to: i64) {
        let now = Utc::now().timestamp_millis();
        if to <= now {
            return;
        }
        tokio::time::sleep(Duration::from_millis((to - now) as u64)).await;
    }
}
