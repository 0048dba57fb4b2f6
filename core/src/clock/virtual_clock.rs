use crate::clock::{AdvanceableSchedulerClock, SchedulerClock};
use crate::utils::millis_to_date_time;
use async_trait::async_trait;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::Notify;

/// [`VirtualClock`] is an implementation of the [`SchedulerClock`] trait, it acts
/// as a mock object, allowing to simulate time without the waiting around. This
/// can especially be useful for unit tests and simulations
///
/// Unlike [`SystemClock`], this clock doesn't move forward, rather it needs
/// explicit calls to advance methods ([`VirtualClock`] implements the
/// [`AdvanceableSchedulerClock`] extension trait), which makes it predictable at
/// any point throughout the program
///
/// # Constructor(s)
/// When constructing a [`VirtualClock`], one can use either of:
/// - [`VirtualClock::new`] For creating one from an initial epoch-millisecond
///   instant
/// - [`VirtualClock::from_epoch`] For creating one set to the UNIX epoch
///
/// # See Also
/// - [`SystemClock`]
/// - [`AdvanceableSchedulerClock`]
/// - [`SchedulerClock`]
///
/// [`SystemClock`]: crate::clock::SystemClock
pub struct VirtualClock {
    current_time: AtomicI64,
    notify: Notify,
}

impl Debug for VirtualClock {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualClock")
            .field(
                "current_time",
                &millis_to_date_time(self.current_time.load(Ordering::Relaxed)),
            )
            .finish()
    }
}

impl VirtualClock {
    /// Creates / Constructs a new [`VirtualClock`] instance with the time set
    /// to the supplied epoch-millisecond instant
    ///
    /// # Argument(s)
    /// This method accepts one argument, that being the starting instant as
    /// ``initial_millis``
    pub fn new(initial_millis: i64) -> Self {
        VirtualClock {
            current_time: AtomicI64::new(initial_millis),
            notify: Notify::new(),
        }
    }

    /// Creates / Constructs a new [`VirtualClock`] instance with the time set
    /// to the UNIX epoch
    pub fn from_epoch() -> Self {
        Self::new(0)
    }
}

#[async_trait]
impl AdvanceableSchedulerClock for VirtualClock {
    async fn advance_to(&self, to: i64) {
        self.current_time.store(to, Ordering::Relaxed);
        self.notify.notify_waiters();
    }
}

#[async_trait]
impl SchedulerClock for VirtualClock {
    async fn now(&self) -> i64 {
        self.current_time.load(Ordering::Relaxed)
    }

    async fn idle_to(&self, to: i64) {
        loop {
            // register before re-checking so an advance between the check and
            // the wait cannot be missed
            let notified = self.notify.notified();
            if self.now().await >= to {
                break;
            }
            notified.await;
        }
    }
}
