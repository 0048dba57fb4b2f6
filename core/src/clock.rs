pub mod system_clock;
pub mod virtual_clock;

use std::fmt::Debug;
use std::ops::Deref;
pub use system_clock::SystemClock;
pub use virtual_clock::VirtualClock;

use async_trait::async_trait;
use std::time::Duration;

/// [`SchedulerClock`] is a trait for implementing a custom scheduler clock, typical
/// operations include getting the current instant and idling until a point of
/// interest is reached. Every instant in fleetsched is an epoch-millisecond
/// timestamp (an ``i64``), matching what the storage adapters persist
///
/// # Required Methods
/// When implementing the [`SchedulerClock`], one must provide implementations for
/// two methods, those being [`SchedulerClock::now`] and [`SchedulerClock::idle_to`],
/// the former is used to get the current instant while the latter is used to idle
/// until a specific instant of interest, both are used by the [`Scheduler`] under
/// the hood to pace revolutions
///
/// # Trait Implementation(s)
/// Specifically, there are 2 noteworthy implementations to list, those being:
///
/// - [`VirtualClock`] used to simulate time (for unit-tests, debugging,
///   simulations... etc.), it doesn't go forward without explicit advancing and
///   implements as well the [`AdvanceableSchedulerClock`] trait
///
/// - [`SystemClock`] the default go-to clock, it automatically goes forward and
///   doesn't wait around, it doesn't implement the [`AdvanceableSchedulerClock`]
///   trait due to its nature
///
/// # See Also
/// - [`VirtualClock`]
/// - [`SystemClock`]
/// - [`AdvanceableSchedulerClock`]
///
/// [`Scheduler`]: crate::scheduler::Scheduler
#[async_trait]
pub trait SchedulerClock: Debug + Send + Sync {
    /// Gets the current instant of the clock as epoch milliseconds
    async fn now(&self) -> i64;

    /// Idle until this specified instant is reached (if it is in the past or
    /// present, it doesn't idle)
    ///
    /// # Arguments
    /// It accepts a ``to`` parameter, the epoch-millisecond instant to reach
    /// by simply idling around
    async fn idle_to(&self, to: i64);

    /// Idle for the given duration from the clock's current instant, it is a
    /// convenience over [`SchedulerClock::idle_to`] and rarely needs a custom
    /// implementation
    ///
    /// # Arguments
    /// It accepts a ``duration`` parameter of type [`Duration`], the span
    /// to idle for from the clock's current instant
    async fn idle(&self, duration: Duration) {
        let now = self.now().await;
        self.idle_to(now + duration.as_millis() as i64).await;
    }
}

#[async_trait]
impl<T> SchedulerClock for T
where
    T: Deref + Send + Sync + Debug,
    T::Target: SchedulerClock,
{
    async fn now(&self) -> i64 {
        self.deref().now().await
    }

    async fn idle_to(&self, to: i64) {
        self.deref().idle_to(to).await
    }
}

/// [`AdvanceableSchedulerClock`] is an optional extension to [`SchedulerClock`]
/// which, as the name suggests, allows for arbitrary advancement of time, specific
/// clocks might not support arbitrary advancement (such as [`SystemClock`]), as
/// such why it is an optional trait
///
/// # Required Methods
/// When implementing the [`AdvanceableSchedulerClock`], one has to fully implement
/// one method being [`AdvanceableSchedulerClock::advance_to`] which is used for
/// advancing the time to a specific instant of interest
///
/// # See Also
/// - [`SchedulerClock`]
/// - [`VirtualClock`]
#[async_trait]
pub trait AdvanceableSchedulerClock: SchedulerClock {
    /// Advance the time by a specified duration forward, it acts similar in
    /// spirit to [`AdvanceableSchedulerClock::advance_to`] (in fact it uses this
    /// method under the hood), but for durations
    ///
    /// # Arguments
    /// It accepts a ``duration`` parameter of type [`Duration`], used to
    /// advance the time by that specific duration
    async fn advance(&self, duration: Duration) {
        let now = self.now().await;
        self.advance_to(now + duration.as_millis() as i64).await
    }

    /// Advance the time to a specified desired future instant. Waiters
    /// idling via [`SchedulerClock::idle_to`] on an instant at or before
    /// ``to`` are released
    ///
    /// # Arguments
    /// It accepts a ``to`` parameter, the epoch-millisecond instant to
    /// advance the time to, this method is required to specify an
    /// implementation
    async fn advance_to(&self, to: i64);
}

#[async_trait]
impl<T> AdvanceableSchedulerClock for T
where
    T: Deref + Send + Sync + Debug,
    T::Target: AdvanceableSchedulerClock,
{
    async fn advance(&self, duration: Duration) {
        self.deref().advance(duration).await
    }

    async fn advance_to(&self, to: i64) {
        self.deref().advance_to(to).await
    }
}
