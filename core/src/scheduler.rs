use crate::adapter::{PingStatus, StorageAdapter, TaskExecutor};
use crate::clock::{SchedulerClock, SystemClock};
use crate::errors::SchedulerError;
use crate::executor::ExecutionEngine;
use crate::hooks::{ErrorEvent, ErrorHook, ExecutedHook, TracingErrorHook, TracingExecutedHook};
use crate::registry::TaskRegistry;
use crate::task::{IMMEDIATE_SUFFIX, INTERVAL_SUFFIX, TIMEOUT_SUFFIX, TaskBody};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use typed_builder::TypedBuilder;

const STATE_RUNNING: u8 = 0;
const STATE_DESTROYED: u8 = 1;

/// This is the builder config to use for building a [`Scheduler`] instance.
/// By itself it should not be used, it resides in [`Scheduler::builder`]
#[derive(TypedBuilder)]
#[builder(build_method(into = Scheduler))]
pub struct SchedulerConfig {
    /// The [`StorageAdapter`] every instance of the fleet shares, it is the
    /// only coordination channel between instances and the only required
    /// field
    ///
    /// # See Also
    /// - [`StorageAdapter`]
    /// - [`MemoryAdapter`]
    ///
    /// [`MemoryAdapter`]: crate::adapter::MemoryAdapter
    #[builder(
        setter(transform = |adapter: impl StorageAdapter + 'static| Arc::new(adapter) as Arc<dyn StorageAdapter>),
    )]
    adapter: Arc<dyn StorageAdapter>,

    /// The [`SchedulerClock`] for pacing revolutions and stamping instants
    ///
    /// # Default Value
    /// Every scheduler uses as default value [`SystemClock`]. For unit
    /// testing [`VirtualClock`] should be preferred as it allows explicit
    /// advancing of time
    ///
    /// # See Also
    /// - [`SystemClock`]
    /// - [`VirtualClock`]
    /// - [`SchedulerClock`]
    ///
    /// [`VirtualClock`]: crate::clock::VirtualClock
    #[builder(
        default = Arc::new(SystemClock),
        setter(transform = |clock: impl SchedulerClock + 'static| Arc::new(clock) as Arc<dyn SchedulerClock>),
    )]
    clock: Arc<dyn SchedulerClock>,

    /// The [`ErrorHook`] receiving every operational condition. The
    /// scheduler never aborts on these, it reports here and keeps revolving
    ///
    /// # Default Value
    /// [`TracingErrorHook`], which forwards to the process log
    #[builder(
        default = Arc::new(TracingErrorHook),
        setter(transform = |hook: impl ErrorHook + 'static| Arc::new(hook) as Arc<dyn ErrorHook>),
    )]
    on_error: Arc<dyn ErrorHook>,

    /// The [`ExecutedHook`] invoked once per normal task completion
    ///
    /// # Default Value
    /// [`TracingExecutedHook`], which notes completions at debug level
    #[builder(
        default = Arc::new(TracingExecutedHook),
        setter(transform = |hook: impl ExecutedHook + 'static| Arc::new(hook) as Arc<dyn ExecutedHook>),
    )]
    on_executed: Arc<dyn ExecutedHook>,

    /// When set, a claimed task with no body on this instance has its record
    /// removed instead of being reported through the error hook. Useful when
    /// instances with disjoint task sets share one scope
    #[builder(default = false)]
    auto_clear: bool,

    /// Trace every revolution step at debug level
    #[builder(default = false)]
    debug: bool,

    /// How far the claim step pushes a due task's next instant before
    /// dispatching it, in milliseconds. This is the whole crash-recovery
    /// story: an executor that dies without resolving leaves a record that
    /// becomes due again once this window has passed. Set it above the
    /// worst-case legitimate task duration; values below one minute are
    /// discouraged
    #[builder(default = 900_000)]
    zombie_time: i64,

    /// The lower bound of the random pause between revolutions, in
    /// milliseconds
    #[builder(default = 128)]
    min_revolving_delay: i64,

    /// The upper bound of the random pause between revolutions, in
    /// milliseconds. The randomness is a coordination primitive, it keeps a
    /// fleet's instances from synchronizing their polling and perpetually
    /// racing for the lock
    #[builder(default = 768)]
    max_revolving_delay: i64,
}

impl From<SchedulerConfig> for Scheduler {
    fn from(config: SchedulerConfig) -> Self {
        let min_revolving_delay = config.min_revolving_delay.max(1);
        let max_revolving_delay = config.max_revolving_delay.max(min_revolving_delay);

        let registry = Arc::new(TaskRegistry::new());
        let engine = Arc::new(ExecutionEngine::new(
            config.adapter.clone(),
            config.clock.clone(),
            registry.clone(),
            config.on_error.clone(),
            config.on_executed.clone(),
            config.auto_clear,
            config.debug,
        ));
        let state = Arc::new(AtomicU8::new(STATE_RUNNING));

        let process = tokio::spawn(revolution_loop(RevolutionLoop {
            adapter: config.adapter.clone(),
            clock: config.clock.clone(),
            executor: engine as Arc<dyn TaskExecutor>,
            on_error: config.on_error.clone(),
            state: state.clone(),
            zombie_time: config.zombie_time,
            min_revolving_delay,
            max_revolving_delay,
            debug: config.debug,
        }));

        Scheduler {
            adapter: config.adapter,
            clock: config.clock,
            registry,
            on_error: config.on_error,
            state,
            process: Mutex::new(Some(process)),
        }
    }
}

struct RevolutionLoop {
    adapter: Arc<dyn StorageAdapter>,
    clock: Arc<dyn SchedulerClock>,
    executor: Arc<dyn TaskExecutor>,
    on_error: Arc<dyn ErrorHook>,
    state: Arc<AtomicU8>,
    zombie_time: i64,
    min_revolving_delay: i64,
    max_revolving_delay: i64,
    debug: bool,
}

/// One revolution per pause: take the fleet lock, claim-and-dispatch every
/// due task, release, sleep a fresh random pause. Every failure is routed to
/// the error hook and the loop carries on regardless, only destruction stops
/// it
async fn revolution_loop(run: RevolutionLoop) {
    loop {
        let pause = fastrand::i64(run.min_revolving_delay..=run.max_revolving_delay);
        run.clock.idle(Duration::from_millis(pause as u64)).await;
        if run.state.load(Ordering::SeqCst) == STATE_DESTROYED {
            break;
        }

        let now = run.clock.now().await;
        let reschedule_to = now + run.zombie_time;
        match run.adapter.acquire_lock(now, reschedule_to).await {
            Ok(false) => {
                // another instance is revolving right now, not an error
                if run.debug {
                    tracing::debug!("fleet lock busy, skipping revolution");
                }
            }
            Ok(true) => {
                if run.debug {
                    tracing::debug!(now, reschedule_to, "fleet lock acquired, iterating");
                }
                if let Err(error) = run
                    .adapter
                    .iterate(now, reschedule_to, run.executor.clone())
                    .await
                {
                    run.on_error.on_error(ErrorEvent::storage("iterate", error));
                }
                if let Err(error) = run.adapter.release_lock().await {
                    run.on_error
                        .on_error(ErrorEvent::storage("release_lock", error));
                }
            }
            Err(error) => {
                run.on_error
                    .on_error(ErrorEvent::storage("acquire_lock", error));
            }
        }
    }
}

/// [`Scheduler`] is one fleet member. It owns a revolution timer, an
/// in-memory registry of the task bodies this instance knows, and a handle to
/// the shared [`StorageAdapter`] through which the fleet coordinates. Any
/// number of instances (in one process or across machines) may share a scope;
/// each scheduled task fires on at most one of them per due instant
///
/// The scheduling primitives mirror the classic timer trio:
/// [`Scheduler::set_interval`] for recurring tasks, [`Scheduler::set_timeout`]
/// and [`Scheduler::set_immediate`] for one-shots, and
/// [`Scheduler::clear_interval`] / [`Scheduler::clear_timeout`] to cancel.
/// Identifiers are caller-supplied and stable, scheduling the same uid from
/// several instances yields one logical task
///
/// # Constructor(s)
/// Construct via [`Scheduler::builder`]. Building starts the revolution
/// timer immediately, so it must happen inside a tokio runtime
///
/// # Implementation Detail(s)
/// The scheduler holds no in-process mutual exclusion around its revolution,
/// the single fleet-wide lock record in storage is the only synchronization
/// primitive. Task bodies run on the runtime's worker pool and never stall
/// the timer
///
/// # Example
/// ```ignore
/// use fleetsched::adapter::MemoryAdapter;
/// use fleetsched::scheduler::Scheduler;
/// use fleetsched::task::TaskBody;
///
/// let adapter = MemoryAdapter::new("cluster-jobs");
/// let scheduler = Scheduler::builder().adapter(adapter).build();
///
/// let key = scheduler.set_interval(
///     TaskBody::callback(|done| { println!("beat"); done.signal(); }),
///     30_000,
///     "heartbeat",
/// ).await?;
///
/// scheduler.clear_interval(&key).await?;
/// scheduler.destroy().await;
/// ```
///
/// # See Also
/// - [`StorageAdapter`]
/// - [`TaskBody`]
/// - [`SchedulerConfig`]
pub struct Scheduler {
    adapter: Arc<dyn StorageAdapter>,
    clock: Arc<dyn SchedulerClock>,
    registry: Arc<TaskRegistry>,
    on_error: Arc<dyn ErrorHook>,
    state: Arc<AtomicU8>,
    process: Mutex<Option<JoinHandle<()>>>,
}

impl Debug for Scheduler {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("adapter", &self.adapter)
            .field("clock", &self.clock)
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

impl Scheduler {
    /// Constructs a scheduler builder, used for supplying the storage
    /// adapter, hooks and timing knobs to then construct a [`Scheduler`]
    ///
    /// # Returns
    /// The [`SchedulerConfigBuilder`] builder for constructing the
    /// [`Scheduler`]
    pub fn builder() -> SchedulerConfigBuilder {
        SchedulerConfig::builder()
    }

    /// Schedules a recurring task: ``body`` runs every ``delay``
    /// milliseconds, fleet-wide at most once per beat. Re-scheduling an
    /// existing uid updates its cadence instead of duplicating it
    ///
    /// # Arguments
    /// - **body** The [`TaskBody`] to run on every beat, known only to the
    ///   instances it is registered on
    /// - **delay** The period in milliseconds, zero or positive
    /// - **uid** The stable fleet-wide identifier of the task
    ///
    /// # Returns
    /// The key to pass to [`Scheduler::clear_interval`]. On a destroyed
    /// instance the call reports through the error hook and returns an empty
    /// key
    ///
    /// # Errors
    /// [`SchedulerError::NegativeDelay`] and [`SchedulerError::EmptyUid`]
    /// for malformed arguments
    pub async fn set_interval(
        &self,
        body: TaskBody,
        delay: i64,
        uid: &str,
    ) -> Result<String, SchedulerError> {
        self.schedule(body, delay, uid, INTERVAL_SUFFIX, true).await
    }

    /// Schedules a one-shot task: ``body`` runs once, ``delay`` milliseconds
    /// from now, on whichever instance of the fleet claims it first
    ///
    /// # Arguments
    /// - **body** The [`TaskBody`] to run once
    /// - **delay** The wait before the task comes due, in milliseconds,
    ///   zero or positive
    /// - **uid** The stable fleet-wide identifier of the task
    ///
    /// # Returns
    /// The key to pass to [`Scheduler::clear_timeout`], or an empty key on a
    /// destroyed instance
    ///
    /// # Errors
    /// [`SchedulerError::NegativeDelay`] and [`SchedulerError::EmptyUid`]
    /// for malformed arguments
    pub async fn set_timeout(
        &self,
        body: TaskBody,
        delay: i64,
        uid: &str,
    ) -> Result<String, SchedulerError> {
        self.schedule(body, delay, uid, TIMEOUT_SUFFIX, false).await
    }

    /// Schedules a one-shot task due immediately, it fires on the next
    /// revolution of whichever instance claims it
    ///
    /// # Arguments
    /// - **body** The [`TaskBody`] to run once
    /// - **uid** The stable fleet-wide identifier of the task
    ///
    /// # Errors
    /// [`SchedulerError::EmptyUid`] for a blank identifier
    pub async fn set_immediate(&self, body: TaskBody, uid: &str) -> Result<String, SchedulerError> {
        self.schedule(body, 0, uid, IMMEDIATE_SUFFIX, false).await
    }

    async fn schedule(
        &self,
        body: TaskBody,
        delay: i64,
        uid: &str,
        suffix: &str,
        is_interval: bool,
    ) -> Result<String, SchedulerError> {
        if delay < 0 {
            return Err(SchedulerError::NegativeDelay(delay));
        }
        if uid.is_empty() {
            return Err(SchedulerError::EmptyUid);
        }
        if self.is_destroyed() {
            self.on_error.on_error(ErrorEvent::destroyed_use(uid));
            return Ok(String::new());
        }

        let key = format!("{uid}{suffix}");
        self.registry.insert(key.clone(), body);
        let now = self.clock.now().await;
        if let Err(error) = self.adapter.add(&key, is_interval, delay, now).await {
            // the record may still land via a re-schedule elsewhere, report
            // rather than fail the call
            self.on_error.on_error(ErrorEvent::add_failed(&key, error));
        }
        Ok(key)
    }

    /// Cancels a recurring task by the key [`Scheduler::set_interval`]
    /// returned
    ///
    /// # Argument(s)
    /// This method accepts one argument, that being the ``key`` handed back
    /// by [`Scheduler::set_interval`]
    ///
    /// # Returns
    /// ``true`` only if a record actually existed and was removed
    ///
    /// # Errors
    /// [`SchedulerError::Storage`] when the adapter could not perform the
    /// removal
    pub async fn clear_interval(&self, key: &str) -> Result<bool, SchedulerError> {
        self.clear(key).await
    }

    /// Cancels a one-shot task by the key [`Scheduler::set_timeout`] or
    /// [`Scheduler::set_immediate`] returned. Semantically identical to
    /// [`Scheduler::clear_interval`], two names for readability
    ///
    /// # Argument(s)
    /// This method accepts one argument, that being the ``key`` handed back
    /// by [`Scheduler::set_timeout`] or [`Scheduler::set_immediate`]
    pub async fn clear_timeout(&self, key: &str) -> Result<bool, SchedulerError> {
        self.clear(key).await
    }

    async fn clear(&self, key: &str) -> Result<bool, SchedulerError> {
        let removed = self
            .adapter
            .remove(key)
            .await
            .map_err(|error| SchedulerError::Storage("remove", error))?;
        if removed {
            self.registry.remove(key);
        }
        Ok(removed)
    }

    /// Stops this instance: the revolution timer is cancelled and subsequent
    /// scheduling calls become inert (they report through the error hook and
    /// return the empty sentinel key). Persisted records are left alone and
    /// in-flight bodies run to completion; the rest of the fleet continues
    /// unaffected. Cancellation via [`Scheduler::clear_interval`] /
    /// [`Scheduler::clear_timeout`] keeps working
    ///
    /// # Returns
    /// ``true`` on the call that performed the transition, ``false`` on
    /// every call after it
    pub async fn destroy(&self) -> bool {
        if self.state.swap(STATE_DESTROYED, Ordering::SeqCst) == STATE_DESTROYED {
            return false;
        }
        let process = self.process.lock().unwrap().take();
        if let Some(process) = process {
            process.abort();
        }
        true
    }

    /// Liveness check. Answers the adapter's own [`PingStatus`] while
    /// running and a ``503`` without touching the adapter once destroyed
    pub async fn ping(&self) -> PingStatus {
        if self.is_destroyed() {
            return PingStatus::error(503, "scheduler instance has been destroyed");
        }
        self.adapter.ping().await
    }

    fn is_destroyed(&self) -> bool {
        self.state.load(Ordering::SeqCst) == STATE_DESTROYED
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        // a dropped instance must not keep claiming tasks for a fleet it is
        // no longer part of
        if let Ok(mut process) = self.process.lock() {
            if let Some(process) = process.take() {
                process.abort();
            }
        }
    }
}
