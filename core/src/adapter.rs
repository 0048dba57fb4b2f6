pub mod memory;

pub use memory::MemoryAdapter;

use crate::errors::AdapterError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

/// One persisted task, as every storage back-end stores it. All instants are
/// epoch milliseconds
///
/// # Invariant(s)
/// At most one record exists per ``uid`` within one scheduler scope. A record
/// whose ``execute_at`` is at or before the current instant is due
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// The fleet-wide unique identifier (the caller-supplied uid with an
    /// internal kind suffix appended)
    pub uid: String,
    /// For recurring tasks the period, for one-shot tasks the initial wait,
    /// in milliseconds
    pub delay: i64,
    /// The instant at which the task is next eligible to run
    pub execute_at: i64,
    /// Whether the task recurs
    pub is_interval: bool,
    /// Soft-delete tombstone, honored by back-ends that cannot delete
    /// atomically. A tombstoned record is treated as absent everywhere
    #[serde(default)]
    pub is_deleted: bool,
}

/// The singleton lock record per scheduler scope. Back-ends must enforce that
/// at most one such record exists per scope and must purge it once
/// ``expire_at`` has passed, so a crashed holder cannot wedge the fleet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// The scheduler scope this lock covers
    pub scope: String,
    /// The instant at which the lock lapses on its own, epoch milliseconds
    pub expire_at: i64,
}

/// The liveness answer of [`StorageAdapter::ping`]. Mirrors a minimal HTTP
/// status shape so operators can pipe it straight into health endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingStatus {
    /// A short status label
    pub status: String,
    /// A status code, `200` when everything is reachable
    pub code: u16,
    /// The failure description when the back-end is not reachable
    pub error: Option<String>,
}

impl PingStatus {
    /// The all-clear answer
    pub fn ok() -> Self {
        PingStatus {
            status: "OK".to_string(),
            code: 200,
            error: None,
        }
    }

    /// A failure answer carrying the given code and description
    ///
    /// # Arguments
    /// - **code** The status code to report
    /// - **description** What went wrong, stored in the ``error`` field
    pub fn error(code: u16, description: impl Into<String>) -> Self {
        let description = description.into();
        PingStatus {
            status: "Server Error".to_string(),
            code,
            error: Some(description),
        }
    }
}

/// The callback seam through which [`StorageAdapter::iterate`] hands each
/// claimed due task back to the scheduler core for execution
///
/// # Object Safety
/// [`TaskExecutor`] is object safe, adapters receive it as
/// ``Arc<dyn TaskExecutor>``
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Runs one claimed task. Never errors, every failure mode is routed
    /// through the scheduler's hooks
    ///
    /// # Argument(s)
    /// This method accepts one argument, that being the claimed
    /// [`TaskRecord`] as ``task``
    async fn execute(&self, task: TaskRecord);
}

/// [`StorageAdapter`] is the capability contract through which the scheduler
/// core is decoupled from any particular storage engine. Any conforming
/// back-end (a document store, a key-value store, the in-process
/// [`MemoryAdapter`]) must implement fleet-lock acquisition and release, task
/// insert / update / remove, due-task iteration and a liveness check
///
/// A scope (a caller-chosen prefix) identifies one fleet's namespace inside
/// the back-end; it is fixed when the adapter is constructed. The scheduler
/// passes its own notion of ``now`` into the time-sensitive operations, so an
/// adapter holds no clock of its own and behaves identically under a virtual
/// clock
///
/// # Required Method(s)
/// When one plans to implement [`StorageAdapter`], they have to supply
/// implementations for the methods:
/// - [`StorageAdapter::ping`] Liveness check, must never error
/// - [`StorageAdapter::acquire_lock`] Fleet-wide lock acquisition
/// - [`StorageAdapter::release_lock`] Idempotent lock release
/// - [`StorageAdapter::add`] Insert-or-update of a task record
/// - [`StorageAdapter::remove`] Deletion of a task record
/// - [`StorageAdapter::update`] Rewrite of a task's next due instant
/// - [`StorageAdapter::iterate`] Claim-and-dispatch of every due task
///
/// # Guarantee(s)
/// The lock: at most one caller fleet-wide observes ``true`` from
/// [`StorageAdapter::acquire_lock`] while the lock is held, and a lock whose
/// ``expire_at`` has passed must be claimable (auto-purge of stale locks is
/// the adapter's duty). The iterate step: each record due at the passed
/// instant is pushed forward to ``reschedule_to`` and handed to the executor
/// exactly once per call
///
/// # Object Safety
/// [`StorageAdapter`] is object safe as seen throughout the [`Scheduler`]
/// source code
///
/// # See Also
/// - [`MemoryAdapter`]
/// - [`TaskExecutor`]
/// - [`TaskRecord`]
///
/// [`Scheduler`]: crate::scheduler::Scheduler
#[async_trait]
pub trait StorageAdapter: Debug + Send + Sync {
    /// Checks that the back-end is reachable. Never errors, a broken
    /// back-end is reported inside the returned [`PingStatus`]
    async fn ping(&self) -> PingStatus;

    /// Attempts to take the fleet-wide revolution lock until ``expire_at``
    ///
    /// # Argument(s)
    /// This method accepts 2 arguments, those being the scheduler's current
    /// instant as ``now`` and the instant at which the lock lapses on its
    /// own as ``expire_at``, both epoch milliseconds
    ///
    /// # Returns
    /// ``true`` only if no other instance currently holds the lock. A stored
    /// lock whose expiry is at or before ``now`` counts as absent
    async fn acquire_lock(&self, now: i64, expire_at: i64) -> Result<bool, AdapterError>;

    /// Releases the fleet-wide lock. Idempotent and safe to call when the
    /// lock has already lapsed
    async fn release_lock(&self) -> Result<(), AdapterError>;

    /// Inserts the task if no live record exists for ``uid``, with
    /// ``execute_at = now + delay``. On an existing live record, updates the
    /// stored delay when it differs and pulls ``execute_at`` earlier when
    /// ``now + delay`` precedes it (re-scheduling never pushes a task later)
    ///
    /// # Argument(s)
    /// This method accepts 4 arguments, those being the internal task
    /// identifier as ``uid``, whether the task recurs as ``is_interval``,
    /// the period (or initial wait) in milliseconds as ``delay`` and the
    /// scheduler's current instant as ``now``
    ///
    /// # Returns
    /// ``true`` when a fresh record was inserted, ``false`` when an existing
    /// one was updated in place
    async fn add(
        &self,
        uid: &str,
        is_interval: bool,
        delay: i64,
        now: i64,
    ) -> Result<bool, AdapterError>;

    /// Deletes the record for ``uid``
    ///
    /// # Argument(s)
    /// This method accepts one argument, that being the internal task
    /// identifier as ``uid``
    ///
    /// # Returns
    /// ``true`` only if a live (non-tombstoned) record existed and was
    /// deleted
    async fn remove(&self, uid: &str) -> Result<bool, AdapterError>;

    /// Rewrites the task's next due instant, used on interval completion
    ///
    /// # Argument(s)
    /// This method accepts 2 arguments, those being the [`TaskRecord`] to
    /// rewrite as ``task`` and the fresh due instant as ``next_execute_at``
    /// in epoch milliseconds
    ///
    /// # Returns
    /// ``true`` when a live record was updated, ``false`` when the record is
    /// gone (a concurrent cancellation won; the task must stay gone)
    async fn update(&self, task: &TaskRecord, next_execute_at: i64) -> Result<bool, AdapterError>;

    /// For each record with ``execute_at <= now``, atomically sets its
    /// ``execute_at`` to ``reschedule_to`` (the zombie claim) and hands the
    /// task to ``executor``. Each matched record is processed exactly once
    /// per call. Only ever invoked while this instance holds the fleet lock
    ///
    /// # Arguments
    /// - **now** The scheduler's current instant, epoch milliseconds
    /// - **reschedule_to** The zombie horizon every claimed record is
    ///   pushed to before dispatch
    /// - **executor** The [`TaskExecutor`] each claimed task is handed to
    async fn iterate(
        &self,
        now: i64,
        reschedule_to: i64,
        executor: Arc<dyn TaskExecutor>,
    ) -> Result<(), AdapterError>;
}

#[async_trait]
impl<A: StorageAdapter + 'static> StorageAdapter for Arc<A> {
    async fn ping(&self) -> PingStatus {
        self.as_ref().ping().await
    }

    async fn acquire_lock(&self, now: i64, expire_at: i64) -> Result<bool, AdapterError> {
        self.as_ref().acquire_lock(now, expire_at).await
    }

    async fn release_lock(&self) -> Result<(), AdapterError> {
        self.as_ref().release_lock().await
    }

    async fn add(
        &self,
        uid: &str,
        is_interval: bool,
        delay: i64,
        now: i64,
    ) -> Result<bool, AdapterError> {
        self.as_ref().add(uid, is_interval, delay, now).await
    }

    async fn remove(&self, uid: &str) -> Result<bool, AdapterError> {
        self.as_ref().remove(uid).await
    }

    async fn update(&self, task: &TaskRecord, next_execute_at: i64) -> Result<bool, AdapterError> {
        self.as_ref().update(task, next_execute_at).await
    }

    async fn iterate(
        &self,
        now: i64,
        reschedule_to: i64,
        executor: Arc<dyn TaskExecutor>,
    ) -> Result<(), AdapterError> {
        self.as_ref().iterate(now, reschedule_to, executor).await
    }
}
